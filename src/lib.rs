// Video Share Client Library
// 视频分享站分片上传客户端核心库

// 配置管理模块
pub mod config;

// 错误类型
pub mod error;

// 后端API模块
pub mod backend;

// 分片上传模块
pub mod uploader;

// 上传事件
pub mod events;

// 上传历史
pub mod history;

// 视频播放、下载与分享
pub mod video;

// 日志系统
pub mod logging;

// 导出常用类型
pub use backend::{share_link, BackendClient, BackendError, UploadRecord};
pub use config::AppConfig;
pub use error::ClientError;
pub use events::{EventBus, UploadEvent};
pub use history::{delete_upload, HistoryView};
pub use uploader::{
    ChunkSplitter, ChunkUploader, ProgressSource, SessionState, UploadEngine, UploadManager,
    UploadOutcome, UploadSession,
};
pub use video::{download_to_file, VideoLinks};
