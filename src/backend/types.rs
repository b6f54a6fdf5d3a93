// 后端 API 数据类型

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =====================================================
// 分片上传
// =====================================================

/// 分片上传请求（对应 multipart 表单的各字段）
#[derive(Debug, Clone)]
pub struct ChunkUploadRequest {
    /// 本次上传的文件ID，同一次上传的所有分片相同
    pub file_id: String,
    /// 分片序号（从 0 开始）
    pub chunk_index: usize,
    /// 总分片数
    pub total_chunks: usize,
    /// 原始文件名
    pub file_name: String,
    /// 文件总大小（字节）
    pub file_size: u64,
    /// 分片数据
    pub data: Vec<u8>,
}

/// 上传分片响应
///
/// 响应示例:
/// ```json
/// {
///   "status": "success",
///   "progress": 100,
///   "file_url": "https://cdn.example.com/videos/abc.mp4",
///   "unique_id": "abc"
/// }
/// ```
/// `file_url` / `unique_id` 只在最后一个分片合并完成后返回
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadChunkResponse {
    /// 状态（"success" 表示成功，其余均视为失败）
    #[serde(default)]
    pub status: String,

    /// 后端计算的进度（部分后端版本返回）
    #[serde(default)]
    pub progress: Option<f64>,

    /// 播放地址
    #[serde(default)]
    pub file_url: Option<String>,

    /// 资源永久ID
    #[serde(default)]
    pub unique_id: Option<String>,
}

impl UploadChunkResponse {
    pub const STATUS_SUCCESS: &'static str = "success";

    /// 是否成功
    pub fn is_success(&self) -> bool {
        self.status == Self::STATUS_SUCCESS
    }

    /// 播放地址（空字符串视为没有）
    pub fn playback_url(&self) -> Option<&str> {
        self.file_url.as_deref().filter(|url| !url.is_empty())
    }

    /// 资源ID（空字符串视为没有）
    pub fn resource_id(&self) -> Option<&str> {
        self.unique_id.as_deref().filter(|id| !id.is_empty())
    }
}

// =====================================================
// 上传历史
// =====================================================

/// 上传历史记录
///
/// `/api/file-uploads/` 与 `/api/recent-uploads/` 共用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    /// 资源ID（也用于播放、分享、删除）
    pub file_id: String,

    /// 文件名
    pub file_name: String,

    /// 状态（如 "Completed"）
    #[serde(default)]
    pub status: String,

    /// 文件大小（字节）
    #[serde(default)]
    pub file_size: u64,

    /// 上传时间（仅最近上传接口返回）
    #[serde(default, rename = "uploadDate", skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,
}

impl UploadRecord {
    pub const STATUS_COMPLETED: &'static str = "Completed";

    /// 是否已完成
    pub fn is_completed(&self) -> bool {
        self.status == Self::STATUS_COMPLETED
    }

    /// 文件大小（MB，保留两位小数）
    pub fn size_mb(&self) -> String {
        format_size_mb(self.file_size)
    }
}

/// 字节数转换为 MB 字符串，保留两位小数
pub fn format_size_mb(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / 1024.0 / 1024.0)
}

// =====================================================
// 错误类型
// =====================================================

/// 后端请求错误
#[derive(Debug, Error)]
pub enum BackendError {
    /// 网络错误（连接失败、超时等）
    #[error("网络请求失败: {0}")]
    Network(#[from] reqwest::Error),

    /// HTTP 状态码异常
    #[error("HTTP 状态异常: {status}")]
    HttpStatus { status: u16, body: String },

    /// 后端返回了非 success 状态
    #[error("后端拒绝请求: http_status={http_status}, status={status:?}")]
    Rejected { http_status: u16, status: String },

    /// 响应无法解析
    #[error("响应格式错误: http_status={http_status}, {reason}")]
    Malformed {
        http_status: u16,
        body: String,
        reason: String,
    },

    /// 本地文件读写失败
    #[error("本地文件读写失败: {0}")]
    Io(#[from] std::io::Error),

    /// 后端地址无效
    #[error("无效的后端地址: {0}")]
    InvalidUrl(String),
}

impl BackendError {
    /// 错误分类
    pub fn kind(&self) -> UploadErrorKind {
        match self {
            BackendError::Network(e) if e.is_timeout() => UploadErrorKind::Timeout,
            BackendError::Network(_) => UploadErrorKind::Network,
            BackendError::HttpStatus { status, .. } => UploadErrorKind::from_http_status(*status)
                .unwrap_or(UploadErrorKind::Client),
            BackendError::Rejected { http_status, .. } => {
                UploadErrorKind::from_http_status(*http_status).unwrap_or(UploadErrorKind::Rejected)
            }
            BackendError::Malformed { http_status, .. } => {
                UploadErrorKind::from_http_status(*http_status)
                    .unwrap_or(UploadErrorKind::Malformed)
            }
            BackendError::Io(_) => UploadErrorKind::Local,
            BackendError::InvalidUrl(_) => UploadErrorKind::Client,
        }
    }

    /// HTTP 状态码（如果有）
    pub fn http_status(&self) -> Option<u16> {
        match self {
            BackendError::Network(e) => e.status().map(|s| s.as_u16()),
            BackendError::HttpStatus { status, .. } => Some(*status),
            BackendError::Rejected { http_status, .. }
            | BackendError::Malformed { http_status, .. } => Some(*http_status),
            BackendError::Io(_) | BackendError::InvalidUrl(_) => None,
        }
    }
}

/// 上传错误类型
///
/// 分片上传的任何失败都会重试，分类只影响日志和退避时间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadErrorKind {
    /// 网络错误
    Network,
    /// 超时
    Timeout,
    /// 限流（启用退避时等待更久）
    RateLimited,
    /// 服务器错误
    ServerError,
    /// 后端返回非 success
    Rejected,
    /// 响应无法解析
    Malformed,
    /// 其他 4xx
    Client,
    /// 本地错误
    Local,
}

impl UploadErrorKind {
    /// 从 HTTP 状态码推断，2xx 返回 None
    pub fn from_http_status(status: u16) -> Option<Self> {
        match status {
            429 => Some(UploadErrorKind::RateLimited),
            500..=599 => Some(UploadErrorKind::ServerError),
            400..=499 => Some(UploadErrorKind::Client),
            _ => None,
        }
    }
}
