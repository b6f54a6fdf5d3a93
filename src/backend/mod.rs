// 视频分享后端 API 模块

pub mod client;
pub mod endpoints;
pub mod types;

#[cfg(test)]
pub(crate) mod test_stub;

pub use client::BackendClient;
pub use endpoints::{share_link, Endpoints};
pub use types::{
    format_size_mb, BackendError, ChunkUploadRequest, UploadChunkResponse, UploadErrorKind,
    UploadRecord,
};
