// 视频播放、下载与分享

use crate::backend::{share_link, BackendClient};
use crate::error::ClientError;
use std::path::Path;
use tracing::warn;

/// 单个视频的访问地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoLinks {
    /// 资源ID
    pub id: String,
    /// 播放地址（重定向后的最终地址）
    pub stream_url: String,
    /// 下载地址
    pub download_url: String,
    /// 分享链接
    pub share_url: String,
}

impl VideoLinks {
    /// 解析视频地址，播放地址不可用时视为视频不存在
    pub async fn resolve(
        client: &BackendClient,
        frontend_url: &str,
        id: &str,
    ) -> Result<Self, ClientError> {
        let stream_url = client.resolve_stream_url(id).await.map_err(|e| {
            warn!("获取播放地址失败: id={}, {}", id, e);
            ClientError::VideoNotFound { id: id.to_string() }
        })?;

        Ok(Self {
            id: id.to_string(),
            stream_url,
            download_url: client.endpoints().download(id),
            share_url: share_link(frontend_url, id),
        })
    }
}

/// 下载视频到本地文件，返回写入的字节数
pub async fn download_to_file(
    client: &BackendClient,
    id: &str,
    dest: &Path,
) -> Result<u64, ClientError> {
    client
        .download_video(id, dest)
        .await
        .map_err(|source| ClientError::DownloadFailure {
            id: id.to_string(),
            source,
        })
}
