// 视频分享后端客户端实现

use crate::backend::{
    BackendError, ChunkUploadRequest, Endpoints, UploadChunkResponse, UploadRecord,
};
use crate::config::BackendConfig;
use crate::uploader::ChunkUploader;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::cookie::Jar;
use reqwest::multipart;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// CSRF 请求头
const CSRF_HEADER: &str = "X-CSRFToken";
/// CSRF Cookie 名
const CSRF_COOKIE: &str = "csrftoken";
/// 错误信息中保留的响应体长度
const MAX_ERROR_BODY_CHARS: usize = 512;

/// 视频分享后端客户端
#[derive(Debug, Clone)]
pub struct BackendClient {
    /// HTTP客户端
    client: Client,
    /// 接口地址
    endpoints: Endpoints,
    /// CSRF Token
    csrf_token: Option<String>,
}

impl BackendClient {
    /// 创建新的后端客户端
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let endpoints = Endpoints::new(&config.backend_url);
        let base_url = endpoints
            .base()
            .parse::<reqwest::Url>()
            .map_err(|e| BackendError::InvalidUrl(format!("{}: {}", config.backend_url, e)))?;

        let jar = Arc::new(Jar::default());
        let csrf_token = config
            .csrf_token
            .clone()
            .filter(|token| !token.trim().is_empty());
        if let Some(ref token) = csrf_token {
            jar.add_cookie_str(&format!("{}={}; Path=/", CSRF_COOKIE, token), &base_url);
            debug!("已添加 CSRF Cookie");
        }

        // 播放地址依赖重定向，不能禁用
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        info!(
            "初始化后端客户端成功, backend={}, CSRF={}",
            endpoints.base(),
            if csrf_token.is_some() {
                "已设置"
            } else {
                "未设置"
            }
        );

        Ok(Self {
            client,
            endpoints,
            csrf_token,
        })
    }

    /// 接口地址
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// 上传单个分片
    ///
    /// 无论 HTTP 状态码如何都会解析响应体，只有 `status == "success"` 才算成功
    pub async fn post_chunk(
        &self,
        request: ChunkUploadRequest,
    ) -> Result<UploadChunkResponse, BackendError> {
        let ChunkUploadRequest {
            file_id,
            chunk_index,
            total_chunks,
            file_name,
            file_size,
            data,
        } = request;

        debug!(
            "[分片#{}] 上传: file_id={}, total={}, size={}",
            chunk_index,
            file_id,
            total_chunks,
            data.len()
        );

        let part = multipart::Part::bytes(data)
            .file_name("blob")
            .mime_str("application/octet-stream")?;

        let form = multipart::Form::new()
            .part("chunk", part)
            .text("chunkIndex", chunk_index.to_string())
            .text("totalChunks", total_chunks.to_string())
            .text("fileId", file_id)
            .text("fileName", file_name)
            .text("fileSize", file_size.to_string());

        let mut builder = self.client.post(self.endpoints.upload_chunk()).multipart(form);
        if let Some(ref token) = self.csrf_token {
            builder = builder.header(CSRF_HEADER, token);
        }

        let response = builder.send().await?;
        let http_status = response.status().as_u16();
        let body = response.text().await?;

        debug!(
            "[分片#{}] 响应: status={}, body={}",
            chunk_index,
            http_status,
            truncate_body(&body)
        );

        let parsed: UploadChunkResponse =
            serde_json::from_str(&body).map_err(|e| BackendError::Malformed {
                http_status,
                body: truncate_body(&body),
                reason: e.to_string(),
            })?;

        if !parsed.is_success() {
            return Err(BackendError::Rejected {
                http_status,
                status: parsed.status,
            });
        }

        Ok(parsed)
    }

    /// 获取全部上传历史
    pub async fn list_file_uploads(&self) -> Result<Vec<UploadRecord>, BackendError> {
        self.get_json(&self.endpoints.file_uploads()).await
    }

    /// 获取最近上传
    pub async fn list_recent_uploads(&self) -> Result<Vec<UploadRecord>, BackendError> {
        self.get_json(&self.endpoints.recent_uploads()).await
    }

    /// 解析播放地址（跟随重定向后的最终地址）
    pub async fn resolve_stream_url(&self, id: &str) -> Result<String, BackendError> {
        let response = self.client.get(self.endpoints.stream(id)).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::HttpStatus {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let url = response.url().to_string();
        debug!("播放地址: id={}, url={}", id, url);
        Ok(url)
    }

    /// 下载视频到本地文件，返回写入的字节数
    pub async fn download_video(&self, id: &str, dest: &Path) -> Result<u64, BackendError> {
        let response = self.client.get(self.endpoints.download(id)).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::HttpStatus {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        info!("下载完成: id={}, path={:?}, size={}", id, dest, written);
        Ok(written)
    }

    /// 删除视频
    pub async fn delete_video(&self, id: &str) -> Result<(), BackendError> {
        let mut builder = self.client.get(self.endpoints.delete_video(id));
        if let Some(ref token) = self.csrf_token {
            builder = builder.header(CSRF_HEADER, token);
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("删除视频失败: id={}, status={}", id, status);
            return Err(BackendError::HttpStatus {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        info!("删除视频成功: id={}", id);
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, BackendError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let http_status = status.as_u16();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(BackendError::HttpStatus {
                status: http_status,
                body: truncate_body(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| BackendError::Malformed {
            http_status,
            body: truncate_body(&body),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ChunkUploader for BackendClient {
    async fn upload_chunk(
        &self,
        request: ChunkUploadRequest,
    ) -> Result<UploadChunkResponse, BackendError> {
        self.post_chunk(request).await
    }
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        body.to_string()
    } else {
        let mut truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        truncated.push('…');
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::test_stub::{self, StubBackend};
    use crate::backend::UploadErrorKind;

    fn client_for(stub: &StubBackend, csrf: Option<&str>) -> BackendClient {
        let config = BackendConfig {
            backend_url: stub.base_url.clone(),
            csrf_token: csrf.map(str::to_string),
            request_timeout_secs: 10,
            ..BackendConfig::default()
        };
        BackendClient::new(&config).unwrap()
    }

    fn request(file_name: &str, index: usize, total: usize, data: Vec<u8>) -> ChunkUploadRequest {
        ChunkUploadRequest {
            file_id: "fid-1".to_string(),
            chunk_index: index,
            total_chunks: total,
            file_name: file_name.to_string(),
            file_size: 1234,
            data,
        }
    }

    #[test]
    fn test_invalid_backend_url() {
        let config = BackendConfig {
            backend_url: "not a url".to_string(),
            ..BackendConfig::default()
        };
        assert!(matches!(
            BackendClient::new(&config),
            Err(BackendError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short"), "short");
        let long = "x".repeat(MAX_ERROR_BODY_CHARS + 10);
        assert_eq!(truncate_body(&long).chars().count(), MAX_ERROR_BODY_CHARS + 1);
    }

    #[tokio::test]
    async fn test_upload_chunk_multipart_fields() {
        let stub = test_stub::spawn().await;
        let client = client_for(&stub, Some("tok123"));

        let resp = client
            .post_chunk(request("movie.mp4", 0, 2, vec![7u8; 1000]))
            .await
            .unwrap();
        assert!(resp.is_success());
        assert!(resp.resource_id().is_none());

        let received = stub.received();
        assert_eq!(received.len(), 1);
        let chunk = &received[0];
        assert_eq!(chunk.field("chunkIndex"), Some("0"));
        assert_eq!(chunk.field("totalChunks"), Some("2"));
        assert_eq!(chunk.field("fileId"), Some("fid-1"));
        assert_eq!(chunk.field("fileName"), Some("movie.mp4"));
        assert_eq!(chunk.field("fileSize"), Some("1234"));
        assert_eq!(chunk.chunk_file_name.as_deref(), Some("blob"));
        assert_eq!(chunk.chunk_len, 1000);
        assert_eq!(chunk.csrf_header.as_deref(), Some("tok123"));
        assert!(chunk
            .cookie
            .as_deref()
            .unwrap_or_default()
            .contains("csrftoken=tok123"));
    }

    #[tokio::test]
    async fn test_upload_last_chunk_returns_result() {
        let stub = test_stub::spawn().await;
        let client = client_for(&stub, None);

        let resp = client
            .post_chunk(request("movie.mp4", 1, 2, vec![1u8; 10]))
            .await
            .unwrap();
        assert_eq!(resp.resource_id(), Some("fid-1"));
        assert_eq!(
            resp.playback_url(),
            Some(format!("{}/media/fid-1.mp4", stub.base_url).as_str())
        );

        let received = stub.received();
        assert!(received[0].csrf_header.is_none());
    }

    #[tokio::test]
    async fn test_upload_rejected_status() {
        let stub = test_stub::spawn().await;
        let client = client_for(&stub, None);

        let err = client
            .post_chunk(request(test_stub::REJECT_FILE_NAME, 0, 1, vec![0u8; 4]))
            .await
            .unwrap_err();
        match err {
            BackendError::Rejected {
                http_status,
                status,
            } => {
                assert_eq!(http_status, 200);
                assert_eq!(status, "error");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upload_malformed_body() {
        let stub = test_stub::spawn().await;
        let client = client_for(&stub, None);

        let err = client
            .post_chunk(request(test_stub::MALFORMED_FILE_NAME, 0, 1, vec![0u8; 4]))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Malformed { http_status: 500, .. }));
        assert_eq!(err.kind(), UploadErrorKind::ServerError);
    }

    #[tokio::test]
    async fn test_list_history_and_recent() {
        let stub = test_stub::spawn().await;
        let client = client_for(&stub, None);

        let records = client.list_file_uploads().await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].file_id, "a1");
        assert!(records[0].is_completed());

        let recent = client.list_recent_uploads().await.unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent[0].upload_date.is_some());
    }

    #[tokio::test]
    async fn test_history_unreachable_backend() {
        let config = BackendConfig {
            backend_url: "http://127.0.0.1:1".to_string(),
            request_timeout_secs: 5,
            ..BackendConfig::default()
        };
        let client = BackendClient::new(&config).unwrap();
        let err = client.list_file_uploads().await.unwrap_err();
        assert!(matches!(err, BackendError::Network(_)));
    }

    #[tokio::test]
    async fn test_delete_video() {
        let stub = test_stub::spawn().await;
        let client = client_for(&stub, Some("tok"));

        client.delete_video("a1").await.unwrap();
        assert_eq!(stub.deleted(), vec!["a1".to_string()]);

        let err = client
            .delete_video(test_stub::MISSING_ID)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::HttpStatus { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_resolve_stream_url_follows_redirect() {
        let stub = test_stub::spawn().await;
        let client = client_for(&stub, None);

        let url = client.resolve_stream_url("abc").await.unwrap();
        assert_eq!(url, format!("{}/media/abc.mp4", stub.base_url));

        let err = client
            .resolve_stream_url(test_stub::MISSING_ID)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_upload_manager_against_backend() {
        use crate::config::UploadConfig;
        use crate::uploader::{MemoryChunkSource, SessionState, UploadManager};

        let stub = test_stub::spawn().await;
        let client = Arc::new(client_for(&stub, Some("tok")));
        let config = UploadConfig {
            chunk_size_mb: 1,
            ..UploadConfig::default()
        };
        let manager = UploadManager::new(client, config, "http://localhost:3000");

        let source = MemoryChunkSource::new(vec![9u8; 2_621_440]);
        let outcome = manager
            .start_upload_from_source("movie.mp4", source.len(), &source)
            .await
            .unwrap();

        let session = &outcome.session;
        assert_eq!(session.state(), SessionState::Succeeded);
        assert_eq!(session.total_chunks(), 3);
        assert_eq!(session.result_resource_id(), Some(session.file_id()));
        assert_eq!(
            outcome.share_url,
            Some(format!("http://localhost:3000/video/{}", session.file_id()))
        );

        let received = stub.received();
        let indexes: Vec<&str> = received
            .iter()
            .filter_map(|c| c.field("chunkIndex"))
            .collect();
        assert_eq!(indexes, vec!["0", "1", "2"]);
        let sizes: Vec<usize> = received.iter().map(|c| c.chunk_len).collect();
        assert_eq!(sizes, vec![1_048_576, 1_048_576, 524_288]);
        assert!(received
            .iter()
            .all(|c| c.field("fileId") == Some(session.file_id())
                && c.field("fileSize") == Some("2621440")));
    }

    #[tokio::test]
    async fn test_download_video_to_file() {
        let stub = test_stub::spawn().await;
        let client = client_for(&stub, None);
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("out").join("abc.mp4");

        let written = client.download_video("abc", &dest).await.unwrap();
        assert_eq!(written, test_stub::DOWNLOAD_SIZE as u64);

        let content = std::fs::read(&dest).unwrap();
        assert_eq!(content, test_stub::download_body());
    }
}
