// 测试用的分片上传器

use crate::backend::{BackendError, ChunkUploadRequest, UploadChunkResponse};
use crate::uploader::ChunkUploader;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// 按脚本返回结果的上传器
///
/// - `fail_chunk(i, n)`: 分片 i 的前 n 次请求失败
/// - `backend_progress(i, v)`: 分片 i 成功时返回的 progress
/// - 最后一个分片成功时返回 `unique_id = "res-{fileId}"`
#[derive(Default)]
pub struct ScriptedUploader {
    failures: Mutex<HashMap<usize, u32>>,
    progress: Mutex<HashMap<usize, f64>>,
    calls: Mutex<Vec<(usize, String, usize)>>,
    delay: Option<Duration>,
}

impl ScriptedUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_chunk(self, index: usize, times: u32) -> Self {
        self.failures.lock().unwrap().insert(index, times);
        self
    }

    pub fn backend_progress(self, index: usize, value: f64) -> Self {
        self.progress.lock().unwrap().insert(index, value);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 每次请求的分片索引
    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().iter().map(|c| c.0).collect()
    }

    /// 每次请求的文件ID
    pub fn file_ids(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|c| c.1.clone()).collect()
    }

    /// 每次请求的数据长度
    pub fn sizes(&self) -> Vec<usize> {
        self.calls.lock().unwrap().iter().map(|c| c.2).collect()
    }
}

#[async_trait]
impl ChunkUploader for ScriptedUploader {
    async fn upload_chunk(
        &self,
        request: ChunkUploadRequest,
    ) -> Result<UploadChunkResponse, BackendError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().unwrap().push((
            request.chunk_index,
            request.file_id.clone(),
            request.data.len(),
        ));

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&request.chunk_index) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(BackendError::Rejected {
                        http_status: 200,
                        status: "error".to_string(),
                    });
                }
            }
        }

        let progress = self
            .progress
            .lock()
            .unwrap()
            .get(&request.chunk_index)
            .copied();

        let mut response = UploadChunkResponse {
            status: "success".to_string(),
            progress,
            ..UploadChunkResponse::default()
        };
        if request.chunk_index + 1 == request.total_chunks {
            response.unique_id = Some(format!("res-{}", request.file_id));
            response.file_url = Some(format!("https://cdn.test/{}.mp4", request.file_id));
        }
        Ok(response)
    }
}
