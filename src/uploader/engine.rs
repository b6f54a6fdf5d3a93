// 上传引擎
//
// 核心功能：
// 1. 按顺序逐个上传分片，上一个分片确认成功后才发送下一个
// 2. 单个分片失败时原地重试，超过最大次数后会话进入 Failed
// 3. 每次分片确认后更新进度并发布事件
//
// 取消：取消令牌触发后立即停止发送，已上传到后端的分片不做清理

use crate::backend::{BackendError, ChunkUploadRequest, UploadChunkResponse};
use crate::error::ClientError;
use crate::events::{EventBus, UploadEvent};
use crate::uploader::progress::{self, ProgressSource};
use crate::uploader::retry::RetryPolicy;
use crate::uploader::session::{AttemptOutcome, UploadSession};
use crate::uploader::ChunkSource;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 分片上传接口
#[async_trait]
pub trait ChunkUploader: Send + Sync {
    /// 上传一个分片
    async fn upload_chunk(
        &self,
        request: ChunkUploadRequest,
    ) -> Result<UploadChunkResponse, BackendError>;
}

/// 上传引擎
///
/// 负责驱动单个会话从 Active 到结束状态
pub struct UploadEngine<U: ChunkUploader> {
    /// 分片上传器
    uploader: Arc<U>,
    /// 重试策略
    policy: RetryPolicy,
    /// 进度来源
    progress_source: ProgressSource,
    /// 事件总线
    events: EventBus,
    /// 取消令牌
    cancel_token: CancellationToken,
}

impl<U: ChunkUploader> UploadEngine<U> {
    pub fn new(
        uploader: Arc<U>,
        policy: RetryPolicy,
        progress_source: ProgressSource,
        events: EventBus,
    ) -> Self {
        Self {
            uploader,
            policy,
            progress_source,
            events,
            cancel_token: CancellationToken::new(),
        }
    }

    /// 使用外部的取消令牌
    pub fn with_cancel_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = cancel_token;
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// 上传会话中的全部分片
    ///
    /// 返回结束状态（Succeeded 或 Failed）的会话；
    /// 读取本地数据失败返回 `ChunkReadFailure`，被取消返回 `Abandoned`
    pub async fn run<S>(
        &self,
        mut session: UploadSession,
        source: &S,
    ) -> Result<UploadSession, ClientError>
    where
        S: ChunkSource + ?Sized,
    {
        if session.max_attempts() != self.policy.max_attempts {
            return Err(ClientError::InvalidState(format!(
                "会话最大尝试次数 {} 与重试策略 {} 不一致",
                session.max_attempts(),
                self.policy.max_attempts
            )));
        }
        session.activate()?;

        info!(
            "开始上传: file_id={}, name={}, size={}, chunks={}",
            session.file_id(),
            session.file_name(),
            session.file_size(),
            session.total_chunks()
        );
        self.events.publish(UploadEvent::Started {
            file_id: session.file_id().to_string(),
            file_name: session.file_name().to_string(),
            file_size: session.file_size(),
            total_chunks: session.total_chunks(),
        });

        while let Some(chunk) = session.current_chunk() {
            if self.cancel_token.is_cancelled() {
                return Err(self.abandon(&session));
            }

            let data = match source.read_chunk(&chunk).await {
                Ok(data) => data,
                Err(e) => {
                    error!("[分片#{}] 读取本地数据失败: {}", chunk.index, e);
                    self.events.publish(UploadEvent::Failed {
                        file_id: session.file_id().to_string(),
                        chunk_index: chunk.index,
                        attempts: session.attempts_for_current_chunk(),
                        error: e.to_string(),
                    });
                    return Err(ClientError::ChunkReadFailure {
                        chunk_index: chunk.index,
                        source: e,
                    });
                }
            };

            loop {
                let request = ChunkUploadRequest {
                    file_id: session.file_id().to_string(),
                    chunk_index: chunk.index,
                    total_chunks: session.total_chunks(),
                    file_name: session.file_name().to_string(),
                    file_size: session.file_size(),
                    data: data.clone(),
                };

                let result = tokio::select! {
                    biased;
                    _ = self.cancel_token.cancelled() => {
                        return Err(self.abandon(&session));
                    }
                    result = self.uploader.upload_chunk(request) => result,
                };

                match result.and_then(ensure_success) {
                    Ok(response) => {
                        session.acknowledge_chunk(&response, self.progress_source)?;
                        let report = progress::report(&session);
                        debug!(
                            "[分片#{}] 上传成功, 进度 {}% ({}/{})",
                            chunk.index,
                            report.percent,
                            report.completed_chunks,
                            report.total_chunks
                        );
                        self.events.publish(UploadEvent::Progress {
                            file_id: session.file_id().to_string(),
                            completed_chunks: report.completed_chunks,
                            total_chunks: report.total_chunks,
                            uploaded_bytes: report.uploaded_bytes,
                            progress: report.percent,
                        });
                        break;
                    }
                    Err(err) => {
                        let kind = err.kind();
                        let message = err.to_string();

                        match session.record_failed_attempt(&message)? {
                            AttemptOutcome::Retry { attempt } => {
                                let failure = ClientError::ChunkUploadTransientFailure {
                                    chunk_index: chunk.index,
                                    attempt,
                                    source: err,
                                };
                                warn!(
                                    "[分片#{}] {} (kind={:?}, {}/{})",
                                    chunk.index,
                                    failure,
                                    kind,
                                    attempt,
                                    self.policy.max_attempts
                                );
                                self.events.publish(UploadEvent::ChunkRetry {
                                    file_id: session.file_id().to_string(),
                                    chunk_index: chunk.index,
                                    attempt,
                                    max_attempts: self.policy.max_attempts,
                                    error: message,
                                });

                                if let Some(delay) = self.policy.delay_before_retry(attempt, kind) {
                                    debug!("[分片#{}] 等待 {:?} 后重试", chunk.index, delay);
                                    tokio::select! {
                                        biased;
                                        _ = self.cancel_token.cancelled() => {
                                            return Err(self.abandon(&session));
                                        }
                                        _ = tokio::time::sleep(delay) => {}
                                    }
                                }
                            }
                            AttemptOutcome::Exhausted { attempts } => {
                                error!(
                                    "[分片#{}] 重试次数耗尽 ({}次), 上传失败: file_id={}, 错误: {}",
                                    chunk.index,
                                    attempts,
                                    session.file_id(),
                                    message
                                );
                                self.events.publish(UploadEvent::Failed {
                                    file_id: session.file_id().to_string(),
                                    chunk_index: chunk.index,
                                    attempts,
                                    error: message,
                                });
                                return Ok(session);
                            }
                        }
                    }
                }
            }
        }

        info!(
            "上传完成: file_id={}, resource_id={:?}",
            session.file_id(),
            session.result_resource_id()
        );
        self.events.publish(UploadEvent::Completed {
            file_id: session.file_id().to_string(),
            resource_id: session.result_resource_id().map(str::to_string),
            playback_url: session.result_playback_url().map(str::to_string),
            completed_at: session
                .completed_at()
                .unwrap_or_else(|| chrono::Utc::now().timestamp()),
        });

        Ok(session)
    }

    fn abandon(&self, session: &UploadSession) -> ClientError {
        warn!(
            "上传已放弃: file_id={}, 已确认分片 {}/{}",
            session.file_id(),
            session.current_chunk_index(),
            session.total_chunks()
        );
        ClientError::Abandoned
    }
}

/// 非 success 的响应按失败处理
fn ensure_success(response: UploadChunkResponse) -> Result<UploadChunkResponse, BackendError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(BackendError::Rejected {
            http_status: 200,
            status: response.status,
        })
    }
}
