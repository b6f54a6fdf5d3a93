// 上传管理器
//
// 展示层使用的上传流程控制：
// - 同一时间只允许一个上传
// - 每次上传新建会话（新的文件ID）
// - 结束后生成分享链接
// - 支持放弃正在进行的上传

use crate::backend::share_link;
use crate::config::UploadConfig;
use crate::error::ClientError;
use crate::events::{EventBus, UploadEvent};
use crate::uploader::{
    ChunkSource, ChunkUploader, FileChunkSource, RetryPolicy, SessionState, UploadEngine,
    UploadSession,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 上传结果
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// 结束状态的会话
    pub session: UploadSession,
    /// 分享链接（后端返回资源ID时才有）
    pub share_url: Option<String>,
}

/// 上传管理器
pub struct UploadManager<U: ChunkUploader> {
    /// 分片上传器
    uploader: Arc<U>,
    /// 上传配置
    config: UploadConfig,
    /// 前端地址
    frontend_url: String,
    /// 事件总线
    events: EventBus,
    /// 是否有上传正在进行
    uploading: AtomicBool,
    /// 当前上传的取消令牌
    active_token: Mutex<Option<CancellationToken>>,
}

impl<U: ChunkUploader> UploadManager<U> {
    pub fn new(uploader: Arc<U>, config: UploadConfig, frontend_url: impl Into<String>) -> Self {
        let events = EventBus::new(config.event_buffer);
        Self {
            uploader,
            config,
            frontend_url: frontend_url.into(),
            events,
            uploading: AtomicBool::new(false),
            active_token: Mutex::new(None),
        }
    }

    /// 订阅上传事件
    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.events.subscribe()
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.load(Ordering::Acquire)
    }

    /// 放弃当前上传，没有进行中的上传时返回 false
    pub fn abandon(&self) -> bool {
        match lock_token(&self.active_token).as_ref() {
            Some(token) => {
                info!("放弃当前上传");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// 上传本地文件
    pub async fn start_upload(&self, path: Option<&Path>) -> Result<UploadOutcome, ClientError> {
        let path = path.ok_or_else(|| ClientError::InvalidInput("请选择要上传的文件".to_string()))?;
        let guard = UploadingGuard::acquire(&self.uploading, &self.active_token)?;

        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(ClientError::InvalidInput(format!(
                "不是有效的文件: {}",
                path.display()
            )));
        }
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ClientError::InvalidInput(format!("无法获取文件名: {}", path.display()))
            })?;

        let source = FileChunkSource::new(path);
        self.run_upload(guard.token(), &file_name, metadata.len(), &source)
            .await
    }

    /// 从任意数据来源上传
    pub async fn start_upload_from_source<S>(
        &self,
        file_name: &str,
        file_size: u64,
        source: &S,
    ) -> Result<UploadOutcome, ClientError>
    where
        S: ChunkSource + ?Sized,
    {
        let guard = UploadingGuard::acquire(&self.uploading, &self.active_token)?;
        self.run_upload(guard.token(), file_name, file_size, source)
            .await
    }

    async fn run_upload<S>(
        &self,
        token: CancellationToken,
        file_name: &str,
        file_size: u64,
        source: &S,
    ) -> Result<UploadOutcome, ClientError>
    where
        S: ChunkSource + ?Sized,
    {
        let session = UploadSession::new(
            file_name,
            file_size,
            self.config.chunk_size_bytes(),
            self.config.max_attempts,
        )?;

        let engine = UploadEngine::new(
            Arc::clone(&self.uploader),
            RetryPolicy::from_config(&self.config),
            self.config.progress_source,
            self.events.clone(),
        )
        .with_cancel_token(token);

        let session = engine.run(session, source).await?;

        match session.state() {
            SessionState::Succeeded => {
                let share_url = session
                    .result_resource_id()
                    .map(|id| share_link(&self.frontend_url, id));
                if share_url.is_none() {
                    warn!("上传完成但后端未返回资源ID: file_id={}", session.file_id());
                }
                Ok(UploadOutcome { session, share_url })
            }
            SessionState::Failed { chunk_index } => {
                let err = ClientError::ChunkUploadExhausted {
                    file_id: session.file_id().to_string(),
                    chunk_index,
                    attempts: session.attempts_for_current_chunk(),
                    message: session.error().unwrap_or_default().to_string(),
                };
                error!("{}", err);
                Err(err)
            }
            state => Err(ClientError::InvalidState(format!(
                "上传结束时会话状态异常: {:?}",
                state
            ))),
        }
    }
}

fn lock_token(
    slot: &Mutex<Option<CancellationToken>>,
) -> MutexGuard<'_, Option<CancellationToken>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 上传中标记和取消令牌，离开作用域时一起清除
///
/// 标记在持有令牌锁时设置，看到上传中就一定能取消
struct UploadingGuard<'a> {
    flag: &'a AtomicBool,
    slot: &'a Mutex<Option<CancellationToken>>,
    token: CancellationToken,
}

impl<'a> UploadingGuard<'a> {
    fn acquire(
        flag: &'a AtomicBool,
        slot: &'a Mutex<Option<CancellationToken>>,
    ) -> Result<Self, ClientError> {
        let mut active = lock_token(slot);
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ClientError::UploadInProgress)?;
        let token = CancellationToken::new();
        *active = Some(token.clone());
        Ok(Self { flag, slot, token })
    }

    fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for UploadingGuard<'_> {
    fn drop(&mut self) {
        let mut active = lock_token(self.slot);
        *active = None;
        self.flag.store(false, Ordering::Release);
    }
}
