// 上传会话
//
// 一次上传对应一个会话，会话只由当前上传流程持有：
// 创建后交给分发器，结束后按值返回

use crate::backend::UploadChunkResponse;
use crate::error::ClientError;
use crate::uploader::progress::{next_percent, ProgressSource};
use crate::uploader::{ChunkRange, ChunkSplitter};
use serde::Serialize;
use uuid::Uuid;

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// 未开始
    Idle,
    /// 上传中
    Active,
    /// 全部分片上传成功
    Succeeded,
    /// 某个分片重试耗尽
    Failed { chunk_index: usize },
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Succeeded | SessionState::Failed { .. })
    }
}

/// 单次失败后的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// 继续重试同一个分片，`attempt` 为已失败次数
    Retry { attempt: u32 },
    /// 重试耗尽，会话已进入 Failed
    Exhausted { attempts: u32 },
}

/// 上传会话
#[derive(Debug, Clone, Serialize)]
pub struct UploadSession {
    /// 文件ID（每次上传新生成）
    file_id: String,
    /// 文件名
    file_name: String,
    /// 文件大小
    file_size: u64,
    /// 分片大小
    chunk_size: u64,
    #[serde(skip)]
    splitter: ChunkSplitter,
    /// 总分片数
    total_chunks: usize,
    /// 当前分片索引（即已确认的分片数）
    current_chunk_index: usize,
    /// 当前分片已失败次数
    attempts_for_current_chunk: u32,
    /// 单个分片最多尝试次数
    max_attempts: u32,
    /// 进度 0-100
    progress_percent: u8,
    /// 资源ID（最后一个分片返回）
    result_resource_id: Option<String>,
    /// 播放地址（最后一个分片返回）
    result_playback_url: Option<String>,
    /// 状态
    state: SessionState,
    /// 创建时间 (Unix timestamp)
    created_at: i64,
    /// 开始时间 (Unix timestamp)
    started_at: Option<i64>,
    /// 结束时间 (Unix timestamp)
    completed_at: Option<i64>,
    /// 最后一次失败的错误信息
    error: Option<String>,
}

impl UploadSession {
    /// 创建新的上传会话
    pub fn new(
        file_name: impl Into<String>,
        file_size: u64,
        chunk_size: u64,
        max_attempts: u32,
    ) -> Result<Self, ClientError> {
        if max_attempts == 0 {
            return Err(ClientError::InvalidInput(
                "分片最大尝试次数必须大于 0".to_string(),
            ));
        }
        let splitter = ChunkSplitter::new(file_size, chunk_size)?;

        Ok(Self {
            file_id: Uuid::new_v4().to_string(),
            file_name: file_name.into(),
            file_size,
            chunk_size,
            splitter,
            total_chunks: splitter.total_chunks(),
            current_chunk_index: 0,
            attempts_for_current_chunk: 0,
            max_attempts,
            progress_percent: 0,
            result_resource_id: None,
            result_playback_url: None,
            state: SessionState::Idle,
            created_at: chrono::Utc::now().timestamp(),
            started_at: None,
            completed_at: None,
            error: None,
        })
    }

    /// Idle -> Active
    pub fn activate(&mut self) -> Result<(), ClientError> {
        if self.state != SessionState::Idle {
            return Err(ClientError::InvalidState(format!(
                "只有未开始的会话可以启动，当前状态: {:?}",
                self.state
            )));
        }
        self.state = SessionState::Active;
        self.current_chunk_index = 0;
        self.attempts_for_current_chunk = 0;
        self.started_at = Some(chrono::Utc::now().timestamp());
        Ok(())
    }

    /// 当前待上传的分片，非 Active 状态返回 None
    pub fn current_chunk(&self) -> Option<ChunkRange> {
        if self.state != SessionState::Active {
            return None;
        }
        self.splitter.range(self.current_chunk_index)
    }

    /// 当前分片上传成功
    pub fn acknowledge_chunk(
        &mut self,
        response: &UploadChunkResponse,
        source: ProgressSource,
    ) -> Result<(), ClientError> {
        self.ensure_active("确认分片")?;

        self.current_chunk_index += 1;
        self.attempts_for_current_chunk = 0;
        self.progress_percent = next_percent(
            source,
            self.progress_percent,
            self.current_chunk_index,
            self.total_chunks,
            response.progress,
        );

        if let Some(id) = response.resource_id() {
            self.result_resource_id = Some(id.to_string());
        }
        if let Some(url) = response.playback_url() {
            self.result_playback_url = Some(url.to_string());
        }

        if self.current_chunk_index >= self.total_chunks {
            self.progress_percent = 100;
            self.state = SessionState::Succeeded;
            self.completed_at = Some(chrono::Utc::now().timestamp());
        }

        Ok(())
    }

    /// 当前分片上传失败一次
    pub fn record_failed_attempt(&mut self, error: &str) -> Result<AttemptOutcome, ClientError> {
        self.ensure_active("记录失败")?;

        self.attempts_for_current_chunk += 1;
        self.error = Some(error.to_string());

        if self.attempts_for_current_chunk >= self.max_attempts {
            self.state = SessionState::Failed {
                chunk_index: self.current_chunk_index,
            };
            self.completed_at = Some(chrono::Utc::now().timestamp());
            Ok(AttemptOutcome::Exhausted {
                attempts: self.attempts_for_current_chunk,
            })
        } else {
            Ok(AttemptOutcome::Retry {
                attempt: self.attempts_for_current_chunk,
            })
        }
    }

    fn ensure_active(&self, action: &str) -> Result<(), ClientError> {
        if self.state == SessionState::Active {
            Ok(())
        } else {
            Err(ClientError::InvalidState(format!(
                "{}: 会话未处于上传中，当前状态: {:?}",
                action, self.state
            )))
        }
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn splitter(&self) -> &ChunkSplitter {
        &self.splitter
    }

    pub fn total_chunks(&self) -> usize {
        self.total_chunks
    }

    pub fn current_chunk_index(&self) -> usize {
        self.current_chunk_index
    }

    pub fn attempts_for_current_chunk(&self) -> u32 {
        self.attempts_for_current_chunk
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    pub fn result_resource_id(&self) -> Option<&str> {
        self.result_resource_id.as_deref()
    }

    pub fn result_playback_url(&self) -> Option<&str> {
        self.result_playback_url.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn started_at(&self) -> Option<i64> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<i64> {
        self.completed_at
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
