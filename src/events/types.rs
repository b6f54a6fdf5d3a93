//! 上传事件类型定义
//!
//! 展示层通过订阅这些事件观察上传会话的变化

use serde::{Deserialize, Serialize};

/// 上传事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum UploadEvent {
    /// 上传开始
    Started {
        file_id: String,
        file_name: String,
        file_size: u64,
        total_chunks: usize,
    },
    /// 分片失败，即将重试
    ChunkRetry {
        file_id: String,
        chunk_index: usize,
        attempt: u32,
        max_attempts: u32,
        error: String,
    },
    /// 分片确认后的进度
    Progress {
        file_id: String,
        completed_chunks: usize,
        total_chunks: usize,
        uploaded_bytes: u64,
        progress: u8,
    },
    /// 上传完成
    Completed {
        file_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resource_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        playback_url: Option<String>,
        completed_at: i64,
    },
    /// 上传失败
    Failed {
        file_id: String,
        chunk_index: usize,
        attempts: u32,
        error: String,
    },
}

impl UploadEvent {
    /// 获取文件ID
    pub fn file_id(&self) -> &str {
        match self {
            UploadEvent::Started { file_id, .. }
            | UploadEvent::ChunkRetry { file_id, .. }
            | UploadEvent::Progress { file_id, .. }
            | UploadEvent::Completed { file_id, .. }
            | UploadEvent::Failed { file_id, .. } => file_id,
        }
    }

    /// 是否为结束事件
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadEvent::Completed { .. } | UploadEvent::Failed { .. }
        )
    }
}
