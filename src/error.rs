// 客户端错误类型
//
// 错误在发生处处理：分发器或请求调用方
// - 单次分片失败在分发器内部重试，只以事件形式对外可见
// - 重试耗尽、删除失败等需要用户感知的错误向上返回
// - 被动的后台拉取（历史列表）失败只记录日志

use crate::backend::BackendError;
use thiserror::Error;

/// 客户端错误
#[derive(Debug, Error)]
pub enum ClientError {
    /// 输入无效（未选择文件、空文件、分片大小为 0 等），上传不会开始
    #[error("无效输入: {0}")]
    InvalidInput(String),

    /// 单次分片上传失败，分发器会在本地重试
    #[error("分片 #{chunk_index} 第 {attempt} 次上传失败: {source}")]
    ChunkUploadTransientFailure {
        chunk_index: usize,
        attempt: u32,
        #[source]
        source: BackendError,
    },

    /// 分片重试次数耗尽，上传中止（后端已收到的分片不做清理）
    #[error("分片 #{chunk_index} 上传失败，已尝试 {attempts} 次: {message}")]
    ChunkUploadExhausted {
        file_id: String,
        chunk_index: usize,
        attempts: u32,
        message: String,
    },

    /// 读取本地分片数据失败
    #[error("读取分片 #{chunk_index} 失败: {source}")]
    ChunkReadFailure {
        chunk_index: usize,
        #[source]
        source: std::io::Error,
    },

    /// 获取上传历史失败
    #[error("获取上传历史失败: {0}")]
    HistoryFetchFailure(#[source] BackendError),

    /// 删除视频失败
    #[error("删除视频 {id} 失败: {source}")]
    DeleteFailure {
        id: String,
        #[source]
        source: BackendError,
    },

    /// 视频不存在或无法获取播放地址
    #[error("视频不存在: {id}")]
    VideoNotFound { id: String },

    /// 下载视频失败
    #[error("下载视频 {id} 失败: {source}")]
    DownloadFailure {
        id: String,
        #[source]
        source: BackendError,
    },

    /// 已有上传正在进行
    #[error("已有上传任务正在进行，请等待完成")]
    UploadInProgress,

    /// 上传被放弃（会话已丢弃）
    #[error("上传已放弃")]
    Abandoned,

    /// 会话状态不允许该操作
    #[error("会话状态错误: {0}")]
    InvalidState(String),

    #[error("本地IO错误: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// 是否需要以阻塞提示的方式告知用户
    ///
    /// 单次分片失败和放弃上传不需要提示
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            ClientError::ChunkUploadTransientFailure { .. } | ClientError::Abandoned
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message_names_chunk() {
        let err = ClientError::ChunkUploadExhausted {
            file_id: "f".to_string(),
            chunk_index: 1,
            attempts: 3,
            message: "boom".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("#1"));
        assert!(msg.contains('3'));
        assert!(err.is_user_visible());
    }

    #[test]
    fn test_transient_failure_is_not_user_visible() {
        let err = ClientError::ChunkUploadTransientFailure {
            chunk_index: 0,
            attempt: 1,
            source: BackendError::Rejected {
                http_status: 200,
                status: "error".to_string(),
            },
        };
        assert!(!err.is_user_visible());
        assert!(!ClientError::Abandoned.is_user_visible());
        assert!(ClientError::InvalidInput("x".to_string()).is_user_visible());
    }
}
