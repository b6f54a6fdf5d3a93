// 分片上传模块
//
// - 分片切分与数据读取（chunk）
// - 上传会话状态机（session）
// - 顺序分发与重试（engine, retry）
// - 进度计算（progress）
// - 单任务上传流程（manager）

pub mod chunk;
pub mod engine;
pub mod manager;
pub mod progress;
pub mod retry;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use chunk::{
    ChunkIter, ChunkRange, ChunkSource, ChunkSplitter, FileChunkSource, MemoryChunkSource,
    DEFAULT_CHUNK_SIZE,
};
pub use engine::{ChunkUploader, UploadEngine};
pub use manager::{UploadManager, UploadOutcome};
pub use progress::{ProgressReport, ProgressSource};
pub use retry::{calculate_backoff_delay, RetryPolicy, DEFAULT_MAX_ATTEMPTS};
pub use session::{AttemptOutcome, SessionState, UploadSession};
