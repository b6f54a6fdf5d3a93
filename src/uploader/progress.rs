// 上传进度计算

use crate::uploader::UploadSession;
use serde::{Deserialize, Serialize};

/// 进度来源
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressSource {
    /// 客户端按已确认分片数计算
    #[default]
    Client,
    /// 使用后端返回的 progress 字段，缺失时回退到客户端计算
    Backend,
}

/// 客户端计算的进度: floor(completed * 100 / total)
pub fn client_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total) as u64;
    (completed * 100 / total as u64) as u8
}

/// 计算分片确认后的新进度
///
/// 结果限制在 [0, 100]，且不小于 `previous`；全部分片确认后固定为 100
pub fn next_percent(
    source: ProgressSource,
    previous: u8,
    completed: usize,
    total: usize,
    backend_value: Option<f64>,
) -> u8 {
    if total > 0 && completed >= total {
        return 100;
    }

    let candidate = match source {
        ProgressSource::Client => client_percent(completed, total),
        ProgressSource::Backend => match backend_value.filter(|v| v.is_finite()) {
            Some(value) => value.clamp(0.0, 100.0).floor() as u8,
            None => client_percent(completed, total),
        },
    };

    candidate.max(previous).min(100)
}

/// 进度快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressReport {
    /// 百分比 0-100
    pub percent: u8,
    /// 已确认分片数
    pub completed_chunks: usize,
    /// 总分片数
    pub total_chunks: usize,
    /// 已确认字节数
    pub uploaded_bytes: u64,
    /// 文件总大小
    pub total_bytes: u64,
}

/// 从会话生成进度快照
pub fn report(session: &UploadSession) -> ProgressReport {
    let completed_chunks = session.current_chunk_index();
    let uploaded_bytes = (completed_chunks as u64)
        .saturating_mul(session.chunk_size())
        .min(session.file_size());

    ProgressReport {
        percent: session.progress_percent(),
        completed_chunks,
        total_chunks: session.total_chunks(),
        uploaded_bytes,
        total_bytes: session.file_size(),
    }
}
