// 上传分片管理
//
// 分片规则：
// - 默认分片大小 5MB，最后一个分片可以更小
// - 分片数 = ceil(文件大小 / 分片大小)
// - 分片按需计算，不预先分配分片列表

use crate::error::ClientError;
use async_trait::async_trait;
use std::io::{Read, Seek, SeekFrom};
use std::iter::FusedIterator;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 默认上传分片大小: 5MB
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// 上传分片信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRange {
    /// 分片索引
    pub index: usize,
    /// 字节范围 [start, end)
    pub range: Range<u64>,
}

impl ChunkRange {
    /// 分片大小
    pub fn size(&self) -> u64 {
        self.range.end - self.range.start
    }
}

/// 分片切分器
///
/// 只保存文件大小和分片大小，每次 `iter()` 都从头生成分片序列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSplitter {
    file_size: u64,
    chunk_size: u64,
}

impl ChunkSplitter {
    /// 创建切分器，文件大小或分片大小为 0 时返回 `InvalidInput`
    pub fn new(file_size: u64, chunk_size: u64) -> Result<Self, ClientError> {
        if file_size == 0 {
            return Err(ClientError::InvalidInput("文件为空".to_string()));
        }
        if chunk_size == 0 {
            return Err(ClientError::InvalidInput("分片大小必须大于 0".to_string()));
        }
        Ok(Self {
            file_size,
            chunk_size,
        })
    }

    /// 使用默认分片大小（5MB）
    pub fn with_default_chunk_size(file_size: u64) -> Result<Self, ClientError> {
        Self::new(file_size, DEFAULT_CHUNK_SIZE)
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// 分片数量
    pub fn total_chunks(&self) -> usize {
        self.file_size.div_ceil(self.chunk_size) as usize
    }

    /// 获取指定分片，越界返回 None
    pub fn range(&self, index: usize) -> Option<ChunkRange> {
        if index >= self.total_chunks() {
            return None;
        }
        let start = index as u64 * self.chunk_size;
        let end = (start + self.chunk_size).min(self.file_size);
        Some(ChunkRange {
            index,
            range: start..end,
        })
    }

    /// 从第一个分片开始迭代
    pub fn iter(&self) -> ChunkIter {
        ChunkIter {
            splitter: *self,
            next: 0,
            total: self.total_chunks(),
        }
    }
}

impl<'a> IntoIterator for &'a ChunkSplitter {
    type Item = ChunkRange;
    type IntoIter = ChunkIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// 分片迭代器
#[derive(Debug, Clone)]
pub struct ChunkIter {
    splitter: ChunkSplitter,
    next: usize,
    total: usize,
}

impl Iterator for ChunkIter {
    type Item = ChunkRange;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.splitter.range(self.next)?;
        self.next += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total.saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChunkIter {}

impl FusedIterator for ChunkIter {}

// =====================================================
// 分片数据来源
// =====================================================

/// 分片数据来源
#[async_trait]
pub trait ChunkSource: Send + Sync {
    /// 读取一个分片的数据
    async fn read_chunk(&self, chunk: &ChunkRange) -> std::io::Result<Vec<u8>>;
}

/// 本地文件
#[derive(Debug, Clone)]
pub struct FileChunkSource {
    path: PathBuf,
}

impl FileChunkSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ChunkSource for FileChunkSource {
    async fn read_chunk(&self, chunk: &ChunkRange) -> std::io::Result<Vec<u8>> {
        let path = self.path.clone();
        let start = chunk.range.start;
        let size = chunk.size() as usize;

        let buffer = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
            let mut file = std::fs::File::open(&path)?;
            file.seek(SeekFrom::Start(start))?;

            let mut buffer = vec![0u8; size];
            file.read_exact(&mut buffer)?;

            Ok(buffer)
        })
        .await
        .map_err(std::io::Error::other)??;

        debug!(
            "[分片#{}] 读取: bytes={}-{}, 大小={} bytes",
            chunk.index,
            chunk.range.start,
            chunk.range.end.saturating_sub(1),
            buffer.len()
        );

        Ok(buffer)
    }
}

/// 内存数据
#[derive(Debug, Clone)]
pub struct MemoryChunkSource {
    data: Vec<u8>,
}

impl MemoryChunkSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl ChunkSource for MemoryChunkSource {
    async fn read_chunk(&self, chunk: &ChunkRange) -> std::io::Result<Vec<u8>> {
        let start = chunk.range.start as usize;
        let end = chunk.range.end as usize;
        self.data
            .get(start..end)
            .map(|slice| slice.to_vec())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("分片 #{} 超出数据范围", chunk.index),
                )
            })
    }
}
