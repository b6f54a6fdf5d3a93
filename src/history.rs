// 上传历史
//
// 历史列表是被动拉取的，失败时只记录日志并显示为空；
// 删除是用户主动操作，失败需要提示

use crate::backend::{BackendClient, UploadRecord};
use crate::error::ClientError;
use tracing::{error, info};

/// 上传历史列表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryView {
    records: Vec<UploadRecord>,
}

impl HistoryView {
    pub fn from_records(records: Vec<UploadRecord>) -> Self {
        Self { records }
    }

    /// 拉取全部上传历史
    pub async fn try_load(client: &BackendClient) -> Result<Self, ClientError> {
        let records = client
            .list_file_uploads()
            .await
            .map_err(ClientError::HistoryFetchFailure)?;
        Ok(Self::from_records(records))
    }

    /// 拉取全部上传历史，失败时返回空列表
    pub async fn load(client: &BackendClient) -> Self {
        match Self::try_load(client).await {
            Ok(view) => view,
            Err(e) => {
                error!("{}", e);
                Self::default()
            }
        }
    }

    /// 拉取最近上传，失败时返回空列表
    pub async fn load_recent(client: &BackendClient) -> Self {
        match client.list_recent_uploads().await {
            Ok(records) => Self::from_records(records),
            Err(e) => {
                error!("{}", ClientError::HistoryFetchFailure(e));
                Self::default()
            }
        }
    }

    /// 按后端顺序返回全部记录
    pub fn items(&self) -> &[UploadRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 最近的 n 条记录，最新的在前
    pub fn latest(&self, n: usize) -> Vec<&UploadRecord> {
        self.records.iter().rev().take(n).collect()
    }

    /// 移除记录，返回是否存在
    pub fn remove(&mut self, file_id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|record| record.file_id != file_id);
        self.records.len() != before
    }
}

/// 删除视频并从列表中移除
pub async fn delete_upload(
    client: &BackendClient,
    view: &mut HistoryView,
    id: &str,
) -> Result<(), ClientError> {
    client
        .delete_video(id)
        .await
        .map_err(|source| ClientError::DeleteFailure {
            id: id.to_string(),
            source,
        })?;

    view.remove(id);
    info!("已从历史列表移除: {}", id);
    Ok(())
}
