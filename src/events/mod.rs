//! 上传事件模块

pub mod types;

pub use types::UploadEvent;

use tokio::sync::broadcast;

/// 上传事件总线
///
/// 订阅者处理过慢时只会丢失旧事件（Lagged），不会阻塞上传
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<UploadEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.sender.subscribe()
    }

    /// 发布事件，没有订阅者时直接丢弃
    pub fn publish(&self, event: UploadEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
