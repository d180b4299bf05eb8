use crate::HarvestEvent;

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: HarvestEvent);
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<HarvestEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<HarvestEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: HarvestEvent) {
        let _ = self.tx.send(event);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn emit(&self, _event: HarvestEvent) {}
}
