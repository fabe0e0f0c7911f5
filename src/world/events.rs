use crate::appearance::orchestrator::RunOutcome;
use crate::appearance::types::{BakeType, WearableType};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::trace;

// Events the appearance subsystem publishes to the rest of the client

/// The worn outfit changed
#[derive(Debug, Clone)]
pub struct WearablesChangedEvent {
    pub worn: Vec<WearableType>,
    pub timestamp: SystemTime,
}

/// Server answered a cache check (or the check was skipped or failed)
#[derive(Debug, Clone)]
pub struct CacheCheckEvent {
    pub serial_num: u32,
    pub requested: usize,
    /// Layers the server already had a bake for
    pub hits: Vec<BakeType>,
    pub succeeded: bool,
    pub timestamp: SystemTime,
}

/// Terminal notification of one bake run
#[derive(Debug, Clone)]
pub struct RunCompleteEvent {
    pub run_id: u64,
    pub success: bool,
    pub outcome: RunOutcome,
    pub timestamp: SystemTime,
}

#[derive(Debug, Clone)]
pub enum AppearanceEvent {
    WearablesChanged(WearablesChangedEvent),
    CacheCheckComplete(CacheCheckEvent),
    RunComplete(RunCompleteEvent),
}

impl WearablesChangedEvent {
    pub fn new(worn: Vec<WearableType>) -> Self {
        Self { worn, timestamp: SystemTime::now() }
    }
}

impl CacheCheckEvent {
    pub fn new(serial_num: u32, requested: usize, hits: Vec<BakeType>, succeeded: bool) -> Self {
        Self {
            serial_num,
            requested,
            hits,
            succeeded,
            timestamp: SystemTime::now(),
        }
    }
}

impl RunCompleteEvent {
    pub fn new(run_id: u64, outcome: RunOutcome) -> Self {
        Self {
            run_id,
            success: outcome == RunOutcome::Success,
            outcome,
            timestamp: SystemTime::now(),
        }
    }
}

/// Single dispatch point for appearance events.
///
/// Subscribers that fall behind lose the oldest events rather than
/// blocking the publisher.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AppearanceEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppearanceEvent> {
        self.sender.subscribe()
    }

    /// Publish to current subscribers; dropped silently when nobody listens
    pub fn emit(&self, event: AppearanceEvent) {
        if let Err(e) = self.sender.send(event) {
            trace!("No appearance event subscribers: {:?}", e.0);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.emit(AppearanceEvent::RunComplete(RunCompleteEvent::new(7, RunOutcome::Partial)));

        match rx.recv().await.unwrap() {
            AppearanceEvent::RunComplete(event) => {
                assert_eq!(event.run_id, 7);
                assert!(!event.success);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        let bus = EventBus::new(1);
        bus.emit(AppearanceEvent::WearablesChanged(WearablesChangedEvent::new(vec![WearableType::Shape])));
    }
}
