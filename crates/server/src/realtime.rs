//! In-process change feed for the `tasks` and `activities` tables.
//!
//! Handlers publish after a successful write; subscribers refetch on each
//! event. A subscriber that falls behind loses the overflowed events.

use tokio::sync::broadcast;

use taskflow_api::{ChangeEvent, ChangeKind, ChangeTable};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, table: ChangeTable, kind: ChangeKind, project_id: &str, record_id: &str) {
        let event = ChangeEvent {
            table,
            kind,
            project_id: project_id.to_string(),
            record_id: record_id.to_string(),
        };
        // No subscribers is the common case.
        let _ = self.tx.send(event);
    }

    pub fn task(&self, kind: ChangeKind, project_id: &str, task_id: &str) {
        self.publish(ChangeTable::Tasks, kind, project_id, task_id);
    }

    pub fn activity(&self, project_id: &str, activity_id: &str) {
        self.publish(ChangeTable::Activities, ChangeKind::Insert, project_id, activity_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let feed = ChangeFeed::new();
        let mut rx = feed.subscribe();
        feed.task(ChangeKind::Update, "p1", "t1");
        feed.activity("p1", "a1");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.table, ChangeTable::Tasks);
        assert_eq!(first.kind, ChangeKind::Update);
        assert_eq!(first.record_id, "t1");

        let second = rx.recv().await.unwrap();
        assert_eq!(second.table, ChangeTable::Activities);
        assert_eq!(second.kind, ChangeKind::Insert);
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        ChangeFeed::new().task(ChangeKind::Delete, "p1", "t1");
    }
}
