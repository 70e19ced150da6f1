//! Live Reducer
//!
//! Single consumer of the live queue. Events are applied one at a time, in
//! arrival order, each under a single cache lock acquisition.

use super::events::{IotAction, LiveEvent};
use crate::cache::DeviceCache;
use crate::notify::NotificationCenter;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct LiveReducer {
    cache: Arc<DeviceCache>,
    notifications: Arc<NotificationCenter>,
}

impl LiveReducer {
    pub fn new(cache: Arc<DeviceCache>, notifications: Arc<NotificationCenter>) -> Self {
        Self {
            cache,
            notifications,
        }
    }

    pub async fn apply(&self, event: LiveEvent) {
        match event {
            LiveEvent::Iot {
                action: IotAction::Delete,
                data,
            } => {
                tracing::debug!(id = %data.id, "Live delete");
                self.cache.apply_remote_delete(&data.id).await;
            }
            LiveEvent::Iot { action, data } => {
                tracing::debug!(id = %data.id, ?action, "Live upsert");
                self.cache.apply_remote_upsert(&data).await;
            }
            LiveEvent::Notification { data } => {
                self.notifications.push(data.message).await;
            }
        }
    }

    /// Drain the queue until every sender is gone. Returns the event count.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<LiveEvent>) -> usize {
        let mut applied = 0;
        while let Some(event) = rx.recv().await {
            self.apply(event).await;
            applied += 1;
        }
        tracing::debug!(applied, "Live reducer stopped");
        applied
    }

    pub fn spawn(self, rx: mpsc::UnboundedReceiver<LiveEvent>) -> JoinHandle<usize> {
        tokio::spawn(self.run(rx))
    }
}
