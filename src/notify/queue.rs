//! Notification Queue
//!
//! Append-only list of user notifications. Entries are never removed, only
//! flagged as viewed once presented.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user-visible notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub message: String,
    pub viewed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationQueue {
    items: Vec<Notification>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an unviewed notification and return its id
    pub fn push(&mut self, message: impl Into<String>) -> Uuid {
        let id = Uuid::new_v4();
        self.items.push(Notification {
            id,
            message: message.into(),
            viewed: false,
        });
        id
    }

    /// Returns false for an unknown id
    pub fn mark_viewed(&mut self, id: Uuid) -> bool {
        match self.items.iter_mut().find(|n| n.id == id) {
            Some(notification) => {
                notification.viewed = true;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == id)
    }

    /// Unviewed notifications, oldest first
    pub fn unviewed(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter().filter(|n| !n.viewed)
    }

    pub fn all(&self) -> &[Notification] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_view() {
        let mut queue = NotificationQueue::new();
        let first = queue.push("one");
        let second = queue.push("two");
        assert_ne!(first, second);
        assert_eq!(queue.unviewed().count(), 2);

        assert!(queue.mark_viewed(first));
        let unviewed: Vec<_> = queue.unviewed().map(|n| n.message.as_str()).collect();
        assert_eq!(unviewed, vec!["two"]);

        // Viewed entries stay in the queue
        assert_eq!(queue.len(), 2);
        assert!(queue.get(first).unwrap().viewed);
    }

    #[test]
    fn test_mark_unknown_id() {
        let mut queue = NotificationQueue::new();
        queue.push("one");
        assert!(!queue.mark_viewed(Uuid::new_v4()));
        assert_eq!(queue.unviewed().count(), 1);
    }

    #[test]
    fn test_notification_json_shape() {
        let mut queue = NotificationQueue::new();
        let id = queue.push("Rower is free");

        let json = serde_json::to_value(queue.get(id).unwrap()).unwrap();
        assert_eq!(json["id"], id.to_string());
        assert_eq!(json["message"], "Rower is free");
        assert_eq!(json["viewed"], false);

        let back: Notification = serde_json::from_value(json).unwrap();
        assert_eq!(&back, queue.get(id).unwrap());
    }
}
