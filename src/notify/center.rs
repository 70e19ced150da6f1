//! Notification Center
//!
//! Owns the queue and decides how each notification is presented,
//! depending on whether the user is looking at the app and whether system
//! notifications are allowed.
//!
//! # Presentation policy
//!
//! - focused, or system notifications not granted: toast and sound for
//!   every unviewed entry, which then counts as viewed
//! - unfocused and granted: one sound and one system notification for the
//!   oldest unviewed entry; the rest wait until focus returns
//!
//! The same entry is never raised as a system notification twice.

use super::queue::{Notification, NotificationQueue};
use crate::api::{ApiResult, NotificationApi};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Confirmation pushed after a successful availability registration
pub const AVAILABILITY_CONFIRMATION: &str = "You will be notified when the iot is available";

/// Output side of the notification center
#[async_trait]
pub trait Notifier: Send + Sync {
    /// In-app toast
    async fn toast(&self, notification: &Notification);

    async fn play_sound(&self);

    /// OS-level notification
    async fn system(&self, notification: &Notification);

    /// Ask the user to allow system notifications. Returns whether granted.
    async fn request_permission(&self) -> bool;
}

/// System notification permission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Unasked,
    Granted,
    Denied,
}

#[derive(Debug)]
struct CenterState {
    queue: NotificationQueue,
    focused: bool,
    permission: PermissionState,
    asking: bool,
    last_raised: Option<Uuid>,
}

impl CenterState {
    /// Apply the presentation policy to the queue and return what to show.
    /// Entries are marked viewed or raised here, before anything is shown.
    fn plan(&mut self) -> Vec<Presentation> {
        let granted = self.permission == PermissionState::Granted;
        let mut plan = Vec::new();

        if self.focused || !granted {
            let pending: Vec<Notification> = self.queue.unviewed().cloned().collect();
            for notification in pending {
                self.queue.mark_viewed(notification.id);
                plan.push(Presentation::Toast(notification));
                plan.push(Presentation::Sound);
            }
            return plan;
        }

        if let Some(notification) = self.queue.unviewed().next().cloned() {
            if self.last_raised != Some(notification.id) {
                self.last_raised = Some(notification.id);
                plan.push(Presentation::Sound);
                plan.push(Presentation::System(notification));
            }
        }
        plan
    }
}

#[derive(Debug)]
enum Presentation {
    Toast(Notification),
    Sound,
    System(Notification),
}

pub struct NotificationCenter {
    state: Mutex<CenterState>,
    notifier: Arc<dyn Notifier>,
    api: Arc<dyn NotificationApi>,
    anonymous_id: String,
}

impl NotificationCenter {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        api: Arc<dyn NotificationApi>,
        anonymous_id: impl Into<String>,
        focused: bool,
    ) -> Self {
        Self {
            state: Mutex::new(CenterState {
                queue: NotificationQueue::new(),
                focused,
                permission: PermissionState::Unasked,
                asking: false,
                last_raised: None,
            }),
            notifier,
            api,
            anonymous_id: anonymous_id.into(),
        }
    }

    /// Id this client registers availability requests under
    pub fn anonymous_id(&self) -> &str {
        &self.anonymous_id
    }

    /// Queue a message and present it
    pub async fn push(&self, message: impl Into<String>) -> Uuid {
        let (id, ask) = {
            let mut state = self.state.lock().await;
            let id = state.queue.push(message);
            let ask = state.permission == PermissionState::Unasked && !state.asking;
            state.asking |= ask;
            (id, ask)
        };
        tracing::debug!(%id, "Notification queued");

        if ask {
            let granted = self.notifier.request_permission().await;
            let mut state = self.state.lock().await;
            state.asking = false;
            if state.permission == PermissionState::Unasked {
                state.permission = permission_from(granted);
            }
        }

        self.present().await;
        id
    }

    pub async fn set_focused(&self, focused: bool) {
        self.state.lock().await.focused = focused;
        self.present().await;
    }

    /// Ask for system notification permission unless already granted
    pub async fn request_permission(&self) -> bool {
        if self.state.lock().await.permission == PermissionState::Granted {
            return true;
        }
        let granted = self.notifier.request_permission().await;
        self.state.lock().await.permission = permission_from(granted);
        tracing::debug!(granted, "Notification permission requested");
        granted
    }

    /// The user opened a system notification
    pub async fn system_notification_clicked(&self, id: Uuid) -> bool {
        let viewed = self.state.lock().await.queue.mark_viewed(id);
        if viewed {
            self.present().await;
        }
        viewed
    }

    /// Register for a push once `iot_id` frees up.
    ///
    /// Returns whether the server accepted the registration.
    pub async fn notify_when_available(&self, iot_id: &str) -> ApiResult<bool> {
        self.request_permission().await;

        let response = self
            .api
            .notify_when_available(iot_id, &self.anonymous_id)
            .await?;

        let accepted = response.is_success();
        if accepted {
            self.push(AVAILABILITY_CONFIRMATION).await;
        }
        tracing::info!(iot_id, accepted, "Availability notification requested");
        Ok(accepted)
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.lock().await.queue.all().to_vec()
    }

    pub async fn unviewed_count(&self) -> usize {
        self.state.lock().await.queue.unviewed().count()
    }

    pub async fn is_focused(&self) -> bool {
        self.state.lock().await.focused
    }

    pub async fn permission(&self) -> PermissionState {
        self.state.lock().await.permission
    }

    /// Re-evaluate the policy, then show the result with the lock released
    async fn present(&self) {
        let plan = self.state.lock().await.plan();
        for step in &plan {
            match step {
                Presentation::Toast(notification) => self.notifier.toast(notification).await,
                Presentation::Sound => self.notifier.play_sound().await,
                Presentation::System(notification) => self.notifier.system(notification).await,
            }
        }
    }
}

fn permission_from(granted: bool) -> PermissionState {
    if granted {
        PermissionState::Granted
    } else {
        PermissionState::Denied
    }
}
