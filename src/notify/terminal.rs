//! Terminal notifier used by the CLI

use super::center::Notifier;
use super::queue::Notification;
use async_trait::async_trait;
use std::io::Write;

/// Prints notifications to stdout; "system" notifications ring the bell
#[derive(Debug, Clone)]
pub struct TerminalNotifier {
    allow_system: bool,
    bell: bool,
}

impl TerminalNotifier {
    pub fn new(allow_system: bool) -> Self {
        Self {
            allow_system,
            bell: true,
        }
    }

    /// Disable the terminal bell
    pub fn quiet(mut self) -> Self {
        self.bell = false;
        self
    }
}

#[async_trait]
impl Notifier for TerminalNotifier {
    async fn toast(&self, notification: &Notification) {
        println!("[notice] {}", notification.message);
    }

    async fn play_sound(&self) {
        if self.bell {
            let mut out = std::io::stdout();
            let _ = out.write_all(b"\x07");
            let _ = out.flush();
        }
    }

    async fn system(&self, notification: &Notification) {
        tracing::info!(id = %notification.id, "System notification raised");
        println!("[system {}] {}", notification.id, notification.message);
    }

    async fn request_permission(&self) -> bool {
        self.allow_system
    }
}
