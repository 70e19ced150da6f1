//! Notifications
//!
//! - [`NotificationQueue`]: append-only list with viewed flags
//! - [`NotificationCenter`]: presentation policy and availability requests
//! - [`Notifier`]: where notifications end up (terminal, tests)

mod center;
mod queue;
mod terminal;

pub use center::{NotificationCenter, Notifier, PermissionState, AVAILABILITY_CONFIRMATION};
pub use queue::{Notification, NotificationQueue};
pub use terminal::TerminalNotifier;
