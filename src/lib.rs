//! # GymSense
//!
//! Client core for the GymSense equipment-occupancy service: who may do
//! what, which machines are free right now, and telling the user when one
//! frees up.
//!
//! ## Modules
//!
//! - [`permission`]: `domain:action:target` permission evaluation
//! - [`device`]: device records, partial updates and timelines
//! - [`api`]: typed REST client and the traits the stores depend on
//! - [`session`]: login/logout state machine and session persistence
//! - [`cache`]: tag-invalidated device cache with optimistic mutations
//! - [`live`]: server-sent events channel and its serial reducer
//! - [`notify`]: notification queue and presentation policy
//! - [`context`]: the object that owns all of the above
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gymsense::{AppContext, Config, TerminalNotifier};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = AppContext::new(Config::load_default(), Arc::new(TerminalNotifier::new(true)))?;
//!
//!     if !ctx.restore_session().await? {
//!         ctx.session().login("member@gym.io", "hunter2").await?;
//!     }
//!
//!     for device in ctx.devices().list_devices().await? {
//!         println!("{}: {}", device.display_name(), device.status());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod device;
pub mod live;
pub mod notify;
pub mod permission;
pub mod session;

// Re-export top-level types for convenience
pub use api::{ApiClient, ApiError, ApiResult, ClientConfig, TokenHandle};

pub use cache::{CacheStats, DeviceCache, Tag};

pub use config::{Config, ConfigError, ConfigSource, LoggingConfig};

pub use context::AppContext;

pub use device::{Device, DevicePatch, DeviceStatus, TimelineInterval};

pub use live::{LiveChannel, LiveError, LiveEvent, LiveHandle, LiveReducer, ReconnectPolicy};

pub use notify::{Notification, NotificationCenter, Notifier, TerminalNotifier};

pub use permission::{has_permission, Permission};

pub use session::{Session, SessionError, SessionPhase, SessionStore};
