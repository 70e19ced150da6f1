//! Live Updates
//!
//! Server-pushed changes, wired as
//!
//! ```text
//! LiveChannel --(unbounded mpsc)--> LiveReducer --> DeviceCache
//!                                               \-> NotificationCenter
//! ```

mod channel;
mod events;
mod reducer;
mod sse;

pub use channel::{LiveChannel, LiveError, ReconnectPolicy, MIN_RECONNECT_DELAY};
pub use events::{IotAction, LiveEvent, NotificationPayload};
pub use reducer::LiveReducer;
pub use sse::{SseDecoder, SseEvent, DEFAULT_EVENT_TYPE};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Running channel and reducer tasks
pub struct LiveHandle {
    channel: JoinHandle<Result<(), LiveError>>,
    reducer: JoinHandle<usize>,
}

impl LiveHandle {
    /// Connect `channel` to `reducer` and start both
    pub fn start(channel: LiveChannel, reducer: LiveReducer) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            channel: channel.spawn(tx),
            reducer: reducer.spawn(rx),
        }
    }

    pub fn abort(&self) {
        self.channel.abort();
        self.reducer.abort();
    }
}
