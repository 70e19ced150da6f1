//! Live Channel
//!
//! Long-lived credentialed GET on the server's event stream. Decoded
//! events are handed to a single consumer through an unbounded queue; the
//! channel never touches application state itself.
//!
//! On disconnect the channel reconnects with exponential backoff and full
//! jitter. The attempt counter starts over after every successful connect.

use super::events::LiveEvent;
use super::sse::SseDecoder;
use crate::api::{ApiClient, TokenHandle};
use futures_util::StreamExt;
use rand::Rng;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Errors that end a connection attempt
#[derive(Error, Debug)]
pub enum LiveError {
    #[error("Connection failed: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("Unexpected status: {0}")]
    Status(u16),

    #[error("Stream interrupted: {0}")]
    Stream(String),
}

/// Floor for every reconnect wait, whatever the config or server ask for
pub const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(100);

/// When and how often to reconnect
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Give up after this many consecutive failed reconnects
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Upper bound of the wait before reconnect number `attempt` (0-based),
    /// never below [`MIN_RECONNECT_DELAY`]
    pub fn ceiling(&self, attempt: u32, base: Duration) -> Duration {
        let factor = 1u32 << attempt.min(16);
        base.max(MIN_RECONNECT_DELAY)
            .saturating_mul(factor)
            .min(self.max_delay.max(MIN_RECONNECT_DELAY))
    }

    /// Full jitter: uniform in `[MIN_RECONNECT_DELAY, ceiling]`
    pub fn delay(&self, attempt: u32, base: Duration) -> Duration {
        let floor = MIN_RECONNECT_DELAY.as_millis() as u64;
        let ceiling = self.ceiling(attempt, base).as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(floor..=ceiling))
    }

    pub fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(false, |max| attempt >= max)
    }
}

pub struct LiveChannel {
    client: Client,
    url: String,
    token: TokenHandle,
    policy: ReconnectPolicy,
}

impl LiveChannel {
    pub fn new(
        client: Client,
        url: impl Into<String>,
        token: TokenHandle,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            token,
            policy,
        }
    }

    /// Share the REST client's connection pool, cookies and token
    pub fn from_api(api: &ApiClient, path: &str, policy: ReconnectPolicy) -> Self {
        Self::new(api.http().clone(), api.url(path), api.token().clone(), policy)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run in the background until the receiver is dropped or the
    /// reconnect budget runs out.
    pub fn spawn(self, tx: mpsc::UnboundedSender<LiveEvent>) -> JoinHandle<Result<(), LiveError>> {
        tokio::spawn(self.run(tx))
    }

    pub async fn run(self, tx: mpsc::UnboundedSender<LiveEvent>) -> Result<(), LiveError> {
        let mut decoder = SseDecoder::new();
        let mut attempt = 0u32;
        let mut base = self.policy.initial_delay;

        loop {
            let mut connected = false;
            let error = match self.stream_once(&mut decoder, &tx, &mut connected).await {
                Ok(()) => {
                    tracing::debug!(url = %self.url, "Live receiver dropped, stopping");
                    return Ok(());
                }
                Err(e) => e,
            };

            if connected {
                attempt = 0;
            }
            if let Some(retry) = decoder.take_retry() {
                base = retry;
            }
            if self.policy.exhausted(attempt) {
                tracing::error!(url = %self.url, attempt, error = %error, "Live channel giving up");
                return Err(error);
            }

            let delay = self.policy.delay(attempt, base);
            tracing::warn!(
                url = %self.url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Live channel disconnected, reconnecting"
            );
            attempt += 1;
            decoder.reset();

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = tx.closed() => return Ok(()),
            }
        }
    }

    /// One connection. `Ok` means the receiver went away.
    async fn stream_once(
        &self,
        decoder: &mut SseDecoder,
        tx: &mpsc::UnboundedSender<LiveEvent>,
        connected: &mut bool,
    ) -> Result<(), LiveError> {
        let mut request = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream");
        if let Some(token) = self.token.get().await {
            request = request.header(AUTHORIZATION, token);
        }
        if let Some(id) = decoder.last_event_id() {
            request = request.header("Last-Event-ID", id);
        }

        let response = request.send().await.map_err(LiveError::Connect)?;
        if !response.status().is_success() {
            return Err(LiveError::Status(response.status().as_u16()));
        }

        *connected = true;
        tracing::info!(url = %self.url, "Live channel connected");

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LiveError::Stream(e.to_string()))?;

            for event in decoder.feed(&chunk) {
                if !event.is_message() {
                    tracing::trace!(event = %event.event, "Ignoring non-message SSE event");
                    continue;
                }
                match LiveEvent::parse(&event.data) {
                    Ok(live) => {
                        if tx.send(live).is_err() {
                            return Ok(());
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, data = %event.data, "Skipping malformed live event")
                    }
                }
            }
        }

        Err(LiveError::Stream("closed by server".to_string()))
    }
}
