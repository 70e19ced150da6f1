//! Application Context
//!
//! Owns every piece of shared client state. Nothing in the crate is
//! global; front ends build one `AppContext` and pass it around.

use crate::api::{ApiClient, ApiResult, TokenHandle};
use crate::cache::DeviceCache;
use crate::config::Config;
use crate::live::{LiveChannel, LiveHandle, LiveReducer};
use crate::notify::{NotificationCenter, Notifier};
use crate::session::{
    FileSessionStorage, MemorySessionStorage, SessionError, SessionStorage, SessionStore,
};
use std::sync::Arc;
use uuid::Uuid;

pub struct AppContext {
    config: Config,
    api: Arc<ApiClient>,
    token: TokenHandle,
    session: Arc<SessionStore>,
    devices: Arc<DeviceCache>,
    notifications: Arc<NotificationCenter>,
}

impl AppContext {
    /// Wire the stores together. No network traffic happens here.
    pub fn new(config: Config, notifier: Arc<dyn Notifier>) -> ApiResult<Self> {
        let token = TokenHandle::new();
        let api = Arc::new(ApiClient::new(config.client_config(), token.clone())?);

        let storage: Arc<dyn SessionStorage> = if config.session.persist {
            Arc::new(FileSessionStorage::new(config.session.data_path()))
        } else {
            Arc::new(MemorySessionStorage::new())
        };

        let session = Arc::new(SessionStore::new(api.clone(), storage, token.clone()));
        let devices = Arc::new(DeviceCache::new(api.clone()));

        let anonymous_id = config
            .session
            .anonymous_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let notifications = Arc::new(NotificationCenter::new(
            notifier,
            api.clone(),
            anonymous_id,
            config.notifications.assume_focused,
        ));

        tracing::debug!(base_url = %config.api.base_url, "App context ready");
        Ok(Self {
            config,
            api,
            token,
            session,
            devices,
            notifications,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn token(&self) -> &TokenHandle {
        &self.token
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn devices(&self) -> &Arc<DeviceCache> {
        &self.devices
    }

    pub fn notifications(&self) -> &Arc<NotificationCenter> {
        &self.notifications
    }

    /// Restore a session: the persisted copy first, then the server cookie.
    pub async fn restore_session(&self) -> Result<bool, SessionError> {
        match self.session.load_state().await {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "Ignoring unreadable persisted session"),
        }
        self.session.recover_session().await
    }

    /// Start the live channel and its reducer, unless disabled in config
    pub fn start_live_updates(&self) -> Option<LiveHandle> {
        if !self.config.live.enabled {
            tracing::debug!("Live updates disabled");
            return None;
        }

        let channel = LiveChannel::from_api(
            &self.api,
            &self.config.live.path,
            self.config.reconnect_policy(),
        );
        tracing::info!(url = %channel.url(), "Starting live updates");

        let reducer = LiveReducer::new(self.devices.clone(), self.notifications.clone());
        Some(LiveHandle::start(channel, reducer))
    }
}
