//! REST API Client
//!
//! Typed access to the GymSense REST API. The stores never talk to
//! reqwest directly: they hold one of the traits below, implemented by
//! [`ApiClient`] in production and by fakes in tests.
//!
//! ## Endpoints
//!
//! - `POST /user/login`, `/user/register`, `/user/recover`, `/user/logout`
//! - `GET /iot`, `GET /iot/:id`, `PUT /iot/:id`, `POST /iot/create`, `DELETE /iot/:id`
//! - `POST /notifications`

mod client;
pub mod dto;
mod error;

pub use client::{ApiClient, ClientConfig};
pub use dto::{Credentials, LoginResponse, StatusResponse, UserInfo};
pub use error::{ApiError, ApiResult, GENERIC_TRANSPORT_MESSAGE};

use crate::device::{Device, DevicePatch};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Authentication endpoints
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> ApiResult<LoginResponse>;

    async fn register(&self, credentials: &Credentials) -> ApiResult<LoginResponse>;

    /// Restore the session from the server-side cookie
    async fn recover(&self) -> ApiResult<LoginResponse>;

    async fn logout(&self) -> ApiResult<()>;
}

/// Device endpoints
#[async_trait]
pub trait DeviceApi: Send + Sync {
    async fn list_devices(&self) -> ApiResult<Vec<Device>>;

    async fn get_device(&self, id: &str, with_timeline: bool) -> ApiResult<Device>;

    async fn update_device(&self, id: &str, patch: &DevicePatch) -> ApiResult<Device>;

    async fn create_device(&self) -> ApiResult<Device>;

    async fn delete_device(&self, id: &str) -> ApiResult<()>;
}

/// Availability notification endpoints
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Ask the server to push a notification when the device frees up
    async fn notify_when_available(
        &self,
        iot_id: &str,
        anonymous_id: &str,
    ) -> ApiResult<StatusResponse>;
}

/// Bearer token shared between the session store and the HTTP client
#[derive(Debug, Clone, Default)]
pub struct TokenHandle(Arc<RwLock<Option<String>>>);

impl TokenHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<String> {
        self.0.read().await.clone()
    }

    pub async fn set(&self, token: impl Into<String>) {
        let token = token.into();
        *self.0.write().await = if token.is_empty() { None } else { Some(token) };
    }

    pub async fn clear(&self) {
        *self.0.write().await = None;
    }
}
