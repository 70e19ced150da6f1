//! Data Transfer Objects
//!
//! Request and response bodies of the GymSense REST API.

use crate::device::Device;
use serde::{Deserialize, Serialize};

// ============================================
// AUTH DTOs
// ============================================

/// Body of `POST /user/login` and `POST /user/register`
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Successful login, register or recover response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserInfo,
}

/// User section of a login response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub email: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Generic `{status}` acknowledgement
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: serde_json::Value,
}

impl StatusResponse {
    /// Accepts both `"success"` and boolean `true`
    pub fn is_success(&self) -> bool {
        match &self.status {
            serde_json::Value::Bool(ok) => *ok,
            serde_json::Value::String(s) => s == "success" || s == "ok",
            _ => false,
        }
    }
}

// ============================================
// DEVICE DTOs
// ============================================

/// `{status, data}` envelope used by the device read endpoints
#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    #[serde(default)]
    pub status: Option<serde_json::Value>,
    pub data: T,
}

/// `PUT /iot/:id` answers with a bare device or a `{data}` envelope
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UpdateResponse {
    Wrapped { data: Device },
    Bare(Device),
}

impl UpdateResponse {
    pub fn into_device(self) -> Device {
        match self {
            UpdateResponse::Wrapped { data } => data,
            UpdateResponse::Bare(device) => device,
        }
    }
}

/// Response of `POST /iot/create`
#[derive(Debug, Deserialize)]
pub struct CreateResponse {
    pub iot: Device,
}

// ============================================
// NOTIFICATION DTOs
// ============================================

/// Body of `POST /notifications`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyRequest {
    pub iot_id: String,
}
