//! Live Event Types
//!
//! Payloads carried in the `data:` field of the server-sent events stream.

use crate::device::Device;
use serde::{Deserialize, Serialize};

/// Events pushed by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "lowercase")]
pub enum LiveEvent {
    /// A device changed
    Iot {
        /// Missing on older servers, treated as an update
        #[serde(default)]
        action: IotAction,
        data: Device,
    },
    /// A message for the user
    Notification { data: NotificationPayload },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IotAction {
    Create,
    #[default]
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub message: String,
}

impl LiveEvent {
    /// Parse an event payload
    pub fn parse(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}
