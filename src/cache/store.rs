//! Device Cache
//!
//! Normalized cache of device records, reconciled with the server by
//! pull (fetch on demand) and push (live channel).
//!
//! # Optimistic mutations
//!
//! Each mutation edits the cache under the write lock *before* the request
//! is sent, then either keeps the edit and invalidates the affected tags or
//! rolls it back before returning the error. The lock is never held across
//! the network call, so live events may land in between; the last writer
//! wins and a rollback only restores what the mutation itself changed.

use super::tags::{Entry, Tag};
use crate::api::{ApiResult, DeviceApi};
use crate::device::{Device, DevicePatch};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Prefix of the ids given to optimistic placeholders
pub const PLACEHOLDER_PREFIX: &str = "temp-";

#[derive(Debug, Clone)]
pub(crate) struct CachedDevice {
    pub device: Device,
    /// Whether the fetch asked for the occupancy timeline
    pub with_timeline: bool,
}

#[derive(Debug, Default)]
pub(crate) struct CacheState {
    pub list: Option<Entry<Vec<Device>>>,
    pub devices: HashMap<String, Entry<CachedDevice>>,
}

impl CacheState {
    fn invalidate(&mut self, tags: &[Tag]) -> usize {
        let mut hits = 0;
        if let Some(list) = self.list.as_mut() {
            if list.invalidate(tags) {
                hits += 1;
            }
        }
        for entry in self.devices.values_mut() {
            if entry.invalidate(tags) {
                hits += 1;
            }
        }
        hits
    }
}

/// Snapshot of the cache contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub list_cached: bool,
    pub list_len: usize,
    pub devices_cached: usize,
    pub stale_entries: usize,
    pub list_fetched_at: Option<DateTime<Utc>>,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "list={} ({} devices), single entries={}, stale={}",
            if self.list_cached { "cached" } else { "empty" },
            self.list_len,
            self.devices_cached,
            self.stale_entries
        )
    }
}

/// Single source of truth for device data
pub struct DeviceCache {
    api: Arc<dyn DeviceApi>,
    state: RwLock<CacheState>,
}

impl DeviceCache {
    pub fn new(api: Arc<dyn DeviceApi>) -> Self {
        Self {
            api,
            state: RwLock::new(CacheState::default()),
        }
    }

    // ============================================
    // Queries
    // ============================================

    /// All devices, from cache when fresh
    pub async fn list_devices(&self) -> ApiResult<Vec<Device>> {
        {
            let state = self.state.read().await;
            if let Some(entry) = state.list.as_ref().filter(|e| !e.stale) {
                return Ok(entry.data.clone());
            }
        }
        self.refresh_list().await
    }

    /// Fetch the device list unconditionally
    pub async fn refresh_list(&self) -> ApiResult<Vec<Device>> {
        let devices = self.api.list_devices().await?;

        let mut tags: HashSet<Tag> = devices.iter().map(|d| Tag::device(&d.id)).collect();
        tags.insert(Tag::List);

        self.state.write().await.list = Some(Entry::new(devices.clone(), tags));
        tracing::debug!(count = devices.len(), "Device list cached");
        Ok(devices)
    }

    /// One device, from cache when fresh and detailed enough
    pub async fn get_device(&self, id: &str, with_timeline: bool) -> ApiResult<Device> {
        {
            let state = self.state.read().await;
            if let Some(entry) = state.devices.get(id) {
                if !entry.stale && (entry.data.with_timeline || !with_timeline) {
                    return Ok(entry.data.device.clone());
                }
            }
        }

        let device = self.api.get_device(id, with_timeline).await?;
        let tags: HashSet<Tag> = [Tag::device(id)].into_iter().collect();
        let cached = CachedDevice {
            device: device.clone(),
            with_timeline,
        };
        self.state
            .write()
            .await
            .devices
            .insert(id.to_string(), Entry::new(cached, tags));

        tracing::debug!(id, with_timeline, "Device cached");
        Ok(device)
    }

    // ============================================
    // Mutations
    // ============================================

    /// Send a partial update, showing it in the single-device entry while
    /// the request is in flight.
    pub async fn update_device(&self, id: &str, patch: &DevicePatch) -> ApiResult<Device> {
        let before = {
            let mut state = self.state.write().await;
            state.devices.get_mut(id).map(|entry| {
                let before = entry.data.device.clone();
                patch.apply(&mut entry.data.device);
                before
            })
        };

        tracing::debug!(id, optimistic = before.is_some(), "Updating device");

        match self.api.update_device(id, patch).await {
            Ok(device) => {
                self.state.write().await.invalidate(&[Tag::device(id)]);
                tracing::info!(id, "Device updated");
                Ok(device)
            }
            Err(e) => {
                if let Some(before) = before {
                    let mut state = self.state.write().await;
                    if let Some(entry) = state.devices.get_mut(id) {
                        patch.revert(&mut entry.data.device, &before);
                    }
                }
                tracing::warn!(id, error = %e, "Device update failed, rolled back");
                Err(e)
            }
        }
    }

    /// Create a device, showing a placeholder in the list meanwhile.
    ///
    /// On success the placeholder stays until the list is refetched.
    pub async fn create_device(&self) -> ApiResult<Device> {
        let placeholder_id = format!("{}{}", PLACEHOLDER_PREFIX, Uuid::new_v4());
        {
            let mut state = self.state.write().await;
            if let Some(list) = state.list.as_mut() {
                list.data.push(Device::new(&placeholder_id));
            }
        }

        match self.api.create_device().await {
            Ok(device) => {
                self.state.write().await.invalidate(&[Tag::List]);
                tracing::info!(id = %device.id, "Device created");
                Ok(device)
            }
            Err(e) => {
                let mut state = self.state.write().await;
                if let Some(list) = state.list.as_mut() {
                    list.data.retain(|d| d.id != placeholder_id);
                }
                tracing::warn!(error = %e, "Device creation failed, placeholder removed");
                Err(e)
            }
        }
    }

    /// Delete a device, hiding it from the list meanwhile
    pub async fn delete_device(&self, id: &str) -> ApiResult<()> {
        let removed = {
            let mut state = self.state.write().await;
            state.list.as_mut().and_then(|list| {
                let index = list.data.iter().position(|d| d.id == id)?;
                Some((index, list.data.remove(index)))
            })
        };

        match self.api.delete_device(id).await {
            Ok(()) => {
                self.state.write().await.invalidate(&[Tag::device(id)]);
                tracing::info!(id, "Device deleted");
                Ok(())
            }
            Err(e) => {
                if let Some((index, device)) = removed {
                    let mut state = self.state.write().await;
                    if let Some(list) = state.list.as_mut() {
                        // A live event may have re-added it meanwhile
                        if !list.data.iter().any(|d| d.id == device.id) {
                            let index = index.min(list.data.len());
                            list.data.insert(index, device);
                        }
                    }
                }
                tracing::warn!(id, error = %e, "Device deletion failed, restored");
                Err(e)
            }
        }
    }

    /// Mark every entry carrying any of `tags` as stale
    pub async fn invalidate(&self, tags: &[Tag]) -> usize {
        let hits = self.state.write().await.invalidate(tags);
        tracing::trace!(?tags, hits, "Invalidated tags");
        hits
    }

    // ============================================
    // Live reconciliation
    // ============================================

    /// Apply a pushed create/update: upsert into the list, merge into the
    /// single-device entry and invalidate the list, all under one lock.
    pub async fn apply_remote_upsert(&self, device: &Device) {
        let mut state = self.state.write().await;

        if let Some(list) = state.list.as_mut() {
            match list.data.iter().position(|d| d.id == device.id) {
                Some(index) => list.data[index] = device.clone(),
                None => {
                    list.data.push(device.clone());
                    list.tags.insert(Tag::device(&device.id));
                }
            }
        }

        if let Some(entry) = state.devices.get_mut(&device.id) {
            entry.data.device.merge_from(device);
        }

        state.invalidate(&[Tag::List]);
    }

    /// Apply a pushed delete: remove from the list, then invalidate the
    /// list and the device's own entry so a later read refetches.
    pub async fn apply_remote_delete(&self, id: &str) {
        let mut state = self.state.write().await;
        if let Some(list) = state.list.as_mut() {
            list.data.retain(|d| d.id != id);
        }
        state.invalidate(&[Tag::List, Tag::device(id)]);
    }

    // ============================================
    // Read-only accessors
    // ============================================

    /// Cached list without fetching, stale or not
    pub async fn cached_list(&self) -> Option<Vec<Device>> {
        self.state.read().await.list.as_ref().map(|e| e.data.clone())
    }

    /// Cached single device without fetching, stale or not
    pub async fn cached_device(&self, id: &str) -> Option<Device> {
        self.state
            .read()
            .await
            .devices
            .get(id)
            .map(|e| e.data.device.clone())
    }

    /// `None` when nothing is cached
    pub async fn is_list_stale(&self) -> Option<bool> {
        self.state.read().await.list.as_ref().map(|e| e.stale)
    }

    /// `None` when nothing is cached
    pub async fn is_device_stale(&self, id: &str) -> Option<bool> {
        self.state.read().await.devices.get(id).map(|e| e.stale)
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        let stale_list = state.list.as_ref().map(|e| e.stale as usize).unwrap_or(0);
        CacheStats {
            list_cached: state.list.is_some(),
            list_len: state.list.as_ref().map(|e| e.data.len()).unwrap_or(0),
            devices_cached: state.devices.len(),
            stale_entries: stale_list + state.devices.values().filter(|e| e.stale).count(),
            list_fetched_at: state.list.as_ref().map(|e| e.fetched_at),
        }
    }
}
