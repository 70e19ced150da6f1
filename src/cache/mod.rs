//! Device Query / Mutation Cache
//!
//! - [`DeviceCache`]: tag-invalidated cache with optimistic mutations
//! - [`Tag`]: invalidation labels

mod store;
mod tags;

pub use store::{CacheStats, DeviceCache, PLACEHOLDER_PREFIX};
pub use tags::Tag;

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory [`DeviceApi`] for cache and reducer tests

    use crate::api::{ApiError, ApiResult, DeviceApi};
    use crate::device::{Device, DevicePatch};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::{Notify, Semaphore};

    #[derive(Default)]
    pub struct FakeDeviceApi {
        devices: Mutex<Vec<Device>>,
        list_calls: AtomicUsize,
        get_calls: AtomicUsize,
        created: AtomicUsize,
        fail_next: AtomicBool,
        gate: Mutex<Option<Arc<Semaphore>>>,
        pending: Notify,
    }

    impl FakeDeviceApi {
        pub fn with_devices(devices: Vec<Device>) -> Self {
            Self {
                devices: Mutex::new(devices),
                ..Default::default()
            }
        }

        pub fn list_calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }

        pub fn get_calls(&self) -> usize {
            self.get_calls.load(Ordering::SeqCst)
        }

        /// Make the next mutation fail
        pub fn fail_next(&self) {
            self.fail_next.store(true, Ordering::SeqCst);
        }

        /// Block mutations until the returned semaphore gets a permit
        pub fn hold(&self) -> Arc<Semaphore> {
            let gate = Arc::new(Semaphore::new(0));
            *self.gate.lock().unwrap() = Some(gate.clone());
            gate
        }

        /// Resolve once a mutation has reached the server side
        pub async fn wait_for_pending(&self) {
            self.pending.notified().await;
        }

        async fn mutation(&self) -> ApiResult<()> {
            self.pending.notify_one();
            let gate = self.gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.acquire().await.unwrap().forget();
            }
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(ApiError::Rejected {
                    status: 500,
                    message: "refused".to_string(),
                });
            }
            Ok(())
        }
    }

    fn not_found() -> ApiError {
        ApiError::Rejected {
            status: 404,
            message: "Not found".to_string(),
        }
    }

    #[async_trait]
    impl DeviceApi for FakeDeviceApi {
        async fn list_devices(&self) -> ApiResult<Vec<Device>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.devices.lock().unwrap().clone())
        }

        async fn get_device(&self, id: &str, _with_timeline: bool) -> ApiResult<Device> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            let devices = self.devices.lock().unwrap();
            devices
                .iter()
                .find(|d| d.id == id)
                .cloned()
                .ok_or_else(not_found)
        }

        async fn update_device(&self, id: &str, patch: &DevicePatch) -> ApiResult<Device> {
            self.mutation().await?;
            let mut devices = self.devices.lock().unwrap();
            let device = devices
                .iter_mut()
                .find(|d| d.id == id)
                .ok_or_else(not_found)?;
            patch.apply(device);
            Ok(device.clone())
        }

        async fn create_device(&self) -> ApiResult<Device> {
            self.mutation().await?;
            let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
            let device = Device::new(format!("new-{}", n));
            self.devices.lock().unwrap().push(device.clone());
            Ok(device)
        }

        async fn delete_device(&self, id: &str) -> ApiResult<()> {
            self.mutation().await?;
            self.devices.lock().unwrap().retain(|d| d.id != id);
            Ok(())
        }
    }
}
