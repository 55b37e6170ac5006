//! # Shared Pool
//!
//! [`PoolService`] assumes one caller at a time. Hosts that call it from
//! several threads go through [`SharedPool`], which holds a single exclusive
//! lock for the whole of each operation. Finer locks would let another caller
//! see the extraction loop's active set change underneath it.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::service::PoolService;

/// Thread-safe handle to a [`PoolService`].
#[derive(Clone, Debug)]
pub struct SharedPool {
    inner: Arc<Mutex<PoolService>>,
}

impl SharedPool {
    /// Wraps a service for shared use.
    #[must_use]
    pub fn new(service: PoolService) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }

    /// Runs `op` with exclusive access to the service.
    pub fn with<R>(&self, op: impl FnOnce(&mut PoolService) -> R) -> R {
        let mut service = self.inner.lock();
        op(&mut service)
    }
}
