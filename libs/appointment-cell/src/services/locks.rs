use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

/// Held doctor locks; dropping it releases them.
pub struct DoctorLease {
    _guards: Vec<OwnedMutexGuard<()>>,
}

/// One async mutex per doctor. Check-and-write sequences for the same doctor
/// run one at a time; different doctors proceed in parallel.
#[derive(Default)]
pub struct DoctorLocks {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl DoctorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, doctor_id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(doctor_id).or_default().clone()
    }

    pub async fn acquire(&self, doctor_id: Uuid) -> DoctorLease {
        let guard = self.lock_for(doctor_id).lock_owned().await;
        debug!("Acquired scheduling lock for doctor {}", doctor_id);
        DoctorLease { _guards: vec![guard] }
    }

    /// Lock two doctors, always in id order so concurrent callers cannot
    /// deadlock. The same doctor twice takes a single lock.
    pub async fn acquire_pair(&self, first: Uuid, second: Uuid) -> DoctorLease {
        if first == second {
            return self.acquire(first).await;
        }

        let (low, high) = if first < second { (first, second) } else { (second, first) };
        let low_guard = self.lock_for(low).lock_owned().await;
        let high_guard = self.lock_for(high).lock_owned().await;
        debug!("Acquired scheduling locks for doctors {} and {}", low, high);

        DoctorLease {
            _guards: vec![low_guard, high_guard],
        }
    }
}
