use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use oracle_core::{LockHandle, StoreError, StoreResult};

#[derive(Debug, Clone, Copy)]
struct Lease {
    token: Uuid,
    expires_at: Instant,
}

/// Named write locks with a time-to-live. A lease that outlives its TTL is
/// treated as abandoned and may be taken by the next caller.
#[derive(Debug)]
pub struct LeaseLock {
    ttl: Duration,
    leases: Mutex<HashMap<String, Lease>>,
}

impl LeaseLock {
    /// Locks whose leases last `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            leases: Mutex::new(HashMap::new()),
        }
    }

    /// Take the lock on `resource`.
    pub fn acquire(&self, resource: &str) -> StoreResult<LockHandle> {
        let now = Instant::now();
        let mut leases = self.leases.lock();
        if let Some(lease) = leases.get(resource) {
            if lease.expires_at > now {
                return Err(StoreError::LockContention(resource.to_owned()));
            }
            debug!(resource, "Taking over expired lease");
        }
        let token = Uuid::new_v4();
        leases.insert(
            resource.to_owned(),
            Lease {
                token,
                expires_at: now + self.ttl,
            },
        );
        Ok(LockHandle {
            resource: resource.to_owned(),
            token,
        })
    }

    /// Release a lock. Fails if the lease was taken over or never existed.
    pub fn release(&self, handle: &LockHandle) -> StoreResult<()> {
        let mut leases = self.leases.lock();
        match leases.get(&handle.resource) {
            Some(lease) if lease.token == handle.token => {
                leases.remove(&handle.resource);
                Ok(())
            }
            _ => Err(StoreError::LockNotHeld(handle.resource.clone())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn second_holder_is_refused_until_release() {
        let lock = LeaseLock::new(Duration::from_secs(60));
        let handle = lock.acquire("messages/a").unwrap();
        assert!(matches!(
            lock.acquire("messages/a"),
            Err(StoreError::LockContention(_))
        ));
        // other resources are independent
        lock.acquire("messages/b").unwrap();

        lock.release(&handle).unwrap();
        lock.acquire("messages/a").unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn expired_lease_can_be_taken_over() {
        let lock = LeaseLock::new(Duration::from_secs(60));
        let stale = lock.acquire("transactions/a").unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        let fresh = lock.acquire("transactions/a").unwrap();
        assert_ne!(stale.token, fresh.token);

        // the stale holder no longer owns it
        assert!(matches!(lock.release(&stale), Err(StoreError::LockNotHeld(_))));
        lock.release(&fresh).unwrap();
    }
}
