//! Process-wide resource limits: the bounded allocator budget and the
//! connection/message-size guards.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single atomic counter of bytes reserved by every store, rather than a
/// per-store allocator, because snapshots and global operations need one
/// authoritative figure.
pub struct BoundedAllocator {
    limit: u64,
    used: AtomicU64,
}

impl BoundedAllocator {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            used: AtomicU64::new(0),
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used())
    }

    /// Reserves `bytes` against the budget. Fails without changing any state
    /// if the reservation would exceed `limit`.
    pub fn reserve(&self, bytes: u64) -> Result<()> {
        loop {
            let current = self.used.load(Ordering::SeqCst);
            let next = current
                .checked_add(bytes)
                .ok_or(Error::AllocationCapacityOverflow)?;
            if next > self.limit {
                return Err(Error::AllocationCapacityOverflow);
            }
            if self
                .used
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    /// Returns `bytes` to the budget, e.g. on delete or abort-after-reserve.
    pub fn release(&self, bytes: u64) {
        self.used.fetch_sub(bytes, Ordering::SeqCst);
    }
}

/// Connection id assigned by [`ConnectionLimiter::admit`].
pub type ConnectionId = u64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: ConnectionId,
    pub address: String,
    pub connected_at_unix_ms: u64,
}

/// Admits connections up to `maximum_clients` and tracks connected peers.
pub struct ConnectionLimiter {
    maximum_clients: usize,
    clients: Mutex<HashMap<ConnectionId, ClientInfo>>,
    next_id: AtomicU64,
}

impl ConnectionLimiter {
    pub fn new(maximum_clients: usize) -> Self {
        Self {
            maximum_clients,
            clients: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn admit(&self, address: String) -> Result<ConnectionId> {
        let mut clients = self.clients.lock();
        if clients.len() >= self.maximum_clients {
            return Err(Error::TooManyClients);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let connected_at_unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        clients.insert(
            id,
            ClientInfo {
                id,
                address,
                connected_at_unix_ms,
            },
        );
        Ok(id)
    }

    pub fn remove(&self, id: ConnectionId) {
        self.clients.lock().remove(&id);
    }

    pub fn list(&self) -> Vec<ClientInfo> {
        self.clients.lock().values().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.clients.lock().len()
    }
}

/// Rejects an oversize message before it's decoded.
pub fn check_message_size(byte_len: usize, max_message_size: usize) -> Result<()> {
    if byte_len > max_message_size {
        Err(Error::MessageTooLarge)
    } else {
        Ok(())
    }
}
