//! Concurrent, self-expiring map from verification code to pending identity
//!
//! A single `tokio::sync::Mutex` guards the map, so `put`, `take` and
//! `sweep_expired` are each atomic with respect to one another. Expiry is
//! checked on every access, so correctness never depends on the reaper having
//! run; the reaper only bounds memory.

use std::collections::HashMap;
use std::time::Duration;

use common::Secret;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::code::generate_code;
use crate::error::{Result, StoreError};

/// Lifetime of a verification code.
pub const CODE_TTL: Duration = Duration::from_secs(300);

/// How many fresh codes `put_fresh` draws before giving up on collisions.
const MAX_CODE_ATTEMPTS: usize = 8;

/// Identity obtained from the provider, before it is parked under a code.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Account key downstream; compare case-insensitively.
    pub email: String,
    pub display_name: String,
    pub picture_url: Option<String>,
    pub provider_access_token: Secret<String>,
}

/// An identity waiting to be redeemed.
#[derive(Debug, Clone)]
pub struct PendingIdentity {
    pub identity: Identity,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl PendingIdentity {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory verification code store.
///
/// Constructed once by the service and shared via `Arc` with the request
/// handlers and the reaper.
#[derive(Debug, Default)]
pub struct VerificationStore {
    entries: Mutex<HashMap<String, PendingIdentity>>,
}

impl VerificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `identity` under `code` for `ttl`.
    ///
    /// Fails with `DuplicateCode` when the code is held by an unexpired entry.
    /// An expired holder is replaced.
    pub async fn put(&self, code: String, identity: Identity, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.get(&code)
            && !existing.is_expired(now)
        {
            return Err(StoreError::DuplicateCode);
        }
        entries.insert(
            code,
            PendingIdentity {
                identity,
                created_at: now,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    /// Generate a code and park `identity` under it, drawing again on collision.
    ///
    /// Returns the code that was stored.
    pub async fn put_fresh(&self, identity: Identity, ttl: Duration) -> Result<String> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = generate_code();
            match self.put(code.clone(), identity.clone(), ttl).await {
                Ok(()) => {
                    metrics::counter!("relay_codes_issued_total").increment(1);
                    return Ok(code);
                }
                Err(StoreError::DuplicateCode) => {
                    debug!(attempt, "verification code collision, drawing again");
                }
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::DuplicateCode)
    }

    /// Remove and return the identity for `code`.
    ///
    /// `NotFound` if the code was never issued or was already taken. `Expired`
    /// if it is past its TTL; the entry is removed either way, so a code can
    /// succeed here at most once.
    pub async fn take(&self, code: &str) -> Result<PendingIdentity> {
        let now = Instant::now();
        let pending = self
            .entries
            .lock()
            .await
            .remove(code)
            .ok_or(StoreError::NotFound)?;

        if pending.is_expired(now) {
            metrics::counter!("relay_codes_expired_total").increment(1);
            return Err(StoreError::Expired);
        }
        Ok(pending)
    }

    /// Remove every entry whose TTL has passed. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let removed = {
            let mut entries = self.entries.lock().await;
            let before = entries.len();
            entries.retain(|_, pending| !pending.is_expired(now));
            before - entries.len()
        };

        if removed > 0 {
            metrics::counter!("relay_codes_expired_total").increment(removed as u64);
            info!(removed, "swept expired verification codes");
        }
        removed
    }

    /// Number of entries currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
