//! Short-lived verification codes bridging a browser login to a desktop client
//!
//! After the OAuth callback succeeds, the signed-in identity is parked here
//! under a random 6-digit code that the user types into the client. The
//! client later redeems the code exactly once.
//!
//! Code lifecycle:
//! 1. Callback handler calls `VerificationStore::put_fresh()` → code shown in browser
//! 2. Client posts the code → `VerificationStore::take()` removes and returns the identity
//! 3. Codes never redeemed expire after their TTL; `take()` reports them as
//!    `Expired` and the reaper (`spawn_reaper`) sweeps them out periodically

pub mod code;
pub mod error;
pub mod reaper;
pub mod store;

pub use code::generate_code;
pub use error::{Result, StoreError};
pub use reaper::{SWEEP_INTERVAL, spawn_reaper};
pub use store::{CODE_TTL, Identity, PendingIdentity, VerificationStore};
