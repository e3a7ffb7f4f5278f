//! Opaque random tokens (OAuth `state`, session ids, locally minted auth tokens)

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;

/// Generate `n_bytes` of randomness from the thread-local CSPRNG and encode
/// it as URL-safe base64 without padding.
pub fn random_token(n_bytes: usize) -> String {
    let mut bytes = vec![0u8; n_bytes];
    rand::rng().fill(bytes.as_mut_slice());
    URL_SAFE_NO_PAD.encode(bytes)
}
