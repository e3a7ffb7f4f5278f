//! 6-digit verification code generation

use rand::RngExt;

/// Number of digits in a verification code.
pub const CODE_DIGITS: usize = 6;

/// Generate a zero-padded 6-digit numeric code from the thread-local CSPRNG.
pub fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{n:06}")
}
