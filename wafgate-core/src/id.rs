use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of generated transaction identifiers.
pub const TRANSACTION_ID_LEN: usize = 16;

/// Process-wide generator, seeded once from the clock and shared by every
/// worker.
static RNG: Lazy<Mutex<StdRng>> = Lazy::new(|| {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    Mutex::new(StdRng::seed_from_u64(seed))
});

/// Pseudorandom `[a-zA-Z]` string of length `n`. Safe to call concurrently.
pub fn random_string(n: usize) -> String {
    // A poisoned lock still holds a perfectly usable generator.
    let mut rng = RNG.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    (0..n)
        .map(|_| LETTERS[rng.random_range(0..LETTERS.len())] as char)
        .collect()
}

pub fn transaction_id() -> String {
    random_string(TRANSACTION_ID_LEN)
}
