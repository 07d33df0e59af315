//! Jittered-backoff retry for transient store reads.
//!
//! Writes are never retried here: a write that failed may have partially
//! landed, and the store contract already demands transactional writes.

use std::future::Future;

use rand::Rng;
use tokio::time::{sleep, Duration};

use crate::error::Result;

const BACKOFF_MS: [u64; 3] = [50, 200, 800];

/// Runs `op`, retrying transient failures up to three times with jittered
/// backoff before surfacing the last error.
pub async fn with_read_retries<T, F, Fut>(mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0usize;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < BACKOFF_MS.len() => {
                let base = BACKOFF_MS[attempt];
                let jitter = rand::thread_rng().gen_range(0..=base / 2);
                log::warn!("transient store error, retrying in {}ms: {error}", base + jitter);
                sleep(Duration::from_millis(base + jitter)).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
