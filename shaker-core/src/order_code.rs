//! Six-digit order code allocation.

use std::ops::RangeInclusive;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::config::{ORDER_CODE_MAX, ORDER_CODE_MIN};
use crate::error::CreationError;
use crate::store::RecordStore;

pub const ORDER_CODE_RANGE: RangeInclusive<u32> = ORDER_CODE_MIN..=ORDER_CODE_MAX;

/// Draw one candidate code. Exposed so tests can replay a seeded generator.
pub fn draw_candidate<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    rng.random_range(ORDER_CODE_RANGE)
}

/// Picks order codes that no existing record uses.
///
/// Each candidate costs one `find_by_code` lookup. Two concurrent runs can still
/// race on the same candidate; the record store's unique constraint catches that
/// and the caller retries the insert with a fresh code.
pub struct OrderCodeAllocator {
    rng: Mutex<Box<dyn RngCore + Send>>,
    max_attempts: usize,
}

impl OrderCodeAllocator {
    /// Allocator backed by an OS-seeded generator.
    pub fn new(max_attempts: usize) -> Self {
        Self::with_rng(StdRng::from_os_rng(), max_attempts)
    }

    /// Allocator with an injected generator, for deterministic tests.
    pub fn with_rng<R: RngCore + Send + 'static>(rng: R, max_attempts: usize) -> Self {
        Self {
            rng: Mutex::new(Box::new(rng)),
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    fn next_candidate(&self) -> u32 {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        draw_candidate(&mut *rng)
    }

    /// Return a code not present in `records` at lookup time.
    pub async fn allocate(&self, records: &dyn RecordStore) -> Result<String, CreationError> {
        for attempt in 1..=self.max_attempts {
            let code = self.next_candidate().to_string();

            let existing = records
                .find_by_code(&code)
                .await
                .map_err(CreationError::CodeLookup)?;

            if existing.is_none() {
                tracing::debug!(code = %code, attempt, "Allocated order code");
                return Ok(code);
            }
            tracing::debug!(code = %code, attempt, "Order code already taken");
        }

        tracing::warn!(
            attempts = self.max_attempts,
            "Exhausted order code attempts"
        );
        Err(CreationError::AllocationExhausted {
            attempts: self.max_attempts,
        })
    }
}
