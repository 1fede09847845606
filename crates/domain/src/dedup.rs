//! Short-window guard against repeated identical purchase submissions.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{DomainError, Result};

/// Default time an accepted request keeps blocking identical resubmissions.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy)]
enum Entry {
    InFlight,
    Accepted(Instant),
}

/// Rejects a request whose fingerprint is being processed right now or was
/// accepted less than `window` ago.
///
/// A fingerprint is reserved while its request is processed. The reservation
/// becomes an acceptance stamp when the [`Permit`] is committed, and is
/// released if the permit is dropped uncommitted, so failed requests can be
/// retried immediately. Expired stamps are swept on every acquisition.
#[derive(Debug)]
pub struct DuplicateGuard {
    window: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl Default for DuplicateGuard {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_WINDOW)
    }
}

impl DuplicateGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Reserves `fingerprint`, failing with `DuplicateRequest` if it is
    /// already reserved or was accepted within the window.
    pub fn try_acquire(&self, fingerprint: String) -> Result<Permit<'_>> {
        let mut entries = self.lock();
        let now = Instant::now();
        entries.retain(|_, entry| match entry {
            Entry::InFlight => true,
            Entry::Accepted(at) => now.duration_since(*at) < self.window,
        });

        if entries.contains_key(&fingerprint) {
            return Err(DomainError::DuplicateRequest);
        }

        entries.insert(fingerprint.clone(), Entry::InFlight);
        Ok(Permit {
            guard: self,
            fingerprint: Some(fingerprint),
        })
    }

    /// Number of fingerprints currently tracked, expired ones included.
    pub fn tracked(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // The map stays consistent even if a holder panicked
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A reserved fingerprint.
#[derive(Debug)]
pub struct Permit<'a> {
    guard: &'a DuplicateGuard,
    fingerprint: Option<String>,
}

impl Permit<'_> {
    /// Marks the request as accepted; identical requests are rejected until
    /// the window elapses from now.
    pub fn commit(mut self) {
        if let Some(fingerprint) = self.fingerprint.take() {
            self.guard
                .lock()
                .insert(fingerprint, Entry::Accepted(Instant::now()));
        }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if let Some(fingerprint) = self.fingerprint.take() {
            let mut entries = self.guard.lock();
            if matches!(entries.get(&fingerprint), Some(Entry::InFlight)) {
                entries.remove(&fingerprint);
            }
        }
    }
}
