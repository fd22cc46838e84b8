//! Random rendezvous keys drawn from the configured alphabet.

use anyhow::{ensure, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Mutex;

use crate::common::{AppConfig, TransferError};
use crate::session::SessionStore;

/// Attempts before key issuance gives up.
pub const KEY_TRIES: usize = 3;

pub struct KeyGenerator {
    charset: Vec<char>,
    length: usize,
    rng: Mutex<StdRng>,
}

impl KeyGenerator {
    /// Seeds once from OS entropy.
    pub fn new(charset: &str, length: usize) -> Result<Self> {
        Self::with_rng(charset, length, StdRng::from_entropy())
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(&config.key_charset, config.key_length)
    }

    /// Fails on an empty alphabet or a zero length.
    pub fn with_rng(charset: &str, length: usize, rng: StdRng) -> Result<Self> {
        ensure!(!charset.is_empty(), "key charset must not be empty");
        ensure!(length > 0, "key length must be at least 1");
        Ok(Self {
            charset: charset.chars().collect(),
            length,
            rng: Mutex::new(rng),
        })
    }

    /// A candidate key; not checked against any store.
    pub fn new_key(&self) -> String {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Key generator lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        (0..self.length)
            .map(|_| self.charset[rng.gen_range(0..self.charset.len())])
            .collect()
    }

    /// A key not currently registered in `store`.
    ///
    /// This only guarantees the key was free when issued; the atomic
    /// reservation happens when an upload calls `SessionStore::create`.
    pub fn new_unique_key<S>(&self, store: &SessionStore<S>) -> Result<String, TransferError> {
        for _ in 0..KEY_TRIES {
            let key = self.new_key();
            if !store.contains(&key) {
                return Ok(key);
            }
        }
        tracing::warn!(tries = KEY_TRIES, "key issuance exhausted retries");
        Err(TransferError::ExhaustedKeySpace)
    }

    /// Whether `key` has the configured length and only uses the alphabet.
    pub fn is_valid(&self, key: &str) -> bool {
        key.chars().count() == self.length && key.chars().all(|c| self.charset.contains(&c))
    }
}
