// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Process-wide single-instance lease for embedded runtimes.
//!
//! Most embeddable runtimes are process singletons. A [`RuntimeLease`]
//! is held by the initialized handle for as long as it owns the runtime;
//! acquiring a second lease on the same key fails until the first is
//! dropped.

use crate::RuntimeError;
use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

static ACTIVE: Mutex<BTreeSet<String>> = Mutex::new(BTreeSet::new());

/// RAII token for exclusive use of an embedded runtime resource.
#[derive(Debug)]
pub struct RuntimeLease {
    key: String,
}

impl RuntimeLease {
    /// Acquires the lease for `key`.
    ///
    /// Fails with [`RuntimeError::AlreadyActive`] if it is already held.
    pub fn acquire(key: &str) -> Result<Self, RuntimeError> {
        let mut active = ACTIVE.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(key.to_string()) {
            return Err(RuntimeError::AlreadyActive(key.to_string()));
        }
        tracing::debug!(resource = key, "runtime lease acquired");
        Ok(Self {
            key: key.to_string(),
        })
    }

    /// Returns `true` if some handle currently holds `key`.
    pub fn is_held(key: &str) -> bool {
        ACTIVE
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    /// Returns the leased resource key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for RuntimeLease {
    fn drop(&mut self) {
        ACTIVE
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
        tracing::debug!(resource = %self.key, "runtime lease released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive() {
        let first = RuntimeLease::acquire("lease-test-exclusive").unwrap();
        assert!(matches!(
            RuntimeLease::acquire("lease-test-exclusive"),
            Err(RuntimeError::AlreadyActive(_))
        ));
        assert!(RuntimeLease::is_held("lease-test-exclusive"));
        drop(first);
        assert!(!RuntimeLease::is_held("lease-test-exclusive"));
        let again = RuntimeLease::acquire("lease-test-exclusive").unwrap();
        assert_eq!(again.key(), "lease-test-exclusive");
    }

    #[test]
    fn test_independent_keys() {
        let _a = RuntimeLease::acquire("lease-test-a").unwrap();
        let _b = RuntimeLease::acquire("lease-test-b").unwrap();
    }
}
