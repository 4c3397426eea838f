//! Per-screen version history
//!
//! A `VersionStore` is the ordered history of one screen of one asset group.
//! Two invariants hold at all times:
//!
//! - once any version exists, `current` names a version that is still in the history
//! - version numbers come from a monotonic counter and are never reused, even after
//!   the version they named was deleted
//!
//! The store knows nothing about asset groups; the registry adds that context when
//! it turns a `VersionError` into a caller-facing error.

use serde::{Deserialize, Serialize};

use crate::storage::types::{AssetVersion, NewVersion};

/// Failure of a single-store operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionError {
    NotFound(u64),
    IsCurrent(u64),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStore {
    versions: Vec<AssetVersion>,
    current: Option<u64>,
    next_version: u64,
}

impl Default for VersionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionStore {
    pub fn new() -> Self {
        Self {
            versions: Vec::new(),
            current: None,
            next_version: 1,
        }
    }

    /// Rebuild a store from persisted parts, rejecting data that breaks the invariants.
    pub fn from_parts(
        mut versions: Vec<AssetVersion>,
        current: Option<u64>,
        next_version: u64,
    ) -> anyhow::Result<Self> {
        versions.sort_by_key(|v| v.version_number);
        if versions.windows(2).any(|w| w[0].version_number == w[1].version_number) {
            anyhow::bail!("duplicate version numbers in history");
        }
        let max = versions.last().map(|v| v.version_number).unwrap_or(0);
        // Older databases may not carry the counter; never hand out a used number.
        let next_version = next_version.max(max + 1);

        match current {
            Some(n) if !versions.iter().any(|v| v.version_number == n) => {
                anyhow::bail!("current version {} is not in history", n)
            }
            None if !versions.is_empty() => {
                anyhow::bail!("non-empty history without a current version")
            }
            _ => {}
        }

        Ok(Self {
            versions,
            current,
            next_version,
        })
    }

    /// Append a new version, make it current, and return its number
    pub fn push(&mut self, new: NewVersion, created_at: i64) -> u64 {
        let number = self.next_version;
        self.next_version += 1;
        self.versions.push(AssetVersion {
            version_number: number,
            content_ref: new.content_ref,
            prompt: new.prompt,
            created_at,
            media: new.media,
            origin: new.origin,
            derived_from: new.derived_from,
        });
        self.current = Some(number);
        self.check_invariants();
        number
    }

    pub fn set_current(&mut self, number: u64) -> Result<(), VersionError> {
        if self.get(number).is_none() {
            return Err(VersionError::NotFound(number));
        }
        self.current = Some(number);
        self.check_invariants();
        Ok(())
    }

    /// Remove a non-current version from history
    pub fn delete(&mut self, number: u64) -> Result<AssetVersion, VersionError> {
        if self.current == Some(number) {
            return Err(VersionError::IsCurrent(number));
        }
        let pos = self
            .versions
            .iter()
            .position(|v| v.version_number == number)
            .ok_or(VersionError::NotFound(number))?;
        let removed = self.versions.remove(pos);
        self.check_invariants();
        Ok(removed)
    }

    pub fn get(&self, number: u64) -> Option<&AssetVersion> {
        self.versions.iter().find(|v| v.version_number == number)
    }

    pub fn current(&self) -> Option<&AssetVersion> {
        self.current.and_then(|n| self.get(n))
    }

    pub fn current_number(&self) -> Option<u64> {
        self.current
    }

    /// History, oldest first
    pub fn versions(&self) -> &[AssetVersion] {
        &self.versions
    }

    /// The number the next pushed version will receive
    pub fn next_version(&self) -> u64 {
        self.next_version
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    fn check_invariants(&self) {
        if let Some(n) = self.current {
            assert!(
                self.get(n).is_some(),
                "current version {} missing from history",
                n
            );
        } else {
            assert!(self.versions.is_empty(), "history without current version");
        }
        debug_assert!(
            self.versions
                .windows(2)
                .all(|w| w[0].version_number < w[1].version_number),
            "version numbers out of order"
        );
        debug_assert!(
            self.versions
                .last()
                .is_none_or(|v| v.version_number < self.next_version),
            "version counter behind history"
        );
    }
}
