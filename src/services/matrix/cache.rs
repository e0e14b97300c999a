//! File-backed travel-time cache
//!
//! Owned by the caller: load it at startup, hand it to whatever fills the
//! matrix, flush it on shutdown. Nothing here is global.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::types::Coordinates;

pub struct TravelTimeCache {
    path: PathBuf,
    entries: BTreeMap<String, f64>,
    dirty: bool,
}

impl TravelTimeCache {
    /// Empty cache that will flush to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Load entries from `path`. A missing file yields an empty cache.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            debug!("No travel-time cache at {}, starting empty", path.display());
            return Ok(Self::new(path));
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read travel-time cache '{}'", path.display()))?;
        let entries: BTreeMap<String, f64> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse travel-time cache '{}'", path.display()))?;

        info!(entries = entries.len(), "Loaded travel-time cache from {}", path.display());
        Ok(Self { path, entries, dirty: false })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, from: &Coordinates, to: &Coordinates) -> Option<f64> {
        self.entries.get(&key(from, to)).copied()
    }

    pub fn insert(&mut self, from: &Coordinates, to: &Coordinates, minutes: f64) {
        self.entries.insert(key(from, to), minutes);
        self.dirty = true;
    }

    /// Cached value, or compute, remember and return it
    pub fn get_or_insert_with(
        &mut self,
        from: &Coordinates,
        to: &Coordinates,
        compute: impl FnOnce() -> f64,
    ) -> f64 {
        if let Some(minutes) = self.get(from, to) {
            return minutes;
        }
        let minutes = compute();
        self.insert(from, to, minutes);
        minutes
    }

    /// Write entries back to disk if anything changed since load
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache directory '{}'", parent.display()))?;
        }

        let json = serde_json::to_string(&self.entries).context("Failed to serialize travel-time cache")?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write travel-time cache '{}'", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace travel-time cache '{}'", self.path.display()))?;

        self.dirty = false;
        info!(entries = self.entries.len(), "Flushed travel-time cache to {}", self.path.display());
        Ok(())
    }
}

/// Direction matters: the matrix may be asymmetric.
fn key(from: &Coordinates, to: &Coordinates) -> String {
    format!("{:.5},{:.5}|{:.5},{:.5}", from.lat, from.lng, to.lat, to.lng)
}
