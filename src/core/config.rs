//! Engine configuration for the resource core.
//!
//! Every section has a `Default` that matches the values the engine was
//! tuned with, so a JSON file only needs to name the fields it overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Full resource-core configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Byte budget of the render resource cache.
    pub cache: CacheConfig,
    /// Concurrency bounds for asynchronous retrieval.
    pub retrieval: RetrievalConfig,
    /// Failure suppression policy.
    pub absence: AbsenceConfig,
    /// Frame hand-off settings.
    pub frames: FrameConfig,
}

impl EngineConfig {
    /// Save to file (sync)
    pub fn save_sync(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from file (sync)
    pub fn load_sync(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the core cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.cache.capacity_bytes == 0 {
            return Err(Error::Config("cache.capacity_bytes must be nonzero".into()));
        }
        if !(self.cache.low_water_ratio > 0.0 && self.cache.low_water_ratio <= 1.0) {
            return Err(Error::Config(format!(
                "cache.low_water_ratio must be in (0, 1], got {}",
                self.cache.low_water_ratio
            )));
        }
        if self.retrieval.max_local_in_flight == 0 || self.retrieval.max_remote_in_flight == 0 {
            return Err(Error::Config("retrieval in-flight bounds must be nonzero".into()));
        }
        let cooldown = self.absence.cooldown_secs;
        if !cooldown.is_finite() || cooldown < 0.0 || Duration::try_from_secs_f32(cooldown).is_err() {
            return Err(Error::Config(format!(
                "absence.cooldown_secs must be a finite, non-negative number of seconds, got {}",
                cooldown
            )));
        }
        if self.frames.channel_depth == 0 {
            return Err(Error::Config("frames.channel_depth must be nonzero".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Capacity cache budget.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum aggregate size of cached resources in bytes.
    pub capacity_bytes: usize,
    /// Fraction of capacity that eviction drains down to.
    pub low_water_ratio: f32,
    /// Entries not touched for this many frames are trimmed. 0 disables.
    pub trim_after_frames: u64,
}

impl CacheConfig {
    /// Low-water mark in bytes.
    pub fn low_water_bytes(&self) -> usize {
        (self.capacity_bytes as f64 * self.low_water_ratio as f64) as usize
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: 256 * 1024 * 1024,
            low_water_ratio: 0.75,
            trim_after_frames: 600,
        }
    }
}

/// Per request-class concurrency bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Maximum concurrent fetches from local sources.
    pub max_local_in_flight: usize,
    /// Maximum concurrent fetches from remote sources (higher latency).
    pub max_remote_in_flight: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_local_in_flight: 16,
            max_remote_in_flight: 4,
        }
    }
}

/// Absence tracker cooldown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbsenceConfig {
    /// Seconds a temporary absence suppresses retrieval.
    pub cooldown_secs: f32,
}

impl AbsenceConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::try_from_secs_f32(self.cooldown_secs.max(0.0)).unwrap_or(Duration::MAX)
    }
}

impl Default for AbsenceConfig {
    fn default() -> Self {
        Self { cooldown_secs: 60.0 }
    }
}

/// Frame hand-off settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Submitted frames that may wait for the draw side. 1 = double buffering.
    pub channel_depth: usize,
    /// Frames built up front so the first frames don't allocate.
    pub prewarm: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            channel_depth: 1,
            prewarm: 2,
        }
    }
}
