//! Modification-time filter.

use std::collections::HashMap;
use std::time::SystemTime;

use chrono::{Local, NaiveDate, TimeZone, Utc};

use rag_core::{FileMetadata, RagError, Result};

/// Exclusive upper bound on source modification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateCutoff {
    instant: SystemTime,
}

impl DateCutoff {
    /// Parse `YYYY-MM-DD` as local midnight of that day.
    pub fn parse(value: &str) -> Result<Self> {
        let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
            RagError::invalid_argument(format!("date must be YYYY-MM-DD, got {:?}", value))
        })?;
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| RagError::invalid_argument(format!("invalid date {:?}", value)))?;

        let instant = match Local.from_local_datetime(&midnight).earliest() {
            Some(local) => SystemTime::from(local),
            // Midnight skipped by a DST transition.
            None => SystemTime::from(Utc.from_utc_datetime(&midnight)),
        };

        Ok(Self { instant })
    }

    pub fn from_system_time(instant: SystemTime) -> Self {
        Self { instant }
    }

    /// Parse an optional flag value.
    pub fn parse_optional(value: Option<&str>) -> Result<Option<Self>> {
        value.map(Self::parse).transpose()
    }

    pub fn instant(&self) -> SystemTime {
        self.instant
    }

    /// A known mtime strictly before the cutoff passes; unknown fails.
    pub fn admits(&self, mtime: Option<SystemTime>) -> bool {
        matches!(mtime, Some(t) if t < self.instant)
    }
}

/// Filesystem-backed modification times.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMetadata;

impl FileMetadata for FsMetadata {
    fn mod_time(&self, path: &str) -> Option<SystemTime> {
        std::fs::metadata(path).and_then(|m| m.modified()).ok()
    }
}

/// Per-call cache so each source is stat'ed once.
pub(crate) struct MtimeCache<'a> {
    metadata: &'a dyn FileMetadata,
    seen: HashMap<String, Option<SystemTime>>,
}

impl<'a> MtimeCache<'a> {
    pub fn new(metadata: &'a dyn FileMetadata) -> Self {
        Self {
            metadata,
            seen: HashMap::new(),
        }
    }

    pub fn get(&mut self, path: &str) -> Option<SystemTime> {
        if let Some(cached) = self.seen.get(path) {
            return *cached;
        }
        let mtime = self.metadata.mod_time(path);
        self.seen.insert(path.to_string(), mtime);
        mtime
    }
}
