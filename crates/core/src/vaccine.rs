//! Vaccine catalog: reference data consumed by the reception workflow.
//!
//! The catalog maps a vaccine identifier to its display name and regimen
//! rule. It is owned elsewhere; this module defines the interface the
//! reception core consumes, plus an in-memory implementation seeded from
//! JSON for the binary and for tests.

use std::collections::HashMap;

use chrono::Duration;
use serde::Deserialize;
use vaxdesk_types::VaccineId;

use crate::error::{ReceptionError, ReceptionResult};

/// Dose-sequence rule of a vaccine: how many doses, and how long to wait
/// between them.
///
/// Intervals are indexed by sequence position: the interval at position
/// `n - 1` separates dose `n` from dose `n + 1`. A single-dose vaccine has
/// no intervals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regimen {
    intervals: Vec<Duration>,
}

impl Regimen {
    /// Builds a regimen from per-position intervals given in whole days.
    ///
    /// # Errors
    ///
    /// Returns `ReceptionError::Validation` if any interval is not
    /// strictly positive.
    pub fn from_interval_days(interval_days: Vec<i64>) -> ReceptionResult<Self> {
        if interval_days.iter().any(|d| *d <= 0) {
            return Err(ReceptionError::Validation(
                "regimen intervals must be positive day counts".into(),
            ));
        }
        Ok(Self {
            intervals: interval_days.into_iter().map(Duration::days).collect(),
        })
    }

    /// Total number of doses in the regimen.
    pub fn doses(&self) -> u32 {
        self.intervals.len() as u32 + 1
    }

    /// Interval between the dose with this 1-based sequence number and the
    /// next one, or `None` when the regimen ends with it.
    pub fn interval_after(&self, sequence_number: u32) -> Option<Duration> {
        if sequence_number == 0 {
            return None;
        }
        self.intervals.get(sequence_number as usize - 1).copied()
    }
}

/// A catalog entry.
///
/// `family` groups vaccines that count toward the same dose sequence: a
/// patient's sequence number is computed across all vaccines of one
/// family, so interchangeable products continue one regimen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vaccine {
    pub id: VaccineId,
    pub name: String,
    pub family: String,
    pub regimen: Regimen,
}

/// Read access to the vaccine catalog.
pub trait VaccineCatalog: Send + Sync {
    /// Resolves a catalog entry by id.
    fn find(&self, id: &VaccineId) -> Option<Vaccine>;

    /// All entries, ordered by display name (for selection lists).
    fn all(&self) -> Vec<Vaccine>;
}

/// Seed-file backed catalog held entirely in memory.
pub struct InMemoryCatalog {
    vaccines: HashMap<VaccineId, Vaccine>,
}

/// On-disk seed representation of one vaccine.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VaccineSeed {
    id: VaccineId,
    name: String,
    family: String,
    interval_days: Vec<i64>,
}

impl InMemoryCatalog {
    pub fn new(vaccines: impl IntoIterator<Item = Vaccine>) -> Self {
        Self {
            vaccines: vaccines.into_iter().map(|v| (v.id, v)).collect(),
        }
    }

    /// Loads a catalog from its JSON seed document (an array of entries).
    ///
    /// # Errors
    ///
    /// Returns `ReceptionError::Validation` if the document does not match
    /// the seed schema or an entry carries an invalid regimen.
    pub fn from_json(json: &str) -> ReceptionResult<Self> {
        let seeds: Vec<VaccineSeed> = serde_json::from_str(json)
            .map_err(|e| ReceptionError::Validation(format!("invalid vaccine seed: {e}")))?;

        let mut vaccines = Vec::with_capacity(seeds.len());
        for seed in seeds {
            vaccines.push(Vaccine {
                id: seed.id,
                name: seed.name,
                family: seed.family,
                regimen: Regimen::from_interval_days(seed.interval_days)?,
            });
        }
        Ok(Self::new(vaccines))
    }
}

impl VaccineCatalog for InMemoryCatalog {
    fn find(&self, id: &VaccineId) -> Option<Vaccine> {
        self.vaccines.get(id).cloned()
    }

    fn all(&self) -> Vec<Vaccine> {
        let mut all: Vec<Vaccine> = self.vaccines.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}
