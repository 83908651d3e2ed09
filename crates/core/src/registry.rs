//! Patient registry: external reference data.
//!
//! The reception core consumes patient identity and display name (for
//! search and ordering) from a registry it does not own. The in-memory
//! implementation is seeded from JSON.

use std::collections::HashMap;

use serde::Deserialize;
use vaxdesk_types::{NonEmptyText, PatientId};

use crate::error::{ReceptionError, ReceptionResult};

/// A registered patient, as the reception workflow sees one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patient {
    pub id: PatientId,
    pub name: NonEmptyText,
}

/// Read access to the patient registry.
pub trait PatientRegistry: Send + Sync {
    fn find(&self, id: &PatientId) -> Option<Patient>;
}

/// Seed-file backed registry held entirely in memory.
pub struct InMemoryRegistry {
    patients: HashMap<PatientId, Patient>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PatientSeed {
    id: PatientId,
    name: NonEmptyText,
}

impl InMemoryRegistry {
    pub fn new(patients: impl IntoIterator<Item = Patient>) -> Self {
        Self {
            patients: patients.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    /// Loads a registry from its JSON seed document (an array of entries).
    ///
    /// # Errors
    ///
    /// Returns `ReceptionError::Validation` if the document does not match
    /// the seed schema.
    pub fn from_json(json: &str) -> ReceptionResult<Self> {
        let seeds: Vec<PatientSeed> = serde_json::from_str(json)
            .map_err(|e| ReceptionError::Validation(format!("invalid patient seed: {e}")))?;

        Ok(Self::new(seeds.into_iter().map(|s| Patient {
            id: s.id,
            name: s.name,
        })))
    }
}

impl PatientRegistry for InMemoryRegistry {
    fn find(&self, id: &PatientId) -> Option<Patient> {
        self.patients.get(id).cloned()
    }
}
