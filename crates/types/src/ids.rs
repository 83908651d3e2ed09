//! Strongly typed identifiers.
//!
//! Every entity in the system carries its own identifier newtype so that a
//! patient id can never be passed where an appointment id is expected. All
//! identifiers wrap a v4 UUID and serialise as the plain UUID string.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Allocates a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parses an identifier from its canonical string form.
            pub fn parse(input: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(input).map(Self)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

entity_id!(
    /// Identifier of a health unit.
    UnitId
);
entity_id!(
    /// Identifier of a patient in the external registry.
    PatientId
);
entity_id!(
    /// Identifier of a vaccination appointment.
    AppointmentId
);
entity_id!(
    /// Identifier of a vaccine in the external catalog.
    VaccineId
);
entity_id!(
    /// Identifier of an administered dose.
    DoseId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_canonical_form() {
        let id = AppointmentId::new();
        let text = id.to_string();
        let parsed = AppointmentId::parse(&text).expect("parse id");
        assert_eq!(parsed, id);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(PatientId::parse("not-a-uuid").is_err());
    }
}
