//! Administered dose records.

use chrono::{DateTime, Utc};
use vaxdesk_types::{AppointmentId, DoseId, PatientId, VaccineId};

/// A single administered dose, written at check-out and immutable from
/// then on.
///
/// `sequence_number` is the 1-based position of this dose within the
/// vaccine's regimen family for this patient. `follow_up_appointment`
/// links to the next appointment when the regimen required one; its
/// absence means the regimen is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dose {
    pub id: DoseId,
    pub vaccine: VaccineId,
    pub patient: PatientId,
    pub appointment: AppointmentId,
    pub sequence_number: u32,
    pub follow_up_appointment: Option<AppointmentId>,
    pub administered_at: DateTime<Utc>,
}
