//! Wire types for the REST façade.
//!
//! The domain keeps appointment state as a tagged enum; these types are
//! the flat boundary representation (status label plus nullable
//! timestamps) the presentation layer consumes. Identifiers and
//! timestamps cross the wire as strings.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use vaxdesk_core::roster::{AppointmentDetail, RosterEntry, RosterPage};
use vaxdesk_core::{Appointment, CheckOut, Dose, Patient, ReceptionError, Vaccine};

/// Health probe response.
#[derive(Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Flat view of one appointment.
#[derive(Serialize, ToSchema)]
pub struct AppointmentRes {
    pub id: String,
    pub unit_id: String,
    pub patient_id: String,
    /// Scheduled start, RFC 3339.
    pub start: String,
    /// One of `waiting`, `checked_in`, `checked_out`, `suspended`.
    pub status: String,
    pub active: bool,
    pub checked_in_at: Option<String>,
    pub checked_out_at: Option<String>,
    pub suspend_reason: Option<String>,
}

impl From<&Appointment> for AppointmentRes {
    fn from(appointment: &Appointment) -> Self {
        Self {
            id: appointment.id.to_string(),
            unit_id: appointment.unit.to_string(),
            patient_id: appointment.patient.to_string(),
            start: appointment.start.to_rfc3339(),
            status: appointment.state().label().to_string(),
            active: appointment.is_active(),
            checked_in_at: appointment.checked_in_at().map(|t| t.to_rfc3339()),
            checked_out_at: appointment.checked_out_at().map(|t| t.to_rfc3339()),
            suspend_reason: appointment
                .suspend_reason()
                .map(|reason| reason.as_str().to_string()),
        }
    }
}

/// One roster row: an appointment plus its patient's display name.
#[derive(Serialize, ToSchema)]
pub struct RosterRowRes {
    #[serde(flatten)]
    pub appointment: AppointmentRes,
    pub patient_name: String,
}

impl From<&RosterEntry> for RosterRowRes {
    fn from(entry: &RosterEntry) -> Self {
        Self {
            appointment: AppointmentRes::from(&entry.appointment),
            patient_name: entry.patient_name.as_str().to_string(),
        }
    }
}

/// One ordered page of a unit's roster.
#[derive(Serialize, ToSchema)]
pub struct ListAppointmentsRes {
    /// The filter that was actually applied.
    pub filter: String,
    pub page: u32,
    pub per_page: u32,
    /// Matching rows before pagination.
    pub total: usize,
    pub appointments: Vec<RosterRowRes>,
}

impl From<&RosterPage> for ListAppointmentsRes {
    fn from(page: &RosterPage) -> Self {
        Self {
            filter: page.filter.keyword().to_string(),
            page: page.page,
            per_page: page.per_page,
            total: page.total,
            appointments: page.entries.iter().map(RosterRowRes::from).collect(),
        }
    }
}

/// A registered patient.
#[derive(Serialize, ToSchema)]
pub struct PatientRes {
    pub id: String,
    pub name: String,
}

impl From<&Patient> for PatientRes {
    fn from(patient: &Patient) -> Self {
        Self {
            id: patient.id.to_string(),
            name: patient.name.as_str().to_string(),
        }
    }
}

/// An administered dose.
#[derive(Serialize, ToSchema)]
pub struct DoseRes {
    pub id: String,
    pub vaccine_id: String,
    pub patient_id: String,
    pub appointment_id: String,
    pub sequence_number: u32,
    pub follow_up_appointment_id: Option<String>,
    /// Administration time, RFC 3339.
    pub administered_at: String,
}

impl From<&Dose> for DoseRes {
    fn from(dose: &Dose) -> Self {
        Self {
            id: dose.id.to_string(),
            vaccine_id: dose.vaccine.to_string(),
            patient_id: dose.patient.to_string(),
            appointment_id: dose.appointment.to_string(),
            sequence_number: dose.sequence_number,
            follow_up_appointment_id: dose.follow_up_appointment.map(|id| id.to_string()),
            administered_at: dose.administered_at.to_rfc3339(),
        }
    }
}

/// A catalog entry.
#[derive(Serialize, ToSchema)]
pub struct VaccineRes {
    pub id: String,
    pub name: String,
    pub family: String,
    /// Total doses in the regimen.
    pub doses: u32,
}

impl From<&Vaccine> for VaccineRes {
    fn from(vaccine: &Vaccine) -> Self {
        Self {
            id: vaccine.id.to_string(),
            name: vaccine.name.clone(),
            family: vaccine.family.clone(),
            doses: vaccine.regimen.doses(),
        }
    }
}

/// Appointment detail: the appointment, its patient, the patient's other
/// appointments and dose history, and the vaccine selection list.
#[derive(Serialize, ToSchema)]
pub struct AppointmentDetailRes {
    pub appointment: AppointmentRes,
    pub patient: PatientRes,
    pub other_appointments: Vec<AppointmentRes>,
    pub doses: Vec<DoseRes>,
    pub vaccines: Vec<VaccineRes>,
}

impl From<&AppointmentDetail> for AppointmentDetailRes {
    fn from(detail: &AppointmentDetail) -> Self {
        Self {
            appointment: AppointmentRes::from(&detail.appointment),
            patient: PatientRes::from(&detail.patient),
            other_appointments: detail
                .other_appointments
                .iter()
                .map(AppointmentRes::from)
                .collect(),
            doses: detail.doses.iter().map(DoseRes::from).collect(),
            vaccines: detail.vaccines.iter().map(VaccineRes::from).collect(),
        }
    }
}

/// Scheduling request from the external booking process.
#[derive(Deserialize, ToSchema)]
pub struct ScheduleAppointmentReq {
    pub patient_id: String,
    /// Scheduled start, RFC 3339.
    pub start: String,
}

/// Check-out request body.
#[derive(Deserialize, ToSchema)]
pub struct CheckOutReq {
    pub vaccine_id: Option<String>,
}

/// Suspension request body.
#[derive(Deserialize, ToSchema)]
pub struct SuspendReq {
    pub reason: String,
}

/// Check-out response: the dose, the follow-up when the regimen requires
/// one, and the operator notice derived from its presence.
#[derive(Serialize, ToSchema)]
pub struct CheckOutRes {
    pub dose: DoseRes,
    pub follow_up: Option<AppointmentRes>,
    pub notice: String,
}

impl From<&CheckOut> for CheckOutRes {
    fn from(checked_out: &CheckOut) -> Self {
        let notice = match &checked_out.follow_up {
            Some(follow_up) => format!(
                "Dose {} received; next dose scheduled for {}",
                checked_out.dose.sequence_number,
                follow_up.start.format("%Y-%m-%d")
            ),
            None => format!(
                "Dose {} received; vaccination complete",
                checked_out.dose.sequence_number
            ),
        };
        Self {
            dose: DoseRes::from(&checked_out.dose),
            follow_up: checked_out.follow_up.as_ref().map(AppointmentRes::from),
            notice,
        }
    }
}

/// Error payload shared by every endpoint.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// An error response ready to leave the façade.
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn unprocessable(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            code,
            message: message.into(),
        }
    }
}

impl From<ReceptionError> for ApiError {
    fn from(err: ReceptionError) -> Self {
        if err.is_guard_refusal() {
            tracing::warn!("reception guard refused: {err}");
        } else {
            tracing::error!("reception operation failed: {err}");
        }

        let (status, code) = match &err {
            ReceptionError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            ReceptionError::NotApplicable => (StatusCode::NOT_FOUND, "not_applicable"),
            ReceptionError::OutsideCheckInWindow => {
                (StatusCode::UNPROCESSABLE_ENTITY, "outside_check_in_window")
            }
            ReceptionError::MissingVaccineSelection => {
                (StatusCode::UNPROCESSABLE_ENTITY, "missing_vaccine_selection")
            }
            ReceptionError::Validation(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "validation_failure")
            }
            ReceptionError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_failure"),
        };
        Self {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
