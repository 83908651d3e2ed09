//! # Vaxdesk Core
//!
//! Core business logic for the vaxdesk vaccination reception system.
//!
//! This crate contains the appointment lifecycle and the reception
//! workflow of a health unit:
//! - The reception state machine (`Waiting`, `CheckedIn`, `CheckedOut`,
//!   `Suspended`) with guarded transitions
//! - The reception service: check-in with time-window gating, check-out
//!   with dose recording and conditional follow-up scheduling, suspension
//!   and reactivation
//! - The filter & search engine and listing services behind the day roster
//! - Interfaces to the external collaborators (appointment store, vaccine
//!   catalog, patient registry) plus in-memory implementations
//!
//! **No API concerns**: HTTP servers, wire formats, and OpenAPI belong in
//! the `vaxdesk-run` binary.

pub mod appointment;
pub mod config;
pub mod dose;
pub mod error;
pub mod reception;
pub mod registry;
pub mod roster;
pub mod store;
pub mod vaccine;

pub use appointment::{Appointment, CheckInWindow, ReceptionState};
pub use config::CoreConfig;
pub use dose::Dose;
pub use error::{ReceptionError, ReceptionResult};
pub use reception::{CheckOut, ReceptionService};
pub use registry::{InMemoryRegistry, Patient, PatientRegistry};
pub use roster::{AppointmentDetail, RosterFilter, RosterPage, RosterRequest, RosterService};
pub use store::{AppointmentStore, InMemoryStore, TransitionScope};
pub use vaccine::{InMemoryCatalog, Regimen, Vaccine, VaccineCatalog};

pub use vaxdesk_types::{
    AppointmentId, DoseId, NonEmptyText, PatientId, TextError, UnitId, VaccineId,
};
