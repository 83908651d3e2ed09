//! Appointment store: the persistence seam of the reception workflow.
//!
//! The store owns two things the rest of the core treats as primitives:
//!
//! - **Precondition-scoped lookup**: every transition locates its
//!   appointment through a [`TransitionScope`], so an appointment in the
//!   wrong state surfaces as `NotApplicable` before any mutation is
//!   attempted. Genuine absence surfaces as `NotFound`; callers may show
//!   the same notice for both, but the two stay distinguishable.
//! - **Single-appointment atomicity**: `update_in_scope` and
//!   `commit_check_out` perform their lookup, guard evaluation, and write
//!   in one critical section, so two concurrent attempts at the same
//!   transition yield exactly one success.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;

use vaxdesk_types::{AppointmentId, PatientId, UnitId};

use crate::appointment::Appointment;
use crate::dose::Dose;
use crate::error::{ReceptionError, ReceptionResult};

/// The state precondition a transition's lookup is scoped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionScope {
    /// Any scheduled appointment (activation).
    Scheduled,
    /// Not yet checked in, suspended or not (suspension).
    NotCheckedIn,
    /// Active and untouched (check-in).
    Waiting,
    /// Checked in but not yet checked out (check-out).
    CheckedIn,
}

impl TransitionScope {
    /// Whether an appointment is eligible under this scope.
    pub fn admits(&self, appointment: &Appointment) -> bool {
        match self {
            TransitionScope::Scheduled => true,
            TransitionScope::NotCheckedIn => appointment.checked_in_at().is_none(),
            TransitionScope::Waiting => appointment.is_waiting(),
            TransitionScope::CheckedIn => appointment.is_checked_in(),
        }
    }
}

/// Mutation applied to an appointment inside a store critical section.
pub type ScopedUpdate<'a> = &'a mut dyn FnMut(&mut Appointment) -> ReceptionResult<()>;

/// Storage interface consumed by the reception and roster services.
///
/// Implementations must make `update_in_scope` and `commit_check_out`
/// atomic with respect to concurrent operations on the same appointment;
/// read methods only need whatever consistency the backing store already
/// provides.
pub trait AppointmentStore: Send + Sync {
    /// Inserts a freshly scheduled `Waiting` appointment.
    ///
    /// # Errors
    ///
    /// Returns `ReceptionError::Storage` if the id is already taken.
    fn schedule(&self, appointment: Appointment) -> ReceptionResult<()>;

    /// A unit's scheduled appointments for one calendar day.
    fn day_roster(&self, unit: &UnitId, day: NaiveDate) -> Vec<Appointment>;

    /// Looks up one scheduled appointment of a unit, regardless of state.
    fn find_scheduled(&self, unit: &UnitId, id: &AppointmentId) -> Option<Appointment>;

    /// All appointments of a patient across units, ordered by start.
    fn patient_appointments(&self, patient: &PatientId) -> Vec<Appointment>;

    /// All doses of a patient, ordered by administration time.
    fn patient_doses(&self, patient: &PatientId) -> Vec<Dose>;

    /// Applies `apply` to the appointment if the scope admits it.
    ///
    /// Lookup, scope check, and write happen in one critical section; the
    /// appointment is untouched when `apply` fails.
    ///
    /// # Errors
    ///
    /// `NotFound` if the unit has no such appointment, `NotApplicable` if
    /// the scope does not admit it, otherwise whatever `apply` returned.
    fn update_in_scope(
        &self,
        unit: &UnitId,
        id: &AppointmentId,
        scope: TransitionScope,
        apply: ScopedUpdate<'_>,
    ) -> ReceptionResult<Appointment>;

    /// The check-out transaction: re-verifies the `CheckedIn` scope,
    /// applies `apply` to the appointment, records the dose, and schedules
    /// the follow-up appointment, all in one critical section.
    ///
    /// All-or-nothing: a failure at any step leaves no dose, no follow-up,
    /// and an unchanged appointment.
    fn commit_check_out(
        &self,
        unit: &UnitId,
        id: &AppointmentId,
        dose: Dose,
        follow_up: Option<Appointment>,
        apply: ScopedUpdate<'_>,
    ) -> ReceptionResult<Dose>;
}

#[derive(Default)]
struct StoreInner {
    appointments: HashMap<AppointmentId, Appointment>,
    doses: Vec<Dose>,
}

/// Mutex-guarded in-memory store.
///
/// One lock covers appointments and doses, which makes every store method
/// a transaction. Operations on different appointments serialise through
/// the same lock; that is stricter than the interface requires and is an
/// artefact of this implementation, not a contract.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        // A poisoned mutex means a panic mid-transaction; the staged-copy
        // write discipline below keeps the data consistent either way.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl AppointmentStore for InMemoryStore {
    fn schedule(&self, appointment: Appointment) -> ReceptionResult<()> {
        let mut inner = self.lock();
        if inner.appointments.contains_key(&appointment.id) {
            return Err(ReceptionError::Storage(format!(
                "appointment {} already exists",
                appointment.id
            )));
        }
        tracing::debug!(appointment = %appointment.id, unit = %appointment.unit, "scheduled");
        inner.appointments.insert(appointment.id, appointment);
        Ok(())
    }

    fn day_roster(&self, unit: &UnitId, day: NaiveDate) -> Vec<Appointment> {
        let inner = self.lock();
        inner
            .appointments
            .values()
            .filter(|a| a.unit == *unit && a.start.date_naive() == day)
            .cloned()
            .collect()
    }

    fn find_scheduled(&self, unit: &UnitId, id: &AppointmentId) -> Option<Appointment> {
        let inner = self.lock();
        inner
            .appointments
            .get(id)
            .filter(|a| a.unit == *unit)
            .cloned()
    }

    fn patient_appointments(&self, patient: &PatientId) -> Vec<Appointment> {
        let inner = self.lock();
        let mut appointments: Vec<Appointment> = inner
            .appointments
            .values()
            .filter(|a| a.patient == *patient)
            .cloned()
            .collect();
        appointments.sort_by_key(|a| a.start);
        appointments
    }

    fn patient_doses(&self, patient: &PatientId) -> Vec<Dose> {
        let inner = self.lock();
        let mut doses: Vec<Dose> = inner
            .doses
            .iter()
            .filter(|d| d.patient == *patient)
            .cloned()
            .collect();
        doses.sort_by_key(|d| d.administered_at);
        doses
    }

    fn update_in_scope(
        &self,
        unit: &UnitId,
        id: &AppointmentId,
        scope: TransitionScope,
        apply: ScopedUpdate<'_>,
    ) -> ReceptionResult<Appointment> {
        let mut inner = self.lock();
        let current = inner
            .appointments
            .get(id)
            .filter(|a| a.unit == *unit)
            .ok_or(ReceptionError::NotFound)?;
        if !scope.admits(current) {
            return Err(ReceptionError::NotApplicable);
        }

        // Stage the mutation on a copy so a failing `apply` leaves the
        // stored appointment untouched.
        let mut staged = current.clone();
        apply(&mut staged)?;
        inner.appointments.insert(*id, staged.clone());
        Ok(staged)
    }

    fn commit_check_out(
        &self,
        unit: &UnitId,
        id: &AppointmentId,
        dose: Dose,
        follow_up: Option<Appointment>,
        apply: ScopedUpdate<'_>,
    ) -> ReceptionResult<Dose> {
        let mut inner = self.lock();
        let current = inner
            .appointments
            .get(id)
            .filter(|a| a.unit == *unit)
            .ok_or(ReceptionError::NotFound)?;
        if !TransitionScope::CheckedIn.admits(current) {
            return Err(ReceptionError::NotApplicable);
        }

        let mut staged = current.clone();
        apply(&mut staged)?;

        if let Some(follow_up) = &follow_up {
            if inner.appointments.contains_key(&follow_up.id) {
                return Err(ReceptionError::Storage(format!(
                    "follow-up appointment {} already exists",
                    follow_up.id
                )));
            }
        }

        // Past this point every write is infallible, so the transaction
        // cannot half-apply.
        inner.appointments.insert(*id, staged);
        if let Some(follow_up) = follow_up {
            inner.appointments.insert(follow_up.id, follow_up);
        }
        inner.doses.push(dose.clone());
        Ok(dose)
    }
}
