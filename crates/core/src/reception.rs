//! Reception service: check-in, check-out, suspension, reactivation.
//!
//! Every operation is a single-appointment transaction: a
//! precondition-scoped lookup followed by a guarded mutation, delegated to
//! the store's critical section. Check-out additionally records the
//! administered dose and, when the regimen defines a subsequent dose,
//! schedules the follow-up appointment, atomically with the state change.
//!
//! Services take `now` as a parameter; only the outermost façade reads the
//! clock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use vaxdesk_types::{AppointmentId, DoseId, NonEmptyText, PatientId, UnitId, VaccineId};

use crate::appointment::Appointment;
use crate::config::CoreConfig;
use crate::dose::Dose;
use crate::error::{ReceptionError, ReceptionResult};
use crate::store::{AppointmentStore, TransitionScope};
use crate::vaccine::{Vaccine, VaccineCatalog};

/// Outcome of a completed check-out.
///
/// `follow_up` is present exactly when the vaccine's regimen defines a
/// dose after this one; callers use it to tell "next dose on <date>" apart
/// from "regimen complete".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOut {
    pub dose: Dose,
    pub follow_up: Option<Appointment>,
}

/// Orchestrates the reception transitions against the store and catalog.
#[derive(Clone)]
pub struct ReceptionService {
    store: Arc<dyn AppointmentStore>,
    catalog: Arc<dyn VaccineCatalog>,
    cfg: Arc<CoreConfig>,
}

impl ReceptionService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        catalog: Arc<dyn VaccineCatalog>,
        cfg: Arc<CoreConfig>,
    ) -> Self {
        Self {
            store,
            catalog,
            cfg,
        }
    }

    /// Receives a waiting patient.
    ///
    /// The lookup is scoped to `Waiting`, so an appointment that is
    /// suspended, already checked in, or checked out reports
    /// `NotApplicable`. The check-in window guard runs inside the same
    /// critical section; a refusal mutates nothing.
    ///
    /// # Errors
    ///
    /// `NotFound` / `NotApplicable` from the scoped lookup,
    /// `OutsideCheckInWindow` when `now` misses the window.
    pub fn check_in(
        &self,
        unit: &UnitId,
        id: &AppointmentId,
        now: DateTime<Utc>,
    ) -> ReceptionResult<Appointment> {
        let window = *self.cfg.check_in_window();
        let updated =
            self.store
                .update_in_scope(unit, id, TransitionScope::Waiting, &mut |appointment| {
                    if !appointment.in_allowed_check_in_window(&window, now) {
                        return Err(ReceptionError::OutsideCheckInWindow);
                    }
                    appointment.check_in(now)
                })?;

        tracing::info!(appointment = %id, unit = %unit, "checked in");
        Ok(updated)
    }

    /// Administers a dose and completes the appointment.
    ///
    /// The vaccine must resolve against the catalog before anything else
    /// happens; an unknown or missing selection refuses the operation with
    /// `MissingVaccineSelection` and mutates nothing. The state change,
    /// the dose record, and the optional follow-up appointment are
    /// committed as one transaction.
    ///
    /// # Errors
    ///
    /// `MissingVaccineSelection`, `NotFound` / `NotApplicable` from the
    /// scoped lookup, `Validation` / `Storage` if the commit fails (in
    /// which case nothing was applied).
    pub fn check_out(
        &self,
        unit: &UnitId,
        id: &AppointmentId,
        vaccine_id: Option<&VaccineId>,
        now: DateTime<Utc>,
    ) -> ReceptionResult<CheckOut> {
        let vaccine = vaccine_id
            .and_then(|v| self.catalog.find(v))
            .ok_or(ReceptionError::MissingVaccineSelection)?;

        let current = self
            .store
            .find_scheduled(unit, id)
            .ok_or(ReceptionError::NotFound)?;
        if !TransitionScope::CheckedIn.admits(&current) {
            return Err(ReceptionError::NotApplicable);
        }

        let sequence_number = self.next_sequence_number(&current.patient, &vaccine);
        let follow_up = vaccine
            .regimen
            .interval_after(sequence_number)
            .map(|interval| {
                Appointment::waiting(
                    AppointmentId::new(),
                    current.unit,
                    current.patient,
                    now + interval,
                )
            });
        let dose = Dose {
            id: DoseId::new(),
            vaccine: vaccine.id,
            patient: current.patient,
            appointment: *id,
            sequence_number,
            follow_up_appointment: follow_up.as_ref().map(|a| a.id),
            administered_at: now,
        };

        // The commit re-verifies the CheckedIn scope in its own critical
        // section, so a concurrent check-out loses with NotApplicable.
        let dose = self.store.commit_check_out(
            unit,
            id,
            dose,
            follow_up.clone(),
            &mut |appointment| appointment.check_out(now),
        )?;

        tracing::info!(
            appointment = %id,
            unit = %unit,
            vaccine = %vaccine.id,
            sequence = sequence_number,
            follow_up = follow_up.is_some(),
            "checked out"
        );
        Ok(CheckOut { dose, follow_up })
    }

    /// Suspends a not-yet-checked-in appointment with the operator's
    /// reason. Re-suspension replaces the reason; no dose or appointment
    /// side effects.
    ///
    /// # Errors
    ///
    /// `NotFound` / `NotApplicable` from the scoped lookup.
    pub fn suspend(
        &self,
        unit: &UnitId,
        id: &AppointmentId,
        reason: NonEmptyText,
    ) -> ReceptionResult<Appointment> {
        let updated = self.store.update_in_scope(
            unit,
            id,
            TransitionScope::NotCheckedIn,
            &mut |appointment| appointment.suspend(reason.clone()),
        )?;

        tracing::info!(appointment = %id, unit = %unit, "suspended");
        Ok(updated)
    }

    /// Reactivates a suspended appointment, clearing the reason.
    /// Idempotent on appointments that are already active.
    ///
    /// # Errors
    ///
    /// `NotFound` when the unit has no such appointment.
    pub fn activate(&self, unit: &UnitId, id: &AppointmentId) -> ReceptionResult<Appointment> {
        let updated = self.store.update_in_scope(
            unit,
            id,
            TransitionScope::Scheduled,
            &mut |appointment| {
                appointment.activate();
                Ok(())
            },
        )?;

        tracing::info!(appointment = %id, unit = %unit, "activated");
        Ok(updated)
    }

    /// Sequence number the next dose of this vaccine would carry for the
    /// patient: prior doses of the same regimen family, plus one.
    fn next_sequence_number(&self, patient: &PatientId, vaccine: &Vaccine) -> u32 {
        let prior = self
            .store
            .patient_doses(patient)
            .iter()
            .filter(|dose| {
                self.catalog
                    .find(&dose.vaccine)
                    .is_some_and(|v| v.family == vaccine.family)
            })
            .count();
        prior as u32 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointment::CheckInWindow;
    use crate::store::InMemoryStore;
    use crate::vaccine::{InMemoryCatalog, Regimen};
    use chrono::{Duration, TimeZone};

    struct Fixture {
        service: ReceptionService,
        store: Arc<InMemoryStore>,
        unit: UnitId,
        patient: PatientId,
        corovac: VaccineId,
        adenovac: VaccineId,
    }

    /// 09:00 appointment, [-15 min, +10 min] window, a two-dose vaccine
    /// (21-day interval) and a single-dose vaccine.
    fn fixture() -> Fixture {
        let corovac = VaccineId::new();
        let adenovac = VaccineId::new();
        let catalog = InMemoryCatalog::new(vec![
            Vaccine {
                id: corovac,
                name: "Corovac".into(),
                family: "corovac".into(),
                regimen: Regimen::from_interval_days(vec![21]).expect("valid regimen"),
            },
            Vaccine {
                id: adenovac,
                name: "Adenovac".into(),
                family: "adenovac".into(),
                regimen: Regimen::from_interval_days(vec![]).expect("valid regimen"),
            },
        ]);

        let window = CheckInWindow::from_minutes(15, 10).expect("valid window");
        let store = Arc::new(InMemoryStore::new());
        let service = ReceptionService::new(
            Arc::clone(&store) as Arc<dyn AppointmentStore>,
            Arc::new(catalog),
            Arc::new(CoreConfig::new(window)),
        );

        Fixture {
            service,
            store,
            unit: UnitId::new(),
            patient: PatientId::new(),
            corovac,
            adenovac,
        }
    }

    fn nine_am() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 9, 9, 0, 0).unwrap()
    }

    impl Fixture {
        fn schedule_at(&self, start: DateTime<Utc>) -> AppointmentId {
            let appointment =
                Appointment::waiting(AppointmentId::new(), self.unit, self.patient, start);
            let id = appointment.id;
            self.store.schedule(appointment).expect("schedule");
            id
        }

        fn checked_in_at(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> AppointmentId {
            let id = self.schedule_at(start);
            self.service
                .check_in(&self.unit, &id, now)
                .expect("check-in inside window");
            id
        }
    }

    #[test]
    fn check_in_inside_window_sets_timestamp() {
        let f = fixture();
        let id = f.schedule_at(nine_am());
        let at_0850 = nine_am() - Duration::minutes(10);

        let updated = f.service.check_in(&f.unit, &id, at_0850).expect("check-in");

        assert_eq!(updated.checked_in_at(), Some(at_0850));
    }

    #[test]
    fn check_in_outside_window_refuses_and_mutates_nothing() {
        let f = fixture();
        let id = f.schedule_at(nine_am());
        let too_early = nine_am() - Duration::minutes(16);

        let err = f
            .service
            .check_in(&f.unit, &id, too_early)
            .expect_err("outside window");
        assert!(matches!(err, ReceptionError::OutsideCheckInWindow));

        let stored = f.store.find_scheduled(&f.unit, &id).expect("still there");
        assert!(stored.is_waiting());
    }

    #[test]
    fn first_dose_schedules_follow_up() {
        let f = fixture();
        let at_0850 = nine_am() - Duration::minutes(10);
        let at_0910 = nine_am() + Duration::minutes(10);
        let id = f.checked_in_at(nine_am(), at_0850);

        let checked_out = f
            .service
            .check_out(&f.unit, &id, Some(&f.corovac), at_0910)
            .expect("check-out");

        assert_eq!(checked_out.dose.sequence_number, 1);
        assert_eq!(checked_out.dose.administered_at, at_0910);

        let follow_up = checked_out.follow_up.expect("regimen has a second dose");
        assert_eq!(follow_up.start, at_0910 + Duration::days(21));
        assert_eq!(follow_up.unit, f.unit);
        assert_eq!(follow_up.patient, f.patient);
        assert!(follow_up.is_waiting());
        assert_eq!(
            checked_out.dose.follow_up_appointment,
            Some(follow_up.id)
        );

        // The follow-up is really scheduled, and the dose really recorded.
        assert!(f.store.find_scheduled(&f.unit, &follow_up.id).is_some());
        assert_eq!(f.store.patient_doses(&f.patient).len(), 1);
    }

    #[test]
    fn final_dose_has_no_follow_up() {
        let f = fixture();
        let first = f.checked_in_at(nine_am(), nine_am());
        let first_out = f
            .service
            .check_out(&f.unit, &first, Some(&f.corovac), nine_am())
            .expect("first dose");

        // Receive the patient again on the follow-up the first check-out
        // scheduled.
        let second = first_out.follow_up.expect("follow-up scheduled").id;
        let second_start = nine_am() + Duration::days(21);
        f.service
            .check_in(&f.unit, &second, second_start)
            .expect("check-in on the follow-up");
        let checked_out = f
            .service
            .check_out(&f.unit, &second, Some(&f.corovac), second_start)
            .expect("second dose");

        assert_eq!(checked_out.dose.sequence_number, 2);
        assert!(checked_out.follow_up.is_none());
        assert!(checked_out.dose.follow_up_appointment.is_none());
    }

    #[test]
    fn sequence_counts_only_the_same_family() {
        let f = fixture();
        let first = f.checked_in_at(nine_am(), nine_am());
        f.service
            .check_out(&f.unit, &first, Some(&f.corovac), nine_am())
            .expect("corovac dose");

        let later = nine_am() + Duration::days(60);
        let other = f.checked_in_at(later, later);
        let checked_out = f
            .service
            .check_out(&f.unit, &other, Some(&f.adenovac), later)
            .expect("adenovac dose");

        // A different family starts its own sequence.
        assert_eq!(checked_out.dose.sequence_number, 1);
        assert!(checked_out.follow_up.is_none());
    }

    #[test]
    fn check_out_without_vaccine_is_refused_before_any_mutation() {
        let f = fixture();
        let id = f.checked_in_at(nine_am(), nine_am());

        let err = f
            .service
            .check_out(&f.unit, &id, None, nine_am())
            .expect_err("no selection");
        assert!(matches!(err, ReceptionError::MissingVaccineSelection));

        let unknown = VaccineId::new();
        let err = f
            .service
            .check_out(&f.unit, &id, Some(&unknown), nine_am())
            .expect_err("unknown vaccine");
        assert!(matches!(err, ReceptionError::MissingVaccineSelection));

        let stored = f.store.find_scheduled(&f.unit, &id).expect("still there");
        assert!(stored.is_checked_in());
        assert!(f.store.patient_doses(&f.patient).is_empty());
    }

    #[test]
    fn check_out_of_waiting_appointment_is_not_applicable() {
        let f = fixture();
        let id = f.schedule_at(nine_am());

        let err = f
            .service
            .check_out(&f.unit, &id, Some(&f.corovac), nine_am())
            .expect_err("never checked in");
        assert!(matches!(err, ReceptionError::NotApplicable));
    }

    #[test]
    fn suspended_appointment_refuses_check_in_until_reactivated() {
        let f = fixture();
        let id = f.schedule_at(nine_am());
        let reason = NonEmptyText::new("no-show risk").expect("valid reason");

        let suspended = f
            .service
            .suspend(&f.unit, &id, reason)
            .expect("suspend waiting appointment");
        assert!(!suspended.is_active());

        let err = f
            .service
            .check_in(&f.unit, &id, nine_am())
            .expect_err("suspended");
        assert!(matches!(err, ReceptionError::NotApplicable));

        let activated = f.service.activate(&f.unit, &id).expect("activate");
        assert!(activated.is_active());
        assert_eq!(activated.suspend_reason(), None);

        f.service
            .check_in(&f.unit, &id, nine_am())
            .expect("check-in possible again inside the window");
    }

    #[test]
    fn activate_is_idempotent() {
        let f = fixture();
        let id = f.schedule_at(nine_am());

        f.service.activate(&f.unit, &id).expect("already active");
        f.service.activate(&f.unit, &id).expect("still fine");
    }

    #[test]
    fn suspend_after_check_in_is_not_applicable() {
        let f = fixture();
        let id = f.checked_in_at(nine_am(), nine_am());
        let reason = NonEmptyText::new("closing early").expect("valid reason");

        let err = f
            .service
            .suspend(&f.unit, &id, reason)
            .expect_err("already checked in");
        assert!(matches!(err, ReceptionError::NotApplicable));
    }

    #[test]
    fn doses_never_exist_without_a_checked_out_appointment() {
        let f = fixture();
        let id = f.checked_in_at(nine_am(), nine_am());

        f.service
            .check_out(&f.unit, &id, Some(&f.corovac), nine_am())
            .expect("check-out");

        for dose in f.store.patient_doses(&f.patient) {
            let appointment = f
                .store
                .find_scheduled(&f.unit, &dose.appointment)
                .expect("dose references a stored appointment");
            assert!(appointment.is_checked_out());
            let in_at = appointment.checked_in_at().expect("checked in first");
            let out_at = appointment.checked_out_at().expect("checked out");
            assert!(in_at <= out_at);
        }
    }
}
