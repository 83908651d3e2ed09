//! Appointments and the reception state machine.
//!
//! An appointment moves through four states:
//!
//! ```text
//! Waiting ──check-in──▶ CheckedIn ──check-out──▶ CheckedOut (terminal)
//!    │ ▲
//!    suspend / activate
//!    ▼ │
//! Suspended
//! ```
//!
//! The state is an explicit tagged enum rather than a bundle of nullable
//! columns, and the transition methods on [`Appointment`] are the only way
//! to move between states. The nullable-column view (`checked_in_at`,
//! `checked_out_at`, `active`, `suspend_reason`) is derived through
//! accessors for the storage and wire boundaries.

use chrono::{DateTime, Duration, Utc};
use vaxdesk_types::{AppointmentId, NonEmptyText, PatientId, UnitId};

use crate::error::{ReceptionError, ReceptionResult};

/// Where an appointment stands in the reception workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceptionState {
    /// Scheduled, active, nobody has arrived yet.
    Waiting,
    /// The patient has arrived and been received.
    CheckedIn { at: DateTime<Utc> },
    /// A dose was administered. Terminal for this appointment.
    CheckedOut {
        in_at: DateTime<Utc>,
        out_at: DateTime<Utc>,
    },
    /// Soft-removed from the day's roster, with the operator's reason.
    Suspended { reason: NonEmptyText },
}

impl ReceptionState {
    /// Stable lowercase label used in logs and wire payloads.
    pub fn label(&self) -> &'static str {
        match self {
            ReceptionState::Waiting => "waiting",
            ReceptionState::CheckedIn { .. } => "checked_in",
            ReceptionState::CheckedOut { .. } => "checked_out",
            ReceptionState::Suspended { .. } => "suspended",
        }
    }
}

/// The time window around the scheduled start during which check-in is
/// accepted.
///
/// The offsets are policy, supplied through configuration; the predicate
/// itself is a pure time comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckInWindow {
    opens_before: Duration,
    closes_after: Duration,
}

impl CheckInWindow {
    /// Creates a window from its two offsets.
    ///
    /// # Errors
    ///
    /// Returns `ReceptionError::Validation` if either offset is negative.
    pub fn new(opens_before: Duration, closes_after: Duration) -> ReceptionResult<Self> {
        if opens_before < Duration::zero() || closes_after < Duration::zero() {
            return Err(ReceptionError::Validation(
                "check-in window offsets cannot be negative".into(),
            ));
        }
        Ok(Self {
            opens_before,
            closes_after,
        })
    }

    /// Convenience constructor taking the offsets in whole minutes.
    pub fn from_minutes(opens_before: i64, closes_after: i64) -> ReceptionResult<Self> {
        Self::new(
            Duration::minutes(opens_before),
            Duration::minutes(closes_after),
        )
    }

    /// Whether `now` falls inside the window around `start` (inclusive on
    /// both edges).
    pub fn contains(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now >= start - self.opens_before && now <= start + self.closes_after
    }
}

/// A scheduled vaccination appointment at one health unit for one patient.
///
/// Appointments are created in the `Waiting` state by the scheduling
/// process (or as the follow-up of a check-out) and from then on change
/// only through the transition methods below. They are never deleted;
/// suspension is the soft removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appointment {
    pub id: AppointmentId,
    pub unit: UnitId,
    pub patient: PatientId,
    /// Scheduled start of the slot.
    pub start: DateTime<Utc>,
    state: ReceptionState,
}

impl Appointment {
    /// Creates a fresh appointment in the `Waiting` state.
    pub fn waiting(
        id: AppointmentId,
        unit: UnitId,
        patient: PatientId,
        start: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            unit,
            patient,
            start,
            state: ReceptionState::Waiting,
        }
    }

    pub fn state(&self) -> &ReceptionState {
        &self.state
    }

    /// False while suspended.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, ReceptionState::Suspended { .. })
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.state, ReceptionState::Waiting)
    }

    pub fn is_checked_in(&self) -> bool {
        matches!(self.state, ReceptionState::CheckedIn { .. })
    }

    pub fn is_checked_out(&self) -> bool {
        matches!(self.state, ReceptionState::CheckedOut { .. })
    }

    pub fn checked_in_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            ReceptionState::CheckedIn { at } => Some(at),
            ReceptionState::CheckedOut { in_at, .. } => Some(in_at),
            _ => None,
        }
    }

    pub fn checked_out_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            ReceptionState::CheckedOut { out_at, .. } => Some(out_at),
            _ => None,
        }
    }

    pub fn suspend_reason(&self) -> Option<&NonEmptyText> {
        match &self.state {
            ReceptionState::Suspended { reason } => Some(reason),
            _ => None,
        }
    }

    /// Whether `now` is inside this appointment's allowed check-in window.
    pub fn in_allowed_check_in_window(&self, window: &CheckInWindow, now: DateTime<Utc>) -> bool {
        window.contains(self.start, now)
    }

    /// Receives the patient: `Waiting` → `CheckedIn`.
    ///
    /// The time-window guard is the caller's responsibility; this method
    /// only enforces transition legality.
    ///
    /// # Errors
    ///
    /// `ReceptionError::NotApplicable` unless the appointment is `Waiting`.
    pub fn check_in(&mut self, now: DateTime<Utc>) -> ReceptionResult<()> {
        match self.state {
            ReceptionState::Waiting => {
                self.state = ReceptionState::CheckedIn { at: now };
                Ok(())
            }
            _ => Err(ReceptionError::NotApplicable),
        }
    }

    /// Completes the visit: `CheckedIn` → `CheckedOut`.
    ///
    /// # Errors
    ///
    /// `ReceptionError::NotApplicable` unless the appointment is
    /// `CheckedIn`; `ReceptionError::Validation` if `now` precedes the
    /// check-in time (the check-out timestamp may never be earlier than
    /// the check-in timestamp).
    pub fn check_out(&mut self, now: DateTime<Utc>) -> ReceptionResult<()> {
        match self.state {
            ReceptionState::CheckedIn { at } => {
                if now < at {
                    return Err(ReceptionError::Validation(
                        "check-out time precedes check-in time".into(),
                    ));
                }
                self.state = ReceptionState::CheckedOut {
                    in_at: at,
                    out_at: now,
                };
                Ok(())
            }
            _ => Err(ReceptionError::NotApplicable),
        }
    }

    /// Takes the appointment off the roster: `Waiting` → `Suspended`.
    ///
    /// Re-suspending an already suspended appointment replaces the reason;
    /// suspension and check-in are mutually exclusive entry points from
    /// `Waiting`.
    ///
    /// # Errors
    ///
    /// `ReceptionError::NotApplicable` once the patient has checked in.
    pub fn suspend(&mut self, reason: NonEmptyText) -> ReceptionResult<()> {
        match self.state {
            ReceptionState::Waiting | ReceptionState::Suspended { .. } => {
                self.state = ReceptionState::Suspended { reason };
                Ok(())
            }
            _ => Err(ReceptionError::NotApplicable),
        }
    }

    /// Puts a suspended appointment back on the roster, clearing the
    /// reason. Idempotent: activating an appointment that is not suspended
    /// is a no-op.
    pub fn activate(&mut self) {
        if let ReceptionState::Suspended { .. } = self.state {
            self.state = ReceptionState::Waiting;
        }
    }
}
