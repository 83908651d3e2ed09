//! The day roster: filter & search engine and listing services.
//!
//! The engine narrows a unit's candidate set (already scoped to "today"
//! and "scheduled" by the store query) by a requested filter keyword or a
//! free-text query, then applies the ordering contract: scheduled start
//! ascending, patient name case-insensitively ascending. The effective
//! filter is a pure function of the request, never mutable state.

use std::sync::Arc;

use chrono::NaiveDate;
use vaxdesk_types::{AppointmentId, NonEmptyText, UnitId};

use crate::appointment::Appointment;
use crate::dose::Dose;
use crate::error::{ReceptionError, ReceptionResult};
use crate::registry::{Patient, PatientRegistry};
use crate::store::AppointmentStore;
use crate::vaccine::{Vaccine, VaccineCatalog};

/// Queries shorter than this never trigger search mode.
pub const MIN_SEARCH_LEN: usize = 3;
/// Default and minimum page size.
pub const MIN_PER_PAGE: u32 = 10;
/// Upper page-size bound; this wide only to support exporting a whole
/// day's roster in one page.
pub const MAX_PER_PAGE: u32 = 10_000;

/// The five recognised roster views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterFilter {
    Search,
    All,
    Waiting,
    CheckedIn,
    CheckedOut,
}

impl RosterFilter {
    /// Parses a requested filter keyword; unrecognised input is `None`.
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword {
            "search" => Some(RosterFilter::Search),
            "all" => Some(RosterFilter::All),
            "waiting" => Some(RosterFilter::Waiting),
            "checked_in" => Some(RosterFilter::CheckedIn),
            "checked_out" => Some(RosterFilter::CheckedOut),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            RosterFilter::Search => "search",
            RosterFilter::All => "all",
            RosterFilter::Waiting => "waiting",
            RosterFilter::CheckedIn => "checked_in",
            RosterFilter::CheckedOut => "checked_out",
        }
    }
}

/// Resolves the filter that actually applies to a request.
///
/// A free-text query of at least [`MIN_SEARCH_LEN`] characters forces
/// `Search` regardless of the requested keyword; otherwise the recognised
/// keyword wins; otherwise `Waiting`.
pub fn effective_filter(requested: Option<&str>, query: Option<&str>) -> RosterFilter {
    if query.is_some_and(|q| q.chars().count() >= MIN_SEARCH_LEN) {
        return RosterFilter::Search;
    }
    requested
        .and_then(RosterFilter::parse)
        .unwrap_or(RosterFilter::Waiting)
}

/// One roster row: an appointment joined with its patient's display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub appointment: Appointment,
    pub patient_name: NonEmptyText,
}

/// A listing request as it arrives from the presentation layer.
#[derive(Debug, Clone, Default)]
pub struct RosterRequest {
    pub filter: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// One ordered page of the roster.
#[derive(Debug, Clone)]
pub struct RosterPage {
    /// The filter that was actually applied.
    pub filter: RosterFilter,
    pub entries: Vec<RosterEntry>,
    pub page: u32,
    pub per_page: u32,
    /// Matching rows before pagination.
    pub total: usize,
}

fn matches_filter(filter: RosterFilter, entry: &RosterEntry, query: Option<&str>) -> bool {
    match filter {
        // An explicit `search` keyword without a usable query carries no
        // predicate of its own.
        RosterFilter::Search => {
            let Some(query) = query else { return true };
            entry
                .patient_name
                .as_str()
                .to_lowercase()
                .contains(&query.to_lowercase())
        }
        RosterFilter::All => true,
        RosterFilter::Waiting => entry.appointment.is_waiting(),
        RosterFilter::CheckedIn => entry.appointment.is_checked_in(),
        RosterFilter::CheckedOut => entry.appointment.is_checked_out(),
    }
}

fn clamp_per_page(requested: Option<u32>) -> u32 {
    requested.unwrap_or(0).max(MIN_PER_PAGE).min(MAX_PER_PAGE)
}

/// Filters, orders, and paginates a candidate set.
///
/// The ordering contract holds on every path, search included: scheduled
/// start ascending, then patient name case-insensitively ascending.
pub fn assemble(entries: Vec<RosterEntry>, request: &RosterRequest) -> RosterPage {
    let filter = effective_filter(request.filter.as_deref(), request.search.as_deref());
    let query = request
        .search
        .as_deref()
        .filter(|q| q.chars().count() >= MIN_SEARCH_LEN);

    let mut rows: Vec<RosterEntry> = entries
        .into_iter()
        .filter(|entry| matches_filter(filter, entry, query))
        .collect();
    rows.sort_by(|a, b| {
        a.appointment
            .start
            .cmp(&b.appointment.start)
            .then_with(|| {
                a.patient_name
                    .as_str()
                    .to_lowercase()
                    .cmp(&b.patient_name.as_str().to_lowercase())
            })
    });

    let total = rows.len();
    let per_page = clamp_per_page(request.per_page);
    let page = request.page.filter(|p| *p >= 1).unwrap_or(1);
    let entries = rows
        .into_iter()
        .skip((page as usize - 1) * per_page as usize)
        .take(per_page as usize)
        .collect();

    RosterPage {
        filter,
        entries,
        page,
        per_page,
        total,
    }
}

/// Everything the appointment detail view needs.
#[derive(Debug, Clone)]
pub struct AppointmentDetail {
    pub appointment: Appointment,
    pub patient: Patient,
    /// The patient's other appointments, ordered by start.
    pub other_appointments: Vec<Appointment>,
    /// The patient's full dose history, administration time ascending.
    pub doses: Vec<Dose>,
    /// Name-ordered catalog, for the check-out selection list.
    pub vaccines: Vec<Vaccine>,
}

/// Read-only listing over the store, registry, and catalog.
#[derive(Clone)]
pub struct RosterService {
    store: Arc<dyn AppointmentStore>,
    registry: Arc<dyn PatientRegistry>,
    catalog: Arc<dyn VaccineCatalog>,
}

impl RosterService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        registry: Arc<dyn PatientRegistry>,
        catalog: Arc<dyn VaccineCatalog>,
    ) -> Self {
        Self {
            store,
            registry,
            catalog,
        }
    }

    /// One ordered page of a unit's roster for `day`.
    ///
    /// Appointments whose patient is missing from the registry are logged
    /// and skipped rather than failing the whole listing.
    pub fn list(&self, unit: &UnitId, day: NaiveDate, request: &RosterRequest) -> RosterPage {
        let entries = self
            .store
            .day_roster(unit, day)
            .into_iter()
            .filter_map(|appointment| match self.registry.find(&appointment.patient) {
                Some(patient) => Some(RosterEntry {
                    appointment,
                    patient_name: patient.name,
                }),
                None => {
                    tracing::warn!(
                        appointment = %appointment.id,
                        patient = %appointment.patient,
                        "patient missing from registry; skipping roster row"
                    );
                    None
                }
            })
            .collect();

        assemble(entries, request)
    }

    /// Detail view of one appointment: the patient, their other
    /// appointments, their dose history, and the vaccine list.
    ///
    /// # Errors
    ///
    /// `NotFound` when the unit has no such appointment; `Validation`
    /// when the appointment references a patient the registry does not
    /// know (a reference-data integrity fault).
    pub fn detail(&self, unit: &UnitId, id: &AppointmentId) -> ReceptionResult<AppointmentDetail> {
        let appointment = self
            .store
            .find_scheduled(unit, id)
            .ok_or(ReceptionError::NotFound)?;
        let patient = self.registry.find(&appointment.patient).ok_or_else(|| {
            ReceptionError::Validation(format!(
                "patient {} missing from registry",
                appointment.patient
            ))
        })?;

        let other_appointments = self
            .store
            .patient_appointments(&appointment.patient)
            .into_iter()
            .filter(|a| a.id != appointment.id)
            .collect();
        let doses = self.store.patient_doses(&appointment.patient);
        let vaccines = self.catalog.all();

        Ok(AppointmentDetail {
            appointment,
            patient,
            other_appointments,
            doses,
            vaccines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, TransitionScope};
    use crate::vaccine::InMemoryCatalog;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use vaxdesk_types::PatientId;

    fn nine_am() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 9, 9, 0, 0).unwrap()
    }

    fn entry(name: &str, start: DateTime<Utc>) -> RosterEntry {
        RosterEntry {
            appointment: Appointment::waiting(
                AppointmentId::new(),
                UnitId::new(),
                PatientId::new(),
                start,
            ),
            patient_name: NonEmptyText::new(name).expect("valid name"),
        }
    }

    fn names(page: &RosterPage) -> Vec<&str> {
        page.entries
            .iter()
            .map(|e| e.patient_name.as_str())
            .collect()
    }

    #[test]
    fn short_query_falls_back_to_requested_filter() {
        assert_eq!(
            effective_filter(Some("checked_in"), Some("ab")),
            RosterFilter::CheckedIn
        );
        assert_eq!(effective_filter(None, Some("ab")), RosterFilter::Waiting);
    }

    #[test]
    fn long_query_forces_search_over_any_keyword() {
        assert_eq!(
            effective_filter(Some("checked_out"), Some("mar")),
            RosterFilter::Search
        );
    }

    #[test]
    fn explicit_search_keyword_without_query_applies_no_predicate() {
        let mut arrived = entry("Arrived", nine_am());
        arrived.appointment.check_in(nine_am()).expect("check-in");
        let entries = vec![entry("Waiting", nine_am()), arrived];

        let page = assemble(
            entries,
            &RosterRequest {
                filter: Some("search".into()),
                search: Some("ab".into()),
                ..Default::default()
            },
        );

        assert_eq!(page.filter, RosterFilter::Search);
        assert_eq!(page.total, 2);
    }

    #[test]
    fn unrecognised_keyword_defaults_to_waiting() {
        assert_eq!(effective_filter(Some("everything"), None), RosterFilter::Waiting);
        assert_eq!(effective_filter(None, None), RosterFilter::Waiting);
    }

    #[test]
    fn ordering_is_start_then_name_case_insensitive() {
        let entries = vec![
            entry("carla", nine_am() + Duration::minutes(30)),
            entry("Bruna", nine_am()),
            entry("ana", nine_am()),
            entry("Álvaro", nine_am() + Duration::minutes(30)),
        ];

        let page = assemble(
            entries,
            &RosterRequest {
                filter: Some("all".into()),
                ..Default::default()
            },
        );

        // Start ascending first; names break the 09:00 and 09:30 ties
        // without regard to case. (Non-ASCII initials sort by code point.)
        assert_eq!(names(&page), vec!["ana", "Bruna", "carla", "Álvaro"]);
    }

    #[test]
    fn search_matches_name_substring_case_insensitively() {
        let entries = vec![
            entry("Maria Souza", nine_am()),
            entry("Mariana Alves", nine_am() + Duration::minutes(5)),
            entry("João Lima", nine_am() + Duration::minutes(10)),
        ];

        let page = assemble(
            entries,
            &RosterRequest {
                search: Some("maRia".into()),
                ..Default::default()
            },
        );

        assert_eq!(page.filter, RosterFilter::Search);
        assert_eq!(names(&page), vec!["Maria Souza", "Mariana Alves"]);
        assert_eq!(page.total, 2);
    }

    #[test]
    fn waiting_filter_excludes_checked_in_and_suspended() {
        let waiting = entry("Waiting", nine_am());

        let mut checked_in = entry("Arrived", nine_am());
        checked_in
            .appointment
            .check_in(nine_am())
            .expect("check-in");

        let mut suspended = entry("Suspended", nine_am());
        suspended
            .appointment
            .suspend(NonEmptyText::new("no-show risk").expect("valid reason"))
            .expect("suspend");

        let page = assemble(
            vec![waiting, checked_in, suspended],
            &RosterRequest::default(),
        );

        assert_eq!(page.filter, RosterFilter::Waiting);
        assert_eq!(names(&page), vec!["Waiting"]);
    }

    #[test]
    fn checked_out_filter_requires_both_timestamps() {
        let mut done = entry("Done", nine_am());
        done.appointment.check_in(nine_am()).expect("check-in");
        done.appointment
            .check_out(nine_am() + Duration::minutes(10))
            .expect("check-out");

        let mut arrived = entry("Arrived", nine_am());
        arrived.appointment.check_in(nine_am()).expect("check-in");

        let page = assemble(
            vec![done, arrived],
            &RosterRequest {
                filter: Some("checked_out".into()),
                ..Default::default()
            },
        );

        assert_eq!(names(&page), vec!["Done"]);
    }

    #[test]
    fn per_page_is_clamped_to_bounds() {
        let entries: Vec<RosterEntry> = (0..15)
            .map(|i| entry(&format!("Patient {i:02}"), nine_am() + Duration::minutes(i)))
            .collect();

        let default_page = assemble(entries.clone(), &RosterRequest::default());
        assert_eq!(default_page.per_page, MIN_PER_PAGE);
        assert_eq!(default_page.entries.len(), 10);
        assert_eq!(default_page.total, 15);

        let tiny = assemble(
            entries.clone(),
            &RosterRequest {
                per_page: Some(3),
                ..Default::default()
            },
        );
        assert_eq!(tiny.per_page, MIN_PER_PAGE);

        let export = assemble(
            entries,
            &RosterRequest {
                per_page: Some(50_000),
                ..Default::default()
            },
        );
        assert_eq!(export.per_page, MAX_PER_PAGE);
        assert_eq!(export.entries.len(), 15);
    }

    #[test]
    fn pages_are_one_based_and_disjoint() {
        let entries: Vec<RosterEntry> = (0..25)
            .map(|i| entry(&format!("Patient {i:02}"), nine_am() + Duration::minutes(i)))
            .collect();

        let first = assemble(
            entries.clone(),
            &RosterRequest {
                page: Some(1),
                ..Default::default()
            },
        );
        let second = assemble(
            entries,
            &RosterRequest {
                page: Some(2),
                ..Default::default()
            },
        );

        assert_eq!(first.entries.len(), 10);
        assert_eq!(second.entries.len(), 10);
        assert_eq!(names(&first)[0], "Patient 00");
        assert_eq!(names(&second)[0], "Patient 10");
    }

    struct Services {
        roster: RosterService,
        store: Arc<InMemoryStore>,
        unit: UnitId,
    }

    fn services(patients: Vec<Patient>) -> Services {
        let store = Arc::new(InMemoryStore::new());
        let roster = RosterService::new(
            Arc::clone(&store) as Arc<dyn AppointmentStore>,
            Arc::new(crate::registry::InMemoryRegistry::new(patients)),
            Arc::new(InMemoryCatalog::new(vec![])),
        );
        Services {
            roster,
            store,
            unit: UnitId::new(),
        }
    }

    #[test]
    fn list_joins_patient_names_and_skips_unknown_patients() {
        let known = PatientId::new();
        let unknown = PatientId::new();
        let s = services(vec![Patient {
            id: known,
            name: NonEmptyText::new("Maria Souza").expect("valid name"),
        }]);

        s.store
            .schedule(Appointment::waiting(
                AppointmentId::new(),
                s.unit,
                known,
                nine_am(),
            ))
            .expect("schedule");
        s.store
            .schedule(Appointment::waiting(
                AppointmentId::new(),
                s.unit,
                unknown,
                nine_am(),
            ))
            .expect("schedule");

        let page = s
            .roster
            .list(&s.unit, nine_am().date_naive(), &RosterRequest::default());
        assert_eq!(names(&page), vec!["Maria Souza"]);
    }

    #[test]
    fn detail_collects_siblings_and_dose_history() {
        let patient = PatientId::new();
        let s = services(vec![Patient {
            id: patient,
            name: NonEmptyText::new("Maria Souza").expect("valid name"),
        }]);

        let today = Appointment::waiting(AppointmentId::new(), s.unit, patient, nine_am());
        let next_month = Appointment::waiting(
            AppointmentId::new(),
            s.unit,
            patient,
            nine_am() + Duration::days(30),
        );
        let today_id = today.id;
        let next_id = next_month.id;
        s.store.schedule(today).expect("schedule");
        s.store.schedule(next_month).expect("schedule");
        s.store
            .update_in_scope(&s.unit, &today_id, TransitionScope::Waiting, &mut |a| {
                a.check_in(nine_am())
            })
            .expect("check-in");

        let detail = s.roster.detail(&s.unit, &today_id).expect("detail");
        assert_eq!(detail.patient.name.as_str(), "Maria Souza");
        assert_eq!(detail.appointment.id, today_id);
        assert_eq!(detail.other_appointments.len(), 1);
        assert_eq!(detail.other_appointments[0].id, next_id);
        assert!(detail.doses.is_empty());

        let err = s
            .roster
            .detail(&s.unit, &AppointmentId::new())
            .expect_err("unknown appointment");
        assert!(matches!(err, ReceptionError::NotFound));
    }
}
