use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use vaxdesk_core::config::check_in_window_from_env_values;
use vaxdesk_core::roster::RosterRequest;
use vaxdesk_core::{
    Appointment, AppointmentStore, CoreConfig, InMemoryCatalog, InMemoryRegistry, InMemoryStore,
    ReceptionService, RosterService,
};
use vaxdesk_types::{AppointmentId, NonEmptyText, PatientId, UnitId, VaccineId};

mod wire;

use wire::{
    ApiError, AppointmentDetailRes, AppointmentRes, CheckOutReq, CheckOutRes, DoseRes, ErrorBody,
    HealthRes, ListAppointmentsRes, PatientRes, RosterRowRes, ScheduleAppointmentReq, SuspendReq,
    VaccineRes,
};

/// Application state shared across REST API handlers
///
/// Holds the reception and roster services plus the store handle the
/// scheduling endpoint writes through.
#[derive(Clone)]
struct AppState {
    reception: ReceptionService,
    roster: RosterService,
    store: Arc<dyn AppointmentStore>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_appointments,
        schedule_appointment,
        get_appointment,
        check_in,
        check_out,
        suspend,
        activate
    ),
    components(schemas(
        HealthRes,
        ListAppointmentsRes,
        RosterRowRes,
        AppointmentRes,
        AppointmentDetailRes,
        PatientRes,
        DoseRes,
        VaccineRes,
        ScheduleAppointmentReq,
        CheckOutReq,
        CheckOutRes,
        SuspendReq,
        ErrorBody
    ))
)]
struct ApiDoc;

/// Main entry point for the vaxdesk reception application
///
/// Starts the REST server that the reception desks of health units talk
/// to: day roster listing and search, appointment detail, check-in,
/// check-out, suspension, and reactivation.
///
/// # Environment Variables
/// - `VAXDESK_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `VAXDESK_CHECKIN_OPENS_BEFORE_MIN`: minutes before the scheduled
///   start at which check-in opens (default: 15)
/// - `VAXDESK_CHECKIN_CLOSES_AFTER_MIN`: minutes after the scheduled
///   start at which check-in closes (default: 10)
/// - `VAXDESK_CATALOG_FILE`: JSON seed for the vaccine catalog
/// - `VAXDESK_REGISTRY_FILE`: JSON seed for the patient registry
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If startup or runtime fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vaxdesk=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("VAXDESK_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let window = check_in_window_from_env_values(
        std::env::var("VAXDESK_CHECKIN_OPENS_BEFORE_MIN").ok(),
        std::env::var("VAXDESK_CHECKIN_CLOSES_AFTER_MIN").ok(),
    )
    .map_err(|e| anyhow::anyhow!("check-in window configuration: {e}"))?;
    let cfg = Arc::new(CoreConfig::new(window));

    let catalog = Arc::new(load_catalog()?);
    let registry = Arc::new(load_registry()?);
    let store: Arc<dyn AppointmentStore> = Arc::new(InMemoryStore::new());

    let state = AppState {
        reception: ReceptionService::new(Arc::clone(&store), catalog.clone(), cfg),
        roster: RosterService::new(Arc::clone(&store), registry, catalog),
        store,
    };

    tracing::info!("++ Starting vaxdesk REST on {}", rest_addr);

    let app = Router::new()
        .route("/health", get(health))
        .route("/units/:unit_id/appointments", get(list_appointments))
        .route("/units/:unit_id/appointments", post(schedule_appointment))
        .route("/units/:unit_id/appointments/:id", get(get_appointment))
        .route(
            "/units/:unit_id/appointments/:id/check-in",
            post(check_in),
        )
        .route(
            "/units/:unit_id/appointments/:id/check-out",
            post(check_out),
        )
        .route("/units/:unit_id/appointments/:id/suspend", post(suspend))
        .route("/units/:unit_id/appointments/:id/activate", post(activate))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = rest_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Loads the vaccine catalog seed named by `VAXDESK_CATALOG_FILE`, or an
/// empty catalog when unset.
fn load_catalog() -> anyhow::Result<InMemoryCatalog> {
    match std::env::var("VAXDESK_CATALOG_FILE") {
        Ok(path) => {
            let json = std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("reading catalog seed {path}: {e}"))?;
            InMemoryCatalog::from_json(&json).map_err(|e| anyhow::anyhow!("catalog seed: {e}"))
        }
        Err(_) => {
            tracing::warn!("VAXDESK_CATALOG_FILE unset; starting with an empty vaccine catalog");
            Ok(InMemoryCatalog::new(vec![]))
        }
    }
}

/// Loads the patient registry seed named by `VAXDESK_REGISTRY_FILE`, or an
/// empty registry when unset.
fn load_registry() -> anyhow::Result<InMemoryRegistry> {
    match std::env::var("VAXDESK_REGISTRY_FILE") {
        Ok(path) => {
            let json = std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("reading registry seed {path}: {e}"))?;
            InMemoryRegistry::from_json(&json).map_err(|e| anyhow::anyhow!("registry seed: {e}"))
        }
        Err(_) => {
            tracing::warn!("VAXDESK_REGISTRY_FILE unset; starting with an empty patient registry");
            Ok(InMemoryRegistry::new(vec![]))
        }
    }
}

/// Listing query parameters.
#[derive(serde::Deserialize, utoipa::IntoParams)]
struct ListParams {
    /// One of `search`, `all`, `waiting`, `checked_in`, `checked_out`.
    filter: Option<String>,
    /// Free-text patient-name query; three characters or more switch the
    /// listing into search mode.
    search: Option<String>,
    page: Option<u32>,
    /// Clamped to [10, 10000]; the upper bound supports whole-day export.
    per_page: Option<u32>,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "vaxdesk is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/units/{unit_id}/appointments",
    params(ListParams),
    responses(
        (status = 200, description = "Ordered page of today's roster", body = ListAppointmentsRes)
    )
)]
/// List a unit's appointments for today
///
/// Applies the requested filter keyword or free-text search, then orders
/// by scheduled start and patient name. Defaults to the `waiting` view.
async fn list_appointments(
    State(state): State<AppState>,
    Path(unit_id): Path<Uuid>,
    Query(params): Query<ListParams>,
) -> Json<ListAppointmentsRes> {
    let unit = UnitId::from_uuid(unit_id);
    let request = RosterRequest {
        filter: params.filter,
        search: params.search,
        page: params.page,
        per_page: params.per_page,
    };
    let page = state
        .roster
        .list(&unit, Utc::now().date_naive(), &request);
    Json(ListAppointmentsRes::from(&page))
}

#[utoipa::path(
    post,
    path = "/units/{unit_id}/appointments",
    request_body = ScheduleAppointmentReq,
    responses(
        (status = 201, description = "Appointment scheduled", body = AppointmentRes),
        (status = 422, description = "Malformed request", body = ErrorBody)
    )
)]
/// Schedule a waiting appointment
///
/// Entry point for the external booking process; the appointment starts
/// its life in the `waiting` state.
async fn schedule_appointment(
    State(state): State<AppState>,
    Path(unit_id): Path<Uuid>,
    Json(req): Json<ScheduleAppointmentReq>,
) -> Result<(StatusCode, Json<AppointmentRes>), ApiError> {
    let patient = PatientId::parse(&req.patient_id)
        .map_err(|e| ApiError::unprocessable("invalid_patient_id", e.to_string()))?;
    let start: DateTime<Utc> = req
        .start
        .parse()
        .map_err(|e| ApiError::unprocessable("invalid_start", format!("{e}")))?;

    let appointment = Appointment::waiting(
        AppointmentId::new(),
        UnitId::from_uuid(unit_id),
        patient,
        start,
    );
    let res = AppointmentRes::from(&appointment);
    state.store.schedule(appointment)?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[utoipa::path(
    get,
    path = "/units/{unit_id}/appointments/{id}",
    responses(
        (status = 200, description = "Appointment detail", body = AppointmentDetailRes),
        (status = 404, description = "No such appointment", body = ErrorBody)
    )
)]
/// Appointment detail
///
/// Includes the patient's other appointments, their full dose history in
/// administration order, and the vaccine selection list.
async fn get_appointment(
    State(state): State<AppState>,
    Path((unit_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AppointmentDetailRes>, ApiError> {
    let detail = state.roster.detail(
        &UnitId::from_uuid(unit_id),
        &AppointmentId::from_uuid(id),
    )?;
    Ok(Json(AppointmentDetailRes::from(&detail)))
}

#[utoipa::path(
    post,
    path = "/units/{unit_id}/appointments/{id}/check-in",
    responses(
        (status = 200, description = "Patient received", body = AppointmentRes),
        (status = 404, description = "No waiting appointment", body = ErrorBody),
        (status = 422, description = "Outside the allowed check-in window", body = ErrorBody)
    )
)]
/// Check in a waiting appointment
async fn check_in(
    State(state): State<AppState>,
    Path((unit_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AppointmentRes>, ApiError> {
    let appointment = state.reception.check_in(
        &UnitId::from_uuid(unit_id),
        &AppointmentId::from_uuid(id),
        Utc::now(),
    )?;
    Ok(Json(AppointmentRes::from(&appointment)))
}

#[utoipa::path(
    post,
    path = "/units/{unit_id}/appointments/{id}/check-out",
    request_body = CheckOutReq,
    responses(
        (status = 200, description = "Dose recorded", body = CheckOutRes),
        (status = 404, description = "No checked-in appointment", body = ErrorBody),
        (status = 422, description = "No vaccine selected", body = ErrorBody)
    )
)]
/// Check out a checked-in appointment
///
/// Records the administered dose and, when the regimen defines a
/// subsequent dose, schedules the follow-up appointment in the same
/// transaction.
async fn check_out(
    State(state): State<AppState>,
    Path((unit_id, id)): Path<(Uuid, Uuid)>,
    Json(req): Json<CheckOutReq>,
) -> Result<Json<CheckOutRes>, ApiError> {
    let vaccine = match req.vaccine_id.as_deref() {
        Some(raw) => Some(
            VaccineId::parse(raw)
                .map_err(|e| ApiError::unprocessable("invalid_vaccine_id", e.to_string()))?,
        ),
        None => None,
    };

    let checked_out = state.reception.check_out(
        &UnitId::from_uuid(unit_id),
        &AppointmentId::from_uuid(id),
        vaccine.as_ref(),
        Utc::now(),
    )?;
    Ok(Json(CheckOutRes::from(&checked_out)))
}

#[utoipa::path(
    post,
    path = "/units/{unit_id}/appointments/{id}/suspend",
    request_body = SuspendReq,
    responses(
        (status = 200, description = "Appointment suspended", body = AppointmentRes),
        (status = 404, description = "No suspendable appointment", body = ErrorBody),
        (status = 422, description = "Blank reason", body = ErrorBody)
    )
)]
/// Suspend a not-yet-checked-in appointment
async fn suspend(
    State(state): State<AppState>,
    Path((unit_id, id)): Path<(Uuid, Uuid)>,
    Json(req): Json<SuspendReq>,
) -> Result<Json<AppointmentRes>, ApiError> {
    let reason = NonEmptyText::new(&req.reason)
        .map_err(|_| ApiError::unprocessable("invalid_reason", "suspend reason cannot be empty"))?;

    let appointment = state.reception.suspend(
        &UnitId::from_uuid(unit_id),
        &AppointmentId::from_uuid(id),
        reason,
    )?;
    Ok(Json(AppointmentRes::from(&appointment)))
}

#[utoipa::path(
    post,
    path = "/units/{unit_id}/appointments/{id}/activate",
    responses(
        (status = 200, description = "Appointment active again", body = AppointmentRes),
        (status = 404, description = "No such appointment", body = ErrorBody)
    )
)]
/// Reactivate a suspended appointment
async fn activate(
    State(state): State<AppState>,
    Path((unit_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AppointmentRes>, ApiError> {
    let appointment = state
        .reception
        .activate(&UnitId::from_uuid(unit_id), &AppointmentId::from_uuid(id))?;
    Ok(Json(AppointmentRes::from(&appointment)))
}
