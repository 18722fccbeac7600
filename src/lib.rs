pub mod auth;
pub mod backend;
pub mod booking;
pub mod eligibility;
pub mod error;
pub mod handlers;
pub mod ical;
pub mod membership;
pub mod models;
pub mod openapi;
pub mod presentation;
pub mod reconciler;
pub mod settings;
pub mod validation;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get};
use handlers::{
    cancel_reservation, get_ical, get_membership, get_schedule, healthz_live, healthz_ready,
    reserve_class, root,
};
use tower_http::LatencyUnit;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::backend::BackendClient;
use crate::booking::InFlight;
use crate::eligibility::EligibilityEvaluator;
use crate::ical::ICalExporter;
use crate::openapi::ApiDoc;
use crate::settings::Settings;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub backend: Arc<BackendClient>,
    pub exporter: Arc<ICalExporter>,
    pub evaluator: EligibilityEvaluator,
    pub in_flight: InFlight,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            backend: Arc::new(BackendClient::new(settings.backend_base_url.clone())),
            exporter: Arc::new(ICalExporter::new(
                settings.studio_name.clone(),
                settings.timezone,
            )),
            evaluator: EligibilityEvaluator::new(settings.expiration_policy()),
            in_flight: InFlight::new(),
            settings,
        }
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;

    let env_filter = if settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .without_time()
        .init();

    let state = AppState::new(settings);
    info!(
        backend = %state.settings.backend_base_url,
        expiration = ?state.settings.expiration_policy(),
        "using studio backend"
    );

    let app = build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], state.settings.port));
    info!("Starting Studio Booking API on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    let mut router = Router::new()
        .route("/", get(root))
        .route("/healthz/live", get(healthz_live))
        .route("/healthz/ready", get(healthz_ready))
        .route("/students/{student_id}/schedule", get(get_schedule))
        .route("/students/{student_id}/membership", get(get_membership))
        .route(
            "/students/{student_id}/reservations/{class_id}",
            axum::routing::post(reserve_class).delete(cancel_reservation),
        )
        .route("/students/{student_id}/reservations.ical", get(get_ical))
        .with_state(state.clone());

    if state.settings.enable_swagger {
        let openapi = ApiDoc::openapi();
        let swagger = SwaggerUi::new("/docs").url("/openapi.json", openapi);
        router = router.merge(swagger);
    }

    router.layer(trace_layer)
}
