use axum::{
    Router,
    extract::{Request, State},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod gate;
pub mod handlers;
pub mod models;
pub mod repository;

// Routing segregated by access level (public, authenticated, role portals).
pub mod routes;
use routes::{admin, authenticated, customer, public, super_admin, technician};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use gate::{AccessGate, GateDecision, RouteTable};
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::logout, handlers::change_password, handlers::get_me,
        handlers::dashboard, handlers::section_page, handlers::home, handlers::login_page,
        handlers::register_page, handlers::unauthorized_page, handlers::health
    ),
    components(
        schemas(
            models::LoginRequest, models::LoginResponse, models::ChangePasswordRequest,
            models::UserProfile, models::PageResponse, models::HealthResponse,
        )
    ),
    tags(
        (name = "service-portal", description = "Multi-tenant service business portal")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a request needs, built once in `main` and cloned per request.
#[derive(Clone)]
pub struct AppState {
    /// Identity and session-record store over the shared PgPool.
    pub repo: RepositoryState,
    /// Access gate: route table plus token keys.
    pub gate: AccessGate,
    pub config: AppConfig,
}

impl AppState {
    /// Assembles the state with the portal route table and keys derived from
    /// the configured secret.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        let gate = AccessGate::new(
            RouteTable::portal(),
            auth::TokenKeys::new(&config.session_secret),
        );
        Self { repo, gate, config }
    }
}

/// access_gate
///
/// Runs the access gate on every request. An allowed request continues with
/// the resolved `AuthUser` in its extensions; anything else is answered here
/// with the gate's redirect.
async fn access_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let cookie = state.config.session_cookie();
    let token = cookie.read(request.headers()).map(str::to_owned);
    let path = request.uri().path().to_owned();

    let decision = state
        .gate
        .evaluate(&path, token.as_deref(), state.repo.as_ref(), chrono::Utc::now())
        .await;

    match decision.resolve(&cookie) {
        Ok(user) => {
            if let Some(user) = user {
                request.extensions_mut().insert(user);
            }
            next.run(request).await
        }
        Err(redirect) => redirect,
    }
}

/// create_router
///
/// Assembles the routing structure, puts the access gate in front of all of
/// it, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .nest("/admin", admin::admin_routes())
        .nest("/technician", technician::technician_routes())
        .nest("/customer", customer::customer_routes())
        .nest("/super-admin", super_admin::super_admin_routes())
        // The gate sees every request, including unmatched paths, so a
        // missing route never reveals more than a redirect would.
        .layer(middleware::from_fn_with_state(state.clone(), access_gate))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one HTTP request, tagged with the `x-request-id` so every log
/// line of the request can be correlated. Query strings are left out of the
/// span.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        path = %request.uri().path(),
        req_id = %request_id,
    )
}
