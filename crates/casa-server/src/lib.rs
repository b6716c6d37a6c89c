//! Casa Web Server
//!
//! Axum-based REST API for the Casa household expense tracker.
//!
//! Security features:
//! - Identity taken from a header set by the fronting proxy (authentication is external)
//! - Every ledger route is scoped to the caller's household
//! - Restrictive CORS policy and security headers
//! - Input validation (pagination limits, upload size limits)
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{debug, error, info, warn};

use casa_core::ai::{AIBackend, AIClient};
use casa_core::chat::ChatService;
use casa_core::config::ChatConfig;
use casa_core::db::Database;
use casa_core::models::Member;

mod handlers;

/// Maximum request body size; chat audio arrives inline (base64) or as multipart
pub const MAX_UPLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Maximum decoded audio clip size (10 MB)
pub const MAX_AUDIO_BYTES: usize = 10 * 1024 * 1024;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 500;

/// Header carrying the authenticated member's email, unless configured otherwise
pub const DEFAULT_IDENTITY_HEADER: &str = "x-casa-member-email";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// Request header the proxy fills with the member's email
    pub identity_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            identity_header: DEFAULT_IDENTITY_HEADER.to_string(),
        }
    }
}

impl ServerConfig {
    /// Read `CASA_IDENTITY_HEADER` and `CASA_ALLOWED_ORIGINS` (comma-separated)
    pub fn from_env() -> Self {
        let identity_header = std::env::var("CASA_IDENTITY_HEADER")
            .ok()
            .map(|h| h.trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_IDENTITY_HEADER.to_string());
        let allowed_origins = std::env::var("CASA_ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Self {
            allowed_origins,
            identity_header,
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    pub chat: ChatService,
}

/// Who is calling, as resolved from the identity header
///
/// Inserted into request extensions by [`identity_middleware`] whenever the
/// header is present.
#[derive(Clone, Debug)]
pub struct Identity {
    pub email: String,
    /// `None` until the email is registered
    pub member: Option<Member>,
}

/// A registered member who belongs to a household
#[derive(Clone, Debug)]
pub struct Caller {
    pub member: Member,
    pub household_id: i64,
}

/// Email from the identity header, trimmed and lowercased
pub fn get_member_email(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
}

/// Identity middleware - resolves the identity header to a member
///
/// Never rejects: handlers decide whether they need an identity, a member or
/// a household (see [`identity`] and [`caller`]).
async fn identity_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(email) = get_member_email(request.headers(), &state.config.identity_header) {
        let member = match state.db.get_member_by_email(&email) {
            Ok(member) => member,
            Err(e) => return AppError::from(e).into_response(),
        };
        debug!(user = %email, registered = member.is_some(), path = %request.uri().path(), "Identified caller");
        request.extensions_mut().insert(Identity { email, member });
    }
    next.run(request).await
}

/// The caller's identity, or 401
pub fn identity(request: &Request) -> Result<Identity, AppError> {
    request
        .extensions()
        .get::<Identity>()
        .cloned()
        .ok_or_else(|| AppError::unauthorized("Authentication required"))
}

/// The registered member behind the request, or 401
pub fn member(request: &Request) -> Result<Member, AppError> {
    identity(request)?
        .member
        .ok_or_else(|| AppError::unauthorized("Member not registered"))
}

/// The member and their household, or 401/403
pub fn caller(request: &Request) -> Result<Caller, AppError> {
    let member = member(request)?;
    let household_id = member
        .household_id
        .ok_or_else(|| AppError::forbidden("Member has no household"))?;
    Ok(Caller {
        member,
        household_id,
    })
}

/// Standard success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the router, reading the AI backend and chat settings from the environment
pub fn create_router(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<Router> {
    let ai = AIClient::from_env();
    match ai {
        Some(ref client) => info!(
            "AI backend configured: {} (model: {})",
            client.host(),
            client.model()
        ),
        None => info!(
            "ℹ️  AI backend not configured (set OPENAI_COMPATIBLE_API_KEY or AI_BACKEND to enable chat)"
        ),
    }
    let chat = ChatService::new(db.clone(), ai, ChatConfig::from_env())?;
    Ok(create_router_with_chat(db, static_dir, config, chat))
}

/// Create the router around an existing chat pipeline
pub fn create_router_with_chat(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
    chat: ChatService,
) -> Router {
    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        chat,
    });

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        // Identity and household
        .route("/register", post(handlers::register))
        .route("/me", get(handlers::get_me))
        .route("/household", get(handlers::get_household))
        .route("/household/join", post(handlers::join_household))
        .route("/dashboard", get(handlers::get_dashboard))
        .route(
            "/accounts",
            get(handlers::list_accounts).post(handlers::create_account),
        )
        .route(
            "/accounts/:id",
            get(handlers::get_account)
                .put(handlers::update_account)
                .delete(handlers::delete_account),
        )
        .route(
            "/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route(
            "/categories/:id",
            get(handlers::get_category)
                .put(handlers::update_category)
                .delete(handlers::delete_category),
        )
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route("/transactions/quick", post(handlers::quick_entry))
        .route("/transactions/suggestions", get(handlers::title_suggestions))
        .route(
            "/transactions/:id",
            get(handlers::get_transaction)
                .put(handlers::update_transaction)
                .delete(handlers::delete_transaction),
        )
        .route("/reports/summary", get(handlers::report_summary))
        .route("/reports/overview", get(handlers::report_overview))
        .route("/goals", get(handlers::list_goals).put(handlers::upsert_goal))
        .route("/goals/progress", get(handlers::goal_progress))
        // Chat
        .route("/chat/message", post(handlers::chat_message))
        .route("/chat/history", get(handlers::chat_history));

    // Build CORS layer
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
    };

    // CSP: restrict scripts to same-origin, allow blob: for recorded audio
    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; media-src 'self' blob:; connect-src 'self'; frame-ancestors 'none'"
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    // Serve the web client if a directory is provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server
pub async fn serve(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
) -> anyhow::Result<()> {
    serve_with_config(db, host, port, static_dir, ServerConfig::from_env()).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    info!(header = %config.identity_header, "Trusting identity header from the proxy");

    let app = create_router(db, static_dir, config)?;
    check_ai_connection().await;

    let addr = format!("{}:{}", host, port);
    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log AI backend connection status
async fn check_ai_connection() {
    match AIClient::from_env() {
        Some(client) => {
            if client.health_check().await {
                info!(
                    "✅ AI backend connected: {} (model: {})",
                    client.host(),
                    client.model()
                );
            } else {
                warn!(
                    "⚠️  AI backend configured but not responding: {} (model: {})",
                    client.host(),
                    client.model()
                );
            }
        }
        None => {
            info!("ℹ️  AI backend not configured; chat replies will apologize");
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    fn new(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: &str) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub fn not_found(msg: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn conflict(msg: &str) -> Self {
        Self::new(StatusCode::CONFLICT, msg)
    }

    pub fn internal(msg: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();

        // Caller-facing library errors keep their message and get a 4xx
        if let Some(core) = err.downcast_ref::<casa_core::Error>() {
            let status = match core {
                casa_core::Error::Validation(_) => Some(StatusCode::BAD_REQUEST),
                casa_core::Error::NotFound(_) => Some(StatusCode::NOT_FOUND),
                casa_core::Error::Conflict(_) => Some(StatusCode::CONFLICT),
                _ => None,
            };
            if let Some(status) = status {
                return Self {
                    status,
                    message: core.to_string(),
                    internal: None,
                };
            }
        }

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
