use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{FromRequestParts, OptionalFromRequestParts, Path, State},
    http::{HeaderName, HeaderValue, Method, StatusCode, header, request::Parts},
    response::IntoResponse,
    routing::{get, post, put},
};
use axum_extra::extract::{
    WithRejection,
    cookie::{Cookie, CookieJar, SameSite},
};
use chrono::Utc;
use platform_api::{ApiError, ApiResult};
use platform_authn::{
    AccountDirectory, CREDENTIAL_TTL_DAYS, IdentityRecord, IdentityResolver, NewAccount,
    ProfileUpdate,
};
use platform_authz::{
    AccessRequirement, GeoLevel, Identity, Module, ModuleAction, Permission, Role, authorize,
    authorize_account_creation, authorize_profile_update,
};
use platform_db::DbPool;
use serde::Serialize;
use serde_json::{Value, json};
use time::Duration as TimeDuration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use crate::config::AppConfig;

const ADMIN_DASHBOARD: AccessRequirement =
    AccessRequirement::new().roles(&[Role::SuperAdmin, Role::CountryAdmin]);
const REPORTS: AccessRequirement = AccessRequirement::new().permission(Permission::ViewReports);
const REGIONAL_DATA: AccessRequirement = AccessRequirement::new().min_geo(GeoLevel::Region);
const CREATE_ADMIN: AccessRequirement = AccessRequirement::new().outrank_target();
const COUNTRY_DASHBOARD: AccessRequirement = AccessRequirement::new()
    .roles(&[Role::CountryAdmin])
    .min_geo(GeoLevel::Country)
    .permission(Permission::ViewDashboard);

const fn volunteers(action: ModuleAction) -> AccessRequirement {
    AccessRequirement::new().permission(Permission::module(Module::Volunteers, action))
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub resolver: IdentityResolver,
    pub accounts: Arc<dyn AccountDirectory>,
    /// Pinged by the health check when the store is database-backed.
    pub pool: Option<DbPool>,
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "access server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let credentials = !allowed.is_empty();
    let allow_origin = if credentials {
        AllowOrigin::list(allowed)
    } else {
        AllowOrigin::any()
    };
    CorsLayer::new()
        .allow_credentials(credentials)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(allow_origin)
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    let auth = Router::new()
        .route("/register", post(register_handler))
        .route("/logout", get(logout_handler))
        .route("/profile", get(profile_handler))
        .route("/profile/{id}", put(update_profile_handler))
        .route("/admin/dashboard", get(admin_dashboard_handler))
        .route("/reports", get(reports_handler))
        .route("/regional-data", get(regional_data_handler))
        .route("/admins", post(create_admin_handler))
        .route("/country-dashboard", get(country_dashboard_handler))
        .route(
            "/volunteers",
            get(list_volunteers_handler).post(create_volunteer_handler),
        )
        .route(
            "/volunteers/{id}",
            put(update_volunteer_handler).delete(delete_volunteer_handler),
        );

    Router::new()
        .route("/health", get(health_handler))
        .nest("/auth", auth)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

/// The resolved caller of a protected route.
pub struct Caller(pub IdentityRecord);

impl Caller {
    fn identity(&self) -> Identity {
        self.0.identity()
    }
}

/// Cookie first, then `Authorization: Bearer`.
fn raw_credential(parts: &Parts, cookie_name: &str) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    jar.get(cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.trim().is_empty())
        .or_else(|| {
            parts
                .headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        })
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> ApiResult<Self> {
        let raw = raw_credential(parts, &state.config.token_cookie);
        let record = state.resolver.resolve_record(raw.as_deref()).await?;
        Ok(Caller(record))
    }
}

/// Absent credentials yield `None`; a presented but unusable one still fails.
impl OptionalFromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> ApiResult<Option<Self>> {
        let Some(raw) = raw_credential(parts, &state.config.token_cookie) else {
            return Ok(None);
        };
        let record = state.resolver.resolve_record(Some(&raw)).await?;
        Ok(Some(Caller(record)))
    }
}

fn require(
    caller: &Caller,
    requirement: &AccessRequirement,
    payload_role: Option<&str>,
) -> ApiResult<Identity> {
    let identity = caller.identity();
    authorize(&identity, requirement, payload_role).into_result()?;
    Ok(identity)
}

fn token_cookie(config: &AppConfig, value: String) -> Cookie<'static> {
    Cookie::build((config.token_cookie.clone(), value))
        .path("/")
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::days(CREDENTIAL_TTL_DAYS))
        .build()
}

async fn register_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    caller: Option<Caller>,
    WithRejection(Json(account), _): WithRejection<Json<NewAccount>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let creator = caller.as_ref().map(Caller::identity);
    authorize_account_creation(creator.as_ref(), account.role).into_result()?;

    let record = account.into_record(Uuid::new_v4(), Utc::now())?;
    let record = state.accounts.create(record).await?;
    let token = state
        .config
        .codec
        .issue(&record.identity())
        .map_err(ApiError::internal)?;
    info!(account_id = %record.id, role = %record.role, "account registered");

    let jar = jar.add(token_cookie(&state.config, token.clone()));
    Ok((
        StatusCode::CREATED,
        jar,
        Json(json!({ "success": true, "token": token, "user": record })),
    ))
}

async fn logout_handler(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build((state.config.token_cookie.clone(), "")).path("/"));
    (
        jar,
        Json(json!({ "success": true, "message": "logged out" })),
    )
}

async fn profile_handler(caller: Caller) -> Json<Value> {
    Json(json!({ "success": true, "user": caller.0 }))
}

async fn update_profile_handler(
    State(state): State<AppState>,
    caller: Caller,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(update), _): WithRejection<Json<ProfileUpdate>, ApiError>,
) -> ApiResult<Json<Value>> {
    authorize_profile_update(&caller.identity(), id).into_result()?;
    update.validate()?;
    let record = state
        .accounts
        .update_profile(id, &update, Utc::now())
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(json!({ "success": true, "user": record })))
}

async fn admin_dashboard_handler(caller: Caller) -> ApiResult<Json<Value>> {
    let identity = require(&caller, &ADMIN_DASHBOARD, None)?;
    Ok(Json(json!({
        "success": true,
        "message": "admin dashboard",
        "role": identity.role,
    })))
}

async fn reports_handler(caller: Caller) -> ApiResult<Json<Value>> {
    let identity = require(&caller, &REPORTS, None)?;
    Ok(Json(json!({
        "success": true,
        "message": "reports",
        "geo": identity.geo,
    })))
}

async fn regional_data_handler(caller: Caller) -> ApiResult<Json<Value>> {
    let identity = require(&caller, &REGIONAL_DATA, None)?;
    Ok(Json(json!({
        "success": true,
        "geoScope": identity.geo.depth(),
        "geo": identity.geo,
        "assignedRegions": identity.assigned_regions,
    })))
}

/// Creates an account of a strictly lower role than the caller's.
async fn create_admin_handler(
    State(state): State<AppState>,
    caller: Caller,
    WithRejection(Json(body), _): WithRejection<Json<Value>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let payload_role = body.get("role").and_then(Value::as_str);
    let identity = require(&caller, &CREATE_ADMIN, payload_role)?;

    let account: NewAccount =
        serde_json::from_value(body).map_err(|err| ApiError::InvalidInput(err.to_string()))?;
    let record = account.into_record(Uuid::new_v4(), Utc::now())?;
    let record = state.accounts.create(record).await?;
    info!(
        account_id = %record.id,
        role = %record.role,
        created_by = %identity.id,
        "admin account created"
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "user": record })),
    ))
}

async fn country_dashboard_handler(caller: Caller) -> ApiResult<Json<Value>> {
    let identity = require(&caller, &COUNTRY_DASHBOARD, None)?;
    Ok(Json(json!({
        "success": true,
        "message": "country dashboard",
        "country": identity.geo.country,
    })))
}

fn volunteer_ack(action: ModuleAction, id: Option<Uuid>) -> Json<Value> {
    Json(json!({
        "success": true,
        "module": Module::Volunteers.as_str(),
        "action": action.as_str(),
        "id": id,
    }))
}

async fn list_volunteers_handler(caller: Caller) -> ApiResult<Json<Value>> {
    require(&caller, &volunteers(ModuleAction::Read), None)?;
    Ok(volunteer_ack(ModuleAction::Read, None))
}

async fn create_volunteer_handler(caller: Caller) -> ApiResult<impl IntoResponse> {
    require(&caller, &volunteers(ModuleAction::Create), None)?;
    Ok((
        StatusCode::CREATED,
        volunteer_ack(ModuleAction::Create, Some(Uuid::new_v4())),
    ))
}

async fn update_volunteer_handler(
    caller: Caller,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<Value>> {
    require(&caller, &volunteers(ModuleAction::Update), None)?;
    Ok(volunteer_ack(ModuleAction::Update, Some(id)))
}

async fn delete_volunteer_handler(
    caller: Caller,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<Value>> {
    require(&caller, &volunteers(ModuleAction::Delete), None)?;
    Ok(volunteer_ack(ModuleAction::Delete, Some(id)))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = match &state.pool {
        Some(pool) => Some(pool.ping().await.is_ok()),
        None => None,
    };
    Json(HealthResponse {
        ok: db_ok.unwrap_or(true),
        db_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    db_ok: Option<bool>,
    version: &'static str,
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
    info!("shutdown signal received");
}
