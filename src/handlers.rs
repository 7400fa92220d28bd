use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    middleware,
    routing::{get, patch, post, MethodRouter},
    Extension, Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::auth::require_admin;
use crate::config::Config;
use crate::content::{ContentKind, ContentService};
use crate::errors::AppError;
use crate::leads::{LeadService, MAX_LIST_LIMIT};
use crate::models::*;
use crate::validation::{
    validate_content_update, validate_lead_patch, validate_public_form, validate_status_update,
};

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Lead record manager.
    pub leads: LeadService,
    /// Header/footer singletons.
    pub content: ContentService,
    /// Application configuration.
    pub config: Config,
}

/// Builds the full router without a rate limiter on the public submit route.
pub fn app_router(state: Arc<AppState>) -> Router {
    app_router_with(state, |route| route)
}

/// Builds the full router; `wrap_submit` decorates `POST /api/v1/leads`
/// (the server uses it to attach rate limiting).
pub fn app_router_with<F>(state: Arc<AppState>, wrap_submit: F) -> Router
where
    F: FnOnce(MethodRouter<Arc<AppState>>) -> MethodRouter<Arc<AppState>>,
{
    let admin = middleware::from_fn_with_state(state.clone(), require_admin);

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/v1/leads",
            wrap_submit(post(create_lead)).get(list_leads),
        )
        .route(
            "/api/v1/leads/:id",
            get(get_lead).merge(
                patch(update_lead)
                    .delete(delete_lead)
                    .route_layer(admin.clone()),
            ),
        )
        .route(
            "/api/v1/leads/:id/status",
            patch(update_lead_status).route_layer(admin.clone()),
        )
        .route(
            "/api/v1/footer",
            get(get_footer).merge(patch(update_footer).route_layer(admin.clone())),
        )
        .route(
            "/api/v1/form-header",
            get(get_form_header).merge(patch(update_form_header).route_layer(admin)),
        )
        .with_state(state)
}

/// Unwraps a JSON body, reporting malformed or unknown fields as `400`.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// Health check endpoint.
///
/// Returns the service status and version.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "lead-capture-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/v1/leads
///
/// Public homepage form submission. Returns `201` for a new lead and `200`
/// when the submission was folded into a lead captured earlier the same day.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `payload` - The submitted form.
///
/// # Returns
///
/// * `Result<(StatusCode, Json<ApiResponse<SubmissionOutcome>>), AppError>` - The submission outcome or an error.
pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PublicLeadForm>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<SubmissionOutcome>>), AppError> {
    let form = json_body(payload)?;
    validate_public_form(&form)?;

    tracing::info!("POST /leads - public form submission");

    let outcome = state
        .leads
        .create_from_public_form(&form, &RequestContext::default())
        .await?;

    let status = if outcome.reused {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(ApiResponse::ok(outcome))))
}

/// GET /api/v1/leads
///
/// Lists leads newest first, filtered by `status`, `suburb`, `address`
/// prefix and free-text `q`.
pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListLeadsParams>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<Lead>>>, AppError> {
    let Query(params) = query.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    if let Some(limit) = params.limit {
        if limit == 0 || limit > MAX_LIST_LIMIT {
            return Err(AppError::BadRequest(format!(
                "'limit' must be between 1 and {}",
                MAX_LIST_LIMIT
            )));
        }
    }

    if let Some(offset) = params.offset {
        if i64::try_from(offset).is_err() {
            return Err(AppError::BadRequest(format!(
                "'offset' must be at most {}",
                i64::MAX
            )));
        }
    }

    let leads = state.leads.list(&params).await?;
    Ok(Json(ApiResponse::ok(leads)))
}

/// GET /api/v1/leads/:id
pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Lead>>, AppError> {
    let lead = state
        .leads
        .get_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))?;
    Ok(Json(ApiResponse::ok(lead)))
}

/// PATCH /api/v1/leads/:id
///
/// Admin patch over contact, status and metadata.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `ctx` - Caller identity set by the admin gate.
/// * `id` - The lead id.
/// * `payload` - The patch; unknown fields are rejected.
///
/// # Returns
///
/// * `Result<Json<ApiResponse<Lead>>, AppError>` - The updated lead or an error.
pub async fn update_lead(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    payload: Result<Json<LeadPatch>, JsonRejection>,
) -> Result<Json<ApiResponse<Lead>>, AppError> {
    let patch = json_body(payload)?;
    validate_lead_patch(&patch)?;

    tracing::info!("PATCH /leads/{}", id);
    let lead = state.leads.update(&id, patch, &ctx).await?;
    Ok(Json(ApiResponse::ok(lead)))
}

/// PATCH /api/v1/leads/:id/status
pub async fn update_lead_status(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<ApiResponse<Lead>>, AppError> {
    let update = json_body(payload)?;
    validate_status_update(&update)?;

    tracing::info!("PATCH /leads/{}/status - {}", id, update.status);
    let lead = state.leads.update_status(&id, update, &ctx).await?;
    Ok(Json(ApiResponse::ok(lead)))
}

/// DELETE /api/v1/leads/:id
///
/// Soft delete: the lead stays readable with `metadata.deleted_at` set.
pub async fn delete_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Lead>>, AppError> {
    tracing::info!("DELETE /leads/{}", id);
    let lead = state.leads.soft_delete(&id).await?;
    Ok(Json(ApiResponse::ok(lead)))
}

async fn get_content(
    state: &AppState,
    kind: ContentKind,
) -> Result<Json<ApiResponse<ContentDocument>>, AppError> {
    let doc = state.content.get(kind).await?;
    Ok(Json(ApiResponse::ok(doc)))
}

async fn update_content(
    state: &AppState,
    kind: ContentKind,
    payload: Result<Json<ContentUpdate>, JsonRejection>,
) -> Result<Json<ApiResponse<ContentDocument>>, AppError> {
    let update = json_body(payload)?;
    validate_content_update(&update)?;

    let doc = state.content.update(kind, &update).await?;
    Ok(Json(ApiResponse::ok(doc)))
}

/// GET /api/v1/footer
pub async fn get_footer(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ContentDocument>>, AppError> {
    get_content(&state, ContentKind::Footer).await
}

/// PATCH /api/v1/footer
pub async fn update_footer(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ContentUpdate>, JsonRejection>,
) -> Result<Json<ApiResponse<ContentDocument>>, AppError> {
    update_content(&state, ContentKind::Footer, payload).await
}

/// GET /api/v1/form-header
pub async fn get_form_header(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ContentDocument>>, AppError> {
    get_content(&state, ContentKind::Header).await
}

/// PATCH /api/v1/form-header
pub async fn update_form_header(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ContentUpdate>, JsonRejection>,
) -> Result<Json<ApiResponse<ContentDocument>>, AppError> {
    update_content(&state, ContentKind::Header, payload).await
}
