//! HTTP API.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /health` | Liveness and version |
//! | `GET /items` | Page of items (`?page=`), or link lookup (`?check_link=<handle>`) |
//! | `POST /items` | Ingest one item (201 created, 200 otherwise) |
//! | `GET/PUT/DELETE /items/{id}` | Item administration |
//! | `POST /items/{id}/summarize` | Generate and store the item summary |
//! | `POST /cases`, `GET /cases` | Create and list cases |
//! | `POST /cases/{id}/promote` | Attach items and promote |
//! | `POST /cases/{id}/summarize` | Generate and store the case summary |
//! | `GET /reports` | Report over promoted cases (`?format=html` for HTML) |
//!
//! Callers are identified by the `x-user` / `x-role` headers, which an
//! upstream auth layer is trusted to set.

use std::collections::BTreeMap;
use std::panic::Location;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use newsroll_core::models::{CaseStatus, IngestRequest, Role};
use newsroll_core::report::{build_report, build_report_html};
use newsroll_core::{Error, FieldError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::app::App;
use crate::config::Config;
use crate::items::{check_link, list_page, ItemView};

pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = App::open(config).await?;
    let router = build_router(app);

    info!(bind = %bind_addr, "newsroll server listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

pub fn build_router(app: App) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/items", get(handle_list_items).post(handle_ingest))
        .route(
            "/items/{id}",
            get(handle_get_item)
                .put(handle_update_item)
                .delete(handle_delete_item),
        )
        .route("/items/{id}/summarize", post(handle_summarize_item))
        .route("/cases", get(handle_list_cases).post(handle_create_case))
        .route("/cases/{id}/promote", post(handle_promote_case))
        .route("/cases/{id}/summarize", post(handle_summarize_case))
        .route("/reports", get(handle_report))
        .layer(cors)
        .with_state(app)
}

// ============ Error response ============

pub struct ApiError {
    status: StatusCode,
    body: Value,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<Error> for ApiError {
    #[track_caller]
    fn from(err: Error) -> Self {
        match err {
            Error::Validation { errors } => validation_error(errors),
            Error::NotFound { entity, .. } => ApiError {
                status: StatusCode::NOT_FOUND,
                body: json!({ "error": format!("{} not found", entity) }),
            },
            other => {
                let caller = Location::caller();
                let location = format!("{}:{}", caller.file(), caller.line());
                error!(kind = other.kind(), err = %other, location = %location, "request failed");
                ApiError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: json!({
                        "error": other.to_string(),
                        "type": other.kind(),
                        "location": location,
                    }),
                }
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    #[track_caller]
    fn from(err: anyhow::Error) -> Self {
        ApiError::from(Error::Unexpected(err))
    }
}

fn validation_error(errors: Vec<FieldError>) -> ApiError {
    let mut by_field: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for e in errors {
        by_field.entry(e.field).or_default().push(e.message);
    }
    ApiError {
        status: StatusCode::UNPROCESSABLE_ENTITY,
        body: json!({
            "message": "The given data was invalid.",
            "errors": by_field,
        }),
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ApiError {
    validation_error(vec![FieldError::new(field, message)])
}

fn parse_payload(body: Value) -> Result<IngestRequest, ApiError> {
    serde_json::from_value(body).map_err(|e| invalid("payload", e.to_string()))
}

/// Caller role from the auth headers. `x-role: admin` wins; otherwise
/// `x-user` names a member.
fn role_from_headers(headers: &HeaderMap) -> Result<Role, ApiError> {
    let value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if value("x-role").is_some_and(|r| r.eq_ignore_ascii_case("admin")) {
        return Ok(Role::Admin);
    }
    match value("x-user") {
        Some(user) => Ok(Role::Member {
            user: user.to_string(),
        }),
        None => Err(ApiError {
            status: StatusCode::UNAUTHORIZED,
            body: json!({ "error": "missing x-user header" }),
        }),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /items ============

#[derive(Deserialize)]
struct ListItemsQuery {
    page: Option<i64>,
    check_link: Option<String>,
}

async fn handle_list_items(
    State(app): State<App>,
    Query(q): Query<ListItemsQuery>,
) -> Result<Response, ApiError> {
    if let Some(handle) = q.check_link.filter(|h| !h.trim().is_empty()) {
        let items = check_link(app.store.as_ref(), &handle).await?;
        let data: Vec<ItemView> = items
            .into_iter()
            .map(|i| ItemView::new(i, app.media.as_ref()))
            .collect();
        return Ok(Json(json!({ "data": data })).into_response());
    }

    let page = list_page(&app, q.page.unwrap_or(1)).await?;
    Ok(Json(page).into_response())
}

async fn handle_ingest(
    State(app): State<App>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let incoming = parse_payload(body)?.validate()?;
    let result = app.engine.ingest(incoming).await?;

    let status = StatusCode::from_u16(result.outcome.status_code()).unwrap_or(StatusCode::OK);
    let body = json!({
        "message": result.outcome.message(),
        "outcome": result.outcome.as_str(),
        "data": ItemView::new(result.item, app.media.as_ref()),
    });
    Ok((status, Json(body)).into_response())
}

async fn handle_get_item(
    State(app): State<App>,
    Path(id): Path<String>,
) -> Result<Json<ItemView>, ApiError> {
    let item = app.engine.get(&id).await?;
    Ok(Json(ItemView::new(item, app.media.as_ref())))
}

async fn handle_update_item(
    State(app): State<App>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<ItemView>, ApiError> {
    let patch = parse_payload(body)?.validate_patch()?;
    let item = app.engine.edit(&id, patch).await?;
    Ok(Json(ItemView::new(item, app.media.as_ref())))
}

async fn handle_delete_item(
    State(app): State<App>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    app.engine.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_summarize_item(
    State(app): State<App>,
    Path(id): Path<String>,
    body: Option<Json<SummarizeBody>>,
) -> Result<Response, ApiError> {
    let max_chars = body.and_then(|Json(b)| b.max_chars);
    let summary = app.cases.summarize_item(&id, max_chars).await?;
    Ok(Json(json!({ "summary": summary })).into_response())
}

// ============ /cases ============

#[derive(Deserialize)]
struct CreateCaseBody {
    #[serde(default)]
    name: String,
    owner: Option<String>,
}

async fn handle_create_case(
    State(app): State<App>,
    headers: HeaderMap,
    Json(body): Json<CreateCaseBody>,
) -> Result<Response, ApiError> {
    let role = role_from_headers(&headers)?;
    let owner = match (&role, body.owner) {
        (Role::Member { user }, _) => Some(user.clone()),
        (Role::Admin, owner) => owner,
    };
    let case = app.cases.create_case(&body.name, owner.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(case)).into_response())
}

#[derive(Deserialize)]
struct ListCasesQuery {
    status: Option<String>,
}

async fn handle_list_cases(
    State(app): State<App>,
    headers: HeaderMap,
    Query(q): Query<ListCasesQuery>,
) -> Result<Response, ApiError> {
    let role = role_from_headers(&headers)?;
    let status = match q.status.as_deref() {
        None | Some("") => None,
        Some(s) => Some(
            CaseStatus::parse(s)
                .ok_or_else(|| invalid("status", "status must be open or promoted"))?,
        ),
    };
    let cases = app.cases.list_cases(&role, status).await?;
    Ok(Json(json!({ "data": cases })).into_response())
}

#[derive(Deserialize)]
struct PromoteBody {
    #[serde(default)]
    item_ids: Vec<String>,
}

async fn handle_promote_case(
    State(app): State<App>,
    Path(id): Path<String>,
    Json(body): Json<PromoteBody>,
) -> Result<Response, ApiError> {
    let case = app.cases.promote_case(&id, &body.item_ids).await?;
    Ok(Json(case).into_response())
}

#[derive(Deserialize)]
struct SummarizeBody {
    max_chars: Option<usize>,
}

async fn handle_summarize_case(
    State(app): State<App>,
    Path(id): Path<String>,
    body: Option<Json<SummarizeBody>>,
) -> Result<Response, ApiError> {
    let max_chars = body.and_then(|Json(b)| b.max_chars);
    let summary = app.cases.summarize_case(&id, max_chars).await?;
    Ok(Json(json!({ "summary": summary })).into_response())
}

// ============ GET /reports ============

#[derive(Deserialize)]
struct ReportQuery {
    from: Option<String>,
    to: Option<String>,
    /// Comma-separated case ids; empty means every promoted case.
    case_ids: Option<String>,
    /// `text` (default) or `html`.
    format: Option<String>,
}

fn parse_query_date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| invalid(field, format!("{} must be a date (YYYY-MM-DD)", field))),
    }
}

async fn handle_report(
    State(app): State<App>,
    Query(q): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let from = parse_query_date("from", q.from.as_deref())?;
    let to = parse_query_date("to", q.to.as_deref())?;
    let case_ids: Vec<String> = q
        .case_ids
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let html = match q.format.as_deref().map(str::trim).unwrap_or("") {
        "" | "text" => false,
        "html" => true,
        _ => return Err(invalid("format", "format must be text or html")),
    };

    let cases = app.cases.cases_for_report(&case_ids, from, to).await?;
    let now = Utc::now();
    let response = if html {
        (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            build_report_html(&cases, from, to, now),
        )
    } else {
        (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            build_report(&cases, from, to, now),
        )
    };
    Ok(response.into_response())
}
