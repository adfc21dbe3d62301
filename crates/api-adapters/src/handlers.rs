//! # Handlers
//!
//! Thin translation between HTTP and [`CommentService`]: extract, validate
//! the transport-level bits, call the service, shape the response.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::{CommentId, CommentView, DomainError, ReplyPage, ValidationErrors};
use serde::{Deserialize, Serialize};
use services::{CommentService, CommentSubmission, FetchParams};

use crate::cookies::edit_cookie_headers;
use crate::error::ApiResult;
use crate::request::{resolve_origin, ClientAddr};

/// Shared by every request.
#[derive(Clone)]
pub struct AppState {
    service: Arc<CommentService>,
    hosts: Arc<[String]>,
    cookie_max_age_secs: i64,
}

impl AppState {
    pub fn new(service: Arc<CommentService>, hosts: Vec<String>, cookie_max_age_secs: i64) -> Self {
        Self {
            service,
            hosts: hosts.into(),
            cookie_max_age_secs,
        }
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }
}

#[derive(Debug, Deserialize)]
pub struct UriQuery {
    uri: Option<String>,
}

impl UriQuery {
    fn required(self) -> Result<String, DomainError> {
        self.uri
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ValidationErrors::single("uri", "is required").into())
    }
}

#[derive(Debug, Deserialize)]
pub struct FetchRequest {
    uri: Option<String>,
    #[serde(flatten)]
    params: FetchParams,
}

#[derive(Debug, Deserialize)]
pub struct PlainQuery {
    plain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    text: String,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    text: String,
}

/// `GET /?uri=…` lists one page of a thread.
pub async fn fetch(
    State(state): State<AppState>,
    Query(request): Query<FetchRequest>,
) -> ApiResult<Json<ReplyPage>> {
    let query = request.params.validate()?;
    let uri = UriQuery { uri: request.uri }.required()?;
    let page = state.service.fetch(&uri, &query).await?;
    Ok(Json(page))
}

/// `POST /new?uri=…` stores a comment and hands its edit token to the author.
pub async fn create(
    State(state): State<AppState>,
    ClientAddr(remote_addr): ClientAddr,
    headers: HeaderMap,
    Query(query): Query<UriQuery>,
    body: Result<Json<CommentSubmission>, JsonRejection>,
) -> ApiResult<Response> {
    let origin = resolve_origin(&headers, state.hosts())?;
    tracing::debug!(%origin, "comment submission");
    let uri = query.required()?;
    let Json(submission) = body?;

    let created = state
        .service
        .create_comment(&uri, submission, &remote_addr)
        .await?;

    let status = if created.is_pending() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CREATED
    };
    let cookies = edit_cookie_headers(
        created.comment.id,
        &created.token,
        state.cookie_max_age_secs,
    )?;
    Ok((status, cookies, Json(created.comment)).into_response())
}

/// `GET /id/{id}`
pub async fn view(
    State(state): State<AppState>,
    id: Result<Path<CommentId>, PathRejection>,
    Query(query): Query<PlainQuery>,
) -> ApiResult<Json<CommentView>> {
    let Path(id) = id?;
    let plain = FetchParams {
        plain: query.plain,
        ..FetchParams::default()
    }
    .validate()?
    .plain;
    Ok(Json(state.service.view_comment(id, plain).await?))
}

/// `POST /count` with a JSON array of uris.
pub async fn count(
    State(state): State<AppState>,
    body: Result<Json<Vec<String>>, JsonRejection>,
) -> ApiResult<Json<Vec<i64>>> {
    let Json(uris) = body?;
    Ok(Json(state.service.count_comments(&uris).await?))
}

pub async fn preview(
    State(state): State<AppState>,
    body: Result<Json<PreviewRequest>, JsonRejection>,
) -> ApiResult<Json<PreviewResponse>> {
    let Json(request) = body?;
    Ok(Json(PreviewResponse {
        text: state.service.preview(&request.text),
    }))
}

pub async fn ping() -> &'static str {
    "pong"
}
