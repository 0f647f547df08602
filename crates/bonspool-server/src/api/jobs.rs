// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job endpoints.

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use bonspool_core::error::SpoolError;
use bonspool_core::types::{
    ANONYMOUS_USER, HistoryEntry, Job, JobId, JobPage, JobQuery, JobStatus, NewJob,
    DEFAULT_PAGE_SIZE,
};

use super::error::{ApiError, ApiResult};
use crate::SpoolServices;

#[derive(Debug, Default, Deserialize)]
pub struct ListJobsParams {
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveRequest {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub auto_dispatch: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CleanupParams {
    pub days: Option<u32>,
}

/// Decode an optional JSON body; an empty body yields the default.
pub(crate) fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
}

fn job_id(raw: &str) -> ApiResult<JobId> {
    Ok(raw.parse()?)
}

pub async fn list_jobs(
    State(services): State<SpoolServices>,
    params: Result<Query<ListJobsParams>, QueryRejection>,
) -> ApiResult<Json<JobPage>> {
    let Query(params) = params?;
    let status = params
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<JobStatus>)
        .transpose()?;
    let query = JobQuery {
        status,
        limit: params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        offset: params.offset.unwrap_or(0),
    };
    Ok(Json(services.dispatcher().jobs().list(query)?))
}

pub async fn create_job(
    State(services): State<SpoolServices>,
    body: Result<Json<NewJob>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    let Json(request) = body?;
    let job = services.dispatcher().submit(request)?;
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn get_job(
    State(services): State<SpoolServices>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    let id = job_id(&id)?;
    Ok(Json(services.dispatcher().jobs().require(&id)?))
}

pub async fn delete_job(
    State(services): State<SpoolServices>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    let id = job_id(&id)?;
    Ok(Json(services.dispatcher().delete(&id)?))
}

pub async fn job_history(
    State(services): State<SpoolServices>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    let id = job_id(&id)?;
    Ok(Json(services.dispatcher().jobs().history(&id)?))
}

pub async fn approve_job(
    State(services): State<SpoolServices>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Job>> {
    let id = job_id(&id)?;
    let request: ApproveRequest = optional_json(&body)?;
    let user = request.user.as_deref().unwrap_or(ANONYMOUS_USER);
    Ok(Json(services.dispatcher().approve(&id, user, request.auto_dispatch)?))
}

pub async fn reject_job(
    State(services): State<SpoolServices>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Job>> {
    let id = job_id(&id)?;
    let request: RejectRequest = optional_json(&body)?;
    let reason = request
        .reason
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| SpoolError::Validation("a rejection reason is required".into()))?;
    let user = request.user.as_deref().unwrap_or(ANONYMOUS_USER);
    Ok(Json(services.dispatcher().reject(&id, &reason, user)?))
}

/// Dispatch synchronously and answer with the settled job.
pub async fn print_job(
    State(services): State<SpoolServices>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    let id = job_id(&id)?;
    Ok(Json(services.dispatcher().print_job(&id).await?))
}

pub async fn cleanup_jobs(
    State(services): State<SpoolServices>,
    params: Result<Query<CleanupParams>, QueryRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let Query(params) = params?;
    let days = params
        .days
        .or(services.config().retention_days)
        .ok_or_else(|| {
            SpoolError::Validation("days is required when no retention is configured".into())
        })?;
    let swept = services.dispatcher().cleanup(days)?;
    Ok(Json(json!({ "count": swept, "age_days": days })))
}
