// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer endpoints.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use bonspool_core::types::{
    ConnectionTest, NewPrinter, Printer, PrinterFilter, PrinterId, PrinterStatus, PrinterType,
    PrinterUpdate,
};

use super::error::ApiResult;
use crate::SpoolServices;

#[derive(Debug, Default, Deserialize)]
pub struct ListPrintersParams {
    #[serde(default)]
    pub enabled_only: bool,
    #[serde(rename = "type")]
    pub printer_type: Option<String>,
}

fn printer_id(raw: &str) -> ApiResult<PrinterId> {
    Ok(raw.parse()?)
}

pub async fn list_printers(
    State(services): State<SpoolServices>,
    params: Result<Query<ListPrintersParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Printer>>> {
    let Query(params) = params?;
    let printer_type = params
        .printer_type
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(str::parse::<PrinterType>)
        .transpose()?;
    let filter = PrinterFilter {
        enabled_only: params.enabled_only,
        printer_type,
    };
    Ok(Json(services.dispatcher().printers().list(filter)?))
}

pub async fn register_printer(
    State(services): State<SpoolServices>,
    body: Result<Json<NewPrinter>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Printer>)> {
    let Json(request) = body?;
    let printer = services.dispatcher().register_printer(request)?;
    Ok((StatusCode::CREATED, Json(printer)))
}

pub async fn get_printer(
    State(services): State<SpoolServices>,
    Path(id): Path<String>,
) -> ApiResult<Json<Printer>> {
    let id = printer_id(&id)?;
    Ok(Json(services.dispatcher().printers().require(&id)?))
}

pub async fn update_printer(
    State(services): State<SpoolServices>,
    Path(id): Path<String>,
    body: Result<Json<PrinterUpdate>, JsonRejection>,
) -> ApiResult<Json<Printer>> {
    let id = printer_id(&id)?;
    let Json(update) = body?;
    Ok(Json(services.dispatcher().update_printer(&id, update)?))
}

pub async fn delete_printer(
    State(services): State<SpoolServices>,
    Path(id): Path<String>,
) -> ApiResult<Json<Printer>> {
    let id = printer_id(&id)?;
    Ok(Json(services.dispatcher().delete_printer(&id)?))
}

pub async fn test_printer(
    State(services): State<SpoolServices>,
    Path(id): Path<String>,
) -> ApiResult<Json<ConnectionTest>> {
    let id = printer_id(&id)?;
    Ok(Json(services.dispatcher().test_connection(&id).await?))
}

pub async fn printer_status(
    State(services): State<SpoolServices>,
    Path(id): Path<String>,
) -> ApiResult<Json<PrinterStatus>> {
    let id = printer_id(&id)?;
    Ok(Json(services.dispatcher().probe_printer(&id).await?))
}
