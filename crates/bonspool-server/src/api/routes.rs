// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Route table.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::{events, jobs, printers};
use crate::SpoolServices;

pub fn router(services: SpoolServices) -> Router {
    Router::new()
        .route("/api/health", get(health))
        // Jobs
        .route("/api/jobs", get(jobs::list_jobs).post(jobs::create_job))
        .route("/api/jobs/cleanup", post(jobs::cleanup_jobs))
        .route("/api/jobs/{id}", get(jobs::get_job).delete(jobs::delete_job))
        .route("/api/jobs/{id}/history", get(jobs::job_history))
        .route("/api/jobs/{id}/approve", post(jobs::approve_job))
        .route("/api/jobs/{id}/reject", post(jobs::reject_job))
        .route("/api/jobs/{id}/print", post(jobs::print_job))
        // Printers
        .route(
            "/api/printers",
            get(printers::list_printers).post(printers::register_printer),
        )
        .route(
            "/api/printers/{id}",
            get(printers::get_printer)
                .patch(printers::update_printer)
                .delete(printers::delete_printer),
        )
        .route("/api/printers/{id}/test", post(printers::test_printer))
        .route("/api/printers/{id}/status", get(printers::printer_status))
        // Events
        .route("/api/events", get(events::event_feed))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(services)
}

async fn health(State(services): State<SpoolServices>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service_id": services.config().service_id,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use serde_json::Value;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    use super::*;
    use bonspool_core::SpoolConfig;

    fn services() -> SpoolServices {
        let config = SpoolConfig {
            service_id: "front-desk".into(),
            retry_base_delay_ms: 5,
            retry_max_delay_ms: 10,
            ..SpoolConfig::default()
        };
        SpoolServices::in_memory(config).unwrap()
    }

    async fn call(
        services: &SpoolServices,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = router(services.clone())
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn register_physical(services: &SpoolServices, name: &str, port: u16) -> String {
        let (status, printer) = call(
            services,
            Method::POST,
            "/api/printers",
            Some(json!({
                "name": name,
                "connection": { "type": "physical", "host": "127.0.0.1", "port": port },
                "timeout_ms": 200
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        printer["id"].as_str().unwrap().to_string()
    }

    async fn submit(services: &SpoolServices, printer_id: Option<&str>) -> String {
        let (status, job) = call(
            services,
            Method::POST,
            "/api/jobs",
            Some(json!({ "payload": "G0BIRUxMTwo=", "printer_id": printer_id, "user": "till-1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(job["status"], "pending");
        job["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_service_id() {
        let (status, body) = call(&services(), Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service_id"], "front-desk");
    }

    #[tokio::test]
    async fn bad_payloads_are_400() {
        let s = services();
        let (status, body) =
            call(&s, Method::POST, "/api/jobs", Some(json!({ "payload": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, _) = call(
            &s,
            Method::POST,
            "/api/jobs",
            Some(json!({ "payload": "***not base64***" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&s, Method::GET, "/api/jobs/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_job_is_404() {
        let uri = format!("/api/jobs/{}", uuid_string());
        let (status, body) = call(&services(), Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "JOB_NOT_FOUND");
    }

    #[tokio::test]
    async fn approval_workflow_and_conflicts() {
        let s = services();
        let id = submit(&s, None).await;

        let (status, job) = call(
            &s,
            Method::POST,
            &format!("/api/jobs/{id}/approve"),
            Some(json!({ "user": "manager" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(job["status"], "approved");

        let (status, body) = call(
            &s,
            Method::POST,
            &format!("/api/jobs/{id}/reject"),
            Some(json!({ "reason": "too late", "user": "manager" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

        let (status, body) = call(&s, Method::DELETE, &format!("/api/jobs/{id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "JOB_NOT_DELETABLE");

        let (status, history) =
            call(&s, Method::GET, &format!("/api/jobs/{id}/history"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["actor"], "manager");
    }

    #[tokio::test]
    async fn reject_requires_reason() {
        let s = services();
        let id = submit(&s, None).await;
        let (status, _) =
            call(&s, Method::POST, &format!("/api/jobs/{id}/reject"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_pages_and_filters() {
        let s = services();
        for _ in 0..3 {
            submit(&s, None).await;
        }
        let approved = submit(&s, None).await;
        call(&s, Method::POST, &format!("/api/jobs/{approved}/approve"), None).await;

        let (status, page) = call(&s, Method::GET, "/api/jobs?limit=2&offset=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 4);
        assert_eq!(page["jobs"].as_array().unwrap().len(), 2);

        let (_, page) = call(&s, Method::GET, "/api/jobs?status=approved", None).await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["jobs"][0]["id"], approved.as_str());

        let (status, _) = call(&s, Method::GET, "/api/jobs?status=queued", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn duplicate_printer_name_is_409() {
        let s = services();
        register_physical(&s, "kitchen", 9100).await;
        let (status, body) = call(
            &s,
            Method::POST,
            "/api/printers",
            Some(json!({
                "name": "kitchen",
                "connection": { "type": "physical", "host": "10.0.0.9", "port": 9100 }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "DUPLICATE_PRINTER_NAME");
    }

    #[tokio::test]
    async fn printer_update_and_delete() {
        let s = services();
        let id = register_physical(&s, "bar", 9100).await;

        let (status, printer) = call(
            &s,
            Method::PATCH,
            &format!("/api/printers/{id}"),
            Some(json!({ "enabled": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(printer["enabled"], false);

        let (_, list) = call(&s, Method::GET, "/api/printers?enabled_only=true", None).await;
        assert!(list.as_array().unwrap().is_empty());

        let (status, _) = call(&s, Method::DELETE, &format!("/api/printers/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&s, Method::GET, &format!("/api/printers/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn disabled_printer_dispatch_is_409() {
        let s = services();
        let printer = register_physical(&s, "bar", 9100).await;
        call(
            &s,
            Method::PATCH,
            &format!("/api/printers/{printer}"),
            Some(json!({ "enabled": false })),
        )
        .await;
        let id = submit(&s, Some(&printer)).await;
        call(&s, Method::POST, &format!("/api/jobs/{id}/approve"), None).await;

        let (status, body) = call(&s, Method::POST, &format!("/api/jobs/{id}/print"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "PRINTER_DISABLED");
        let (_, job) = call(&s, Method::GET, &format!("/api/jobs/{id}"), None).await;
        assert_eq!(job["status"], "approved");
    }

    #[tokio::test]
    async fn unreachable_printer_is_502_and_job_fails() {
        let s = services();
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let printer = register_physical(&s, "patio", port).await;
        let id = submit(&s, Some(&printer)).await;
        call(&s, Method::POST, &format!("/api/jobs/{id}/approve"), None).await;

        let (status, body) = call(&s, Method::POST, &format!("/api/jobs/{id}/print"), None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "CONNECTION_ERROR");

        let (_, job) = call(&s, Method::GET, &format!("/api/jobs/{id}"), None).await;
        assert_eq!(job["status"], "failed");
        let (_, printer) = call(&s, Method::GET, &format!("/api/printers/{printer}"), None).await;
        assert!(printer["last_error"].is_string());
    }

    #[tokio::test]
    async fn print_delivers_payload() {
        let s = services();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let printer_side = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let printer = register_physical(&s, "kitchen", port).await;
        let id = submit(&s, Some(&printer)).await;
        call(&s, Method::POST, &format!("/api/jobs/{id}/approve"), None).await;

        let (status, job) = call(&s, Method::POST, &format!("/api/jobs/{id}/print"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(job["status"], "completed");
        assert_eq!(printer_side.await.unwrap(), b"\x1b@HELLO\n");

        let (status, test) =
            call(&s, Method::POST, &format!("/api/printers/{printer}/test"), None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY, "listener is gone: {test}");
    }

    #[tokio::test]
    async fn cleanup_endpoint_sweeps() {
        let s = services();
        let id = submit(&s, None).await;
        call(
            &s,
            Method::POST,
            &format!("/api/jobs/{id}/reject"),
            Some(json!({ "reason": "void" })),
        )
        .await;

        let (status, body) = call(&s, Method::POST, "/api/jobs/cleanup?days=0", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        let (status, _) = call(&s, Method::GET, &format!("/api/jobs/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    fn uuid_string() -> String {
        bonspool_core::types::JobId::new().to_string()
    }
}
