// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Two spool instances on ephemeral ports: a front desk forwarding to a head
// office that owns the physical printer.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

use bonspool_core::SpoolConfig;
use bonspool_server::{SpoolServices, router};

const RECEIPT: &[u8] = b"\x1b@TABLE 7\n1x SOUP 4.50\n\x1dV\x00";

async fn spawn_spool(service_id: &str, max_chain_depth: u32) -> String {
    let config = SpoolConfig {
        service_id: service_id.into(),
        max_chain_depth,
        retry_base_delay_ms: 5,
        retry_max_delay_ms: 10,
        ..SpoolConfig::default()
    };
    let services = SpoolServices::in_memory(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(services)).await.unwrap();
    });
    format!("http://{addr}")
}

/// A receipt printer that accepts one job and returns its bytes.
async fn spawn_printer() -> (u16, tokio::task::JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        socket.read_to_end(&mut received).await.unwrap();
        received
    });
    (port, handle)
}

async fn post(client: &reqwest::Client, url: String, body: Value) -> (u16, Value) {
    let response = client.post(url).json(&body).send().await.unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

async fn get(client: &reqwest::Client, url: String) -> Value {
    client.get(url).send().await.unwrap().json().await.unwrap()
}

#[tokio::test]
async fn job_travels_to_upstream_printer() {
    let client = reqwest::Client::new();
    let head_office = spawn_spool("head-office", 8).await;
    let front_desk = spawn_spool("front-desk", 8).await;
    let (printer_port, printer) = spawn_printer().await;

    let (status, hq_printer) = post(
        &client,
        format!("{head_office}/api/printers"),
        json!({
            "name": "kitchen",
            "connection": { "type": "physical", "host": "127.0.0.1", "port": printer_port }
        }),
    )
    .await;
    assert_eq!(status, 201);
    let hq_printer_id = hq_printer["id"].as_str().unwrap().to_string();

    let (status, relay) = post(
        &client,
        format!("{front_desk}/api/printers"),
        json!({
            "name": "head office",
            "connection": { "type": "spool", "url": head_office, "printer_id": hq_printer_id }
        }),
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(relay["printer_type"], "spool");

    let (status, test) = post(
        &client,
        format!("{front_desk}/api/printers/{}/test", relay["id"].as_str().unwrap()),
        json!({}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(test["reachable"], true);

    // Front desk: submit, approve, dispatch.
    let (status, job) = post(
        &client,
        format!("{front_desk}/api/jobs"),
        json!({
            "payload": STANDARD.encode(RECEIPT),
            "printer_id": relay["id"],
            "user": "till-3",
            "trace_id": "order-7"
        }),
    )
    .await;
    assert_eq!(status, 201);
    let job_id = job["id"].as_str().unwrap().to_string();
    let approve = format!("{front_desk}/api/jobs/{job_id}/approve");
    post(&client, approve, json!({ "user": "host" })).await;
    let (status, printed) =
        post(&client, format!("{front_desk}/api/jobs/{job_id}/print"), json!({})).await;
    assert_eq!(status, 200, "{printed}");
    assert_eq!(printed["status"], "completed");
    assert!(printed["notes"].as_str().unwrap().contains("chain depth 1"));

    // Head office: the job arrives pending with the chain metadata.
    let page = get(&client, format!("{head_office}/api/jobs?status=pending")).await;
    assert_eq!(page["total"], 1);
    let upstream = &page["jobs"][0];
    assert_eq!(upstream["chain_depth"], 1);
    assert_eq!(upstream["trace_id"], "order-7");
    assert_eq!(upstream["origin_service"], "front-desk");
    assert_eq!(upstream["printer_id"], hq_printer_id.as_str());
    assert_eq!(upstream["user"], "till-3");
    let upstream_id = upstream["id"].as_str().unwrap().to_string();
    assert!(printed["notes"].as_str().unwrap().contains(&upstream_id));

    post(&client, format!("{head_office}/api/jobs/{upstream_id}/approve"), json!({})).await;
    let (status, done) =
        post(&client, format!("{head_office}/api/jobs/{upstream_id}/print"), json!({})).await;
    assert_eq!(status, 200, "{done}");
    assert_eq!(done["status"], "completed");
    assert_eq!(printer.await.unwrap(), RECEIPT);
}

#[tokio::test]
async fn chain_depth_limit_stops_forwarding() {
    let client = reqwest::Client::new();
    let upstream = spawn_spool("upstream", 8).await;
    let front = spawn_spool("front", 2).await;

    let (_, relay) = post(
        &client,
        format!("{front}/api/printers"),
        json!({ "name": "relay", "connection": { "type": "spool", "url": upstream } }),
    )
    .await;
    let (_, job) = post(
        &client,
        format!("{front}/api/jobs"),
        json!({
            "payload": STANDARD.encode(RECEIPT),
            "printer_id": relay["id"],
            "chain_depth": 2
        }),
    )
    .await;
    let job_id = job["id"].as_str().unwrap().to_string();
    post(&client, format!("{front}/api/jobs/{job_id}/approve"), json!({})).await;

    let (status, body) = post(&client, format!("{front}/api/jobs/{job_id}/print"), json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "CHAIN_DEPTH_EXCEEDED");

    let job = get(&client, format!("{front}/api/jobs/{job_id}")).await;
    assert_eq!(job["status"], "approved");
    let page = get(&client, format!("{upstream}/api/jobs")).await;
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn unreachable_upstream_marks_job_failed() {
    let client = reqwest::Client::new();
    let front = spawn_spool("front", 8).await;
    let dead = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };

    let (_, relay) = post(
        &client,
        format!("{front}/api/printers"),
        json!({ "name": "gone", "connection": { "type": "spool", "url": dead } }),
    )
    .await;
    let (_, job) = post(
        &client,
        format!("{front}/api/jobs"),
        json!({ "payload": STANDARD.encode(RECEIPT), "printer_id": relay["id"] }),
    )
    .await;
    let job_id = job["id"].as_str().unwrap().to_string();
    post(&client, format!("{front}/api/jobs/{job_id}/approve"), json!({})).await;

    let (status, body) = post(&client, format!("{front}/api/jobs/{job_id}/print"), json!({})).await;
    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "FORWARD_ERROR");

    let job = get(&client, format!("{front}/api/jobs/{job_id}")).await;
    assert_eq!(job["status"], "failed");
    let history = get(&client, format!("{front}/api/jobs/{job_id}/history")).await;
    assert_eq!(history.as_array().unwrap().len(), 3);
}
