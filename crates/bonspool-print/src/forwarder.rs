// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Chain forwarding: hand a job to an upstream spool as a fresh submission.
//
// The upstream sees an ordinary `pending` job carrying the same payload, the
// same trace id and a chain depth one higher than ours. There is no
// end-to-end acknowledgement: a successful hand-off is all this instance
// learns.

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use bonspool_core::SpoolConfig;
use bonspool_core::error::{Result, SpoolError};
use bonspool_core::types::{Job, JobId, NewJob, PrinterId};

use crate::retry::{RetryDecision, RetryPolicy};

/// What the upstream told us about the hand-off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardReceipt {
    pub target: String,
    pub chain_depth: u32,
    /// Id the upstream assigned, when its response carried one.
    pub upstream_job_id: Option<JobId>,
}

struct AttemptFailure {
    /// Nothing reached the upstream, so trying again cannot duplicate the
    /// job there.
    retryable: bool,
    message: String,
}

pub struct ChainForwarder {
    client: reqwest::Client,
    service_id: String,
    policy: RetryPolicy,
}

impl ChainForwarder {
    pub fn new(
        service_id: impl Into<String>,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| SpoolError::Forward(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            service_id: service_id.into(),
            policy,
        })
    }

    /// Forwarding retries connection failures up to twice.
    pub fn from_config(config: &SpoolConfig) -> Result<Self> {
        Self::new(
            config.service_id.clone(),
            config.forward_timeout(),
            RetryPolicy::from_config(config).with_retries(2),
        )
    }

    /// The submission the upstream will receive for `job`.
    pub fn forwarded_request(&self, job: &Job, upstream_printer: Option<PrinterId>) -> NewJob {
        NewJob {
            payload: job.payload.clone(),
            printer_id: upstream_printer,
            user: Some(job.user.clone()),
            notes: Some(format!("forwarded by {} from job {}", self.service_id, job.id)),
            trace_id: Some(job.trace_id.clone()),
            chain_depth: job.chain_depth.saturating_add(1),
            origin_service: job
                .origin_service
                .clone()
                .or_else(|| Some(self.service_id.clone())),
        }
    }

    /// Submit `job` to the spool at `base_url`.
    #[instrument(skip(self, job), fields(job_id = %job.id, trace_id = %job.trace_id))]
    pub async fn forward(
        &self,
        job: &Job,
        base_url: &str,
        upstream_printer: Option<&str>,
    ) -> Result<ForwardReceipt> {
        let upstream_printer = upstream_printer
            .map(|p| p.parse::<PrinterId>())
            .transpose()
            .map_err(|e| SpoolError::InvalidConfiguration(format!("upstream printer: {e}")))?;
        let request = self.forwarded_request(job, upstream_printer);
        let endpoint = endpoint(base_url, "api/jobs");

        let mut attempt = 0;
        loop {
            match self.post_once(&endpoint, &request).await {
                Ok(upstream_job_id) => {
                    info!(
                        upstream = %endpoint,
                        chain_depth = request.chain_depth,
                        upstream_job_id = ?upstream_job_id,
                        "job handed to upstream spool"
                    );
                    return Ok(ForwardReceipt {
                        target: base_url.to_string(),
                        chain_depth: request.chain_depth,
                        upstream_job_id,
                    });
                }
                Err(failure) => match self.policy.decide(failure.retryable, attempt) {
                    RetryDecision::RetryAfter(delay) => {
                        warn!(attempt, error = %failure.message, "forward failed, retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    RetryDecision::GiveUp | RetryDecision::Exhausted => {
                        return Err(SpoolError::Forward(failure.message));
                    }
                },
            }
        }
    }

    async fn post_once(
        &self,
        endpoint: &str,
        request: &NewJob,
    ) -> std::result::Result<Option<JobId>, AttemptFailure> {
        let response = self
            .client
            .post(endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| AttemptFailure {
                retryable: e.is_connect(),
                message: format!("cannot reach {endpoint}: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptFailure {
                retryable: false,
                message: format!(
                    "upstream refused the job: HTTP {status}: {}",
                    error_message(&body)
                ),
            });
        }

        let body: serde_json::Value = response.json().await.map_err(|e| AttemptFailure {
            retryable: false,
            message: format!("unreadable upstream response: {e}"),
        })?;
        let upstream_id = body
            .get("id")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<JobId>().ok());
        if upstream_id.is_none() {
            debug!("upstream response carried no job id");
        }
        Ok(upstream_id)
    }

    /// Check that an upstream spool answers its health endpoint within
    /// `timeout`.
    pub async fn check_health(&self, base_url: &str, timeout: Duration) -> Result<Duration> {
        let url = endpoint(base_url, "api/health");
        let started = Instant::now();
        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| SpoolError::Forward(format!("cannot reach {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(SpoolError::Forward(format!(
                "{url} answered HTTP {}",
                response.status()
            )));
        }
        Ok(started.elapsed())
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{path}", base_url.trim_end_matches('/'))
}

/// Pull the message out of a spool error body, or fall back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}
