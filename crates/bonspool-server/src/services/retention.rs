// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Periodic retention sweep of finished jobs.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use bonspool_print::Dispatcher;

/// Run `cleanup(age_days)` every `every`, starting immediately. The task
/// runs until aborted.
pub fn spawn_sweep(dispatcher: Dispatcher, age_days: u32, every: Duration) -> JoinHandle<()> {
    info!(age_days, every_secs = every.as_secs(), "retention sweep scheduled");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match dispatcher.cleanup(age_days) {
                Ok(0) => debug!("retention sweep found nothing"),
                Ok(swept) => info!(swept, age_days, "retention sweep finished"),
                Err(e) => warn!(error = %e, "retention sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SpoolServices;
    use bonspool_core::SpoolConfig;
    use bonspool_core::types::{JobStatus, NewJob};

    #[tokio::test]
    async fn sweep_removes_finished_jobs() {
        let services = SpoolServices::in_memory(SpoolConfig::default()).unwrap();
        let d = services.dispatcher().clone();
        let rejected = d.submit(NewJob::new(b"void".to_vec())).unwrap();
        d.reject(&rejected.id, "duplicate", "manager").unwrap();
        let pending = d.submit(NewJob::new(b"keep".to_vec())).unwrap();

        let sweep = spawn_sweep(d.clone(), 0, Duration::from_millis(20));
        let mut swept = false;
        for _ in 0..100 {
            if d.jobs().get(&rejected.id).unwrap().is_none() {
                swept = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        sweep.abort();

        assert!(swept);
        assert_eq!(
            d.jobs().require(&pending.id).unwrap().status,
            JobStatus::Pending
        );
    }

    #[test]
    fn no_retention_means_no_sweep() {
        let config = SpoolConfig {
            retention_days: None,
            ..SpoolConfig::default()
        };
        let services = SpoolServices::in_memory(config).unwrap();
        assert!(services.spawn_retention_sweep().is_none());
    }
}
