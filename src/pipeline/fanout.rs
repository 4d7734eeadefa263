//! Property-level fan-out: every property must succeed, failures are retried in
//! later rounds, and a run that still has pending properties after the last
//! round fails as a whole.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::models::PropertyConfig;
use crate::pool::WorkerPool;
use crate::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("DATA INCOMPLETE: missing properties: {}", .missing.join(", "))]
    Incomplete { missing: Vec<String> },

    #[error("{property}: room inventory is empty")]
    NoRooms { property: String },
}

/// Every property's result, keyed by property key.
#[derive(Debug)]
pub struct RoundOutcome<R> {
    pub results: BTreeMap<u32, R>,
    pub rounds: u32,
}

pub struct RoundRunner {
    pool: WorkerPool,
    max_rounds: u32,
    round_delay: Duration,
    job_retry: RetryPolicy,
}

impl RoundRunner {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            pool: WorkerPool::new(config.property_concurrency),
            max_rounds: config.max_rounds.max(1),
            round_delay: config.round_delay(),
            job_retry: config.property_retry.clone(),
        }
    }

    /// Run `job` once per property until all succeed or the rounds run out.
    ///
    /// Within a round each job gets the property retry budget; a job that
    /// exhausts it stays pending for the next round. Nothing from a failed
    /// attempt is kept.
    pub async fn run<R, F, Fut>(
        &self,
        properties: &[PropertyConfig],
        job: F,
    ) -> Result<RoundOutcome<R>, PipelineError>
    where
        R: Send + 'static,
        F: Fn(PropertyConfig) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    {
        let job = Arc::new(job);
        let mut pending: Vec<PropertyConfig> = properties.to_vec();
        let mut done: BTreeMap<u32, R> = BTreeMap::new();
        let mut round = 0;

        while !pending.is_empty() && round < self.max_rounds {
            round += 1;
            info!(
                "Round {}/{}: {} properties pending ({} at a time)",
                round,
                self.max_rounds,
                pending.len(),
                self.pool.limit()
            );

            let job = Arc::clone(&job);
            let retry = self.job_retry.clone();
            let outcomes = self
                .pool
                .map(pending.clone(), move |property: PropertyConfig| {
                    let job = Arc::clone(&job);
                    let retry = retry.clone();
                    async move {
                        let label = property.name.clone();
                        retry.run(&label, || (*job)(property.clone())).await
                    }
                })
                .await;

            let mut still_pending = Vec::new();
            for (property, outcome) in pending.into_iter().zip(outcomes) {
                match outcome {
                    Ok(Ok(result)) => {
                        info!("✅ {}", property.name);
                        done.insert(property.key, result);
                    }
                    Ok(Err(e)) => {
                        warn!("❌ {}: {:#}", property.name, e);
                        still_pending.push(property);
                    }
                    Err(e) => {
                        error!("Task panic for {}: {}", property.name, e);
                        still_pending.push(property);
                    }
                }
            }
            pending = still_pending;

            if !pending.is_empty() && round < self.max_rounds && !self.round_delay.is_zero() {
                info!("Retrying {} properties in {:?}", pending.len(), self.round_delay);
                tokio::time::sleep(self.round_delay).await;
            }
        }

        if !pending.is_empty() {
            return Err(PipelineError::Incomplete {
                missing: pending.into_iter().map(|p| p.name).collect(),
            });
        }

        Ok(RoundOutcome { results: done, rounds: round })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn property(key: u32, name: &str) -> PropertyConfig {
        PropertyConfig {
            key,
            name: name.to_string(),
            qid: key as u64 * 100,
            uif: String::new(),
            uuid: String::new(),
        }
    }

    fn runner(max_rounds: u32) -> RoundRunner {
        RoundRunner::new(&PipelineConfig {
            property_concurrency: 2,
            max_rounds,
            round_delay_secs: 0,
            property_retry: RetryPolicy::none(),
            ..Default::default()
        })
    }

    type Calls = Arc<Mutex<HashMap<String, u32>>>;

    fn record(calls: &Calls, name: &str) -> u32 {
        let mut map = calls.lock().unwrap();
        let n = map.entry(name.to_string()).or_insert(0);
        *n += 1;
        *n
    }

    #[tokio::test]
    async fn test_failed_property_is_retried_next_round() {
        let props = vec![property(1, "A"), property(2, "B"), property(3, "C")];
        let calls: Calls = Arc::default();

        let c = Arc::clone(&calls);
        let outcome = runner(5)
            .run(&props, move |p: PropertyConfig| {
                let calls = Arc::clone(&c);
                async move {
                    let n = record(&calls, &p.name);
                    if p.name == "B" && n == 1 {
                        anyhow::bail!("flaky backend");
                    }
                    Ok(p.name.to_lowercase())
                }
            })
            .await
            .unwrap();

        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.results[&2], "b");
        assert_eq!(outcome.rounds, 2);

        let calls = calls.lock().unwrap();
        assert_eq!(calls["A"], 1);
        assert_eq!(calls["B"], 2);
        assert_eq!(calls["C"], 1);
    }

    #[tokio::test]
    async fn test_exhausted_rounds_name_missing_properties() {
        let props = vec![property(1, "HYD1"), property(2, "HYD2")];
        let calls: Calls = Arc::default();

        let c = Arc::clone(&calls);
        let err = runner(3)
            .run(&props, move |p: PropertyConfig| {
                let calls = Arc::clone(&c);
                async move {
                    record(&calls, &p.name);
                    if p.name == "HYD2" {
                        anyhow::bail!("down");
                    }
                    Ok(())
                }
            })
            .await
            .unwrap_err();

        match &err {
            PipelineError::Incomplete { missing } => assert_eq!(missing, &["HYD2"]),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().starts_with("DATA INCOMPLETE"));
        assert_eq!(calls.lock().unwrap()["HYD2"], 3);
        assert_eq!(calls.lock().unwrap()["HYD1"], 1);
    }

    #[tokio::test]
    async fn test_job_retry_within_round() {
        let props = vec![property(1, "A")];
        let calls: Calls = Arc::default();
        let runner = RoundRunner::new(&PipelineConfig {
            max_rounds: 1,
            round_delay_secs: 0,
            property_retry: RetryPolicy::linear(3, 0, 0),
            ..Default::default()
        });

        let c = Arc::clone(&calls);
        let outcome = runner
            .run(&props, move |p: PropertyConfig| {
                let calls = Arc::clone(&c);
                async move {
                    if record(&calls, &p.name) < 3 {
                        anyhow::bail!("timeout");
                    }
                    Ok(7)
                }
            })
            .await
            .unwrap();

        assert_eq!(outcome.results[&1], 7);
        assert_eq!(outcome.rounds, 1);
    }
}
