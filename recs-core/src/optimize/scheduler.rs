//! Daily scheduling for the optimization cycle.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Local, NaiveTime};
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::OptimizationCycle;

/// Runs the cycle once a day at the configured local wall-clock time.
pub struct CycleScheduler {
    cycle: Arc<OptimizationCycle>,
    hour: u32,
    minute: u32,
}

impl CycleScheduler {
    pub fn new(cycle: Arc<OptimizationCycle>, hour: u32, minute: u32) -> Self {
        Self { cycle, hour, minute }
    }

    /// Seconds until the next scheduled run.
    #[must_use]
    pub fn seconds_until_next_run(&self) -> u64 {
        let now = Local::now();
        let target_time = NaiveTime::from_hms_opt(self.hour, self.minute, 0)
            .unwrap_or_else(|| NaiveTime::from_hms_opt(3, 0, 0).expect("static time"));
        let mut next = now.date_naive().and_time(target_time);
        if next <= now.naive_local() {
            next += ChronoDuration::days(1);
        }
        (next - now.naive_local()).num_seconds().max(0) as u64
    }

    /// Spawn the background loop. The task runs until aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let wait = self.seconds_until_next_run();
                info!(seconds = wait, "next optimization cycle scheduled");
                tokio::time::sleep(std::time::Duration::from_secs(wait)).await;
                match self.cycle.run().await {
                    Ok(Some(metrics)) => {
                        info!(quality = metrics.quality_score, "scheduled cycle finished");
                    }
                    Ok(None) => {}
                    Err(e) => {
                        // Re-schedules implicitly at the next window;
                        // committed earlier steps remain.
                        error!(error = %e, "optimization cycle failed");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_run_is_within_a_day() {
        let storage = Arc::new(crate::storage::MemoryStorage::new());
        let embeddings = Arc::new(crate::embedding::EmbeddingService::mock(16));
        let registry = Arc::new(crate::patterns::PatternRegistry::new(
            storage.clone() as Arc<dyn crate::storage::StorageBackend>,
            embeddings,
        ));
        let learning = Arc::new(crate::learning::LearningEngine::new(
            storage.clone() as Arc<dyn crate::storage::StorageBackend>,
            registry.clone(),
            crate::config::EngineConfig::default(),
        ));
        let cycle = Arc::new(OptimizationCycle::new(
            storage as Arc<dyn crate::storage::StorageBackend>,
            registry,
            learning,
            crate::config::EngineConfig::default(),
        ));
        let scheduler = CycleScheduler::new(cycle, 3, 0);
        let wait = scheduler.seconds_until_next_run();
        assert!(wait <= 86_400);
    }
}
