//! Harvest orchestration.
//!
//! The manager owns the driver registry. A run resolves the platform,
//! invokes its driver under a hard deadline, persists what came back and
//! appends a run outcome. Runs are sequential; failures are isolated per
//! platform.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::driver::{HarvestContext, HarvestDriver};
use super::error::{HarvestError, ItemError};
use crate::models::{PlatformLookup, RunOutcome};
use crate::repository::HistoryStore;

/// Result of one run, whether or not it succeeded.
struct RunReport {
    outcome: RunOutcome,
    error: Option<HarvestError>,
}

impl RunReport {
    fn into_result(self) -> Result<RunOutcome, HarvestError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.outcome),
        }
    }
}

/// Releases a platform's single-flight slot when dropped.
struct InFlightGuard {
    slots: Arc<Mutex<HashSet<String>>>,
    name: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.name);
    }
}

pub struct HarvestManager {
    drivers: Vec<Arc<dyn HarvestDriver>>,
    store: Arc<dyn HistoryStore>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    /// Deadline used by background triggers.
    deadline: Duration,
}

impl HarvestManager {
    pub fn new(store: Arc<dyn HistoryStore>, deadline: Duration) -> Self {
        Self {
            drivers: Vec::new(),
            store,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            deadline,
        }
    }

    /// Register a driver. A later registration for the same platform
    /// replaces the earlier one.
    pub fn register(&mut self, driver: Arc<dyn HarvestDriver>) {
        let name = driver.identify().to_string();
        self.drivers.retain(|d| d.identify() != name);
        self.drivers.push(driver);
    }

    /// Registered platform names, in registration order.
    pub fn platforms(&self) -> Vec<&str> {
        self.drivers.iter().map(|d| d.identify()).collect()
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    fn driver(&self, name: &str) -> Option<Arc<dyn HarvestDriver>> {
        self.drivers
            .iter()
            .find(|d| d.identify().eq_ignore_ascii_case(name))
            .cloned()
    }

    async fn resolve_platforms(&self) -> Result<PlatformLookup, HarvestError> {
        Ok(PlatformLookup::new(self.store.list_platforms().await?))
    }

    /// Run one platform's driver and persist its results.
    ///
    /// A failed run still appends a failed outcome before the error is
    /// returned.
    pub async fn run(&self, name: &str, deadline: Duration) -> Result<RunOutcome, HarvestError> {
        let driver = self
            .driver(name)
            .ok_or_else(|| HarvestError::NotRegistered(name.to_string()))?;
        let lookup = self.resolve_platforms().await?;
        self.run_driver(driver.as_ref(), &lookup, deadline)
            .await
            .into_result()
    }

    /// Run every registered driver in turn. Never fails; each platform's
    /// outcome is in the returned list.
    pub async fn run_all(&self, deadline: Duration) -> Vec<RunOutcome> {
        let lookup = match self.resolve_platforms().await {
            Ok(lookup) => lookup,
            Err(e) => {
                error!("Failed to resolve platforms: {}", e);
                PlatformLookup::default()
            }
        };

        let mut outcomes = Vec::with_capacity(self.drivers.len());
        for driver in &self.drivers {
            let report = self.run_driver(driver.as_ref(), &lookup, deadline).await;
            outcomes.push(report.outcome);
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!(
            "Harvest complete: {}/{} platforms succeeded",
            succeeded,
            outcomes.len()
        );
        outcomes
    }

    /// Start a run in the background and return its handle.
    ///
    /// At most one run per platform is in flight; a second trigger while
    /// one is running is rejected.
    pub fn trigger(
        self: &Arc<Self>,
        name: &str,
    ) -> Result<JoinHandle<Result<RunOutcome, HarvestError>>, HarvestError> {
        let driver = self
            .driver(name)
            .ok_or_else(|| HarvestError::NotRegistered(name.to_string()))?;
        let platform = driver.identify().to_string();

        {
            let mut slots = self
                .in_flight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if !slots.insert(platform.clone()) {
                return Err(HarvestError::AlreadyRunning(platform));
            }
        }
        let guard = InFlightGuard {
            slots: Arc::clone(&self.in_flight),
            name: platform.clone(),
        };

        let this = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let _guard = guard;
            this.run(&platform, this.deadline).await
        }))
    }

    async fn run_driver(
        &self,
        driver: &dyn HarvestDriver,
        lookup: &PlatformLookup,
        deadline: Duration,
    ) -> RunReport {
        let name = driver.identify();
        let started_at = Utc::now();

        let platform = match lookup.get(name) {
            Some(platform) => platform.clone(),
            None => match self.store.find_platform(name).await {
                Ok(Some(platform)) => platform,
                Ok(None) => {
                    let e = HarvestError::PlatformNotFound(name.to_string());
                    error!("{}", e);
                    return RunReport {
                        outcome: RunOutcome::failed(0, name, started_at, &e),
                        error: Some(e),
                    };
                }
                Err(e) => {
                    let e = HarvestError::from(e);
                    error!("Failed to resolve {}: {}", name, e);
                    return RunReport {
                        outcome: RunOutcome::failed(0, name, started_at, &e),
                        error: Some(e),
                    };
                }
            },
        };

        info!("Starting {} harvest (deadline {:?})", name, deadline);
        let ctx = HarvestContext {
            store: self.store.as_ref(),
            platforms: lookup,
            platform: &platform,
        };

        // Dropping the harvest future on expiry tears the browser session down.
        let harvested = match tokio::time::timeout(deadline, driver.harvest(&ctx)).await {
            Ok(result) => result,
            Err(_) => Err(HarvestError::Timeout(deadline)),
        };

        let (outcome, error) = match harvested {
            Ok(records) => {
                let total = records.len();
                let mut persisted = 0;
                for mut record in records {
                    if record.platform_id == 0 {
                        record.platform_id = platform.id;
                    }
                    match self.store.upsert_record(&record).await {
                        Ok(()) => persisted += 1,
                        Err(e) => warn!(
                            "{}",
                            ItemError::Persistence(format!("'{}': {}", record.title, e))
                        ),
                    }
                }
                info!("{}: persisted {}/{} records", name, persisted, total);
                (
                    RunOutcome::success(platform.id, &platform.name, started_at, persisted),
                    None,
                )
            }
            Err(e) => {
                error!("{} harvest failed ({}): {}", name, e.kind(), e);
                (
                    RunOutcome::failed(platform.id, &platform.name, started_at, &e),
                    Some(e),
                )
            }
        };

        if let Err(e) = self.store.append_run_outcome(&outcome).await {
            error!("Failed to record {} run outcome: {}", name, e);
        }

        RunReport { outcome, error }
    }
}
