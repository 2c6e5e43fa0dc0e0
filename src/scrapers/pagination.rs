//! Incremental loading of lazily-rendered activity feeds.
//!
//! Each iteration triggers the feed's load-more affordance, waits a settle
//! interval, then observes the rendered item count and the last rendered
//! item. [`StopController`] decides whether to keep going.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::error::PageError;
use super::page::PageAccessor;
use crate::config::ScraperSettings;

/// Tunables for the stop conditions.
#[derive(Debug, Clone)]
pub struct StopPolicy {
    /// Halt once the last item is dated before this year.
    pub cutoff_year: i32,
    /// Halt after this many iterations without a count change.
    pub stable_iterations: u32,
    pub max_iterations: u32,
    pub settle: Duration,
    /// Test-mode cap on rendered items.
    pub item_limit: Option<usize>,
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self::from(&ScraperSettings::default())
    }
}

impl From<&ScraperSettings> for StopPolicy {
    fn from(settings: &ScraperSettings) -> Self {
        Self {
            cutoff_year: settings.cutoff_year,
            stable_iterations: settings.stable_iterations.max(1),
            max_iterations: settings.max_iterations.max(1),
            settle: Duration::from_millis(settings.settle_ms),
            item_limit: settings.item_limit(),
        }
    }
}

/// What the feed looked like after one load-more round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    /// Rendered item nodes.
    pub rendered: usize,
    /// The last rendered item is already in the store.
    pub last_known: bool,
    /// Year of the last rendered item, if its date parsed.
    pub last_year: Option<i32>,
    /// A load-more affordance was present this round.
    pub more_available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    ExistingEntry,
    AgeThreshold { year: i32 },
    Stable,
    /// No load-more affordance and nothing new rendered.
    Exhausted,
    ItemLimit,
    IterationCap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Halt(HaltReason),
}

/// Stop-condition state machine.
///
/// Triggers are checked in priority order: a known last item, then the age
/// cutoff, then count stability, then exhaustion, the test-mode cap and the
/// iteration cap.
#[derive(Debug, Clone)]
pub struct StopController {
    policy: StopPolicy,
    iteration: u32,
    previous: usize,
    unchanged: u32,
}

impl StopController {
    pub fn new(policy: StopPolicy) -> Self {
        Self {
            policy,
            iteration: 0,
            previous: 0,
            unchanged: 0,
        }
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn evaluate(&mut self, obs: &Observation) -> Decision {
        self.iteration += 1;
        let unchanged = obs.rendered == self.previous;
        if unchanged {
            self.unchanged += 1;
        } else {
            self.unchanged = 0;
        }
        self.previous = obs.rendered;

        if obs.last_known {
            return Decision::Halt(HaltReason::ExistingEntry);
        }
        if let Some(year) = obs.last_year {
            if year < self.policy.cutoff_year {
                return Decision::Halt(HaltReason::AgeThreshold { year });
            }
        }
        if self.unchanged >= self.policy.stable_iterations {
            return Decision::Halt(HaltReason::Stable);
        }
        if !obs.more_available && unchanged {
            return Decision::Halt(HaltReason::Exhausted);
        }
        if let Some(limit) = self.policy.item_limit {
            if obs.rendered >= limit {
                return Decision::Halt(HaltReason::ItemLimit);
            }
        }
        if self.iteration >= self.policy.max_iterations {
            return Decision::Halt(HaltReason::IterationCap);
        }
        Decision::Continue
    }
}

/// A platform feed the pagination loop can drive.
#[async_trait]
pub trait Feed: Send + Sync {
    /// Trigger the load-more affordance. Returns whether one was present.
    async fn load_more(&self, page: &dyn PageAccessor) -> Result<bool, PageError>;

    /// Inspect the rendered feed. `more_available` is filled in by the loop.
    async fn observe(&self, page: &dyn PageAccessor) -> Result<Observation, PageError>;
}

/// Summary of a finished pagination loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationSummary {
    pub iterations: u32,
    pub rendered: usize,
    pub reason: HaltReason,
}

/// Page through a feed until a stop condition fires.
///
/// Page errors inside the loop are logged and treated as a round where
/// nothing changed, so a broken affordance ends in the stability halt
/// rather than a spin.
pub async fn paginate(
    page: &dyn PageAccessor,
    feed: &dyn Feed,
    policy: &StopPolicy,
) -> PaginationSummary {
    let mut controller = StopController::new(policy.clone());
    let mut rendered = 0;

    loop {
        let more_available = match feed.load_more(page).await {
            Ok(present) => present,
            Err(e) => {
                warn!("Load more failed: {}", e);
                false
            }
        };

        if !policy.settle.is_zero() {
            tokio::time::sleep(policy.settle).await;
        }

        let obs = match feed.observe(page).await {
            Ok(obs) => Observation {
                more_available,
                ..obs
            },
            Err(e) => {
                warn!("Failed to observe feed: {}", e);
                Observation {
                    rendered,
                    more_available,
                    ..Default::default()
                }
            }
        };
        rendered = obs.rendered;

        let decision = controller.evaluate(&obs);
        debug!(
            "Iteration {}: {} items, more={}, known={}, year={:?}",
            controller.iteration(),
            obs.rendered,
            obs.more_available,
            obs.last_known,
            obs.last_year
        );

        if let Decision::Halt(reason) = decision {
            info!(
                "Pagination halted after {} iterations with {} items: {:?}",
                controller.iteration(),
                rendered,
                reason
            );
            return PaginationSummary {
                iterations: controller.iteration(),
                rendered,
                reason,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::testing::FakePage;

    fn policy() -> StopPolicy {
        StopPolicy {
            cutoff_year: 2025,
            stable_iterations: 3,
            max_iterations: 50,
            settle: Duration::ZERO,
            item_limit: None,
        }
    }

    fn obs(rendered: usize) -> Observation {
        Observation {
            rendered,
            last_known: false,
            last_year: Some(2025),
            more_available: true,
        }
    }

    #[test]
    fn test_existing_entry_outranks_age() {
        let mut c = StopController::new(policy());
        let decision = c.evaluate(&Observation {
            last_known: true,
            last_year: Some(2019),
            ..obs(10)
        });
        assert_eq!(decision, Decision::Halt(HaltReason::ExistingEntry));
    }

    #[test]
    fn test_age_threshold() {
        let mut c = StopController::new(policy());
        assert_eq!(c.evaluate(&obs(10)), Decision::Continue);
        let decision = c.evaluate(&Observation {
            last_year: Some(2024),
            ..obs(20)
        });
        assert_eq!(decision, Decision::Halt(HaltReason::AgeThreshold { year: 2024 }));
    }

    #[test]
    fn test_stable_after_three_unchanged_rounds() {
        let mut c = StopController::new(policy());
        assert_eq!(c.evaluate(&obs(10)), Decision::Continue);
        assert_eq!(c.evaluate(&obs(10)), Decision::Continue);
        assert_eq!(c.evaluate(&obs(10)), Decision::Continue);
        assert_eq!(c.evaluate(&obs(10)), Decision::Halt(HaltReason::Stable));
    }

    #[test]
    fn test_growth_resets_stability() {
        let mut c = StopController::new(policy());
        for n in [10, 10, 10, 20, 20, 20] {
            assert_eq!(c.evaluate(&obs(n)), Decision::Continue);
        }
        assert_eq!(c.evaluate(&obs(20)), Decision::Halt(HaltReason::Stable));
    }

    #[test]
    fn test_exhausted_without_affordance() {
        let mut c = StopController::new(policy());
        assert_eq!(c.evaluate(&obs(10)), Decision::Continue);
        let decision = c.evaluate(&Observation {
            more_available: false,
            ..obs(10)
        });
        assert_eq!(decision, Decision::Halt(HaltReason::Exhausted));
    }

    #[test]
    fn test_iteration_cap_and_item_limit() {
        let mut c = StopController::new(StopPolicy {
            max_iterations: 3,
            ..policy()
        });
        assert_eq!(c.evaluate(&obs(1)), Decision::Continue);
        assert_eq!(c.evaluate(&obs(2)), Decision::Continue);
        assert_eq!(c.evaluate(&obs(3)), Decision::Halt(HaltReason::IterationCap));

        let mut c = StopController::new(StopPolicy {
            item_limit: Some(25),
            ..policy()
        });
        assert_eq!(c.evaluate(&obs(20)), Decision::Continue);
        assert_eq!(c.evaluate(&obs(40)), Decision::Halt(HaltReason::ItemLimit));
    }

    /// Feed where round `i` renders `i * 10` items and every item from
    /// index `known_from` on is already stored.
    struct SimulatedFeed {
        known_from: usize,
    }

    #[async_trait]
    impl Feed for SimulatedFeed {
        async fn load_more(&self, page: &dyn PageAccessor) -> Result<bool, PageError> {
            page.scroll_to_bottom().await?;
            Ok(true)
        }

        async fn observe(&self, page: &dyn PageAccessor) -> Result<Observation, PageError> {
            let rendered = page.count("li").await?;
            Ok(Observation {
                rendered,
                last_known: rendered > self.known_from,
                last_year: Some(2025),
                more_available: true,
            })
        }
    }

    fn growing_feed(rounds: usize) -> FakePage {
        // Snapshot 0 is what the page shows before the first load-more.
        let snapshots = (0..=rounds)
            .map(|i| format!("<ul>{}</ul>", "<li>x</li>".repeat(i * 10)))
            .collect();
        FakePage::new(snapshots)
    }

    #[tokio::test]
    async fn test_halts_at_first_round_reaching_known_items() {
        let page = growing_feed(20);
        // Items 0..=49 are new, 50 onward already stored: round 5 renders 50,
        // round 6 renders 60 and its last item is known.
        let summary = paginate(&page, &SimulatedFeed { known_from: 50 }, &policy()).await;
        assert_eq!(summary.reason, HaltReason::ExistingEntry);
        assert_eq!(summary.iterations, 6);
        assert_eq!(summary.rendered, 60);
    }

    #[tokio::test]
    async fn test_feed_that_stops_growing_halts_on_stability() {
        let page = growing_feed(2);
        let summary = paginate(&page, &SimulatedFeed { known_from: usize::MAX }, &policy()).await;
        assert_eq!(summary.reason, HaltReason::Stable);
        assert_eq!(summary.rendered, 20);
        assert_eq!(summary.iterations, 5);
    }
}
