//! Data models for streamtally.

mod activity;
mod platform;
mod run_outcome;

pub use activity::{ActivityRecord, StoredActivity};
pub use platform::{PlatformIdentity, PlatformLookup, PlatformStats};
pub use run_outcome::{RunOutcome, RunStatus};
