//! Session bootstrap: inject pre-obtained authentication cookies.

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use super::error::HarvestError;
use super::page::{CookieSpec, PageAccessor};
use crate::config::CookieConfig;

/// When a scoped cookie is marked httpOnly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpOnly {
    Always,
    Never,
    /// httpOnly unless the cookie name contains this fragment.
    UnlessNameContains(&'static str),
}

impl HttpOnly {
    fn applies_to(&self, name: &str) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::UnlessNameContains(fragment) => !name.contains(fragment),
        }
    }
}

/// One domain the token set is replicated to.
#[derive(Debug, Clone, Copy)]
pub struct CookieScope {
    pub domain: &'static str,
    pub secure: bool,
    pub http_only: HttpOnly,
    /// Lifetime in days; `None` leaves the cookie session-scoped.
    pub expires_in_days: Option<i64>,
}

/// How a platform's session is established.
#[derive(Debug, Clone, Copy)]
pub struct SessionPlan {
    /// Page visited first so the browser accepts cookies for the domain.
    pub landing_url: &'static str,
    pub scopes: &'static [CookieScope],
}

/// Result of a bootstrap attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub accepted: usize,
    pub rejected: usize,
}

impl SessionPlan {
    /// Expand the token set across every scope.
    pub fn cookie_specs(&self, cookies: &[CookieConfig]) -> Vec<CookieSpec> {
        let now = Utc::now();
        self.scopes
            .iter()
            .flat_map(|scope| {
                cookies.iter().map(move |cookie| CookieSpec {
                    name: cookie.name.clone(),
                    value: cookie.value.clone(),
                    domain: scope.domain.to_string(),
                    path: "/".to_string(),
                    secure: scope.secure,
                    http_only: scope.http_only.applies_to(&cookie.name),
                    expires: scope.expires_in_days.map(|d| now + Duration::days(d)),
                })
            })
            .collect()
    }

    /// Visit the landing page and install every cookie in every scope.
    ///
    /// Individual rejections are logged and counted. If nothing was accepted
    /// the session is unusable and the run is aborted.
    pub async fn bootstrap(
        &self,
        page: &dyn PageAccessor,
        cookies: &[CookieConfig],
    ) -> Result<BootstrapReport, HarvestError> {
        if cookies.is_empty() {
            return Err(HarvestError::Configuration(
                "no authentication cookies configured".to_string(),
            ));
        }

        page.navigate(self.landing_url)
            .await
            .map_err(|e| HarvestError::Navigation(e.to_string()))?;

        let mut report = BootstrapReport::default();
        for spec in self.cookie_specs(cookies) {
            match page.set_cookie(&spec).await {
                Ok(()) => {
                    debug!("Set cookie {} on {}", spec.name, spec.domain);
                    report.accepted += 1;
                }
                Err(e) => {
                    warn!("Failed to set cookie {} on {}: {}", spec.name, spec.domain, e);
                    report.rejected += 1;
                }
            }
        }

        if report.accepted == 0 {
            return Err(HarvestError::Session(format!(
                "all {} cookies were rejected",
                report.rejected
            )));
        }

        info!(
            "Loaded {} cookies ({} rejected)",
            report.accepted, report.rejected
        );
        Ok(report)
    }
}
