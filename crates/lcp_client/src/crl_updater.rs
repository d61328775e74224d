//! Background CRL synchronization.
//!
//! Verified certificates advertise where their revocation lists live; the
//! updater keeps the in-memory [`RevocationList`] synchronized with the
//! union of those distribution points. A fetched CRL only replaces a URL's
//! slice when its `thisUpdate` is newer than what was merged before, and a
//! single URL's failure never poisons the others.
//!
//! The refresh cadence follows the `nextUpdate` hints of the fetched lists,
//! clamped to the configured window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use lcp_core::crl::CrlDocument;
use lcp_core::revocation::RevocationList;

use crate::net::{NetError, NetProvider};

/// Configuration for CRL polling.
#[derive(Debug, Clone)]
pub struct CrlConfig {
    /// Lower bound on the refresh period (default: 1 hour).
    pub min_refresh: Duration,
    /// Upper bound on the refresh period (default: 24 hours).
    pub max_refresh: Duration,
    /// When set, a refresh pass in which no distribution point could be
    /// fetched is an error instead of a logged warning. Off by default:
    /// an unreachable CRL does not block opening a publication whose
    /// certificate is absent from previously merged lists.
    pub require_crl: bool,
}

impl Default for CrlConfig {
    fn default() -> Self {
        Self {
            min_refresh: Duration::from_secs(60 * 60),
            max_refresh: Duration::from_secs(24 * 60 * 60),
            require_crl: false,
        }
    }
}

/// Errors from a CRL refresh pass.
#[derive(Debug, Error)]
pub enum CrlUpdateError {
    /// Fetching a distribution point failed.
    #[error("CRL fetch failed: {0}")]
    Net(#[from] NetError),

    /// A fetched payload was not a parsable CRL.
    #[error("CRL from {url} did not parse: {detail}")]
    Parse {
        /// Distribution point the payload came from.
        url: String,
        /// Parser diagnostic.
        detail: String,
    },

    /// `require_crl` is set and no distribution point yielded a list.
    #[error("no distribution point could be fetched: {0}")]
    NoFreshCrl(String),
}

/// Keeps the revocation list synchronized with known distribution points.
pub struct CrlUpdater {
    net: Arc<dyn NetProvider>,
    revocation: Arc<RevocationList>,
    config: CrlConfig,
    urls: Mutex<Vec<String>>,
    cancelled: AtomicBool,
    next_refresh: Mutex<Duration>,
}

impl CrlUpdater {
    /// Create an updater over the given transport and revocation state.
    pub fn new(
        net: Arc<dyn NetProvider>,
        revocation: Arc<RevocationList>,
        config: CrlConfig,
    ) -> Self {
        let next_refresh = Mutex::new(config.min_refresh);
        Self {
            net,
            revocation,
            config,
            urls: Mutex::new(Vec::new()),
            cancelled: AtomicBool::new(false),
            next_refresh,
        }
    }

    /// Merge distribution point URLs into the known set, deduplicating.
    pub fn update_distribution_points(&self, urls: &[String]) {
        let mut known = self.urls.lock().unwrap();
        for url in urls {
            if !known.iter().any(|existing| existing == url) {
                debug!(url, "new CRL distribution point");
                known.push(url.clone());
            }
        }
    }

    /// Whether any distribution point has been discovered yet.
    pub fn has_any_url(&self) -> bool {
        !self.urls.lock().unwrap().is_empty()
    }

    /// Fetch every known distribution point and merge newer lists.
    ///
    /// Runs on the timer thread in the background and once synchronously
    /// when the first distribution points are discovered. Per-URL failures
    /// are logged and skipped; the pass only fails under
    /// [`CrlConfig::require_crl`] when not a single URL could be fetched.
    pub fn update(&self) -> Result<(), CrlUpdateError> {
        let urls = self.urls.lock().unwrap().clone();
        if urls.is_empty() {
            return Ok(());
        }

        let mut fetched = 0usize;
        let mut last_error: Option<CrlUpdateError> = None;
        let mut earliest_next_update: Option<DateTime<Utc>> = None;

        for url in &urls {
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }
            match self.fetch_one(url) {
                Ok(next_update) => {
                    fetched += 1;
                    earliest_next_update = match (earliest_next_update, next_update) {
                        (Some(a), Some(b)) => Some(a.min(b)),
                        (a, b) => a.or(b),
                    };
                }
                Err(e) => {
                    warn!(url, error = %e, "CRL refresh failed for distribution point");
                    last_error = Some(e);
                }
            }
        }

        *self.next_refresh.lock().unwrap() = self.clamp_refresh(earliest_next_update);

        if fetched == 0 && self.config.require_crl {
            let detail = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "cancelled".to_string());
            return Err(CrlUpdateError::NoFreshCrl(detail));
        }
        Ok(())
    }

    /// The wait before the next refresh pass, derived from the most recent
    /// `nextUpdate` hints and clamped to the configured window.
    pub fn next_refresh_interval(&self) -> Duration {
        *self.next_refresh.lock().unwrap()
    }

    /// Stop further work. In-flight transfers are bounded by the transport
    /// timeout.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.net.cancel();
    }

    fn fetch_one(&self, url: &str) -> Result<Option<DateTime<Utc>>, CrlUpdateError> {
        let bytes = self.net.fetch(url)?;
        let crl = CrlDocument::parse(&bytes).map_err(|e| CrlUpdateError::Parse {
            url: url.to_string(),
            detail: e.to_string(),
        })?;

        let this_update = crl.this_update();
        let next_update = crl.next_update();

        let newer = match self.revocation.this_update_for(url) {
            Some(previous) => this_update > previous,
            None => true,
        };
        if newer {
            let serials = crl.into_revoked_serials();
            debug!(url, revoked = serials.len(), "merged CRL");
            self.revocation.replace_from_url(url, serials, this_update);
        }

        Ok(next_update)
    }

    fn clamp_refresh(&self, next_update: Option<DateTime<Utc>>) -> Duration {
        let Some(next_update) = next_update else {
            return self.config.min_refresh;
        };
        let until = (next_update - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        until.clamp(self.config.min_refresh, self.config.max_refresh)
    }
}
