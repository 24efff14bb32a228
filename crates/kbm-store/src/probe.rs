//! Concurrency probes for the in-memory store.
//!
//! The probe counts how many page reads are in flight per site and how many
//! saves are in flight overall, and remembers the maxima. Tests use it to
//! assert that per-site checks and writes were serialized.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use kbm_types::SiteId;

#[derive(Debug, Default)]
struct SiteCounters {
    in_flight: usize,
    max: usize,
    total: usize,
}

/// Records concurrent access to sites and to the write path.
#[derive(Debug, Default)]
pub struct AccessProbe {
    sites: Mutex<HashMap<SiteId, SiteCounters>>,
    saves_in_flight: AtomicUsize,
    saves_max: AtomicUsize,
}

impl AccessProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of a page read on `site`. The read ends when the
    /// returned guard is dropped.
    pub fn enter_site(self: &Arc<Self>, site: &SiteId) -> SiteVisit {
        {
            let mut sites = self.sites.lock().expect("probe lock poisoned");
            let counters = sites.entry(site.clone()).or_default();
            counters.in_flight += 1;
            counters.total += 1;
            counters.max = counters.max.max(counters.in_flight);
        }
        SiteVisit {
            probe: Arc::clone(self),
            site: site.clone(),
        }
    }

    /// Mark the start of a save. The save ends when the guard is dropped.
    pub fn enter_save(self: &Arc<Self>) -> SaveVisit {
        let now = self.saves_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.saves_max.fetch_max(now, Ordering::SeqCst);
        SaveVisit {
            probe: Arc::clone(self),
        }
    }

    /// Highest number of simultaneous page reads observed on `site`.
    pub fn max_concurrent_site_reads(&self, site: &SiteId) -> usize {
        let sites = self.sites.lock().expect("probe lock poisoned");
        sites.get(site).map(|c| c.max).unwrap_or(0)
    }

    /// Total number of page reads observed on `site`.
    pub fn site_reads(&self, site: &SiteId) -> usize {
        let sites = self.sites.lock().expect("probe lock poisoned");
        sites.get(site).map(|c| c.total).unwrap_or(0)
    }

    /// Highest number of simultaneous saves observed.
    pub fn max_concurrent_saves(&self) -> usize {
        self.saves_max.load(Ordering::SeqCst)
    }
}

/// Guard for one in-flight page read.
pub struct SiteVisit {
    probe: Arc<AccessProbe>,
    site: SiteId,
}

impl Drop for SiteVisit {
    fn drop(&mut self) {
        if let Ok(mut sites) = self.probe.sites.lock() {
            if let Some(counters) = sites.get_mut(&self.site) {
                counters.in_flight = counters.in_flight.saturating_sub(1);
            }
        }
    }
}

/// Guard for one in-flight save.
pub struct SaveVisit {
    probe: Arc<AccessProbe>,
}

impl Drop for SaveVisit {
    fn drop(&mut self) {
        self.probe.saves_in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
