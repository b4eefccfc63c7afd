mod local;
mod multithreaded_cache;

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::parse::MenuPage;

pub use local::FileStore;
pub use multithreaded_cache::MultithreadedCache as Multithreaded;

#[cfg(test)]
pub(crate) use multithreaded_cache::tests as multithreaded_cache_tests;

/// Minimum time between crawls requested over the API.
pub const REFRESH_INTERVAL: Duration = Duration::minutes(15);

/// Shown when a crawl produced no menu.
pub const CRAWL_FAILED_MESSAGE: &str = "식단표를 불러오는데 실패했습니다.";

/// What the server currently knows about the menu. Replaced as a whole,
/// never edited in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    Menu {
        menu: MenuPage,
        /// `None` when the menu was loaded from disk rather than crawled.
        fetched_at: Option<NaiveDateTime>,
    },
    Failed {
        message: String,
    },
}

impl Snapshot {
    pub const fn menu(&self) -> Option<&MenuPage> {
        match self {
            Self::Menu { menu, .. } => Some(menu),
            Self::Failed { .. } => None,
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Menu { .. })
    }

    /// A menu whose period covers `today`.
    pub fn is_valid(&self, today: NaiveDate) -> bool {
        self.menu().is_some_and(|menu| menu.period.contains(today))
    }
}

/// In-memory cache state behind the lock.
#[derive(Debug, Clone, Default)]
pub struct MenuCache {
    snapshot: Option<Arc<Snapshot>>,
    /// Time of the last successful crawl.
    last_update: Option<NaiveDateTime>,
    /// Time the last crawl finished, successful or not.
    last_attempt: Option<NaiveDateTime>,
}

impl MenuCache {
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.clone()
    }

    #[inline]
    #[must_use]
    pub const fn last_update(&self) -> Option<NaiveDateTime> {
        self.last_update
    }

    #[inline]
    #[must_use]
    pub fn time_since_refresh(&self, now: NaiveDateTime) -> Option<Duration> {
        self.last_attempt.map(|at| now - at)
    }

    #[inline]
    #[must_use]
    pub fn needs_refresh(&self, now: NaiveDateTime) -> bool {
        self.time_since_refresh(now)
            .map_or(true, |since| since > REFRESH_INTERVAL)
    }

    fn install(&mut self, snapshot: Snapshot) {
        if let Snapshot::Menu {
            fetched_at: Some(at),
            ..
        } = &snapshot
        {
            self.last_update = Some(*at);
        }
        self.snapshot = Some(Arc::new(snapshot));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuStatus {
    pub has_menu: bool,
    pub last_update: Option<NaiveDateTime>,
    pub is_crawling: bool,
}
