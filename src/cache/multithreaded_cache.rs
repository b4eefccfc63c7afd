use super::{
    FileStore, MenuCache, MenuStatus, Snapshot, CRAWL_FAILED_MESSAGE, REFRESH_INTERVAL,
};
use crate::{clock::Clock, fetch::PageSource, parse::MenuPage};
use std::{
    any::Any,
    ops::Deref,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use futures::FutureExt;
use futures_locks::RwLock;
use log::{error, info, warn};

/// The process-wide menu cache. Handlers and the scheduler share one of
/// these behind an `Arc`.
#[derive(Debug)]
pub struct MultithreadedCache {
    state: RwLock<MenuCache>,
    crawling: AtomicBool,
    store: FileStore,
    source: Arc<dyn PageSource>,
    clock: Arc<dyn Clock>,
}

/// Clears the in-progress flag however the crawl ends.
struct CrawlGuard<'a>(&'a AtomicBool);

impl<'a> CrawlGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for CrawlGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl MultithreadedCache {
    pub fn new(store: FileStore, source: Arc<dyn PageSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(MenuCache::default()),
            crawling: AtomicBool::new(false),
            store,
            source,
            clock,
        }
    }

    pub async fn get(&self) -> impl Deref<Target = MenuCache> + '_ {
        self.state.read().await
    }

    pub async fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.get().await.snapshot()
    }

    pub fn is_crawling(&self) -> bool {
        self.crawling.load(Ordering::Acquire)
    }

    pub async fn status(&self) -> MenuStatus {
        let state = self.get().await;
        MenuStatus {
            has_menu: state.snapshot.as_deref().is_some_and(Snapshot::is_success),
            last_update: state.last_update(),
            is_crawling: self.is_crawling(),
        }
    }

    /// Whether the cached menu is a successful crawl covering today.
    pub async fn is_valid(&self) -> bool {
        let today = self.clock.now().date();
        self.snapshot()
            .await
            .is_some_and(|snapshot| snapshot.is_valid(today))
    }

    async fn install(&self, snapshot: Snapshot) {
        self.state.write().await.install(snapshot);
    }

    /// Loads the saved menu files into memory.
    ///
    /// Returns `true` only if the saved menu covers today. A stale menu is
    /// still installed so it can be served, and a crawl runs before this
    /// returns `false`.
    pub async fn load_current_menu(&self) -> bool {
        let menu = match self.store.load().await {
            Ok(Some(menu)) => menu,
            Ok(None) => {
                info!("No saved menu found");
                return false;
            }
            Err(e) => {
                error!("Error while loading saved menu: {e}");
                return false;
            }
        };
        let valid = menu.period.contains(self.clock.now().date());
        let (start, end) = (menu.period.start.clone(), menu.period.end.clone());
        self.install(Snapshot::Menu {
            menu,
            fetched_at: None,
        })
        .await;
        if !valid {
            info!("Saved menu for {start} ~ {end} is out of date, crawling");
            self.perform_crawl().await;
            return false;
        }
        info!("Loaded saved menu for {start} ~ {end}");
        true
    }

    /// Fetches, parses and saves the menu page, then swaps the result in.
    ///
    /// Returns `false` without doing anything when another crawl is running.
    /// Failures never escape: they become a [`Snapshot::Failed`].
    pub async fn perform_crawl(&self) -> bool {
        let Some(_guard) = CrawlGuard::acquire(&self.crawling) else {
            info!("Crawl already in progress, skipping");
            return false;
        };
        info!("Crawl started");
        let snapshot = match AssertUnwindSafe(self.crawl()).catch_unwind().await {
            Ok(Some(menu)) => {
                let fetched_at = self.clock.now();
                info!("Crawl succeeded at {fetched_at}");
                Snapshot::Menu {
                    menu,
                    fetched_at: Some(fetched_at),
                }
            }
            Ok(None) => {
                warn!("Crawl failed: no menu data was produced");
                Snapshot::Failed {
                    message: CRAWL_FAILED_MESSAGE.to_string(),
                }
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Unexpected error while crawling: {message}");
                Snapshot::Failed { message }
            }
        };
        let mut state = self.state.write().await;
        state.last_attempt = Some(self.clock.now());
        state.install(snapshot);
        true
    }

    /// Crawls unless another crawl finished less than
    /// [`REFRESH_INTERVAL`] ago. Returns whether a crawl ran.
    pub async fn maybe_refresh(&self) -> bool {
        let now = self.clock.now();
        if !self.get().await.needs_refresh(now) {
            info!("Refresh requested within {REFRESH_INTERVAL} of the last crawl, skipping");
            return false;
        }
        self.perform_crawl().await
    }

    /// Crawls only when the cached menu is missing, failed or out of date.
    pub async fn retry_crawl(&self) -> bool {
        if self.is_valid().await {
            return false;
        }
        info!("No valid menu, retrying crawl");
        self.perform_crawl().await
    }

    async fn crawl(&self) -> Option<MenuPage> {
        match self.fetch_and_save().await {
            Ok(menu) => Some(menu),
            Err(crate::Error::EmptyResponse) => {
                warn!("Menu page response was empty");
                None
            }
            Err(e) => {
                error!("Error while crawling: {e}");
                None
            }
        }
    }

    async fn fetch_and_save(&self) -> crate::Result<MenuPage> {
        let html = self.source.fetch_page().await?;
        let menu = MenuPage::from_html(&html)?;
        self.store.save(&menu).await?;
        Ok(menu)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown error".to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        clock::FixedClock,
        error::Error,
        fetch::{make_client, HttpSource},
        parse::EXAMPLE_PAGE,
    };
    use async_trait::async_trait;
    use chrono::NaiveDateTime;
    use std::{
        sync::{atomic::AtomicUsize, Mutex},
        time::Duration,
    };
    use tempfile::TempDir;
    use tokio::sync::Notify;
    use url::Url;

    #[derive(Debug, Clone, Copy)]
    pub(crate) enum Reply {
        Page(&'static str),
        Empty,
        Panic,
    }

    /// Serves canned replies and counts how often it was asked.
    #[derive(Debug)]
    pub(crate) struct FakeSource {
        reply: Mutex<Reply>,
        calls: AtomicUsize,
        /// When set, each fetch waits here until released.
        gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    impl FakeSource {
        pub(crate) fn new(reply: Reply) -> Self {
            Self {
                reply: Mutex::new(reply),
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        fn gated(reply: Reply, entered: Arc<Notify>, release: Arc<Notify>) -> Self {
            Self {
                gate: Some((entered, release)),
                ..Self::new(reply)
            }
        }

        pub(crate) fn set_reply(&self, reply: Reply) {
            *self.reply.lock().unwrap() = reply;
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageSource for FakeSource {
        async fn fetch_page(&self) -> crate::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            let reply = *self.reply.lock().unwrap();
            match reply {
                Reply::Page(html) => Ok(html.to_string()),
                Reply::Empty => Err(Error::EmptyResponse),
                Reply::Panic => panic!("parser exploded"),
            }
        }
    }

    pub(crate) fn march(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    pub(crate) fn cache_with(
        source: Arc<dyn PageSource>,
        now: &str,
    ) -> (MultithreadedCache, Arc<FixedClock>, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FixedClock::at(now));
        let cache = MultithreadedCache::new(FileStore::open(dir.path()), source, clock.clone());
        (cache, clock, dir)
    }

    #[tokio::test]
    async fn test_successful_crawl_installs_and_saves() {
        let source = Arc::new(FakeSource::new(Reply::Page(EXAMPLE_PAGE)));
        let (cache, _clock, dir) = cache_with(source.clone(), "2025-03-17 05:00");

        assert!(cache.perform_crawl().await);
        let snapshot = cache.snapshot().await.unwrap();
        assert!(snapshot.is_success());
        assert!(cache.is_valid().await);
        assert!(!cache.is_crawling());

        let status = cache.status().await;
        assert!(status.has_menu);
        assert_eq!(status.last_update, Some(march("2025-03-17 05:00")));

        let saved = FileStore::open(dir.path()).load().await.unwrap().unwrap();
        assert_eq!(Some(&saved), snapshot.menu());
    }

    #[tokio::test]
    async fn test_network_failure_installs_failed_snapshot() {
        let url = Url::parse("http://127.0.0.1:9/diet").unwrap();
        let client = make_client(Duration::from_secs(2)).unwrap();
        let source = Arc::new(HttpSource::new(client, url));
        let (cache, _clock, _dir) = cache_with(source, "2025-03-17 05:00");

        assert!(cache.perform_crawl().await);
        let snapshot = cache.snapshot().await.unwrap();
        assert_eq!(
            *snapshot,
            Snapshot::Failed {
                message: CRAWL_FAILED_MESSAGE.to_string()
            }
        );
        assert!(!cache.is_crawling());
        assert!(!cache.status().await.has_menu);
    }

    #[tokio::test]
    async fn test_empty_and_unparseable_pages_fail() {
        let source = Arc::new(FakeSource::new(Reply::Empty));
        let (cache, _clock, dir) = cache_with(source.clone(), "2025-03-17 05:00");
        cache.perform_crawl().await;
        assert!(!cache.snapshot().await.unwrap().is_success());

        source.set_reply(Reply::Page("<html><body>점검 중</body></html>"));
        cache.perform_crawl().await;
        assert!(!cache.snapshot().await.unwrap().is_success());
        assert!(FileStore::open(dir.path()).load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_page_without_rows_keeps_saved_menu() {
        const HEADERS_ONLY: &str = r#"
            <div class="diet-menu"><p class="title">03.24 ~ 03.30</p>
              <table><thead><tr><th></th><th>03.24(월)</th></tr></thead></table></div>
            <div class="diet-menu"><p class="title">03.24 ~ 03.30</p>
              <table><thead><tr><th></th><th>03.24(월)</th></tr></thead></table></div>"#;
        let source = Arc::new(FakeSource::new(Reply::Page(EXAMPLE_PAGE)));
        let (cache, clock, dir) = cache_with(source.clone(), "2025-03-17 05:00");
        cache.perform_crawl().await;
        let saved = FileStore::open(dir.path()).load().await.unwrap();

        clock.set(march("2025-03-24 05:00"));
        source.set_reply(Reply::Page(HEADERS_ONLY));
        cache.perform_crawl().await;
        assert!(!cache.snapshot().await.unwrap().is_success());
        assert_eq!(FileStore::open(dir.path()).load().await.unwrap(), saved);
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_snapshot_with_message() {
        let source = Arc::new(FakeSource::new(Reply::Panic));
        let (cache, _clock, _dir) = cache_with(source.clone(), "2025-03-17 05:00");

        assert!(cache.perform_crawl().await);
        let snapshot = cache.snapshot().await.unwrap();
        assert_eq!(
            *snapshot,
            Snapshot::Failed {
                message: "parser exploded".to_string()
            }
        );
        assert!(!cache.is_crawling());
    }

    #[tokio::test]
    async fn test_failed_crawl_keeps_last_update() {
        let source = Arc::new(FakeSource::new(Reply::Page(EXAMPLE_PAGE)));
        let (cache, clock, _dir) = cache_with(source.clone(), "2025-03-17 05:00");
        cache.perform_crawl().await;

        clock.set(march("2025-03-24 05:00"));
        source.set_reply(Reply::Empty);
        cache.perform_crawl().await;

        let status = cache.status().await;
        assert!(!status.has_menu);
        assert_eq!(status.last_update, Some(march("2025-03-17 05:00")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_overlapping_crawl_is_skipped() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let source = Arc::new(FakeSource::gated(
            Reply::Page(EXAMPLE_PAGE),
            entered.clone(),
            release.clone(),
        ));
        let (cache, _clock, _dir) = cache_with(source.clone(), "2025-03-17 05:00");
        let cache = Arc::new(cache);

        let first = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.perform_crawl().await }
        });
        entered.notified().await;
        assert!(cache.is_crawling());

        assert!(!cache.perform_crawl().await, "second crawl should be skipped");
        assert_eq!(source.calls(), 1);

        release.notify_one();
        assert!(first.await.unwrap());
        assert!(!cache.is_crawling());
        assert_eq!(source.calls(), 1);
        assert!(cache.snapshot().await.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_retry_skips_valid_menu() {
        let source = Arc::new(FakeSource::new(Reply::Page(EXAMPLE_PAGE)));
        let (cache, clock, _dir) = cache_with(source.clone(), "2025-03-17 05:00");

        assert!(cache.retry_crawl().await, "nothing cached yet");
        assert_eq!(source.calls(), 1);

        clock.set(march("2025-03-20 12:00"));
        assert!(!cache.retry_crawl().await);
        assert_eq!(source.calls(), 1);

        clock.set(march("2025-03-24 07:00"));
        assert!(cache.retry_crawl().await);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_refresh_is_throttled() {
        let source = Arc::new(FakeSource::new(Reply::Page(EXAMPLE_PAGE)));
        let (cache, clock, _dir) = cache_with(source.clone(), "2025-03-18 12:00");

        for _ in 0..5 {
            cache.maybe_refresh().await;
        }
        assert_eq!(source.calls(), 1);

        // a failing upstream cannot replace the menu while throttled
        source.set_reply(Reply::Empty);
        assert!(!cache.maybe_refresh().await);
        assert!(cache.is_valid().await);

        clock.set(march("2025-03-18 12:16"));
        assert!(cache.maybe_refresh().await);
        assert_eq!(source.calls(), 2);
        assert!(!cache.snapshot().await.unwrap().is_success());

        // failed crawls count as attempts too
        assert!(!cache.maybe_refresh().await);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_load_current_menu_valid() {
        let source = Arc::new(FakeSource::new(Reply::Empty));
        let (cache, _clock, dir) = cache_with(source.clone(), "2025-03-19 09:00");
        let menu = MenuPage::from_html(EXAMPLE_PAGE).unwrap();
        FileStore::open(dir.path()).save(&menu).await.unwrap();

        assert!(cache.load_current_menu().await);
        assert_eq!(source.calls(), 0);
        assert_eq!(cache.snapshot().await.unwrap().menu(), Some(&menu));
        assert_eq!(cache.status().await.last_update, None);
    }

    #[tokio::test]
    async fn test_load_current_menu_stale_crawls() {
        let source = Arc::new(FakeSource::new(Reply::Empty));
        let (cache, _clock, dir) = cache_with(source.clone(), "2025-03-25 09:00");
        let menu = MenuPage::from_html(EXAMPLE_PAGE).unwrap();
        FileStore::open(dir.path()).save(&menu).await.unwrap();

        assert!(!cache.load_current_menu().await);
        assert_eq!(source.calls(), 1);
        // the crawl failed, so the stale menu was replaced by the failure
        assert!(!cache.snapshot().await.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_load_current_menu_missing_or_corrupt() {
        let source = Arc::new(FakeSource::new(Reply::Empty));
        let (cache, _clock, dir) = cache_with(source.clone(), "2025-03-19 09:00");
        assert!(!cache.load_current_menu().await);
        assert!(cache.snapshot().await.is_none());

        std::fs::write(dir.path().join("student_menu.json"), "[]").unwrap();
        std::fs::write(dir.path().join("staff_menu.json"), "[]").unwrap();
        assert!(!cache.load_current_menu().await);
        assert!(cache.snapshot().await.is_none());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_readers_see_whole_snapshots() {
        let source = Arc::new(FakeSource::new(Reply::Page(EXAMPLE_PAGE)));
        let (cache, _clock, _dir) = cache_with(source.clone(), "2025-03-17 05:00");
        cache.perform_crawl().await;
        // try having multiple threads read from the cache while it is replaced
        tokio_scoped::scope(|s| {
            s.spawn(async {
                source.set_reply(Reply::Empty);
                cache.perform_crawl().await;
            });
            for _ in 0..10 {
                s.spawn(async {
                    let snapshot = cache.snapshot().await.unwrap();
                    match &*snapshot {
                        Snapshot::Menu { menu, .. } => assert_eq!(menu.period.start, "03.17"),
                        Snapshot::Failed { message } => {
                            assert_eq!(message, CRAWL_FAILED_MESSAGE);
                        }
                    }
                });
            }
        });
        assert!(!cache.is_crawling());
    }
}
