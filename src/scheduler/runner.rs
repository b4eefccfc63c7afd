use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::NaiveDateTime;
use log::{info, warn};
use serde::Serialize;
use tokio::time::sleep;

use super::{Job, JobStatus, Schedule};
use crate::{cache::Multithreaded, clock::Clock};

/// Runs a [`Schedule`] against the menu cache on a background task.
#[derive(Debug)]
pub struct Scheduler {
    schedule: Schedule,
    clock: Arc<dyn Clock>,
    running: AtomicBool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub jobs: Vec<JobStatus>,
}

impl Scheduler {
    pub fn new(schedule: Schedule, clock: Arc<dyn Clock>) -> Self {
        Self {
            schedule,
            clock,
            running: AtomicBool::new(false),
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            is_running: self.running.load(Ordering::Acquire),
            jobs: self.schedule.jobs(self.clock.now()),
        }
    }

    /// Sleeps until each firing and runs its job. Only returns if the
    /// schedule has nothing left to fire.
    pub async fn run(self: Arc<Self>, cache: Arc<Multithreaded>) {
        self.running.store(true, Ordering::Release);
        info!("Scheduler started");
        for rule in self.schedule.rules() {
            info!("Scheduled `{}`: {rule}", rule.id);
        }
        let mut last_fire: Option<NaiveDateTime> = None;
        loop {
            let now = self.clock.now();
            // never fire the same slot twice if the sleep woke up early
            let after = last_fire.map_or(now, |last| last.max(now));
            let Some((at, rule)) = self.schedule.next_fire(after) else {
                warn!("Schedule has no upcoming triggers, stopping");
                break;
            };
            let wait = (at - now).to_std().unwrap_or_default();
            log::debug!("Next trigger `{}` at {at} (in {wait:?})", rule.id);
            sleep(wait).await;
            last_fire = Some(at);

            info!("Trigger `{}` fired", rule.id);
            self.fire(rule.job, &cache).await;
        }
        self.running.store(false, Ordering::Release);
    }

    async fn fire(&self, job: Job, cache: &Multithreaded) {
        let ran = match job {
            Job::Crawl => cache.perform_crawl().await,
            Job::RetryCrawl => cache.retry_crawl().await,
        };
        if !ran {
            log::debug!("{job:?} had nothing to do");
        }
    }
}
