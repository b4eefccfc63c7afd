//! Calendar triggers for re-crawling the menu.
//!
//! The menu page is replaced once a week, at some point on Monday morning.
//! [`Schedule::weekly`] checks often while the update is likely and hourly
//! for the rest of Monday.
mod runner;

use std::{fmt, ops::Range};

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Weekday};
use serde::Serialize;

pub use runner::{Scheduler, SchedulerStatus};

/// What a rule does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Crawl unconditionally.
    Crawl,
    /// Crawl only if the cached menu is not valid for today.
    RetryCrawl,
}

/// Fires on `weekday` every `every_minutes` minutes from the start of
/// `hours` until (not including) its end. Hour 24 means midnight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub id: &'static str,
    pub job: Job,
    pub weekday: Weekday,
    pub hours: Range<u32>,
    pub every_minutes: u32,
}

impl Rule {
    /// Minutes after midnight at which this rule fires.
    fn fire_minutes(&self) -> impl Iterator<Item = u32> {
        let step = self.every_minutes.max(1) as usize;
        (self.hours.start * 60..self.hours.end.min(24) * 60).step_by(step)
    }

    /// First firing strictly after `after`, looking at most one week ahead.
    pub fn next_fire(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        (0..=7)
            .map(|offset| after.date() + Duration::days(offset))
            .filter(|date| date.weekday() == self.weekday)
            .flat_map(|date| {
                self.fire_minutes().filter_map(move |minute| {
                    NaiveTime::from_hms_opt(minute / 60, minute % 60, 0).map(|t| date.and_time(t))
                })
            })
            .find(|at| *at > after)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:02}:00-{:02}:00 every {} minutes",
            self.weekday, self.hours.start, self.hours.end, self.every_minutes
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub id: &'static str,
    pub next_run_time: Option<NaiveDateTime>,
    pub trigger: String,
}

impl Schedule {
    pub const fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Mondays: a crawl every 30 minutes from 05:00 to 07:00, then a retry
    /// every hour from 07:00 until midnight.
    pub fn weekly() -> Self {
        Self::new(vec![
            Rule {
                id: "initial_crawl",
                job: Job::Crawl,
                weekday: Weekday::Mon,
                hours: 5..7,
                every_minutes: 30,
            },
            Rule {
                id: "retry_crawl",
                job: Job::RetryCrawl,
                weekday: Weekday::Mon,
                hours: 7..24,
                every_minutes: 60,
            },
        ])
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The earliest firing strictly after `after`. Ties go to the rule
    /// listed first.
    pub fn next_fire(&self, after: NaiveDateTime) -> Option<(NaiveDateTime, &Rule)> {
        self.rules
            .iter()
            .filter_map(|rule| rule.next_fire(after).map(|at| (at, rule)))
            .min_by_key(|(at, _)| *at)
    }

    pub fn jobs(&self, now: NaiveDateTime) -> Vec<JobStatus> {
        self.rules
            .iter()
            .map(|rule| JobStatus {
                id: rule.id,
                next_run_time: rule.next_fire(now),
                trigger: rule.to_string(),
            })
            .collect()
    }
}
