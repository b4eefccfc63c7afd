use chrono::{Local, NaiveDateTime};

/// Source of the local wall-clock time. Validity checks and the scheduler
/// read time through this so tests can pin it.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[cfg(test)]
pub use fixed::FixedClock;

#[cfg(test)]
mod fixed {
    use std::sync::Mutex;

    use chrono::NaiveDateTime;

    use super::Clock;

    #[derive(Debug)]
    pub struct FixedClock(Mutex<NaiveDateTime>);

    impl FixedClock {
        pub fn new(now: NaiveDateTime) -> Self {
            Self(Mutex::new(now))
        }

        /// `"2025-03-19 08:00"`
        pub fn at(s: &str) -> Self {
            Self::new(
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").expect("fixture time is valid"),
            )
        }

        pub fn set(&self, now: NaiveDateTime) {
            *self.0.lock().unwrap() = now;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            *self.0.lock().unwrap()
        }
    }
}
