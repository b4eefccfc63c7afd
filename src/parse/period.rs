use chrono::{Datelike, NaiveDate};

use super::Error;

/// Any leap year works; it only lets `02.29` parse.
const REFERENCE_YEAR: i32 = 2000;

/// The inclusive `MM.DD` range printed above the menu tables.
///
/// Years are not part of the label, so a period running from December into
/// January never contains any date.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MenuPeriod {
    #[serde(rename = "시작일")]
    pub start: String,
    #[serde(rename = "종료일")]
    pub end: String,
}

impl MenuPeriod {
    /// Reads the period from a block title such as `"03.17 ~ 03.23 식단표"`:
    /// words 0 and 2 of the space separated title.
    pub fn from_title(title: &str) -> Result<Self, Error> {
        let mut words = title.trim().split(' ');
        let start = words.next().filter(|w| !w.is_empty());
        let end = words.nth(1).filter(|w| !w.is_empty());
        match (start, end) {
            (Some(start), Some(end)) => Ok(Self {
                start: start.to_owned(),
                end: end.to_owned(),
            }),
            _ => Err(Error::text_node_parse_error(
                "Menu title should look like `MM.DD ~ MM.DD`.",
            )),
        }
    }

    /// Whether `today`'s month and day fall inside the period. Malformed
    /// boundaries make every date fall outside.
    pub fn contains(&self, today: NaiveDate) -> bool {
        let (Some(start), Some(end)) = (month_day(&self.start), month_day(&self.end)) else {
            return false;
        };
        let today = (today.month(), today.day());
        start <= today && today <= end
    }
}

fn month_day(label: &str) -> Option<(u32, u32)> {
    NaiveDate::parse_from_str(&format!("{REFERENCE_YEAR}.{}", label.trim()), "%Y.%m.%d")
        .ok()
        .map(|date| (date.month(), date.day()))
}
