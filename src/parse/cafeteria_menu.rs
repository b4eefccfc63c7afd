use std::collections::BTreeMap;

use scraper::ElementRef;

use super::{
    meal::{extract_time, DailyMenu, MealSlot, MealType},
    period::MenuPeriod,
    remove_whitespace,
    text_from_selection::{child_elements, text_lines},
    Error,
};
use crate::static_selector;

/// One cafeteria's week: the validity period and the meals of every date
/// column in the table, keyed by the normalized date header.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CafeteriaMenu {
    #[serde(rename = "기간")]
    pub period: MenuPeriod,
    #[serde(rename = "메뉴")]
    pub days: BTreeMap<String, DailyMenu>,
}

impl CafeteriaMenu {
    pub fn from_table(period: MenuPeriod, table: ElementRef<'_>) -> Result<Self, Error> {
        Ok(Self {
            period,
            days: extract_days(table)?,
        })
    }
}

/// Turns a menu `<table>` into date → meal type → slot.
///
/// The header row holds the dates (its first cell is a corner label). Each
/// body row starts with a `<th>` meal label followed by one `<td>` per date;
/// a row with fewer cells than dates only fills the dates it has. Cells with
/// no menu text add nothing.
pub fn extract_days(table: ElementRef<'_>) -> Result<BTreeMap<String, DailyMenu>, Error> {
    static_selector!(HEADER_SELECTOR <- "thead th");

    if child_elements(table, "thead").next().is_none() {
        return Err(Error::html_parse_error("Menu table should have a thead."));
    }
    if child_elements(table, "tbody").next().is_none() {
        return Err(Error::html_parse_error("Menu table should have a tbody."));
    }
    let dates: Vec<String> = table
        .select(&HEADER_SELECTOR)
        .skip(1)
        .map(|th| remove_whitespace(&th.text().collect::<String>()).into_owned())
        .collect();

    let mut days: BTreeMap<String, DailyMenu> = dates
        .iter()
        .map(|date| (date.clone(), DailyMenu::default()))
        .collect();

    let rows = child_elements(table, "tbody").flat_map(|tbody| child_elements(tbody, "tr"));
    for row in rows {
        let label = child_elements(row, "th")
            .next()
            .map(|th| th.text().collect::<String>())
            .unwrap_or_default();
        let label = label.trim();
        let meal_type = MealType::from_label(label);
        let time = extract_time(label);

        for (date, cell) in dates.iter().zip(child_elements(row, "td")) {
            let items = menu_items(cell);
            if items.is_empty() {
                continue;
            }
            if let Some(day) = days.get_mut(date) {
                day.insert(
                    meal_type,
                    MealSlot {
                        time: time.to_owned(),
                        items,
                    },
                );
            }
        }
    }
    Ok(days)
}

/// Menu lines inside the cell's `p.offTxt` block; empty when the block is missing.
fn menu_items(cell: ElementRef<'_>) -> Vec<String> {
    static_selector!(ITEMS_SELECTOR <- "p.offTxt");
    cell.select(&ITEMS_SELECTOR)
        .next()
        .map(text_lines)
        .unwrap_or_default()
}
