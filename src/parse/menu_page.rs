use scraper::{ElementRef, Html};

use super::{
    cafeteria_menu::CafeteriaMenu, period::MenuPeriod, text_from_selection::text_from_selection,
    Error,
};
use crate::static_selector;

/// The source page lists the staff cafeteria first and the student cafeteria
/// second. Swapping these silently mislabels both menus.
pub const STAFF_BLOCK: usize = 0;
pub const STUDENT_BLOCK: usize = 1;
const BLOCK_COUNT: usize = 2;

/// Both cafeterias of one weekly menu page. The period is read from the
/// student block and shared with the staff menu.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MenuPage {
    #[serde(rename = "기간")]
    pub period: MenuPeriod,
    #[serde(rename = "학생식당")]
    pub student: CafeteriaMenu,
    #[serde(rename = "교직원식당")]
    pub staff: CafeteriaMenu,
}

impl MenuPage {
    /// Combines two cafeteria records, taking the period from the student one.
    pub fn from_parts(student: CafeteriaMenu, staff: CafeteriaMenu) -> Self {
        Self {
            period: student.period.clone(),
            student,
            staff,
        }
    }

    pub fn from_html(html: &str) -> Result<Self, Error> {
        let document = Html::parse_document(html);
        Self::from_html_element(document.root_element())
    }

    pub fn from_html_element(element: ElementRef<'_>) -> Result<Self, Error> {
        static_selector!(BLOCK_SELECTOR <- "div.diet-menu");
        static_selector!(TITLE_SELECTOR <- "p.title");

        let blocks: Vec<ElementRef> = element.select(&BLOCK_SELECTOR).collect();
        if blocks.len() != BLOCK_COUNT {
            return Err(Error::HtmlParse(format!(
                "Expected {BLOCK_COUNT} diet-menu blocks, found {}. The page layout has changed.",
                blocks.len()
            )));
        }
        let student_block = blocks[STUDENT_BLOCK];
        let staff_block = blocks[STAFF_BLOCK];

        let title = text_from_selection(&TITLE_SELECTOR, student_block, "menu block", "title")?;
        let period = MenuPeriod::from_title(&title)?;

        let student = CafeteriaMenu::from_table(period.clone(), menu_table(student_block)?)?;
        let staff = CafeteriaMenu::from_table(period.clone(), menu_table(staff_block)?)?;

        Ok(Self {
            period,
            student,
            staff,
        })
    }
}

fn menu_table(block: ElementRef<'_>) -> Result<ElementRef<'_>, Error> {
    static_selector!(TABLE_SELECTOR <- "table");
    block
        .select(&TABLE_SELECTOR)
        .next()
        .ok_or_else(|| Error::html_parse_error("Every menu block should have a table."))
}
