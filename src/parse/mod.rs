mod cafeteria_menu;
mod error;
mod meal;
mod menu_page;
mod period;
mod remove_whitespace;
mod static_selector;
mod text_from_selection;

pub use cafeteria_menu::CafeteriaMenu;
pub use error::Error;
pub use menu_page::MenuPage;
use remove_whitespace::remove_whitespace;

#[cfg(test)]
pub(crate) use menu_page::tests::PAGE as EXAMPLE_PAGE;
