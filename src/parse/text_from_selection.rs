use super::Error;
use scraper::{ElementRef, Selector};

/// Returns the concatenated, trimmed text of the first element matching `selector`.
pub fn text_from_selection(
    selector: &Selector,
    element: ElementRef<'_>,
    parent_label: &str,
    child_label: &str,
) -> Result<String, Error> {
    let child = element
        .select(selector)
        .next() // first match
        .ok_or_else(|| {
            Error::HtmlParse(format!(
                "Every {parent_label} element should have a {child_label}."
            ))
        })?;
    let text = child.text().collect::<String>();
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::TextNodeParse(format!(
            "{child_label} should have text inside."
        )));
    }
    Ok(text.to_owned())
}

/// Every text node under `element`, trimmed, with blank nodes dropped.
/// `<br/>` separated lines come out as separate entries.
pub fn text_lines(element: ElementRef<'_>) -> Vec<String> {
    element
        .text()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Direct element children of `element` with the given tag name.
pub fn child_elements<'a>(
    element: ElementRef<'a>,
    tag: &'a str,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |child| child.value().name() == tag)
}
