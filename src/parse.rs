//! Small HTML helpers shared by the listing, detail and name parsers.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::{Error, Result};

#[inline]
pub(crate) fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}

/// Concatenated, trimmed text of an element and its descendants.
#[inline]
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Text rendering of a markup fragment, with all tags stripped. Not trimmed.
pub(crate) fn fragment_text(markup: &str) -> String {
    Html::parse_fragment(markup)
        .root_element()
        .text()
        .collect()
}

/// Compiles a pattern that is known to be valid at compile time.
pub(crate) fn static_regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("hard-coded pattern is valid"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_text_strips_tags_and_decodes_entities() {
        let text = fragment_text(r#"<td><img src="x.png">SMITH &amp; SONS<br>JONES</td>"#);
        assert_eq!(text, "SMITH & SONSJONES");
    }

    #[test]
    fn bad_selector_names_itself() {
        let err = create_selector("td[").unwrap_err();
        assert!(matches!(err, Error::ParseMissingSelector(s) if s == "td["));
    }
}
