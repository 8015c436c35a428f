use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::error::ExtractionError;

// Hangul syllables, ASCII digits, whitespace and `!?().,` survive.
static DISALLOWED_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^가-힣0-9\s!?().,]").expect("static regex"));

static PLACE_NUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"place/(\d+)").expect("static regex"));

const LISTING_BASE: &str = "https://m.place.naver.com/place/";

/// Visitor review listing for a place, sorted by most recent.
pub fn listing_url(place_num: &str) -> String {
    format!(
        "{}{}/review/visitor?entry=plt&reviewSort=recent",
        LISTING_BASE,
        urlencoding::encode(place_num.trim())
    )
}

/// Whitelist cleanup applied to every review body. Idempotent.
pub fn sanitize_review(raw: &str) -> String {
    DISALLOWED_CHARS.replace_all(raw, "").into_owned()
}

/// First digit run following `place/` in a landing URL.
pub fn extract_place_num(url: &str) -> Option<String> {
    PLACE_NUM
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Pulls the text of every review body out of a fully expanded listing page.
/// Items without a body node are skipped; cleanup is left to the caller.
pub fn parse_review_bodies(
    html: &str,
    item_selector: &str,
    body_selector: &str,
) -> Result<Vec<String>, ExtractionError> {
    let item = parse_selector(item_selector)?;
    let body = parse_selector(body_selector)?;
    let doc = Html::parse_document(html);

    Ok(doc
        .select(&item)
        .filter_map(|el| el.select(&body).next())
        .map(|node| node.text().collect::<String>())
        .collect())
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(selector).map_err(|_| ExtractionError::Selector {
        selector: selector.to_string(),
    })
}
