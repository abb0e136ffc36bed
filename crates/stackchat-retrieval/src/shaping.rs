use crate::filters::FilterSet;
use crate::intent::ContentType;
use crate::source::ContentEntry;
use regex::Regex;
use serde_json::Number;
use std::sync::LazyLock;

/// Maximum number of records shaped into a context block.
pub const TOP_K: usize = 5;
/// Character budget of a shaped block, excluding the ellipsis.
pub const SUMMARY_CHAR_LIMIT: usize = 1500;
/// Appended when a block is clipped.
pub const ELLIPSIS: &str = "...";
/// Content of the tool message when nothing survives filtering.
pub const NO_RESULTS: &str = "No results found";

/// Re-applies the constraints the search backend may have ignored.
///
/// Recipes must mention every requested ingredient; tours must have a numeric
/// price within the bound. Backend order is preserved.
pub fn post_filter(
    content_type: ContentType,
    filters: &FilterSet,
    entries: Vec<ContentEntry>,
) -> Vec<ContentEntry> {
    match content_type {
        ContentType::Recipe if !filters.ingredients().is_empty() => entries
            .into_iter()
            .filter(|entry| {
                let listed = entry.text("ingredients").to_lowercase();
                filters.ingredients().iter().all(|i| listed.contains(i.as_str()))
            })
            .collect(),
        ContentType::Tour => match filters.price() {
            Some(max) => entries
                .into_iter()
                .filter(|entry| entry.price().is_some_and(|p| p <= max as f64))
                .collect(),
            None => entries,
        },
        _ => entries,
    }
}

fn shape_tour(index: usize, entry: &ContentEntry) -> String {
    let price = match entry.get("price") {
        Some(serde_json::Value::Number(n)) if n.as_f64() != Some(0.0) => format!("₹{n}"),
        Some(serde_json::Value::String(p)) if !p.is_empty() => format!("₹{p}"),
        _ => String::new(),
    };
    format!(
        "Result {index}) {} — {}, {} — {price} — Highlights: {}. [View: {}]",
        entry.text("title"),
        entry.text("city"),
        entry.text("country"),
        entry.text_or(&["highlights", "multi_line"]),
        entry.url(),
    )
}

fn shape_recipe(index: usize, entry: &ContentEntry) -> String {
    format!(
        "Result {index}) {} — Cuisine: {} — Ingredients: {} — Instructions: {}",
        entry.text("title"),
        entry.text("cuisine"),
        entry.text("ingredients"),
        entry.text_or(&["instructions", "steps"]),
    )
}

/// Formats up to [`TOP_K`] entries, one line each, without clipping.
pub fn shape_entries(content_type: ContentType, entries: &[ContentEntry]) -> String {
    entries
        .iter()
        .take(TOP_K)
        .enumerate()
        .map(|(idx, entry)| match content_type {
            ContentType::Tour => shape_tour(idx + 1, entry),
            ContentType::Recipe => shape_recipe(idx + 1, entry),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Clips `text` to [`SUMMARY_CHAR_LIMIT`] characters plus [`ELLIPSIS`].
pub fn clip(text: String) -> String {
    match text.char_indices().nth(SUMMARY_CHAR_LIMIT) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text,
    }
}

/// Shapes surviving entries into the tool message content.
pub fn summarize(content_type: ContentType, entries: &[ContentEntry]) -> String {
    if entries.is_empty() {
        return NO_RESULTS.to_string();
    }
    clip(shape_entries(content_type, entries))
}

/// A tour line recovered from a shaped block.
#[derive(Debug, Clone, PartialEq)]
pub struct TourSummary {
    /// Entry title.
    pub title: String,
    /// City, possibly containing commas.
    pub city: String,
    /// Country, the last comma-free segment.
    pub country: String,
    /// `None` when the line carried no numeric price.
    pub price: Option<Number>,
    /// Highlights text without the trailing period.
    pub highlights: String,
    /// Link target.
    pub url: String,
}

#[allow(clippy::expect_used)]
static TOUR_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^Result \d+\) (?P<title>.+) — (?P<city>[^—]*), (?P<country>[^,—]*) — (?:₹(?P<price>[^—]*))? — Highlights: (?P<highlights>.*)\. \[View: (?P<url>.*)\]$",
    )
    .expect("valid tour line pattern")
});

/// Parses the lines of a shaped tour block. Lines that do not match are skipped.
///
/// Fields are anchored from the right: the country is the last comma-free
/// segment and the city runs up to it, so a city like "Kochi, Kerala" or a
/// title containing " — " survives.
pub fn parse_tour_block(block: &str) -> Vec<TourSummary> {
    block
        .lines()
        .filter_map(|line| {
            let caps = TOUR_LINE.captures(line)?;
            let field = |name: &str| caps.name(name).map(|m| m.as_str().to_string()).unwrap_or_default();
            let price = field("price");
            Some(TourSummary {
                title: field("title"),
                city: field("city"),
                country: field("country"),
                price: serde_json::from_str::<Number>(&price).ok(),
                highlights: field("highlights"),
                url: field("url"),
            })
        })
        .collect()
}
