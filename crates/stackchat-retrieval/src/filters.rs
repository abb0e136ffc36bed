use crate::intent::{detect_content_type, ContentType};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

const COUNTRIES: &[&str] = &["Italy", "France", "India", "USA", "Spain"];
const CITIES: &[&str] = &["Rome", "Mumbai", "Goa", "Mahabaleshwar", "Pune"];
const CUISINES: &[&str] = &["indian", "chinese", "italian", "mexican"];
const DISHES: &[&str] = &["veg manchurian", "vegetable biryani", "paneer butter masala"];
const INGREDIENTS: &[&str] = &["chicken", "pasta", "rice", "cheese", "tomato", "onion"];

#[allow(clippy::expect_used)]
static RUPEE_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"₹\s?([0-9,]+)").expect("valid rupee pattern"));
#[allow(clippy::expect_used)]
static UNDER_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)under\s+([0-9,]+)").expect("valid under pattern"));

/// A single filter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Upper bound, sent to the CMS as `$lte`.
    Number(u64),
    /// Exact match.
    Text(String),
    /// Every item must be present.
    List(Vec<String>),
}

/// Flat field → value filter map built from one user message.
///
/// Backed by a `BTreeMap` so the serialized query is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet(BTreeMap<String, FilterValue>);

impl FilterSet {
    /// An empty filter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `field`, replacing any previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: FilterValue) {
        self.0.insert(field.into(), value);
    }

    /// Raw value of `field`.
    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.0.get(field)
    }

    /// Value of `field` when it is text.
    pub fn text(&self, field: &str) -> Option<&str> {
        match self.0.get(field) {
            Some(FilterValue::Text(t)) => Some(t),
            _ => None,
        }
    }

    /// Upper price bound, if the message named one.
    pub fn price(&self) -> Option<u64> {
        match self.0.get("price") {
            Some(FilterValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// Requested ingredients, lowercase, in vocabulary order.
    pub fn ingredients(&self) -> &[String] {
        match self.0.get("ingredients") {
            Some(FilterValue::List(items)) => items,
            _ => &[],
        }
    }

    /// True when no filter was extracted.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
        self.0.iter()
    }

    /// Builds a filter set from URL query parameters.
    ///
    /// Purely numeric values become numbers so they compare against numeric
    /// CMS fields.
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let mut filters = Self::new();
        for (field, value) in params {
            let value = match value.parse::<u64>() {
                Ok(n) => FilterValue::Number(n),
                Err(_) => FilterValue::Text(value.clone()),
            };
            filters.insert(field.clone(), value);
        }
        filters
    }
}

/// Builds the filter set for a user message.
///
/// Entity extraction is a first-match substring scan over small vocabularies;
/// only ingredients accumulate.
pub fn build_filters(user_message: &str) -> FilterSet {
    let lower = user_message.to_lowercase();
    let mut filters = FilterSet::new();

    match detect_content_type(user_message) {
        ContentType::Tour => {
            if let Some(country) = first_mentioned(&lower, COUNTRIES) {
                filters.insert("country", FilterValue::Text(country.to_string()));
            }
            if let Some(city) = first_mentioned(&lower, CITIES) {
                filters.insert("city", FilterValue::Text(city.to_string()));
            }
            if let Some(price) = extract_price(&lower) {
                filters.insert("price", FilterValue::Number(price));
            }
        }
        ContentType::Recipe => {
            if let Some(cuisine) = first_mentioned(&lower, CUISINES) {
                filters.insert("cuisine", FilterValue::Text(cuisine.to_string()));
            }
            // Any single word of the dish name counts as a mention.
            if let Some(dish) = DISHES
                .iter()
                .find(|dish| dish.split(' ').any(|word| lower.contains(word)))
            {
                filters.insert("title", FilterValue::Text(dish.to_string()));
            }
            let ingredients: Vec<String> = INGREDIENTS
                .iter()
                .filter(|i| lower.contains(*i))
                .map(|i| i.to_string())
                .collect();
            if !ingredients.is_empty() {
                filters.insert("ingredients", FilterValue::List(ingredients));
            }
        }
    }

    filters
}

fn first_mentioned<'a>(lower: &str, vocabulary: &[&'a str]) -> Option<&'a str> {
    vocabulary
        .iter()
        .find(|term| lower.contains(&term.to_lowercase()))
        .copied()
}

/// Extracts a price bound: a rupee amount first, then "under <amount>".
pub fn extract_price(lower: &str) -> Option<u64> {
    let captures = RUPEE_AMOUNT
        .captures(lower)
        .or_else(|| UNDER_AMOUNT.captures(lower))?;
    let digits: String = captures.get(1)?.as_str().chars().filter(|c| *c != ',').collect();
    digits.parse().ok()
}
