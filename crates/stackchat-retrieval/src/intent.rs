use serde::{Deserialize, Serialize};
use std::fmt;

/// Content types the retriever knows how to search and shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Travel packages, the default.
    Tour,
    /// Cooking recipes.
    Recipe,
}

impl ContentType {
    /// The Contentstack content type uid.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Tour => "tour",
            ContentType::Recipe => "recipe",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terms that select the recipe content type outright.
const RECIPE_TRIGGERS: &[&str] = &["recipe", "cook", "food", "biryani", "manchurian"];

const TRAVEL_KEYWORDS: &[&str] = &[
    "tour",
    "price",
    "book",
    "available",
    "where",
    "show",
    "visit",
    "travel",
    "trip",
    "destination",
    "location",
    "city",
    "country",
    "rome",
    "mumbai",
    "goa",
    "pune",
    "mahabaleshwar",
    "italy",
    "india",
];

const RECIPE_KEYWORDS: &[&str] = &[
    "recipe",
    "cook",
    "ingredient",
    "how to make",
    "bake",
    "cuisine",
    "food",
    "biryani",
    "manchurian",
];

/// Picks the content type for a message. Recipe terms win; tour is the default.
pub fn detect_content_type(user_message: &str) -> ContentType {
    let lower = user_message.to_lowercase();
    if RECIPE_TRIGGERS.iter().any(|k| lower.contains(k)) {
        ContentType::Recipe
    } else {
        ContentType::Tour
    }
}

/// Whether the message asks for CMS content at all.
pub fn needs_data(user_message: &str) -> bool {
    if user_message.trim().is_empty() {
        return false;
    }
    if detect_content_type(user_message) == ContentType::Recipe {
        return true;
    }

    let lower = user_message.to_lowercase();
    TRAVEL_KEYWORDS
        .iter()
        .chain(RECIPE_KEYWORDS)
        .any(|k| lower.contains(k))
}
