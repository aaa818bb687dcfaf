use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Catalog category. Each category is backed by one or more storage partitions
/// (see [`crate::partitions`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Gallery,
    Featured,
    Events,
    Normal,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Gallery,
        Category::Featured,
        Category::Events,
        Category::Normal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Gallery => "gallery",
            Category::Featured => "featured",
            Category::Events => "events",
            Category::Normal => "normal",
        }
    }

    /// Parse a category name. Surrounding whitespace and case are ignored;
    /// anything outside the closed set yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let wanted = raw.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown category '{}'", s))
    }
}

/// Review state of a catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "published")]
    Published,
    #[serde(rename = "in-review")]
    InReview,
    #[serde(rename = "development")]
    Development,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Published => "published",
            Status::InReview => "in-review",
            Status::Development => "development",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "published" => Some(Status::Published),
            "in-review" => Some(Status::InReview),
            "development" => Some(Status::Development),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store an item is distributed through. `AppStore` is the default platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorePlatform {
    #[default]
    AppStore,
    PlayStore,
}

impl StorePlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorePlatform::AppStore => "appstore",
            StorePlatform::PlayStore => "playstore",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "appstore" => Some(StorePlatform::AppStore),
            "playstore" => Some(StorePlatform::PlayStore),
            _ => None,
        }
    }
}

/// The unified, fully-defaulted shape every stored item is coerced into
/// before it is listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub id: String,
    pub category: Category,
    pub title: String,
    pub author: String,
    pub body: String,
    pub primary_image: String,
    pub image_list: Vec<String>,
    pub published: bool,
    pub status: Status,
    pub store: StorePlatform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_link: Option<String>,
    pub tags: Vec<String>,
    pub sort_timestamp: DateTime<Utc>,
    pub rating: f64,
    pub download_count: String,
    pub version: String,
    pub size: String,
    pub views: u64,
    pub likes: u64,
}
