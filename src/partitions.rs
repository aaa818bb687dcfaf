//! Storage partition names and the logical category -> physical partition table.
//!
//! A partition is a folder prefix in the blob store holding the JSON blobs of
//! one category. `gallery` and `normal` share a logical view: both read the
//! `gallery` folder plus the legacy `normal` folder that older deployments
//! wrote to.

use crate::domain::{CanonicalRecord, Category, Status};

pub const GALLERY_PARTITION: &str = "gallery";
pub const FEATURED_PARTITION: &str = "featured";
pub const EVENTS_PARTITION: &str = "events";
pub const LEGACY_NORMAL_PARTITION: &str = "normal";

/// File suffix of record blobs.
pub const JSON_SUFFIX: &str = ".json";

const PARTITION_TABLE: [(Category, &[&str]); 4] = [
    (Category::Gallery, &[GALLERY_PARTITION, LEGACY_NORMAL_PARTITION]),
    (Category::Normal, &[GALLERY_PARTITION, LEGACY_NORMAL_PARTITION]),
    (Category::Featured, &[FEATURED_PARTITION]),
    (Category::Events, &[EVENTS_PARTITION]),
];

/// Ordered list of partitions read when listing or locating records of a category.
pub fn partitions_for(category: Category) -> &'static [&'static str] {
    PARTITION_TABLE
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, partitions)| *partitions)
        .unwrap_or(&[GALLERY_PARTITION])
}

/// Partition new and replacement blobs of a category are written to.
pub fn primary_partition(category: Category) -> &'static str {
    partitions_for(category)[0]
}

/// Pathname of the JSON blob holding record `id` inside `partition`.
pub fn record_pathname(partition: &str, id: &str) -> String {
    format!("{}/{}{}", partition, id, JSON_SUFFIX)
}

pub fn is_record_blob(pathname: &str) -> bool {
    pathname.ends_with(JSON_SUFFIX)
}

/// Final path segment of a blob pathname.
pub fn file_name(pathname: &str) -> &str {
    pathname.rsplit('/').next().unwrap_or(pathname)
}

/// Publish-state rule applied to normalized records before they are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Published records plus records awaiting review.
    PublishedOrInReview,
    PublishedOnly,
}

impl Visibility {
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::Gallery | Category::Normal => Visibility::PublishedOrInReview,
            Category::Featured | Category::Events => Visibility::PublishedOnly,
        }
    }

    pub fn admits(&self, record: &CanonicalRecord) -> bool {
        match self {
            Visibility::PublishedOrInReview => {
                record.published || record.status == Status::InReview
            }
            Visibility::PublishedOnly => record.published,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gallery_and_normal_share_partitions_with_legacy_folder() {
        assert_eq!(partitions_for(Category::Gallery), &["gallery", "normal"]);
        assert_eq!(partitions_for(Category::Normal), &["gallery", "normal"]);
        assert_eq!(partitions_for(Category::Featured), &["featured"]);
        assert_eq!(partitions_for(Category::Events), &["events"]);
    }

    #[test]
    fn writes_go_to_the_first_partition() {
        assert_eq!(primary_partition(Category::Normal), "gallery");
        assert_eq!(primary_partition(Category::Events), "events");
        assert_eq!(record_pathname("events", "abc"), "events/abc.json");
    }

    #[test]
    fn file_name_takes_last_segment() {
        assert_eq!(file_name("gallery/abc.json"), "abc.json");
        assert_eq!(file_name("abc.json"), "abc.json");
        assert!(is_record_blob("gallery/abc.json"));
        assert!(!is_record_blob("gallery/abc-icon.png"));
    }

    #[test]
    fn visibility_rules_per_category() {
        assert_eq!(
            Visibility::for_category(Category::Gallery),
            Visibility::PublishedOrInReview
        );
        assert_eq!(
            Visibility::for_category(Category::Featured),
            Visibility::PublishedOnly
        );
    }
}
