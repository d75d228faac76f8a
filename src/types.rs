//! Core types for the clipboard history.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque unique identifier for a history item.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        ItemId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId(s)
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        Timestamp(micros)
    }

    pub fn next(self) -> Self {
        Timestamp(self.0.saturating_add(1))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// SHA-256 fingerprint of item content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    pub fn of(content: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        ContentHash(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Content category assigned by the classifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Text,
    Url,
    Code,
    Image,
}

impl Category {
    pub const ALL: [Category; 4] = [Category::Text, Category::Url, Category::Code, Category::Image];

    /// Unit in which `size_metric` is expressed for this category.
    pub fn size_unit(self) -> &'static str {
        match self {
            Category::Image => "KB",
            Category::Text | Category::Url | Category::Code => "chars",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Text => "text",
            Category::Url => "url",
            Category::Code => "code",
            Category::Image => "image",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry in the history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Unique identifier (assigned by the store).
    pub id: ItemId,

    /// Raw content; images are embedded as `data:image/...` URLs.
    pub content: String,

    pub category: Category,

    /// When the item was committed or last promoted.
    pub created_at: Timestamp,

    #[serde(default)]
    pub is_favorite: bool,

    /// Char count, or KB for images.
    pub size_metric: u64,
}

impl Item {
    pub fn fingerprint(&self) -> ContentHash {
        ContentHash::of(&self.content)
    }
}

/// Input for committing new content (before id/timestamp are assigned).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemInput {
    pub content: String,

    /// Category override; classified from content when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,

    #[serde(default)]
    pub is_favorite: bool,
}

impl ItemInput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            category: None,
            is_favorite: false,
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn favorite(mut self) -> Self {
        self.is_favorite = true;
        self
    }
}

/// Point-in-time view of the history as seen by clients.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub items: Vec<Item>,
    /// Derived from `items`; persisted only as a cache.
    #[serde(default)]
    pub favorites: Vec<Item>,
}

impl HistorySnapshot {
    pub fn from_items(items: Vec<Item>) -> Self {
        let favorites = items.iter().filter(|i| i.is_favorite).cloned().collect();
        Self { items, favorites }
    }
}

/// Why content was refused admission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    TooLarge,
}

/// An admission rejection; no mutation happened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub reason: RejectReason,
    pub category: Category,
    pub measured: u64,
    pub limit: u64,
}

impl Rejection {
    pub fn too_large(category: Category, measured: u64, limit: u64) -> Self {
        Self {
            reason: RejectReason::TooLarge,
            category,
            measured,
            limit,
        }
    }

    /// Human-readable message for the `warning` event.
    pub fn message(&self) -> String {
        let unit = self.category.size_unit();
        format!(
            "{} content too large to save: {} {} exceeds the limit of {} {}",
            self.category, self.measured, unit, self.limit, unit
        )
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} too large ({} > {} {})",
            self.category,
            self.measured,
            self.limit,
            self.category.size_unit()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_serializes_camel_case() {
        let item = Item {
            id: ItemId::from("abc"),
            content: "hello".into(),
            category: Category::Text,
            created_at: Timestamp(42),
            is_favorite: true,
            size_metric: 5,
        };

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["id"], "abc");
        assert_eq!(value["category"], "text");
        assert_eq!(value["createdAt"], 42);
        assert_eq!(value["isFavorite"], true);
        assert_eq!(value["sizeMetric"], 5);
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        assert_ne!(ItemId::generate(), ItemId::generate());
    }

    #[test]
    fn test_content_hash_stable() {
        assert_eq!(ContentHash::of("abc"), ContentHash::of("abc"));
        assert_ne!(ContentHash::of("abc"), ContentHash::of("abd"));
        assert_eq!(ContentHash::of("abc").to_hex().len(), 64);
    }

    #[test]
    fn test_rejection_serialization() {
        let rejection = Rejection::too_large(Category::Image, 4096, 2048);
        let value = serde_json::to_value(&rejection).unwrap();
        assert_eq!(value["reason"], "too-large");
        assert_eq!(value["category"], "image");
        assert_eq!(value["measured"], 4096);
        assert!(rejection.message().contains("KB"));
    }

    #[test]
    fn test_snapshot_derives_favorites() {
        let mk = |id: &str, fav: bool| Item {
            id: ItemId::from(id),
            content: id.into(),
            category: Category::Text,
            created_at: Timestamp(1),
            is_favorite: fav,
            size_metric: 1,
        };
        let snapshot = HistorySnapshot::from_items(vec![mk("a", false), mk("b", true)]);
        assert_eq!(snapshot.favorites.len(), 1);
        assert_eq!(snapshot.favorites[0].id, ItemId::from("b"));
    }
}
