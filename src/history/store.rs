//! The bounded, deduplicated history store.

use crate::classify::{classify, size_metric};
use crate::config::{Settings, SettingsProvider};
use crate::error::{HistoryError, Result};
use crate::types::{Category, HistorySnapshot, Item, ItemId, ItemInput, Rejection, Timestamp};
use parking_lot::RwLock;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Per-category item counts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub total: usize,
    pub favorites: usize,
    pub text: usize,
    pub url: usize,
    pub code: usize,
    pub image: usize,
}

/// Mutable state guarded by the store lock.
#[derive(Default)]
struct HistoryState {
    /// Newest first.
    items: VecDeque<Item>,
    /// Last timestamp handed out; keeps `created_at` monotonic.
    last_stamp: Timestamp,
}

impl HistoryState {
    fn next_stamp(&mut self) -> Timestamp {
        let now = Timestamp::now();
        let stamp = if now > self.last_stamp {
            now
        } else {
            self.last_stamp.next()
        };
        self.last_stamp = stamp;
        stamp
    }

    fn position(&self, id: &ItemId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == id)
    }

    /// Drop items from the tail until the cap holds. Returns how many went.
    fn evict_to(&mut self, max: usize) -> usize {
        let mut evicted = 0;
        while self.items.len() > max {
            self.items.pop_back();
            evicted += 1;
        }
        evicted
    }
}

/// Owns the ordered item collection.
///
/// Every operation takes the write lock once and releases it before
/// returning, so mutations never interleave. Callers only ever receive
/// clones of items.
pub struct HistoryStore {
    state: RwLock<HistoryState>,
    settings: SettingsProvider,
}

impl HistoryStore {
    /// Create an empty store that reads its limits from `settings`.
    pub fn new(settings: SettingsProvider) -> Self {
        Self {
            state: RwLock::new(HistoryState::default()),
            settings,
        }
    }

    pub fn settings(&self) -> &SettingsProvider {
        &self.settings
    }

    // --- Mutations ---

    /// Commit content at the head of the history.
    ///
    /// Any existing item with identical content is replaced by a fresh record
    /// (new id, new timestamp, favorite only if `input` asks for it). Oversize
    /// content is rejected without touching the collection.
    pub fn insert_or_promote(&self, input: ItemInput) -> Result<Item> {
        let settings = self.settings.current();
        let category = input.category.unwrap_or_else(|| classify(&input.content));
        let metric = size_metric(&input.content, category);
        check_admission(&settings, category, metric)?;

        let mut state = self.state.write();

        let existing = state.items.iter().position(|i| i.content == input.content);
        let promoted = match existing {
            Some(pos) => {
                state.items.remove(pos);
                true
            }
            None => false,
        };

        let item = Item {
            id: ItemId::generate(),
            content: input.content,
            category,
            created_at: state.next_stamp(),
            is_favorite: input.is_favorite,
            size_metric: metric,
        };
        state.items.push_front(item.clone());
        let evicted = state.evict_to(settings.max_history_size);

        if settings.verbose_logging {
            debug!(
                id = %item.id,
                category = %item.category,
                promoted,
                evicted,
                "committed history item"
            );
        }

        Ok(item)
    }

    /// Flip the favorite flag of an item.
    pub fn toggle_favorite(&self, id: &ItemId) -> Result<Item> {
        let mut state = self.state.write();
        let item = state
            .items
            .iter_mut()
            .find(|item| &item.id == id)
            .ok_or_else(|| HistoryError::ItemNotFound(id.clone()))?;
        item.is_favorite = !item.is_favorite;
        Ok(item.clone())
    }

    /// Remove an item. Returns whether anything was removed.
    pub fn delete(&self, id: &ItemId) -> bool {
        let mut state = self.state.write();
        match state.position(id) {
            Some(pos) => {
                state.items.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Remove every listed item. Unknown ids are ignored.
    pub fn delete_many(&self, ids: &[ItemId]) -> usize {
        let targets: HashSet<&ItemId> = ids.iter().collect();
        let mut state = self.state.write();
        let before = state.items.len();
        state.items.retain(|item| !targets.contains(&item.id));
        before - state.items.len()
    }

    /// Reposition an item at the head and refresh its timestamp.
    pub fn move_to_top(&self, id: &ItemId) -> Result<Item> {
        let mut state = self.state.write();
        let pos = state
            .position(id)
            .ok_or_else(|| HistoryError::ItemNotFound(id.clone()))?;
        let mut item = state
            .items
            .remove(pos)
            .ok_or_else(|| HistoryError::ItemNotFound(id.clone()))?;
        item.created_at = state.next_stamp();
        state.items.push_front(item.clone());
        Ok(item)
    }

    /// Remove everything. Returns how many items were dropped.
    pub fn clear(&self) -> usize {
        let mut state = self.state.write();
        let count = state.items.len();
        state.items.clear();
        count
    }

    /// Re-apply the size cap, e.g. after `maxHistorySize` shrank.
    pub fn enforce_limit(&self) -> usize {
        let max = self.settings.current().max_history_size;
        self.state.write().evict_to(max)
    }

    /// Replace the collection with a persisted one.
    ///
    /// The record is normalised on the way in: sorted newest first, duplicate
    /// contents and ids dropped, and truncated to the cap.
    pub fn restore(&self, snapshot: HistorySnapshot) -> usize {
        let max = self.settings.current().max_history_size;
        let mut items = snapshot.items;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut contents = HashSet::new();
        let mut ids = HashSet::new();
        items.retain(|item| contents.insert(item.content.clone()) && ids.insert(item.id.clone()));
        items.truncate(max);

        let mut state = self.state.write();
        let newest = items.first().map(|i| i.created_at).unwrap_or_default();
        state.last_stamp = state.last_stamp.max(newest);
        state.items = items.into();
        state.items.len()
    }

    /// Merge exported items into the history.
    ///
    /// Contents already present are skipped, oversize items are skipped, and
    /// colliding ids are re-issued. Returns how many imported items survived
    /// the size cap.
    pub fn import(&self, items: Vec<Item>) -> usize {
        let settings = self.settings.current();
        let mut state = self.state.write();

        let mut contents: HashSet<String> =
            state.items.iter().map(|i| i.content.clone()).collect();
        let mut ids: HashSet<ItemId> = state.items.iter().map(|i| i.id.clone()).collect();
        let mut imported_ids = HashSet::new();

        let mut merged: Vec<Item> = state.items.drain(..).collect();
        for mut item in items {
            let metric = size_metric(&item.content, item.category);
            if check_admission(&settings, item.category, metric).is_err() {
                continue;
            }
            if !contents.insert(item.content.clone()) {
                continue;
            }
            if !ids.insert(item.id.clone()) {
                item.id = ItemId::generate();
                ids.insert(item.id.clone());
            }
            item.size_metric = metric;
            imported_ids.insert(item.id.clone());
            merged.push(item);
        }

        // Stable sort keeps existing items ahead of imports with equal stamps.
        merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        merged.truncate(settings.max_history_size);

        let newest = merged.first().map(|i| i.created_at).unwrap_or_default();
        state.last_stamp = state.last_stamp.max(newest);
        let survived = merged.iter().filter(|i| imported_ids.contains(&i.id)).count();
        state.items = merged.into();
        survived
    }

    // --- Queries ---

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot::from_items(self.items())
    }

    /// All items, newest first.
    pub fn items(&self) -> Vec<Item> {
        self.state.read().items.iter().cloned().collect()
    }

    pub fn favorites(&self) -> Vec<Item> {
        self.state
            .read()
            .items
            .iter()
            .filter(|i| i.is_favorite)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &ItemId) -> Option<Item> {
        self.state.read().items.iter().find(|i| &i.id == id).cloned()
    }

    /// The most recent item.
    pub fn head(&self) -> Option<Item> {
        self.state.read().items.front().cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> HistoryStats {
        let state = self.state.read();
        let mut stats = HistoryStats {
            total: state.items.len(),
            ..Default::default()
        };
        for item in &state.items {
            if item.is_favorite {
                stats.favorites += 1;
            }
            match item.category {
                Category::Text => stats.text += 1,
                Category::Url => stats.url += 1,
                Category::Code => stats.code += 1,
                Category::Image => stats.image += 1,
            }
        }
        stats
    }
}

/// Size-limit check performed before any mutation.
pub fn check_admission(
    settings: &Settings,
    category: Category,
    metric: u64,
) -> std::result::Result<(), Rejection> {
    let limit = match category {
        Category::Image => settings.max_image_size_kb,
        Category::Text | Category::Url | Category::Code => settings.max_content_length,
    };
    if metric > limit {
        return Err(Rejection::too_large(category, metric, limit));
    }
    Ok(())
}
