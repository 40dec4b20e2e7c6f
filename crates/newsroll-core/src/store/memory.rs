//! In-memory [`Store`] implementation for tests.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Insertion order is tracked explicitly so "newest first" and
//! "first match" behave like the SQLite store.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{Case, CaseStatus, Item, Target};
use crate::normalize::normalize_content;

use super::Store;

#[derive(Default)]
struct State {
    targets: HashMap<String, Target>,
    items: Vec<Item>,
    tags: HashMap<String, BTreeSet<String>>,
    cases: Vec<Case>,
    case_items: HashMap<String, Vec<String>>,
}

impl State {
    fn with_tags(&self, item: &Item) -> Item {
        let mut item = item.clone();
        item.tag_ids = self.tags.get(&item.id).cloned().unwrap_or_default();
        item
    }
}

/// In-memory store for testing.
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    pub fn item_count(&self) -> usize {
        self.state.read().unwrap().items.len()
    }

    pub fn target_by_link(&self, link: &str) -> Option<Target> {
        self.state.read().unwrap().targets.get(link).cloned()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_or_create_target(&self, candidate: Target) -> Result<Target> {
        let mut state = self.state.write().unwrap();
        let target = state
            .targets
            .entry(candidate.link.clone())
            .or_insert(candidate);
        Ok(target.clone())
    }

    async fn update_target(&self, target: &Target) -> Result<()> {
        let mut state = self.state.write().unwrap();
        match state.targets.get_mut(&target.link) {
            Some(existing) => {
                *existing = target.clone();
                Ok(())
            }
            None => bail!("target not found: {}", target.link),
        }
    }

    async fn get_item(&self, id: &str) -> Result<Option<Item>> {
        let state = self.state.read().unwrap();
        Ok(state
            .items
            .iter()
            .find(|i| i.id == id)
            .map(|i| state.with_tags(i)))
    }

    async fn find_by_link(&self, link: &str) -> Result<Option<Item>> {
        let state = self.state.read().unwrap();
        Ok(state
            .items
            .iter()
            .find(|i| i.link == link)
            .map(|i| state.with_tags(i)))
    }

    async fn find_by_normalized_content(&self, normalized: &str) -> Result<Option<Item>> {
        let state = self.state.read().unwrap();
        Ok(state
            .items
            .iter()
            .find(|i| normalize_content(i.content_text.as_deref()).as_deref() == Some(normalized))
            .map(|i| state.with_tags(i)))
    }

    async fn insert_item(&self, item: &Item) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.items.iter().any(|i| i.link == item.link) {
            bail!("UNIQUE constraint failed: items.link ({})", item.link);
        }
        let mut stored = item.clone();
        stored.tag_ids.clear();
        state.items.push(stored);
        Ok(())
    }

    async fn update_item(&self, item: &Item) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state
            .items
            .iter()
            .any(|i| i.link == item.link && i.id != item.id)
        {
            bail!("UNIQUE constraint failed: items.link ({})", item.link);
        }
        match state.items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => {
                *existing = item.clone();
                existing.tag_ids.clear();
                Ok(())
            }
            None => bail!("item not found: {}", item.id),
        }
    }

    async fn delete_item(&self, id: &str) -> Result<bool> {
        let mut state = self.state.write().unwrap();
        let before = state.items.len();
        state.items.retain(|i| i.id != id);
        state.tags.remove(id);
        for ids in state.case_items.values_mut() {
            ids.retain(|i| i != id);
        }
        Ok(state.items.len() != before)
    }

    async fn list_items(&self, offset: i64, limit: i64) -> Result<Vec<Item>> {
        let state = self.state.read().unwrap();
        Ok(state
            .items
            .iter()
            .rev()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|i| state.with_tags(i))
            .collect())
    }

    async fn count_items(&self) -> Result<i64> {
        Ok(self.state.read().unwrap().items.len() as i64)
    }

    async fn pictures_in_use(
        &self,
        paths: &[String],
        except_item: &str,
    ) -> Result<BTreeSet<String>> {
        let state = self.state.read().unwrap();
        Ok(paths
            .iter()
            .filter(|p| {
                state
                    .items
                    .iter()
                    .any(|i| i.id != except_item && i.pictures.contains(p))
            })
            .cloned()
            .collect())
    }

    async fn sync_tags(&self, item_id: &str, tag_ids: &BTreeSet<String>) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if tag_ids.is_empty() {
            state.tags.remove(item_id);
        } else {
            state.tags.insert(item_id.to_string(), tag_ids.clone());
        }
        Ok(())
    }

    async fn insert_case(&self, case: &Case) -> Result<()> {
        self.state.write().unwrap().cases.push(case.clone());
        Ok(())
    }

    async fn get_case(&self, id: &str) -> Result<Option<Case>> {
        let state = self.state.read().unwrap();
        Ok(state.cases.iter().find(|c| c.id == id).cloned())
    }

    async fn update_case(&self, case: &Case) -> Result<()> {
        let mut state = self.state.write().unwrap();
        match state.cases.iter_mut().find(|c| c.id == case.id) {
            Some(existing) => {
                *existing = case.clone();
                Ok(())
            }
            None => bail!("case not found: {}", case.id),
        }
    }

    async fn list_cases(&self, status: Option<CaseStatus>) -> Result<Vec<Case>> {
        let state = self.state.read().unwrap();
        Ok(state
            .cases
            .iter()
            .rev()
            .filter(|c| status.is_none_or(|s| c.status == s))
            .cloned()
            .collect())
    }

    async fn sync_case_items(&self, case_id: &str, item_ids: &[String]) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let mut ordered: Vec<String> = Vec::with_capacity(item_ids.len());
        for id in item_ids {
            if !ordered.contains(id) {
                ordered.push(id.clone());
            }
        }
        state.case_items.insert(case_id.to_string(), ordered);
        Ok(())
    }

    async fn case_items(&self, case_id: &str) -> Result<Vec<Item>> {
        let state = self.state.read().unwrap();
        let ids = match state.case_items.get(case_id) {
            Some(ids) => ids,
            None => return Ok(Vec::new()),
        };
        Ok(ids
            .iter()
            .filter_map(|id| state.items.iter().find(|i| &i.id == id))
            .map(|i| state.with_tags(i))
            .collect())
    }
}
