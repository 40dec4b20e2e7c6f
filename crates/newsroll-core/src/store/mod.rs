//! Storage abstraction for newsroll.
//!
//! The [`Store`] trait is the repository interface the ingestion engine,
//! the case workflow, and the HTTP layer depend on. It replaces implicit
//! ORM relationships with explicit lookups (`find_by_link`,
//! `find_by_normalized_content`, `sync_tags`, ...), so the engine runs
//! unchanged against SQLite in production and [`memory::InMemoryStore`]
//! in tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::collections::BTreeSet;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Case, CaseStatus, Item, Target};

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_or_create_target`](Store::get_or_create_target) | Resolve a target by link, inserting `candidate` if absent |
/// | [`find_by_link`](Store::find_by_link) | Exact link lookup |
/// | [`find_by_normalized_content`](Store::find_by_normalized_content) | Content-duplicate lookup |
/// | [`sync_tags`](Store::sync_tags) | Replace an item's tag set |
/// | [`pictures_in_use`](Store::pictures_in_use) | Shared-media check before deleting pictures |
/// | [`sync_case_items`](Store::sync_case_items) | Replace a case's item set |
#[async_trait]
pub trait Store: Send + Sync {
    /// Return the target whose link equals `candidate.link`, or insert
    /// `candidate` and return it. Must be atomic with respect to the link.
    async fn get_or_create_target(&self, candidate: Target) -> Result<Target>;

    async fn update_target(&self, target: &Target) -> Result<()>;

    async fn get_item(&self, id: &str) -> Result<Option<Item>>;

    async fn find_by_link(&self, link: &str) -> Result<Option<Item>>;

    /// First item whose normalized content (see
    /// [`normalize_content`](crate::normalize::normalize_content)) equals
    /// `normalized`.
    async fn find_by_normalized_content(&self, normalized: &str) -> Result<Option<Item>>;

    /// Insert a new item. `item.tag_ids` is ignored; use [`sync_tags`](Store::sync_tags).
    async fn insert_item(&self, item: &Item) -> Result<()>;

    /// Overwrite an item's fields. `item.tag_ids` is ignored.
    async fn update_item(&self, item: &Item) -> Result<()>;

    /// Returns `false` when no item had this id.
    async fn delete_item(&self, id: &str) -> Result<bool>;

    /// Items newest first.
    async fn list_items(&self, offset: i64, limit: i64) -> Result<Vec<Item>>;

    async fn count_items(&self) -> Result<i64>;

    /// The subset of `paths` that some item other than `except_item`
    /// still lists among its pictures.
    async fn pictures_in_use(
        &self,
        paths: &[String],
        except_item: &str,
    ) -> Result<BTreeSet<String>>;

    /// Replace (not merge) the item's tag associations.
    async fn sync_tags(&self, item_id: &str, tag_ids: &BTreeSet<String>) -> Result<()>;

    async fn insert_case(&self, case: &Case) -> Result<()>;

    async fn get_case(&self, id: &str) -> Result<Option<Case>>;

    async fn update_case(&self, case: &Case) -> Result<()>;

    /// Cases newest first, optionally filtered by status.
    async fn list_cases(&self, status: Option<CaseStatus>) -> Result<Vec<Case>>;

    /// Replace the case's item set, keeping the given order.
    async fn sync_case_items(&self, case_id: &str, item_ids: &[String]) -> Result<()>;

    /// Items of a case in the order they were attached.
    async fn case_items(&self, case_id: &str) -> Result<Vec<Item>>;
}
