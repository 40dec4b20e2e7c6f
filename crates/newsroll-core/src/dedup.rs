//! Ingestion and deduplication engine.
//!
//! Given a validated [`NewItem`], [`DedupEngine::ingest`] resolves the
//! item's target and decides exactly one outcome against the stored item
//! set. The decision table is evaluated in order, first match wins:
//!
//! | Condition | Outcome |
//! |-----------|---------|
//! | Same link exists, normalized content equal (incoming non-empty) | [`Outcome::SkippedDuplicate`] |
//! | Same link exists, content differs | [`Outcome::Updated`] |
//! | Other link exists with equal normalized content | [`Outcome::SkippedContentDuplicate`] |
//! | Otherwise | [`Outcome::Created`] |
//!
//! Skipped submissions have their unreferenced pictures removed from the
//! media store. Media cleanup is best-effort; persistence failures abort
//! the ingestion with [`Error::Unexpected`]. Partial writes are not rolled
//! back here; the store's own constraints (unique link) are the only
//! guard against concurrent creates of the same link.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, FieldError, Result};
use crate::media::{delete_orphans, MediaStore};
use crate::models::{IngestResult, Item, ItemPatch, NewItem, Outcome, Target, UNNAMED_TARGET};
use crate::normalize::normalize_content;
use crate::scoring::{KeywordDictionary, KeywordScorer};
use crate::store::Store;

pub struct DedupEngine<S: ?Sized, M: ?Sized, D> {
    store: Arc<S>,
    media: Arc<M>,
    scorer: Arc<KeywordScorer<D>>,
}

impl<S: ?Sized, M: ?Sized, D> Clone for DedupEngine<S, M, D> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            media: self.media.clone(),
            scorer: self.scorer.clone(),
        }
    }
}

impl<S, M, D> DedupEngine<S, M, D>
where
    S: Store + ?Sized,
    M: MediaStore + ?Sized,
    D: KeywordDictionary,
{
    pub fn new(store: Arc<S>, media: Arc<M>, scorer: Arc<KeywordScorer<D>>) -> Self {
        Self {
            store,
            media,
            scorer,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Ingest one item.
    pub async fn ingest(&self, incoming: NewItem) -> Result<IngestResult> {
        let target = self.resolve_target(&incoming).await?;
        let classification = target.classification.or(incoming.classification);

        let norm_incoming = normalize_content(incoming.content_text.as_deref());
        let incoming_pics = incoming.pictures.clone().unwrap_or_default();

        if let Some(existing) = self.store.find_by_link(&incoming.link).await? {
            let norm_existing = normalize_content(existing.content_text.as_deref());

            if norm_incoming.is_some() && norm_incoming == norm_existing {
                delete_orphans(&*self.media, &incoming_pics, &existing.pictures).await;
                info!(link = %existing.link, id = %existing.id, "duplicate; skipped");
                return Ok(IngestResult {
                    outcome: Outcome::SkippedDuplicate,
                    item: existing,
                });
            }

            let item = self
                .apply_update(existing, incoming, target.id, classification)
                .await?;
            info!(link = %item.link, id = %item.id, score = item.score, "item updated");
            return Ok(IngestResult {
                outcome: Outcome::Updated,
                item,
            });
        }

        if let Some(norm) = norm_incoming.as_deref() {
            if let Some(original) = self.store.find_by_normalized_content(norm).await? {
                delete_orphans(&*self.media, &incoming_pics, &original.pictures).await;
                info!(
                    link = %incoming.link,
                    original_link = %original.link,
                    "content already stored under another link; skipped"
                );
                return Ok(IngestResult {
                    outcome: Outcome::SkippedContentDuplicate,
                    item: original,
                });
            }
        }

        let item = self.create(incoming, target.id, classification).await?;
        info!(link = %item.link, id = %item.id, score = item.score, "item created");
        Ok(IngestResult {
            outcome: Outcome::Created,
            item,
        })
    }

    /// Get-or-create the target, then apply the forward-only crawl time
    /// and name refresh.
    async fn resolve_target(&self, incoming: &NewItem) -> Result<Target> {
        let candidate = Target {
            id: Uuid::new_v4().to_string(),
            link: incoming.target_link.clone(),
            name: incoming
                .target_name
                .clone()
                .unwrap_or_else(|| UNNAMED_TARGET.to_string()),
            classification: None,
            last_crawl_time: incoming.captured_at,
        };
        let candidate_id = candidate.id.clone();

        let mut target = self.store.get_or_create_target(candidate).await?;
        if target.id == candidate_id {
            debug!(link = %target.link, "target created");
            return Ok(target);
        }

        if target.observe(incoming.target_name.as_deref(), incoming.captured_at) {
            self.store.update_target(&target).await?;
        }
        Ok(target)
    }

    async fn apply_update(
        &self,
        existing: Item,
        incoming: NewItem,
        target_id: String,
        classification: Option<i32>,
    ) -> Result<Item> {
        let old_pictures = existing.pictures.clone();
        let replaces_pictures = incoming.pictures.is_some();

        let mut item = existing;
        item.link = incoming.link;
        item.target_id = target_id;
        item.classification = classification;
        if let Some(text) = incoming.content_text {
            item.content_text = Some(text);
        }
        if let Some(pics) = incoming.pictures {
            item.pictures = pics;
        }
        if let Some(t) = incoming.captured_at {
            item.captured_at = Some(t);
        }
        if let Some(bot) = incoming.source_bot {
            item.source_bot = Some(bot);
        }
        if let Some(user) = incoming.source_user {
            item.source_user = Some(user);
        }

        let item = self.rescore_and_save(item).await?;

        if replaces_pictures {
            self.release_pictures(&item.id, &old_pictures, &item.pictures).await;
        }
        Ok(item)
    }

    async fn create(
        &self,
        incoming: NewItem,
        target_id: String,
        classification: Option<i32>,
    ) -> Result<Item> {
        let scored = self.scorer.score(incoming.content_text.as_deref());
        let now = Utc::now();

        let mut item = Item {
            id: Uuid::new_v4().to_string(),
            link: incoming.link,
            content_text: incoming.content_text,
            pictures: incoming.pictures.unwrap_or_default(),
            classification,
            score: scored.score,
            tag_ids: Default::default(),
            target_id,
            source_bot: incoming.source_bot,
            source_user: incoming.source_user,
            captured_at: incoming.captured_at,
            summary: None,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_item(&item).await?;
        self.store.sync_tags(&item.id, &scored.tag_ids).await?;
        item.tag_ids = scored.tag_ids;
        Ok(item)
    }

    /// Recompute score and tags from the item's current content and persist.
    async fn rescore_and_save(&self, mut item: Item) -> Result<Item> {
        let scored = self.scorer.score(item.content_text.as_deref());
        item.score = scored.score;
        item.updated_at = Utc::now();

        self.store.update_item(&item).await?;
        self.store.sync_tags(&item.id, &scored.tag_ids).await?;
        item.tag_ids = scored.tag_ids;
        Ok(item)
    }

    pub async fn get(&self, id: &str) -> Result<Item> {
        self.store
            .get_item(id)
            .await?
            .ok_or_else(|| Error::not_found("item", id))
    }

    /// Direct edit of a stored item. No deduplication; score and tags are
    /// recomputed, and pictures dropped by the edit are removed from media.
    pub async fn edit(&self, id: &str, patch: ItemPatch) -> Result<Item> {
        let existing = self.get(id).await?;

        if patch.link != existing.link {
            if let Some(other) = self.store.find_by_link(&patch.link).await? {
                if other.id != existing.id {
                    return Err(Error::Validation {
                        errors: vec![FieldError::new("link", "link has already been taken")],
                    });
                }
            }
        }

        let old_pictures = existing.pictures.clone();
        let replaces_pictures = patch.pictures.is_some();

        let mut item = existing;
        item.link = patch.link;
        item.content_text = patch.content_text.or(item.content_text);
        if let Some(pics) = patch.pictures {
            item.pictures = pics;
        }
        item.classification = patch.classification.or(item.classification);
        item.captured_at = patch.captured_at.or(item.captured_at);
        item.source_bot = patch.source_bot.or(item.source_bot);
        item.source_user = patch.source_user.or(item.source_user);

        let item = self.rescore_and_save(item).await?;
        if replaces_pictures {
            self.release_pictures(&item.id, &old_pictures, &item.pictures).await;
        }
        Ok(item)
    }

    /// Delete an item and, best-effort, its pictures.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let item = self.get(id).await?;
        if !self.store.delete_item(id).await? {
            return Err(Error::not_found("item", id));
        }
        self.release_pictures(&item.id, &item.pictures, &[]).await;
        info!(id = %id, link = %item.link, "item deleted");
        Ok(())
    }

    /// Delete pictures `item_id` let go of, except those in `kept` or
    /// still listed by another item. Nothing is deleted when the
    /// reference check itself fails.
    async fn release_pictures(&self, item_id: &str, released: &[String], kept: &[String]) {
        let shared = match self.store.pictures_in_use(released, item_id).await {
            Ok(shared) => shared,
            Err(e) => {
                warn!(id = %item_id, err = %e, "picture reference check failed; media kept");
                return;
            }
        };
        let mut keep = kept.to_vec();
        keep.extend(shared);
        delete_orphans(&*self.media, released, &keep).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::InMemoryMediaStore;
    use crate::scoring::{KeywordRule, KeywordTable};
    use crate::store::memory::InMemoryStore;
    use chrono::TimeZone;

    type Engine = DedupEngine<InMemoryStore, InMemoryMediaStore, KeywordTable>;

    fn engine() -> (Engine, Arc<InMemoryStore>, Arc<InMemoryMediaStore>) {
        let store = Arc::new(InMemoryStore::new());
        let media = Arc::new(InMemoryMediaStore::new());
        let scorer = Arc::new(KeywordScorer::new(KeywordTable::new(vec![
            KeywordRule::new("hello", "greeting", 2),
            KeywordRule::new("flood", "disaster", 7),
            KeywordRule::new("storm", "disaster", 3),
        ])));
        (
            DedupEngine::new(store.clone(), media.clone(), scorer),
            store,
            media,
        )
    }

    fn payload(link: &str, content: Option<&str>, pics: &[&str]) -> NewItem {
        NewItem {
            link: link.to_string(),
            content_text: content.map(str::to_string),
            pictures: if pics.is_empty() {
                None
            } else {
                Some(pics.iter().map(|p| p.to_string()).collect())
            },
            classification: None,
            captured_at: None,
            target_link: "https://t.me/target1".to_string(),
            target_name: None,
            source_bot: None,
            source_user: None,
        }
    }

    async fn upload(media: &InMemoryMediaStore, paths: &[&str]) {
        for p in paths {
            media.put(p, b"bytes").await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_create_then_skip_duplicate() {
        let (engine, store, _) = engine();
        let p = payload("https://t.me/x", Some("Hello world"), &[]);

        let first = engine.ingest(p.clone()).await.unwrap();
        assert_eq!(first.outcome, Outcome::Created);
        assert_eq!(first.item.score, 2);

        let target = store.target_by_link("https://t.me/target1").unwrap();
        assert_eq!(target.last_crawl_time, None);
        assert_eq!(target.name, UNNAMED_TARGET);

        let second = engine.ingest(p).await.unwrap();
        assert_eq!(second.outcome, Outcome::SkippedDuplicate);
        assert_eq!(second.item.id, first.item.id);
        assert_eq!(second.item.score, first.item.score);
        assert_eq!(second.item.tag_ids, first.item.tag_ids);
        assert_eq!(store.item_count(), 1);
    }

    #[tokio::test]
    async fn test_markup_and_case_do_not_defeat_dedup() {
        let (engine, store, _) = engine();
        engine
            .ingest(payload("https://t.me/x", Some("Hello world"), &[]))
            .await
            .unwrap();
        let r = engine
            .ingest(payload("https://t.me/x", Some("  <p>HELLO WORLD</p> "), &[]))
            .await
            .unwrap();
        assert_eq!(r.outcome, Outcome::SkippedDuplicate);
        assert_eq!(store.item_count(), 1);
    }

    #[tokio::test]
    async fn test_skip_duplicate_deletes_unreferenced_pictures() {
        let (engine, _, media) = engine();
        upload(&media, &["a.webp", "b.webp", "c.webp"]).await;

        engine
            .ingest(payload("https://t.me/x", Some("Hello"), &["a.webp"]))
            .await
            .unwrap();
        let r = engine
            .ingest(payload("https://t.me/x", Some("hello"), &["a.webp", "b.webp", "c.webp"]))
            .await
            .unwrap();

        assert_eq!(r.outcome, Outcome::SkippedDuplicate);
        assert_eq!(r.item.pictures, vec!["a.webp".to_string()]);
        assert_eq!(media.paths(), vec!["a.webp".to_string()]);
    }

    #[tokio::test]
    async fn test_changed_content_updates_and_rescores() {
        let (engine, store, _) = engine();
        let first = engine
            .ingest(payload("https://t.me/x", Some("flood and storm"), &[]))
            .await
            .unwrap();
        assert_eq!(first.item.score, 10);
        assert!(first.item.tag_ids.contains("disaster"));

        let r = engine
            .ingest(payload("https://t.me/x", Some("hello there"), &[]))
            .await
            .unwrap();
        assert_eq!(r.outcome, Outcome::Updated);
        assert_eq!(r.item.id, first.item.id);
        assert_eq!(r.item.score, 2);
        assert_eq!(
            r.item.tag_ids.iter().collect::<Vec<_>>(),
            vec!["greeting"]
        );

        let stored = store.get_item(&first.item.id).await.unwrap().unwrap();
        assert_eq!(stored.content_text.as_deref(), Some("hello there"));
        assert_eq!(stored.score, 2);
        assert_eq!(stored.tag_ids, r.item.tag_ids);
        assert_eq!(store.item_count(), 1);
    }

    #[tokio::test]
    async fn test_update_clears_tags_when_nothing_matches() {
        let (engine, store, _) = engine();
        let first = engine
            .ingest(payload("https://t.me/x", Some("flood"), &[]))
            .await
            .unwrap();
        engine
            .ingest(payload("https://t.me/x", Some("quiet day"), &[]))
            .await
            .unwrap();
        let stored = store.get_item(&first.item.id).await.unwrap().unwrap();
        assert_eq!(stored.score, 0);
        assert!(stored.tag_ids.is_empty());
    }

    #[tokio::test]
    async fn test_empty_content_on_existing_link_updates() {
        let (engine, _, _) = engine();
        engine
            .ingest(payload("https://t.me/x", None, &[]))
            .await
            .unwrap();
        let r = engine
            .ingest(payload("https://t.me/x", None, &[]))
            .await
            .unwrap();
        assert_eq!(r.outcome, Outcome::Updated);
    }

    #[tokio::test]
    async fn test_update_removes_pictures_dropped_from_record() {
        let (engine, _, media) = engine();
        upload(&media, &["old.webp", "keep.webp", "new.webp"]).await;
        engine
            .ingest(payload("https://t.me/x", Some("v1"), &["old.webp", "keep.webp"]))
            .await
            .unwrap();
        let r = engine
            .ingest(payload("https://t.me/x", Some("v2"), &["keep.webp", "new.webp"]))
            .await
            .unwrap();
        assert_eq!(r.outcome, Outcome::Updated);
        assert_eq!(
            media.paths(),
            vec!["keep.webp".to_string(), "new.webp".to_string()]
        );
    }

    #[tokio::test]
    async fn test_same_content_other_link_is_content_duplicate() {
        let (engine, store, media) = engine();
        upload(&media, &["a.webp", "b.webp"]).await;

        let a = engine
            .ingest(payload("https://t.me/a", Some("Storm warning"), &["a.webp"]))
            .await
            .unwrap();
        let b = engine
            .ingest(payload("https://t.me/b", Some("storm WARNING"), &["a.webp", "b.webp"]))
            .await
            .unwrap();

        assert_eq!(b.outcome, Outcome::SkippedContentDuplicate);
        assert_eq!(b.item.id, a.item.id);
        assert_eq!(store.item_count(), 1);
        assert!(store.find_by_link("https://t.me/b").await.unwrap().is_none());
        // Pictures the kept record references survive; the rest are orphans.
        assert_eq!(media.paths(), vec!["a.webp".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_content_never_matches_by_content() {
        let (engine, store, _) = engine();
        engine
            .ingest(payload("https://t.me/a", Some("   "), &[]))
            .await
            .unwrap();
        let r = engine
            .ingest(payload("https://t.me/b", Some(""), &[]))
            .await
            .unwrap();
        assert_eq!(r.outcome, Outcome::Created);
        assert_eq!(store.item_count(), 2);
    }

    #[tokio::test]
    async fn test_target_crawl_time_never_decreases() {
        let (engine, store, _) = engine();
        let t1 = Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 5, 2, 8, 0, 0).unwrap();

        let mut p = payload("https://t.me/x/1", Some("one"), &[]);
        p.captured_at = Some(t2);
        engine.ingest(p).await.unwrap();

        let mut p = payload("https://t.me/x/2", Some("two"), &[]);
        p.captured_at = Some(t1);
        p.target_name = Some("Channel X".to_string());
        engine.ingest(p).await.unwrap();

        let target = store.target_by_link("https://t.me/target1").unwrap();
        assert_eq!(target.last_crawl_time, Some(t2));
        assert_eq!(target.name, "Channel X");
    }

    #[tokio::test]
    async fn test_target_classification_overrides_incoming() {
        let (engine, store, _) = engine();
        let mut target = Target {
            id: "t-fixed".to_string(),
            link: "https://t.me/target1".to_string(),
            name: "T".to_string(),
            classification: Some(3),
            last_crawl_time: None,
        };
        target = store.get_or_create_target(target).await.unwrap();

        let mut p = payload("https://t.me/x", Some("text"), &[]);
        p.classification = Some(9);
        let r = engine.ingest(p).await.unwrap();
        assert_eq!(r.item.classification, Some(3));
        assert_eq!(r.item.target_id, target.id);
    }

    #[tokio::test]
    async fn test_edit_rejects_taken_link() {
        let (engine, _, _) = engine();
        engine
            .ingest(payload("https://t.me/a", Some("one"), &[]))
            .await
            .unwrap();
        let b = engine
            .ingest(payload("https://t.me/b", Some("two"), &[]))
            .await
            .unwrap();

        let patch = ItemPatch {
            link: "https://t.me/a".to_string(),
            content_text: None,
            pictures: None,
            classification: None,
            captured_at: None,
            source_bot: None,
            source_user: None,
        };
        let err = engine.edit(&b.item.id, patch).await.unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[tokio::test]
    async fn test_remove_deletes_record_and_pictures() {
        let (engine, store, media) = engine();
        upload(&media, &["a.webp"]).await;
        let r = engine
            .ingest(payload("https://t.me/a", Some("one"), &["a.webp"]))
            .await
            .unwrap();

        engine.remove(&r.item.id).await.unwrap();
        assert_eq!(store.item_count(), 0);
        assert!(media.paths().is_empty());

        let err = engine.remove(&r.item.id).await.unwrap_err();
        assert_eq!(err.kind(), "NotFoundError");
    }

    #[tokio::test]
    async fn test_remove_keeps_pictures_other_items_share() {
        let (engine, store, media) = engine();
        upload(&media, &["shared.webp", "own.webp"]).await;
        let a = engine
            .ingest(payload("https://t.me/a", Some("alpha"), &["shared.webp", "own.webp"]))
            .await
            .unwrap();
        let b = engine
            .ingest(payload("https://t.me/b", Some("beta"), &["shared.webp"]))
            .await
            .unwrap();

        engine.remove(&a.item.id).await.unwrap();
        assert_eq!(media.paths(), vec!["shared.webp".to_string()]);
        let b = store.get_item(&b.item.id).await.unwrap().unwrap();
        assert_eq!(b.pictures, vec!["shared.webp".to_string()]);
    }

    #[tokio::test]
    async fn test_update_and_edit_keep_pictures_other_items_share() {
        let (engine, _, media) = engine();
        upload(&media, &["shared.webp", "x.webp"]).await;
        engine
            .ingest(payload("https://t.me/a", Some("alpha"), &["shared.webp"]))
            .await
            .unwrap();
        let b = engine
            .ingest(payload("https://t.me/b", Some("beta"), &["shared.webp"]))
            .await
            .unwrap();

        let r = engine
            .ingest(payload("https://t.me/b", Some("beta v2"), &["x.webp"]))
            .await
            .unwrap();
        assert_eq!(r.outcome, Outcome::Updated);
        assert!(media.contains("shared.webp"));

        let patch = ItemPatch {
            link: "https://t.me/b".to_string(),
            content_text: None,
            pictures: Some(vec!["shared.webp".to_string()]),
            classification: None,
            captured_at: None,
            source_bot: None,
            source_user: None,
        };
        engine.edit(&b.item.id, patch).await.unwrap();
        assert!(media.contains("shared.webp"));
        assert!(!media.contains("x.webp"));
    }
}
