//! Case workflow: create, promote, summarize, list.
//!
//! A case starts [`CaseStatus::Open`]. Promotion replaces its item set
//! and marks it [`CaseStatus::Promoted`]; only promoted cases are
//! summarized into rollups and reported on. Visibility is decided by an
//! explicit [`Role`] passed with every listing.
//!
//! Single items can be summarized ahead of time with
//! [`CaseBook::summarize_item`]; a stored item summary then stands in
//! for the item's full text in every case summary that includes it.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, FieldError, Result};
use crate::models::{Case, CaseStatus, Item, Role};
use crate::store::Store;
use crate::summarize::{Summarizer, SummaryItem, TextBackend};

/// Length limit for item summaries when the caller gives none.
pub const ITEM_SUMMARY_MAX_CHARS: usize = 100;

pub struct CaseBook<S: ?Sized, B: ?Sized> {
    store: Arc<S>,
    summarizer: Arc<Summarizer<B>>,
}

impl<S: ?Sized, B: ?Sized> Clone for CaseBook<S, B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            summarizer: self.summarizer.clone(),
        }
    }
}

impl<S, B> CaseBook<S, B>
where
    S: Store + ?Sized,
    B: TextBackend + ?Sized,
{
    pub fn new(store: Arc<S>, summarizer: Arc<Summarizer<B>>) -> Self {
        Self { store, summarizer }
    }

    pub async fn create_case(&self, name: &str, owner: Option<&str>) -> Result<Case> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation {
                errors: vec![FieldError::new("name", "The name field is required.")],
            });
        }

        let case = Case {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            owner: owner.map(str::trim).filter(|o| !o.is_empty()).map(str::to_string),
            status: CaseStatus::Open,
            summary: None,
            created_at: Utc::now(),
        };
        self.store.insert_case(&case).await?;
        info!(id = %case.id, name = %case.name, "case created");
        Ok(case)
    }

    pub async fn get_case(&self, id: &str) -> Result<Case> {
        self.store
            .get_case(id)
            .await?
            .ok_or_else(|| Error::not_found("case", id))
    }

    /// Replace the case's items with `item_ids` and mark it promoted.
    pub async fn promote_case(&self, case_id: &str, item_ids: &[String]) -> Result<Case> {
        let mut case = self.get_case(case_id).await?;

        for id in item_ids {
            if self.store.get_item(id).await?.is_none() {
                return Err(Error::not_found("item", id));
            }
        }

        self.store.sync_case_items(&case.id, item_ids).await?;
        case.status = CaseStatus::Promoted;
        self.store.update_case(&case).await?;
        info!(id = %case.id, items = item_ids.len(), "case promoted");
        Ok(case)
    }

    pub async fn case_items(&self, case_id: &str) -> Result<Vec<Item>> {
        let case = self.get_case(case_id).await?;
        Ok(self.store.case_items(&case.id).await?)
    }

    /// Summarize the case's items and store the result.
    ///
    /// Returns `None` (and leaves any earlier summary untouched) when the
    /// case has no items or the summarizer produced nothing.
    pub async fn summarize_case(
        &self,
        case_id: &str,
        max_chars: Option<usize>,
    ) -> Result<Option<String>> {
        let mut case = self.get_case(case_id).await?;
        let items = self.store.case_items(&case.id).await?;
        if items.is_empty() {
            info!(id = %case.id, "case has no items; nothing to summarize");
            return Ok(None);
        }

        let inputs: Vec<SummaryItem> = items.iter().map(SummaryItem::from).collect();
        let summary = self.summarizer.summarize(&inputs, max_chars, None).await;

        if let Some(text) = &summary {
            case.summary = Some(text.clone());
            self.store.update_case(&case).await?;
            info!(id = %case.id, chars = text.chars().count(), "case summary stored");
        }
        Ok(summary)
    }

    /// Summarize one item's own content and store it as the item summary.
    ///
    /// `max_chars` of `None` or `0` means [`ITEM_SUMMARY_MAX_CHARS`]. An
    /// item without text is left alone and the backend is not called.
    pub async fn summarize_item(
        &self,
        item_id: &str,
        max_chars: Option<usize>,
    ) -> Result<Option<String>> {
        let mut item = self
            .store
            .get_item(item_id)
            .await?
            .ok_or_else(|| Error::not_found("item", item_id))?;

        let text = item.content_text.as_deref().map(str::trim).unwrap_or("");
        if text.is_empty() {
            debug!(id = %item.id, "item has no text; nothing to summarize");
            return Ok(None);
        }

        let input = SummaryItem {
            text: Some(text.to_string()),
            summary: None,
            pictures: item.pictures.clone(),
        };
        let limit = max_chars
            .filter(|&n| n > 0)
            .unwrap_or(ITEM_SUMMARY_MAX_CHARS);
        let summary = self.summarizer.summarize(&[input], Some(limit), None).await;

        if let Some(text) = &summary {
            item.summary = Some(text.clone());
            item.updated_at = Utc::now();
            self.store.update_item(&item).await?;
            info!(id = %item.id, chars = text.chars().count(), "item summary stored");
        }
        Ok(summary)
    }

    /// Cases visible to `role`, newest first.
    pub async fn list_cases(&self, role: &Role, status: Option<CaseStatus>) -> Result<Vec<Case>> {
        let cases = self.store.list_cases(status).await?;
        Ok(cases
            .into_iter()
            .filter(|c| role.can_view(c.owner.as_deref()))
            .collect())
    }

    /// Promoted cases among `case_ids` created within `[from, to]` (whole
    /// days, UTC), newest first. Empty `case_ids` selects every promoted case.
    pub async fn cases_for_report(
        &self,
        case_ids: &[String],
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Case>> {
        let start = from.and_then(|d| d.and_hms_opt(0, 0, 0)).map(|d| d.and_utc());
        let end = to.and_then(|d| d.and_hms_opt(23, 59, 59)).map(|d| d.and_utc());
        let within = |t: DateTime<Utc>| start.is_none_or(|s| t >= s) && end.is_none_or(|e| t <= e);

        let mut cases: Vec<Case> = self
            .store
            .list_cases(Some(CaseStatus::Promoted))
            .await?
            .into_iter()
            .filter(|c| case_ids.is_empty() || case_ids.contains(&c.id))
            .filter(|c| within(c.created_at))
            .collect();
        cases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(cases)
    }
}
