//! Core data models for newsroll.
//!
//! These types represent the items, targets, and cases that flow through
//! ingestion, deduplication, and summarization, plus the typed request
//! payloads that replace free-form key/value arrays at the API boundary.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, FieldError, Result};

/// Maximum length of an item link or target link, in characters.
pub const MAX_LINK_LEN: usize = 150;

/// Display name given to a target created without one.
pub const UNNAMED_TARGET: &str = "(Không có tên)";

/// An ingested content record (article, post, media capture).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub id: String,
    pub link: String,
    pub content_text: Option<String>,
    /// Media paths in display order.
    pub pictures: Vec<String>,
    pub classification: Option<i32>,
    pub score: u32,
    pub tag_ids: BTreeSet<String>,
    pub target_id: String,
    pub source_bot: Option<String>,
    pub source_user: Option<String>,
    pub captured_at: Option<DateTime<Utc>>,
    /// Prior summary of this item, preferred over `content_text` when summarizing.
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A tracked subject whose link is monitored for new items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    pub id: String,
    pub link: String,
    pub name: String,
    pub classification: Option<i32>,
    pub last_crawl_time: Option<DateTime<Utc>>,
}

impl Target {
    /// Apply a new observation to the target.
    ///
    /// `name` replaces the display name whenever supplied. `crawl_time`
    /// only moves `last_crawl_time` forward. Returns `true` if anything
    /// changed.
    pub fn observe(&mut self, name: Option<&str>, crawl_time: Option<DateTime<Utc>>) -> bool {
        let mut changed = false;

        if let Some(name) = name {
            if self.name != name {
                self.name = name.to_string();
                changed = true;
            }
        }

        if let Some(t) = crawl_time {
            let later = match self.last_crawl_time {
                Some(current) => t > current,
                None => true,
            };
            if later {
                self.last_crawl_time = Some(t);
                changed = true;
            }
        }

        changed
    }
}

/// Lifecycle state of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    /// Still collecting items.
    Open,
    /// Items promoted into the rollup; eligible for summaries and reports.
    Promoted,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Open => "open",
            CaseStatus::Promoted => "promoted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(CaseStatus::Open),
            "promoted" => Some(CaseStatus::Promoted),
            _ => None,
        }
    }
}

/// A user-curated grouping of items, later summarized into a rollup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Case {
    pub id: String,
    pub name: String,
    pub owner: Option<String>,
    pub status: CaseStatus,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Who is asking. Passed explicitly into every case query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Admin,
    Member { user: String },
}

impl Role {
    /// Whether this role may see a case owned by `owner`.
    pub fn can_view(&self, owner: Option<&str>) -> bool {
        match self {
            Role::Admin => true,
            Role::Member { user } => owner == Some(user.as_str()),
        }
    }
}

/// The four ingestion outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    SkippedDuplicate,
    Updated,
    SkippedContentDuplicate,
    Created,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::SkippedDuplicate => "skipped-duplicate",
            Outcome::Updated => "updated",
            Outcome::SkippedContentDuplicate => "skipped-content-duplicate",
            Outcome::Created => "created",
        }
    }

    /// HTTP-style status for the outcome.
    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Created => 201,
            _ => 200,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Outcome::SkippedDuplicate => "Link already exists with identical content; skipped.",
            Outcome::Updated => "Link already exists with different content; updated.",
            Outcome::SkippedContentDuplicate => {
                "Content already exists under another link; skipped."
            }
            Outcome::Created => "Item created.",
        }
    }
}

/// Result of one ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResult {
    pub outcome: Outcome,
    pub item: Item,
}

/// Raw ingestion payload as sent by bots and API clients.
///
/// Every field is optional at the type level so that validation can
/// report all missing or malformed fields at once. The aliases accept
/// the field names older bots still send.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default, alias = "contents_text")]
    pub content_text: Option<String>,
    #[serde(default, alias = "pic")]
    pub pictures: Option<Vec<String>>,
    #[serde(default, alias = "phanloai")]
    pub classification: Option<i32>,
    #[serde(default, alias = "time")]
    pub captured_at: Option<String>,
    #[serde(default, alias = "link_muc_tieu")]
    pub target_link: Option<String>,
    #[serde(default, alias = "ten_muc_tieu")]
    pub target_name: Option<String>,
    #[serde(default, alias = "id_bot", deserialize_with = "deserialize_ref")]
    pub source_bot: Option<String>,
    #[serde(default, alias = "id_user", deserialize_with = "deserialize_ref")]
    pub source_user: Option<String>,
}

/// A validated ingestion payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewItem {
    pub link: String,
    pub content_text: Option<String>,
    /// `None` when the payload carried no picture list at all.
    pub pictures: Option<Vec<String>>,
    pub classification: Option<i32>,
    pub captured_at: Option<DateTime<Utc>>,
    pub target_link: String,
    pub target_name: Option<String>,
    pub source_bot: Option<String>,
    pub source_user: Option<String>,
}

/// A validated direct edit of an existing item (no deduplication).
#[derive(Debug, Clone, PartialEq)]
pub struct ItemPatch {
    pub link: String,
    pub content_text: Option<String>,
    pub pictures: Option<Vec<String>>,
    pub classification: Option<i32>,
    pub captured_at: Option<DateTime<Utc>>,
    pub source_bot: Option<String>,
    pub source_user: Option<String>,
}

impl IngestRequest {
    /// Validate an ingestion payload.
    pub fn validate(self) -> Result<NewItem> {
        let mut errors = Vec::new();

        let link = required_link(&mut errors, "link", self.link);
        let target_link = required_link(&mut errors, "target_link", self.target_link);
        let captured_at = parse_optional_time(&mut errors, self.captured_at.as_deref());

        if !errors.is_empty() {
            return Err(Error::Validation { errors });
        }

        Ok(NewItem {
            link,
            content_text: self.content_text,
            pictures: self.pictures,
            classification: self.classification,
            captured_at,
            target_link,
            target_name: self.target_name.filter(|n| !n.trim().is_empty()),
            source_bot: self.source_bot,
            source_user: self.source_user,
        })
    }

    /// Validate the payload as a direct edit; `target_link` is not required.
    pub fn validate_patch(self) -> Result<ItemPatch> {
        let mut errors = Vec::new();

        let link = required_link(&mut errors, "link", self.link);
        let captured_at = parse_optional_time(&mut errors, self.captured_at.as_deref());

        if !errors.is_empty() {
            return Err(Error::Validation { errors });
        }

        Ok(ItemPatch {
            link,
            content_text: self.content_text,
            pictures: self.pictures,
            classification: self.classification,
            captured_at,
            source_bot: self.source_bot,
            source_user: self.source_user,
        })
    }
}

fn required_link(errors: &mut Vec<FieldError>, field: &str, value: Option<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => {
            if v.chars().count() > MAX_LINK_LEN {
                errors.push(FieldError::new(
                    field,
                    format!("{} must not exceed {} characters", field, MAX_LINK_LEN),
                ));
            }
            v
        }
        _ => {
            errors.push(FieldError::new(field, format!("{} is required", field)));
            String::new()
        }
    }
}

fn parse_optional_time(errors: &mut Vec<FieldError>, raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match parse_timestamp(raw) {
        Some(t) => Some(t),
        None => {
            errors.push(FieldError::new(
                "captured_at",
                "captured_at must be a valid datetime (YYYY-MM-DD HH:MM:SS)",
            ));
            None
        }
    }
}

/// Parse `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD`, or RFC 3339 into UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Provenance references arrive as strings or integers depending on the bot.
fn deserialize_ref<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawRef {
        Text(String),
        Number(i64),
    }

    Ok(
        Option::<RawRef>::deserialize(deserializer)?.map(|r| match r {
            RawRef::Text(s) => s,
            RawRef::Number(n) => n.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn target() -> Target {
        Target {
            id: "t1".to_string(),
            link: "https://t.me/target1".to_string(),
            name: "Target".to_string(),
            classification: None,
            last_crawl_time: None,
        }
    }

    #[test]
    fn test_crawl_time_only_moves_forward() {
        let t1 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();

        let mut t = target();
        assert!(t.observe(None, Some(t2)));
        assert!(!t.observe(None, Some(t1)));
        assert_eq!(t.last_crawl_time, Some(t2));
    }

    #[test]
    fn test_name_refreshes_regardless_of_time() {
        let t2 = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let mut t = target();
        t.observe(None, Some(t2));
        assert!(t.observe(Some("Renamed"), Some(t1)));
        assert_eq!(t.name, "Renamed");
        assert_eq!(t.last_crawl_time, Some(t2));
    }

    #[test]
    fn test_validate_reports_every_missing_field() {
        let err = IngestRequest::default().validate().unwrap_err();
        match err {
            Error::Validation { errors } => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["link", "target_link"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_long_link() {
        let req = IngestRequest {
            link: Some(format!("https://t.me/{}", "x".repeat(150))),
            target_link: Some("https://t.me/target1".to_string()),
            ..Default::default()
        };
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("must not exceed 150"));
    }

    #[test]
    fn test_validate_rejects_bad_time() {
        let req = IngestRequest {
            link: Some("https://t.me/x".to_string()),
            target_link: Some("https://t.me/target1".to_string()),
            captured_at: Some("yesterday".to_string()),
            ..Default::default()
        };
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("captured_at"));
    }

    #[test]
    fn test_legacy_field_names_deserialize() {
        let json = serde_json::json!({
            "link": "https://t.me/x/1",
            "contents_text": "Hello",
            "pic": ["uploads/a.webp"],
            "phanloai": 2,
            "time": "2025-03-04 05:06:07",
            "link_muc_tieu": "https://t.me/x",
            "ten_muc_tieu": "X channel",
            "id_bot": 7
        });
        let req: IngestRequest = serde_json::from_value(json).unwrap();
        let item = req.validate().unwrap();
        assert_eq!(item.content_text.as_deref(), Some("Hello"));
        assert_eq!(item.pictures, Some(vec!["uploads/a.webp".to_string()]));
        assert_eq!(item.classification, Some(2));
        assert_eq!(item.source_bot.as_deref(), Some("7"));
        assert_eq!(
            item.captured_at,
            Some(Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap())
        );
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2025-03-04T05:06:07Z").is_some());
        assert!(parse_timestamp("2025-03-04 05:06:07").is_some());
        assert!(parse_timestamp("2025-03-04").is_some());
        assert!(parse_timestamp("04/03/2025").is_none());
    }

    #[test]
    fn test_member_role_sees_only_own_cases() {
        let member = Role::Member {
            user: "alice".to_string(),
        };
        assert!(member.can_view(Some("alice")));
        assert!(!member.can_view(Some("bob")));
        assert!(!member.can_view(None));
        assert!(Role::Admin.can_view(None));
    }
}
