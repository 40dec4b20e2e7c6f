//! SQLite implementation of the [`Store`] trait.
//!
//! Items carry a `content_hash` column (SHA-256 of the normalized
//! content) so content-duplicate lookups hit an index instead of scanning
//! every row. Pictures are stored as a JSON array, timestamps as Unix
//! seconds.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use newsroll_core::models::{Case, CaseStatus, Item, Target};
use newsroll_core::normalize::{content_hash, normalize_content};
use newsroll_core::store::Store;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const ITEM_COLUMNS: &str = "items.id, items.link, items.content_text, items.pictures_json, \
     items.classification, items.score, items.target_id, items.source_bot, items.source_user, \
     items.captured_at, items.summary, items.created_at, items.updated_at";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn load_tags(&self, item_id: &str) -> Result<BTreeSet<String>> {
        let tags: Vec<String> =
            sqlx::query_scalar("SELECT tag_id FROM item_tags WHERE item_id = ? ORDER BY tag_id")
                .bind(item_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(tags.into_iter().collect())
    }

    async fn hydrate(&self, row: &SqliteRow) -> Result<Item> {
        let mut item = row_to_item(row)?;
        item.tag_ids = self.load_tags(&item.id).await?;
        Ok(item)
    }

    async fn hydrate_all(&self, rows: &[SqliteRow]) -> Result<Vec<Item>> {
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(self.hydrate(row).await?);
        }
        Ok(items)
    }
}

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn row_to_item(row: &SqliteRow) -> Result<Item> {
    let pictures_json: String = row.get("pictures_json");
    let pictures: Vec<String> =
        serde_json::from_str(&pictures_json).context("invalid pictures_json column")?;
    let score: i64 = row.get("score");

    Ok(Item {
        id: row.get("id"),
        link: row.get("link"),
        content_text: row.get("content_text"),
        pictures,
        classification: row.get("classification"),
        score: u32::try_from(score.max(0)).unwrap_or(u32::MAX),
        tag_ids: BTreeSet::new(),
        target_id: row.get("target_id"),
        source_bot: row.get("source_bot"),
        source_user: row.get("source_user"),
        captured_at: row.get::<Option<i64>, _>("captured_at").map(ts),
        summary: row.get("summary"),
        created_at: ts(row.get("created_at")),
        updated_at: ts(row.get("updated_at")),
    })
}

fn row_to_target(row: &SqliteRow) -> Target {
    Target {
        id: row.get("id"),
        link: row.get("link"),
        name: row.get("name"),
        classification: row.get("classification"),
        last_crawl_time: row.get::<Option<i64>, _>("last_crawl_time").map(ts),
    }
}

fn row_to_case(row: &SqliteRow) -> Result<Case> {
    let status: String = row.get("status");
    Ok(Case {
        id: row.get("id"),
        name: row.get("name"),
        owner: row.get("owner"),
        status: CaseStatus::parse(&status)
            .with_context(|| format!("unknown case status: {}", status))?,
        summary: row.get("summary"),
        created_at: ts(row.get("created_at")),
    })
}

fn item_hash(item: &Item) -> Option<String> {
    normalize_content(item.content_text.as_deref()).map(|n| content_hash(&n))
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_or_create_target(&self, candidate: Target) -> Result<Target> {
        sqlx::query(
            "INSERT INTO targets (id, link, name, classification, last_crawl_time) \
             VALUES (?, ?, ?, ?, ?) ON CONFLICT(link) DO NOTHING",
        )
        .bind(&candidate.id)
        .bind(&candidate.link)
        .bind(&candidate.name)
        .bind(candidate.classification)
        .bind(candidate.last_crawl_time.map(|t| t.timestamp()))
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT id, link, name, classification, last_crawl_time FROM targets WHERE link = ?",
        )
        .bind(&candidate.link)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_target(&row))
    }

    async fn update_target(&self, target: &Target) -> Result<()> {
        sqlx::query(
            "UPDATE targets SET name = ?, classification = ?, last_crawl_time = ? WHERE id = ?",
        )
        .bind(&target.name)
        .bind(target.classification)
        .bind(target.last_crawl_time.map(|t| t.timestamp()))
        .bind(&target.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_item(&self, id: &str) -> Result<Option<Item>> {
        let row = sqlx::query(&format!("SELECT {} FROM items WHERE id = ?", ITEM_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_link(&self, link: &str) -> Result<Option<Item>> {
        let row = sqlx::query(&format!("SELECT {} FROM items WHERE link = ?", ITEM_COLUMNS))
            .bind(link)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_normalized_content(&self, normalized: &str) -> Result<Option<Item>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM items WHERE content_hash = ? ORDER BY rowid ASC",
            ITEM_COLUMNS
        ))
        .bind(content_hash(normalized))
        .fetch_all(&self.pool)
        .await?;

        for row in &rows {
            let item = row_to_item(row)?;
            if normalize_content(item.content_text.as_deref()).as_deref() == Some(normalized) {
                return Ok(Some(self.hydrate(row).await?));
            }
        }
        Ok(None)
    }

    async fn insert_item(&self, item: &Item) -> Result<()> {
        sqlx::query(
            "INSERT INTO items (id, link, content_text, content_hash, pictures_json, \
             classification, score, target_id, source_bot, source_user, captured_at, summary, \
             created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.id)
        .bind(&item.link)
        .bind(&item.content_text)
        .bind(item_hash(item))
        .bind(serde_json::to_string(&item.pictures)?)
        .bind(item.classification)
        .bind(i64::from(item.score))
        .bind(&item.target_id)
        .bind(&item.source_bot)
        .bind(&item.source_user)
        .bind(item.captured_at.map(|t| t.timestamp()))
        .bind(&item.summary)
        .bind(item.created_at.timestamp())
        .bind(item.updated_at.timestamp())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert item {}", item.link))?;
        Ok(())
    }

    async fn update_item(&self, item: &Item) -> Result<()> {
        sqlx::query(
            "UPDATE items SET link = ?, content_text = ?, content_hash = ?, pictures_json = ?, \
             classification = ?, score = ?, target_id = ?, source_bot = ?, source_user = ?, \
             captured_at = ?, summary = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&item.link)
        .bind(&item.content_text)
        .bind(item_hash(item))
        .bind(serde_json::to_string(&item.pictures)?)
        .bind(item.classification)
        .bind(i64::from(item.score))
        .bind(&item.target_id)
        .bind(&item.source_bot)
        .bind(&item.source_user)
        .bind(item.captured_at.map(|t| t.timestamp()))
        .bind(&item.summary)
        .bind(item.updated_at.timestamp())
        .bind(&item.id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to update item {}", item.id))?;
        Ok(())
    }

    async fn delete_item(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM item_tags WHERE item_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM case_items WHERE item_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_items(&self, offset: i64, limit: i64) -> Result<Vec<Item>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM items ORDER BY items.created_at DESC, items.rowid DESC LIMIT ? OFFSET ?",
            ITEM_COLUMNS
        ))
        .bind(limit.max(0))
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await?;
        self.hydrate_all(&rows).await
    }

    async fn count_items(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn pictures_in_use(
        &self,
        paths: &[String],
        except_item: &str,
    ) -> Result<BTreeSet<String>> {
        let mut in_use = BTreeSet::new();
        for path in paths {
            let found: Option<i64> = sqlx::query_scalar(
                "SELECT 1 FROM items, json_each(items.pictures_json) AS pic \
                 WHERE items.id != ? AND pic.value = ? LIMIT 1",
            )
            .bind(except_item)
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
            if found.is_some() {
                in_use.insert(path.clone());
            }
        }
        Ok(in_use)
    }

    async fn sync_tags(&self, item_id: &str, tag_ids: &BTreeSet<String>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM item_tags WHERE item_id = ?")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        for tag in tag_ids {
            sqlx::query("INSERT OR IGNORE INTO tags (id) VALUES (?)")
                .bind(tag)
                .execute(&mut *tx)
                .await?;
            sqlx::query("INSERT INTO item_tags (item_id, tag_id) VALUES (?, ?)")
                .bind(item_id)
                .bind(tag)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn insert_case(&self, case: &Case) -> Result<()> {
        sqlx::query(
            "INSERT INTO cases (id, name, owner, status, summary, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&case.id)
        .bind(&case.name)
        .bind(&case.owner)
        .bind(case.status.as_str())
        .bind(&case.summary)
        .bind(case.created_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_case(&self, id: &str) -> Result<Option<Case>> {
        let row = sqlx::query(
            "SELECT id, name, owner, status, summary, created_at FROM cases WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_case).transpose()
    }

    async fn update_case(&self, case: &Case) -> Result<()> {
        sqlx::query("UPDATE cases SET name = ?, owner = ?, status = ?, summary = ? WHERE id = ?")
            .bind(&case.name)
            .bind(&case.owner)
            .bind(case.status.as_str())
            .bind(&case.summary)
            .bind(&case.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_cases(&self, status: Option<CaseStatus>) -> Result<Vec<Case>> {
        let rows = match status {
            Some(s) => {
                sqlx::query(
                    "SELECT id, name, owner, status, summary, created_at FROM cases \
                     WHERE status = ? ORDER BY created_at DESC, rowid DESC",
                )
                .bind(s.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, name, owner, status, summary, created_at FROM cases \
                     ORDER BY created_at DESC, rowid DESC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(row_to_case).collect()
    }

    async fn sync_case_items(&self, case_id: &str, item_ids: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM case_items WHERE case_id = ?")
            .bind(case_id)
            .execute(&mut *tx)
            .await?;
        for (position, item_id) in item_ids.iter().enumerate() {
            sqlx::query(
                "INSERT OR IGNORE INTO case_items (case_id, item_id, position) VALUES (?, ?, ?)",
            )
            .bind(case_id)
            .bind(item_id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn case_items(&self, case_id: &str) -> Result<Vec<Item>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM items JOIN case_items ON case_items.item_id = items.id \
             WHERE case_items.case_id = ? ORDER BY case_items.position ASC",
            ITEM_COLUMNS
        ))
        .bind(case_id)
        .fetch_all(&self.pool)
        .await?;
        self.hydrate_all(&rows).await
    }
}
