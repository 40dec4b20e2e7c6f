//! Item retrieval and listing.
//!
//! Shared by `newsroll get` / `newsroll list` / `newsroll summarize` and
//! the `/items` routes.

use anyhow::Result;
use newsroll_core::media::MediaStore;
use newsroll_core::models::Item;
use newsroll_core::store::Store;
use serde::Serialize;

use crate::app::App;

pub const PAGE_SIZE: i64 = 20;

/// Prefix a bare channel handle is expanded with by `check_link`.
pub const CHECK_LINK_PREFIX: &str = "https://t.me/";

/// An item plus the public URLs of its pictures.
#[derive(Debug, Clone, Serialize)]
pub struct ItemView {
    #[serde(flatten)]
    pub item: Item,
    pub picture_urls: Vec<String>,
}

impl ItemView {
    pub fn new(item: Item, media: &dyn MediaStore) -> Self {
        let picture_urls = item.pictures.iter().map(|p| media.url(p)).collect();
        Self { item, picture_urls }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemPage {
    pub data: Vec<ItemView>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub last_page: i64,
}

/// One page (1-based) of items, newest first.
pub async fn list_page(app: &App, page: i64) -> Result<ItemPage> {
    let page = page.max(1);
    let total = app.store.count_items().await?;
    let items = app
        .store
        .list_items((page - 1) * PAGE_SIZE, PAGE_SIZE)
        .await?;

    Ok(ItemPage {
        data: items
            .into_iter()
            .map(|i| ItemView::new(i, app.media.as_ref()))
            .collect(),
        page,
        per_page: PAGE_SIZE,
        total,
        last_page: ((total + PAGE_SIZE - 1) / PAGE_SIZE).max(1),
    })
}

/// Items whose link is exactly `https://t.me/<handle>` (zero or one).
pub async fn check_link(store: &dyn Store, handle: &str) -> Result<Vec<Item>> {
    let link = format!("{}{}", CHECK_LINK_PREFIX, handle.trim().trim_start_matches('/'));
    Ok(store.find_by_link(&link).await?.into_iter().collect())
}

/// CLI entry point for `newsroll get`.
pub async fn run_get(app: &App, id: &str) -> Result<()> {
    let item = app.engine.get(id).await?;
    let view = ItemView::new(item, app.media.as_ref());
    let item = &view.item;

    println!("--- Item ---");
    println!("id:             {}", item.id);
    println!("link:           {}", item.link);
    println!("target_id:      {}", item.target_id);
    if let Some(c) = item.classification {
        println!("classification: {}", c);
    }
    println!("score:          {}", item.score);
    if !item.tag_ids.is_empty() {
        let tags: Vec<&str> = item.tag_ids.iter().map(String::as_str).collect();
        println!("tags:           {}", tags.join(", "));
    }
    if let Some(t) = item.captured_at {
        println!("captured_at:    {}", t.to_rfc3339());
    }
    println!("created_at:     {}", item.created_at.to_rfc3339());
    println!("updated_at:     {}", item.updated_at.to_rfc3339());
    println!();

    println!("--- Content ---");
    println!("{}", item.content_text.as_deref().unwrap_or("(empty)"));
    println!();

    if let Some(summary) = &item.summary {
        println!("--- Summary ---");
        println!("{}", summary);
        println!();
    }

    println!("--- Pictures ({}) ---", view.picture_urls.len());
    for url in &view.picture_urls {
        println!("{}", url);
    }

    Ok(())
}

/// CLI entry point for `newsroll summarize`.
pub async fn run_summarize(app: &App, id: &str, max_chars: Option<usize>) -> Result<()> {
    match app.cases.summarize_item(id, max_chars).await? {
        Some(summary) => println!("{}", summary),
        None => println!("(no summary produced)"),
    }
    Ok(())
}

/// CLI entry point for `newsroll list`.
pub async fn run_list(app: &App, page: i64) -> Result<()> {
    let page = list_page(app, page).await?;

    println!("page {} of {} ({} items)", page.page, page.last_page, page.total);
    for view in &page.data {
        let item = &view.item;
        let preview: String = item
            .content_text
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(60)
            .collect();
        println!(
            "{}  score={:<3} {}  {}",
            item.id,
            item.score,
            item.link,
            preview.replace('\n', " ")
        );
    }
    Ok(())
}
