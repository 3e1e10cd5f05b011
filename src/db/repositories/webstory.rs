//! Webstory repository
//!
//! A webstory row and its slides are always written in one transaction.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{CreateWebstoryInput, ListParams, SlideInput, Webstory, WebstorySlide};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait WebstoryRepository: Send + Sync {
    async fn create(&self, input: &CreateWebstoryInput, sort_order: i64) -> Result<Webstory>;

    /// Webstory with its slides
    async fn get_by_id(&self, id: i64) -> Result<Option<Webstory>>;

    /// Persist fields. `slides`, when given, replaces every slide.
    async fn update(&self, webstory: &Webstory, slides: Option<&[SlideInput]>) -> Result<Webstory>;

    async fn soft_delete(&self, id: i64) -> Result<bool>;

    /// Non-removed webstories by position then featured first, slides included
    async fn list(&self, params: &ListParams) -> Result<(Vec<Webstory>, i64)>;
}

pub struct SqlxWebstoryRepository {
    pool: DynDatabasePool,
}

impl SqlxWebstoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn WebstoryRepository> {
        Arc::new(Self::new(pool))
    }
}

const WEBSTORY_COLUMNS: &str = "id, title, description, video_url, cover_image_url, is_featured, \
                                sort_order, removed, created_at, updated_at";

const INSERT_WEBSTORY: &str = r#"
    INSERT INTO webstories (title, description, video_url, cover_image_url, is_featured,
                            sort_order, removed, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_WEBSTORY: &str = r#"
    UPDATE webstories
    SET title = ?, description = ?, video_url = ?, cover_image_url = ?, is_featured = ?,
        updated_at = ?
    WHERE id = ?
"#;

const SOFT_DELETE_WEBSTORY: &str =
    "UPDATE webstories SET removed = ?, updated_at = ? WHERE id = ? AND removed = ?";

const INSERT_SLIDE: &str =
    "INSERT INTO webstory_slides (webstory_id, image_url, text, sort_order) VALUES (?, ?, ?, ?)";

const CLEAR_SLIDES: &str = "DELETE FROM webstory_slides WHERE webstory_id = ?";

const COUNT_WEBSTORIES: &str =
    "SELECT COUNT(*) AS count FROM webstories WHERE removed = ? AND LOWER(title) LIKE ? ESCAPE '!'";

fn select_where(clause: &str) -> String {
    format!("SELECT {} FROM webstories WHERE {}", WEBSTORY_COLUMNS, clause)
}

fn list_query() -> String {
    select_where(
        "removed = ? AND LOWER(title) LIKE ? ESCAPE '!' \
         ORDER BY sort_order ASC, is_featured DESC, id ASC LIMIT ? OFFSET ?",
    )
}

fn slides_query(count: usize) -> String {
    format!(
        "SELECT id, webstory_id, image_url, text, sort_order FROM webstory_slides \
         WHERE webstory_id IN ({}) ORDER BY sort_order ASC, id ASC",
        vec!["?"; count].join(", ")
    )
}

/// Slide positions: explicit order wins, otherwise the index in the list
fn slide_orders(slides: &[SlideInput]) -> impl Iterator<Item = (&SlideInput, i64)> {
    slides
        .iter()
        .enumerate()
        .map(|(i, slide)| (slide, slide.order.unwrap_or(i as i64)))
}

macro_rules! row_to_webstory {
    ($row:expr) => {
        Webstory {
            id: $row.get("id"),
            title: $row.get("title"),
            description: $row.get("description"),
            video_url: $row.get("video_url"),
            cover_image_url: $row.get("cover_image_url"),
            is_featured: $row.get("is_featured"),
            sort_order: $row.get("sort_order"),
            removed: $row.get("removed"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
            slides: Vec::new(),
        }
    };
}

macro_rules! row_to_slide {
    ($row:expr) => {
        WebstorySlide {
            id: $row.get("id"),
            webstory_id: $row.get("webstory_id"),
            image_url: $row.get("image_url"),
            text: $row.get("text"),
            sort_order: $row.get("sort_order"),
        }
    };
}

fn attach_slides(stories: &mut [Webstory], slides: Vec<WebstorySlide>) {
    let mut by_story: HashMap<i64, Vec<WebstorySlide>> = HashMap::new();
    for slide in slides {
        by_story.entry(slide.webstory_id).or_default().push(slide);
    }
    for story in stories {
        story.slides = by_story.remove(&story.id).unwrap_or_default();
    }
}

#[async_trait]
impl WebstoryRepository for SqlxWebstoryRepository {
    async fn create(&self, input: &CreateWebstoryInput, sort_order: i64) -> Result<Webstory> {
        let id = match self.pool.backend() {
            Backend::Sqlite(p) => create_webstory_sqlite(p, input, sort_order).await?,
            Backend::Mysql(p) => create_webstory_mysql(p, input, sort_order).await?,
        };
        self.get_by_id(id)
            .await?
            .context("Webstory not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Webstory>> {
        let sql = select_where("id = ?");
        let story = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get webstory")?
                .map(|row| row_to_webstory!(row)),
            Backend::Mysql(p) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get webstory")?
                .map(|row| row_to_webstory!(row)),
        };
        let Some(story) = story else {
            return Ok(None);
        };
        let mut stories = vec![story];
        self.load_slides(&mut stories).await?;
        Ok(stories.pop())
    }

    async fn update(&self, webstory: &Webstory, slides: Option<&[SlideInput]>) -> Result<Webstory> {
        match self.pool.backend() {
            Backend::Sqlite(p) => update_webstory_sqlite(p, webstory, slides).await?,
            Backend::Mysql(p) => update_webstory_mysql(p, webstory, slides).await?,
        }
        self.get_by_id(webstory.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Webstory not found after update"))
    }

    async fn soft_delete(&self, id: i64) -> Result<bool> {
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(SOFT_DELETE_WEBSTORY)
                .bind(true)
                .bind(now)
                .bind(id)
                .bind(false)
                .execute(p)
                .await
                .context("Failed to remove webstory")?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query(SOFT_DELETE_WEBSTORY)
                .bind(true)
                .bind(now)
                .bind(id)
                .bind(false)
                .execute(p)
                .await
                .context("Failed to remove webstory")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<Webstory>, i64)> {
        let pattern = params.like_pattern();
        let sql = list_query();
        let (mut stories, total) = match self.pool.backend() {
            Backend::Sqlite(p) => {
                let stories: Vec<Webstory> = sqlx::query(&sql)
                    .bind(false)
                    .bind(&pattern)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(p)
                    .await
                    .context("Failed to list webstories")?
                    .into_iter()
                    .map(|row| row_to_webstory!(row))
                    .collect();
                let total: i64 = sqlx::query(COUNT_WEBSTORIES)
                    .bind(false)
                    .bind(&pattern)
                    .fetch_one(p)
                    .await
                    .context("Failed to count webstories")?
                    .get("count");
                (stories, total)
            }
            Backend::Mysql(p) => {
                let stories: Vec<Webstory> = sqlx::query(&sql)
                    .bind(false)
                    .bind(&pattern)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(p)
                    .await
                    .context("Failed to list webstories")?
                    .into_iter()
                    .map(|row| row_to_webstory!(row))
                    .collect();
                let total: i64 = sqlx::query(COUNT_WEBSTORIES)
                    .bind(false)
                    .bind(&pattern)
                    .fetch_one(p)
                    .await
                    .context("Failed to count webstories")?
                    .get("count");
                (stories, total)
            }
        };
        self.load_slides(&mut stories).await?;
        Ok((stories, total))
    }
}

impl SqlxWebstoryRepository {
    async fn load_slides(&self, stories: &mut [Webstory]) -> Result<()> {
        if stories.is_empty() {
            return Ok(());
        }
        let sql = slides_query(stories.len());
        let slides: Vec<WebstorySlide> = match self.pool.backend() {
            Backend::Sqlite(p) => {
                let mut query = sqlx::query(&sql);
                for story in stories.iter() {
                    query = query.bind(story.id);
                }
                query
                    .fetch_all(p)
                    .await
                    .context("Failed to load slides")?
                    .into_iter()
                    .map(|row| row_to_slide!(row))
                    .collect()
            }
            Backend::Mysql(p) => {
                let mut query = sqlx::query(&sql);
                for story in stories.iter() {
                    query = query.bind(story.id);
                }
                query
                    .fetch_all(p)
                    .await
                    .context("Failed to load slides")?
                    .into_iter()
                    .map(|row| row_to_slide!(row))
                    .collect()
            }
        };
        attach_slides(stories, slides);
        Ok(())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_webstory_sqlite(
    pool: &SqlitePool,
    input: &CreateWebstoryInput,
    sort_order: i64,
) -> Result<i64> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;
    let id = sqlx::query(INSERT_WEBSTORY)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.video_url)
        .bind(&input.cover_image_url)
        .bind(input.is_featured)
        .bind(sort_order)
        .bind(false)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create webstory")?
        .last_insert_rowid();

    for (slide, order) in slide_orders(&input.slides) {
        sqlx::query(INSERT_SLIDE)
            .bind(id)
            .bind(&slide.image_url)
            .bind(&slide.text)
            .bind(order)
            .execute(&mut *tx)
            .await
            .context("Failed to create slide")?;
    }
    tx.commit().await.context("Failed to commit webstory")?;
    Ok(id)
}

async fn update_webstory_sqlite(
    pool: &SqlitePool,
    webstory: &Webstory,
    slides: Option<&[SlideInput]>,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query(UPDATE_WEBSTORY)
        .bind(&webstory.title)
        .bind(&webstory.description)
        .bind(&webstory.video_url)
        .bind(&webstory.cover_image_url)
        .bind(webstory.is_featured)
        .bind(Utc::now())
        .bind(webstory.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update webstory")?;

    if let Some(slides) = slides {
        sqlx::query(CLEAR_SLIDES)
            .bind(webstory.id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear slides")?;
        for (slide, order) in slide_orders(slides) {
            sqlx::query(INSERT_SLIDE)
                .bind(webstory.id)
                .bind(&slide.image_url)
                .bind(&slide.text)
                .bind(order)
                .execute(&mut *tx)
                .await
                .context("Failed to create slide")?;
        }
    }
    tx.commit().await.context("Failed to commit webstory update")?;
    Ok(())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_webstory_mysql(
    pool: &MySqlPool,
    input: &CreateWebstoryInput,
    sort_order: i64,
) -> Result<i64> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;
    let id = sqlx::query(INSERT_WEBSTORY)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.video_url)
        .bind(&input.cover_image_url)
        .bind(input.is_featured)
        .bind(sort_order)
        .bind(false)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create webstory")?
        .last_insert_id() as i64;

    for (slide, order) in slide_orders(&input.slides) {
        sqlx::query(INSERT_SLIDE)
            .bind(id)
            .bind(&slide.image_url)
            .bind(&slide.text)
            .bind(order)
            .execute(&mut *tx)
            .await
            .context("Failed to create slide")?;
    }
    tx.commit().await.context("Failed to commit webstory")?;
    Ok(id)
}

async fn update_webstory_mysql(
    pool: &MySqlPool,
    webstory: &Webstory,
    slides: Option<&[SlideInput]>,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query(UPDATE_WEBSTORY)
        .bind(&webstory.title)
        .bind(&webstory.description)
        .bind(&webstory.video_url)
        .bind(&webstory.cover_image_url)
        .bind(webstory.is_featured)
        .bind(Utc::now())
        .bind(webstory.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update webstory")?;

    if let Some(slides) = slides {
        sqlx::query(CLEAR_SLIDES)
            .bind(webstory.id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear slides")?;
        for (slide, order) in slide_orders(slides) {
            sqlx::query(INSERT_SLIDE)
                .bind(webstory.id)
                .bind(&slide.image_url)
                .bind(&slide.text)
                .bind(order)
                .execute(&mut *tx)
                .await
                .context("Failed to create slide")?;
        }
    }
    tx.commit().await.context("Failed to commit webstory update")?;
    Ok(())
}
