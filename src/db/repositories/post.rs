//! Post repository
//!
//! Posts and their tag links are written together in one transaction.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{CreatePostInput, ListParams, Post, PostStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post and link its tags
    async fn create(&self, input: &CreatePostInput, author_id: i64) -> Result<Post>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Any row with this slug, removed ones included
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>>;

    /// Persist fields. `tag_ids`, when given, replaces the tag set.
    async fn update(&self, post: &Post, tag_ids: Option<&[i64]>) -> Result<Post>;

    /// Set status `removed` and the removed flag
    async fn soft_delete(&self, id: i64) -> Result<bool>;

    /// Non-removed posts, newest first, filtered by title
    async fn list(&self, params: &ListParams) -> Result<(Vec<Post>, i64)>;

    /// Newest featured posts
    async fn featured(&self, limit: i64) -> Result<Vec<Post>>;

    /// Bump the view counter. Returns false when no row matched.
    async fn increment_views(&self, id: i64) -> Result<bool>;
}

pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

const POST_COLUMNS: &str = "id, title, content, status, author_id, category_id, parent_id, \
                            thumbnail_url, slug, summary, is_featured, views, removed, \
                            created_at, updated_at";

const INSERT_POST: &str = r#"
    INSERT INTO posts (title, content, status, author_id, category_id, parent_id, thumbnail_url,
                       slug, summary, is_featured, views, removed, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)
"#;

const UPDATE_POST: &str = r#"
    UPDATE posts
    SET title = ?, content = ?, status = ?, category_id = ?, parent_id = ?, thumbnail_url = ?,
        slug = ?, summary = ?, is_featured = ?, updated_at = ?
    WHERE id = ?
"#;

const SOFT_DELETE_POST: &str =
    "UPDATE posts SET status = ?, removed = ?, updated_at = ? WHERE id = ? AND removed = ?";

const INCREMENT_VIEWS: &str = "UPDATE posts SET views = views + 1 WHERE id = ?";

const INSERT_POST_TAG: &str = "INSERT INTO post_tags (post_id, tag_id) VALUES (?, ?)";

const CLEAR_POST_TAGS: &str = "DELETE FROM post_tags WHERE post_id = ?";

const COUNT_POSTS: &str =
    "SELECT COUNT(*) AS count FROM posts WHERE removed = ? AND LOWER(title) LIKE ? ESCAPE '!'";

fn select_where(clause: &str) -> String {
    format!("SELECT {} FROM posts WHERE {}", POST_COLUMNS, clause)
}

fn list_query() -> String {
    select_where(
        "removed = ? AND LOWER(title) LIKE ? ESCAPE '!' ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
    )
}

fn featured_query() -> String {
    select_where("removed = ? AND is_featured = ? ORDER BY created_at DESC, id DESC LIMIT ?")
}

fn encode_content(content: &serde_json::Value) -> Result<String> {
    serde_json::to_string(content).context("Failed to encode post content")
}

fn decode_content(raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw).context("Stored post content is not valid JSON")
}

fn dedup_tags(tag_ids: &[i64]) -> Vec<i64> {
    let mut ids = tag_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, input: &CreatePostInput, author_id: i64) -> Result<Post> {
        let id = match self.pool.backend() {
            Backend::Sqlite(p) => create_post_sqlite(p, input, author_id).await?,
            Backend::Mysql(p) => create_post_mysql(p, input, author_id).await?,
        };
        self.get_by_id(id)
            .await?
            .context("Post not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let sql = select_where("id = ?");
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get post")?
                .as_ref()
                .map(row_to_post_sqlite)
                .transpose(),
            Backend::Mysql(p) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get post")?
                .as_ref()
                .map(row_to_post_mysql)
                .transpose(),
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let sql = select_where("slug = ?");
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(p)
                .await
                .context("Failed to get post by slug")?
                .as_ref()
                .map(row_to_post_sqlite)
                .transpose(),
            Backend::Mysql(p) => sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(p)
                .await
                .context("Failed to get post by slug")?
                .as_ref()
                .map(row_to_post_mysql)
                .transpose(),
        }
    }

    async fn update(&self, post: &Post, tag_ids: Option<&[i64]>) -> Result<Post> {
        match self.pool.backend() {
            Backend::Sqlite(p) => update_post_sqlite(p, post, tag_ids).await?,
            Backend::Mysql(p) => update_post_mysql(p, post, tag_ids).await?,
        }
        self.get_by_id(post.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Post not found after update"))
    }

    async fn soft_delete(&self, id: i64) -> Result<bool> {
        let now = Utc::now();
        let removed = PostStatus::Removed.to_string();
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(SOFT_DELETE_POST)
                .bind(&removed)
                .bind(true)
                .bind(now)
                .bind(id)
                .bind(false)
                .execute(p)
                .await
                .context("Failed to remove post")?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query(SOFT_DELETE_POST)
                .bind(&removed)
                .bind(true)
                .bind(now)
                .bind(id)
                .bind(false)
                .execute(p)
                .await
                .context("Failed to remove post")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<Post>, i64)> {
        let pattern = params.like_pattern();
        let sql = list_query();
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let rows = sqlx::query(&sql)
                    .bind(false)
                    .bind(&pattern)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(p)
                    .await
                    .context("Failed to list posts")?;
                let total: i64 = sqlx::query(COUNT_POSTS)
                    .bind(false)
                    .bind(&pattern)
                    .fetch_one(p)
                    .await
                    .context("Failed to count posts")?
                    .get("count");
                let posts = rows.iter().map(row_to_post_sqlite).collect::<Result<Vec<_>>>()?;
                Ok((posts, total))
            }
            Backend::Mysql(p) => {
                let rows = sqlx::query(&sql)
                    .bind(false)
                    .bind(&pattern)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(p)
                    .await
                    .context("Failed to list posts")?;
                let total: i64 = sqlx::query(COUNT_POSTS)
                    .bind(false)
                    .bind(&pattern)
                    .fetch_one(p)
                    .await
                    .context("Failed to count posts")?
                    .get("count");
                let posts = rows.iter().map(row_to_post_mysql).collect::<Result<Vec<_>>>()?;
                Ok((posts, total))
            }
        }
    }

    async fn featured(&self, limit: i64) -> Result<Vec<Post>> {
        let sql = featured_query();
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .bind(false)
                .bind(true)
                .bind(limit)
                .fetch_all(p)
                .await
                .context("Failed to list featured posts")?
                .iter()
                .map(row_to_post_sqlite)
                .collect(),
            Backend::Mysql(p) => sqlx::query(&sql)
                .bind(false)
                .bind(true)
                .bind(limit)
                .fetch_all(p)
                .await
                .context("Failed to list featured posts")?
                .iter()
                .map(row_to_post_mysql)
                .collect(),
        }
    }

    async fn increment_views(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(INCREMENT_VIEWS)
                .bind(id)
                .execute(p)
                .await
                .context("Failed to count view")?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query(INCREMENT_VIEWS)
                .bind(id)
                .execute(p)
                .await
                .context("Failed to count view")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(
    pool: &SqlitePool,
    input: &CreatePostInput,
    author_id: i64,
) -> Result<i64> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let id = sqlx::query(INSERT_POST)
        .bind(&input.title)
        .bind(encode_content(&input.content)?)
        .bind(input.status.to_string())
        .bind(author_id)
        .bind(input.category_id)
        .bind(input.parent_id)
        .bind(&input.thumbnail_url)
        .bind(&input.slug)
        .bind(&input.summary)
        .bind(input.is_featured)
        .bind(false)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create post")?
        .last_insert_rowid();

    for tag_id in dedup_tags(&input.tag_ids) {
        sqlx::query(INSERT_POST_TAG)
            .bind(id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to link tag {}", tag_id))?;
    }

    tx.commit().await.context("Failed to commit post")?;
    Ok(id)
}

async fn update_post_sqlite(pool: &SqlitePool, post: &Post, tag_ids: Option<&[i64]>) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(UPDATE_POST)
        .bind(&post.title)
        .bind(encode_content(&post.content)?)
        .bind(post.status.to_string())
        .bind(post.category_id)
        .bind(post.parent_id)
        .bind(&post.thumbnail_url)
        .bind(&post.slug)
        .bind(&post.summary)
        .bind(post.is_featured)
        .bind(Utc::now())
        .bind(post.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update post")?;

    if let Some(tag_ids) = tag_ids {
        sqlx::query(CLEAR_POST_TAGS)
            .bind(post.id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear post tags")?;
        for tag_id in dedup_tags(tag_ids) {
            sqlx::query(INSERT_POST_TAG)
                .bind(post.id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to link tag {}", tag_id))?;
        }
    }

    tx.commit().await.context("Failed to commit post update")?;
    Ok(())
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    let status: String = row.get("status");
    let content: String = row.get("content");
    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        content: decode_content(&content)?,
        status: PostStatus::from_str(&status)?,
        author_id: row.get("author_id"),
        category_id: row.get("category_id"),
        parent_id: row.get("parent_id"),
        thumbnail_url: row.get("thumbnail_url"),
        slug: row.get("slug"),
        summary: row.get("summary"),
        is_featured: row.get("is_featured"),
        views: row.get("views"),
        removed: row.get("removed"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, input: &CreatePostInput, author_id: i64) -> Result<i64> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let id = sqlx::query(INSERT_POST)
        .bind(&input.title)
        .bind(encode_content(&input.content)?)
        .bind(input.status.to_string())
        .bind(author_id)
        .bind(input.category_id)
        .bind(input.parent_id)
        .bind(&input.thumbnail_url)
        .bind(&input.slug)
        .bind(&input.summary)
        .bind(input.is_featured)
        .bind(false)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create post")?
        .last_insert_id() as i64;

    for tag_id in dedup_tags(&input.tag_ids) {
        sqlx::query(INSERT_POST_TAG)
            .bind(id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to link tag {}", tag_id))?;
    }

    tx.commit().await.context("Failed to commit post")?;
    Ok(id)
}

async fn update_post_mysql(pool: &MySqlPool, post: &Post, tag_ids: Option<&[i64]>) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(UPDATE_POST)
        .bind(&post.title)
        .bind(encode_content(&post.content)?)
        .bind(post.status.to_string())
        .bind(post.category_id)
        .bind(post.parent_id)
        .bind(&post.thumbnail_url)
        .bind(&post.slug)
        .bind(&post.summary)
        .bind(post.is_featured)
        .bind(Utc::now())
        .bind(post.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update post")?;

    if let Some(tag_ids) = tag_ids {
        sqlx::query(CLEAR_POST_TAGS)
            .bind(post.id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear post tags")?;
        for tag_id in dedup_tags(tag_ids) {
            sqlx::query(INSERT_POST_TAG)
                .bind(post.id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to link tag {}", tag_id))?;
        }
    }

    tx.commit().await.context("Failed to commit post update")?;
    Ok(())
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Post> {
    let status: String = row.get("status");
    let content: String = row.get("content");
    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        content: decode_content(&content)?,
        status: PostStatus::from_str(&status)?,
        author_id: row.get("author_id"),
        category_id: row.get("category_id"),
        parent_id: row.get("parent_id"),
        thumbnail_url: row.get("thumbnail_url"),
        slug: row.get("slug"),
        summary: row.get("summary"),
        is_featured: row.get("is_featured"),
        views: row.get("views"),
        removed: row.get("removed"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxTagRepository, SqlxUserRepository, TagRepository, UserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{CreateUserInput, UserRole};

    async fn setup() -> (DynDatabasePool, SqlxPostRepository, i64) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let author = SqlxUserRepository::new(pool.clone())
            .create(&CreateUserInput {
                email: "writer@newsroom.test".to_string(),
                password_hash: "x".to_string(),
                first_name: "Wri".to_string(),
                last_name: "Ter".to_string(),
                job_role: None,
                role: UserRole::Editor,
                must_change_password: false,
            })
            .await
            .unwrap();
        (pool.clone(), SqlxPostRepository::new(pool), author.id)
    }

    fn input(title: &str, slug: &str) -> CreatePostInput {
        CreatePostInput {
            title: title.to_string(),
            content: serde_json::json!({"blocks": [{"type": "paragraph", "text": title}]}),
            status: PostStatus::Posted,
            category_id: None,
            parent_id: None,
            tag_ids: vec![],
            thumbnail_url: None,
            slug: slug.to_string(),
            summary: None,
            is_featured: false,
        }
    }

    #[tokio::test]
    async fn test_create_keeps_json_content() {
        let (_pool, repo, author) = setup().await;
        let post = repo.create(&input("Safra recorde", "safra-recorde"), author).await.unwrap();
        assert_eq!(post.author_id, author);
        assert_eq!(post.views, 0);
        assert_eq!(post.content["blocks"][0]["text"], "Safra recorde");
        assert!(repo.create(&input("Outra", "safra-recorde"), author).await.is_err());
    }

    #[tokio::test]
    async fn test_tags_linked_and_replaced() {
        let (pool, repo, author) = setup().await;
        let tags = SqlxTagRepository::new(pool);
        let soja = tags.create("Soja", "soja").await.unwrap();
        let milho = tags.create("Milho", "milho").await.unwrap();

        let mut create = input("Graos", "graos");
        create.tag_ids = vec![soja.id, soja.id];
        let post = repo.create(&create, author).await.unwrap();
        assert_eq!(tags.get_for_post(post.id).await.unwrap().len(), 1);

        repo.update(&post, Some(&[milho.id])).await.unwrap();
        let linked = tags.get_for_post(post.id).await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].id, milho.id);

        // no tag list leaves links untouched
        repo.update(&post, None).await.unwrap();
        assert_eq!(tags.get_for_post(post.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_soft_delete_sets_status() {
        let (_pool, repo, author) = setup().await;
        let post = repo.create(&input("Apagar", "apagar"), author).await.unwrap();
        assert!(repo.soft_delete(post.id).await.unwrap());
        let reloaded = repo.get_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, PostStatus::Removed);
        assert!(reloaded.removed);

        let (items, total) = repo.list(&ListParams::default()).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_featured_and_views() {
        let (_pool, repo, author) = setup().await;
        for i in 0..5 {
            let mut create = input(&format!("Destaque {}", i), &format!("destaque-{}", i));
            create.is_featured = true;
            repo.create(&create, author).await.unwrap();
        }
        let plain = repo.create(&input("Comum", "comum"), author).await.unwrap();

        let featured = repo.featured(3).await.unwrap();
        assert_eq!(featured.len(), 3);
        assert!(featured.iter().all(|p| p.is_featured));

        assert!(repo.increment_views(plain.id).await.unwrap());
        assert!(repo.increment_views(plain.id).await.unwrap());
        assert!(!repo.increment_views(9999).await.unwrap());
        assert_eq!(repo.get_by_id(plain.id).await.unwrap().unwrap().views, 2);
    }

    #[tokio::test]
    async fn test_list_search_title() {
        let (_pool, repo, author) = setup().await;
        repo.create(&input("Preco do boi", "boi"), author).await.unwrap();
        repo.create(&input("Chuva no sul", "chuva"), author).await.unwrap();

        let (found, total) = repo
            .list(&ListParams::default().with_search("BOI"))
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].slug, "boi");
    }

    #[tokio::test]
    async fn test_list_search_treats_wildcards_literally() {
        let (_pool, repo, author) = setup().await;
        repo.create(&input("Desconto de 50% no adubo", "desconto"), author).await.unwrap();
        repo.create(&input("Leilao de 500 cabecas", "leilao"), author).await.unwrap();
        repo.create(&input("Safra_2024 recorde", "safra"), author).await.unwrap();
        repo.create(&input("Safra 2024 fraca", "safra-fraca"), author).await.unwrap();

        let (found, total) = repo
            .list(&ListParams::default().with_search("50%"))
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].slug, "desconto");

        let (found, total) = repo
            .list(&ListParams::default().with_search("safra_"))
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].slug, "safra");
    }
}
