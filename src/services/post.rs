//! Post service
//!
//! News posts with their author, category and tags. Removal flips the
//! status to `removed` and never deletes the row.

use crate::db::repositories::{CategoryRepository, PostRepository, TagRepository, UserRepository};
use crate::models::{
    Category, CreatePostInput, ListParams, PagedResult, Post, PostAuthor, PostDetail, PostStatus,
    UpdatePostInput, User,
};
use crate::services::error::ContentError;
use std::collections::HashMap;
use std::sync::Arc;

/// Posts shown in the featured strip
const FEATURED_LIMIT: i64 = 3;

pub struct PostService {
    posts: Arc<dyn PostRepository>,
    categories: Arc<dyn CategoryRepository>,
    tags: Arc<dyn TagRepository>,
    users: Arc<dyn UserRepository>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        categories: Arc<dyn CategoryRepository>,
        tags: Arc<dyn TagRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            posts,
            categories,
            tags,
            users,
        }
    }

    pub async fn create(&self, author: &User, input: &CreatePostInput) -> Result<PostDetail, ContentError> {
        let mut input = input.clone();
        input.title = input.title.trim().to_string();
        input.slug = input.slug.trim().to_string();
        if input.title.is_empty() {
            return Err(ContentError::validation("Title is required"));
        }
        if input.slug.is_empty() {
            return Err(ContentError::validation("Slug is required"));
        }
        if input.status == PostStatus::Removed {
            return Err(ContentError::validation("Invalid status"));
        }
        if self.posts.get_by_slug(&input.slug).await?.is_some() {
            return Err(ContentError::Conflict(format!("Slug '{}' already in use", input.slug)));
        }
        if let Some(category_id) = input.category_id {
            self.require_category(category_id).await?;
        }
        input.tag_ids = self.require_tags(&input.tag_ids).await?;

        let post = self.posts.create(&input, author.id).await?;
        tracing::info!(post_id = post.id, author_id = author.id, "Post created");
        self.detail(post).await
    }

    pub async fn list(&self, params: &ListParams) -> Result<PagedResult<PostDetail>, ContentError> {
        let (posts, total) = self.posts.list(params).await?;
        let details = self.details(posts).await?;
        Ok(PagedResult::new(details, total, params))
    }

    pub async fn featured(&self) -> Result<Vec<PostDetail>, ContentError> {
        let posts = self.posts.featured(FEATURED_LIMIT).await?;
        self.details(posts).await
    }

    pub async fn find(&self, id: i64) -> Result<PostDetail, ContentError> {
        let post = self.load(id).await?;
        self.detail(post).await
    }

    pub async fn update(&self, id: i64, input: &UpdatePostInput) -> Result<PostDetail, ContentError> {
        let mut post = self.load(id).await?;

        if let Some(title) = &input.title {
            if title.trim().is_empty() {
                return Err(ContentError::validation("Title is required"));
            }
        }
        if input.status == Some(PostStatus::Removed) {
            return Err(ContentError::validation("Invalid status"));
        }
        if let Some(slug) = &input.slug {
            let slug = slug.trim();
            if slug.is_empty() {
                return Err(ContentError::validation("Slug is required"));
            }
            if let Some(other) = self.posts.get_by_slug(slug).await? {
                if other.id != post.id {
                    return Err(ContentError::Conflict(format!("Slug '{}' already in use", slug)));
                }
            }
        }
        if let Some(category_id) = input.category_id {
            self.require_category(category_id).await?;
        }
        let tag_ids = match &input.tag_ids {
            Some(ids) => Some(self.require_tags(ids).await?),
            None => None,
        };

        post.apply(input);
        post.title = post.title.trim().to_string();
        post.slug = post.slug.trim().to_string();
        let updated = self.posts.update(&post, tag_ids.as_deref()).await?;
        tracing::info!(post_id = updated.id, "Post updated");
        self.detail(updated).await
    }

    pub async fn remove(&self, id: i64) -> Result<(), ContentError> {
        self.load(id).await?;
        self.posts.soft_delete(id).await?;
        tracing::info!(post_id = id, "Post removed");
        Ok(())
    }

    pub async fn register_view(&self, id: i64) -> Result<(), ContentError> {
        if !self.posts.increment_views(id).await? {
            return Err(ContentError::not_found(format!("Post {}", id)));
        }
        Ok(())
    }

    async fn load(&self, id: i64) -> Result<Post, ContentError> {
        match self.posts.get_by_id(id).await? {
            Some(post) if !post.removed && post.status != PostStatus::Removed => Ok(post),
            _ => Err(ContentError::not_found(format!("Post {}", id))),
        }
    }

    async fn require_category(&self, id: i64) -> Result<Category, ContentError> {
        match self.categories.get_by_id(id).await? {
            Some(category) if !category.removed => Ok(category),
            _ => Err(ContentError::validation(format!("Unknown category {}", id))),
        }
    }

    /// Deduplicated ids, all of which must be live tags
    async fn require_tags(&self, ids: &[i64]) -> Result<Vec<i64>, ContentError> {
        let mut unique = ids.to_vec();
        unique.sort_unstable();
        unique.dedup();
        if unique.is_empty() {
            return Ok(unique);
        }
        let found = self.tags.get_many(&unique).await?;
        if found.len() != unique.len() {
            return Err(ContentError::validation("Unknown tag"));
        }
        Ok(unique)
    }

    async fn detail(&self, post: Post) -> Result<PostDetail, ContentError> {
        let mut details = self.details(vec![post]).await?;
        details
            .pop()
            .ok_or_else(|| ContentError::Internal(anyhow::anyhow!("Post detail missing")))
    }

    async fn details(&self, posts: Vec<Post>) -> Result<Vec<PostDetail>, ContentError> {
        let mut authors: HashMap<i64, Option<PostAuthor>> = HashMap::new();
        let mut categories: HashMap<i64, Option<Category>> = HashMap::new();
        let mut details = Vec::with_capacity(posts.len());

        for post in posts {
            if !authors.contains_key(&post.author_id) {
                let author = self.users.get_by_id(post.author_id).await?.map(|u| PostAuthor {
                    id: u.id,
                    first_name: u.first_name,
                    last_name: u.last_name,
                    email: u.email,
                });
                authors.insert(post.author_id, author);
            }
            let category = match post.category_id {
                Some(category_id) => {
                    if !categories.contains_key(&category_id) {
                        let category = self.categories.get_by_id(category_id).await?;
                        categories.insert(category_id, category);
                    }
                    categories.get(&category_id).cloned().flatten()
                }
                None => None,
            };
            let tags = self.tags.get_for_post(post.id).await?;
            details.push(PostDetail {
                author: authors.get(&post.author_id).cloned().flatten(),
                category,
                tags,
                post,
            });
        }
        Ok(details)
    }
}
