//! Category service
//!
//! Categories are manually ordered. Names and slugs are unique across every
//! row, removed ones included.

use crate::db::repositories::{CategoryRepository, OrderedTable};
use crate::models::{Category, CreateCategoryInput, ListParams, PagedResult, UpdateCategoryInput};
use crate::services::error::ContentError;
use crate::services::ordering::OrderingService;
use crate::services::validation::generate_slug;
use std::sync::Arc;

pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    ordering: Arc<OrderingService>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>, ordering: Arc<OrderingService>) -> Self {
        Self { repo, ordering }
    }

    /// Create a category at the end of the list.
    /// An empty slug is derived from the name.
    pub async fn create(&self, input: &CreateCategoryInput) -> Result<Category, ContentError> {
        let mut input = input.clone();
        input.name = input.name.trim().to_string();
        if input.name.is_empty() {
            return Err(ContentError::validation("Name is required"));
        }
        input.slug = match input.slug.trim() {
            "" => generate_slug(&input.name),
            slug => slug.to_string(),
        };
        if input.slug.is_empty() {
            return Err(ContentError::validation("Slug is required"));
        }
        self.check_conflict(&input.name, &input.slug, None).await?;

        let order = self.ordering.next_order(OrderedTable::Categories).await?;
        let category = self.repo.create(&input, order).await?;
        tracing::info!(category_id = category.id, order, "Category created");
        Ok(category)
    }

    pub async fn list(&self, params: &ListParams) -> Result<PagedResult<Category>, ContentError> {
        let (categories, total) = self.repo.list(params).await?;
        Ok(PagedResult::new(categories, total, params))
    }

    pub async fn find(&self, id: i64) -> Result<Category, ContentError> {
        match self.repo.get_by_id(id).await? {
            Some(category) if !category.removed => Ok(category),
            _ => Err(ContentError::not_found(format!("Category {}", id))),
        }
    }

    pub async fn update(&self, id: i64, input: &UpdateCategoryInput) -> Result<Category, ContentError> {
        let mut category = self.find(id).await?;
        category.apply(input);
        category.name = category.name.trim().to_string();
        category.slug = category.slug.trim().to_string();
        if category.name.is_empty() || category.slug.is_empty() {
            return Err(ContentError::validation("Name and slug are required"));
        }
        self.check_conflict(&category.name, &category.slug, Some(id))
            .await?;

        let updated = self.repo.update(&category).await?;
        tracing::info!(category_id = id, "Category updated");
        Ok(updated)
    }

    pub async fn remove(&self, id: i64) -> Result<(), ContentError> {
        if !self.repo.soft_delete(id).await? {
            return Err(ContentError::not_found(format!("Category {}", id)));
        }
        tracing::info!(category_id = id, "Category removed");
        Ok(())
    }

    pub async fn reorder(&self, id: i64, raw_index: &str) -> Result<Category, ContentError> {
        self.ordering
            .reorder(OrderedTable::Categories, id, raw_index)
            .await?;
        self.find(id).await
    }

    async fn check_conflict(&self, name: &str, slug: &str, exclude: Option<i64>) -> Result<(), ContentError> {
        if let Some(existing) = self.repo.find_conflict(name, slug, exclude).await? {
            let field = if existing.name.eq_ignore_ascii_case(name) {
                "name"
            } else {
                "slug"
            };
            return Err(ContentError::Conflict(format!(
                "Category {} already exists",
                field
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCategoryRepository, SqlxOrderingRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> CategoryService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        CategoryService::new(
            SqlxCategoryRepository::boxed(pool.clone()),
            Arc::new(OrderingService::new(SqlxOrderingRepository::boxed(pool))),
        )
    }

    fn input(name: &str, slug: &str) -> CreateCategoryInput {
        CreateCategoryInput {
            name: name.to_string(),
            slug: slug.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_appends_and_derives_slug() {
        let service = setup().await;
        let first = service.create(&input("Pecuária", "")).await.unwrap();
        let second = service.create(&input("Clima", "clima")).await.unwrap();
        assert_eq!(first.slug, "pecuaria");
        assert_eq!(first.sort_order, 0);
        assert_eq!(second.sort_order, 1);
    }

    #[tokio::test]
    async fn test_conflicts() {
        let service = setup().await;
        let agro = service.create(&input("Agro", "agro")).await.unwrap();
        assert!(matches!(
            service.create(&input("Agro", "outro")).await,
            Err(ContentError::Conflict(_))
        ));
        assert!(matches!(
            service.create(&input("Outro", "agro")).await,
            Err(ContentError::Conflict(_))
        ));
        let clima = service.create(&input("Clima", "clima")).await.unwrap();
        let rename = UpdateCategoryInput {
            slug: Some("agro".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.update(clima.id, &rename).await,
            Err(ContentError::Conflict(_))
        ));
        let keep = UpdateCategoryInput {
            name: Some("Agro".to_string()),
            color: Some("#0a0".to_string()),
            ..Default::default()
        };
        let updated = service.update(agro.id, &keep).await.unwrap();
        assert_eq!(updated.color.as_deref(), Some("#0a0"));
    }

    #[tokio::test]
    async fn test_remove_and_reorder() {
        let service = setup().await;
        let a = service.create(&input("A", "a")).await.unwrap();
        let b = service.create(&input("B", "b")).await.unwrap();
        let c = service.create(&input("C", "c")).await.unwrap();

        let moved = service.reorder(c.id, "0").await.unwrap();
        assert_eq!(moved.sort_order, 0);
        let names: Vec<String> = service
            .list(&ListParams::default())
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["C", "A", "B"]);

        service.remove(b.id).await.unwrap();
        assert!(matches!(service.find(b.id).await, Err(ContentError::NotFound(_))));
        assert_eq!(service.list(&ListParams::default()).await.unwrap().total, 2);
        assert!(service.find(a.id).await.is_ok());
    }
}
