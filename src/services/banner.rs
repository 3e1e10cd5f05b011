//! Banner service

use crate::db::repositories::{BannerRepository, OrderedTable};
use crate::models::{Banner, CreateBannerInput, UpdateBannerInput};
use crate::services::error::ContentError;
use crate::services::ordering::OrderingService;
use std::sync::Arc;

pub struct BannerService {
    repo: Arc<dyn BannerRepository>,
    ordering: Arc<OrderingService>,
}

impl BannerService {
    pub fn new(repo: Arc<dyn BannerRepository>, ordering: Arc<OrderingService>) -> Self {
        Self { repo, ordering }
    }

    pub async fn create(&self, input: &CreateBannerInput) -> Result<Banner, ContentError> {
        let order = self.ordering.next_order(OrderedTable::Banners).await?;
        let banner = self.repo.create(input, order).await?;
        tracing::info!(banner_id = banner.id, order, "Banner created");
        Ok(banner)
    }

    pub async fn list(&self) -> Result<Vec<Banner>, ContentError> {
        Ok(self.repo.list().await?)
    }

    pub async fn find(&self, id: i64) -> Result<Banner, ContentError> {
        match self.repo.get_by_id(id).await? {
            Some(banner) if !banner.removed => Ok(banner),
            _ => Err(ContentError::not_found(format!("Banner {}", id))),
        }
    }

    pub async fn update(&self, id: i64, input: &UpdateBannerInput) -> Result<Banner, ContentError> {
        let mut banner = self.find(id).await?;
        banner.apply(input);
        Ok(self.repo.update(&banner).await?)
    }

    pub async fn remove(&self, id: i64) -> Result<(), ContentError> {
        if !self.repo.soft_delete(id).await? {
            return Err(ContentError::not_found(format!("Banner {}", id)));
        }
        tracing::info!(banner_id = id, "Banner removed");
        Ok(())
    }

    pub async fn reorder(&self, id: i64, raw_index: &str) -> Result<Banner, ContentError> {
        self.ordering
            .reorder(OrderedTable::Banners, id, raw_index)
            .await?;
        self.find(id).await
    }
}
