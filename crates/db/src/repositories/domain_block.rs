//! Domain block repository.

use std::sync::Arc;

use crate::entities::{DomainBlock, domain_block};
use plaza_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder,
};

/// Domain block repository for database operations.
#[derive(Clone)]
pub struct DomainBlockRepository {
    db: Arc<DatabaseConnection>,
}

impl DomainBlockRepository {
    /// Create a new domain block repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the block of a domain.
    pub async fn find_by_domain(&self, domain: &str) -> AppResult<Option<domain_block::Model>> {
        DomainBlock::find()
            .filter(domain_block::Column::Domain.eq(domain.to_lowercase()))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Every domain block, alphabetically.
    pub async fn find_all(&self) -> AppResult<Vec<domain_block::Model>> {
        DomainBlock::find()
            .order_by_asc(domain_block::Column::Domain)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new domain block.
    pub async fn create(&self, model: domain_block::Model) -> AppResult<domain_block::Model> {
        domain_block::ActiveModel::from(model)
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete the block of a domain, returning it if it existed.
    pub async fn delete_by_domain(&self, domain: &str) -> AppResult<Option<domain_block::Model>> {
        let block = self.find_by_domain(domain).await?;
        if let Some(b) = &block {
            b.clone()
                .delete(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(block)
    }
}
