//! Block repository.

use std::sync::Arc;

use crate::entities::{Block, block};
use plaza_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter,
};

/// Block repository for database operations.
#[derive(Clone)]
pub struct BlockRepository {
    db: Arc<DatabaseConnection>,
}

impl BlockRepository {
    /// Create a new block repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a block by blocker and blockee.
    pub async fn find_by_pair(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<block::Model>> {
        Block::find()
            .filter(block::Column::AccountId.eq(account_id))
            .filter(block::Column::TargetAccountId.eq(target_account_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if either account is blocking the other, in a single query.
    pub async fn is_blocked_between(&self, account_a: &str, account_b: &str) -> AppResult<bool> {
        let count = Block::find()
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(block::Column::AccountId.eq(account_a))
                            .add(block::Column::TargetAccountId.eq(account_b)),
                    )
                    .add(
                        Condition::all()
                            .add(block::Column::AccountId.eq(account_b))
                            .add(block::Column::TargetAccountId.eq(account_a)),
                    ),
            )
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Create a new block.
    pub async fn create(&self, model: block::Model) -> AppResult<block::Model> {
        block::ActiveModel::from(model)
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a block by pair, returning it if it existed.
    pub async fn delete_by_pair(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<block::Model>> {
        let block = self.find_by_pair(account_id, target_account_id).await?;
        if let Some(b) = &block {
            b.clone()
                .delete(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(block)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_find_by_pair_found() {
        let block = block::Model {
            id: "b1".to_string(),
            uri: "https://example.com/blocks/b1".to_string(),
            account_id: "a1".to_string(),
            target_account_id: "a2".to_string(),
            created_at: Utc::now().into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[block]])
                .into_connection(),
        );

        let repo = BlockRepository::new(db);
        assert!(repo.find_by_pair("a1", "a2").await.unwrap().is_some());
    }
}
