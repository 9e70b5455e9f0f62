//! Follow repository.

use std::sync::Arc;

use crate::entities::{Follow, follow};
use plaza_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder,
};

/// Follow repository for database operations.
#[derive(Clone)]
pub struct FollowRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowRepository {
    /// Create a new follow repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a follow edge by follower and followee.
    pub async fn find_by_pair(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<follow::Model>> {
        Follow::find()
            .filter(follow::Column::AccountId.eq(account_id))
            .filter(follow::Column::TargetAccountId.eq(target_account_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new follow edge.
    pub async fn create(&self, model: follow::Model) -> AppResult<follow::Model> {
        follow::ActiveModel::from(model)
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a follow edge by pair, returning it if it existed.
    pub async fn delete_by_pair(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<follow::Model>> {
        let follow = self.find_by_pair(account_id, target_account_id).await?;
        if let Some(f) = &follow {
            f.clone()
                .delete(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(follow)
    }

    /// Follow edges pointing at an account.
    pub async fn find_followers(&self, account_id: &str) -> AppResult<Vec<follow::Model>> {
        Follow::find()
            .filter(follow::Column::TargetAccountId.eq(account_id))
            .order_by_desc(follow::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Follow edges starting at an account.
    pub async fn find_following(&self, account_id: &str) -> AppResult<Vec<follow::Model>> {
        Follow::find()
            .filter(follow::Column::AccountId.eq(account_id))
            .order_by_desc(follow::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_follow(id: &str, account_id: &str, target_account_id: &str) -> follow::Model {
        follow::Model {
            id: id.to_string(),
            uri: format!("https://example.com/follows/{id}"),
            account_id: account_id.to_string(),
            target_account_id: target_account_id.to_string(),
            show_reblogs: true,
            notify: false,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_pair_found() {
        let follow = create_test_follow("f1", "a1", "a2");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[follow.clone()]])
                .into_connection(),
        );

        let repo = FollowRepository::new(db);
        let result = repo.find_by_pair("a1", "a2").await.unwrap();

        assert_eq!(result.unwrap().target_account_id, "a2");
    }

    #[tokio::test]
    async fn test_delete_by_pair_absent_is_noop() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<follow::Model>::new()])
                .into_connection(),
        );

        let repo = FollowRepository::new(db);
        let result = repo.delete_by_pair("a1", "a3").await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_delete_by_pair_returns_deleted() {
        let follow = create_test_follow("f1", "a1", "a2");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[follow]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = FollowRepository::new(db);
        let result = repo.delete_by_pair("a1", "a2").await.unwrap();

        assert_eq!(result.unwrap().id, "f1");
    }

    #[tokio::test]
    async fn test_find_followers() {
        let f1 = create_test_follow("f1", "a2", "a1");
        let f2 = create_test_follow("f2", "a3", "a1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[f1, f2]])
                .into_connection(),
        );

        let repo = FollowRepository::new(db);
        let result = repo.find_followers("a1").await.unwrap();

        assert_eq!(result.len(), 2);
    }
}
