//! Status repository.

use std::sync::Arc;

use crate::database::AccountStatusesQuery;
use crate::entities::{Status, status};
use plaza_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

/// Status repository for database operations.
#[derive(Clone)]
pub struct StatusRepository {
    db: Arc<DatabaseConnection>,
}

impl StatusRepository {
    /// Create a new status repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a status by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<status::Model>> {
        Status::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a status by `ActivityPub` URI.
    pub async fn find_by_uri(&self, uri: &str) -> AppResult<Option<status::Model>> {
        Status::find()
            .filter(status::Column::Uri.eq(uri))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new status.
    pub async fn create(&self, model: status::Model) -> AppResult<status::Model> {
        status::ActiveModel::from(model)
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a status.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Status::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Page through one account's statuses, newest first.
    pub async fn find_by_account(
        &self,
        query: &AccountStatusesQuery,
    ) -> AppResult<Vec<status::Model>> {
        let mut condition = Condition::all().add(status::Column::AccountId.eq(&query.account_id));

        if let Some(max_id) = &query.max_id {
            condition = condition.add(status::Column::Id.lt(max_id));
        }
        if let Some(min_id) = &query.min_id {
            condition = condition.add(status::Column::Id.gt(min_id));
        }
        if query.exclude_replies {
            condition = condition
                .add(status::Column::InReplyToId.is_null())
                .add(status::Column::InReplyToUri.is_null());
        }
        if query.exclude_boosts {
            condition = condition.add(status::Column::BoostOfId.is_null());
        }
        if query.public_only {
            condition = condition.add(status::Column::Visibility.eq(status::Visibility::Public));
        }
        if query.federated_only {
            condition = condition
                .add(status::Column::Local.eq(true))
                .add(status::Column::Federated.eq(true));
        }

        let select = Status::find().filter(condition).limit(query.limit as u64);
        let select = if query.ascending() {
            select.order_by_asc(status::Column::Id)
        } else {
            select.order_by_desc(status::Column::Id)
        };

        let mut statuses = select
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if query.ascending() {
            statuses.reverse();
        }
        Ok(statuses)
    }

    /// Direct replies to a status, oldest first.
    pub async fn find_replies(&self, status_id: &str) -> AppResult<Vec<status::Model>> {
        Status::find()
            .filter(status::Column::InReplyToId.eq(status_id))
            .order_by_asc(status::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Every boost of a status.
    pub async fn find_boosts(&self, status_id: &str) -> AppResult<Vec<status::Model>> {
        Status::find()
            .filter(status::Column::BoostOfId.eq(status_id))
            .order_by_desc(status::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// The boost of a status made by an account.
    pub async fn find_boost_by_account(
        &self,
        account_id: &str,
        status_id: &str,
    ) -> AppResult<Option<status::Model>> {
        Status::find()
            .filter(status::Column::AccountId.eq(account_id))
            .filter(status::Column::BoostOfId.eq(status_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Statuses authored by any of `author_ids`, newest first, within exclusive bounds.
    pub async fn find_by_authors(
        &self,
        author_ids: Vec<String>,
        max_id: Option<&str>,
        min_id: Option<&str>,
        limit: usize,
    ) -> AppResult<Vec<status::Model>> {
        if author_ids.is_empty() {
            return Ok(vec![]);
        }

        let mut condition = Condition::all().add(status::Column::AccountId.is_in(author_ids));
        if let Some(max_id) = max_id {
            condition = condition.add(status::Column::Id.lt(max_id));
        }
        if let Some(min_id) = min_id {
            condition = condition.add(status::Column::Id.gt(min_id));
        }

        // A lone lower bound pages upwards from it.
        let ascending = min_id.is_some() && max_id.is_none();
        let select = Status::find().filter(condition).limit(limit as u64);
        let select = if ascending {
            select.order_by_asc(status::Column::Id)
        } else {
            select.order_by_desc(status::Column::Id)
        };

        let mut statuses = select
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if ascending {
            statuses.reverse();
        }
        Ok(statuses)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_status(id: &str, account_id: &str) -> status::Model {
        status::Model {
            id: id.to_string(),
            uri: format!("https://example.com/statuses/{id}"),
            url: None,
            content: "<p>hello</p>".to_string(),
            content_warning: None,
            visibility: status::Visibility::Public,
            sensitive: false,
            local: true,
            account_id: account_id.to_string(),
            account_uri: format!("https://example.com/users/{account_id}"),
            in_reply_to_id: None,
            in_reply_to_account_id: None,
            in_reply_to_uri: None,
            boost_of_id: None,
            boost_of_account_id: None,
            mention_account_ids: serde_json::json!([]),
            attachment_ids: serde_json::json!([]),
            tags: serde_json::json!([]),
            federated: true,
            boostable: true,
            replyable: true,
            likeable: true,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_account_min_id_returns_newest_first() {
        // ascending query result, reversed by the repository
        let s1 = create_test_status("s1", "a1");
        let s2 = create_test_status("s2", "a1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[s1, s2]])
                .into_connection(),
        );

        let repo = StatusRepository::new(db);
        let mut query = AccountStatusesQuery::new("a1", 2);
        query.min_id = Some("s0".to_string());
        let result = repo.find_by_account(&query).await.unwrap();

        assert_eq!(result[0].id, "s2");
        assert_eq!(result[1].id, "s1");
    }

    #[tokio::test]
    async fn test_find_by_authors_empty_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = StatusRepository::new(db);
        let result = repo.find_by_authors(vec![], None, None, 20).await.unwrap();

        assert!(result.is_empty());
    }
}
