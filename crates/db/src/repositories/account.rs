//! Account repository.

use std::sync::Arc;

use crate::entities::{Account, account};
use plaza_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder,
};

/// Account repository for database operations.
#[derive(Clone)]
pub struct AccountRepository {
    db: Arc<DatabaseConnection>,
}

impl AccountRepository {
    /// Create a new account repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an account by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<account::Model>> {
        Account::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an account by `ActivityPub` URI.
    pub async fn find_by_uri(&self, uri: &str) -> AppResult<Option<account::Model>> {
        Account::find()
            .filter(account::Column::Uri.eq(uri))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an account by username and domain (case-insensitive on both).
    pub async fn find_by_username_domain(
        &self,
        username: &str,
        domain: Option<&str>,
    ) -> AppResult<Option<account::Model>> {
        use sea_orm::sea_query::{Expr, Func};

        let mut query = Account::find().filter(
            Expr::expr(Func::lower(Expr::col(account::Column::Username)))
                .eq(username.to_lowercase()),
        );

        query = match domain {
            Some(domain) => query.filter(account::Column::Domain.eq(domain.to_lowercase())),
            None => query.filter(account::Column::Domain.is_null()),
        };

        query
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find every account of a remote domain.
    pub async fn find_by_domain(&self, domain: &str) -> AppResult<Vec<account::Model>> {
        Account::find()
            .filter(account::Column::Domain.eq(domain.to_lowercase()))
            .order_by_asc(account::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new account.
    pub async fn create(&self, model: account::Model) -> AppResult<account::Model> {
        account::ActiveModel::from(model)
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update an account, overwriting every column.
    pub async fn update(&self, model: account::Model) -> AppResult<account::Model> {
        model
            .into_active_model()
            .reset_all()
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
