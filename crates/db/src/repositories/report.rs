//! Report repository.

use std::sync::Arc;

use crate::entities::{Report, report};
use plaza_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect,
};

/// Report repository for database operations.
#[derive(Clone)]
pub struct ReportRepository {
    db: Arc<DatabaseConnection>,
}

impl ReportRepository {
    /// Create a new report repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a report by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<report::Model>> {
        Report::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List reports newest first, optionally filtered by resolution state.
    pub async fn find_all(
        &self,
        resolved: Option<bool>,
        limit: usize,
    ) -> AppResult<Vec<report::Model>> {
        let mut query = Report::find().order_by_desc(report::Column::Id);

        query = match resolved {
            Some(true) => query.filter(report::Column::ActionTakenAt.is_not_null()),
            Some(false) => query.filter(report::Column::ActionTakenAt.is_null()),
            None => query,
        };

        query
            .limit(limit as u64)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new report.
    pub async fn create(&self, model: report::Model) -> AppResult<report::Model> {
        report::ActiveModel::from(model)
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a report.
    pub async fn update(&self, model: report::Model) -> AppResult<report::Model> {
        model
            .into_active_model()
            .reset_all()
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
