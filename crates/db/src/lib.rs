//! Database layer for plaza.
//!
//! The processing core talks to storage only through the [`Database`] trait.
//! [`SeaOrmDatabase`] implements it over `PostgreSQL`; with the `test-utils`
//! feature, [`test_utils::MemoryDatabase`] implements it in memory.

pub mod database;
pub mod entities;
pub mod repositories;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use database::{AccountStatusesQuery, Database};
pub use store::SeaOrmDatabase;

use plaza_common::{AppError, Config};
use sea_orm::{ConnectOptions, ConnectionTrait, DatabaseConnection, EntityTrait, Schema};
use std::time::Duration;
use tracing::log::LevelFilter;

/// Initialize database connection.
pub async fn init(config: &Config) -> Result<DatabaseConnection, AppError> {
    let mut opt = ConnectOptions::new(&config.database.url);

    opt.max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    sea_orm::Database::connect(opt)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Create every table that does not exist yet.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), AppError> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    async fn create<E: EntityTrait>(
        db: &DatabaseConnection,
        schema: &Schema,
        entity: E,
    ) -> Result<(), AppError> {
        let mut stmt = schema.create_table_from_entity(entity);
        stmt.if_not_exists();
        db.execute(db.get_database_backend().build(&stmt))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    create(db, &schema, entities::Account).await?;
    create(db, &schema, entities::User).await?;
    create(db, &schema, entities::Status).await?;
    create(db, &schema, entities::Follow).await?;
    create(db, &schema, entities::FollowRequest).await?;
    create(db, &schema, entities::Block).await?;
    create(db, &schema, entities::Mute).await?;
    create(db, &schema, entities::DomainBlock).await?;
    create(db, &schema, entities::StatusFave).await?;
    create(db, &schema, entities::StatusBookmark).await?;
    create(db, &schema, entities::MediaAttachment).await?;
    create(db, &schema, entities::Notification).await?;
    create(db, &schema, entities::Report).await?;
    tracing::info!("Database schema ready");
    Ok(())
}
