//! Media attachment entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "media_attachment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Uploader
    #[sea_orm(indexed)]
    pub account_id: String,

    /// Set once the attachment is used by a status
    #[sea_orm(nullable, indexed)]
    pub status_id: Option<String>,

    pub url: String,

    pub content_type: String,

    pub file_size: i64,

    /// Alt text
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub storage_key: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id",
        on_delete = "Cascade"
    )]
    Account,
}

impl ActiveModelBehavior for ActiveModel {}
