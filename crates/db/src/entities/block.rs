//! Block entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "block")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub uri: String,

    /// The account who is blocking
    #[sea_orm(indexed)]
    pub account_id: String,

    /// The account being blocked
    #[sea_orm(indexed)]
    pub target_account_id: String,

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
    Blocker,

    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::TargetAccountId",
        to = "super::account::Column::Id",
        on_delete = "Cascade"
    )]
    Blockee,
}

impl ActiveModelBehavior for ActiveModel {}
