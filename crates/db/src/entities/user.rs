//! User entity (credentials of a local account).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub account_id: String,

    #[sea_orm(unique)]
    pub email: String,

    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub encrypted_password: String,

    #[sea_orm(nullable)]
    #[serde(skip_serializing)]
    pub confirmation_token: Option<String>,

    #[sea_orm(nullable)]
    pub confirmed_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(default_value = true)]
    pub approved: bool,

    #[sea_orm(default_value = false)]
    pub admin: bool,

    #[sea_orm(default_value = false)]
    pub moderator: bool,

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

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
