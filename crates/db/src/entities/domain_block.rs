//! Domain block entity (instance-level defederation).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "domain_block")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Lowercased host
    #[sea_orm(unique)]
    pub domain: String,

    pub created_by_account_id: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub public_comment: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub private_comment: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
