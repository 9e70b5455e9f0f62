//! Report entity (moderation reports against an account).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "report")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// URI of the Flag activity
    pub uri: String,

    /// Reporter
    #[sea_orm(indexed)]
    pub account_id: String,

    /// Reported account
    #[sea_orm(indexed)]
    pub target_account_id: String,

    /// Reported status IDs (all authored by the target)
    #[sea_orm(column_type = "JsonBinary")]
    pub status_ids: Json,

    #[sea_orm(column_type = "Text")]
    pub comment: String,

    /// Forward a copy to the target's instance
    #[sea_orm(default_value = false)]
    pub forwarded: bool,

    /// Resolution note, set when the report is closed
    #[sea_orm(column_type = "Text", nullable)]
    pub action_taken: Option<String>,

    #[sea_orm(nullable)]
    pub action_taken_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub action_taken_by_account_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether a moderator has closed this report.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.action_taken_at.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
