//! User invite code entity.

use chrono::Utc;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A personal invite code. Redeeming it records who invited whom.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_invite_codes")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owner of the code (the inviter).
    #[sea_orm(indexed)]
    pub user_id: String,

    #[sea_orm(unique)]
    pub invite_code: String,

    /// `None` means unlimited.
    #[sea_orm(nullable)]
    pub max_uses: Option<i32>,

    #[sea_orm(default_value = 0)]
    pub current_uses: i32,

    #[sea_orm(nullable)]
    pub expires_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(default_value = true)]
    pub is_active: bool,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether the code has passed its expiry time.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= Utc::now().fixed_offset())
    }

    /// Whether every allowed use has been consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.max_uses.is_some_and(|max| self.current_uses >= max)
    }

    /// Whether the code can be redeemed right now.
    #[must_use]
    pub fn is_redeemable(&self) -> bool {
        self.is_active && !self.is_expired() && !self.is_exhausted()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
