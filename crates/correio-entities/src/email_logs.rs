//! Email logs entity
//!
//! One row per dispatch attempt. Provider webhook events later advance the
//! row's status using `provider_message_id` as the join key.

use crate::types::EmailStatus;
use async_trait::async_trait;
use correio_core::DBDateTime;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "email_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    /// Free-form category, e.g. VERIFICATION or PASSWORD_RESET. Kept as
    /// text so new categories need no migration.
    pub email_type: String,
    pub subject: String,
    pub status: EmailStatus,
    /// Human-readable trail of what happened, appended on every event.
    pub status_details: Option<String>,
    /// Provider-assigned message id, set once when the send is accepted
    /// and never changed afterwards.
    pub provider_message_id: Option<String>,
    /// Weak reference: logs outlive user deletion.
    pub user_id: Option<i32>,
    pub created_at: DBDateTime,
    pub updated_at: DBDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = chrono::Utc::now();

        if insert {
            if self.created_at.is_not_set() {
                self.created_at = Set(now);
            }
            if self.updated_at.is_not_set() {
                self.updated_at = Set(now);
            }
        } else {
            self.updated_at = Set(now);
        }

        Ok(self)
    }
}
