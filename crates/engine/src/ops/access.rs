use sea_orm::{DatabaseTransaction, TransactionTrait, prelude::*};

use crate::{AccessLevel, EngineError, ResultEngine, realm_access, realms, users};

use super::{Engine, with_tx};

impl Engine {
    /// Access `user_id` holds on `realm_id`.
    ///
    /// Admin users hold `Admin` on every realm; unknown and inactive users
    /// hold nothing.
    pub(super) async fn access_level_in(
        &self,
        db: &DatabaseTransaction,
        realm_id: &str,
        user_id: &str,
    ) -> ResultEngine<AccessLevel> {
        let Some(user) = users::Entity::find_by_id(user_id.to_string())
            .one(db)
            .await?
        else {
            return Ok(AccessLevel::None);
        };
        if !user.is_active {
            return Ok(AccessLevel::None);
        }
        if user.is_admin {
            return Ok(AccessLevel::Admin);
        }
        realm_access::Entity::find_by_id((realm_id.to_string(), user_id.to_string()))
            .one(db)
            .await?
            .map_or(Ok(AccessLevel::None), |row| {
                AccessLevel::try_from(row.access_level.as_str())
            })
    }

    /// Fails with `Unauthorized` unless `user_id` holds at least `level` on
    /// the realm. Must run before any side effect of the calling operation.
    pub(super) async fn require_access(
        &self,
        db: &DatabaseTransaction,
        realm_id: &str,
        user_id: &str,
        level: AccessLevel,
    ) -> ResultEngine<realms::Model> {
        let realm = realms::Entity::find_by_id(realm_id.to_string())
            .one(db)
            .await?;
        let granted = self.access_level_in(db, realm_id, user_id).await?;
        let Some(realm) = realm else {
            // Do not reveal realm ids to users without access.
            if granted == AccessLevel::Admin {
                return Err(EngineError::NotFound(format!("realm {realm_id}")));
            }
            return Err(EngineError::Unauthorized(format!(
                "{user_id} has no access to realm {realm_id}"
            )));
        };
        if !granted.has_access(level) {
            return Err(EngineError::Unauthorized(format!(
                "{user_id} needs {} access to realm {realm_id}",
                level.as_str()
            )));
        }
        Ok(realm)
    }

    pub(super) async fn require_user_exists(
        &self,
        db: &DatabaseTransaction,
        username: &str,
    ) -> ResultEngine<()> {
        let exists = users::Entity::find_by_id(username.to_string())
            .one(db)
            .await?
            .is_some();
        if !exists {
            return Err(EngineError::NotFound(format!("user {username}")));
        }
        Ok(())
    }

    /// Access level of `user_id` on `realm_id`.
    pub async fn access_level(&self, realm_id: &str, user_id: &str) -> ResultEngine<AccessLevel> {
        with_tx!(self, |db_tx| {
            let level = self.access_level_in(&db_tx, realm_id, user_id).await?;
            Ok(level)
        })
    }
}
