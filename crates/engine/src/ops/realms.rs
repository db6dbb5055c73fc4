use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    AccessLevel, Account, ChangeEventType, Currency, EngineError, Realm, RealmView, ResultEngine,
    STANDARD_ACCOUNTS, accounts, realm_access, realms, users, util::normalize_required_name,
};

use super::{Engine, with_tx};

impl Engine {
    /// Register a user. Credentials are checked by the transport, never by
    /// the engine.
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        is_admin: bool,
    ) -> ResultEngine<()> {
        let username = normalize_required_name(username, "user")?;
        if password.is_empty() {
            return Err(EngineError::Validation(
                "password must not be empty".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            if users::Entity::find_by_id(username.clone())
                .one(&db_tx)
                .await?
                .is_some()
            {
                return Err(EngineError::ExistingKey(username));
            }
            users::ActiveModel {
                username: ActiveValue::Set(username.clone()),
                password: ActiveValue::Set(password.to_string()),
                is_active: ActiveValue::Set(true),
                is_admin: ActiveValue::Set(is_admin),
            }
            .insert(&db_tx)
            .await?;
            info!(%username, is_admin, "user created");
            Ok(())
        })
    }

    /// Create a realm seeded with every standard account, owned by `user_id`.
    pub async fn create_realm(
        &self,
        name: &str,
        currency: Currency,
        user_id: &str,
    ) -> ResultEngine<String> {
        let name = normalize_required_name(name, "realm")?;
        let realm = Realm {
            id: Uuid::new_v4().to_string(),
            name,
            currency,
            last_booking_id: 0,
        };
        let _guard = self.locks.lock(&realm.id).await;
        with_tx!(self, user_id, |db_tx, changes| {
            self.require_user_exists(&db_tx, user_id).await?;

            realms::ActiveModel::from(&realm).insert(&db_tx).await?;
            for (standard, _) in STANDARD_ACCOUNTS {
                let account = Account::standard(&realm.id, standard);
                accounts::ActiveModel::from(&account).insert(&db_tx).await?;
            }
            realm_access::ActiveModel {
                realm_id: ActiveValue::Set(realm.id.clone()),
                user_id: ActiveValue::Set(user_id.to_string()),
                access_level: ActiveValue::Set(AccessLevel::Owner.as_str().to_string()),
            }
            .insert(&db_tx)
            .await?;

            changes
                .record(
                    &db_tx,
                    ChangeEventType::RealmChanged,
                    &realm.id,
                    json!({ "created": realm.id }),
                )
                .await?;
            info!(realm_id = %realm.id, owner = user_id, "realm created");
            Ok(realm.id.clone())
        })
    }

    pub async fn update_realm(
        &self,
        realm_id: &str,
        name: &str,
        currency: Currency,
        user_id: &str,
    ) -> ResultEngine<()> {
        let name = normalize_required_name(name, "realm")?;
        let _guard = self.locks.lock(realm_id).await;
        with_tx!(self, user_id, |db_tx, changes| {
            let model = self
                .require_access(&db_tx, realm_id, user_id, AccessLevel::Owner)
                .await?;
            let mut active: realms::ActiveModel = model.into();
            active.name = ActiveValue::Set(name.clone());
            active.currency = ActiveValue::Set(currency.code().to_string());
            active.update(&db_tx).await?;

            changes
                .record(
                    &db_tx,
                    ChangeEventType::RealmChanged,
                    realm_id,
                    json!({ "name": name, "currency": currency.code() }),
                )
                .await?;
            Ok(())
        })
    }

    /// Grant `level` on a realm to `target_user`; `None` revokes access.
    pub async fn set_realm_access(
        &self,
        realm_id: &str,
        target_user: &str,
        level: AccessLevel,
        user_id: &str,
    ) -> ResultEngine<()> {
        if level == AccessLevel::Admin {
            return Err(EngineError::Validation(
                "admin access is implied by the user, not granted per realm".to_string(),
            ));
        }
        let _guard = self.locks.lock(realm_id).await;
        with_tx!(self, user_id, |db_tx, changes| {
            self.require_access(&db_tx, realm_id, user_id, AccessLevel::Owner)
                .await?;
            self.require_user_exists(&db_tx, target_user).await?;

            let key = (realm_id.to_string(), target_user.to_string());
            let existing = realm_access::Entity::find_by_id(key.clone())
                .one(&db_tx)
                .await?;
            match (existing, level) {
                (Some(_), AccessLevel::None) => {
                    realm_access::Entity::delete_by_id(key).exec(&db_tx).await?;
                }
                (None, AccessLevel::None) => {}
                (Some(row), level) => {
                    let mut active: realm_access::ActiveModel = row.into();
                    active.access_level = ActiveValue::Set(level.as_str().to_string());
                    active.update(&db_tx).await?;
                }
                (None, level) => {
                    realm_access::ActiveModel {
                        realm_id: ActiveValue::Set(realm_id.to_string()),
                        user_id: ActiveValue::Set(target_user.to_string()),
                        access_level: ActiveValue::Set(level.as_str().to_string()),
                    }
                    .insert(&db_tx)
                    .await?;
                }
            }

            changes
                .record(
                    &db_tx,
                    ChangeEventType::RealmChanged,
                    realm_id,
                    json!({ "user": target_user, "accessLevel": level }),
                )
                .await?;
            info!(realm_id, target_user, level = level.as_str(), "realm access changed");
            Ok(())
        })
    }

    /// Realms visible to `user_id`, served from the realm cache.
    pub async fn get_realms(&self, user_id: &str) -> ResultEngine<Vec<RealmView>> {
        let generation = match self.realms.get(user_id) {
            Ok(cached) => return Ok(cached),
            Err(generation) => generation,
        };
        let views: ResultEngine<Vec<RealmView>> = with_tx!(self, |db_tx| {
            let Some(user) = users::Entity::find_by_id(user_id.to_string())
                .one(&db_tx)
                .await?
            else {
                return Ok(Vec::new());
            };
            if !user.is_active {
                return Ok(Vec::new());
            }

            let models: Vec<realms::Model> = if user.is_admin {
                realms::Entity::find()
                    .order_by_asc(realms::Column::Name)
                    .all(&db_tx)
                    .await?
            } else {
                let realm_ids: Vec<String> = realm_access::Entity::find()
                    .filter(realm_access::Column::UserId.eq(user_id.to_string()))
                    .all(&db_tx)
                    .await?
                    .into_iter()
                    .map(|row| row.realm_id)
                    .collect();
                realms::Entity::find()
                    .filter(realms::Column::Id.is_in(realm_ids))
                    .order_by_asc(realms::Column::Name)
                    .all(&db_tx)
                    .await?
            };

            let mut views = Vec::with_capacity(models.len());
            for model in models {
                let access_level = self.access_level_in(&db_tx, &model.id, user_id).await?;
                views.push(RealmView::new(Realm::try_from(model)?, access_level));
            }
            Ok(views)
        });
        let views = views?;
        self.realms.put(user_id, generation, views.clone());
        Ok(views)
    }
}
