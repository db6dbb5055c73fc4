//! Append-only change log and the per-call change set.
//!
//! Every mutation records one or more typed events into a [`ChangeSet`]
//! while its database transaction is open. Recording writes the changelog
//! row through the same transaction, so the log commits or rolls back with
//! the mutation. The queued [`ChangeEvent`]s are handed to the notifier only
//! after a successful commit.

use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseTransaction, entity::prelude::*};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ResultEngine;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeEventType {
    RealmChanged,
    AccountsChanged,
    BookingAdded,
    BookingsChanged,
    BankAccountUpdated,
    UnbookedTransactionsChanged,
    UnbookedTransactionMatchersChanged,
}

impl ChangeEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RealmChanged => "realmChanged",
            Self::AccountsChanged => "accountsChanged",
            Self::BookingAdded => "bookingAdded",
            Self::BookingsChanged => "bookingsChanged",
            Self::BankAccountUpdated => "bankAccountUpdated",
            Self::UnbookedTransactionsChanged => "unbookedTransactionsChanged",
            Self::UnbookedTransactionMatchersChanged => "unbookedTransactionMatchersChanged",
        }
    }
}

/// One entry of the post-commit notification queue.
///
/// `event_type == None` targets the single subscription in
/// `subscription_id`; otherwise the event is broadcast to every
/// subscription whose read it affects.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChangeEvent {
    pub event_type: Option<ChangeEventType>,
    pub realm_id: Option<String>,
    pub subscription_id: Option<String>,
}

impl ChangeEvent {
    pub fn broadcast(event_type: ChangeEventType, realm_id: Option<String>) -> Self {
        Self {
            event_type: Some(event_type),
            realm_id,
            subscription_id: None,
        }
    }

    pub fn targeted(subscription_id: impl Into<String>) -> Self {
        Self {
            event_type: None,
            realm_id: None,
            subscription_id: Some(subscription_id.into()),
        }
    }
}

/// Events collected by one engine call.
#[derive(Debug, Default)]
pub struct ChangeSet {
    user_id: String,
    events: Vec<ChangeEvent>,
}

impl ChangeSet {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            events: Vec::new(),
        }
    }

    /// Appends a changelog row inside `db_tx` and queues the event.
    pub async fn record(
        &mut self,
        db_tx: &DatabaseTransaction,
        event_type: ChangeEventType,
        realm_id: &str,
        payload: serde_json::Value,
    ) -> ResultEngine<()> {
        debug!(event = event_type.as_str(), realm_id, "recording change");
        let row = ActiveModel {
            id: ActiveValue::NotSet,
            event_type: ActiveValue::Set(event_type.as_str().to_string()),
            payload: ActiveValue::Set(payload.to_string()),
            created_at: ActiveValue::Set(Utc::now()),
            created_by_user_id: ActiveValue::Set(self.user_id.clone()),
        };
        row.insert(db_tx).await?;
        self.events
            .push(ChangeEvent::broadcast(event_type, Some(realm_id.to_string())));
        Ok(())
    }

    /// Queues a push for one subscription without writing to the log.
    pub fn target(&mut self, subscription_id: impl Into<String>) {
        self.events.push(ChangeEvent::targeted(subscription_id));
    }

    /// Distinct events in recording order.
    pub fn into_events(self) -> Vec<ChangeEvent> {
        let mut out: Vec<ChangeEvent> = Vec::with_capacity(self.events.len());
        for event in self.events {
            if !out.contains(&event) {
                out.push(event);
            }
        }
        out
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "changelog")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub event_type: String,
    pub payload: String,
    pub created_at: DateTimeUtc,
    pub created_by_user_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
