use sea_orm::DatabaseConnection;

use crate::{Notifier, ResultEngine, locks::RealmLocks, realm_cache::RealmCache};

mod access;
mod accounts;
mod bank_accounts;
mod bookings;
mod import;
mod matchers;
mod reads;
mod realms;
mod subscriptions;
mod unbooked;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
///
/// The write form also opens a [`ChangeSet`](crate::ChangeSet) for the
/// block; its events are flushed to subscribers only after the commit.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
    ($self:expr, $user_id:expr, |$tx:ident, $changes:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let mut $changes = $crate::ChangeSet::new($user_id);
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                $self.flush($changes);
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Clone, Debug)]
pub struct Engine {
    database: DatabaseConnection,
    notifier: Notifier,
    realms: RealmCache,
    locks: RealmLocks,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    workers: Option<usize>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Maximum number of subscription reads re-executed at the same time.
    pub fn notification_workers(mut self, workers: usize) -> EngineBuilder {
        self.workers = Some(workers);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            notifier: Notifier::new(self.workers.unwrap_or(Notifier::DEFAULT_WORKERS)),
            realms: RealmCache::default(),
            locks: RealmLocks::default(),
        })
    }
}
