use sea_orm::TransactionTrait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    AccessLevel, ChangeEventType, ChangeSet, Push, ReadRequest, ResultEngine, Subscription,
    notify::Run,
};

use super::{Engine, with_tx};

impl Engine {
    /// Dispatch the events of a committed change set.
    ///
    /// The realm list cache is dropped before anything else sees a
    /// `RealmChanged` event. Each triggered subscription re-runs its read
    /// on its own task, in a fresh read transaction, so a slow subscriber
    /// never holds up the writer. A subscription triggered while its read
    /// is in flight is read once more by that same task, so pushes leave
    /// in commit order and the last one reflects the last commit.
    pub(super) fn flush(&self, changes: ChangeSet) {
        let events = changes.into_events();
        if events.is_empty() {
            return;
        }
        if events
            .iter()
            .any(|e| e.event_type == Some(ChangeEventType::RealmChanged))
        {
            self.realms.invalidate();
        }

        for run in self.notifier.schedule(&events) {
            let engine = self.clone();
            tokio::spawn(async move { engine.deliver(run).await });
        }
    }

    async fn deliver(&self, run: Run) {
        let Run {
            mut subscription,
            token,
        } = run;
        loop {
            let Some(permit) = self.notifier.acquire().await else {
                return;
            };
            let push = match self.read(&subscription.request, &subscription.user_id).await {
                Ok(result) => Push {
                    subscription_id: subscription.id.clone(),
                    result: Some(result),
                    error: None,
                },
                Err(err) => Push {
                    subscription_id: subscription.id.clone(),
                    result: None,
                    error: Some(err.to_string()),
                },
            };
            drop(permit);
            if subscription.sender.send(push).is_err() {
                warn!(
                    subscription_id = %subscription.id,
                    session_id = %subscription.session_id,
                    "subscriber channel closed, dropping subscription"
                );
                self.notifier.remove(&subscription.id);
                return;
            }
            debug!(subscription_id = %subscription.id, "pushed");

            match self.notifier.finish(&subscription.id, token) {
                Some(next) => subscription = next,
                None => return,
            }
        }
    }

    /// Register a live read. The current result is pushed right away and
    /// again after every commit that can change it.
    pub async fn subscribe(
        &self,
        subscription_id: &str,
        request: ReadRequest,
        user_id: &str,
        session_id: &str,
        sender: mpsc::UnboundedSender<Push>,
    ) -> ResultEngine<()> {
        if let Some(realm_id) = request.realm_id() {
            let checked: ResultEngine<()> = with_tx!(self, |db_tx| {
                self.require_access(&db_tx, realm_id, user_id, AccessLevel::Read)
                    .await?;
                Ok(())
            });
            checked?;
        }

        self.notifier.insert(Subscription {
            id: subscription_id.to_string(),
            request,
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            sender,
        });
        let mut changes = ChangeSet::new(user_id);
        changes.target(subscription_id);
        self.flush(changes);
        debug!(subscription_id, session_id, "subscribed");
        Ok(())
    }

    pub fn unsubscribe(&self, subscription_id: &str) -> bool {
        self.notifier.remove(subscription_id)
    }

    /// Drop every subscription of a closed transport session.
    pub fn unsubscribe_session(&self, session_id: &str) -> usize {
        let removed = self.notifier.remove_session(session_id);
        debug!(session_id, removed, "session subscriptions dropped");
        removed
    }
}
