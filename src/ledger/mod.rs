//! Ledger operations.
//!
//! Every mutation runs as one store transaction. Events and notifications are
//! collected while the transaction runs and only leave the ledger after it
//! committed: events go to the journal, notifications to the dispatcher.

mod bulk;
mod clients;
mod debts;
mod identity;
mod payments;

pub use bulk::{BulkItemError, BulkOperationResult};
pub(crate) use clients::visible_client;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::{SafeTimeProvider, TimeSource};
use parking_lot::Mutex;

use crate::access::{require_admin, Caller};
use crate::balance::{self, BalanceDiscrepancy};
use crate::config::LedgerConfig;
use crate::errors::Result;
use crate::events::{EventStore, LedgerEvent};
use crate::notifications::{Notification, NotificationDispatcher, Notifier, TracingNotifier};
use crate::store::{LedgerRepository, LedgerStore, MemoryStore};

/// side effects recorded inside one transaction
#[derive(Debug, Default)]
pub(crate) struct Effects {
    events: EventStore,
    notifications: Vec<Notification>,
}

impl Effects {
    pub(crate) fn emit(&mut self, event: LedgerEvent) {
        self.events.emit(event);
    }

    pub(crate) fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }
}

/// the debt and payment ledger
pub struct Ledger<S: LedgerStore = MemoryStore> {
    store: S,
    time: Arc<SafeTimeProvider>,
    config: LedgerConfig,
    dispatcher: NotificationDispatcher,
    journal: Mutex<EventStore>,
}

impl Ledger<MemoryStore> {
    /// in-memory ledger on the system clock with default settings
    pub fn in_memory() -> Result<Self> {
        LedgerBuilder::new(MemoryStore::new()).build()
    }
}

impl<S: LedgerStore> Ledger<S> {
    pub fn builder(store: S) -> LedgerBuilder<S> {
        LedgerBuilder::new(store)
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.time.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// drain the journal of committed events
    pub fn take_events(&self) -> Vec<LedgerEvent> {
        self.journal.lock().take_events()
    }

    /// copy of the committed events not yet taken
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.journal.lock().events().to_vec()
    }

    /// debts whose stored balance disagrees with their payments
    #[tracing::instrument(skip_all, fields(role = %caller.role))]
    pub fn verify_balances(&self, caller: &Caller) -> Result<Vec<BalanceDiscrepancy>> {
        require_admin(caller)?;
        self.read(|repo| {
            Ok(repo
                .debts()
                .iter()
                .filter_map(|debt| balance::reconcile(debt, &repo.payments_for_debt(debt.id)))
                .collect())
        })
    }

    pub(crate) fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn LedgerRepository) -> Result<T>,
    {
        self.store.read(f)
    }

    /// run `f` in a transaction; publish its effects only after commit
    pub(crate) fn commit<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn LedgerRepository, &mut Effects) -> Result<T>,
    {
        let (value, mut effects) = self.store.transaction(|repo| {
            let mut effects = Effects::default();
            let value = f(repo, &mut effects)?;
            Ok((value, effects))
        })?;

        self.journal.lock().extend(effects.events.take_events());
        self.notify(&effects.notifications);
        Ok(value)
    }

    pub(crate) fn notify(&self, notifications: &[Notification]) -> usize {
        if notifications.is_empty() {
            return 0;
        }
        self.dispatcher.dispatch(notifications)
    }
}

/// builder for [`Ledger`]
pub struct LedgerBuilder<S: LedgerStore> {
    store: S,
    time: Option<Arc<SafeTimeProvider>>,
    notifier: Option<Arc<dyn Notifier>>,
    config: Option<LedgerConfig>,
}

impl<S: LedgerStore> LedgerBuilder<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            time: None,
            notifier: None,
            config: None,
        }
    }

    pub fn clock(mut self, time: Arc<SafeTimeProvider>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config(mut self, config: LedgerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<Ledger<S>> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Ledger {
            store: self.store,
            time: self
                .time
                .unwrap_or_else(|| Arc::new(SafeTimeProvider::new(TimeSource::System))),
            config,
            dispatcher: NotificationDispatcher::new(
                self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
            ),
            journal: Mutex::new(EventStore::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::DiscrepancyKind;
    use crate::decimal::Money;
    use crate::entities::NewDebt;
    use crate::errors::LedgerError;
    use crate::testing::Fixture;

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = LedgerConfig {
            recent_payments_limit: 0,
            ..LedgerConfig::default()
        };
        let result = Ledger::builder(MemoryStore::new()).config(config).build();
        assert!(matches!(result, Err(LedgerError::Configuration { .. })));
    }

    #[test]
    fn test_failed_mutation_publishes_nothing() {
        let fx = Fixture::new();
        let client = fx.client("Nora", "+15552000");
        fx.ledger.take_events();

        let err = fx
            .ledger
            .create_debt(&fx.admin, NewDebt::new(client.id, Money::ZERO, "ring"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation { .. }));
        assert!(fx.ledger.take_events().is_empty());
    }

    #[test]
    fn test_verify_balances_reports_overrides() {
        let fx = Fixture::new();
        let client = fx.client("Nora", "+15552000");
        let debt = fx.debt(&client, 100);
        fx.pay(&debt, 30);

        assert!(fx.ledger.verify_balances(&fx.admin).unwrap().is_empty());

        fx.ledger.settle_debts(&fx.admin, &[debt.id]).unwrap();
        let findings = fx.ledger.verify_balances(&fx.admin).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, DiscrepancyKind::SettlementOverride);
        assert_eq!(findings[0].expected_remaining, Money::from_major(70));

        let client_caller = fx.caller_for(&client);
        assert!(matches!(
            fx.ledger.verify_balances(&client_caller),
            Err(LedgerError::Forbidden { .. })
        ));
    }
}
