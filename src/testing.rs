//! Shared test fixture: a memory-backed ledger on a controllable clock.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use hourglass_rs::{SafeTimeProvider, TimeSource};

use crate::access::Caller;
use crate::decimal::Money;
use crate::entities::{Client, Debt, NewClient, NewDebt, NewPayment, Payment};
use crate::ledger::Ledger;
use crate::notifications::RecordingNotifier;
use crate::store::MemoryStore;
use crate::types::PaymentMethod;

pub(crate) const ADMIN_PHONE: &str = "+15550001";

pub(crate) struct Fixture {
    pub ledger: Ledger<MemoryStore>,
    pub admin: Caller,
    pub notifier: Arc<RecordingNotifier>,
    pub time: Arc<SafeTimeProvider>,
}

impl Fixture {
    /// Ledger with one administrator; the clock reads Monday 2024-06-10 10:00 UTC.
    pub fn new() -> Self {
        let start = Utc.with_ymd_and_hms(2024, 6, 10, 10, 0, 0).unwrap();
        let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(start)));
        let notifier = Arc::new(RecordingNotifier::new());
        let ledger = Ledger::builder(MemoryStore::new())
            .clock(time.clone())
            .notifier(notifier.clone())
            .build()
            .unwrap();
        ledger.bootstrap_admin("Owner", ADMIN_PHONE, None).unwrap();

        Self {
            ledger,
            admin: Caller::admin(ADMIN_PHONE),
            notifier,
            time,
        }
    }

    pub fn client(&self, name: &str, phone: &str) -> Client {
        self.ledger
            .create_client(&self.admin, NewClient::new(name, phone))
            .unwrap()
    }

    pub fn caller_for(&self, client: &Client) -> Caller {
        Caller::client(client.phone.clone())
    }

    pub fn debt(&self, client: &Client, major: i64) -> Debt {
        self.debt_with(client, major, "Gold chain")
    }

    pub fn debt_with(&self, client: &Client, major: i64, description: &str) -> Debt {
        self.ledger
            .create_debt(
                &self.admin,
                NewDebt::new(client.id, Money::from_major(major), description),
            )
            .unwrap()
    }

    /// cash payment recorded by the administrator
    pub fn pay(&self, debt: &Debt, major: i64) -> Payment {
        self.ledger
            .add_payment(
                &self.admin,
                NewPayment::new(debt.id, Money::from_major(major), PaymentMethod::Cash),
            )
            .unwrap()
    }

    pub fn advance(&self, by: Duration) {
        self.time.test_control().unwrap().advance(by);
    }
}
