//! Persistence seam for the ledger.
//!
//! [`LedgerRepository`] is the record-level view of the tables; [`LedgerStore`]
//! hands out that view either read-only or inside an all-or-nothing
//! transaction.

pub mod memory;

pub use memory::{LedgerTables, MemoryStore};

use chrono::{DateTime, Utc};

use crate::decimal::Money;
use crate::entities::{Client, Debt, Payment, User};
use crate::errors::Result;
use crate::types::{ClientId, DebtId, PaymentId, UserId};

/// record-level access to users, clients, debts and payments
pub trait LedgerRepository {
    fn user(&self, id: UserId) -> Option<User>;
    fn user_by_phone(&self, phone: &str) -> Option<User>;
    fn users(&self) -> Vec<User>;
    /// insert or replace; phone must be unique across users
    fn save_user(&mut self, user: User) -> Result<()>;

    fn client(&self, id: ClientId) -> Option<Client>;
    fn client_by_phone(&self, phone: &str) -> Option<Client>;
    /// every client, archived included
    fn clients(&self) -> Vec<Client>;
    /// insert or replace; phone must be unique across clients
    fn save_client(&mut self, client: Client) -> Result<()>;

    fn debt(&self, id: DebtId) -> Option<Debt>;
    /// every debt, archived included
    fn debts(&self) -> Vec<Debt>;
    fn debts_for_client(&self, client_id: ClientId) -> Vec<Debt>;
    fn save_debt(&mut self, debt: Debt) -> Result<()>;
    fn delete_debt(&mut self, id: DebtId) -> Result<Debt>;

    fn payment(&self, id: PaymentId) -> Option<Payment>;
    fn payments(&self) -> Vec<Payment>;
    fn payments_for_debt(&self, debt_id: DebtId) -> Vec<Payment>;
    fn save_payment(&mut self, payment: Payment) -> Result<()>;
    fn delete_payment(&mut self, id: PaymentId) -> Result<Payment>;

    fn has_admin(&self) -> bool {
        self.users().iter().any(|u| u.is_admin() && !u.archived)
    }

    fn payments_for_client(&self, client_id: ClientId) -> Vec<Payment> {
        self.debts_for_client(client_id)
            .iter()
            .flat_map(|debt| self.payments_for_debt(debt.id))
            .collect()
    }

    /// payments dated within `[start, end)`
    fn payments_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Payment> {
        self.payments()
            .into_iter()
            .filter(|p| p.payment_date >= start && p.payment_date < end)
            .collect()
    }

    /// sum still owed on a client's active debts
    fn outstanding_for_client(&self, client_id: ClientId) -> Money {
        self.debts_for_client(client_id)
            .iter()
            .filter(|d| d.is_active())
            .map(|d| d.remaining_amount)
            .sum()
    }
}

/// unit-of-work boundary over a repository
pub trait LedgerStore: Send + Sync {
    /// run `f` against a consistent view of the tables
    fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn LedgerRepository) -> Result<T>;

    /// run `f` against a working copy; commits only when `f` returns `Ok`
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn LedgerRepository) -> Result<T>;
}
