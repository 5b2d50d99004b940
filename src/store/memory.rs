use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{LedgerRepository, LedgerStore};
use crate::entities::{Client, Debt, Payment, User};
use crate::errors::{LedgerError, Result};
use crate::types::{ClientId, DebtId, PaymentId, UserId};

/// ordered in-memory tables
#[derive(Debug, Clone, Default)]
pub struct LedgerTables {
    users: BTreeMap<UserId, User>,
    clients: BTreeMap<ClientId, Client>,
    debts: BTreeMap<DebtId, Debt>,
    payments: BTreeMap<PaymentId, Payment>,
}

impl LedgerTables {
    pub fn new() -> Self {
        Self::default()
    }
}

fn by_creation<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    rows.sort_by_key(|row| key(row));
    rows
}

impl LedgerRepository for LedgerTables {
    fn user(&self, id: UserId) -> Option<User> {
        self.users.get(&id).cloned()
    }

    fn user_by_phone(&self, phone: &str) -> Option<User> {
        self.users.values().find(|u| u.phone == phone).cloned()
    }

    fn users(&self) -> Vec<User> {
        by_creation(self.users.values().cloned().collect(), |u| (u.created_at, u.id))
    }

    fn save_user(&mut self, user: User) -> Result<()> {
        if self.users.values().any(|u| u.phone == user.phone && u.id != user.id) {
            return Err(LedgerError::conflict(format!(
                "a user with phone {} already exists",
                user.phone
            )));
        }
        self.users.insert(user.id, user);
        Ok(())
    }

    fn client(&self, id: ClientId) -> Option<Client> {
        self.clients.get(&id).cloned()
    }

    fn client_by_phone(&self, phone: &str) -> Option<Client> {
        self.clients.values().find(|c| c.phone == phone).cloned()
    }

    fn clients(&self) -> Vec<Client> {
        by_creation(self.clients.values().cloned().collect(), |c| (c.created_at, c.id))
    }

    fn save_client(&mut self, client: Client) -> Result<()> {
        if self.clients.values().any(|c| c.phone == client.phone && c.id != client.id) {
            return Err(LedgerError::conflict(format!(
                "a client with phone {} already exists",
                client.phone
            )));
        }
        if !self.users.contains_key(&client.user_id) {
            return Err(LedgerError::not_found("user", client.user_id));
        }
        self.clients.insert(client.id, client);
        Ok(())
    }

    fn debt(&self, id: DebtId) -> Option<Debt> {
        self.debts.get(&id).cloned()
    }

    fn debts(&self) -> Vec<Debt> {
        by_creation(self.debts.values().cloned().collect(), |d| (d.created_at, d.id))
    }

    fn debts_for_client(&self, client_id: ClientId) -> Vec<Debt> {
        by_creation(
            self.debts
                .values()
                .filter(|d| d.client_id == client_id)
                .cloned()
                .collect(),
            |d| (d.created_at, d.id),
        )
    }

    fn save_debt(&mut self, debt: Debt) -> Result<()> {
        if !self.clients.contains_key(&debt.client_id) {
            return Err(LedgerError::not_found("client", debt.client_id));
        }
        self.debts.insert(debt.id, debt);
        Ok(())
    }

    fn delete_debt(&mut self, id: DebtId) -> Result<Debt> {
        if self.payments.values().any(|p| p.debt_id == id) {
            return Err(LedgerError::Storage {
                message: format!("debt {} is still referenced by payments", id),
            });
        }
        self.debts
            .remove(&id)
            .ok_or_else(|| LedgerError::not_found("debt", id))
    }

    fn payment(&self, id: PaymentId) -> Option<Payment> {
        self.payments.get(&id).cloned()
    }

    fn payments(&self) -> Vec<Payment> {
        by_creation(self.payments.values().cloned().collect(), |p| (p.payment_date, p.id))
    }

    fn payments_for_debt(&self, debt_id: DebtId) -> Vec<Payment> {
        by_creation(
            self.payments
                .values()
                .filter(|p| p.debt_id == debt_id)
                .cloned()
                .collect(),
            |p| (p.payment_date, p.id),
        )
    }

    fn save_payment(&mut self, payment: Payment) -> Result<()> {
        if !self.debts.contains_key(&payment.debt_id) {
            return Err(LedgerError::not_found("debt", payment.debt_id));
        }
        self.payments.insert(payment.id, payment);
        Ok(())
    }

    fn delete_payment(&mut self, id: PaymentId) -> Result<Payment> {
        self.payments
            .remove(&id)
            .ok_or_else(|| LedgerError::not_found("payment", id))
    }
}

/// process-local store; writers are serialized by the lock
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<LedgerTables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// copy of the committed tables
    pub fn snapshot(&self) -> LedgerTables {
        self.tables.read().clone()
    }
}

impl LedgerStore for MemoryStore {
    fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn LedgerRepository) -> Result<T>,
    {
        let tables = self.tables.read();
        f(&*tables)
    }

    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn LedgerRepository) -> Result<T>,
    {
        let mut tables = self.tables.write();
        let mut working = tables.clone();
        let output = f(&mut working)?;
        *tables = working;
        Ok(output)
    }
}
