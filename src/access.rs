//! Role-gated visibility.
//!
//! Admins see the whole ledger. A client caller is resolved to the client
//! record linked to its login phone, and every read is narrowed to that
//! client's debts and payments.

use serde::{Deserialize, Serialize};

use crate::entities::{Client, Debt};
use crate::errors::{LedgerError, Result};
use crate::store::LedgerRepository;
use crate::types::{ClientId, Role};

/// authenticated identity making a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub phone: String,
    pub role: Role,
}

impl Caller {
    pub fn admin(phone: impl Into<String>) -> Self {
        Self { phone: phone.into(), role: Role::Admin }
    }

    pub fn client(phone: impl Into<String>) -> Self {
        Self { phone: phone.into(), role: Role::Client }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// the slice of the ledger a caller may read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Client(ClientId),
}

impl Scope {
    pub fn permits_client(&self, client_id: ClientId) -> bool {
        match self {
            Scope::All => true,
            Scope::Client(own) => *own == client_id,
        }
    }

    pub fn permits_debt(&self, debt: &Debt) -> bool {
        self.permits_client(debt.client_id)
    }
}

/// gate for operations reserved to administrators
pub fn require_admin(caller: &Caller) -> Result<()> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(LedgerError::forbidden("operation requires the ADMIN role"))
    }
}

/// client record linked to a caller's login identity
pub fn linked_client(repo: &dyn LedgerRepository, caller: &Caller) -> Result<Client> {
    repo.client_by_phone(&caller.phone)
        .ok_or_else(|| LedgerError::NotFound {
            entity: "client for user",
            id: caller.phone.clone(),
        })
}

/// resolve what a caller may see
pub fn resolve_scope(repo: &dyn LedgerRepository, caller: &Caller) -> Result<Scope> {
    match caller.role {
        Role::Admin => Ok(Scope::All),
        Role::Client => Ok(Scope::Client(linked_client(repo, caller)?.id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Money;
    use crate::entities::User;
    use crate::store::LedgerTables;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_require_admin() {
        assert!(require_admin(&Caller::admin("+15550001")).is_ok());
        let err = require_admin(&Caller::client("+15550002")).unwrap_err();
        assert!(matches!(err, LedgerError::Forbidden { .. }));
    }

    #[test]
    fn test_client_scope_resolution() {
        let mut tables = LedgerTables::default();
        let now = Utc::now();
        let user = User::new("Ana".to_string(), "+15550002".to_string(), Role::Client, None, now);
        let client = Client::new("Ana".to_string(), None, "+15550002".to_string(), None, user.id, now);
        tables.save_user(user).unwrap();
        tables.save_client(client.clone()).unwrap();

        let scope = resolve_scope(&tables, &Caller::client("+15550002")).unwrap();
        assert_eq!(scope, Scope::Client(client.id));

        let own = Debt::new(client.id, Money::from_major(10), "own".to_string(), None, now);
        let other = Debt::new(Uuid::new_v4(), Money::from_major(10), "other".to_string(), None, now);
        assert!(scope.permits_debt(&own));
        assert!(!scope.permits_debt(&other));

        assert_eq!(resolve_scope(&tables, &Caller::admin("+15550001")).unwrap(), Scope::All);

        let missing = resolve_scope(&tables, &Caller::client("+15559999")).unwrap_err();
        assert!(matches!(missing, LedgerError::NotFound { .. }));
    }
}
