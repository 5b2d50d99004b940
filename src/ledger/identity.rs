use tracing::{info, instrument};

use super::Ledger;
use crate::access::{require_admin, Caller};
use crate::entities::User;
use crate::errors::{LedgerError, Result};
use crate::events::LedgerEvent;
use crate::store::LedgerStore;
use crate::types::{normalize_phone, require_text, Role};

impl<S: LedgerStore> Ledger<S> {
    /// First administrator of an empty ledger. Refused once any admin exists.
    #[instrument(skip_all)]
    pub fn bootstrap_admin(
        &self,
        name: &str,
        phone: &str,
        password_hash: Option<String>,
    ) -> Result<User> {
        let name = require_text("name", name)?;
        let phone = normalize_phone(phone)?;
        let now = self.now();

        let user = self.commit(|repo, effects| {
            if repo.has_admin() {
                return Err(LedgerError::conflict("an administrator already exists"));
            }
            let user = User::new(name, phone, Role::Admin, password_hash, now);
            repo.save_user(user.clone())?;
            effects.emit(LedgerEvent::AdminCreated {
                user_id: user.id,
                timestamp: now,
            });
            Ok(user)
        })?;

        info!(user_id = %user.id, "bootstrapped administrator");
        Ok(user)
    }

    #[instrument(skip_all, fields(role = %caller.role))]
    pub fn create_admin(
        &self,
        caller: &Caller,
        name: &str,
        phone: &str,
        password_hash: Option<String>,
    ) -> Result<User> {
        require_admin(caller)?;
        let name = require_text("name", name)?;
        let phone = normalize_phone(phone)?;
        let now = self.now();

        let user = self.commit(|repo, effects| {
            let user = User::new(name, phone, Role::Admin, password_hash, now);
            repo.save_user(user.clone())?;
            effects.emit(LedgerEvent::AdminCreated {
                user_id: user.id,
                timestamp: now,
            });
            Ok(user)
        })?;

        info!(user_id = %user.id, "created administrator");
        Ok(user)
    }

    /// Resolve a login phone to the identity used for every other call.
    ///
    /// Credential checks belong to the caller's auth layer; this only maps the
    /// identity and refuses archived accounts.
    #[instrument(skip_all)]
    pub fn authenticate(&self, phone: &str) -> Result<Caller> {
        let phone = normalize_phone(phone)?;
        let user = self.read(|repo| {
            repo.user_by_phone(&phone).ok_or_else(|| LedgerError::NotFound {
                entity: "user",
                id: phone.clone(),
            })
        })?;

        if user.archived {
            return Err(LedgerError::forbidden(format!("user {} is archived", user.phone)));
        }
        Ok(Caller {
            phone: user.phone,
            role: user.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::access::Caller;
    use crate::errors::LedgerError;
    use crate::events::LedgerEvent;
    use crate::testing::Fixture;
    use crate::types::Role;

    #[test]
    fn test_bootstrap_only_once() {
        let fx = Fixture::new();
        let err = fx
            .ledger
            .bootstrap_admin("Second", "+15559998", None)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict { .. }));
    }

    #[test]
    fn test_create_admin_requires_admin() {
        let fx = Fixture::new();
        let client = fx.client("Omar", "+15552100");

        let err = fx
            .ledger
            .create_admin(&fx.caller_for(&client), "Eve", "+15552101", None)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Forbidden { .. }));

        fx.ledger.take_events();
        let admin = fx
            .ledger
            .create_admin(&fx.admin, "Eve", "+15552101", Some("hash".to_string()))
            .unwrap();
        assert!(admin.is_admin());
        assert!(matches!(
            fx.ledger.take_events().as_slice(),
            [LedgerEvent::AdminCreated { .. }]
        ));
    }

    #[test]
    fn test_authenticate() {
        let fx = Fixture::new();
        let client = fx.client("Omar", "+15552100");

        let caller = fx.ledger.authenticate(" +15552100 ").unwrap();
        assert_eq!(caller, Caller::client("+15552100"));
        assert_eq!(fx.ledger.authenticate(&fx.admin.phone).unwrap().role, Role::Admin);

        assert!(matches!(
            fx.ledger.authenticate("+15550000"),
            Err(LedgerError::NotFound { .. })
        ));

        fx.ledger.archive_client(&fx.admin, client.id).unwrap();
        assert!(matches!(
            fx.ledger.authenticate("+15552100"),
            Err(LedgerError::Forbidden { .. })
        ));
    }
}
