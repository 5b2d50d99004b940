use tracing::{debug, info, instrument};

use super::Ledger;
use crate::access::{linked_client, require_admin, resolve_scope, Caller};
use crate::decimal::Money;
use crate::entities::{Client, ClientUpdate, NewClient, User};
use crate::errors::{LedgerError, Result};
use crate::events::LedgerEvent;
use crate::notifications::Notification;
use crate::store::{LedgerRepository, LedgerStore};
use crate::types::{normalize_phone, optional_text, require_text, ClientId, Role};

/// client visible to `caller`, or NotFound
pub(crate) fn visible_client(
    repo: &dyn LedgerRepository,
    caller: &Caller,
    client_id: ClientId,
) -> Result<Client> {
    let scope = resolve_scope(repo, caller)?;
    repo.client(client_id)
        .filter(|c| scope.permits_client(c.id))
        .ok_or_else(|| LedgerError::not_found("client", client_id))
}

impl<S: LedgerStore> Ledger<S> {
    /// Register a client and provision (or reuse) its login user.
    #[instrument(skip_all, fields(role = %caller.role))]
    pub fn create_client(&self, caller: &Caller, input: NewClient) -> Result<Client> {
        require_admin(caller)?;
        let name = require_text("name", &input.name)?;
        let phone = normalize_phone(&input.phone)?;
        let email = optional_text(input.email);
        let address = optional_text(input.address);
        let now = self.now();

        let client = self.commit(|repo, effects| {
            if repo.client_by_phone(&phone).is_some() {
                return Err(LedgerError::conflict(format!(
                    "a client with phone {} already exists",
                    phone
                )));
            }

            let user = match repo.user_by_phone(&phone) {
                Some(existing) if existing.is_admin() => {
                    return Err(LedgerError::conflict(format!(
                        "phone {} belongs to an administrator",
                        phone
                    )));
                }
                Some(mut existing) => {
                    existing.name = name.clone();
                    existing.archived = false;
                    existing.updated_at = now;
                    existing
                }
                None => User::new(name.clone(), phone.clone(), Role::Client, None, now),
            };
            repo.save_user(user.clone())?;

            let client = Client::new(name, email, phone, address, user.id, now);
            repo.save_client(client.clone())?;

            effects.emit(LedgerEvent::ClientRegistered {
                client_id: client.id,
                user_id: user.id,
                timestamp: now,
            });
            effects.notify(Notification::NewClient {
                client_id: client.id,
                name: client.name.clone(),
                phone: client.phone.clone(),
                email: client.email.clone(),
            });
            Ok(client)
        })?;

        info!(client_id = %client.id, "registered client");
        Ok(client)
    }

    /// Change contact details; a phone change moves the login identity too.
    #[instrument(skip_all, fields(role = %caller.role, client_id = %client_id))]
    pub fn update_client(&self, caller: &Caller, client_id: ClientId, update: ClientUpdate) -> Result<Client> {
        require_admin(caller)?;
        let name = update.name.as_deref().map(|n| require_text("name", n)).transpose()?;
        let phone = update.phone.as_deref().map(normalize_phone).transpose()?;
        let now = self.now();

        self.commit(|repo, effects| {
            let mut client = repo
                .client(client_id)
                .ok_or_else(|| LedgerError::not_found("client", client_id))?;

            if let Some(name) = name {
                client.name = name;
            }
            if update.email.is_some() {
                client.email = optional_text(update.email);
            }
            if update.address.is_some() {
                client.address = optional_text(update.address);
            }
            if let Some(phone) = phone {
                if phone != client.phone {
                    let mut user = repo
                        .user(client.user_id)
                        .ok_or_else(|| LedgerError::not_found("user", client.user_id))?;
                    user.phone = phone.clone();
                    user.updated_at = now;
                    repo.save_user(user)?;
                    client.phone = phone;
                }
            }
            client.updated_at = now;
            repo.save_client(client.clone())?;

            effects.emit(LedgerEvent::ClientUpdated {
                client_id,
                timestamp: now,
            });
            Ok(client)
        })
    }

    /// Archive a client with nothing outstanding, along with its login.
    #[instrument(skip_all, fields(role = %caller.role, client_id = %client_id))]
    pub fn archive_client(&self, caller: &Caller, client_id: ClientId) -> Result<Client> {
        require_admin(caller)?;
        let now = self.now();

        let client = self.commit(|repo, effects| {
            let mut client = repo
                .client(client_id)
                .ok_or_else(|| LedgerError::not_found("client", client_id))?;

            let outstanding = repo
                .debts_for_client(client_id)
                .iter()
                .filter(|d| d.is_outstanding())
                .count();
            if outstanding > 0 {
                return Err(LedgerError::conflict(format!(
                    "client {} still has {} active debt(s) with an outstanding balance",
                    client_id, outstanding
                )));
            }

            set_archived(repo, &mut client, true, now)?;
            effects.emit(LedgerEvent::ClientArchived {
                client_id,
                timestamp: now,
            });
            Ok(client)
        })?;

        info!(client_id = %client.id, "archived client");
        Ok(client)
    }

    #[instrument(skip_all, fields(role = %caller.role, client_id = %client_id))]
    pub fn unarchive_client(&self, caller: &Caller, client_id: ClientId) -> Result<Client> {
        require_admin(caller)?;
        let now = self.now();

        self.commit(|repo, effects| {
            let mut client = repo
                .client(client_id)
                .ok_or_else(|| LedgerError::not_found("client", client_id))?;
            set_archived(repo, &mut client, false, now)?;
            effects.emit(LedgerEvent::ClientRestored {
                client_id,
                timestamp: now,
            });
            Ok(client)
        })
    }

    /// Non-archived clients; a client caller sees only itself.
    #[instrument(skip_all, fields(role = %caller.role))]
    pub fn clients(&self, caller: &Caller) -> Result<Vec<Client>> {
        self.read(|repo| {
            if caller.is_admin() {
                let clients: Vec<Client> = repo.clients().into_iter().filter(|c| !c.archived).collect();
                debug!(count = clients.len(), "listed clients");
                Ok(clients)
            } else {
                Ok(vec![linked_client(repo, caller)?])
            }
        })
    }

    #[instrument(skip_all, fields(role = %caller.role))]
    pub fn archived_clients(&self, caller: &Caller) -> Result<Vec<Client>> {
        require_admin(caller)?;
        self.read(|repo| Ok(repo.clients().into_iter().filter(|c| c.archived).collect()))
    }

    #[instrument(skip_all, fields(role = %caller.role, client_id = %client_id))]
    pub fn client(&self, caller: &Caller, client_id: ClientId) -> Result<Client> {
        self.read(|repo| visible_client(repo, caller, client_id))
    }

    /// Sum still owed across a client's active debts.
    #[instrument(skip_all, fields(role = %caller.role, client_id = %client_id))]
    pub fn outstanding_for_client(&self, caller: &Caller, client_id: ClientId) -> Result<Money> {
        self.read(|repo| {
            let client = visible_client(repo, caller, client_id)?;
            Ok(repo.outstanding_for_client(client.id))
        })
    }
}

fn set_archived(
    repo: &mut dyn LedgerRepository,
    client: &mut Client,
    archived: bool,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    if let Some(mut user) = repo.user(client.user_id) {
        user.archived = archived;
        user.updated_at = now;
        repo.save_user(user)?;
    }
    client.archived = archived;
    client.updated_at = now;
    repo.save_client(client.clone())
}
