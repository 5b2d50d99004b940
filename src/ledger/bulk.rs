use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::debts::{delete_debt_in, record_transition};
use super::payments::reverse_payment_in;
use super::Ledger;
use crate::access::{require_admin, Caller};
use crate::entities::Debt;
use crate::errors::{LedgerError, Result};
use crate::events::SettlementKind;
use crate::store::LedgerStore;
use crate::types::{DebtId, PaymentId};

/// failure of one item in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItemError {
    pub id: Uuid,
    pub message: String,
}

/// per-item outcome of a batch; errors keep input order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOperationResult {
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Vec<BulkItemError>,
}

impl BulkOperationResult {
    fn record<T>(&mut self, id: Uuid, outcome: Result<T>) {
        match outcome {
            Ok(_) => self.success_count += 1,
            Err(err) => {
                warn!(%id, error = %err, "bulk item failed");
                self.failure_count += 1;
                self.errors.push(BulkItemError {
                    id,
                    message: err.to_string(),
                });
            }
        }
    }

    pub fn is_complete_success(&self) -> bool {
        self.failure_count == 0
    }
}

impl<S: LedgerStore> Ledger<S> {
    /// Administratively settle each debt, whatever its payments say.
    ///
    /// Already settled debts count as successes.
    #[instrument(skip_all, fields(role = %caller.role, items = debt_ids.len()))]
    pub fn settle_debts(&self, caller: &Caller, debt_ids: &[DebtId]) -> Result<BulkOperationResult> {
        require_admin(caller)?;
        let mut result = BulkOperationResult::default();

        for &debt_id in debt_ids {
            let now = self.now();
            let outcome = self.commit(|repo, effects| {
                let mut debt: Debt = repo
                    .debt(debt_id)
                    .ok_or_else(|| LedgerError::not_found("debt", debt_id))?;
                if !debt.is_active() {
                    return Ok(());
                }
                let change = debt.force_settle(now);
                repo.save_debt(debt.clone())?;
                record_transition(repo, effects, &debt, &change, SettlementKind::Override);
                Ok(())
            });
            result.record(debt_id, outcome);
        }

        info!(
            succeeded = result.success_count,
            failed = result.failure_count,
            "bulk settle finished"
        );
        Ok(result)
    }

    /// Delete each debt; debts with payments are refused individually.
    #[instrument(skip_all, fields(role = %caller.role, items = debt_ids.len()))]
    pub fn delete_debts(&self, caller: &Caller, debt_ids: &[DebtId]) -> Result<BulkOperationResult> {
        require_admin(caller)?;
        let mut result = BulkOperationResult::default();

        for &debt_id in debt_ids {
            let now = self.now();
            let outcome = self.commit(|repo, effects| delete_debt_in(repo, effects, debt_id, now));
            result.record(debt_id, outcome);
        }

        info!(
            succeeded = result.success_count,
            failed = result.failure_count,
            "bulk debt delete finished"
        );
        Ok(result)
    }

    /// Reverse and remove each payment.
    #[instrument(skip_all, fields(role = %caller.role, items = payment_ids.len()))]
    pub fn delete_payments(&self, caller: &Caller, payment_ids: &[PaymentId]) -> Result<BulkOperationResult> {
        require_admin(caller)?;
        let mut result = BulkOperationResult::default();

        for &payment_id in payment_ids {
            let now = self.now();
            let outcome =
                self.commit(|repo, effects| reverse_payment_in(repo, effects, payment_id, None, now));
            result.record(payment_id, outcome);
        }

        info!(
            succeeded = result.success_count,
            failed = result.failure_count,
            "bulk payment delete finished"
        );
        Ok(result)
    }
}
