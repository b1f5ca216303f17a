//! Transfer service
//!
//! A transfer is two linked legs committed together: an outflow on the
//! source and an inflow on the destination. Both account locks are taken in
//! ascending id order, so opposite-direction transfers cannot deadlock.

use chrono::NaiveDate;
use tracing::info;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{AccountId, Money, OwnerId, Transaction, TransferId, TransferResult};
use crate::storage::{Changeset, Storage};

use super::account::AccountService;
use super::locks::LockManager;
use super::period::PeriodService;

/// Input for a new transfer
#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    /// Positive amount moved from source to destination
    pub amount: Money,
    pub occurred_at: NaiveDate,
    pub memo: String,
}

impl NewTransfer {
    pub fn new(from: AccountId, to: AccountId, amount: Money, occurred_at: NaiveDate) -> Self {
        Self {
            from_account_id: from,
            to_account_id: to,
            amount,
            occurred_at,
            memo: String::new(),
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }
}

/// Service for transfers between an owner's accounts
pub struct TransferService<'a> {
    storage: &'a Storage,
    locks: &'a LockManager,
}

impl<'a> TransferService<'a> {
    pub fn new(storage: &'a Storage, locks: &'a LockManager) -> Self {
        Self { storage, locks }
    }

    /// Move money between two accounts of the same owner
    pub fn record_transfer(&self, owner_id: OwnerId, input: NewTransfer) -> LedgerResult<TransferResult> {
        if !input.amount.is_positive() {
            return Err(LedgerError::Validation(
                "transfer amount must be positive".into(),
            ));
        }
        if input.from_account_id == input.to_account_id {
            return Err(LedgerError::Validation(
                "cannot transfer to the same account".into(),
            ));
        }

        let accounts = AccountService::new(self.storage, self.locks);
        accounts.owned(owner_id, input.from_account_id)?;
        accounts.owned(owner_id, input.to_account_id)?;

        let result = self.locks.shared(owner_id, || {
            self.locks
                .with_accounts(&[input.from_account_id, input.to_account_id], || {
                    let period = PeriodService::new(self.storage, self.locks)
                        .resolve_open(owner_id, input.occurred_at)?;

                    let (outflow, inflow) = Transaction::transfer_pair(
                        owner_id,
                        input.from_account_id,
                        input.to_account_id,
                        period.id,
                        input.amount,
                        input.occurred_at,
                    );
                    let outflow = outflow.with_memo(input.memo.clone());
                    let inflow = inflow.with_memo(input.memo.clone());

                    let transfer_id = outflow.transfer_id.ok_or_else(|| {
                        LedgerError::InvariantViolation("transfer leg has no transfer id".into())
                    })?;

                    let mut changes = Changeset::new();
                    self.stage_transfer(&mut changes, &outflow, &inflow)?;
                    self.storage.commit(changes)?;

                    Ok(TransferResult {
                        transfer_id,
                        outflow,
                        inflow,
                    })
                })
        })?;

        info!(
            transfer = %result.transfer_id,
            from = %input.from_account_id,
            to = %input.to_account_id,
            amount = %input.amount,
            "transfer recorded"
        );
        Ok(result)
    }

    /// Post both legs against their accounts and stage them
    ///
    /// The caller holds both account locks and the owner's shared gate.
    pub(crate) fn stage_transfer(
        &self,
        changes: &mut Changeset,
        outflow: &Transaction,
        inflow: &Transaction,
    ) -> LedgerResult<()> {
        for leg in [outflow, inflow] {
            leg.validate()
                .map_err(|e| LedgerError::Validation(e.to_string()))?;
        }
        if outflow.transfer_id != inflow.transfer_id || outflow.amount != -inflow.amount {
            return Err(LedgerError::InvariantViolation(
                "transfer legs do not match".into(),
            ));
        }

        let accounts = AccountService::new(self.storage, self.locks);
        accounts.post(changes, outflow.account_id, outflow.amount)?;
        accounts.post(changes, inflow.account_id, inflow.amount)?;

        changes
            .insert_transaction(outflow.clone())
            .insert_transaction(inflow.clone());
        Ok(())
    }

    /// Both legs of a committed transfer
    pub fn get_transfer(&self, owner_id: OwnerId, transfer_id: TransferId) -> LedgerResult<TransferResult> {
        let legs = self.storage.transactions.transfer_legs(transfer_id)?;
        let not_found = || LedgerError::NotFound {
            entity_type: "Transfer",
            identifier: transfer_id.to_string(),
        };

        let outflow = legs.iter().find(|t| t.amount.is_negative()).cloned().ok_or_else(not_found)?;
        let inflow = legs.iter().find(|t| t.amount.is_positive()).cloned().ok_or_else(not_found)?;
        if outflow.owner_id != owner_id {
            return Err(LedgerError::Validation(format!(
                "transfer {} belongs to another owner",
                transfer_id
            )));
        }

        Ok(TransferResult {
            transfer_id,
            outflow,
            inflow,
        })
    }
}
