use serde::Serialize;

use crate::domain::{Balance, Transaction};

/// Outcome of a posting as seen by the acting account.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub balance: Balance,
    pub transaction: Transaction,
}

impl From<Transaction> for Receipt {
    fn from(transaction: Transaction) -> Self {
        Self {
            balance: transaction.resulting_balance,
            transaction,
        }
    }
}
