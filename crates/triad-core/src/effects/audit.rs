//! Receipt log

use crate::errors::ConsoleResult;
use crate::identifiers::ReceiptId;
use crate::receipt::Receipt;
use async_trait::async_trait;

/// Append-only audit log. There is no update or delete operation.
#[async_trait]
pub trait ReceiptLogEffects: Send + Sync {
    /// Append one receipt; appending an existing id is `Invalid`
    async fn append(&self, receipt: Receipt) -> ConsoleResult<()>;

    /// Look up one receipt
    async fn get(&self, id: ReceiptId) -> ConsoleResult<Receipt>;

    /// All receipts in append order
    async fn list(&self) -> ConsoleResult<Vec<Receipt>>;
}
