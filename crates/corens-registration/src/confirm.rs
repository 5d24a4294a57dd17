//! Bounded wait for a submitted transaction
//!
//! Polls for the receipt at a fixed interval. Receipt query failures are
//! logged and retried on the next tick; only the overall timeout ends the
//! wait without a receipt.

use std::time::Duration;

use corens_core::{Error, Result, TxReceipt};
use corens_session::RegistrarClient;
use ethers::types::H256;

/// Wait until `tx_hash` is mined or `timeout` elapses.
///
/// # Errors
/// `ConfirmationTimeout` when no receipt arrived in time. The transaction
/// may still be mined later.
pub async fn await_confirmation(
    registrar: &RegistrarClient,
    tx_hash: H256,
    timeout: Duration,
    poll: Duration,
) -> Result<TxReceipt> {
    let wait = async {
        let mut attempts: u64 = 0;
        loop {
            attempts += 1;
            match registrar.receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    tracing::debug!("Receipt for {:?} after {} polls", tx_hash, attempts);
                    return receipt;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Receipt query for {:?} failed: {}", tx_hash, e),
            }
            tokio::time::sleep(poll).await;
        }
    };

    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| Error::ConfirmationTimeout {
            tx_hash,
            secs: timeout.as_secs(),
        })
}
