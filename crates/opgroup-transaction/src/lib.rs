/// Token-group SDK - UTXO transaction model and wire serialization.
///
/// Provides outpoints, inputs, outputs and the `Transaction` type with its
/// binary/hex encoding, txid computation, and coinbase/coinstake detection.

pub mod transaction;
pub mod input;
pub mod output;

mod error;
pub use error::TransactionError;
pub use transaction::Transaction;
pub use input::{OutPoint, TransactionInput, DEFAULT_SEQUENCE_NUMBER};
pub use output::TransactionOutput;
