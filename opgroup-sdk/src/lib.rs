#![deny(missing_docs)]

//! Token-group SDK - Complete SDK.
//!
//! Re-exports all token-group SDK components for convenient single-crate
//! usage.

pub use opgroup_primitives as primitives;
pub use opgroup_script as script;
pub use opgroup_transaction as transaction;
pub use opgroup_tokens as tokens;
pub use opgroup_wallet as wallet;

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber filtered by `filter`.
///
/// `filter` uses `RUST_LOG` syntax, e.g. `"opgroup_tokens=debug"`. When
/// `RUST_LOG` is set it takes precedence. Installing twice is a no-op.
pub fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
