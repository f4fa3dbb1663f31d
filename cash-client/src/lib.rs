//! Cash Ledger client
//!
//! Everything a wallet front end needs to talk to the ledger without knowing
//! how transactions are built:
//!
//! - [`IdentityResolver`]: handle to identity lookup, with an in-memory [`Directory`]
//! - [`link`]: `cash:` payment link encoding and decoding
//! - [`Transport`]: submission seam, with [`LocalTransport`] for an in-process ledger
//! - [`CashClient`]: resolves, signs and submits on behalf of one key

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod client;
pub mod error;
pub mod link;
pub mod resolver;
pub mod retry;
pub mod transport;

// Re-exports
pub use client::CashClient;
pub use error::{ClientError, Result};
pub use link::PaymentLink;
pub use resolver::{Directory, IdentityResolver};
pub use retry::RetryConfig;
pub use transport::{LocalTransport, Transport};
