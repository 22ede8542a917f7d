//! Helpers for driving a Bitcoin regtest faucet/explorer service from tests.
//!
//! [`RegtestClient`] mines blocks, funds addresses and scripts, looks up
//! transactions and unspent outputs, broadcasts signed transactions and checks
//! that a transaction pays what it should. Building and signing transactions is
//! left to the caller and the `bitcoin` crate.
//!
//! ```no_run
//! # async fn run() -> regtest_client::Result<()> {
//! use regtest_client::{RegtestClient, Verification};
//!
//! let regtest = RegtestClient::from_env()?;
//! regtest.ping().await?;
//!
//! let address = regtest.random_address();
//! let unspent = regtest.faucet(&address, 20_000).await?;
//! regtest.mine(1).await?;
//!
//! regtest
//!     .verify(&Verification::new(unspent.tx_id, address, unspent.vout, 20_000))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::{Payload, RegtestClient};
pub use config::RegtestConfig;
pub use error::{RegtestError, Result};
pub use types::{FetchedInput, FetchedOutput, FetchedTransaction, Unspent, Verification};
