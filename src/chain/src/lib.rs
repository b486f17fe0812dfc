//! # Tokengate chain access
//!
//! Read-only EVM contract calls for token-gated authorization.
//!
//! ## Features
//!
//! - **Strict address parsing** (`0x` + 40 hex characters, case-insensitive)
//! - **ABI helpers** for `balanceOf(address)` and `ownerOf(uint256)`
//! - **JSON-RPC provider** with a single fallback endpoint and a bounded
//!   per-attempt timeout
//! - **Request context** carrying cancellation and deadline into every call
//!
//! ## Example
//!
//! ```no_run
//! use tokengate_chain::{Address, BlockchainProvider, RequestContext, RpcConfig, RpcProvider};
//!
//! # async fn run() -> tokengate_chain::Result<()> {
//! let provider = RpcProvider::new(
//!     RpcConfig::new(1, "https://rpc.example.org").with_fallback("https://backup.example.org"),
//! )?;
//!
//! let usdc = Address::parse("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48")?;
//! let holder = Address::parse("0x00000000000000000000000000000000000000aa")?;
//! let balance = provider
//!     .balance_of(&RequestContext::new(), 1, &usdc, &holder)
//!     .await?;
//! println!("balance: {balance}");
//! # Ok(())
//! # }
//! ```

pub mod abi;
pub mod address;
pub mod context;
pub mod error;
pub mod jsonrpc;
pub mod provider;

#[cfg(feature = "test-util")]
pub mod testing;

pub use address::Address;
pub use context::RequestContext;
pub use error::{ChainError, Result, RpcError};
pub use provider::{BlockchainProvider, RpcConfig, RpcProvider, DEFAULT_RPC_TIMEOUT};

pub use num_bigint::BigUint;
