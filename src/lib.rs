//! # multipin
//!
//! A unifying client for IPFS pinning services. Pin a file, buffer, stream
//! or existing hash to Pinata, Infura, NFT.Storage or Web3.Storage through
//! one interface, without handling provider-specific request shapes,
//! authentication schemes or response envelopes.
//!
//! ## Features
//!
//! - **One interface**: the [`Pinner`] trait covers every backend
//! - **Streaming uploads**: multipart bodies are produced concurrently with
//!   the upload, never buffered whole in memory
//! - **Resilient transport**: rate limits, server errors and connection
//!   failures are retried with exponential backoff
//! - **Descriptor-driven adapters**: a backend is a [`ProviderSpec`], not a
//!   hand-written client
//!
//! ## Example
//!
//! ```rust,ignore
//! use multipin::{Credentials, Pinner, Pinners, Provider};
//! use std::collections::HashMap;
//!
//! #[tokio::main]
//! async fn main() -> multipin::Result<()> {
//!     let mut credentials = HashMap::new();
//!     credentials.insert(Provider::Pinata, Credentials::new("api-key", "secret"));
//!
//!     let pinners = Pinners::new(credentials)?;
//!     let pinata = pinners.get(Provider::Pinata)?;
//!
//!     let result = pinata.pin_bytes(b"hello, ipfs".as_slice().into()).await?;
//!     println!("pinned {} -> {}", result.cid, result.link);
//!
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod multipart;
mod pinners;
mod provider;
mod providers;
mod retry;
mod types;

pub use config::{RetryPolicy, TransportConfig};
pub use error::{PinError, Result};
pub use multipart::{bytes_body, path_body, raw_bytes, raw_file, raw_stream, stream_body, EncodedBody};
pub use pinners::Pinners;
pub use provider::{Pinner, ProviderClient};
pub use providers::{AuthScheme, CidExtractor, HashPinEndpoint, ProviderSpec, UploadEncoding};
pub use retry::Transport;
pub use types::{Credentials, PinResult, PinTarget, Provider, StreamSource};
