//! Common types for the pinning client

use bytes::Bytes;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::io::AsyncRead;

use crate::error::PinError;

/// A readable data source handed to [`PinTarget::Stream`].
///
/// Ownership of the reader transfers to the encoder for the duration of the
/// upload; the stream is consumed exactly once.
pub type StreamSource = Box<dyn AsyncRead + Send + Unpin>;

/// The data source for a pin request.
///
/// Constructed once at the API boundary and matched exhaustively from there;
/// adding a new source shape is a compile-time change for every adapter.
pub enum PinTarget {
    /// A file or directory on disk. The caller keeps ownership of the path.
    Path(PathBuf),
    /// An in-memory buffer.
    Bytes(Bytes),
    /// An open readable stream. Single-pass: uploads from a stream are
    /// never retried because the bytes cannot be replayed.
    Stream(StreamSource),
}

impl PinTarget {
    /// Wrap an async reader as a pin target.
    pub fn stream(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self::Stream(Box::new(reader))
    }
}

impl fmt::Debug for PinTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<PathBuf> for PinTarget {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&std::path::Path> for PinTarget {
    fn from(path: &std::path::Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<Bytes> for PinTarget {
    fn from(buf: Bytes) -> Self {
        Self::Bytes(buf)
    }
}

impl From<Vec<u8>> for PinTarget {
    fn from(buf: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(buf))
    }
}

impl From<&[u8]> for PinTarget {
    fn from(buf: &[u8]) -> Self {
        Self::Bytes(Bytes::copy_from_slice(buf))
    }
}

/// API credentials for one provider.
///
/// Either field may be empty; providers that allow it are then called on
/// their anonymous/public tier.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    /// API key (or bearer token, depending on the provider)
    pub api_key: String,
    /// API secret
    pub secret: String,
}

impl Credentials {
    /// Create credentials from a key/secret pair
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
        }
    }

    /// Create token-only credentials for bearer-auth providers
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            api_key: token.into(),
            secret: String::new(),
        }
    }

    /// Empty credentials for anonymous access
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Whether both the key and the secret are present
    pub fn has_keypair(&self) -> bool {
        !self.api_key.is_empty() && !self.secret.is_empty()
    }
}

/// The outcome of a successful pin.
///
/// Only ever built from a 2xx response; immutable after construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PinResult {
    /// Content identifier issued by the provider
    pub cid: String,
    /// Retrieval link with the cid substituted into the provider's
    /// gateway template
    pub link: String,
}

impl PinResult {
    /// Build a result by interpolating `cid` into the gateway template.
    /// The template marks the insertion point with `{cid}`.
    pub fn new(cid: impl Into<String>, gateway_template: &str) -> Self {
        let cid = cid.into();
        let link = gateway_template.replace("{cid}", &cid);
        Self { cid, link }
    }
}

/// The supported pinning services
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Infura IPFS API
    Infura,
    /// NFT.Storage
    NftStorage,
    /// Pinata
    Pinata,
    /// Web3.Storage
    Web3Storage,
}

impl Provider {
    /// All known providers
    pub const ALL: [Provider; 4] = [
        Provider::Infura,
        Provider::NftStorage,
        Provider::Pinata,
        Provider::Web3Storage,
    ];

    /// Stable display name, used to attribute errors to a backend
    pub fn name(&self) -> &'static str {
        match self {
            Self::Infura => "Infura",
            Self::NftStorage => "NFTStorage",
            Self::Pinata => "Pinata",
            Self::Web3Storage => "Web3Storage",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = PinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "infura" => Ok(Self::Infura),
            "nftstorage" | "nft.storage" => Ok(Self::NftStorage),
            "pinata" => Ok(Self::Pinata),
            "web3storage" | "web3.storage" => Ok(Self::Web3Storage),
            _ => Err(PinError::UnknownProvider(s.to_string())),
        }
    }
}
