//! Per-provider descriptors
//!
//! The four backends differ only in endpoint URLs, authentication
//! convention, upload encoding and the shape of the success envelope. Each
//! one is described by a [`ProviderSpec`] consumed by the generic adapter
//! instead of hand-writing four near-identical clients.
//!
//! Endpoint fields are plain strings so a spec can be pointed at a mock
//! server or self-hosted gateway.

use serde_json::Value;

use crate::error::{decode_error, PinError, Result};
use crate::types::Provider;

/// How an adapter proves its identity to the backend
#[derive(Clone, Debug)]
pub enum AuthScheme {
    /// HTTP Basic from the key/secret pair; requests go out anonymous when
    /// either half is missing, for backends with a public tier
    Basic,
    /// `Authorization: Bearer <api key>`, omitted when the key is empty
    Bearer,
    /// Provider-specific key/secret header pair, falling back to a bearer
    /// token when the pair is incomplete
    HeaderPair {
        key_header: &'static str,
        secret_header: &'static str,
    },
}

/// How upload payloads go over the wire
#[derive(Clone, Copy, Debug)]
pub enum UploadEncoding {
    /// `multipart/form-data` with the given part field name
    Multipart { field: &'static str },
    /// The payload is the request body itself. Directory uploads still get
    /// a multipart envelope since a tree cannot be a single raw body.
    Raw,
}

/// Where the content identifier lives in a success envelope
#[derive(Clone, Debug)]
pub enum CidExtractor {
    /// Single JSON object; the cid sits at this JSON pointer
    Pointer(&'static str),
    /// Newline-delimited add events; the pointer applies to the final event
    NdjsonPointer(&'static str),
}

impl CidExtractor {
    /// Pull the content identifier out of a response body
    pub fn extract(&self, body: &str) -> Result<String> {
        let value = match self {
            Self::Pointer(_) => serde_json::from_str::<Value>(body).map_err(decode_error)?,
            Self::NdjsonPointer(_) => {
                let mut last = None;
                for event in serde_json::Deserializer::from_str(body).into_iter::<Value>() {
                    last = Some(event.map_err(decode_error)?);
                }
                last.ok_or_else(|| PinError::InvalidResponse("empty response body".to_string()))?
            }
        };

        let pointer = match self {
            Self::Pointer(p) | Self::NdjsonPointer(p) => p,
        };
        value
            .pointer(pointer)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| {
                PinError::InvalidResponse(format!("missing content identifier at {pointer}"))
            })
    }
}

/// Pin-by-hash endpoint shape, where the backend has one
#[derive(Clone, Debug)]
pub enum HashPinEndpoint {
    /// `POST <url>?arg=<hash>`; the backend confirms by echoing the hash in
    /// a JSON array field
    QueryArg {
        url: String,
        pins_field: &'static str,
    },
    /// `POST <url>` with body `{"<field>": "<hash>"}`; the backend confirms
    /// by echoing the field
    JsonBody {
        url: String,
        field: &'static str,
    },
    /// The backend cannot pin by hash
    Unsupported,
}

/// Everything the generic adapter needs to know about one backend
#[derive(Clone, Debug)]
pub struct ProviderSpec {
    /// Which backend this describes, used for error attribution
    pub provider: Provider,
    /// Upload endpoint, query string included where the API wants one
    pub upload_url: String,
    /// Upload body encoding
    pub upload: UploadEncoding,
    /// Success envelope mapping
    pub response: CidExtractor,
    /// Authentication convention
    pub auth: AuthScheme,
    /// Pin-by-hash endpoint
    pub hash_pin: HashPinEndpoint,
    /// Retrieval link template with a `{cid}` placeholder
    pub gateway_template: String,
}

impl ProviderSpec {
    /// The stock descriptor for a provider
    pub fn for_provider(provider: Provider) -> Self {
        match provider {
            Provider::Infura => Self::infura(),
            Provider::NftStorage => Self::nft_storage(),
            Provider::Pinata => Self::pinata(),
            Provider::Web3Storage => Self::web3_storage(),
        }
    }

    /// Infura's IPFS API: kubo-style add endpoint, NDJSON add events,
    /// anonymous access allowed (rate limited) when no keypair is set
    pub fn infura() -> Self {
        Self {
            provider: Provider::Infura,
            upload_url: "https://ipfs.infura.io:5001/api/v0/add?cid-version=1&pin=true"
                .to_string(),
            upload: UploadEncoding::Multipart { field: "file" },
            response: CidExtractor::NdjsonPointer("/Hash"),
            auth: AuthScheme::Basic,
            hash_pin: HashPinEndpoint::QueryArg {
                url: "https://ipfs.infura.io:5001/api/v0/pin/add".to_string(),
                pins_field: "Pins",
            },
            gateway_template: "https://ipfs.infura.io:5001/api/v0/cat?arg={cid}".to_string(),
        }
    }

    /// NFT.Storage: single sources post as a raw body, directories as a
    /// form; no pin-by-hash
    pub fn nft_storage() -> Self {
        Self {
            provider: Provider::NftStorage,
            upload_url: "https://api.nft.storage/upload".to_string(),
            upload: UploadEncoding::Raw,
            response: CidExtractor::Pointer("/value/cid"),
            auth: AuthScheme::Bearer,
            hash_pin: HashPinEndpoint::Unsupported,
            gateway_template: "https://nftstorage.link/ipfs/{cid}".to_string(),
        }
    }

    /// Pinata: dedicated pinFileToIPFS endpoint and a JSON pin-by-hash API
    pub fn pinata() -> Self {
        Self {
            provider: Provider::Pinata,
            upload_url: "https://api.pinata.cloud/pinning/pinFileToIPFS".to_string(),
            upload: UploadEncoding::Multipart { field: "file" },
            response: CidExtractor::Pointer("/IpfsHash"),
            auth: AuthScheme::HeaderPair {
                key_header: "pinata_api_key",
                secret_header: "pinata_secret_api_key",
            },
            hash_pin: HashPinEndpoint::JsonBody {
                url: "https://api.pinata.cloud/pinning/pinByHash".to_string(),
                field: "hashToPin",
            },
            gateway_template: "https://gateway.pinata.cloud/ipfs/{cid}".to_string(),
        }
    }

    /// Web3.Storage: bearer-only upload endpoint, no pin-by-hash
    pub fn web3_storage() -> Self {
        Self {
            provider: Provider::Web3Storage,
            upload_url: "https://api.web3.storage/upload".to_string(),
            upload: UploadEncoding::Multipart { field: "file" },
            response: CidExtractor::Pointer("/cid"),
            auth: AuthScheme::Bearer,
            hash_pin: HashPinEndpoint::Unsupported,
            gateway_template: "https://w3s.link/ipfs/{cid}".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_specs_are_consistent() {
        for provider in Provider::ALL {
            let spec = ProviderSpec::for_provider(provider);
            assert_eq!(spec.provider, provider);
            assert!(spec.gateway_template.contains("{cid}"), "{provider}");
            assert!(spec.upload_url.starts_with("https://"), "{provider}");
        }
    }

    #[test]
    fn test_extract_pinata_envelope() {
        let extractor = CidExtractor::Pointer("/IpfsHash");
        let cid = extractor.extract(r#"{"IpfsHash":"QmAbc","PinSize":12}"#).unwrap();
        assert_eq!(cid, "QmAbc");
    }

    #[test]
    fn test_extract_nested_envelope() {
        let extractor = CidExtractor::Pointer("/value/cid");
        let cid = extractor
            .extract(r#"{"ok":true,"value":{"cid":"bafy1","size":3}}"#)
            .unwrap();
        assert_eq!(cid, "bafy1");
    }

    #[test]
    fn test_extract_last_ndjson_event() {
        let extractor = CidExtractor::NdjsonPointer("/Hash");
        let body = "{\"Name\":\"a\",\"Hash\":\"QmFirst\"}\n{\"Name\":\"b\",\"Hash\":\"QmLast\"}\n";
        assert_eq!(extractor.extract(body).unwrap(), "QmLast");
    }

    #[test]
    fn test_extract_reports_syntax_position() {
        let extractor = CidExtractor::Pointer("/cid");
        match extractor.extract("{\"cid\": oops}").unwrap_err() {
            PinError::MalformedResponse { line, column } => {
                assert_eq!(line, 1);
                assert!(column > 1);
            }
            other => panic!("expected malformed response, got {other}"),
        }
    }

    #[test]
    fn test_extract_missing_field_is_invalid_not_malformed() {
        let extractor = CidExtractor::Pointer("/cid");
        let err = extractor.extract(r#"{"status":"ok"}"#).unwrap_err();
        assert!(matches!(err, PinError::InvalidResponse(_)));
    }
}
