//! The uniform pinning interface and the generic adapter behind it

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, RequestBuilder, Response};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, instrument};

use crate::error::{decode_error, PinError, Result};
use crate::multipart::{self, EncodedBody};
use crate::providers::{AuthScheme, HashPinEndpoint, ProviderSpec, UploadEncoding};
use crate::retry::Transport;
use crate::types::{Credentials, PinResult, PinTarget, Provider, StreamSource};

/// Field name for directory parts when the backend otherwise takes raw bodies
const DIRECTORY_FIELD: &str = "file";

/// The uniform pin operations every backend adapter implements.
///
/// Backends that cannot perform an operation fail it explicitly with a
/// capability error instead of omitting the method. Every error leaving an
/// adapter is attributed with the provider's name so failures stay
/// attributable when adapters are used interchangeably.
#[async_trait]
pub trait Pinner: Send + Sync {
    /// Which backend this adapter talks to
    fn provider(&self) -> Provider;

    /// Stable provider name, for logs and error messages
    fn name(&self) -> &'static str {
        self.provider().name()
    }

    /// Pin the file or directory at `path`
    async fn pin_file(&self, path: &Path) -> Result<PinResult>;

    /// Pin the contents of an open reader. Single-pass: the upload is not
    /// retried because the stream cannot be replayed.
    async fn pin_stream(&self, reader: StreamSource) -> Result<PinResult>;

    /// Pin an in-memory buffer
    async fn pin_bytes(&self, buf: Bytes) -> Result<PinResult>;

    /// Ask the backend to pin content it can already resolve by hash,
    /// without re-uploading bytes. Returns whether the backend confirmed
    /// the pin.
    async fn pin_by_hash(&self, hash: &str) -> Result<bool>;

    /// Pin a directory; alias for [`Pinner::pin_file`]
    async fn pin_directory(&self, path: &Path) -> Result<PinResult>;

    /// Pin any [`PinTarget`], routing on its variant
    async fn pin(&self, target: PinTarget) -> Result<PinResult>;
}

/// Generic adapter: one backend described by a [`ProviderSpec`]
pub struct ProviderClient {
    spec: ProviderSpec,
    credentials: Credentials,
    transport: Transport,
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

impl ProviderClient {
    /// Create an adapter for a provider with its stock descriptor
    pub fn new(provider: Provider, credentials: Credentials, transport: Transport) -> Self {
        Self::from_spec(ProviderSpec::for_provider(provider), credentials, transport)
    }

    /// Create an adapter from a custom descriptor, e.g. one pointing at a
    /// self-hosted gateway
    pub fn from_spec(spec: ProviderSpec, credentials: Credentials, transport: Transport) -> Self {
        Self {
            spec,
            credentials,
            transport,
        }
    }

    /// The descriptor this adapter was built from
    pub fn spec(&self) -> &ProviderSpec {
        &self.spec
    }

    /// Apply the provider's authentication convention. Credentials are only
    /// attached when present, so anonymous calls stay anonymous.
    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.spec.auth {
            AuthScheme::Basic => {
                if self.credentials.has_keypair() {
                    req.basic_auth(&self.credentials.api_key, Some(&self.credentials.secret))
                } else {
                    req
                }
            }
            AuthScheme::Bearer => {
                if self.credentials.api_key.is_empty() {
                    req
                } else {
                    req.bearer_auth(&self.credentials.api_key)
                }
            }
            AuthScheme::HeaderPair {
                key_header,
                secret_header,
            } => {
                if self.credentials.has_keypair() {
                    req.header(*key_header, self.credentials.api_key.as_str())
                        .header(*secret_header, self.credentials.secret.as_str())
                } else if !self.credentials.api_key.is_empty() {
                    req.bearer_auth(&self.credentials.api_key)
                } else {
                    req
                }
            }
        }
    }

    fn upload_request(&self, body: EncodedBody) -> RequestBuilder {
        let req = self.transport.post(&self.spec.upload_url);
        self.authorize(req)
            .header(header::CONTENT_TYPE, body.content_type().to_string())
            .body(body.into_body())
    }

    /// Upload with retry; `make_body` re-encodes the payload per attempt so
    /// retries never resend a half-consumed body
    async fn upload_replayable<F>(&self, make_body: F) -> Result<PinResult>
    where
        F: Fn() -> std::io::Result<EncodedBody>,
    {
        let response = self
            .transport
            .execute(|| Ok(self.upload_request(make_body()?)))
            .await?;
        self.interpret_upload(response).await
    }

    /// Upload a one-shot body in a single attempt
    async fn upload_single_pass(&self, body: EncodedBody) -> Result<PinResult> {
        let response = self
            .transport
            .execute_once(self.upload_request(body))
            .await?;
        self.interpret_upload(response).await
    }

    async fn interpret_upload(&self, response: Response) -> Result<PinResult> {
        let text = self.success_text(response).await?;
        let cid = self.spec.response.extract(&text)?;
        debug!(provider = %self.spec.provider, %cid, "content pinned");
        Ok(PinResult::new(cid, &self.spec.gateway_template))
    }

    /// Enforce the 2xx invariant: a result is only ever produced from a
    /// success response
    async fn success_text(&self, response: Response) -> Result<String> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let message = if message.is_empty() {
                status.canonical_reason().unwrap_or("no status text").to_string()
            } else {
                message
            };
            return Err(PinError::UnexpectedStatus {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.text().await?)
    }

    async fn pin_file_inner(&self, path: &Path) -> Result<PinResult> {
        // Stat up front so a bad path never reaches the network.
        let meta = std::fs::metadata(path)?;
        let path = path.to_path_buf();
        match self.spec.upload {
            UploadEncoding::Multipart { field } => {
                self.upload_replayable(move || multipart::path_body(field, &path))
                    .await
            }
            UploadEncoding::Raw if meta.is_file() => {
                self.upload_replayable(move || multipart::raw_file(&path))
                    .await
            }
            UploadEncoding::Raw => {
                self.upload_replayable(move || multipart::path_body(DIRECTORY_FIELD, &path))
                    .await
            }
        }
    }

    async fn pin_bytes_inner(&self, buf: Bytes) -> Result<PinResult> {
        match self.spec.upload {
            UploadEncoding::Multipart { field } => {
                self.upload_replayable(move || Ok(multipart::bytes_body(field, buf.clone())))
                    .await
            }
            UploadEncoding::Raw => {
                self.upload_replayable(move || Ok(multipart::raw_bytes(buf.clone())))
                    .await
            }
        }
    }

    async fn pin_stream_inner(&self, reader: StreamSource) -> Result<PinResult> {
        let body = match self.spec.upload {
            UploadEncoding::Multipart { field } => multipart::stream_body(field, reader),
            UploadEncoding::Raw => multipart::raw_stream(reader),
        };
        self.upload_single_pass(body).await
    }

    async fn pin_by_hash_inner(&self, hash: &str) -> Result<bool> {
        if hash.is_empty() {
            return Err(PinError::EmptyHash);
        }

        match &self.spec.hash_pin {
            HashPinEndpoint::Unsupported => Err(PinError::Unsupported("pin-by-hash")),
            HashPinEndpoint::QueryArg { url, pins_field } => {
                let response = self
                    .transport
                    .execute(|| {
                        Ok(self
                            .authorize(self.transport.post(url))
                            .query(&[("arg", hash)]))
                    })
                    .await?;
                let text = self.success_text(response).await?;
                let value: Value = serde_json::from_str(&text).map_err(decode_error)?;
                let pinned = value
                    .get(*pins_field)
                    .and_then(Value::as_array)
                    .and_then(|pins| pins.first())
                    .and_then(Value::as_str);
                match pinned {
                    Some(pinned) => Ok(pinned == hash),
                    None => Err(PinError::InvalidResponse(format!(
                        "missing {pins_field} confirmation"
                    ))),
                }
            }
            HashPinEndpoint::JsonBody { url, field } => {
                let mut payload = serde_json::Map::new();
                payload.insert(field.to_string(), Value::String(hash.to_string()));
                let payload = Value::Object(payload);

                let response = self
                    .transport
                    .execute(|| Ok(self.authorize(self.transport.post(url)).json(&payload)))
                    .await?;
                let text = self.success_text(response).await?;
                let value: Value = serde_json::from_str(&text).map_err(decode_error)?;
                match value.get(*field).and_then(Value::as_str) {
                    Some(echoed) => Ok(echoed == hash),
                    None => Err(PinError::InvalidResponse(format!(
                        "missing {field} confirmation"
                    ))),
                }
            }
        }
    }

    fn attributed<T>(&self, result: Result<T>) -> Result<T> {
        result.map_err(|err| err.attribute(self.spec.provider))
    }
}

#[async_trait]
impl Pinner for ProviderClient {
    fn provider(&self) -> Provider {
        self.spec.provider
    }

    #[instrument(skip(self))]
    async fn pin_file(&self, path: &Path) -> Result<PinResult> {
        let result = self.pin_file_inner(path).await;
        self.attributed(result)
    }

    #[instrument(skip(self, reader))]
    async fn pin_stream(&self, reader: StreamSource) -> Result<PinResult> {
        let result = self.pin_stream_inner(reader).await;
        self.attributed(result)
    }

    #[instrument(skip(self, buf), fields(size = buf.len()))]
    async fn pin_bytes(&self, buf: Bytes) -> Result<PinResult> {
        let result = self.pin_bytes_inner(buf).await;
        self.attributed(result)
    }

    #[instrument(skip(self))]
    async fn pin_by_hash(&self, hash: &str) -> Result<bool> {
        let result = self.pin_by_hash_inner(hash).await;
        self.attributed(result)
    }

    #[instrument(skip(self))]
    async fn pin_directory(&self, path: &Path) -> Result<PinResult> {
        self.pin_file(path).await
    }

    #[instrument(skip(self, target))]
    async fn pin(&self, target: PinTarget) -> Result<PinResult> {
        match target {
            PinTarget::Path(path) => self.pin_file(&path).await,
            PinTarget::Bytes(buf) => self.pin_bytes(buf).await,
            PinTarget::Stream(reader) => self.pin_stream(reader).await,
        }
    }
}
