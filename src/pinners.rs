//! Routing pin requests to a configured set of adapters

use std::collections::HashMap;

use crate::error::{PinError, Result};
use crate::provider::ProviderClient;
use crate::retry::Transport;
use crate::types::{Credentials, Provider};

/// A set of constructed adapters, routed by [`Provider`].
///
/// All adapters share one transport (and therefore one connection pool);
/// independent pin calls can run concurrently without any locking by the
/// caller.
pub struct Pinners {
    adapters: HashMap<Provider, ProviderClient>,
    default_provider: Provider,
    transport: Transport,
}

impl Pinners {
    /// Construct adapters for every provider in the credential map, with a
    /// default resilient transport
    pub fn new(credentials: HashMap<Provider, Credentials>) -> Result<Self> {
        Ok(Self::with_transport(credentials, Transport::with_defaults()?))
    }

    /// Construct adapters over a shared caller-supplied transport
    pub fn with_transport(
        credentials: HashMap<Provider, Credentials>,
        transport: Transport,
    ) -> Self {
        let adapters = credentials
            .into_iter()
            .map(|(provider, creds)| {
                (provider, ProviderClient::new(provider, creds, transport.clone()))
            })
            .collect();

        let mut pinners = Self {
            adapters,
            default_provider: Provider::NftStorage,
            transport,
        };
        pinners.ensure_default();
        pinners
    }

    /// Change the fallback provider used by [`Pinners::must_get`]. An
    /// anonymous adapter is constructed for it if none was configured.
    pub fn with_default(mut self, provider: Provider) -> Self {
        self.default_provider = provider;
        self.ensure_default();
        self
    }

    /// The fallback provider
    pub fn default_provider(&self) -> Provider {
        self.default_provider
    }

    /// The adapter for `provider`, or a not-configured error. No implicit
    /// fallback happens here.
    pub fn get(&self, provider: Provider) -> Result<&ProviderClient> {
        self.adapters
            .get(&provider)
            .ok_or(PinError::NotConfigured(provider))
    }

    /// The adapter for `provider`, falling back to the default provider's
    /// adapter when none is configured.
    ///
    /// This is the one place a lookup failure is converted into a fallback
    /// instead of an error; callers who want propagation use
    /// [`Pinners::get`].
    pub fn must_get(&self, provider: Provider) -> &ProviderClient {
        self.adapters
            .get(&provider)
            .unwrap_or_else(|| &self.adapters[&self.default_provider])
    }

    /// Providers with a configured adapter
    pub fn providers(&self) -> impl Iterator<Item = Provider> + '_ {
        self.adapters.keys().copied()
    }

    // The default provider's adapter always exists so must_get is total.
    fn ensure_default(&mut self) {
        if !self.adapters.contains_key(&self.default_provider) {
            self.adapters.insert(
                self.default_provider,
                ProviderClient::new(
                    self.default_provider,
                    Credentials::anonymous(),
                    self.transport.clone(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Pinner;

    fn sample() -> Pinners {
        let mut credentials = HashMap::new();
        credentials.insert(Provider::Pinata, Credentials::new("key", "secret"));
        credentials.insert(Provider::Infura, Credentials::anonymous());
        Pinners::new(credentials).unwrap()
    }

    #[test]
    fn test_get_routes_by_provider() {
        let pinners = sample();
        assert_eq!(
            pinners.get(Provider::Pinata).unwrap().provider(),
            Provider::Pinata
        );
    }

    #[test]
    fn test_get_rejects_unconfigured_provider() {
        let pinners = sample();
        let err = pinners.get(Provider::Web3Storage).unwrap_err();
        assert!(matches!(err, PinError::NotConfigured(Provider::Web3Storage)));
    }

    #[test]
    fn test_must_get_falls_back_to_default() {
        let pinners = sample();
        let adapter = pinners.must_get(Provider::Web3Storage);
        assert_eq!(adapter.provider(), Provider::NftStorage);
    }

    #[test]
    fn test_custom_default_provider() {
        let pinners = sample().with_default(Provider::Pinata);
        let adapter = pinners.must_get(Provider::Web3Storage);
        assert_eq!(adapter.provider(), Provider::Pinata);
    }
}
