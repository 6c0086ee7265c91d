//! Public address of the probing host.
//!
//! The address is looked up once and then tagged as `source` on every
//! record. A lookup that cannot reach the service is an error the caller
//! must handle; a service that answers with a non-success status yields the
//! `"none"` sentinel.

use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::error::ResolveError;

/// Default "what is my IP" service.
pub const DEFAULT_PUBLIC_IP_URL: &str = "https://api.ipify.org";

/// Returned when the service answers with a non-success status.
pub const UNKNOWN_ADDRESS: &str = "none";

const RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Performs the public address lookup.
#[derive(Debug, Clone)]
pub struct PublicAddressResolver {
    client: reqwest::Client,
    url: String,
}

impl PublicAddressResolver {
    /// Client for the service at `url`.
    pub fn new(url: impl Into<String>) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder()
            .timeout(RESOLVE_TIMEOUT)
            .user_agent(concat!("nodebeat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ResolveError::Client)?;

        Ok(Self { client, url: url.into() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One GET against the service; the trimmed body is the address.
    pub async fn resolve(&self) -> Result<String, ResolveError> {
        let request_error = |source| ResolveError::Request { url: self.url.clone(), source };

        let response = self.client.get(&self.url).send().await.map_err(request_error)?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Public address service returned an error status");
            return Ok(UNKNOWN_ADDRESS.to_string());
        }

        let body = response.text().await.map_err(request_error)?;
        Ok(body.trim().to_string())
    }
}

/// The probing host's address, resolved at most once per run.
#[derive(Debug)]
pub struct SourceAddress {
    resolver: Option<PublicAddressResolver>,
    address: OnceCell<String>,
}

impl SourceAddress {
    /// Look the address up through `resolver` on first use.
    pub fn new(resolver: PublicAddressResolver) -> Self {
        Self { resolver: Some(resolver), address: OnceCell::new() }
    }

    /// Address known up front, no lookup will ever be made.
    pub fn fixed(address: impl Into<String>) -> Self {
        Self { resolver: None, address: OnceCell::new_with(Some(address.into())) }
    }

    /// Resolve on first call, return the cached value afterwards.
    pub async fn resolve(&self) -> Result<&str, ResolveError> {
        let address = self
            .address
            .get_or_try_init(|| async {
                let address = match &self.resolver {
                    Some(resolver) => resolver.resolve().await?,
                    None => UNKNOWN_ADDRESS.to_string(),
                };
                info!("Firing requests from: {address}");
                Ok::<_, ResolveError>(address)
            })
            .await?;
        Ok(address.as_str())
    }

    /// Cached address, `None` before the first successful resolve.
    pub fn get(&self) -> Option<&str> {
        self.address.get().map(String::as_str)
    }
}
