//! Shared HTTP status handling for provider adapters.

use lattice_abstraction::ProviderError;
use reqwest::{Response, StatusCode};
use tracing::{error, warn};

/// Maps a transport failure from reqwest into a `ProviderError`.
///
/// The deadline for a whole attempt is enforced by the caller, so a client-side
/// timeout is reported as a transient `Request` error.
pub(crate) fn transport_error(provider: &str, err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        warn!(provider, error = %err, "Provider request timed out at transport level");
        return ProviderError::Request(format!("Request to {} timed out: {}", provider, err));
    }
    error!(provider, error = %err, "Failed to reach provider");
    ProviderError::Request(format!("Failed to reach {}: {}", provider, err))
}

/// Passes successful responses through and converts error statuses.
///
/// 429 maps to `RateLimited`, other 4xx to `Rejected`, 5xx to `Upstream`.
pub(crate) async fn check_status(provider: &str, response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());

    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!(provider, status = %status, "Provider rate limit exceeded");
        return Err(ProviderError::RateLimited { provider: provider.to_string(), message: Some(body) });
    }

    if status.is_client_error() {
        warn!(provider, status = %status, "Provider rejected the request");
        return Err(ProviderError::Rejected {
            provider: provider.to_string(),
            message: format!("status {}: {}", status.as_u16(), body),
        });
    }

    error!(provider, status = %status, "Provider returned a server error");
    Err(ProviderError::Upstream {
        provider: provider.to_string(),
        message: format!("status {}: {}", status.as_u16(), body),
    })
}

/// Decodes a JSON body, mapping failures to `Serialization`.
pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    provider: &str,
    response: Response,
) -> Result<T, ProviderError> {
    response.json::<T>().await.map_err(|e| {
        error!(provider, error = %e, "Provider returned a malformed response");
        ProviderError::Serialization(format!("{} returned a malformed response: {}", provider, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_transport_timeout_is_transient_request_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let silent = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let client = reqwest::Client::builder().timeout(Duration::from_millis(50)).build().unwrap();
        let err = client.get(format!("http://{addr}/")).send().await.unwrap_err();
        assert!(err.is_timeout());

        let mapped = transport_error("ollama", &err);
        assert!(matches!(mapped, ProviderError::Request(_)));
        assert!(mapped.is_transient());
        assert!(mapped.to_string().contains("timed out"));

        silent.abort();
    }
}
