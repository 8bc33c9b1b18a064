use crate::fetch::cache::ResponseCache;
use crate::fetch::error::FetchError;
use crate::fetch::request::{HourlyRequest, DEFAULT_ARCHIVE_URL};
use crate::fetch::response::{ApiErrorBody, ArchiveResponse, HourlyEnvelope};
use crate::fetch::WeatherSource;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use std::time::Duration;

/// Client for the Open-Meteo historical weather API.
pub struct OpenMeteoClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    cache: Option<ResponseCache>,
}

#[bon::bon]
impl OpenMeteoClient {
    /// # Arguments
    ///
    /// * `.base_url(&str)`: Optional. Defaults to the public archive endpoint.
    /// * `.api_key(&str)`: Optional. Sent as `apikey` for the commercial endpoints.
    /// * `.timeout(Duration)`: Optional. Whole-request timeout, defaults to 60 s.
    /// * `.cache(ResponseCache)`: Optional. Serve repeated requests from disk.
    #[builder]
    pub fn new(
        #[builder(into)] base_url: Option<String>,
        #[builder(into)] api_key: Option<String>,
        timeout: Option<Duration>,
        cache: Option<ResponseCache>,
    ) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(timeout.unwrap_or(Duration::from_secs(60)))
            .build()
            .map_err(FetchError::ClientBuild)?;
        Ok(Self {
            http,
            base_url: base_url.unwrap_or_else(|| DEFAULT_ARCHIVE_URL.to_string()),
            api_key,
            cache,
        })
    }

    async fn download(&self, url: &str) -> Result<String, FetchError> {
        info!("Requesting {}", url);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::NetworkRequest(url.to_string(), e))?;

        let status = response.status();
        if !status.is_success() {
            let reason = response
                .text()
                .await
                .ok()
                .and_then(|body| serde_json::from_str::<ApiErrorBody>(&body).ok())
                .map(|body| body.reason);
            warn!("HTTP error for {}: {} {:?}", url, status, reason);
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status,
                reason,
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::ResponseBody(url.to_string(), e))
    }

    async fn cached_body(&self, url: &str) -> Option<String> {
        let cache = self.cache.as_ref()?;
        match cache.get(url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Ignoring response cache: {}", e);
                None
            }
        }
    }

    async fn store_body(&self, url: &str, body: &str) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(url, body).await {
                warn!("Failed to cache response for {}: {}", url, e);
            }
        }
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn fetch_hourly(&self, request: &HourlyRequest) -> Result<HourlyEnvelope, FetchError> {
        let url = request
            .url(&self.base_url, self.api_key.as_deref())?
            .to_string();

        let body = match self.cached_body(&url).await {
            Some(body) => body,
            None => {
                let body = self.download(&url).await?;
                self.store_body(&url, &body).await;
                body
            }
        };

        let response: ArchiveResponse =
            serde_json::from_str(&body).map_err(|source| FetchError::JsonParse {
                url: url.clone(),
                source,
            })?;
        debug!(
            "Archive answered for {:.3},{:.3} with grid cell {:.3},{:.3} in {} (UTC{:+}s)",
            request.latitude,
            request.longitude,
            response.latitude.unwrap_or(request.latitude),
            response.longitude.unwrap_or(request.longitude),
            response.timezone.as_deref().unwrap_or("GMT"),
            response.utc_offset_seconds
        );
        HourlyEnvelope::from_response(response, &request.variables, request.step_seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn request() -> HourlyRequest {
        HourlyRequest::builder()
            .latitude(52.3)
            .longitude(104.3)
            .start_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .end_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .build()
    }

    #[tokio::test]
    async fn test_cached_body_is_served_without_network() -> Result<(), FetchError> {
        let dir = tempdir().unwrap();
        let cache = ResponseCache::new(dir.path(), Duration::from_secs(3600));
        // Unroutable base URL: any network access would fail the test.
        let base_url = "http://127.0.0.1:9/v1/archive";
        let url = request().url(base_url, None)?.to_string();
        cache
            .put(
                &url,
                r#"{"hourly":{"time":[1704067200,1704088800],"temperature_2m":[-21.0,-18.5],"is_day":[0,1]}}"#,
            )
            .await?;

        let client = OpenMeteoClient::builder()
            .base_url(base_url)
            .cache(cache)
            .build()?;
        let envelope = client.fetch_hourly(&request()).await?;

        assert_eq!(envelope.start, 1_704_067_200);
        assert_eq!(envelope.interval, 6 * 3600);
        assert_eq!(envelope.variables[0].values, Some(vec![Some(-21.0), Some(-18.5)]));
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_host_is_recoverable() -> Result<(), FetchError> {
        let client = OpenMeteoClient::builder()
            .base_url("http://127.0.0.1:9/v1/archive")
            .timeout(Duration::from_secs(2))
            .build()?;
        let err = client.fetch_hourly(&request()).await.unwrap_err();
        assert!(matches!(err, FetchError::NetworkRequest(..)));
        assert!(!err.is_fatal());
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_cached_body_is_a_parse_error() -> Result<(), FetchError> {
        let dir = tempdir().unwrap();
        let cache = ResponseCache::new(dir.path(), Duration::from_secs(3600));
        let base_url = "http://127.0.0.1:9/v1/archive";
        cache
            .put(&request().url(base_url, None)?.to_string(), "<html>")
            .await?;
        let client = OpenMeteoClient::builder()
            .base_url(base_url)
            .cache(cache)
            .build()?;
        assert!(matches!(
            client.fetch_hourly(&request()).await,
            Err(FetchError::JsonParse { .. })
        ));
        Ok(())
    }
}
