//! OpenWeatherMap client for current weather, air pollution and forecasts
//!
//! Requests go through a retrying middleware stack with exponential backoff for
//! transient failures, a fixed per-request timeout, and timing logs.

use async_trait::async_trait;
use reqwest::Url;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::DataSource;
use super::payload::{RawAirQuality, RawForecast, RawWeather};
use crate::config::ProviderConfig;
use crate::error::FetchError;
use crate::models::Location;
use crate::{PipelineError, Result};

const WEATHER_ENDPOINT: &str = "weather";
const AIR_POLLUTION_ENDPOINT: &str = "air_pollution";
const FORECAST_ENDPOINT: &str = "forecast";

/// Responses slower than this are logged as a warning
const SLOW_RESPONSE_SECS: u64 = 5;

/// HTTP client for the OpenWeatherMap data API
pub struct OpenWeatherClient {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
    units: String,
}

impl OpenWeatherClient {
    /// Create a new client from provider settings
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PipelineError::config("OpenWeatherMap API key is not configured"))?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("nl-weather-etl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::config(format!("Failed to create HTTP client: {e}")))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            units: config.units.clone(),
        })
    }

    fn endpoint_url(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<Url, FetchError> {
        let base = format!("{}/{}", self.base_url, endpoint);
        let query = params
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .chain(std::iter::once(("appid", self.api_key.as_str())));
        Url::parse_with_params(&base, query).map_err(|e| FetchError::Transport {
            endpoint: endpoint.to_string(),
            message: format!("invalid URL: {e}"),
        })
    }

    /// GET an endpoint and decode its JSON body
    #[instrument(level = "debug", skip(self, params))]
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<T, FetchError> {
        let url = self.endpoint_url(endpoint, params)?;
        let start_time = Instant::now();

        debug!("Requesting {} with {} parameters", endpoint, params.len());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                endpoint: endpoint.to_string(),
                message: redact(e),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| FetchError::Transport {
            endpoint: endpoint.to_string(),
            message: e.without_url().to_string(),
        })?;

        let elapsed = start_time.elapsed();
        if elapsed.as_secs() > SLOW_RESPONSE_SECS {
            warn!(
                "Slow {} response detected: {:.3}s",
                endpoint,
                elapsed.as_secs_f64()
            );
        }

        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        debug!(
            "{} answered {} in {:.3}s",
            endpoint,
            status,
            elapsed.as_secs_f64()
        );

        serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl DataSource for OpenWeatherClient {
    #[instrument(skip(self), fields(location = %location.name))]
    async fn fetch_current_weather(
        &self,
        location: &Location,
    ) -> std::result::Result<RawWeather, FetchError> {
        let params = [("q", location.name.clone()), ("units", self.units.clone())];
        let raw: RawWeather = self.get_json(WEATHER_ENDPOINT, &params).await?;
        info!("Retrieved current weather for {}", location.name);
        Ok(raw)
    }

    #[instrument(skip(self))]
    async fn fetch_air_quality(
        &self,
        lat: f64,
        lon: f64,
    ) -> std::result::Result<Option<RawAirQuality>, FetchError> {
        let params = [("lat", lat.to_string()), ("lon", lon.to_string())];
        let raw: RawAirQuality = self.get_json(AIR_POLLUTION_ENDPOINT, &params).await?;

        if raw.list.is_empty() {
            warn!("No air quality data for {:.4}, {:.4}", lat, lon);
            return Ok(None);
        }

        Ok(Some(raw))
    }

    #[instrument(skip(self), fields(location = %location.name))]
    async fn fetch_forecast(
        &self,
        location: &Location,
    ) -> std::result::Result<RawForecast, FetchError> {
        let params = [("q", location.name.clone()), ("units", self.units.clone())];
        let raw: RawForecast = self.get_json(FORECAST_ENDPOINT, &params).await?;
        info!(
            "Retrieved forecast with {} steps for {}",
            raw.list.len(),
            location.name
        );
        Ok(raw)
    }
}

/// Error text without the request URL, which carries the API key
fn redact(err: reqwest_middleware::Error) -> String {
    match err {
        reqwest_middleware::Error::Reqwest(e) => e.without_url().to_string(),
        reqwest_middleware::Error::Middleware(e) => e.to_string(),
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client() -> OpenWeatherClient {
        client_for("https://api.openweathermap.org/data/2.5/")
    }

    fn client_for(base_url: &str) -> OpenWeatherClient {
        let config = ProviderConfig {
            api_key: Some("secret_key_123".into()),
            base_url: base_url.into(),
            max_retries: 0,
            ..ProviderConfig::default()
        };
        OpenWeatherClient::new(&config).unwrap()
    }

    /// Answer a single request with `status` and a JSON `body`, returning the base URL
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_empty_air_quality_list_is_none() {
        let base = serve_once("200 OK", r#"{"coord":{"lat":52.37,"lon":4.89},"list":[]}"#).await;
        let result = client_for(&base).fetch_air_quality(52.37, 4.89).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_air_quality_entry_is_some() {
        let base = serve_once(
            "200 OK",
            r#"{"coord":{"lat":52.37,"lon":4.89},"list":[{"main":{"aqi":2},"components":{"pm10":11.5},"dt":1700000000}]}"#,
        )
        .await;
        let raw = client_for(&base)
            .fetch_air_quality(52.37, 4.89)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw.list.len(), 1);
        assert_eq!(raw.list[0].main.as_ref().unwrap().aqi, Some(2));
    }

    #[tokio::test]
    async fn test_error_status_maps_to_status_error() {
        let base = serve_once("404 Not Found", r#"{"cod":"404","message":"city not found"}"#).await;
        let err = client_for(&base)
            .fetch_current_weather(&Location::new("Atlantis"))
            .await
            .unwrap_err();
        match err {
            FetchError::Status { endpoint, status, body } => {
                assert_eq!(endpoint, WEATHER_ENDPOINT);
                assert_eq!(status, 404);
                assert!(body.contains("city not found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = ProviderConfig::default();
        let err = OpenWeatherClient::new(&config).err().unwrap();
        assert!(matches!(err, PipelineError::Config { .. }));
    }

    #[test]
    fn test_endpoint_url_encodes_query() {
        let client = client();
        let url = client
            .endpoint_url(
                WEATHER_ENDPOINT,
                &[("q", "Den Haag".to_string()), ("units", "metric".to_string())],
            )
            .unwrap();

        assert_eq!(url.path(), "/data/2.5/weather");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("q".into(), "Den Haag".into())));
        assert!(pairs.contains(&("units".into(), "metric".into())));
        assert!(pairs.contains(&("appid".into(), "secret_key_123".into())));
    }

    #[test]
    fn test_truncate_body() {
        let short = "not found";
        assert_eq!(truncate_body(short), short);

        let long = "é".repeat(300);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
    }

    #[test]
    fn test_payload_tolerates_missing_fields() {
        let raw: RawWeather = serde_json::from_str(r#"{"main":{"temp":12.0}}"#).unwrap();
        assert!(raw.name.is_none());
        assert!(raw.weather.is_empty());
        assert_eq!(raw.main.unwrap().temp, Some(12.0));

        let raw: RawAirQuality = serde_json::from_str(r#"{"coord":{"lat":1.0,"lon":2.0}}"#).unwrap();
        assert!(raw.list.is_empty());
    }
}
