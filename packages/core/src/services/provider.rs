//! Movie metadata provider client.
//!
//! [`ProviderClient`] is the contract the jobs consume; [`TmdbClient`] is
//! the thin HTTP implementation against a TMDB-style API. The reqwest
//! client enforces its own request timeout — that is the only I/O bound
//! the control plane assumes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::monitor::types::DependencyHealth;
use crate::store::MovieRecord;

/// Errors from movie metadata providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Data format error: {message}")]
    Format { message: String },

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Service unavailable")]
    Unavailable,
}

/// A movie as returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMovie {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub poster_path: Option<String>,
}

impl From<&ProviderMovie> for MovieRecord {
    fn from(movie: &ProviderMovie) -> Self {
        MovieRecord {
            id: movie.id,
            title: movie.title.clone(),
            overview: movie.overview.clone().unwrap_or_default(),
            release_date: movie.release_date.clone(),
            vote_average: movie.vote_average.unwrap_or(0.0),
            popularity: movie.popularity.unwrap_or(0.0),
            poster_path: movie.poster_path.clone(),
        }
    }
}

/// Contract the metadata provider exposes to the core.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Ranked trending list, most popular first.
    async fn get_trending(&self) -> Result<Vec<ProviderMovie>, ProviderError>;

    /// Full detail record, or `None` when the provider has no such id.
    async fn get_by_id(&self, id: i64) -> Result<Option<ProviderMovie>, ProviderError>;

    async fn health_check(&self) -> DependencyHealth;
}

#[derive(Debug, Deserialize)]
struct TrendingResponse {
    results: Vec<ProviderMovie>,
}

/// HTTP client for a TMDB-style metadata API.
#[derive(Clone)]
pub struct TmdbClient {
    base_url: String,
    api_key: String,
    http: Client,
}

impl TmdbClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url,
            api_key,
            http: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}{}?api_key={}", self.base_url, path, self.api_key);
        self.http
            .get(&url)
            .send()
            .await
            .map_err(|err| ProviderError::Network {
                message: err.to_string(),
            })
    }

    fn check_status(status: StatusCode) -> Result<(), ProviderError> {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        if status.is_server_error() {
            return Err(ProviderError::Unavailable);
        }
        if !status.is_success() {
            return Err(ProviderError::Network {
                message: format!("provider returned HTTP {}", status),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProviderClient for TmdbClient {
    async fn get_trending(&self) -> Result<Vec<ProviderMovie>, ProviderError> {
        let response = self.get("/trending/movie/day").await?;
        Self::check_status(response.status())?;

        let trending: TrendingResponse =
            response.json().await.map_err(|err| ProviderError::Format {
                message: format!("bad trending payload: {}", err),
            })?;

        Ok(trending.results)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ProviderMovie>, ProviderError> {
        let response = self.get(&format!("/movie/{}", id)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::check_status(response.status())?;

        let movie: ProviderMovie =
            response.json().await.map_err(|err| ProviderError::Format {
                message: format!("bad movie payload: {}", err),
            })?;

        Ok(Some(movie))
    }

    async fn health_check(&self) -> DependencyHealth {
        match self.get("/configuration").await {
            Ok(response) if response.status().is_success() => {
                DependencyHealth::healthy("provider")
            }
            Ok(response) => DependencyHealth::unhealthy(
                "provider",
                format!("provider returned HTTP {}", response.status()),
            ),
            Err(err) => DependencyHealth::unhealthy("provider", err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn make_client(server: &MockServer) -> TmdbClient {
        TmdbClient::new(server.uri(), "test-key".to_string())
    }

    #[tokio::test]
    async fn get_trending_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/trending/movie/day"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    { "id": 1, "title": "Blackout", "popularity": 90.5 },
                    { "id": 2, "title": "Night Shift" }
                ]
            })))
            .mount(&server)
            .await;

        let client = make_client(&server).await;
        let trending = client.get_trending().await.unwrap();

        assert_eq!(trending.len(), 2);
        assert_eq!(trending[0].id, 1);
        assert_eq!(trending[1].title, "Night Shift");
    }

    #[tokio::test]
    async fn get_by_id_returns_none_on_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/999"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = make_client(&server).await;
        assert!(client.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn server_errors_map_to_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/trending/movie/day"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = make_client(&server).await;
        assert!(matches!(
            client.get_trending().await,
            Err(ProviderError::Unavailable)
        ));
    }

    #[tokio::test]
    async fn rate_limit_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/1"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = make_client(&server).await;
        assert!(matches!(
            client.get_by_id(1).await,
            Err(ProviderError::RateLimited)
        ));
    }

    #[tokio::test]
    async fn health_check_reflects_configuration_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = make_client(&server).await;
        assert!(client.health_check().await.is_healthy());
    }
}
