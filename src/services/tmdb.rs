//! TMDB metadata API client
//!
//! All calls go through [`TmdbClient::get_json`], which throttles with a fixed
//! delay before each request and retries transient failures with exponential
//! backoff. Requests are strictly sequential; the delay is what keeps the
//! ingestion run inside TMDB's rate limits.

use std::time::Duration;

use reqwest::{Client as HttpClient, StatusCode};
use serde::de::DeserializeOwned;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::tmdb::{
        GenreList, ListPage, ReviewPage, TmdbCollection, TmdbGenre, TmdbMovie, TmdbPerson,
        TmdbReview, TmdbTvShow,
    },
};

/// Upper bound on a single retry delay
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Paginated list endpoints the ingestion pipeline walks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListSource {
    PopularMovies,
    TopRatedMovies,
    TrendingMovies,
    PopularTv,
    TopRatedTv,
    TrendingTv,
    PopularPeople,
}

impl ListSource {
    pub fn path(&self) -> &'static str {
        match self {
            ListSource::PopularMovies => "/movie/popular",
            ListSource::TopRatedMovies => "/movie/top_rated",
            ListSource::TrendingMovies => "/trending/movie/week",
            ListSource::PopularTv => "/tv/popular",
            ListSource::TopRatedTv => "/tv/top_rated",
            ListSource::TrendingTv => "/trending/tv/week",
            ListSource::PopularPeople => "/person/popular",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    fn path(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        }
    }
}

/// Read access to TMDB
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TmdbApi: Send + Sync {
    async fn list_page(&self, source: ListSource, page: u32) -> AppResult<ListPage>;

    /// Movie details with credits appended
    async fn movie(&self, id: i64) -> AppResult<TmdbMovie>;

    /// TV show details with credits appended
    async fn tv_show(&self, id: i64) -> AppResult<TmdbTvShow>;

    async fn person(&self, id: i64) -> AppResult<TmdbPerson>;

    async fn collection(&self, id: i64) -> AppResult<TmdbCollection>;

    async fn genres(&self, kind: MediaKind) -> AppResult<Vec<TmdbGenre>>;

    /// First page of user reviews for a movie
    async fn movie_reviews(&self, id: i64) -> AppResult<Vec<TmdbReview>>;
}

#[derive(Clone)]
pub struct TmdbClient {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    request_delay: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl TmdbClient {
    pub fn new(http_client: HttpClient, api_key: String, api_url: String) -> Self {
        Self {
            http_client,
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            request_delay: Duration::from_millis(250),
            max_retries: 1,
            retry_backoff: Duration::from_secs(1),
        }
    }

    /// Builds a client from configuration; `None` when no API key is set
    pub fn from_config(http_client: HttpClient, config: &Config) -> Option<Self> {
        let api_key = config.tmdb_api_key()?;
        Some(
            Self::new(http_client, api_key.to_string(), config.tmdb_api_url.clone())
                .with_throttle(config.tmdb_request_delay())
                .with_retries(config.tmdb_max_retries, config.tmdb_retry_backoff()),
        )
    }

    pub fn with_throttle(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    fn is_retryable(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    /// Delay before retry number `attempt + 1`, doubling per attempt
    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff
            .checked_mul(2u32.saturating_pow(attempt))
            .map_or(MAX_BACKOFF, |backoff| backoff.min(MAX_BACKOFF))
    }

    /// GET `path` with the API key, retrying network errors, 429 and 5xx
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        let url = format!("{}{}", self.api_url, path);
        let mut attempt = 0;

        loop {
            tokio::time::sleep(self.request_delay).await;

            let result = self
                .http_client
                .get(&url)
                .query(&[("api_key", self.api_key.as_str())])
                .query(query)
                .send()
                .await;

            let error = match result {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.json::<T>().await?);
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    let error = AppError::ExternalApi(format!(
                        "TMDB returned status {} for {}: {}",
                        status, path, body
                    ));
                    if !Self::is_retryable(status) {
                        return Err(error);
                    }
                    error
                }
                Err(e) => AppError::HttpClient(e),
            };

            if attempt >= self.max_retries {
                return Err(error);
            }

            let backoff = self.backoff(attempt);
            tracing::warn!(
                path = %path,
                attempt = attempt + 1,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "TMDB request failed, retrying"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

#[async_trait::async_trait]
impl TmdbApi for TmdbClient {
    async fn list_page(&self, source: ListSource, page: u32) -> AppResult<ListPage> {
        self.get_json(source.path(), &[("page", page.to_string())])
            .await
    }

    async fn movie(&self, id: i64) -> AppResult<TmdbMovie> {
        self.get_json(
            &format!("/movie/{}", id),
            &[("append_to_response", "credits".to_string())],
        )
        .await
    }

    async fn tv_show(&self, id: i64) -> AppResult<TmdbTvShow> {
        self.get_json(
            &format!("/tv/{}", id),
            &[("append_to_response", "credits".to_string())],
        )
        .await
    }

    async fn person(&self, id: i64) -> AppResult<TmdbPerson> {
        self.get_json(&format!("/person/{}", id), &[]).await
    }

    async fn collection(&self, id: i64) -> AppResult<TmdbCollection> {
        self.get_json(&format!("/collection/{}", id), &[]).await
    }

    async fn genres(&self, kind: MediaKind) -> AppResult<Vec<TmdbGenre>> {
        let list: GenreList = self
            .get_json(&format!("/genre/{}/list", kind.path()), &[])
            .await?;
        Ok(list.genres)
    }

    async fn movie_reviews(&self, id: i64) -> AppResult<Vec<TmdbReview>> {
        let page: ReviewPage = self
            .get_json(&format!("/movie/{}/reviews", id), &[("page", "1".to_string())])
            .await?;
        Ok(page.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use axum::{extract::State, http::StatusCode as HttpStatus, routing::get, Json, Router};
    use serde_json::json;

    /// Serves `/genre/movie/list`, failing with 503 for the first `failures` calls
    async fn flaky_server(failures: usize) -> (String, Arc<AtomicUsize>) {
        async fn genres(
            State((calls, failures)): State<(Arc<AtomicUsize>, usize)>,
        ) -> Result<Json<serde_json::Value>, HttpStatus> {
            if calls.fetch_add(1, Ordering::SeqCst) < failures {
                return Err(HttpStatus::SERVICE_UNAVAILABLE);
            }
            Ok(Json(json!({"genres": [{"id": 28, "name": "Action"}]})))
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/genre/movie/list", get(genres))
            .with_state((calls.clone(), failures));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), calls)
    }

    fn client(api_url: String, max_retries: u32) -> TmdbClient {
        TmdbClient::new(HttpClient::new(), "key".into(), api_url)
            .with_throttle(Duration::ZERO)
            .with_retries(max_retries, Duration::from_millis(1))
    }

    #[test]
    fn test_list_source_paths() {
        assert_eq!(ListSource::TrendingMovies.path(), "/trending/movie/week");
        assert_eq!(ListSource::TopRatedTv.path(), "/tv/top_rated");
        assert_eq!(ListSource::PopularPeople.path(), "/person/popular");
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(TmdbClient::is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(TmdbClient::is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!TmdbClient::is_retryable(StatusCode::NOT_FOUND));
        assert!(!TmdbClient::is_retryable(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = Config::default();
        assert!(TmdbClient::from_config(HttpClient::new(), &config).is_none());

        let config = Config {
            tmdb_api_key: Some("key".into()),
            tmdb_api_url: "http://tmdb.local/3/".into(),
            ..Config::default()
        };
        let client = TmdbClient::from_config(HttpClient::new(), &config).unwrap();
        assert_eq!(client.api_url, "http://tmdb.local/3");
        assert_eq!(client.max_retries, 1);
    }

    #[test]
    fn test_backoff_doubles_and_is_bounded() {
        let client = TmdbClient::new(HttpClient::new(), "key".into(), "http://tmdb.local".into())
            .with_retries(64, Duration::from_millis(500));
        assert_eq!(client.backoff(0), Duration::from_millis(500));
        assert_eq!(client.backoff(2), Duration::from_secs(2));
        assert_eq!(client.backoff(40), MAX_BACKOFF);
        assert_eq!(client.backoff(u32::MAX), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_server_error() {
        let (url, calls) = flaky_server(1).await;

        let genres = client(url, 1).genres(MediaKind::Movie).await.unwrap();
        assert_eq!(genres.len(), 1);
        assert_eq!(genres[0].name, "Action");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let (url, calls) = flaky_server(usize::MAX).await;

        let err = client(url, 2).genres(MediaKind::Movie).await.unwrap_err();
        assert!(matches!(err, AppError::ExternalApi(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let (url, calls) = flaky_server(0).await;

        let err = client(url, 3).tv_show(1).await.unwrap_err();
        assert!(matches!(err, AppError::ExternalApi(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unreachable_host_gives_up_after_retries() {
        // Port 9 (discard) on localhost refuses connections
        let client = TmdbClient::new(
            HttpClient::new(),
            "key".into(),
            "http://127.0.0.1:9".into(),
        )
        .with_throttle(Duration::ZERO)
        .with_retries(1, Duration::from_millis(1));

        let err = client.movie(550).await.unwrap_err();
        assert!(matches!(err, AppError::HttpClient(_)));
    }
}
