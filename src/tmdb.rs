use std::{num::NonZeroU32, sync::Arc};

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    error::AppResult,
    models::{ImageAsset, MovieDetails, SearchHit},
};

const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p";
const DEFAULT_LANGUAGE: &str = "en-US";
const MAX_SEARCH_RESULTS: usize = 10;

/// Builds a TMDB image URL. An empty path yields an empty string.
pub fn image_url(path: &str, size: &str) -> String {
    let path = path.trim();
    if path.is_empty() {
        return String::new();
    }
    format!("{IMAGE_BASE_URL}/{size}{path}")
}

/// The movie metadata provider.
#[async_trait]
pub trait MovieSource: Send + Sync {
    /// At most ten ranked results; a blank query returns nothing.
    async fn search(&self, query: &str) -> AppResult<Vec<SearchHit>>;

    async fn details(&self, tmdb_id: i32) -> AppResult<MovieDetails>;

    /// Key of the first YouTube trailer, or an empty string.
    async fn trailer_key(&self, tmdb_id: i32) -> AppResult<String>;

    async fn localized_details(&self, tmdb_id: i32, language: &str) -> AppResult<MovieDetails>;

    /// Posters tagged with `language` plus the untagged ones.
    async fn poster_images(&self, tmdb_id: i32, language: &str) -> AppResult<Vec<ImageAsset>>;
}

pub struct TmdbClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl TmdbClient {
    pub fn new(client: reqwest::Client, access_token: String, base_url: String, rps: u32) -> Self {
        // Warn once on app load if using mock data
        if access_token.trim().is_empty() {
            tracing::warn!("Using mock TMDB data - no TMDB_ACCESS_TOKEN provided");
        }

        let quota = Quota::per_second(NonZeroU32::new(rps.max(1)).unwrap_or(NonZeroU32::MIN));
        let limiter = Arc::new(RateLimiter::direct(quota));
        Self { client, access_token, base_url, limiter }
    }

    fn is_mock(&self) -> bool {
        self.access_token.trim().is_empty()
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> AppResult<T> {
        self.limiter.until_ready().await;

        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        debug!(url = %url, "tmdb request");
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp)
    }

    async fn fetch_details(&self, tmdb_id: i32, language: &str) -> AppResult<MovieDetails> {
        let resp: DetailsResponse =
            self.get(&format!("/movie/{tmdb_id}"), &[("language", language)]).await?;
        Ok(resp.into())
    }
}

#[async_trait]
impl MovieSource for TmdbClient {
    async fn search(&self, query: &str) -> AppResult<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        if self.is_mock() {
            return Ok(vec![mock_hit()]);
        }

        let resp: SearchResponse = self
            .get("/search/movie", &[("query", query), ("language", DEFAULT_LANGUAGE), ("page", "1")])
            .await?;
        Ok(resp.results.into_iter().take(MAX_SEARCH_RESULTS).collect())
    }

    async fn details(&self, tmdb_id: i32) -> AppResult<MovieDetails> {
        if self.is_mock() {
            return Ok(mock_details(tmdb_id));
        }
        self.fetch_details(tmdb_id, DEFAULT_LANGUAGE).await
    }

    async fn trailer_key(&self, tmdb_id: i32) -> AppResult<String> {
        if self.is_mock() {
            return Ok(String::new());
        }

        let resp: VideosResponse = self
            .get(&format!("/movie/{tmdb_id}/videos"), &[("language", DEFAULT_LANGUAGE)])
            .await?;
        Ok(first_youtube_trailer(&resp.results).unwrap_or_default())
    }

    async fn localized_details(&self, tmdb_id: i32, language: &str) -> AppResult<MovieDetails> {
        if self.is_mock() {
            return Err(anyhow::anyhow!("no localized data in mock mode").into());
        }
        self.fetch_details(tmdb_id, language).await
    }

    async fn poster_images(&self, tmdb_id: i32, language: &str) -> AppResult<Vec<ImageAsset>> {
        if self.is_mock() {
            return Ok(Vec::new());
        }

        let languages = format!("{language},null");
        let resp: ImagesResponse = self
            .get(&format!("/movie/{tmdb_id}/images"), &[("include_image_language", languages.as_str())])
            .await?;
        Ok(resp
            .posters
            .into_iter()
            .map(|p| ImageAsset { file_path: p.file_path, language: p.iso_639_1 })
            .collect())
    }
}

fn first_youtube_trailer(videos: &[Video]) -> Option<String> {
    videos.iter().find(|v| v.type_ == "Trailer" && v.site == "YouTube").map(|v| v.key.clone())
}

fn mock_hit() -> SearchHit {
    SearchHit {
        id: 550, // Mock TMDB ID for Fight Club
        title: "Fight Club".to_string(),
        poster_path: Some("/pB8BM7pdSp6B6Ih7QZ4DrQ3PmJK.jpg".to_string()),
        release_date: Some("1999-10-15".to_string()),
        vote_average: 8.4,
    }
}

fn mock_details(tmdb_id: i32) -> MovieDetails {
    let hit = mock_hit();
    MovieDetails {
        id: tmdb_id,
        title: hit.title,
        poster_path: hit.poster_path,
        backdrop_path: Some("/hZkgoQYus5vegHoetLkCJzb17zJ.jpg".to_string()),
        overview: "Mock overview".to_string(),
        release_date: hit.release_date.unwrap_or_default(),
        vote_average: hit.vote_average,
        runtime: 139,
        genres: vec!["Drama".to_string()],
        origin_country: vec!["US".to_string()],
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    id: i32,
    #[serde(default)]
    title: String,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    vote_average: f64,
    #[serde(default)]
    runtime: Option<i32>,
    #[serde(default)]
    genres: Vec<Genre>,
    #[serde(default)]
    origin_country: Vec<String>,
}

impl From<DetailsResponse> for MovieDetails {
    fn from(d: DetailsResponse) -> Self {
        MovieDetails {
            id: d.id,
            title: d.title,
            poster_path: d.poster_path,
            backdrop_path: d.backdrop_path,
            overview: d.overview.unwrap_or_default(),
            release_date: d.release_date.unwrap_or_default(),
            vote_average: d.vote_average,
            runtime: d.runtime.unwrap_or(0),
            genres: d.genres.into_iter().map(|g| g.name).collect(),
            origin_country: d.origin_country,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Genre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    results: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    key: String,
    site: String,
    #[serde(rename = "type")]
    type_: String,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    posters: Vec<Poster>,
}

#[derive(Debug, Deserialize)]
struct Poster {
    file_path: String,
    iso_639_1: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(token: &str) -> TmdbClient {
        // Unroutable base URL: any request that escapes the short-circuits fails loudly.
        TmdbClient::new(reqwest::Client::new(), token.to_string(), "http://127.0.0.1:9".to_string(), 4)
    }

    #[test]
    fn image_url_joins_size_and_path() {
        assert_eq!(image_url("/abc.jpg", "w500"), "https://image.tmdb.org/t/p/w500/abc.jpg");
        assert_eq!(image_url("", "w500"), "");
        assert_eq!(image_url("  ", "w92"), "");
    }

    #[tokio::test]
    async fn blank_query_skips_network() {
        let tmdb = client("token");
        assert!(tmdb.search("").await.unwrap().is_empty());
        assert!(tmdb.search("   \t").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mock_mode_without_token() {
        let tmdb = client("");
        let hits = tmdb.search("fight").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 550);
        assert_eq!(tmdb.trailer_key(550).await.unwrap(), "");
        assert_eq!(tmdb.details(550).await.unwrap().title, "Fight Club");
        assert!(tmdb.localized_details(550, "id").await.is_err());
    }

    #[test]
    fn picks_first_youtube_trailer() {
        let videos: VideosResponse = serde_json::from_str(
            r#"{"results":[
                {"key":"teaser","site":"YouTube","type":"Teaser"},
                {"key":"vimeo","site":"Vimeo","type":"Trailer"},
                {"key":"SUXWAEX2jlg","site":"YouTube","type":"Trailer"},
                {"key":"later","site":"YouTube","type":"Trailer"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(first_youtube_trailer(&videos.results).as_deref(), Some("SUXWAEX2jlg"));
        assert_eq!(first_youtube_trailer(&[]), None);
    }

    #[test]
    fn details_tolerate_nulls() {
        let raw = r#"{"id":550,"title":"Fight Club","poster_path":null,"backdrop_path":null,
            "overview":null,"release_date":"1999-10-15","vote_average":8.4,"runtime":null,
            "genres":[{"id":18,"name":"Drama"}],"origin_country":["US"]}"#;
        let details: MovieDetails = serde_json::from_str::<DetailsResponse>(raw).unwrap().into();
        assert_eq!(details.runtime, 0);
        assert_eq!(details.overview, "");
        assert_eq!(details.genres, vec!["Drama".to_string()]);
        assert_eq!(details.into_new_film(String::new()).poster_path, "");
    }
}
