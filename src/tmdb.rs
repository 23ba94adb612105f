use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use reqwest::Client;
use serde::Deserialize;
use std::env;

use crate::engine::merge_lists;
use crate::models::{
    ContentDetails, ContentItem, ContentType, Credits, Genre, MovieSummary, Paginated, TvSummary,
};

const TMDB_BASE: &str = "https://api.themoviedb.org/3";

/// Suggestion dropdowns only show the first few matches.
const SUGGESTION_LIMIT: usize = 5;
/// Genre discovery merges two pages and keeps the most popular entries.
const DISCOVER_LIMIT: usize = 20;

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    bearer_token: String,
    movie_genres: OnceCell<Vec<Genre>>,
    tv_genres: OnceCell<Vec<Genre>>,
}

/// Typed surface over the remote catalog. Every call is a network round
/// trip; failures propagate to the caller instead of degrading to an empty
/// list, so "no results" and "request failed" stay distinguishable.
#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn search(&self, query: &str, media: ContentType) -> Result<Vec<ContentItem>>;
    async fn suggestions(&self, query: &str, media: ContentType) -> Result<Vec<ContentItem>>;
    async fn similar(&self, id: i32, media: ContentType) -> Result<Vec<ContentItem>>;
    async fn trending(&self, media: ContentType) -> Result<Vec<ContentItem>>;
    async fn top_rated(&self, media: ContentType) -> Result<Vec<ContentItem>>;
    async fn discover_by_genre(&self, media: ContentType, genre_id: i32)
        -> Result<Vec<ContentItem>>;
    async fn genres(&self, media: ContentType) -> Result<Vec<Genre>>;
    async fn details(&self, id: i32, media: ContentType) -> Result<ContentDetails>;
}

impl TmdbClient {
    pub fn new(bearer_token: String) -> Self {
        Self {
            client: Client::new(),
            bearer_token,
            movie_genres: OnceCell::new(),
            tv_genres: OnceCell::new(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let bearer_token = env::var("TMDB_BEARER_TOKEN").context("TMDB_BEARER_TOKEN not set")?;
        Ok(Self::new(bearer_token))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let res = self
            .client
            .get(url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .context("request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            return Err(anyhow!("{} -> {}", url, text));
        }
        let parsed: T = serde_json::from_str(&text).context("JSON parse failed")?;
        Ok(parsed)
    }

    /// Fetch one page of a list endpoint and wrap the rows in the variant
    /// matching the requested content type.
    async fn fetch_items(&self, url: &str, media: ContentType) -> Result<Vec<ContentItem>> {
        match media {
            ContentType::Movie => {
                let page: Paginated<MovieSummary> = self.get_json(url).await?;
                Ok(page.results.into_iter().map(ContentItem::Movie).collect())
            }
            ContentType::Tv => {
                let page: Paginated<TvSummary> = self.get_json(url).await?;
                Ok(page.results.into_iter().map(ContentItem::Tv).collect())
            }
        }
    }

    fn genre_cache(&self, media: ContentType) -> &OnceCell<Vec<Genre>> {
        match media {
            ContentType::Movie => &self.movie_genres,
            ContentType::Tv => &self.tv_genres,
        }
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn search(&self, query: &str, media: ContentType) -> Result<Vec<ContentItem>> {
        let url = format!(
            "{TMDB_BASE}/search/{}?query={}&language=en-US&page=1&include_adult=false",
            media.as_path(),
            urlencoding::encode(query)
        );
        self.fetch_items(&url, media).await
    }

    async fn suggestions(&self, query: &str, media: ContentType) -> Result<Vec<ContentItem>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let mut items = self.search(query, media).await?;
        items.truncate(SUGGESTION_LIMIT);
        Ok(items)
    }

    async fn similar(&self, id: i32, media: ContentType) -> Result<Vec<ContentItem>> {
        let url = format!("{TMDB_BASE}/{}/{id}/similar?language=en-US", media.as_path());
        self.fetch_items(&url, media).await
    }

    async fn trending(&self, media: ContentType) -> Result<Vec<ContentItem>> {
        let url = format!("{TMDB_BASE}/trending/{}/week?language=en-US", media.as_path());
        self.fetch_items(&url, media).await
    }

    async fn top_rated(&self, media: ContentType) -> Result<Vec<ContentItem>> {
        let url = format!(
            "{TMDB_BASE}/{}/top_rated?language=en-US&page=1",
            media.as_path()
        );
        self.fetch_items(&url, media).await
    }

    async fn discover_by_genre(
        &self,
        media: ContentType,
        genre_id: i32,
    ) -> Result<Vec<ContentItem>> {
        let page_url = |page: i32| {
            format!(
                "{TMDB_BASE}/discover/{}?with_genres={genre_id}&sort_by=popularity.desc&language=en-US&page={page}",
                media.as_path()
            )
        };
        let url_first = page_url(1);
        let url_second = page_url(2);
        let (first, second) = tokio::try_join!(
            self.fetch_items(&url_first, media),
            self.fetch_items(&url_second, media),
        )?;
        // Re-sort after the merge; the per-page ordering does not survive
        // concatenation.
        let mut items = merge_lists(vec![first, second]);
        items.sort_by(|a, b| b.popularity().total_cmp(&a.popularity()));
        items.truncate(DISCOVER_LIMIT);
        Ok(items)
    }

    async fn genres(&self, media: ContentType) -> Result<Vec<Genre>> {
        #[derive(Deserialize)]
        struct GenreList {
            genres: Vec<Genre>,
        }

        let cache = self.genre_cache(media);
        if let Some(cached) = cache.get() {
            return Ok(cached.clone());
        }
        let url = format!("{TMDB_BASE}/genre/{}/list?language=en-US", media.as_path());
        let list: GenreList = self.get_json(&url).await?;
        let _ = cache.set(list.genres.clone());
        Ok(list.genres)
    }

    async fn details(&self, id: i32, media: ContentType) -> Result<ContentDetails> {
        let url_detail = format!("{TMDB_BASE}/{}/{id}?language=en-US", media.as_path());
        let url_credits = format!("{TMDB_BASE}/{}/{id}/credits?language=en-US", media.as_path());
        match media {
            ContentType::Movie => {
                let (detail, credits) = tokio::try_join!(
                    self.get_json::<MovieDetail>(&url_detail),
                    self.get_json::<Credits>(&url_credits),
                )?;
                Ok(ContentDetails {
                    content_type: ContentType::Movie,
                    id: detail.id,
                    title: detail.title,
                    overview: detail.overview,
                    tagline: none_if_empty(detail.tagline),
                    status: none_if_empty(detail.status),
                    poster_path: detail.poster_path,
                    backdrop_path: detail.backdrop_path,
                    vote_average: detail.vote_average,
                    popularity: detail.popularity,
                    genres: detail.genres,
                    production_companies: detail.production_companies,
                    date: none_if_empty(detail.release_date),
                    runtime: detail.runtime,
                    seasons: None,
                    budget: detail.budget,
                    revenue: detail.revenue,
                    credits,
                })
            }
            ContentType::Tv => {
                let (detail, credits) = tokio::try_join!(
                    self.get_json::<TvDetail>(&url_detail),
                    self.get_json::<Credits>(&url_credits),
                )?;
                Ok(ContentDetails {
                    content_type: ContentType::Tv,
                    id: detail.id,
                    title: detail.name,
                    overview: detail.overview,
                    tagline: none_if_empty(detail.tagline),
                    status: none_if_empty(detail.status),
                    poster_path: detail.poster_path,
                    backdrop_path: detail.backdrop_path,
                    vote_average: detail.vote_average,
                    popularity: detail.popularity,
                    genres: detail.genres,
                    production_companies: detail.production_companies,
                    date: none_if_empty(detail.first_air_date),
                    runtime: None,
                    seasons: detail.number_of_seasons,
                    budget: None,
                    revenue: None,
                    credits,
                })
            }
        }
    }
}

fn none_if_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

#[derive(Debug, Deserialize)]
struct MovieDetail {
    id: i32,
    title: String,
    #[serde(default)]
    overview: String,
    tagline: Option<String>,
    status: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    #[serde(default)]
    vote_average: f32,
    #[serde(default)]
    popularity: f32,
    #[serde(default)]
    genres: Vec<Genre>,
    #[serde(default)]
    production_companies: Vec<crate::models::ProductionCompany>,
    release_date: Option<String>,
    runtime: Option<i32>,
    budget: Option<i64>,
    revenue: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TvDetail {
    id: i32,
    name: String,
    #[serde(default)]
    overview: String,
    tagline: Option<String>,
    status: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    #[serde(default)]
    vote_average: f32,
    #[serde(default)]
    popularity: f32,
    #[serde(default)]
    genres: Vec<Genre>,
    #[serde(default)]
    production_companies: Vec<crate::models::ProductionCompany>,
    first_air_date: Option<String>,
    number_of_seasons: Option<i32>,
}
