use anyhow::Result;
use dotenvy::dotenv;
use std::env;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::engine::{filter_and_sort, FilterConfig};
use crate::models::{ContentDetails, ContentItem, ContentType, FavoriteRecord, Genre};
use crate::recommend::{self, build_recommendations, RecommendationGroup};
use crate::search::{SuggestionFeed, QUIET_PERIOD};
use crate::supabase::{AuthEvent, FavoritesApi, Session, StoreError, SupabaseClient};
use crate::tmdb::{TmdbApi, TmdbClient};

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn check_env() -> Result<()> {
    let required = ["SUPABASE_URL", "SUPABASE_ANON_KEY", "TMDB_BEARER_TOKEN"];
    for key in required {
        if env::var(key).is_err() {
            anyhow::bail!("Missing required environment variable: {}", key);
        }
    }
    info!("All required environment variables are set");
    Ok(())
}

/// What the current result list came from; drives the heading the shell
/// renders above it.
#[derive(Debug, Clone, Default)]
pub enum ResultsOrigin {
    #[default]
    Empty,
    Query(String),
    SimilarTo(ContentItem),
    Genre(ContentType, Genre),
}

/// Everything a shell renders. Updates are whole-value replacements; no
/// list is ever mutated in place across an await point.
#[derive(Default)]
pub struct ViewState {
    pub session: Option<Session>,
    pub trending_movies: Vec<ContentItem>,
    pub trending_tv: Vec<ContentItem>,
    pub top_rated_movies: Vec<ContentItem>,
    pub top_rated_tv: Vec<ContentItem>,
    pub movie_genres: Vec<Genre>,
    pub tv_genres: Vec<Genre>,
    pub results: Vec<ContentItem>,
    pub results_origin: ResultsOrigin,
    pub selected: Option<ContentDetails>,
    pub favorites: Vec<FavoriteRecord>,
    pub recommendations: Vec<RecommendationGroup>,
    pub filters: FilterConfig,
    pub error: Option<String>,
}

/// Headless application controller. Owns the service clients behind trait
/// objects and the view state the presentation shell renders.
///
/// Session state only changes in [`App::handle_auth_event`]; sign-in and
/// sign-out themselves are driven by the shell through [`crate::supabase::AuthApi`],
/// whose event feed ends up here.
pub struct App {
    catalog: Arc<dyn TmdbApi>,
    store: Arc<dyn FavoritesApi>,
    pub state: ViewState,
}

impl App {
    pub fn new(catalog: Arc<dyn TmdbApi>, store: Arc<dyn FavoritesApi>) -> Self {
        Self {
            catalog,
            store,
            state: ViewState::default(),
        }
    }

    /// Wire up real clients from the environment. Fails fatally when any
    /// required credential is absent; there is no degraded mode.
    pub fn from_env() -> Result<(Self, Arc<SupabaseClient>, mpsc::UnboundedReceiver<AuthEvent>)> {
        match dotenv() {
            Ok(path) => info!("Loaded environment from {:?}", path),
            Err(e) => warn!("No .env file loaded ({}) - relying on environment", e),
        }
        check_env()?;
        let catalog: Arc<dyn TmdbApi> = Arc::new(TmdbClient::from_env()?);
        let (supabase, auth_events) = SupabaseClient::from_env()?;
        let supabase = Arc::new(supabase);
        let store: Arc<dyn FavoritesApi> = supabase.clone();
        Ok((Self::new(catalog, store), supabase, auth_events))
    }

    /// Load the home surface: trending and top-rated, both types, in
    /// parallel. Aggregate state is only touched once all four fetches
    /// have settled; each failed fetch leaves its list empty and raises
    /// the error banner for that action.
    pub async fn load_home(&mut self) {
        let (trending_movies, trending_tv, top_movies, top_tv) = tokio::join!(
            self.catalog.trending(ContentType::Movie),
            self.catalog.trending(ContentType::Tv),
            self.catalog.top_rated(ContentType::Movie),
            self.catalog.top_rated(ContentType::Tv),
        );
        self.state.trending_movies = self.take_list(trending_movies, "trending movies");
        self.state.trending_tv = self.take_list(trending_tv, "trending series");
        self.state.top_rated_movies = self.take_list(top_movies, "top rated movies");
        self.state.top_rated_tv = self.take_list(top_tv, "top rated series");
    }

    /// Fetch the genre reference lists for both content types.
    pub async fn load_genres(&mut self) {
        let (movie_genres, tv_genres) = tokio::join!(
            self.catalog.genres(ContentType::Movie),
            self.catalog.genres(ContentType::Tv),
        );
        self.state.movie_genres = self.take_list(movie_genres, "movie genres");
        self.state.tv_genres = self.take_list(tv_genres, "series genres");
    }

    pub async fn run_search(&mut self, query: &str, media: ContentType) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }
        self.state.error = None;
        match self.catalog.search(query, media).await {
            Ok(items) => {
                self.state.results = items;
                self.state.results_origin = ResultsOrigin::Query(query.to_string());
            }
            Err(err) => {
                error!("search for '{}' failed: {}", query, err);
                self.fetch_failed(plural(media));
            }
        }
    }

    /// Replace the result list with items similar to the given one.
    pub async fn show_similar(&mut self, item: &ContentItem) {
        self.state.error = None;
        match self.catalog.similar(item.id(), item.content_type()).await {
            Ok(items) => {
                self.state.results = items;
                self.state.results_origin = ResultsOrigin::SimilarTo(item.clone());
            }
            Err(err) => {
                error!("similar lookup for '{}' failed: {}", item.title(), err);
                self.fetch_failed(plural(item.content_type()));
            }
        }
    }

    pub async fn browse_genre(&mut self, media: ContentType, genre: Genre) {
        self.state.error = None;
        match self.catalog.discover_by_genre(media, genre.id).await {
            Ok(items) => {
                self.state.results = items;
                self.state.results_origin = ResultsOrigin::Genre(media, genre);
            }
            Err(err) => {
                error!("genre discovery for '{}' failed: {}", genre.name, err);
                self.fetch_failed(plural(media));
            }
        }
    }

    /// Fetch full details for the selected item. Details are not cached
    /// across selections; reopening refetches.
    pub async fn open_details(&mut self, item: &ContentItem) {
        match self.catalog.details(item.id(), item.content_type()).await {
            Ok(details) => self.state.selected = Some(details),
            Err(err) => {
                error!("details fetch for '{}' failed: {}", item.title(), err);
                self.fetch_failed("details");
            }
        }
    }

    pub fn close_details(&mut self) {
        self.state.selected = None;
    }

    pub fn set_filters(&mut self, filters: FilterConfig) {
        self.state.filters = filters;
    }

    /// The current result list with the active filter/sort applied.
    pub fn visible_results(&self) -> Vec<ContentItem> {
        filter_and_sort(self.state.results.clone(), &self.state.filters)
    }

    /// Favorited items resolved to their catalog summaries, filtered and
    /// sorted like any other list.
    pub fn visible_favorites(&self) -> Vec<ContentItem> {
        let items = self
            .state
            .recommendations
            .iter()
            .map(|g| g.source.clone())
            .collect();
        filter_and_sort(items, &self.state.filters)
    }

    pub fn flat_recommendations(&self) -> Vec<ContentItem> {
        recommend::flatten(&self.state.recommendations)
    }

    pub fn is_favorite(&self, item: &ContentItem) -> bool {
        self.state
            .favorites
            .iter()
            .any(|f| f.content_id == item.id() && f.content_type == item.content_type())
    }

    /// Add or remove a favorite for the signed-in user, then rebuild the
    /// favorites list and recommendations from the store.
    pub async fn toggle_favorite(&mut self, item: &ContentItem) {
        let Some(session) = self.state.session.clone() else {
            self.state.error = Some("Sign in to save favorites.".to_string());
            return;
        };
        let existing = self
            .state
            .favorites
            .iter()
            .find(|f| f.content_id == item.id() && f.content_type == item.content_type())
            .map(|f| f.id.clone());

        let outcome = match existing {
            Some(record_id) => self.store.remove_favorite(&record_id).await,
            None => match self
                .store
                .add_favorite(&session.user_id, item.id(), item.content_type())
                .await
            {
                Ok(_) => Ok(()),
                // Another tab already added it; refreshing below reconciles.
                Err(StoreError::Duplicate) => {
                    warn!("'{}' was already a favorite", item.title());
                    Ok(())
                }
                Err(err) => Err(err),
            },
        };

        match outcome {
            Ok(()) => self.refresh_favorites().await,
            Err(err) => {
                error!("favorite toggle for '{}' failed: {}", item.title(), err);
                self.state.error = Some("Failed to update favorites. Please try again.".to_string());
            }
        }
    }

    /// Reload the favorites list and rebuild recommendations from it.
    /// No-op when signed out.
    pub async fn refresh_favorites(&mut self) {
        let Some(session) = self.state.session.clone() else {
            return;
        };
        match self.store.list_favorites(&session.user_id).await {
            Ok(records) => {
                self.state.favorites = records;
                let groups =
                    build_recommendations(self.catalog.as_ref(), &self.state.favorites).await;
                self.state.recommendations = groups;
            }
            Err(err) => {
                error!("failed to load favorites: {}", err);
                self.state.error = Some("Failed to load favorites. Please try again.".to_string());
            }
        }
    }

    /// Apply a session change from the auth feed. Sign-out clears all
    /// favorite-derived state before any await, so no stale account data
    /// survives the event.
    pub async fn handle_auth_event(&mut self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(session) => {
                info!("signed in as {}", session.email);
                self.state.session = Some(session);
                self.refresh_favorites().await;
            }
            AuthEvent::SignedOut => {
                info!("signed out; clearing account state");
                self.state.session = None;
                self.state.favorites = Vec::new();
                self.state.recommendations = Vec::new();
            }
        }
    }

    /// Debounced suggestion feed for a search box over the given type.
    pub fn suggestion_feed(&self, media: ContentType) -> SuggestionFeed {
        SuggestionFeed::spawn(Arc::clone(&self.catalog), media, QUIET_PERIOD)
    }

    fn fetch_failed(&mut self, what: &str) {
        self.state.error = Some(format!("Failed to fetch {}. Please try again.", what));
    }

    fn take_list<T>(&mut self, result: Result<Vec<T>>, what: &str) -> Vec<T> {
        match result {
            Ok(items) => items,
            Err(err) => {
                error!("failed to fetch {}: {}", what, err);
                self.fetch_failed(what);
                Vec::new()
            }
        }
    }
}

fn plural(media: ContentType) -> &'static str {
    match media {
        ContentType::Movie => "movies",
        ContentType::Tv => "series",
    }
}
