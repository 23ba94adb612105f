use anyhow::{anyhow, Result};
use chrono::Utc;
use cinescope::app::App;
use cinescope::models::{
    ContentDetails, ContentItem, ContentType, CrewMember, Credits, FavoriteRecord, Genre,
    MovieSummary, TvSummary,
};
use cinescope::search::SuggestionFeed;
use cinescope::supabase::{AuthEvent, FavoritesApi, Session, StoreError};
use cinescope::tmdb::TmdbApi;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn movie(id: i32, vote: f32, popularity: f32) -> ContentItem {
    ContentItem::Movie(MovieSummary {
        id,
        title: format!("Movie {id}"),
        overview: String::new(),
        poster_path: None,
        vote_average: vote,
        popularity,
        genre_ids: vec![28],
        release_date: Some("2020-01-01".to_string()),
    })
}

fn series(id: i32, vote: f32, popularity: f32) -> ContentItem {
    ContentItem::Tv(TvSummary {
        id,
        name: format!("Series {id}"),
        overview: String::new(),
        poster_path: None,
        vote_average: vote,
        popularity,
        genre_ids: vec![18],
        first_air_date: Some("2021-02-02".to_string()),
    })
}

fn details_of(item: &ContentItem) -> ContentDetails {
    ContentDetails {
        content_type: item.content_type(),
        id: item.id(),
        title: item.title().to_string(),
        overview: item.overview().to_string(),
        tagline: None,
        status: Some("Released".to_string()),
        poster_path: None,
        backdrop_path: None,
        vote_average: item.vote_average(),
        popularity: item.popularity(),
        genres: vec![Genre {
            id: 28,
            name: "Action".to_string(),
        }],
        production_companies: Vec::new(),
        date: item.date().map(str::to_string),
        runtime: None,
        seasons: None,
        budget: None,
        revenue: None,
        credits: Credits::default(),
    }
}

fn session() -> Session {
    Session {
        user_id: "user-1".to_string(),
        email: "user@example.com".to_string(),
        access_token: "test-token".to_string(),
    }
}

#[derive(Default)]
struct FakeCatalog {
    trending: HashMap<ContentType, Vec<ContentItem>>,
    top_rated: HashMap<ContentType, Vec<ContentItem>>,
    search_results: Vec<ContentItem>,
    fail_search: bool,
    fail_trending: HashSet<ContentType>,
    similar: HashMap<(ContentType, i32), Vec<ContentItem>>,
    details: HashMap<(ContentType, i32), ContentDetails>,
    discover: Vec<ContentItem>,
    suggestions: HashMap<String, Vec<ContentItem>>,
    suggestion_delays: HashMap<String, u64>,
    suggestion_calls: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl TmdbApi for FakeCatalog {
    async fn search(&self, _query: &str, _media: ContentType) -> Result<Vec<ContentItem>> {
        if self.fail_search {
            return Err(anyhow!("catalog unreachable"));
        }
        Ok(self.search_results.clone())
    }

    async fn suggestions(&self, query: &str, _media: ContentType) -> Result<Vec<ContentItem>> {
        self.suggestion_calls
            .lock()
            .unwrap()
            .push(query.to_string());
        if let Some(ms) = self.suggestion_delays.get(query) {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }
        let mut items = self.suggestions.get(query).cloned().unwrap_or_default();
        items.truncate(5);
        Ok(items)
    }

    async fn similar(&self, id: i32, media: ContentType) -> Result<Vec<ContentItem>> {
        self.similar
            .get(&(media, id))
            .cloned()
            .ok_or_else(|| anyhow!("no similar fixture for {} {}", media, id))
    }

    async fn trending(&self, media: ContentType) -> Result<Vec<ContentItem>> {
        if self.fail_trending.contains(&media) {
            return Err(anyhow!("catalog unreachable"));
        }
        Ok(self.trending.get(&media).cloned().unwrap_or_default())
    }

    async fn top_rated(&self, media: ContentType) -> Result<Vec<ContentItem>> {
        Ok(self.top_rated.get(&media).cloned().unwrap_or_default())
    }

    async fn discover_by_genre(
        &self,
        _media: ContentType,
        _genre_id: i32,
    ) -> Result<Vec<ContentItem>> {
        Ok(self.discover.clone())
    }

    async fn genres(&self, _media: ContentType) -> Result<Vec<Genre>> {
        Ok(vec![Genre {
            id: 28,
            name: "Action".to_string(),
        }])
    }

    async fn details(&self, id: i32, media: ContentType) -> Result<ContentDetails> {
        self.details
            .get(&(media, id))
            .cloned()
            .ok_or_else(|| anyhow!("no details fixture for {} {}", media, id))
    }
}

#[derive(Default)]
struct FakeStore {
    rows: Mutex<Vec<FavoriteRecord>>,
    next_id: Mutex<u32>,
}

impl FakeStore {
    fn seed(&self, user_id: &str, content_id: i32, content_type: ContentType) {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        self.rows.lock().unwrap().push(FavoriteRecord {
            id: format!("rec-{}", *next),
            user_id: user_id.to_string(),
            content_id,
            content_type,
            created_at: Utc::now(),
        });
    }
}

#[async_trait::async_trait]
impl FavoritesApi for FakeStore {
    async fn list_favorites(&self, user_id: &str) -> Result<Vec<FavoriteRecord>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn add_favorite(
        &self,
        user_id: &str,
        content_id: i32,
        content_type: ContentType,
    ) -> Result<FavoriteRecord, StoreError> {
        let duplicate = self.rows.lock().unwrap().iter().any(|r| {
            r.user_id == user_id && r.content_id == content_id && r.content_type == content_type
        });
        if duplicate {
            return Err(StoreError::Duplicate);
        }
        self.seed(user_id, content_id, content_type);
        let rows = self.rows.lock().unwrap();
        Ok(rows.last().cloned().expect("row just inserted"))
    }

    async fn remove_favorite(&self, record_id: &str) -> Result<(), StoreError> {
        self.rows.lock().unwrap().retain(|r| r.id != record_id);
        Ok(())
    }
}

fn app_with(catalog: FakeCatalog, store: FakeStore) -> App {
    App::new(Arc::new(catalog), Arc::new(store))
}

#[tokio::test]
async fn recommendations_keep_type_scoped_identity() {
    let mut catalog = FakeCatalog::default();
    let fav_movie = movie(10, 7.0, 1.0);
    let fav_series = series(20, 8.0, 2.0);
    catalog
        .details
        .insert((ContentType::Movie, 10), details_of(&fav_movie));
    catalog
        .details
        .insert((ContentType::Tv, 20), details_of(&fav_series));
    catalog
        .similar
        .insert((ContentType::Movie, 10), vec![movie(99, 6.0, 1.0)]);
    catalog
        .similar
        .insert((ContentType::Tv, 20), vec![series(99, 6.5, 2.0)]);
    let store = FakeStore::default();
    store.seed("user-1", 10, ContentType::Movie);
    store.seed("user-1", 20, ContentType::Tv);

    let mut app = app_with(catalog, store);
    app.handle_auth_event(AuthEvent::SignedIn(session())).await;

    let flat = app.flat_recommendations();
    assert_eq!(flat.len(), 2, "id 99 must stay distinct per content type");
    let keys: Vec<(ContentType, i32)> = flat.iter().map(|i| i.key()).collect();
    assert!(keys.contains(&(ContentType::Movie, 99)));
    assert!(keys.contains(&(ContentType::Tv, 99)));
}

#[tokio::test]
async fn recommendation_batch_tolerates_one_failing_source() {
    let mut catalog = FakeCatalog::default();
    let fav_movie = movie(10, 7.0, 1.0);
    let fav_series = series(20, 8.0, 2.0);
    catalog
        .details
        .insert((ContentType::Movie, 10), details_of(&fav_movie));
    catalog
        .details
        .insert((ContentType::Tv, 20), details_of(&fav_series));
    // No similar fixture for the movie: that query fails.
    catalog
        .similar
        .insert((ContentType::Tv, 20), vec![series(300, 6.5, 2.0)]);
    let store = FakeStore::default();
    store.seed("user-1", 10, ContentType::Movie);
    store.seed("user-1", 20, ContentType::Tv);

    let mut app = app_with(catalog, store);
    app.handle_auth_event(AuthEvent::SignedIn(session())).await;

    assert_eq!(app.state.recommendations.len(), 2);
    assert!(app.state.recommendations[0].recommendations.is_empty());
    let flat = app.flat_recommendations();
    assert_eq!(flat.len(), 1);
    assert_eq!(flat[0].key(), (ContentType::Tv, 300));
}

#[tokio::test]
async fn duplicate_recommendations_go_to_the_first_favorite() {
    let mut catalog = FakeCatalog::default();
    let fav_a = movie(10, 7.0, 1.0);
    let fav_b = movie(20, 7.5, 2.0);
    catalog
        .details
        .insert((ContentType::Movie, 10), details_of(&fav_a));
    catalog
        .details
        .insert((ContentType::Movie, 20), details_of(&fav_b));
    catalog.similar.insert(
        (ContentType::Movie, 10),
        vec![movie(77, 6.0, 1.0), movie(101, 5.5, 1.0)],
    );
    catalog.similar.insert(
        (ContentType::Movie, 20),
        vec![movie(77, 6.0, 1.0), movie(202, 5.0, 1.0)],
    );
    let store = FakeStore::default();
    store.seed("user-1", 10, ContentType::Movie);
    store.seed("user-1", 20, ContentType::Movie);

    let mut app = app_with(catalog, store);
    app.handle_auth_event(AuthEvent::SignedIn(session())).await;

    let first = &app.state.recommendations[0];
    let second = &app.state.recommendations[1];
    assert!(first.recommendations.iter().any(|i| i.id() == 77));
    assert!(second.recommendations.iter().all(|i| i.id() != 77));
    assert!(second.recommendations.iter().any(|i| i.id() == 202));
}

#[tokio::test]
async fn sign_out_clears_account_state() {
    let mut catalog = FakeCatalog::default();
    let fav_movie = movie(10, 7.0, 1.0);
    catalog
        .details
        .insert((ContentType::Movie, 10), details_of(&fav_movie));
    catalog
        .similar
        .insert((ContentType::Movie, 10), vec![movie(99, 6.0, 1.0)]);
    let store = FakeStore::default();
    store.seed("user-1", 10, ContentType::Movie);

    let mut app = app_with(catalog, store);
    app.handle_auth_event(AuthEvent::SignedIn(session())).await;
    assert!(!app.state.favorites.is_empty());
    assert!(!app.state.recommendations.is_empty());

    app.handle_auth_event(AuthEvent::SignedOut).await;
    assert!(app.state.session.is_none());
    assert!(app.state.favorites.is_empty());
    assert!(app.state.recommendations.is_empty());
}

#[tokio::test]
async fn toggle_favorite_adds_then_removes() {
    let mut catalog = FakeCatalog::default();
    let item = movie(10, 7.0, 1.0);
    catalog
        .details
        .insert((ContentType::Movie, 10), details_of(&item));
    catalog
        .similar
        .insert((ContentType::Movie, 10), vec![movie(99, 6.0, 1.0)]);

    let mut app = app_with(catalog, FakeStore::default());
    app.handle_auth_event(AuthEvent::SignedIn(session())).await;

    app.toggle_favorite(&item).await;
    assert!(app.is_favorite(&item));
    assert_eq!(app.state.favorites.len(), 1);
    assert_eq!(app.state.recommendations.len(), 1);

    app.toggle_favorite(&item).await;
    assert!(!app.is_favorite(&item));
    assert!(app.state.favorites.is_empty());
    assert!(app.state.recommendations.is_empty());
}

#[tokio::test]
async fn duplicate_add_reconciles_from_the_store() {
    let mut catalog = FakeCatalog::default();
    let item = movie(10, 7.0, 1.0);
    catalog
        .details
        .insert((ContentType::Movie, 10), details_of(&item));
    catalog
        .similar
        .insert((ContentType::Movie, 10), vec![movie(99, 6.0, 1.0)]);
    // Already favorited elsewhere; this controller does not know yet.
    let store = FakeStore::default();
    store.seed("user-1", 10, ContentType::Movie);

    let mut app = app_with(catalog, store);
    app.state.session = Some(session());
    app.toggle_favorite(&item).await;

    assert!(app.state.error.is_none());
    assert_eq!(app.state.favorites.len(), 1);
}

#[tokio::test]
async fn toggle_favorite_requires_a_session() {
    let mut app = app_with(FakeCatalog::default(), FakeStore::default());
    app.toggle_favorite(&movie(10, 7.0, 1.0)).await;
    assert!(app.state.favorites.is_empty());
    assert!(app.state.error.is_some());
}

#[tokio::test]
async fn failed_trending_fetch_is_isolated_per_list() {
    let mut catalog = FakeCatalog::default();
    catalog.fail_trending.insert(ContentType::Movie);
    catalog
        .trending
        .insert(ContentType::Tv, vec![series(1, 8.0, 10.0)]);
    catalog
        .top_rated
        .insert(ContentType::Movie, vec![movie(2, 9.0, 5.0)]);

    let mut app = app_with(catalog, FakeStore::default());
    app.load_home().await;

    assert!(app.state.trending_movies.is_empty());
    assert_eq!(app.state.trending_tv.len(), 1);
    assert_eq!(app.state.top_rated_movies.len(), 1);
    let banner = app.state.error.expect("error banner for the failed list");
    assert!(banner.contains("trending movies"));
}

#[tokio::test]
async fn search_failure_raises_action_scoped_banner() {
    let catalog = FakeCatalog {
        fail_search: true,
        ..FakeCatalog::default()
    };
    let mut app = app_with(catalog, FakeStore::default());
    app.run_search("dune", ContentType::Movie).await;

    assert!(app.state.results.is_empty());
    assert_eq!(
        app.state.error.as_deref(),
        Some("Failed to fetch movies. Please try again.")
    );
}

#[tokio::test]
async fn search_results_respect_active_filters() {
    let catalog = FakeCatalog {
        search_results: vec![movie(1, 7.2, 50.0), movie(2, 4.0, 90.0)],
        ..FakeCatalog::default()
    };
    let mut app = app_with(catalog, FakeStore::default());
    app.run_search("dune", ContentType::Movie).await;

    app.set_filters(cinescope::engine::FilterConfig {
        min_rating: 5.0,
        ..Default::default()
    });

    let visible = app.visible_results();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id(), 1);
    // The raw list is untouched; only the view is filtered.
    assert_eq!(app.state.results.len(), 2);
}

#[tokio::test]
async fn open_details_sets_and_clears_selection() {
    let mut catalog = FakeCatalog::default();
    let item = movie(10, 7.0, 1.0);
    let mut details = details_of(&item);
    details.credits.crew.push(CrewMember {
        id: 1,
        name: "Jane Doe".to_string(),
        job: "Director".to_string(),
    });
    catalog.details.insert((ContentType::Movie, 10), details);

    let mut app = app_with(catalog, FakeStore::default());
    app.open_details(&item).await;
    let selected = app.state.selected.as_ref().expect("details loaded");
    assert_eq!(selected.director().map(|d| d.name.as_str()), Some("Jane Doe"));

    app.close_details();
    assert!(app.state.selected.is_none());
}

#[tokio::test]
async fn debounce_coalesces_rapid_keystrokes() {
    let mut catalog = FakeCatalog::default();
    catalog
        .suggestions
        .insert("dune".to_string(), vec![movie(1, 7.0, 1.0)]);
    let catalog = Arc::new(catalog);

    let feed = SuggestionFeed::spawn(
        catalog.clone(),
        ContentType::Movie,
        Duration::from_millis(80),
    );
    for partial in ["d", "du", "dun", "dune"] {
        feed.push(partial);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    let calls = catalog.suggestion_calls.lock().unwrap().clone();
    assert_eq!(calls, vec!["dune".to_string()]);
    assert_eq!(feed.results().borrow().len(), 1);
    feed.shutdown();
}

#[tokio::test]
async fn stale_suggestion_response_is_dropped() {
    let mut catalog = FakeCatalog::default();
    catalog
        .suggestions
        .insert("slow".to_string(), vec![movie(1, 7.0, 1.0)]);
    catalog
        .suggestions
        .insert("fast".to_string(), vec![movie(2, 8.0, 2.0)]);
    catalog.suggestion_delays.insert("slow".to_string(), 400);
    let catalog = Arc::new(catalog);

    let feed = SuggestionFeed::spawn(
        catalog.clone(),
        ContentType::Movie,
        Duration::from_millis(50),
    );
    feed.push("slow");
    tokio::time::sleep(Duration::from_millis(120)).await;
    feed.push("fast");
    tokio::time::sleep(Duration::from_millis(600)).await;

    let calls = catalog.suggestion_calls.lock().unwrap().clone();
    assert_eq!(calls, vec!["slow".to_string(), "fast".to_string()]);
    // The slow response landed last but must not win.
    let results = feed.results().borrow().clone();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id(), 2);
    feed.shutdown();
}

#[tokio::test]
async fn blank_input_clears_suggestions_without_a_fetch() {
    let mut catalog = FakeCatalog::default();
    catalog
        .suggestions
        .insert("dune".to_string(), vec![movie(1, 7.0, 1.0)]);
    let catalog = Arc::new(catalog);

    let feed = SuggestionFeed::spawn(
        catalog.clone(),
        ContentType::Movie,
        Duration::from_millis(50),
    );
    feed.push("dune");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(feed.results().borrow().len(), 1);

    feed.push("   ");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(feed.results().borrow().is_empty());

    let calls = catalog.suggestion_calls.lock().unwrap().clone();
    assert_eq!(calls, vec!["dune".to_string()]);
    feed.shutdown();
}
