use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";
pub const BACKDROP_BASE: &str = "https://image.tmdb.org/t/p/original";

/// Catalog ids are only unique within a content type, so every place that
/// compares or deduplicates items must key on `(ContentType, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Movie,
    Tv,
}

impl ContentType {
    /// Path segment used by the catalog API ("movie" / "tv").
    pub fn as_path(self) -> &'static str {
        match self {
            ContentType::Movie => "movie",
            ContentType::Tv => "tv",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_path())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieSummary {
    pub id: i32,
    pub title: String,
    #[serde(default)]
    pub overview: String,
    pub poster_path: Option<String>,
    #[serde(default)]
    pub vote_average: f32,
    #[serde(default)]
    pub popularity: f32,
    #[serde(default)]
    pub genre_ids: Vec<i32>,
    #[serde(default)]
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvSummary {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub overview: String,
    pub poster_path: Option<String>,
    #[serde(default)]
    pub vote_average: f32,
    #[serde(default)]
    pub popularity: f32,
    #[serde(default)]
    pub genre_ids: Vec<i32>,
    #[serde(default)]
    pub first_air_date: Option<String>,
}

/// A movie or series summary as returned by the search/browse endpoints.
#[derive(Debug, Clone)]
pub enum ContentItem {
    Movie(MovieSummary),
    Tv(TvSummary),
}

impl ContentItem {
    pub fn content_type(&self) -> ContentType {
        match self {
            ContentItem::Movie(_) => ContentType::Movie,
            ContentItem::Tv(_) => ContentType::Tv,
        }
    }

    pub fn id(&self) -> i32 {
        match self {
            ContentItem::Movie(m) => m.id,
            ContentItem::Tv(t) => t.id,
        }
    }

    /// Type-scoped identity; a movie and a series may share a numeric id.
    pub fn key(&self) -> (ContentType, i32) {
        (self.content_type(), self.id())
    }

    pub fn title(&self) -> &str {
        match self {
            ContentItem::Movie(m) => &m.title,
            ContentItem::Tv(t) => &t.name,
        }
    }

    pub fn overview(&self) -> &str {
        match self {
            ContentItem::Movie(m) => &m.overview,
            ContentItem::Tv(t) => &t.overview,
        }
    }

    /// Release date for movies, first air date for series. The catalog
    /// sometimes sends an empty string instead of omitting the field.
    pub fn date(&self) -> Option<&str> {
        let raw = match self {
            ContentItem::Movie(m) => m.release_date.as_deref(),
            ContentItem::Tv(t) => t.first_air_date.as_deref(),
        };
        raw.filter(|s| !s.is_empty())
    }

    pub fn parsed_date(&self) -> Option<NaiveDate> {
        self.date()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    }

    pub fn year(&self) -> Option<i32> {
        self.parsed_date().map(|d| d.year())
    }

    pub fn vote_average(&self) -> f32 {
        match self {
            ContentItem::Movie(m) => m.vote_average,
            ContentItem::Tv(t) => t.vote_average,
        }
    }

    pub fn popularity(&self) -> f32 {
        match self {
            ContentItem::Movie(m) => m.popularity,
            ContentItem::Tv(t) => t.popularity,
        }
    }

    pub fn genre_ids(&self) -> &[i32] {
        match self {
            ContentItem::Movie(m) => &m.genre_ids,
            ContentItem::Tv(t) => &t.genre_ids,
        }
    }

    pub fn poster_path(&self) -> Option<&str> {
        match self {
            ContentItem::Movie(m) => m.poster_path.as_deref(),
            ContentItem::Tv(t) => t.poster_path.as_deref(),
        }
    }

    pub fn poster_url(&self) -> Option<String> {
        self.poster_path().map(|p| format!("{POSTER_BASE}{p}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i32,
    pub name: String,
}

/// Standard response envelope for the catalog's paginated list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Paginated<T> {
    pub page: i32,
    pub results: Vec<T>,
    #[serde(default)]
    pub total_pages: i32,
    #[serde(default)]
    pub total_results: i32,
}

/// Unit for user-facing rating thresholds. The catalog reports votes on a
/// 0-10 scale; shells with a five-star input convert here instead of
/// rescaling inside the filter pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RatingScale {
    #[default]
    TenPoint,
    FiveStar,
}

impl RatingScale {
    /// Convert a threshold expressed in this scale to provider units (0-10).
    pub fn to_provider(self, value: f32) -> f32 {
        match self {
            RatingScale::TenPoint => value,
            RatingScale::FiveStar => value * 2.0,
        }
    }
}

/// One persisted user-to-content association, as stored in the favorites
/// table. Unique on `(user_id, content_id, content_type)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteRecord {
    pub id: String,
    pub user_id: String,
    pub content_id: i32,
    pub content_type: ContentType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CastMember {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub character: String,
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrewMember {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub job: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductionCompany {
    pub id: i32,
    pub name: String,
    pub logo_path: Option<String>,
}

/// Full record for one item, assembled from the detail and credits
/// endpoints. Type-specific fields are `None` for the other variant.
#[derive(Debug, Clone)]
pub struct ContentDetails {
    pub content_type: ContentType,
    pub id: i32,
    pub title: String,
    pub overview: String,
    pub tagline: Option<String>,
    pub status: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: f32,
    pub popularity: f32,
    pub genres: Vec<Genre>,
    pub production_companies: Vec<ProductionCompany>,
    pub date: Option<String>,
    pub runtime: Option<i32>,
    pub seasons: Option<i32>,
    pub budget: Option<i64>,
    pub revenue: Option<i64>,
    pub credits: Credits,
}

impl ContentDetails {
    pub fn director(&self) -> Option<&CrewMember> {
        self.credits.crew.iter().find(|c| c.job == "Director")
    }

    /// Collapse back to the summary shape used by list views and the
    /// recommendation builder.
    pub fn summary(&self) -> ContentItem {
        let genre_ids = self.genres.iter().map(|g| g.id).collect();
        match self.content_type {
            ContentType::Movie => ContentItem::Movie(MovieSummary {
                id: self.id,
                title: self.title.clone(),
                overview: self.overview.clone(),
                poster_path: self.poster_path.clone(),
                vote_average: self.vote_average,
                popularity: self.popularity,
                genre_ids,
                release_date: self.date.clone(),
            }),
            ContentType::Tv => ContentItem::Tv(TvSummary {
                id: self.id,
                name: self.title.clone(),
                overview: self.overview.clone(),
                poster_path: self.poster_path.clone(),
                vote_average: self.vote_average,
                popularity: self.popularity,
                genre_ids,
                first_air_date: self.date.clone(),
            }),
        }
    }
}
