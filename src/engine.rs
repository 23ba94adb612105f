use std::collections::HashMap;

use crate::models::{ContentItem, ContentType, RatingScale};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    #[default]
    Popularity,
    Rating,
    DateAsc,
    DateDesc,
}

#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Inclusive lower bound, expressed in `rating_scale` units.
    pub min_rating: f32,
    pub rating_scale: RatingScale,
    /// Keep only items whose date falls in exactly this year.
    pub year: Option<i32>,
    /// Keep only items carrying this genre id.
    pub genre: Option<i32>,
    pub sort_by: SortBy,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_rating: 0.0,
            rating_scale: RatingScale::TenPoint,
            year: None,
            genre: None,
            sort_by: SortBy::Popularity,
        }
    }
}

/// Filter and order a content list for display.
///
/// All sorts are stable, so items with equal keys keep their input order.
/// Items without a parseable date sort as oldest and never match a year
/// filter.
pub fn filter_and_sort(items: Vec<ContentItem>, config: &FilterConfig) -> Vec<ContentItem> {
    let threshold = config.rating_scale.to_provider(config.min_rating);
    let mut kept: Vec<ContentItem> = items
        .into_iter()
        .filter(|item| item.vote_average() >= threshold)
        .filter(|item| config.year.is_none() || item.year() == config.year)
        .filter(|item| match config.genre {
            Some(genre_id) => item.genre_ids().contains(&genre_id),
            None => true,
        })
        .collect();

    match config.sort_by {
        SortBy::Popularity => kept.sort_by(|a, b| b.popularity().total_cmp(&a.popularity())),
        SortBy::Rating => kept.sort_by(|a, b| b.vote_average().total_cmp(&a.vote_average())),
        SortBy::DateAsc => kept.sort_by(|a, b| a.parsed_date().cmp(&b.parsed_date())),
        SortBy::DateDesc => kept.sort_by(|a, b| b.parsed_date().cmp(&a.parsed_date())),
    }
    kept
}

/// Merge result lists from multiple source queries into one, collapsing
/// duplicates by `(content type, id)`.
///
/// The last occurrence of a key wins, so a fresher fetch overwrites an
/// earlier snapshot of the same item; output order is the first occurrence
/// of each key.
pub fn merge_lists(lists: Vec<Vec<ContentItem>>) -> Vec<ContentItem> {
    let mut order: Vec<(ContentType, i32)> = Vec::new();
    let mut by_key: HashMap<(ContentType, i32), ContentItem> = HashMap::new();
    for item in lists.into_iter().flatten() {
        let key = item.key();
        if by_key.insert(key, item).is_none() {
            order.push(key);
        }
    }
    order
        .into_iter()
        .filter_map(|key| by_key.remove(&key))
        .collect()
}
