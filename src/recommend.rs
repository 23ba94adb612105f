use std::collections::HashSet;

use futures::future::join_all;
use tracing::warn;

use crate::models::{ContentItem, ContentType, FavoriteRecord};
use crate::tmdb::TmdbApi;

/// Items similar to one favorited source, for a "because you liked X" row.
/// Rebuilt from scratch whenever the favorites set changes.
#[derive(Debug, Clone)]
pub struct RecommendationGroup {
    pub source: ContentItem,
    pub recommendations: Vec<ContentItem>,
}

/// Derive recommendation groups from the user's favorites: one similarity
/// query per favorite, resolved concurrently.
///
/// Failures are isolated per source. A favorite whose similarity query
/// fails contributes an empty group; one that cannot be resolved at all is
/// skipped. Either way the rest of the batch is unaffected.
///
/// Duplicates across groups collapse first-seen-wins in favorites order,
/// keyed by `(content type, id)`, so a title is attributed to the first
/// favorite that produced it.
pub async fn build_recommendations(
    catalog: &dyn TmdbApi,
    favorites: &[FavoriteRecord],
) -> Vec<RecommendationGroup> {
    let fetches = favorites.iter().map(|fav| async move {
        let (source, similar) = tokio::join!(
            catalog.details(fav.content_id, fav.content_type),
            catalog.similar(fav.content_id, fav.content_type),
        );
        (fav, source, similar)
    });

    let mut seen: HashSet<(ContentType, i32)> = HashSet::new();
    let mut groups = Vec::new();
    for (fav, source, similar) in join_all(fetches).await {
        let source = match source {
            Ok(details) => details.summary(),
            Err(err) => {
                warn!(
                    "could not resolve favorite {} {}: {}",
                    fav.content_type, fav.content_id, err
                );
                continue;
            }
        };
        let recommendations = match similar {
            Ok(items) => items
                .into_iter()
                .filter(|item| seen.insert(item.key()))
                .collect(),
            Err(err) => {
                warn!(
                    "similar lookup failed for {} {}: {}",
                    fav.content_type, fav.content_id, err
                );
                Vec::new()
            }
        };
        groups.push(RecommendationGroup {
            source,
            recommendations,
        });
    }
    groups
}

/// Flatten grouped recommendations for presentation modes without
/// per-source rows. Groups are already deduplicated, so this is a plain
/// concatenation.
pub fn flatten(groups: &[RecommendationGroup]) -> Vec<ContentItem> {
    groups
        .iter()
        .flat_map(|g| g.recommendations.iter().cloned())
        .collect()
}
