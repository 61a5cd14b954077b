//! Post deduplication and deterministic ordering.

use std::collections::HashSet;

use crate::types::{Platform, Post};

/// Remove duplicate posts in a single streaming pass, keeping first occurrence.
///
/// Two keys eliminate duplicates: an exact non-empty id match, and an exact
/// match on the first `prefix_len` characters of non-empty text. Posts with
/// neither an id nor text are never aliased to one another.
pub fn dedupe_posts(posts: Vec<Post>, prefix_len: usize) -> Vec<Post> {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut seen_prefixes: HashSet<String> = HashSet::new();
    let mut unique = Vec::with_capacity(posts.len());

    for post in posts {
        let id = post.id.as_deref().filter(|id| !id.is_empty());
        let prefix: String = post.text.chars().take(prefix_len).collect();

        if let Some(id) = id {
            if seen_ids.contains(id) {
                continue;
            }
        }
        if !prefix.is_empty() && seen_prefixes.contains(&prefix) {
            continue;
        }

        if let Some(id) = id {
            seen_ids.insert(id.to_string());
        }
        if !prefix.is_empty() {
            seen_prefixes.insert(prefix);
        }
        unique.push(post);
    }

    unique
}

/// Engagement score used to rank posts within the same date.
///
/// Weighted combination of platform-specific popularity counters.
pub fn engagement_score(post: &Post) -> f64 {
    let metric = |name: &str| post.metrics.get(name).copied().unwrap_or(0.0);

    match post.platform {
        Platform::Twitter => {
            metric("like_count") * 1.0
                + metric("retweet_count") * 2.0
                + metric("reply_count") * 1.5
                + metric("quote_count") * 1.8
        }
        Platform::Reddit => {
            metric("score") * 1.0
                + metric("comments") * 2.0
                + post.metrics.get("upvote_ratio").copied().unwrap_or(0.5) * 10.0
        }
    }
}

/// Sort posts into the deterministic total order: date descending, engagement
/// descending, then id ascending so ties are reproducible.
pub fn sort_posts(posts: &mut [Post]) {
    posts.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| {
                engagement_score(b)
                    .partial_cmp(&engagement_score(a))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.id.cmp(&b.id))
    });
}
