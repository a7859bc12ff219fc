use chrono::{DateTime, Duration, Utc};

use crate::models::{Award, ContentType, Movie, Review, WatchlistEntry};

/// Movies (by popularity) that receive synthetic rows
const SAMPLE_LIMIT: usize = 20;

/// 2024-01-01, in days since the Unix epoch
const BASE_DAY: i64 = 19_723;

const REVIEW_BODIES: [&str; 5] = [
    "An absolute must-watch. The performances carry every scene.",
    "Solid entertainment, though the second half drags a little.",
    "Beautifully shot and scored. I'd watch it again.",
    "Not my favourite, but I can see why people love it.",
    "The story kept me guessing until the very end.",
];

const AWARD_NAMES: [(&str, &str); 3] = [
    ("Academy Award", "Best Picture"),
    ("Golden Globe", "Best Motion Picture - Drama"),
    ("BAFTA Award", "Best Film"),
];

/// Synthetic rows for a set of ingested movies
#[derive(Debug, Default, PartialEq)]
pub struct SampleData {
    pub reviews: Vec<Review>,
    pub awards: Vec<Award>,
    pub watchlist: Vec<WatchlistEntry>,
}

fn day(offset: i64) -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::days(BASE_DAY + offset.rem_euclid(365))
}

fn release_year(movie: &Movie) -> Option<i64> {
    movie
        .release_date
        .as_deref()
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse().ok())
}

/// Generates reviews, awards and watchlist entries.
///
/// Output depends only on the inputs, so every id and timestamp is identical
/// across runs and re-upserting converges on the same rows.
pub fn generate(movies: &[Movie], user_ids: &[String]) -> SampleData {
    let mut picked: Vec<&Movie> = movies.iter().collect();
    picked.sort_by(|a, b| {
        b.popularity
            .unwrap_or_default()
            .total_cmp(&a.popularity.unwrap_or_default())
            .then(a.id.cmp(&b.id))
    });
    picked.truncate(SAMPLE_LIMIT);

    let mut data = SampleData::default();

    for movie in picked {
        for (index, user_id) in user_ids.iter().enumerate() {
            let seed = movie.id + index as i64;

            if seed % 3 != 0 {
                let base = movie.rating.unwrap_or(6.0).round();
                let rating = (base + (seed % 3 - 1) as f64).clamp(1.0, 10.0);
                data.reviews.push(Review {
                    id: format!("sample-{}-{}", movie.id, user_id),
                    content_type: ContentType::Movie,
                    content_id: movie.id,
                    user_id: Some(user_id.clone()),
                    author: user_id.clone(),
                    rating: Some(rating),
                    body: REVIEW_BODIES[seed.rem_euclid(REVIEW_BODIES.len() as i64) as usize]
                        .to_string(),
                    source: "sample".to_string(),
                    created_at: day(movie.id * 7 + index as i64),
                });
            }

            if seed % 4 == 0 {
                data.watchlist.push(WatchlistEntry {
                    user_id: user_id.clone(),
                    content_type: ContentType::Movie,
                    content_id: movie.id,
                    added_at: day(movie.id * 3 + index as i64),
                });
            }
        }

        if movie.rating.unwrap_or_default() >= 8.0 {
            let (name, category) = AWARD_NAMES[movie.id.rem_euclid(AWARD_NAMES.len() as i64) as usize];
            data.awards.push(Award {
                id: format!("sample-award-{}", movie.id),
                content_type: ContentType::Movie,
                content_id: movie.id,
                name: name.to_string(),
                category: category.to_string(),
                year: release_year(movie).map(|y| y + 1),
                won: movie.id % 2 == 0,
            });
        }
    }

    data
}
