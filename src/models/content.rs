use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::models::tmdb::{
    CastMember, CollectionRef, CrewMember, TmdbCollection, TmdbGenre, TmdbMovie, TmdbPerson,
    TmdbReview, TmdbTvShow,
};

const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p";

/// Absolute URL for a TMDB image path at the given size (`w500`, `original`, ...)
pub fn image_url(path: Option<&str>, size: &str) -> Option<String> {
    path.map(|p| format!("{}/{}{}", IMAGE_BASE_URL, size, p))
}

fn poster(path: &Option<String>) -> Option<String> {
    image_url(path.as_deref(), "w500")
}

fn backdrop(path: &Option<String>) -> Option<String> {
    image_url(path.as_deref(), "original")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Movie,
    Tv,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Movie => "movie",
            ContentType::Tv => "tv",
        }
    }
}

impl Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A row of `movies`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub synopsis: Option<String>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub rating: Option<f64>,
    pub vote_count: Option<i64>,
    pub popularity: Option<f64>,
    pub release_date: Option<String>,
    pub runtime: Option<i64>,
    pub budget: Option<i64>,
    pub revenue: Option<i64>,
    pub language: Option<String>,
    pub status: Option<String>,
    pub tagline: Option<String>,
    pub imdb_id: Option<String>,
}

impl From<&TmdbMovie> for Movie {
    fn from(movie: &TmdbMovie) -> Self {
        Self {
            id: movie.id,
            title: movie.title.clone(),
            synopsis: movie.overview.clone(),
            poster_url: poster(&movie.poster_path),
            backdrop_url: backdrop(&movie.backdrop_path),
            rating: movie.vote_average,
            vote_count: movie.vote_count,
            popularity: movie.popularity,
            release_date: movie.release_date.clone(),
            runtime: movie.runtime,
            budget: movie.budget,
            revenue: movie.revenue,
            language: movie.original_language.clone(),
            status: movie.status.clone(),
            tagline: movie.tagline.clone(),
            imdb_id: movie.imdb_id.clone(),
        }
    }
}

/// A row of `tv_shows`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TvShow {
    pub id: i64,
    pub name: String,
    pub synopsis: Option<String>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub rating: Option<f64>,
    pub vote_count: Option<i64>,
    pub popularity: Option<f64>,
    pub first_air_date: Option<String>,
    pub last_air_date: Option<String>,
    pub number_of_seasons: Option<i64>,
    pub number_of_episodes: Option<i64>,
    pub status: Option<String>,
    pub language: Option<String>,
    pub tagline: Option<String>,
}

impl From<&TmdbTvShow> for TvShow {
    fn from(show: &TmdbTvShow) -> Self {
        Self {
            id: show.id,
            name: show.name.clone(),
            synopsis: show.overview.clone(),
            poster_url: poster(&show.poster_path),
            backdrop_url: backdrop(&show.backdrop_path),
            rating: show.vote_average,
            vote_count: show.vote_count,
            popularity: show.popularity,
            first_air_date: show.first_air_date.clone(),
            last_air_date: show.last_air_date.clone(),
            number_of_seasons: show.number_of_seasons,
            number_of_episodes: show.number_of_episodes,
            status: show.status.clone(),
            language: show.original_language.clone(),
            tagline: show.tagline.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

impl From<&TmdbGenre> for Genre {
    fn from(genre: &TmdbGenre) -> Self {
        Self {
            id: genre.id,
            name: genre.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieGenre {
    pub movie_id: i64,
    pub genre_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TvShowGenre {
    pub tv_show_id: i64,
    pub genre_id: i64,
}

/// A full row of `people`, written from the person detail endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub profile_url: Option<String>,
    pub department: Option<String>,
    pub biography: Option<String>,
    pub birthday: Option<String>,
    pub place_of_birth: Option<String>,
    pub popularity: Option<f64>,
}

impl From<&TmdbPerson> for Person {
    fn from(person: &TmdbPerson) -> Self {
        Self {
            id: person.id,
            name: person.name.clone(),
            profile_url: poster(&person.profile_path),
            department: person.known_for_department.clone(),
            biography: person.biography.clone(),
            birthday: person.birthday.clone(),
            place_of_birth: person.place_of_birth.clone(),
            popularity: person.popularity,
        }
    }
}

/// The subset of `people` a credit carries; upserting it leaves detail columns untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonSummary {
    pub id: i64,
    pub name: String,
    pub profile_url: Option<String>,
    pub department: Option<String>,
}

impl From<&CastMember> for PersonSummary {
    fn from(cast: &CastMember) -> Self {
        Self {
            id: cast.id,
            name: cast.name.clone(),
            profile_url: poster(&cast.profile_path),
            department: cast
                .known_for_department
                .clone()
                .or_else(|| Some("Acting".to_string())),
        }
    }
}

impl From<&CrewMember> for PersonSummary {
    fn from(crew: &CrewMember) -> Self {
        Self {
            id: crew.id,
            name: crew.name.clone(),
            profile_url: poster(&crew.profile_path),
            department: crew.department.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieCredit {
    pub movie_id: i64,
    pub person_id: i64,
    pub character: Option<String>,
    pub job: String,
    pub credit_order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TvShowCredit {
    pub tv_show_id: i64,
    pub person_id: i64,
    pub character: Option<String>,
    pub job: String,
    pub credit_order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: i64,
    pub name: String,
    pub overview: Option<String>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
}

impl From<&TmdbCollection> for Collection {
    fn from(collection: &TmdbCollection) -> Self {
        Self {
            id: collection.id,
            name: collection.name.clone(),
            overview: collection.overview.clone(),
            poster_url: poster(&collection.poster_path),
            backdrop_url: backdrop(&collection.backdrop_path),
        }
    }
}

/// Collection row as known from a movie's `belongs_to_collection`; carries no overview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub id: i64,
    pub name: String,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
}

impl From<&CollectionRef> for CollectionSummary {
    fn from(collection: &CollectionRef) -> Self {
        Self {
            id: collection.id,
            name: collection.name.clone(),
            poster_url: poster(&collection.poster_path),
            backdrop_url: backdrop(&collection.backdrop_path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMovie {
    pub collection_id: i64,
    pub movie_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub content_type: ContentType,
    pub content_id: i64,
    pub user_id: Option<String>,
    pub author: String,
    pub rating: Option<f64>,
    pub body: String,
    /// `tmdb` or `sample`
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// Converts a TMDB review; returns `None` when its timestamp is unparseable
    pub fn from_tmdb(movie_id: i64, review: &TmdbReview) -> Option<Self> {
        let created_at = DateTime::parse_from_rfc3339(&review.created_at)
            .ok()?
            .with_timezone(&Utc);
        Some(Self {
            id: format!("tmdb-{}", review.id),
            content_type: ContentType::Movie,
            content_id: movie_id,
            user_id: None,
            author: review.author.clone(),
            rating: review.author_details.rating,
            body: review.content.clone(),
            source: "tmdb".to_string(),
            created_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub user_id: String,
    pub content_type: ContentType,
    pub content_id: i64,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Award {
    pub id: String,
    pub content_type: ContentType,
    pub content_id: i64,
    pub name: String,
    pub category: String,
    pub year: Option<i64>,
    pub won: bool,
}
