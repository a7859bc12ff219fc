use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::error::{AppError, AppResult};

/// Column types the query layer casts placeholders to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    BigInt,
    Numeric,
    Text,
    Date,
    Timestamp,
    Boolean,
}

impl SqlType {
    pub fn cast(&self) -> &'static str {
        match self {
            SqlType::Integer => "integer",
            SqlType::BigInt => "bigint",
            SqlType::Numeric => "numeric",
            SqlType::Text => "text",
            SqlType::Date => "date",
            SqlType::Timestamp => "timestamptz",
            SqlType::Boolean => "boolean",
        }
    }
}

/// One allow-listed column
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: SqlType,
}

const fn col(name: &'static str, sql_type: SqlType) -> ColumnDef {
    ColumnDef { name, sql_type }
}

use SqlType::*;

const MOVIES: &[ColumnDef] = &[
    col("id", Integer),
    col("title", Text),
    col("synopsis", Text),
    col("poster_url", Text),
    col("backdrop_url", Text),
    col("rating", Numeric),
    col("vote_count", Integer),
    col("popularity", Numeric),
    col("release_date", Date),
    col("runtime", Integer),
    col("budget", BigInt),
    col("revenue", BigInt),
    col("language", Text),
    col("status", Text),
    col("tagline", Text),
    col("imdb_id", Text),
];

const TV_SHOWS: &[ColumnDef] = &[
    col("id", Integer),
    col("name", Text),
    col("synopsis", Text),
    col("poster_url", Text),
    col("backdrop_url", Text),
    col("rating", Numeric),
    col("vote_count", Integer),
    col("popularity", Numeric),
    col("first_air_date", Date),
    col("last_air_date", Date),
    col("number_of_seasons", Integer),
    col("number_of_episodes", Integer),
    col("status", Text),
    col("language", Text),
    col("tagline", Text),
];

const GENRES: &[ColumnDef] = &[col("id", Integer), col("name", Text)];

const MOVIE_GENRES: &[ColumnDef] = &[col("movie_id", Integer), col("genre_id", Integer)];

const TV_SHOW_GENRES: &[ColumnDef] = &[col("tv_show_id", Integer), col("genre_id", Integer)];

const PEOPLE: &[ColumnDef] = &[
    col("id", Integer),
    col("name", Text),
    col("profile_url", Text),
    col("department", Text),
    col("biography", Text),
    col("birthday", Date),
    col("place_of_birth", Text),
    col("popularity", Numeric),
];

const MOVIE_CREDITS: &[ColumnDef] = &[
    col("movie_id", Integer),
    col("person_id", Integer),
    col("character", Text),
    col("job", Text),
    col("credit_order", Integer),
];

const TV_SHOW_CREDITS: &[ColumnDef] = &[
    col("tv_show_id", Integer),
    col("person_id", Integer),
    col("character", Text),
    col("job", Text),
    col("credit_order", Integer),
];

const COLLECTIONS: &[ColumnDef] = &[
    col("id", Integer),
    col("name", Text),
    col("overview", Text),
    col("poster_url", Text),
    col("backdrop_url", Text),
];

const COLLECTION_MOVIES: &[ColumnDef] =
    &[col("collection_id", Integer), col("movie_id", Integer)];

const REVIEWS: &[ColumnDef] = &[
    col("id", Text),
    col("content_type", Text),
    col("content_id", Integer),
    col("user_id", Text),
    col("author", Text),
    col("rating", Numeric),
    col("body", Text),
    col("source", Text),
    col("created_at", Timestamp),
];

const WATCHLIST: &[ColumnDef] = &[
    col("user_id", Text),
    col("content_type", Text),
    col("content_id", Integer),
    col("added_at", Timestamp),
];

const AWARDS: &[ColumnDef] = &[
    col("id", Text),
    col("content_type", Text),
    col("content_id", Integer),
    col("name", Text),
    col("category", Text),
    col("year", Integer),
    col("won", Boolean),
];

/// Every table the service reads or writes.
///
/// Table names only ever reach SQL through [`Table::as_str`], and column names
/// only after [`Table::column`] has found them in the table's allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Movies,
    TvShows,
    Genres,
    MovieGenres,
    TvShowGenres,
    People,
    MovieCredits,
    TvShowCredits,
    Collections,
    CollectionMovies,
    Reviews,
    Watchlist,
    Awards,
}

impl Table {
    pub const ALL: [Table; 13] = [
        Table::Movies,
        Table::TvShows,
        Table::Genres,
        Table::MovieGenres,
        Table::TvShowGenres,
        Table::People,
        Table::MovieCredits,
        Table::TvShowCredits,
        Table::Collections,
        Table::CollectionMovies,
        Table::Reviews,
        Table::Watchlist,
        Table::Awards,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Movies => "movies",
            Table::TvShows => "tv_shows",
            Table::Genres => "genres",
            Table::MovieGenres => "movie_genres",
            Table::TvShowGenres => "tv_show_genres",
            Table::People => "people",
            Table::MovieCredits => "movie_credits",
            Table::TvShowCredits => "tv_show_credits",
            Table::Collections => "collections",
            Table::CollectionMovies => "collection_movies",
            Table::Reviews => "reviews",
            Table::Watchlist => "watchlist",
            Table::Awards => "awards",
        }
    }

    pub fn columns(&self) -> &'static [ColumnDef] {
        match self {
            Table::Movies => MOVIES,
            Table::TvShows => TV_SHOWS,
            Table::Genres => GENRES,
            Table::MovieGenres => MOVIE_GENRES,
            Table::TvShowGenres => TV_SHOW_GENRES,
            Table::People => PEOPLE,
            Table::MovieCredits => MOVIE_CREDITS,
            Table::TvShowCredits => TV_SHOW_CREDITS,
            Table::Collections => COLLECTIONS,
            Table::CollectionMovies => COLLECTION_MOVIES,
            Table::Reviews => REVIEWS,
            Table::Watchlist => WATCHLIST,
            Table::Awards => AWARDS,
        }
    }

    /// Upsert conflict target
    pub fn primary_key(&self) -> &'static [&'static str] {
        match self {
            Table::MovieGenres => &["movie_id", "genre_id"],
            Table::TvShowGenres => &["tv_show_id", "genre_id"],
            Table::MovieCredits => &["movie_id", "person_id", "job"],
            Table::TvShowCredits => &["tv_show_id", "person_id", "job"],
            Table::CollectionMovies => &["collection_id", "movie_id"],
            Table::Watchlist => &["user_id", "content_type", "content_id"],
            _ => &["id"],
        }
    }

    /// Looks up an allow-listed column, rejecting anything else
    pub fn column(&self, name: &str) -> AppResult<&'static ColumnDef> {
        self.columns()
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| {
                AppError::InvalidInput(format!("Unknown column '{}' on table {}", name, self))
            })
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_keys_are_allow_listed() {
        for table in Table::ALL {
            for key in table.primary_key() {
                assert!(table.column(key).is_ok(), "{}.{} missing", table, key);
            }
        }
    }

    #[test]
    fn test_unknown_column_rejected() {
        let err = Table::Movies.column("title; DROP TABLE movies").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_column_type_lookup() {
        assert_eq!(Table::Movies.column("release_date").unwrap().sql_type, SqlType::Date);
        assert_eq!(Table::Awards.column("won").unwrap().sql_type.cast(), "boolean");
    }
}
