use serde::de::DeserializeOwned;
use std::collections::HashSet;

use crate::{
    db::{Order, Store, Table},
    error::AppResult,
    models::{ChatResponse, Movie, TvShow},
};

/// Titles returned per media kind
const MAX_RESULTS: u64 = 6;

const MOVIE_KEYWORDS: [&str; 3] = ["movie", "film", "cinema"];
const TV_KEYWORDS: [&str; 4] = ["tv", "show", "series", "episode"];
const RATING_KEYWORDS: [&str; 3] = ["top rated", "best", "highest"];

/// Keywords mapped to a canonical genre and its TMDB genre ids
#[derive(Debug, PartialEq)]
pub struct GenreRule {
    pub keywords: &'static [&'static str],
    pub name: &'static str,
    pub movie_genre_ids: &'static [i64],
    pub tv_genre_ids: &'static [i64],
}

const fn rule(
    keywords: &'static [&'static str],
    name: &'static str,
    movie_genre_ids: &'static [i64],
    tv_genre_ids: &'static [i64],
) -> GenreRule {
    GenreRule {
        keywords,
        name,
        movie_genre_ids,
        tv_genre_ids,
    }
}

/// Checked in order; the first rule with a matching keyword wins
pub const GENRE_RULES: &[GenreRule] = &[
    rule(&["sci-fi", "scifi", "science fiction", "space"], "Science Fiction", &[878], &[10765]),
    rule(&["action"], "Action", &[28], &[10759]),
    rule(&["adventure"], "Adventure", &[12], &[10759]),
    rule(&["animated", "animation", "cartoon", "anime"], "Animation", &[16], &[16]),
    rule(&["comedy", "comedies", "funny", "laugh"], "Comedy", &[35], &[35]),
    rule(&["crime", "heist", "gangster"], "Crime", &[80], &[80]),
    rule(&["documentary", "documentaries"], "Documentary", &[99], &[99]),
    rule(&["drama"], "Drama", &[18], &[18]),
    rule(&["family", "kids"], "Family", &[10751], &[10751, 10762]),
    rule(&["fantasy", "magic"], "Fantasy", &[14], &[10765]),
    rule(&["history", "historical"], "History", &[36], &[]),
    rule(&["horror", "scary", "scare"], "Horror", &[27], &[]),
    rule(&["musical", "music"], "Music", &[10402], &[]),
    rule(&["mystery", "mysteries", "detective"], "Mystery", &[9648], &[9648]),
    rule(&["romance", "romantic", "love story"], "Romance", &[10749], &[]),
    rule(&["thriller", "suspense"], "Thriller", &[53], &[]),
    rule(&["war"], "War", &[10752], &[10768]),
    rule(&["western", "cowboy"], "Western", &[37], &[37]),
];

/// What a chat message asks for
#[derive(Debug, PartialEq)]
pub struct Intent {
    pub is_movie_request: bool,
    pub is_tv_request: bool,
    pub genre: Option<&'static GenreRule>,
    pub by_rating: bool,
}

impl Intent {
    fn media_label(&self) -> &'static str {
        match (self.is_movie_request, self.is_tv_request) {
            (true, false) => "movies",
            (false, true) => "TV shows",
            _ => "movies and TV shows",
        }
    }

    fn order_column(&self) -> &'static str {
        if self.by_rating {
            "rating"
        } else {
            "popularity"
        }
    }

    fn adjective(&self) -> &'static str {
        if self.by_rating {
            "top-rated"
        } else {
            "popular"
        }
    }
}

fn contains_any(message: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| message.contains(k))
}

/// Flat keyword matching over the lower-cased message
pub fn classify(message: &str) -> Intent {
    let message = message.to_lowercase();

    let mut is_movie_request = contains_any(&message, &MOVIE_KEYWORDS);
    let mut is_tv_request = contains_any(&message, &TV_KEYWORDS);
    if !is_movie_request && !is_tv_request {
        is_movie_request = true;
        is_tv_request = true;
    }

    Intent {
        is_movie_request,
        is_tv_request,
        genre: GENRE_RULES
            .iter()
            .find(|rule| contains_any(&message, rule.keywords)),
        by_rating: contains_any(&message, &RATING_KEYWORDS),
    }
}

/// Keyword-driven recommendations over the ingested catalog
pub struct Chatbot<'a> {
    store: &'a dyn Store,
}

impl<'a> Chatbot<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub async fn reply(&self, message: &str) -> AppResult<ChatResponse> {
        let intent = classify(message);
        tracing::debug!(
            movies = intent.is_movie_request,
            tv = intent.is_tv_request,
            genre = intent.genre.map(|g| g.name),
            by_rating = intent.by_rating,
            "Classified chat message"
        );

        if let Some(genre) = intent.genre {
            let movies = if intent.is_movie_request {
                self.by_genre::<Movie>(
                    Table::MovieGenres,
                    "movie_id",
                    Table::Movies,
                    genre.movie_genre_ids,
                    &intent,
                )
                .await?
            } else {
                vec![]
            };
            let tv_shows = if intent.is_tv_request {
                self.by_genre::<TvShow>(
                    Table::TvShowGenres,
                    "tv_show_id",
                    Table::TvShows,
                    genre.tv_genre_ids,
                    &intent,
                )
                .await?
            } else {
                vec![]
            };

            if !movies.is_empty() || !tv_shows.is_empty() {
                return Ok(ChatResponse {
                    response: format!(
                        "Here are some {} {} {} you might enjoy:",
                        intent.adjective(),
                        genre.name,
                        intent.media_label()
                    ),
                    movies,
                    tv_shows,
                });
            }

            let fallback = self.general(&intent).await?;
            if fallback.movies.is_empty() && fallback.tv_shows.is_empty() {
                return Ok(fallback);
            }
            return Ok(ChatResponse {
                response: format!(
                    "I couldn't find any {} {} yet, but here are some {} picks:",
                    genre.name,
                    intent.media_label(),
                    intent.adjective()
                ),
                ..fallback
            });
        }

        self.general(&intent).await
    }

    /// Popularity (or rating) ordered list without a genre constraint
    async fn general(&self, intent: &Intent) -> AppResult<ChatResponse> {
        let movies = if intent.is_movie_request {
            self.top::<Movie>(Table::Movies, None, intent).await?
        } else {
            vec![]
        };
        let tv_shows = if intent.is_tv_request {
            self.top::<TvShow>(Table::TvShows, None, intent).await?
        } else {
            vec![]
        };

        let response = if movies.is_empty() && tv_shows.is_empty() {
            "I don't have any titles to recommend yet. Run a sync to load the catalog first."
                .to_string()
        } else {
            format!(
                "Here are some {} {} right now. Ask for a genre like action, comedy or horror for more specific picks.",
                intent.adjective(),
                intent.media_label()
            )
        };

        Ok(ChatResponse {
            response,
            movies,
            tv_shows,
        })
    }

    async fn by_genre<T: DeserializeOwned>(
        &self,
        join: Table,
        id_column: &str,
        table: Table,
        genre_ids: &[i64],
        intent: &Intent,
    ) -> AppResult<Vec<T>> {
        if genre_ids.is_empty() {
            return Ok(vec![]);
        }

        let ids: HashSet<i64> = self
            .store
            .table(join)
            .select(id_column)
            .in_list("genre_id", genre_ids.iter().copied())
            .execute()
            .await?
            .iter()
            .filter_map(|row| row.get(id_column).and_then(|v| v.as_i64()))
            .collect();

        if ids.is_empty() {
            return Ok(vec![]);
        }
        self.top(table, Some(ids), intent).await
    }

    async fn top<T: DeserializeOwned>(
        &self,
        table: Table,
        ids: Option<HashSet<i64>>,
        intent: &Intent,
    ) -> AppResult<Vec<T>> {
        let mut query = self.store.table(table);
        if let Some(ids) = ids {
            query = query.in_list("id", ids);
        }
        query
            .order(intent.order_column(), Order::Desc)
            .limit(MAX_RESULTS)
            .execute_as()
            .await
    }
}
