use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize};
use std::collections::HashMap;

use crate::{
    db::{to_row, Order, QueryBuilder, Row, Store, Table},
    error::{AppError, AppResult},
    models::{
        Collection, CollectionDetails, ContentType, CreditView, Genre, Movie, MovieDetails, Page,
        Person, PersonCredit, PersonDetails, Review, SearchResults, TvShow, TvShowDetails,
        WatchlistEntry, WatchlistItem,
    },
};

const DEFAULT_PAGE_SIZE: u64 = 20;
const MAX_PAGE_SIZE: u64 = 100;
const SEARCH_LIMIT: u64 = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Popularity,
    Rating,
    ReleaseDate,
}

/// Query parameters of the movie and TV list endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub genre: Option<i64>,
    #[serde(default)]
    pub sort: SortBy,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl ListParams {
    fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }
}

#[derive(Deserialize)]
struct CreditRow {
    person_id: i64,
    character: Option<String>,
    job: String,
    credit_order: Option<i64>,
}

#[derive(Deserialize)]
struct PersonRef {
    id: i64,
    name: String,
    profile_url: Option<String>,
}

#[derive(Deserialize)]
struct TitleRef {
    id: i64,
    #[serde(alias = "name")]
    title: String,
}

/// Rewrites the generic missing-row error into one naming the entity
fn not_found(kind: &'static str, id: i64) -> impl FnOnce(AppError) -> AppError {
    move |e| match e {
        AppError::NotFound(_) => AppError::NotFound(format!("{} {} not found", kind, id)),
        other => other,
    }
}

fn restrict_ids<'q>(builder: QueryBuilder<'q>, ids: &Option<Vec<i64>>) -> QueryBuilder<'q> {
    match ids {
        Some(ids) => builder.in_list("id", ids.iter().copied()),
        None => builder,
    }
}

/// Escapes the `LIKE` wildcards in user input; backslash is the escape character
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Read paths over the ingested catalog, plus the per-user watchlist
pub struct Catalog<'a> {
    store: &'a dyn Store,
}

impl<'a> Catalog<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Values of `column` for rows of `table` where `key = id`
    async fn linked_ids(&self, table: Table, key: &str, id: i64, column: &str) -> AppResult<Vec<i64>> {
        Ok(self
            .store
            .table(table)
            .select(column)
            .eq(key, id)
            .execute()
            .await?
            .iter()
            .filter_map(|row| row.get(column).and_then(|v| v.as_i64()))
            .collect())
    }

    async fn list<T: DeserializeOwned>(
        &self,
        table: Table,
        genre_link: (Table, &str),
        date_column: &str,
        params: &ListParams,
    ) -> AppResult<Page<T>> {
        let ids = match params.genre {
            Some(genre) => {
                let (link_table, id_column) = genre_link;
                Some(self.linked_ids(link_table, "genre_id", genre, id_column).await?)
            }
            None => None,
        };

        let sort_column = match params.sort {
            SortBy::Popularity => "popularity",
            SortBy::Rating => "rating",
            SortBy::ReleaseDate => date_column,
        };
        let (page, limit) = (params.page(), params.limit());
        let (from, to) = (page - 1)
            .checked_mul(limit)
            .and_then(|from| Some((from, from.checked_add(limit - 1)?)))
            .ok_or_else(|| AppError::InvalidInput("Page out of range".into()))?;

        let total = restrict_ids(self.store.table(table), &ids).count().await?;
        let results = restrict_ids(self.store.table(table), &ids)
            .order(sort_column, Order::Desc)
            .order("id", Order::Asc)
            .range(from, to)
            .execute_as()
            .await?;

        Ok(Page {
            page,
            limit,
            total,
            results,
        })
    }

    pub async fn movies(&self, params: &ListParams) -> AppResult<Page<Movie>> {
        self.list(Table::Movies, (Table::MovieGenres, "movie_id"), "release_date", params)
            .await
    }

    pub async fn tv_shows(&self, params: &ListParams) -> AppResult<Page<TvShow>> {
        self.list(Table::TvShows, (Table::TvShowGenres, "tv_show_id"), "first_air_date", params)
            .await
    }

    async fn genres(&self, link_table: Table, key: &str, id: i64) -> AppResult<Vec<Genre>> {
        let ids = self.linked_ids(link_table, key, id, "genre_id").await?;
        self.store
            .table(Table::Genres)
            .in_list("id", ids)
            .order("name", Order::Asc)
            .execute_as()
            .await
    }

    /// Credits of a title joined with their people, split into cast and crew
    async fn credits(&self, table: Table, key: &str, id: i64) -> AppResult<(Vec<CreditView>, Vec<CreditView>)> {
        let rows: Vec<CreditRow> = self
            .store
            .table(table)
            .select("person_id, character, job, credit_order")
            .eq(key, id)
            .order("credit_order", Order::Asc)
            .order("person_id", Order::Asc)
            .execute_as()
            .await?;

        let people: HashMap<i64, PersonRef> = self
            .store
            .table(Table::People)
            .select("id, name, profile_url")
            .in_list("id", rows.iter().map(|r| r.person_id))
            .execute_as::<PersonRef>()
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let (cast, crew): (Vec<_>, Vec<_>) = rows
            .into_iter()
            .filter_map(|row| {
                let person = people.get(&row.person_id)?;
                Some(CreditView {
                    person_id: row.person_id,
                    name: person.name.clone(),
                    profile_url: person.profile_url.clone(),
                    character: row.character,
                    job: row.job,
                    credit_order: row.credit_order,
                })
            })
            .partition(|credit| credit.job == "Actor");

        Ok((cast, crew))
    }

    pub async fn movie(&self, id: i64) -> AppResult<MovieDetails> {
        let movie: Movie = self
            .store
            .table(Table::Movies)
            .eq("id", id)
            .single_as()
            .await
            .map_err(not_found("Movie", id))?;

        let genres = self.genres(Table::MovieGenres, "movie_id", id).await?;
        let (cast, crew) = self.credits(Table::MovieCredits, "movie_id", id).await?;

        let collection_ids = self
            .linked_ids(Table::CollectionMovies, "movie_id", id, "collection_id")
            .await?;
        let collection = match collection_ids.first() {
            Some(&collection_id) => self
                .store
                .table(Table::Collections)
                .eq("id", collection_id)
                .execute_as::<Collection>()
                .await?
                .into_iter()
                .next(),
            None => None,
        };

        Ok(MovieDetails {
            movie,
            genres,
            cast,
            crew,
            collection,
        })
    }

    pub async fn tv_show(&self, id: i64) -> AppResult<TvShowDetails> {
        let show: TvShow = self
            .store
            .table(Table::TvShows)
            .eq("id", id)
            .single_as()
            .await
            .map_err(not_found("TV show", id))?;

        let genres = self.genres(Table::TvShowGenres, "tv_show_id", id).await?;
        let (cast, crew) = self.credits(Table::TvShowCredits, "tv_show_id", id).await?;

        Ok(TvShowDetails {
            show,
            genres,
            cast,
            crew,
        })
    }

    async fn filmography(
        &self,
        credits: Table,
        titles: Table,
        key: &str,
        content_type: ContentType,
        person_id: i64,
    ) -> AppResult<Vec<PersonCredit>> {
        let rows: Vec<Row> = self
            .store
            .table(credits)
            .eq("person_id", person_id)
            .execute()
            .await?;
        let content_ids: Vec<i64> = rows
            .iter()
            .filter_map(|row| row.get(key).and_then(|v| v.as_i64()))
            .collect();

        let column_list = match titles {
            Table::TvShows => "id, name",
            _ => "id, title",
        };
        let names: HashMap<i64, String> = self
            .store
            .table(titles)
            .select(column_list)
            .in_list("id", content_ids)
            .execute_as::<TitleRef>()
            .await?
            .into_iter()
            .map(|t| (t.id, t.title))
            .collect();

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let content_id = row.get(key)?.as_i64()?;
                let credit: CreditRow = serde_json::from_value(row.into()).ok()?;
                Some(PersonCredit {
                    content_type,
                    content_id,
                    title: names.get(&content_id)?.clone(),
                    character: credit.character,
                    job: credit.job,
                })
            })
            .collect())
    }

    pub async fn person(&self, id: i64) -> AppResult<PersonDetails> {
        let person: Person = self
            .store
            .table(Table::People)
            .eq("id", id)
            .single_as()
            .await
            .map_err(not_found("Person", id))?;

        let mut credits = self
            .filmography(Table::MovieCredits, Table::Movies, "movie_id", ContentType::Movie, id)
            .await?;
        credits.extend(
            self.filmography(Table::TvShowCredits, Table::TvShows, "tv_show_id", ContentType::Tv, id)
                .await?,
        );

        Ok(PersonDetails { person, credits })
    }

    pub async fn collection(&self, id: i64) -> AppResult<CollectionDetails> {
        let collection: Collection = self
            .store
            .table(Table::Collections)
            .eq("id", id)
            .single_as()
            .await
            .map_err(not_found("Collection", id))?;

        let movie_ids = self
            .linked_ids(Table::CollectionMovies, "collection_id", id, "movie_id")
            .await?;
        let movies = self
            .store
            .table(Table::Movies)
            .in_list("id", movie_ids)
            .order("release_date", Order::Asc)
            .execute_as()
            .await?;

        Ok(CollectionDetails { collection, movies })
    }

    /// Reviews of a title, newest first
    pub async fn reviews(&self, content_type: ContentType, id: i64) -> AppResult<Vec<Review>> {
        self.store
            .table(Table::Reviews)
            .eq("content_type", content_type.as_str())
            .eq("content_id", id)
            .order("created_at", Order::Desc)
            .execute_as()
            .await
    }

    /// Case-insensitive substring match on titles and names
    pub async fn search(&self, q: &str) -> AppResult<SearchResults> {
        let q = q.trim();
        if q.is_empty() {
            return Err(AppError::InvalidInput("Search query must not be empty".into()));
        }
        let pattern = format!("%{}%", escape_like(q));

        let movies = self
            .store
            .table(Table::Movies)
            .ilike("title", pattern.as_str())
            .order("popularity", Order::Desc)
            .limit(SEARCH_LIMIT)
            .execute_as()
            .await?;
        let tv_shows = self
            .store
            .table(Table::TvShows)
            .ilike("name", pattern.as_str())
            .order("popularity", Order::Desc)
            .limit(SEARCH_LIMIT)
            .execute_as()
            .await?;
        let people = self
            .store
            .table(Table::People)
            .ilike("name", pattern.as_str())
            .order("popularity", Order::Desc)
            .limit(SEARCH_LIMIT)
            .execute_as()
            .await?;

        Ok(SearchResults {
            movies,
            tv_shows,
            people,
        })
    }

    pub async fn watchlist(&self, user_id: &str) -> AppResult<Vec<WatchlistEntry>> {
        self.store
            .table(Table::Watchlist)
            .eq("user_id", user_id)
            .order("added_at", Order::Desc)
            .execute_as()
            .await
    }

    pub async fn add_to_watchlist(&self, user_id: &str, item: &WatchlistItem) -> AppResult<WatchlistEntry> {
        let (table, kind) = match item.content_type {
            ContentType::Movie => (Table::Movies, "Movie"),
            ContentType::Tv => (Table::TvShows, "TV show"),
        };
        if self.store.table(table).eq("id", item.content_id).count().await? == 0 {
            return Err(AppError::NotFound(format!("{} {} not found", kind, item.content_id)));
        }

        let entry = WatchlistEntry {
            user_id: user_id.to_string(),
            content_type: item.content_type,
            content_id: item.content_id,
            added_at: Utc::now(),
        };
        self.store
            .table(Table::Watchlist)
            .insert(vec![to_row(&entry)?])
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => AppError::Conflict("Already on the watchlist".into()),
                other => other,
            })?;

        tracing::debug!(user_id, content_id = item.content_id, "Added watchlist entry");
        Ok(entry)
    }

    pub async fn remove_from_watchlist(&self, user_id: &str, item: &WatchlistItem) -> AppResult<()> {
        let removed = self
            .store
            .table(Table::Watchlist)
            .eq("user_id", user_id)
            .eq("content_type", item.content_type.as_str())
            .eq("content_id", item.content_id)
            .delete()
            .await?;

        if removed == 0 {
            return Err(AppError::NotFound("Not on the watchlist".into()));
        }
        Ok(())
    }
}
