use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::{
    config::Config,
    db::{to_row, Store, Table},
    models::{
        tmdb::{TmdbMovie, TmdbTvShow},
        Collection, CollectionMovie, CollectionSummary, Genre, Movie, MovieCredit, MovieGenre,
        Person, PersonSummary, Review, TvShow, TvShowCredit, TvShowGenre,
    },
    services::{
        sample_data,
        tmdb::{ListSource, MediaKind, TmdbApi},
    },
};

/// Collections ingested on every run regardless of list membership
pub const COLLECTION_IDS: [i64; 10] = [10, 119, 263, 328, 645, 1241, 9485, 10194, 86311, 87359];

const MOVIE_SOURCES: [ListSource; 3] = [
    ListSource::PopularMovies,
    ListSource::TopRatedMovies,
    ListSource::TrendingMovies,
];

const TV_SOURCES: [ListSource; 3] = [
    ListSource::PopularTv,
    ListSource::TopRatedTv,
    ListSource::TrendingTv,
];

/// Tunables for one ingestion run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub movie_pages: u32,
    pub tv_pages: u32,
    pub people_pages: u32,
    pub cast_limit: usize,
    pub collection_ids: Vec<i64>,
    pub include_reviews: bool,
    pub sample_data: bool,
    pub sample_user_ids: Vec<String>,
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            movie_pages: config.sync_movie_pages,
            tv_pages: config.sync_tv_pages,
            people_pages: config.sync_people_pages,
            cast_limit: config.sync_cast_limit,
            collection_ids: COLLECTION_IDS.to_vec(),
            include_reviews: config.sync_include_reviews,
            sample_data: config.sync_sample_data,
            sample_user_ids: config.sample_user_ids.clone(),
        }
    }
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncSummary {
    pub genres: u64,
    pub movies: u64,
    pub tv_shows: u64,
    pub people: u64,
    pub credits: u64,
    pub collections: u64,
    pub reviews: u64,
    pub awards: u64,
    pub watchlist_entries: u64,
    /// List pages that could not be fetched
    pub skipped_pages: u64,
    /// Detail payloads that could not be fetched
    pub failed_items: u64,
    /// Rows the store rejected
    pub failed_writes: u64,
    pub duration_ms: u64,
}

/// Ids whose detail endpoint has already been requested during a run
#[derive(Debug, Default)]
pub struct Visited {
    pub movies: HashSet<i64>,
    pub tv_shows: HashSet<i64>,
    pub people: HashSet<i64>,
    pub collections: HashSet<i64>,
}

/// Mutable state of a single run
struct SyncRun<'v> {
    visited: &'v mut Visited,
    summary: SyncSummary,
    /// Movies successfully written, by id
    stored_movies: BTreeMap<i64, Movie>,
}

/// Sequential TMDB → store ingestion
pub struct IngestionPipeline {
    tmdb: Arc<dyn TmdbApi>,
    store: Arc<dyn Store>,
    options: SyncOptions,
}

impl IngestionPipeline {
    pub fn new(tmdb: Arc<dyn TmdbApi>, store: Arc<dyn Store>, options: SyncOptions) -> Self {
        Self {
            tmdb,
            store,
            options,
        }
    }

    /// Runs every stage with a fresh visited set
    pub async fn run(&self) -> SyncSummary {
        let mut visited = Visited::default();
        self.run_with(&mut visited).await
    }

    /// Runs every stage, skipping ids already present in `visited`.
    ///
    /// Never fails as a whole: unreachable pages, failed detail fetches and
    /// rejected rows are logged, counted and skipped.
    pub async fn run_with(&self, visited: &mut Visited) -> SyncSummary {
        let start = Instant::now();
        let mut run = SyncRun {
            visited,
            summary: SyncSummary::default(),
            stored_movies: BTreeMap::new(),
        };

        tracing::info!(
            movie_pages = self.options.movie_pages,
            tv_pages = self.options.tv_pages,
            people_pages = self.options.people_pages,
            store = self.store.backend(),
            "Starting TMDB sync"
        );

        self.sync_genres(&mut run).await;

        for source in MOVIE_SOURCES {
            self.sync_list(source, self.options.movie_pages, &mut run).await;
        }
        for source in TV_SOURCES {
            self.sync_list(source, self.options.tv_pages, &mut run).await;
        }
        self.sync_list(ListSource::PopularPeople, self.options.people_pages, &mut run)
            .await;

        for id in self.options.collection_ids.clone() {
            self.sync_collection(id, &mut run).await;
        }

        if self.options.sample_data {
            self.sync_sample_data(&mut run).await;
        }

        let mut summary = run.summary;
        summary.duration_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            movies = summary.movies,
            tv_shows = summary.tv_shows,
            people = summary.people,
            collections = summary.collections,
            skipped_pages = summary.skipped_pages,
            failed_items = summary.failed_items,
            failed_writes = summary.failed_writes,
            duration_ms = summary.duration_ms,
            "TMDB sync completed"
        );

        summary
    }

    /// Upserts one record; a rejected row is logged and counted, never fatal
    async fn write<T: Serialize>(&self, table: Table, record: &T, run: &mut SyncRun<'_>) -> bool {
        let result = match to_row(record) {
            Ok(row) => self.store.table(table).upsert(vec![row]).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(table = %table, error = %e, "Failed to upsert row");
                run.summary.failed_writes += 1;
                false
            }
        }
    }

    async fn sync_genres(&self, run: &mut SyncRun<'_>) {
        let mut seen = HashSet::new();
        for kind in [MediaKind::Movie, MediaKind::Tv] {
            let genres = match self.tmdb.genres(kind).await {
                Ok(genres) => genres,
                Err(e) => {
                    tracing::warn!(kind = ?kind, error = %e, "Failed to fetch genre list");
                    run.summary.failed_items += 1;
                    continue;
                }
            };

            for genre in &genres {
                if self.write(Table::Genres, &Genre::from(genre), run).await
                    && seen.insert(genre.id)
                {
                    run.summary.genres += 1;
                }
            }
        }
    }

    async fn sync_list(&self, source: ListSource, pages: u32, run: &mut SyncRun<'_>) {
        for page in 1..=pages {
            let list = match self.tmdb.list_page(source, page).await {
                Ok(list) => list,
                Err(e) => {
                    tracing::warn!(source = ?source, page, error = %e, "Skipping list page");
                    run.summary.skipped_pages += 1;
                    continue;
                }
            };

            tracing::debug!(source = ?source, page, items = list.results.len(), "Fetched list page");

            for item in &list.results {
                match source {
                    ListSource::PopularPeople => self.sync_person(item.id, run).await,
                    ListSource::PopularTv | ListSource::TopRatedTv | ListSource::TrendingTv => {
                        self.sync_tv_show(item.id, run).await
                    }
                    _ => self.sync_movie(item.id, run).await,
                }
            }

            if list.total_pages > 0 && page >= list.total_pages {
                break;
            }
        }
    }

    async fn sync_movie(&self, id: i64, run: &mut SyncRun<'_>) {
        if !run.visited.movies.insert(id) {
            return;
        }

        match self.tmdb.movie(id).await {
            Ok(movie) => self.store_movie(&movie, run).await,
            Err(e) => {
                tracing::warn!(movie_id = id, error = %e, "Failed to fetch movie details");
                run.summary.failed_items += 1;
            }
        }
    }

    async fn store_movie(&self, movie: &TmdbMovie, run: &mut SyncRun<'_>) {
        let row = Movie::from(movie);
        if !self.write(Table::Movies, &row, run).await {
            return;
        }
        run.summary.movies += 1;

        for genre in &movie.genres {
            self.write(Table::Genres, &Genre::from(genre), run).await;
            let link = MovieGenre {
                movie_id: movie.id,
                genre_id: genre.id,
            };
            self.write(Table::MovieGenres, &link, run).await;
        }

        let mut cast: Vec<_> = movie.credits.cast.iter().collect();
        cast.sort_by_key(|c| c.order);
        for member in cast.into_iter().take(self.options.cast_limit) {
            if !self.write(Table::People, &PersonSummary::from(member), run).await {
                continue;
            }
            let credit = MovieCredit {
                movie_id: movie.id,
                person_id: member.id,
                character: member.character.clone(),
                job: "Actor".to_string(),
                credit_order: Some(member.order),
            };
            if self.write(Table::MovieCredits, &credit, run).await {
                run.summary.credits += 1;
            }
        }

        for member in movie.credits.crew.iter().filter(|c| c.job == "Director") {
            if !self.write(Table::People, &PersonSummary::from(member), run).await {
                continue;
            }
            let credit = MovieCredit {
                movie_id: movie.id,
                person_id: member.id,
                character: None,
                job: member.job.clone(),
                credit_order: None,
            };
            if self.write(Table::MovieCredits, &credit, run).await {
                run.summary.credits += 1;
            }
        }

        if let Some(collection) = &movie.belongs_to_collection {
            if self
                .write(Table::Collections, &CollectionSummary::from(collection), run)
                .await
            {
                let link = CollectionMovie {
                    collection_id: collection.id,
                    movie_id: movie.id,
                };
                self.write(Table::CollectionMovies, &link, run).await;
            }
        }

        if self.options.include_reviews {
            self.sync_reviews(movie.id, run).await;
        }

        run.stored_movies.insert(movie.id, row);
    }

    async fn sync_reviews(&self, movie_id: i64, run: &mut SyncRun<'_>) {
        let reviews = match self.tmdb.movie_reviews(movie_id).await {
            Ok(reviews) => reviews,
            Err(e) => {
                tracing::warn!(movie_id, error = %e, "Failed to fetch movie reviews");
                run.summary.failed_items += 1;
                return;
            }
        };

        for review in reviews.iter().filter_map(|r| Review::from_tmdb(movie_id, r)) {
            if self.write(Table::Reviews, &review, run).await {
                run.summary.reviews += 1;
            }
        }
    }

    async fn sync_tv_show(&self, id: i64, run: &mut SyncRun<'_>) {
        if !run.visited.tv_shows.insert(id) {
            return;
        }

        match self.tmdb.tv_show(id).await {
            Ok(show) => self.store_tv_show(&show, run).await,
            Err(e) => {
                tracing::warn!(tv_show_id = id, error = %e, "Failed to fetch TV show details");
                run.summary.failed_items += 1;
            }
        }
    }

    async fn store_tv_show(&self, show: &TmdbTvShow, run: &mut SyncRun<'_>) {
        if !self.write(Table::TvShows, &TvShow::from(show), run).await {
            return;
        }
        run.summary.tv_shows += 1;

        for genre in &show.genres {
            self.write(Table::Genres, &Genre::from(genre), run).await;
            let link = TvShowGenre {
                tv_show_id: show.id,
                genre_id: genre.id,
            };
            self.write(Table::TvShowGenres, &link, run).await;
        }

        let mut cast: Vec<_> = show.credits.cast.iter().collect();
        cast.sort_by_key(|c| c.order);
        for member in cast.into_iter().take(self.options.cast_limit) {
            if !self.write(Table::People, &PersonSummary::from(member), run).await {
                continue;
            }
            let credit = TvShowCredit {
                tv_show_id: show.id,
                person_id: member.id,
                character: member.character.clone(),
                job: "Actor".to_string(),
                credit_order: Some(member.order),
            };
            if self.write(Table::TvShowCredits, &credit, run).await {
                run.summary.credits += 1;
            }
        }
    }

    async fn sync_person(&self, id: i64, run: &mut SyncRun<'_>) {
        if !run.visited.people.insert(id) {
            return;
        }

        match self.tmdb.person(id).await {
            Ok(person) => {
                if self.write(Table::People, &Person::from(&person), run).await {
                    run.summary.people += 1;
                }
            }
            Err(e) => {
                tracing::warn!(person_id = id, error = %e, "Failed to fetch person details");
                run.summary.failed_items += 1;
            }
        }
    }

    async fn sync_collection(&self, id: i64, run: &mut SyncRun<'_>) {
        if !run.visited.collections.insert(id) {
            return;
        }

        let collection = match self.tmdb.collection(id).await {
            Ok(collection) => collection,
            Err(e) => {
                tracing::warn!(collection_id = id, error = %e, "Failed to fetch collection");
                run.summary.failed_items += 1;
                return;
            }
        };

        if !self
            .write(Table::Collections, &Collection::from(&collection), run)
            .await
        {
            return;
        }
        run.summary.collections += 1;

        for part in &collection.parts {
            self.sync_movie(part.id, run).await;
            if run.stored_movies.contains_key(&part.id) {
                let link = CollectionMovie {
                    collection_id: collection.id,
                    movie_id: part.id,
                };
                self.write(Table::CollectionMovies, &link, run).await;
            }
        }
    }

    async fn sync_sample_data(&self, run: &mut SyncRun<'_>) {
        let movies: Vec<Movie> = run.stored_movies.values().cloned().collect();
        let data = sample_data::generate(&movies, &self.options.sample_user_ids);

        for review in &data.reviews {
            if self.write(Table::Reviews, review, run).await {
                run.summary.reviews += 1;
            }
        }
        for award in &data.awards {
            if self.write(Table::Awards, award, run).await {
                run.summary.awards += 1;
            }
        }
        for entry in &data.watchlist {
            if self.write(Table::Watchlist, entry, run).await {
                run.summary.watchlist_entries += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::error::AppError;
    use crate::models::tmdb::{
        CastMember, Credits, ListItem, ListPage, TmdbCollection, TmdbGenre, TmdbPerson,
    };
    use crate::services::tmdb::MockTmdbApi;
    use mockall::predicate::eq;

    fn options() -> SyncOptions {
        SyncOptions {
            movie_pages: 1,
            tv_pages: 0,
            people_pages: 0,
            cast_limit: 2,
            collection_ids: vec![],
            include_reviews: false,
            sample_data: false,
            sample_user_ids: vec![],
        }
    }

    fn page(ids: &[i64]) -> ListPage {
        ListPage {
            page: 1,
            results: ids.iter().map(|&id| ListItem { id }).collect(),
            total_pages: 1,
        }
    }

    fn cast(id: i64, order: i64) -> CastMember {
        CastMember {
            id,
            name: format!("Actor {}", id),
            character: Some(format!("Role {}", id)),
            order,
            profile_path: None,
            known_for_department: Some("Acting".into()),
        }
    }

    fn movie(id: i64) -> TmdbMovie {
        TmdbMovie {
            id,
            title: format!("Movie {}", id),
            overview: Some("overview".into()),
            poster_path: Some("/p.jpg".into()),
            backdrop_path: None,
            release_date: Some("2020-01-01".into()),
            vote_average: Some(7.5),
            vote_count: Some(100),
            popularity: Some(id as f64),
            runtime: Some(120),
            budget: None,
            revenue: None,
            original_language: Some("en".into()),
            status: Some("Released".into()),
            tagline: None,
            imdb_id: None,
            genres: vec![TmdbGenre {
                id: 28,
                name: "Action".into(),
            }],
            belongs_to_collection: None,
            credits: Credits {
                cast: vec![cast(3, 2), cast(1, 0), cast(2, 1)],
                crew: vec![],
            },
        }
    }

    fn mock_with_lists(popular: Vec<i64>, top_rated: Vec<i64>, trending: Vec<i64>) -> MockTmdbApi {
        let mut tmdb = MockTmdbApi::new();
        tmdb.expect_genres().returning(|_| Ok(vec![]));
        tmdb.expect_list_page()
            .with(eq(ListSource::PopularMovies), eq(1))
            .returning(move |_, _| Ok(page(&popular)));
        tmdb.expect_list_page()
            .with(eq(ListSource::TopRatedMovies), eq(1))
            .returning(move |_, _| Ok(page(&top_rated)));
        tmdb.expect_list_page()
            .with(eq(ListSource::TrendingMovies), eq(1))
            .returning(move |_, _| Ok(page(&trending)));
        tmdb
    }

    #[tokio::test]
    async fn test_duplicate_ids_fetched_once() {
        let mut tmdb = mock_with_lists(vec![1, 2], vec![2, 3], vec![1, 3]);
        tmdb.expect_movie().with(eq(1)).times(1).returning(|id| Ok(movie(id)));
        tmdb.expect_movie().with(eq(2)).times(1).returning(|id| Ok(movie(id)));
        tmdb.expect_movie().with(eq(3)).times(1).returning(|id| Ok(movie(id)));

        let store = Arc::new(MemoryStore::new());
        let pipeline = IngestionPipeline::new(Arc::new(tmdb), store.clone(), options());
        let summary = pipeline.run().await;

        assert_eq!(summary.movies, 3);
        assert_eq!(store.table(Table::Movies).count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_failed_detail_does_not_stop_neighbours() {
        let mut tmdb = mock_with_lists(vec![1, 2, 3], vec![], vec![]);
        tmdb.expect_movie().with(eq(1)).returning(|id| Ok(movie(id)));
        tmdb.expect_movie()
            .with(eq(2))
            .returning(|_| Err(AppError::ExternalApi("TMDB returned status 500".into())));
        tmdb.expect_movie().with(eq(3)).returning(|id| Ok(movie(id)));

        let store = Arc::new(MemoryStore::new());
        let pipeline = IngestionPipeline::new(Arc::new(tmdb), store.clone(), options());
        let summary = pipeline.run().await;

        assert_eq!(summary.movies, 2);
        assert_eq!(summary.failed_items, 1);
        let ids: Vec<i64> = store
            .table(Table::Movies)
            .select("id")
            .order("id", crate::db::Order::Asc)
            .execute()
            .await
            .unwrap()
            .iter()
            .filter_map(|r| r["id"].as_i64())
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_failed_page_is_skipped() {
        let mut tmdb = MockTmdbApi::new();
        tmdb.expect_genres().returning(|_| Ok(vec![]));
        tmdb.expect_list_page()
            .with(eq(ListSource::PopularMovies), eq(1))
            .returning(|_, _| Err(AppError::ExternalApi("timeout".into())));
        tmdb.expect_list_page()
            .returning(|_, _| Ok(page(&[7])));
        tmdb.expect_movie().returning(|id| Ok(movie(id)));

        let store = Arc::new(MemoryStore::new());
        let pipeline = IngestionPipeline::new(Arc::new(tmdb), store, options());
        let summary = pipeline.run().await;

        assert_eq!(summary.skipped_pages, 1);
        assert_eq!(summary.movies, 1);
    }

    #[tokio::test]
    async fn test_cast_limited_to_top_billed() {
        let mut tmdb = mock_with_lists(vec![1], vec![], vec![]);
        tmdb.expect_movie().returning(|id| Ok(movie(id)));

        let store = Arc::new(MemoryStore::new());
        let pipeline = IngestionPipeline::new(Arc::new(tmdb), store.clone(), options());
        let summary = pipeline.run().await;

        assert_eq!(summary.credits, 2);
        let people: Vec<i64> = store
            .table(Table::MovieCredits)
            .order("credit_order", crate::db::Order::Asc)
            .execute()
            .await
            .unwrap()
            .iter()
            .filter_map(|r| r["person_id"].as_i64())
            .collect();
        assert_eq!(people, vec![1, 2]);
        assert_eq!(store.table(Table::MovieGenres).count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let build = || {
            let mut tmdb = mock_with_lists(vec![1, 2], vec![3], vec![]);
            tmdb.expect_movie().returning(|id| Ok(movie(id)));
            Arc::new(tmdb)
        };
        let store = Arc::new(MemoryStore::new());
        let mut opts = options();
        opts.sample_data = true;
        opts.sample_user_ids = vec!["u1".into(), "u2".into()];

        IngestionPipeline::new(build(), store.clone(), opts.clone()).run().await;
        let mut first = Vec::new();
        for table in Table::ALL {
            first.push(store.table(table).execute().await.unwrap());
        }

        IngestionPipeline::new(build(), store.clone(), opts).run().await;
        for (table, rows) in Table::ALL.into_iter().zip(first) {
            assert_eq!(store.table(table).execute().await.unwrap(), rows, "{}", table);
        }
    }

    #[tokio::test]
    async fn test_visited_ids_are_not_refetched() {
        let mut tmdb = mock_with_lists(vec![1, 2], vec![], vec![]);
        tmdb.expect_movie().with(eq(2)).times(1).returning(|id| Ok(movie(id)));

        let mut visited = Visited::default();
        visited.movies.insert(1);

        let pipeline =
            IngestionPipeline::new(Arc::new(tmdb), Arc::new(MemoryStore::new()), options());
        let summary = pipeline.run_with(&mut visited).await;

        assert_eq!(summary.movies, 1);
        assert!(visited.movies.contains(&2));
    }

    #[tokio::test]
    async fn test_collections_people_and_genres() {
        let mut tmdb = MockTmdbApi::new();
        tmdb.expect_genres().returning(|kind| {
            Ok(match kind {
                MediaKind::Movie => vec![
                    TmdbGenre { id: 28, name: "Action".into() },
                    TmdbGenre { id: 18, name: "Drama".into() },
                ],
                MediaKind::Tv => vec![TmdbGenre { id: 18, name: "Drama".into() }],
            })
        });
        tmdb.expect_list_page()
            .with(eq(ListSource::PopularPeople), eq(1))
            .returning(|_, _| Ok(page(&[500])));
        tmdb.expect_person().with(eq(500)).returning(|id| {
            Ok(TmdbPerson {
                id,
                name: "Tom Cruise".into(),
                biography: Some("bio".into()),
                birthday: Some("1962-07-03".into()),
                place_of_birth: None,
                profile_path: None,
                known_for_department: Some("Acting".into()),
                popularity: Some(50.0),
            })
        });
        tmdb.expect_collection().with(eq(87359)).returning(|id| {
            Ok(TmdbCollection {
                id,
                name: "Mission: Impossible Collection".into(),
                overview: None,
                poster_path: None,
                backdrop_path: None,
                parts: vec![
                    crate::models::tmdb::CollectionPart { id: 954 },
                    crate::models::tmdb::CollectionPart { id: 955 },
                ],
            })
        });
        tmdb.expect_movie().with(eq(954)).returning(|id| Ok(movie(id)));
        tmdb.expect_movie()
            .with(eq(955))
            .returning(|_| Err(AppError::ExternalApi("not found".into())));

        let opts = SyncOptions {
            movie_pages: 0,
            people_pages: 1,
            collection_ids: vec![87359],
            ..options()
        };
        let store = Arc::new(MemoryStore::new());
        let summary = IngestionPipeline::new(Arc::new(tmdb), store.clone(), opts)
            .run()
            .await;

        assert_eq!(summary.genres, 2);
        assert_eq!(summary.people, 1);
        // two billed cast members of the collection part
        assert_eq!(store.table(Table::People).count().await.unwrap(), 3);
        assert_eq!(summary.collections, 1);
        assert_eq!(summary.failed_items, 1);
        let links = store.table(Table::CollectionMovies).execute().await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0]["movie_id"], serde_json::json!(954));
    }
}
