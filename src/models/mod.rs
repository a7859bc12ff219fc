pub mod content;
pub mod tmdb;

use serde::{Deserialize, Serialize};

pub use content::{
    Award, Collection, CollectionMovie, CollectionSummary, ContentType, Genre, Movie, MovieCredit,
    MovieGenre, Person, PersonSummary, Review, TvShow, TvShowCredit, TvShowGenre, WatchlistEntry,
};

/// Body of `POST /api/chatbot`
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

/// Chatbot reply with the titles it recommends
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub movies: Vec<Movie>,
    pub tv_shows: Vec<TvShow>,
}

/// A credit joined with the person it names
#[derive(Debug, Clone, Serialize)]
pub struct CreditView {
    pub person_id: i64,
    pub name: String,
    pub profile_url: Option<String>,
    pub character: Option<String>,
    pub job: String,
    pub credit_order: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MovieDetails {
    #[serde(flatten)]
    pub movie: Movie,
    pub genres: Vec<Genre>,
    pub cast: Vec<CreditView>,
    pub crew: Vec<CreditView>,
    pub collection: Option<Collection>,
}

#[derive(Debug, Serialize)]
pub struct TvShowDetails {
    #[serde(flatten)]
    pub show: TvShow,
    pub genres: Vec<Genre>,
    pub cast: Vec<CreditView>,
    pub crew: Vec<CreditView>,
}

/// A person's filmography entry
#[derive(Debug, Serialize)]
pub struct PersonCredit {
    pub content_type: ContentType,
    pub content_id: i64,
    pub title: String,
    pub character: Option<String>,
    pub job: String,
}

#[derive(Debug, Serialize)]
pub struct PersonDetails {
    #[serde(flatten)]
    pub person: Person,
    pub credits: Vec<PersonCredit>,
}

#[derive(Debug, Serialize)]
pub struct CollectionDetails {
    #[serde(flatten)]
    pub collection: Collection,
    pub movies: Vec<Movie>,
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub movies: Vec<Movie>,
    pub tv_shows: Vec<TvShow>,
    pub people: Vec<Person>,
}

/// Body of `POST /api/watchlist` and query of `DELETE /api/watchlist`
#[derive(Debug, Clone, Deserialize)]
pub struct WatchlistItem {
    pub content_type: ContentType,
    pub content_id: i64,
}

/// A page of list results
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub results: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_response_uses_camel_case() {
        let response = ChatResponse {
            response: "hi".into(),
            movies: vec![],
            tv_shows: vec![],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("tvShows").is_some());
        assert!(json.get("tv_shows").is_none());
    }

    #[test]
    fn test_watchlist_item_from_json() {
        let item: WatchlistItem =
            serde_json::from_str(r#"{"content_type": "tv", "content_id": 1399}"#).unwrap();
        assert_eq!(item.content_type, ContentType::Tv);
        assert_eq!(item.content_id, 1399);
    }

    #[test]
    fn test_chat_request_without_message() {
        let request: ChatRequest = serde_json::from_str("{}").unwrap();
        assert!(request.message.is_none());
    }
}
