use serde::{Deserialize, Deserializer};

/// TMDB sends `""` for unknown dates and strings; treat those as absent
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// One page of a paginated list endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ListPage {
    pub page: u32,
    #[serde(default)]
    pub results: Vec<ListItem>,
    #[serde(default)]
    pub total_pages: u32,
}

/// Only the id of a list entry matters; details are fetched separately
#[derive(Debug, Clone, Deserialize)]
pub struct ListItem {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TmdbGenre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenreList {
    pub genres: Vec<TmdbGenre>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionRef {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub poster_path: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub backdrop_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CastMember {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub character: Option<String>,
    #[serde(default)]
    pub order: i64,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub profile_path: Option<String>,
    #[serde(default)]
    pub known_for_department: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrewMember {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub job: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

/// `/movie/{id}?append_to_response=credits`
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovie {
    pub id: i64,
    pub title: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub overview: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub poster_path: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub backdrop_path: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<i64>,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub runtime: Option<i64>,
    #[serde(default)]
    pub budget: Option<i64>,
    #[serde(default)]
    pub revenue: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub original_language: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub tagline: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub imdb_id: Option<String>,
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
    #[serde(default)]
    pub belongs_to_collection: Option<CollectionRef>,
    #[serde(default)]
    pub credits: Credits,
}

/// `/tv/{id}?append_to_response=credits`
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbTvShow {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub overview: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub poster_path: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub backdrop_path: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub first_air_date: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub last_air_date: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<i64>,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub number_of_seasons: Option<i64>,
    #[serde(default)]
    pub number_of_episodes: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub original_language: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub tagline: Option<String>,
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
    #[serde(default)]
    pub credits: Credits,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbPerson {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub biography: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub birthday: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub place_of_birth: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub profile_path: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub known_for_department: Option<String>,
    #[serde(default)]
    pub popularity: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionPart {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbCollection {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub overview: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub poster_path: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub parts: Vec<CollectionPart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorDetails {
    #[serde(default)]
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbReview {
    pub id: String,
    pub author: String,
    pub content: String,
    pub created_at: String,
    #[serde(default)]
    pub author_details: AuthorDetails,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewPage {
    #[serde(default)]
    pub results: Vec<TmdbReview>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movie_details_deserialization() {
        let json = r#"{
            "id": 550,
            "title": "Fight Club",
            "overview": "A ticking-time-bomb insomniac...",
            "poster_path": "/pB8BM7pdSp6B6Ih7QZ4DrQ3PmJK.jpg",
            "backdrop_path": "",
            "release_date": "1999-10-15",
            "vote_average": 8.4,
            "vote_count": 26280,
            "popularity": 61.4,
            "runtime": 139,
            "budget": 63000000,
            "revenue": 100853753,
            "original_language": "en",
            "status": "Released",
            "tagline": "",
            "imdb_id": "tt0137523",
            "genres": [{"id": 18, "name": "Drama"}],
            "belongs_to_collection": null,
            "credits": {
                "cast": [{"id": 819, "name": "Edward Norton", "character": "Narrator", "order": 0,
                          "profile_path": "/8nytsqL59SFJTVYVrN72k6qkGgJ.jpg",
                          "known_for_department": "Acting"}],
                "crew": [{"id": 7467, "name": "David Fincher", "job": "Director",
                          "department": "Directing", "profile_path": null}]
            }
        }"#;

        let movie: TmdbMovie = serde_json::from_str(json).unwrap();
        assert_eq!(movie.id, 550);
        assert_eq!(movie.backdrop_path, None);
        assert_eq!(movie.tagline, None);
        assert_eq!(movie.release_date.as_deref(), Some("1999-10-15"));
        assert_eq!(movie.genres, vec![TmdbGenre { id: 18, name: "Drama".into() }]);
        assert!(movie.belongs_to_collection.is_none());
        assert_eq!(movie.credits.cast[0].character.as_deref(), Some("Narrator"));
        assert_eq!(movie.credits.crew[0].job, "Director");
    }

    #[test]
    fn test_empty_release_date_is_none() {
        let json = r#"{"id": 1, "title": "Untitled", "release_date": ""}"#;
        let movie: TmdbMovie = serde_json::from_str(json).unwrap();
        assert_eq!(movie.release_date, None);
        assert!(movie.credits.cast.is_empty());
    }

    #[test]
    fn test_list_page_deserialization() {
        let json = r#"{"page": 2, "results": [{"id": 10, "title": "x"}, {"id": 11}], "total_pages": 500, "total_results": 10000}"#;
        let page: ListPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.page, 2);
        assert_eq!(page.results.iter().map(|i| i.id).collect::<Vec<_>>(), vec![10, 11]);
        assert_eq!(page.total_pages, 500);
    }
}
