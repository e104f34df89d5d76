//! Source Records
//!
//! One struct per CSV schema. Every column is read as optional text so that
//! absent columns and blank cells go through the same coercion rules; the
//! conversion into store operations is where required fields are enforced.

use crate::coerce::{
    float_or_zero, int_or_zero, optional_date, optional_int, required_int, text, text_list,
};
use crate::error::CoerceError;
use crate::store::{EdgeSpec, NodeKey, NodeLabel, Properties, RelType};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io::Read;

/// A row that becomes exactly one node.
pub trait EntityRow: DeserializeOwned {
    const LABEL: NodeLabel;

    /// Human-readable identification for failure logs
    fn display_name(&self) -> String;

    fn into_properties(self) -> Result<Properties, CoerceError>;
}

/// A row that becomes exactly one relationship.
pub trait RelationshipRow: DeserializeOwned {
    const REL: RelType;

    fn into_edge(self) -> Result<EdgeSpec, CoerceError>;
}

/// Stream typed rows out of a headed CSV source.
pub fn read_rows<R: Read, T: DeserializeOwned>(
    source: R,
) -> impl Iterator<Item = Result<T, csv::Error>> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(source)
        .into_deserialize()
}

fn or_key(name: &Option<String>, key: &Option<String>, fallback: &str) -> String {
    let name = text(name.as_deref());
    if !name.trim().is_empty() {
        return name;
    }
    format!("{} {}", fallback, text(key.as_deref()))
}

// ============================================================================
// Persons
// ============================================================================

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
pub struct PersonRow {
    pub person_tmdbId: Option<String>,
    pub name: Option<String>,
    pub born: Option<String>,
    pub bornIn: Option<String>,
    pub died: Option<String>,
    pub bio: Option<String>,
    pub person_imdbId: Option<String>,
    pub person_poster: Option<String>,
    pub person_url: Option<String>,
}

impl EntityRow for PersonRow {
    const LABEL: NodeLabel = NodeLabel::Person;

    fn display_name(&self) -> String {
        or_key(&self.name, &self.person_tmdbId, "person")
    }

    fn into_properties(self) -> Result<Properties, CoerceError> {
        let id = required_int("person_tmdbId", self.person_tmdbId.as_deref())?;

        Ok(Properties::new()
            .with("person_tmdbId", id)
            .with("name", text(self.name.as_deref()))
            .with_opt("born", optional_date("born", self.born.as_deref()))
            .with("bornIn", text(self.bornIn.as_deref()))
            .with_opt("died", optional_date("died", self.died.as_deref()))
            .with("bio", text(self.bio.as_deref()))
            .with("person_imdbId", text(self.person_imdbId.as_deref()))
            .with("person_poster", text(self.person_poster.as_deref()))
            .with("person_url", text(self.person_url.as_deref())))
    }
}

// ============================================================================
// Movies
// ============================================================================

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
pub struct MovieRow {
    pub movieId: Option<String>,
    pub title: Option<String>,
    pub budget: Option<String>,
    pub countries: Option<String>,
    pub movie_imdbId: Option<String>,
    pub imdbRating: Option<String>,
    pub imdbVotes: Option<String>,
    pub languages: Option<String>,
    pub plot: Option<String>,
    pub movie_poster: Option<String>,
    pub released: Option<String>,
    pub revenue: Option<String>,
    pub runtime: Option<String>,
    pub movie_tmdbId: Option<String>,
    pub movie_url: Option<String>,
    pub year: Option<String>,
    pub genres: Option<String>,
}

impl EntityRow for MovieRow {
    const LABEL: NodeLabel = NodeLabel::Movie;

    fn display_name(&self) -> String {
        or_key(&self.title, &self.movieId, "movie")
    }

    fn into_properties(self) -> Result<Properties, CoerceError> {
        let id = required_int("movieId", self.movieId.as_deref())?;

        Ok(Properties::new()
            .with("movieId", id)
            .with("title", text(self.title.as_deref()))
            .with("budget", float_or_zero("budget", self.budget.as_deref())?)
            .with("countries", text_list(self.countries.as_deref()))
            .with("movie_imdbId", text(self.movie_imdbId.as_deref()))
            .with("imdbRating", float_or_zero("imdbRating", self.imdbRating.as_deref())?)
            .with("imdbVotes", int_or_zero("imdbVotes", self.imdbVotes.as_deref())?)
            .with("languages", text_list(self.languages.as_deref()))
            .with("plot", text(self.plot.as_deref()))
            .with("movie_poster", text(self.movie_poster.as_deref()))
            .with_opt("released", optional_date("released", self.released.as_deref()))
            .with("revenue", float_or_zero("revenue", self.revenue.as_deref())?)
            .with("runtime", int_or_zero("runtime", self.runtime.as_deref())?)
            .with_opt("movie_tmdbId", optional_int("movie_tmdbId", self.movie_tmdbId.as_deref())?)
            .with("movie_url", text(self.movie_url.as_deref()))
            .with("year", int_or_zero("year", self.year.as_deref())?)
            .with("genres", text_list(self.genres.as_deref())))
    }
}

// ============================================================================
// Relationships
// ============================================================================

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
pub struct ActedInRow {
    pub movieId: Option<String>,
    pub person_tmdbId: Option<String>,
    pub role: Option<String>,
}

impl RelationshipRow for ActedInRow {
    const REL: RelType = RelType::ActedIn;

    fn into_edge(self) -> Result<EdgeSpec, CoerceError> {
        Ok(EdgeSpec {
            rel: Self::REL,
            source: NodeKey::person(required_int("person_tmdbId", self.person_tmdbId.as_deref())?),
            target: NodeKey::movie(required_int("movieId", self.movieId.as_deref())?),
            properties: Properties::new().with("role", text(self.role.as_deref())),
        })
    }
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
pub struct DirectedRow {
    pub movieId: Option<String>,
    pub person_tmdbId: Option<String>,
}

impl RelationshipRow for DirectedRow {
    const REL: RelType = RelType::Directed;

    fn into_edge(self) -> Result<EdgeSpec, CoerceError> {
        Ok(EdgeSpec {
            rel: Self::REL,
            source: NodeKey::person(required_int("person_tmdbId", self.person_tmdbId.as_deref())?),
            target: NodeKey::movie(required_int("movieId", self.movieId.as_deref())?),
            properties: Properties::new(),
        })
    }
}

// ============================================================================
// Ratings
// ============================================================================

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
pub struct RatingRow {
    pub movieId: Option<String>,
    pub rating: Option<String>,
    pub ratingCount: Option<String>,
}

impl RatingRow {
    pub fn display_name(&self) -> String {
        format!("movie {}", text(self.movieId.as_deref()))
    }

    /// Target movie plus the aggregate fields to set on it
    pub fn into_update(self) -> Result<(NodeKey, Properties), CoerceError> {
        let id = required_int("movieId", self.movieId.as_deref())?;
        let properties = Properties::new()
            .with("avgRating", float_or_zero("rating", self.rating.as_deref())?)
            .with("ratingCount", int_or_zero("ratingCount", self.ratingCount.as_deref())?);
        Ok((NodeKey::movie(id), properties))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PropertyValue;

    fn rows<T: DeserializeOwned>(csv: &str) -> Vec<T> {
        read_rows(csv.as_bytes()).collect::<Result<Vec<T>, _>>().unwrap()
    }

    #[test]
    fn test_person_missing_dates_have_no_value() {
        let mut people: Vec<PersonRow> = rows(
            "person_tmdbId,name,born,bornIn,died,bio\n\
             31,Tom Hanks,1956-07-09,\"Concord, California, USA\",,Actor\n",
        );
        let props = people.remove(0).into_properties().unwrap();

        assert_eq!(props.get("person_tmdbId"), Some(&PropertyValue::Int(31)));
        assert_eq!(props.get("bornIn"), Some(&PropertyValue::Text("Concord, California, USA".into())));
        assert!(matches!(props.get("born"), Some(PropertyValue::Date(_))));
        assert!(props.get("died").is_none());
        // Absent columns default to empty text
        assert_eq!(props.get("person_url"), Some(&PropertyValue::Text(String::new())));
    }

    #[test]
    fn test_movie_missing_numbers_default_to_zero() {
        let mut movies: Vec<MovieRow> = rows("movieId,title,genres\n10,Heat,Action|Crime\n");
        let props = movies.remove(0).into_properties().unwrap();

        assert_eq!(props.get("budget"), Some(&PropertyValue::Float(0.0)));
        assert_eq!(props.get("imdbRating"), Some(&PropertyValue::Float(0.0)));
        assert_eq!(props.get("imdbVotes"), Some(&PropertyValue::Int(0)));
        assert_eq!(props.get("runtime"), Some(&PropertyValue::Int(0)));
        assert_eq!(props.get("year"), Some(&PropertyValue::Int(0)));
        assert!(props.get("released").is_none());
        assert!(props.get("movie_tmdbId").is_none());
        assert_eq!(
            props.get("genres"),
            Some(&PropertyValue::TextList(vec!["Action".into(), "Crime".into()]))
        );
    }

    #[test]
    fn test_movie_without_key_is_rejected() {
        let mut movies: Vec<MovieRow> = rows("movieId,title\n,Untitled\n");
        let row = movies.remove(0);
        assert_eq!(row.display_name(), "Untitled");
        assert_eq!(row.into_properties(), Err(CoerceError::MissingField("movieId")));
    }

    #[test]
    fn test_display_name_falls_back_to_key() {
        let mut people: Vec<PersonRow> = rows("person_tmdbId,name\n77,\n");
        assert_eq!(people.remove(0).display_name(), "person 77");
    }

    #[test]
    fn test_acted_in_edge() {
        let mut acted: Vec<ActedInRow> = rows("movieId,person_tmdbId,role\n10,1,Neil McCauley\n");
        let edge = acted.remove(0).into_edge().unwrap();

        assert_eq!(edge.rel, RelType::ActedIn);
        assert_eq!(edge.source, NodeKey::person(1));
        assert_eq!(edge.target, NodeKey::movie(10));
        assert_eq!(edge.properties.get("role"), Some(&PropertyValue::Text("Neil McCauley".into())));
    }

    #[test]
    fn test_directed_edge_requires_both_keys() {
        let mut directed: Vec<DirectedRow> = rows("movieId,person_tmdbId\n10,\n");
        assert_eq!(
            directed.remove(0).into_edge(),
            Err(CoerceError::MissingField("person_tmdbId"))
        );
    }

    #[test]
    fn test_rating_update_defaults() {
        let mut ratings: Vec<RatingRow> = rows("movieId,rating,ratingCount\n10,7.5,120\n11,,\n");
        let (key, props) = ratings.remove(0).into_update().unwrap();
        assert_eq!(key, NodeKey::movie(10));
        assert_eq!(props.get("avgRating"), Some(&PropertyValue::Float(7.5)));
        assert_eq!(props.get("ratingCount"), Some(&PropertyValue::Int(120)));

        let (_, props) = ratings.remove(0).into_update().unwrap();
        assert_eq!(props.get("avgRating"), Some(&PropertyValue::Float(0.0)));
        assert_eq!(props.get("ratingCount"), Some(&PropertyValue::Int(0)));
    }

    #[test]
    fn test_ragged_row_is_a_row_error() {
        let results: Vec<Result<DirectedRow, _>> =
            read_rows("movieId,person_tmdbId\n10,1\n10,1,extra\n".as_bytes()).collect();
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_utf8_bom_header_is_stripped() {
        let mut directed: Vec<DirectedRow> = rows("\u{feff}movieId,person_tmdbId\n10,1\n");
        assert_eq!(directed.remove(0).into_edge().unwrap().target, NodeKey::movie(10));
    }
}
