use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// A persisted book record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    /// Store-assigned identifier, never reused
    pub id: i64,
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub rating: Option<i64>,
    pub note: Option<String>,
}

/// Validated field set for inserting a book.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub rating: Option<i64>,
    pub note: Option<String>,
}

/// Request payload for `POST /books`. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBook {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    #[serde(default, deserialize_with = "rating")]
    pub rating: Option<i64>,
    pub note: Option<String>,
}

/// Request payload for `PUT /books/{id}`.
///
/// The outer `Option` records whether the key was present at all; the inner
/// one whether it was `null`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBook {
    #[serde(default, deserialize_with = "present")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub author: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub genre: Option<Option<String>>,
    #[serde(default, deserialize_with = "present_rating")]
    pub rating: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present")]
    pub note: Option<Option<String>>,
}

/// Validated partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<Option<String>>,
    pub rating: Option<Option<i64>>,
    pub note: Option<Option<String>>,
}

impl BookPatch {
    pub fn is_empty(&self) -> bool {
        self == &BookPatch::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}: {}", .fields.join(", "))]
pub struct ValidationError {
    pub reason: &'static str,
    pub fields: Vec<&'static str>,
}

impl TryFrom<CreateBook> for NewBook {
    type Error = ValidationError;

    fn try_from(payload: CreateBook) -> Result<Self, Self::Error> {
        let (title, author) = match (payload.title, payload.author) {
            (Some(title), Some(author)) => (title, author),
            (title, author) => {
                let fields = [("title", title.is_none()), ("author", author.is_none())]
                    .into_iter()
                    .filter_map(|(name, missing)| missing.then_some(name))
                    .collect();
                return Err(ValidationError {
                    reason: "missing required fields",
                    fields,
                });
            }
        };

        Ok(NewBook {
            title,
            author,
            genre: payload.genre,
            rating: payload.rating,
            note: payload.note,
        })
    }
}

impl TryFrom<UpdateBook> for BookPatch {
    type Error = ValidationError;

    fn try_from(payload: UpdateBook) -> Result<Self, Self::Error> {
        let nulled: Vec<_> = [
            ("title", matches!(payload.title, Some(None))),
            ("author", matches!(payload.author, Some(None))),
        ]
        .into_iter()
        .filter_map(|(name, is_null)| is_null.then_some(name))
        .collect();

        if !nulled.is_empty() {
            return Err(ValidationError {
                reason: "fields cannot be null",
                fields: nulled,
            });
        }

        Ok(BookPatch {
            title: payload.title.flatten(),
            author: payload.author.flatten(),
            genre: payload.genre,
            rating: payload.rating,
            note: payload.note,
        })
    }
}

fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn present_rating<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    rating(deserializer).map(Some)
}

/// Ratings arrive as integers from API clients and as strings from HTML
/// forms; a blank string means no rating.
fn rating<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawRating {
        Number(i64),
        Text(String),
    }

    match Option::<RawRating>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawRating::Number(value)) => Ok(Some(value)),
        Some(RawRating::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(RawRating::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid rating '{}'", text))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create(value: serde_json::Value) -> Result<NewBook, ValidationError> {
        serde_json::from_value::<CreateBook>(value).unwrap().try_into()
    }

    fn patch(value: serde_json::Value) -> Result<BookPatch, ValidationError> {
        serde_json::from_value::<UpdateBook>(value).unwrap().try_into()
    }

    #[test]
    fn create_requires_title_and_author() {
        let err = create(json!({ "genre": "sf" })).unwrap_err();
        assert_eq!(err.fields, ["title", "author"]);
        assert_eq!(err.to_string(), "missing required fields: title, author");

        let err = create(json!({ "title": "Dune", "author": null })).unwrap_err();
        assert_eq!(err.fields, ["author"]);
    }

    #[test]
    fn create_ignores_unknown_fields() {
        let book = create(json!({
            "title": "Dune",
            "author": "Herbert",
            "id": 99,
            "isbn": "978-0441013593"
        }))
        .unwrap();

        assert_eq!(
            book,
            NewBook {
                title: "Dune".to_string(),
                author: "Herbert".to_string(),
                ..NewBook::default()
            }
        );
    }

    #[test]
    fn rating_accepts_numbers_and_form_strings() {
        let rated = |rating: serde_json::Value| {
            create(json!({ "title": "a", "author": "b", "rating": rating }))
                .unwrap()
                .rating
        };

        assert_eq!(rated(json!(5)), Some(5));
        assert_eq!(rated(json!(" 3 ")), Some(3));
        assert_eq!(rated(json!("")), None);
        assert_eq!(rated(json!(null)), None);
    }

    #[test]
    fn rating_rejects_non_numeric_text() {
        let result = serde_json::from_value::<CreateBook>(json!({ "rating": "great" }));
        assert!(result.is_err());
        let result = serde_json::from_value::<CreateBook>(json!({ "rating": 4.5 }));
        assert!(result.is_err());
    }

    #[test]
    fn patch_distinguishes_absent_from_null() {
        let update = patch(json!({ "note": "x", "genre": null })).unwrap();
        assert_eq!(update.note, Some(Some("x".to_string())));
        assert_eq!(update.genre, Some(None));
        assert_eq!(update.rating, None);
        assert_eq!(update.title, None);
    }

    #[test]
    fn patch_rejects_null_required_fields() {
        let err = patch(json!({ "title": null, "note": "x" })).unwrap_err();
        assert_eq!(err.fields, ["title"]);
    }

    #[test]
    fn null_clears_optional_fields_only() {
        let update = patch(json!({ "rating": null, "note": "" })).unwrap();
        assert_eq!(update.rating, Some(None));
        assert_eq!(update.note, Some(Some(String::new())));
        assert_eq!(update.genre, None);
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(patch(json!({ "unknown": 1 })).unwrap().is_empty());
        assert!(!patch(json!({ "rating": 2 })).unwrap().is_empty());
    }
}
