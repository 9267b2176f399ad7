//! HTTP handlers for the Books module.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use bookshelf_http::AppError;

use super::models::{Book, BookPatch, CreateBook, NewBook, UpdateBook, ValidationError};
use super::store::{BookStore, StoreError};

pub type SharedStore = Arc<dyn BookStore>;

/// Routes for `/books` and `/books/{id}`
pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/books", get(list_books).post(create_book))
        .route(
            "/books/{id}",
            get(get_book).put(update_book).delete(delete_book),
        )
        .with_state(store)
}

async fn list_books(State(store): State<SharedStore>) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(store.list().await?))
}

async fn get_book(
    State(store): State<SharedStore>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Book>, AppError> {
    let Path(id) = id?;
    store.get(id).await?.map(Json).ok_or_else(AppError::not_found)
}

async fn create_book(
    State(store): State<SharedStore>,
    payload: Result<Json<CreateBook>, JsonRejection>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let Json(payload) = payload?;
    let new_book = NewBook::try_from(payload)?;

    let book = store.create(new_book).await?;
    tracing::info!(book_id = book.id, "book created");

    Ok((StatusCode::CREATED, Json(book)))
}

async fn update_book(
    State(store): State<SharedStore>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateBook>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let patch = BookPatch::try_from(payload)?;

    match store.update(id, patch).await? {
        Some(book) => {
            tracing::info!(book_id = book.id, "book updated");
            Ok(Json(json!({ "message": "Book updated" })))
        }
        None => Err(AppError::not_found()),
    }
}

async fn delete_book(
    State(store): State<SharedStore>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(id) = id?;

    match store.delete(id).await? {
        Some(book) => {
            tracing::info!(book_id = book.id, title = %book.title, "book deleted");
            Ok(Json(json!({ "message": "Book deleted" })))
        }
        None => Err(AppError::not_found()),
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        let details = err.fields.iter().map(|field| json!(field)).collect();
        AppError::validation(details, err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal(err.into())
    }
}
