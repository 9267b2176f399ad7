//! Book persistence.
//!
//! [`BookStore`] is the only way handlers reach persisted records. Each
//! mutating call is a single statement; "not found" is reported as `None`,
//! never as an error.

use async_trait::async_trait;
use sqlx::{sqlite::SqlitePool, QueryBuilder, Sqlite};
use thiserror::Error;

use super::models::{Book, BookPatch, NewBook};

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("book store error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait BookStore: Send + Sync {
    /// Insert a book and return it with its generated id.
    async fn create(&self, book: NewBook) -> Result<Book>;

    /// All books, ascending by id.
    async fn list(&self) -> Result<Vec<Book>>;

    async fn get(&self, id: i64) -> Result<Option<Book>>;

    /// Apply `patch` to an existing book. `None` when no such id exists, in
    /// which case nothing is written.
    async fn update(&self, id: i64, patch: BookPatch) -> Result<Option<Book>>;

    /// Remove a book and return its last state.
    async fn delete(&self, id: i64) -> Result<Option<Book>>;
}

/// SQLite-backed book store
#[derive(Clone)]
pub struct SqliteBookStore {
    pool: SqlitePool,
}

impl SqliteBookStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookStore for SqliteBookStore {
    async fn create(&self, book: NewBook) -> Result<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, genre, rating, note)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, title, author, genre, rating, note
            "#,
        )
        .bind(book.title)
        .bind(book.author)
        .bind(book.genre)
        .bind(book.rating)
        .bind(book.note)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn list(&self) -> Result<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT id, title, author, genre, rating, note FROM books ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    async fn get(&self, id: i64) -> Result<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            "SELECT id, title, author, genre, rating, note FROM books WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    async fn update(&self, id: i64, patch: BookPatch) -> Result<Option<Book>> {
        if patch.is_empty() {
            return self.get(id).await;
        }

        // One statement: SQLite takes the write lock up front, so concurrent
        // updates queue on the busy timeout instead of failing.
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE books SET ");
        let mut columns = query.separated(", ");
        if let Some(title) = patch.title {
            columns.push("title = ").push_bind_unseparated(title);
        }
        if let Some(author) = patch.author {
            columns.push("author = ").push_bind_unseparated(author);
        }
        if let Some(genre) = patch.genre {
            columns.push("genre = ").push_bind_unseparated(genre);
        }
        if let Some(rating) = patch.rating {
            columns.push("rating = ").push_bind_unseparated(rating);
        }
        if let Some(note) = patch.note {
            columns.push("note = ").push_bind_unseparated(note);
        }
        query
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING id, title, author, genre, rating, note");

        let updated = query
            .build_query_as::<Book>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(updated)
    }

    async fn delete(&self, id: i64) -> Result<Option<Book>> {
        let deleted = sqlx::query_as::<_, Book>(
            r#"
            DELETE FROM books
            WHERE id = ?
            RETURNING id, title, author, genre, rating, note
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::migrations;
    use bookshelf_db::Database;

    async fn store() -> (SqliteBookStore, Database) {
        let db = Database::in_memory().await.unwrap();
        let migrations: Vec<_> = migrations()
            .into_iter()
            .map(|migration| ("books".to_string(), migration))
            .collect();
        db.run_migrations(&migrations).await.unwrap();
        (SqliteBookStore::new(db.pool().clone()), db)
    }

    fn new_book(title: &str, author: &str) -> NewBook {
        NewBook {
            title: title.to_string(),
            author: author.to_string(),
            ..NewBook::default()
        }
    }

    #[tokio::test]
    async fn create_assigns_fresh_ids() {
        let (store, _db) = store().await;

        let first = store.create(new_book("Dune", "Herbert")).await.unwrap();
        let second = store.create(new_book("Emma", "Austen")).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.title, "Dune");
        assert_eq!(first.author, "Herbert");
        assert_eq!(first.genre, None);
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let (store, _db) = store().await;

        let first = store.create(new_book("Dune", "Herbert")).await.unwrap();
        store.delete(first.id).await.unwrap();
        let second = store.create(new_book("Dune", "Herbert")).await.unwrap();

        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn list_is_ordered_by_id() {
        let (store, _db) = store().await;
        for title in ["c", "a", "b"] {
            store.create(new_book(title, "x")).await.unwrap();
        }

        let titles: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|book| book.title)
            .collect();
        assert_eq!(titles, ["c", "a", "b"]);
    }

    #[tokio::test]
    async fn update_changes_only_patched_fields() {
        let (store, _db) = store().await;
        let book = store
            .create(NewBook {
                genre: Some("sf".to_string()),
                rating: Some(4),
                ..new_book("Dune", "Herbert")
            })
            .await
            .unwrap();

        let patch = BookPatch {
            note: Some(Some("x".to_string())),
            ..BookPatch::default()
        };
        let updated = store.update(book.id, patch).await.unwrap().unwrap();

        assert_eq!(
            updated,
            Book {
                note: Some("x".to_string()),
                ..book.clone()
            }
        );
        assert_eq!(store.get(book.id).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn update_null_clears_optional_field() {
        let (store, _db) = store().await;
        let book = store
            .create(NewBook {
                genre: Some("sf".to_string()),
                rating: Some(4),
                ..new_book("Dune", "Herbert")
            })
            .await
            .unwrap();

        let patch = BookPatch {
            rating: Some(None),
            ..BookPatch::default()
        };
        let updated = store.update(book.id, patch).await.unwrap().unwrap();

        assert_eq!(updated.rating, None);
        assert_eq!(updated.genre, Some("sf".to_string()));
    }

    #[tokio::test]
    async fn empty_update_returns_current_book() {
        let (store, _db) = store().await;
        let book = store.create(new_book("Dune", "Herbert")).await.unwrap();

        let unchanged = store.update(book.id, BookPatch::default()).await;
        assert_eq!(unchanged.unwrap(), Some(book.clone()));
        assert_eq!(store.update(book.id + 1, BookPatch::default()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_missing_id_leaves_store_unchanged() {
        let (store, _db) = store().await;
        let book = store.create(new_book("Dune", "Herbert")).await.unwrap();

        let patch = BookPatch {
            title: Some("Nope".to_string()),
            ..BookPatch::default()
        };
        assert_eq!(store.update(book.id + 100, patch).await.unwrap(), None);
        assert_eq!(store.list().await.unwrap(), vec![book]);
    }

    #[tokio::test]
    async fn delete_twice_reports_not_found() {
        let (store, _db) = store().await;
        let book = store.create(new_book("Dune", "Herbert")).await.unwrap();

        assert_eq!(store.delete(book.id).await.unwrap(), Some(book.clone()));
        assert_eq!(store.delete(book.id).await.unwrap(), None);
        assert_eq!(store.get(book.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn closed_pool_surfaces_store_error() {
        let (store, db) = store().await;
        db.close().await;

        assert!(matches!(
            store.list().await,
            Err(StoreError::Database(_))
        ));
        assert!(store.create(new_book("Dune", "Herbert")).await.is_err());
    }
}
