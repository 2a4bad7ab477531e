use std::collections::BTreeMap;
use std::sync::Arc;

use juniper::{EmptySubscription, FieldError, FieldResult, GraphQLInputObject, GraphQLObject, RootNode};
use parking_lot::RwLock;

use crate::mutation::MutationRoot;
use crate::query::QueryRoot;

pub(crate) type Schema =
    RootNode<'static, QueryRoot, MutationRoot, EmptySubscription<LibraryContext>>;

pub(crate) fn create_schema() -> Schema {
    Schema::new(QueryRoot, MutationRoot, EmptySubscription::new())
}

#[derive(GraphQLObject, Clone, Debug)]
/// A book on the shelf.
pub(crate) struct Book {
    pub(crate) id: i32,
    pub(crate) title: String,
    pub(crate) author: String,
}

#[derive(GraphQLInputObject, Debug)]
pub(crate) struct BookInput {
    pub(crate) title: String,
    pub(crate) author: String,
}

#[derive(Debug, Default)]
pub(crate) struct Library {
    books: RwLock<BTreeMap<i32, Book>>,
}

impl Library {
    pub(crate) fn with_books() -> Self {
        let library = Self::default();
        library.add("The Rust Programming Language", "Steve Klabnik");
        library.add("Programming Rust", "Jim Blandy");
        library
    }

    pub(crate) fn all(&self) -> Vec<Book> {
        self.books.read().values().cloned().collect()
    }

    pub(crate) fn get(&self, id: i32) -> Option<Book> {
        self.books.read().get(&id).cloned()
    }

    pub(crate) fn add(&self, title: impl Into<String>, author: impl Into<String>) -> Book {
        let mut books = self.books.write();
        let id = books.keys().next_back().map_or(1, |id| id + 1);
        let book = Book {
            id,
            title: title.into(),
            author: author.into(),
        };
        books.insert(id, book.clone());
        book
    }
}

/// Context handed to resolvers, built per request.
#[derive(Debug, Default)]
pub(crate) struct LibraryContext {
    pub(crate) library: Option<Arc<Library>>,
    pub(crate) reader: Option<String>,
}

impl juniper::Context for LibraryContext {}

pub(crate) fn library(context: &LibraryContext) -> FieldResult<&Library> {
    context
        .library
        .as_deref()
        .ok_or_else(|| FieldError::from("library is not available"))
}
