use juniper::{FieldResult, graphql_object};

use crate::schema::{Book, BookInput, LibraryContext, library};

pub(crate) struct MutationRoot;

#[graphql_object(context = LibraryContext)]
impl MutationRoot {
    fn add_book(context: &LibraryContext, book: BookInput) -> FieldResult<Book> {
        let book = library(context)?.add(book.title, book.author);
        tracing::info!(id = book.id, "book added");
        Ok(book)
    }
}
