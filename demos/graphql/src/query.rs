use juniper::{FieldError, FieldResult, graphql_object};

use crate::schema::{Book, LibraryContext, library};

pub(crate) struct QueryRoot;

#[graphql_object(context = LibraryContext)]
impl QueryRoot {
    fn books(context: &LibraryContext) -> FieldResult<Vec<Book>> {
        Ok(library(context)?.all())
    }

    fn book(context: &LibraryContext, id: i32) -> FieldResult<Book> {
        library(context)?
            .get(id)
            .ok_or_else(|| FieldError::from(format!("no book with id {id}")))
    }

    /// Name sent in the `x-reader` header.
    fn reader(context: &LibraryContext) -> Option<String> {
        context.reader.clone()
    }
}
