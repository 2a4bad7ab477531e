use std::sync::{Arc, LazyLock};

use salvo::prelude::*;
use salvo_graphql::GraphQL;

use crate::schema::{Library, LibraryContext, create_schema};

mod mutation;
mod query;
mod schema;

static LIBRARY: LazyLock<Arc<Library>> = LazyLock::new(|| Arc::new(Library::with_books()));

#[handler]
async fn attach_library(depot: &mut Depot) {
    depot.inject(LIBRARY.clone());
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().init();

    let graphql = GraphQL::new(create_schema())
        .graphiql(true)
        .context_fn(|req, depot| LibraryContext {
            library: depot.obtain::<Arc<Library>>().ok().cloned(),
            reader: req.header::<String>("x-reader"),
        });

    let router = Router::new()
        .hoop(attach_library)
        .push(graphql.into_router("graphql"));

    let acceptor = TcpListener::new("0.0.0.0:5800").bind().await;
    tracing::info!("open http://127.0.0.1:5800/graphql in a browser for GraphiQL");
    Server::new(acceptor).serve(router).await;
}
