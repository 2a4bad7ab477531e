//! Provides a GraphQL handler for the Salvo web framework.
//!
//! The handler reads `query`, `variables`, `operationName` and `raw` from the
//! query string or the request body, runs the query with [`juniper`] and writes
//! the result as JSON. Browsers asking for HTML can get GraphiQL instead, an
//! in-browser IDE pre-populated with the query and its result.
//!
//! # Features
//!
//! - Parameters from the query string, JSON, form and `application/graphql` bodies
//! - Query string parameters take precedence over body fields
//! - Optional GraphiQL explorer, disabled with `raw=true`
//! - Context from a fixed value, the request, the depot or `Default`
//!
//! # Example:
//!
//! ```no_run
//! use juniper::{EmptyMutation, EmptySubscription, RootNode, graphql_object};
//! use salvo_core::prelude::*;
//! use salvo_graphql::GraphQL;
//!
//! struct Query;
//!
//! #[graphql_object]
//! impl Query {
//!     fn hello() -> &'static str {
//!         "world"
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let schema = RootNode::new(Query, EmptyMutation::<()>::new(), EmptySubscription::<()>::new());
//!     let graphql = GraphQL::new(schema).graphiql(true);
//!
//!     let acceptor = TcpListener::new("0.0.0.0:5800").bind().await;
//!     Server::new(acceptor)
//!         .serve(graphql.into_router("graphql"))
//!         .await;
//! }
//! ```
#![doc(html_favicon_url = "https://salvo.rs/favicon-32x32.png")]
#![doc(html_logo_url = "https://salvo.rs/images/logo.svg")]
#![cfg_attr(docsrs, feature(doc_cfg))]

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use indexmap::IndexMap;
use juniper::{DefaultScalarValue, ExecutionError, GraphQLType, GraphQLTypeAsync, RootNode};
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use salvo_core::http::header::ACCEPT;
use salvo_core::http::{Mime, ParseError, Request, Response, StatusError, mime};
use salvo_core::writing::{Json, Scribe, Text};
use salvo_core::{Depot, FlowCtrl, Handler, Router, async_trait};

mod context;
pub use context::{
    ContextFn, ContextProvider, DefaultContext, FixedContext, FromRequest, RequestContext,
};

pub mod graphiql;

mod resolver;
pub use resolver::{RequestContent, ResolvedQuery};

mod value;
pub use value::GenericValue;

/// Errors raised while answering a GraphQL request.
///
/// Validation and resolver failures are not errors here, they are reported in
/// [`ExecutionResult::errors`]. Anything else the engine rejects, such as a
/// query that does not parse, is returned as [`GraphQLError::Engine`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GraphQLError {
    /// No query in the query string nor in the body.
    #[error("Must provide query string.")]
    MissingQuery,
    /// The JSON body does not parse.
    #[error("POST body sent invalid JSON.")]
    InvalidBody(#[source] serde_json::Error),
    /// The body could not be read.
    #[error("Failed to read request body.")]
    ReadBody(#[source] ParseError),
    /// The engine refused the request before executing it.
    #[error("{0}")]
    Engine(juniper::GraphQLError),
    /// The engine output could not be serialized.
    #[error("Failed to serialize execution result.")]
    Serialize(#[from] serde_json::Error),
}

impl GraphQLError {
    /// Returns the [`StatusError`] this error is reported as.
    #[must_use]
    pub fn status_error(&self) -> StatusError {
        match self {
            Self::MissingQuery | Self::InvalidBody(_) | Self::ReadBody(_) | Self::Engine(_) => {
                StatusError::bad_request().brief(self.to_string())
            }
            Self::Serialize(_) => StatusError::internal_server_error().brief(self.to_string()),
        }
    }
}

impl Scribe for GraphQLError {
    #[inline]
    fn render(self, res: &mut Response) {
        res.render(self.status_error());
    }
}

/// Output of one execution, shaped like a GraphQL response.
///
/// Serializes to `{"data": ...}`, `{"errors": [...]}` or both.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ExecutionResult {
    /// Result data, `None` when execution did not start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<GenericValue>,
    /// Errors reported by the engine.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GenericValue>,
}

impl ExecutionResult {
    /// Converts the output of [`juniper::execute`].
    ///
    /// Validation errors become the `errors` list without `data`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphQLError::Engine`] for every other engine error and
    /// [`GraphQLError::Serialize`] if the engine's errors cannot be serialized.
    pub fn from_engine(
        result: Result<
            (juniper::Value<DefaultScalarValue>, Vec<ExecutionError<DefaultScalarValue>>),
            juniper::GraphQLError,
        >,
    ) -> Result<Self, GraphQLError> {
        match result {
            Ok((data, errors)) => Ok(Self {
                data: Some(GenericValue::from(&data)),
                errors: error_values(&errors)?,
            }),
            Err(e @ juniper::GraphQLError::ValidationError(_)) => {
                tracing::debug!(error = ?e, "graphql query failed validation");
                Ok(Self {
                    data: None,
                    errors: error_values(&e)?,
                })
            }
            Err(e) => Err(GraphQLError::Engine(e)),
        }
    }
}

impl Scribe for ExecutionResult {
    #[inline]
    fn render(self, res: &mut Response) {
        res.render(Json(self));
    }
}

fn error_values<E: Serialize>(errors: &E) -> Result<Vec<GenericValue>, serde_json::Error> {
    Ok(match serde_json::to_value(errors)? {
        JsonValue::Array(items) => items.into_iter().map(GenericValue::from).collect(),
        JsonValue::Null => Vec::new(),
        other => vec![GenericValue::from(other)],
    })
}

/// Returns `true` if a media range of the request's `Accept` header matches
/// `text/html`.
///
/// `text/html`, `text/*` and `*/*` match unless their quality is `q=0`.
#[must_use]
pub fn accepts_html(req: &Request) -> bool {
    req.headers()
        .get_all(ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|part| part.trim().parse::<Mime>().ok())
        .any(|range| {
            (range.type_() == mime::TEXT || range.type_() == mime::STAR)
                && (range.subtype() == mime::HTML || range.subtype() == mime::STAR)
                && quality(&range) > 0.0
        })
}

fn quality(range: &Mime) -> f32 {
    range
        .get_param("q")
        .and_then(|q| q.as_str().parse::<f32>().ok())
        .unwrap_or(1.0)
}

/// Decides whether a request is answered with GraphiQL.
///
/// True only when GraphiQL is enabled, the client did not ask for `raw`
/// output and the client accepts HTML.
#[inline]
#[must_use]
pub fn show_graphiql(enabled: bool, raw: Option<bool>, accepts_html: bool) -> bool {
    enabled && !raw.unwrap_or(false) && accepts_html
}

enum Rendered {
    Json(ExecutionResult),
    Html(String),
}

/// GraphQL handler for Salvo.
///
/// `GraphQL` executes queries against a juniper [`RootNode`]. The root value
/// of the schema is the query object stored in the root node; the context
/// passed to resolvers comes from the configured [`ContextProvider`].
///
/// # Type Parameters
///
/// * `Query`, `Mutation`, `Subscription` - The root types of the schema.
/// * `CtxT` - The context type shared by the root types.
pub struct GraphQL<Query, Mutation, Subscription, CtxT>
where
    Query: GraphQLType<DefaultScalarValue>,
    Mutation: GraphQLType<DefaultScalarValue>,
    Subscription: GraphQLType<DefaultScalarValue>,
{
    schema: Arc<RootNode<'static, Query, Mutation, Subscription>>,
    graphiql: bool,
    context: Arc<dyn ContextProvider<CtxT>>,
}

impl<Query, Mutation, Subscription, CtxT> Clone for GraphQL<Query, Mutation, Subscription, CtxT>
where
    Query: GraphQLType<DefaultScalarValue>,
    Mutation: GraphQLType<DefaultScalarValue>,
    Subscription: GraphQLType<DefaultScalarValue>,
{
    fn clone(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            graphiql: self.graphiql,
            context: self.context.clone(),
        }
    }
}

impl<Query, Mutation, Subscription, CtxT> Debug for GraphQL<Query, Mutation, Subscription, CtxT>
where
    Query: GraphQLType<DefaultScalarValue>,
    Mutation: GraphQLType<DefaultScalarValue>,
    Subscription: GraphQLType<DefaultScalarValue>,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphQL")
            .field("graphiql", &self.graphiql)
            .finish_non_exhaustive()
    }
}

impl<Query, Mutation, Subscription, CtxT> GraphQL<Query, Mutation, Subscription, CtxT>
where
    Query: GraphQLType<DefaultScalarValue>,
    Mutation: GraphQLType<DefaultScalarValue>,
    Subscription: GraphQLType<DefaultScalarValue>,
    CtxT: Send + Sync + 'static,
{
    /// Create new `GraphQL` for a schema that needs no context.
    ///
    /// Every request gets a fresh `CtxT::default()`, usually `()`.
    #[inline]
    pub fn new(schema: impl Into<Arc<RootNode<'static, Query, Mutation, Subscription>>>) -> Self
    where
        CtxT: Default,
    {
        Self::with_context_provider(schema, DefaultContext)
    }

    /// Create new `GraphQL` sharing one context value between all requests.
    #[inline]
    pub fn with_context(
        schema: impl Into<Arc<RootNode<'static, Query, Mutation, Subscription>>>,
        context: CtxT,
    ) -> Self {
        Self::with_context_provider(schema, FixedContext::new(context))
    }

    /// Create new `GraphQL` whose context is built from each request, for
    /// example [`RequestContext`].
    #[inline]
    pub fn with_request_context(
        schema: impl Into<Arc<RootNode<'static, Query, Mutation, Subscription>>>,
    ) -> Self
    where
        CtxT: for<'a> From<&'a Request>,
    {
        Self::with_context_provider(schema, FromRequest)
    }

    /// Create new `GraphQL` with a custom [`ContextProvider`].
    pub fn with_context_provider(
        schema: impl Into<Arc<RootNode<'static, Query, Mutation, Subscription>>>,
        provider: impl ContextProvider<CtxT>,
    ) -> Self {
        Self {
            schema: schema.into(),
            graphiql: false,
            context: Arc::new(provider),
        }
    }

    /// Sets whether browsers asking for HTML get GraphiQL. Disabled by default.
    #[inline]
    #[must_use]
    pub fn graphiql(mut self, enabled: bool) -> Self {
        self.graphiql = enabled;
        self
    }

    /// Replaces the context with one value shared by all requests.
    #[inline]
    #[must_use]
    pub fn context(self, context: CtxT) -> Self {
        self.context_provider(FixedContext::new(context))
    }

    /// Replaces the context provider.
    #[inline]
    #[must_use]
    pub fn context_provider(mut self, provider: impl ContextProvider<CtxT>) -> Self {
        self.context = Arc::new(provider);
        self
    }

    /// Builds the context of each request with `f`.
    #[inline]
    #[must_use]
    pub fn context_fn<F>(self, f: F) -> Self
    where
        F: Fn(&Request, &Depot) -> CtxT + Send + Sync + 'static,
    {
        self.context_provider(ContextFn::new(f))
    }

    /// Whether GraphiQL is enabled.
    #[inline]
    #[must_use]
    pub fn graphiql_enabled(&self) -> bool {
        self.graphiql
    }

    /// The schema queries run against.
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &RootNode<'static, Query, Mutation, Subscription> {
        &self.schema
    }
}

impl<Query, Mutation, Subscription, CtxT> GraphQL<Query, Mutation, Subscription, CtxT>
where
    Query: GraphQLTypeAsync<DefaultScalarValue, Context = CtxT> + Send + Sync + 'static,
    Query::TypeInfo: Send + Sync,
    Mutation: GraphQLTypeAsync<DefaultScalarValue, Context = CtxT> + Send + Sync + 'static,
    Mutation::TypeInfo: Send + Sync,
    Subscription: GraphQLType<DefaultScalarValue, Context = CtxT> + Send + Sync + 'static,
    Subscription::TypeInfo: Send + Sync,
    CtxT: Send + Sync + 'static,
{
    /// Runs `query` with the given operation name, variables and context.
    ///
    /// # Errors
    ///
    /// Returns [`GraphQLError::Serialize`] if the engine output cannot be
    /// converted. Query failures are part of the returned result.
    pub async fn execute(
        &self,
        query: &str,
        operation_name: Option<&str>,
        variables: Option<&IndexMap<String, GenericValue>>,
        context: &CtxT,
    ) -> Result<ExecutionResult, GraphQLError> {
        let variables = variables.map(GenericValue::to_variables).unwrap_or_default();
        let result =
            juniper::execute(query, operation_name, &*self.schema, &variables, context).await;
        ExecutionResult::from_engine(result)
    }

    /// Consumes the [`GraphQL`] and returns a [`Router`] serving it for `GET`
    /// and `POST` on `path`.
    pub fn into_router(self, path: impl Into<String>) -> Router {
        Router::with_path(path.into()).get(self.clone()).post(self)
    }

    async fn run(
        &self,
        req: &Request,
        depot: &Depot,
        resolved: &ResolvedQuery,
        query: &str,
    ) -> Result<ExecutionResult, GraphQLError> {
        let context = self.context.provide(req, depot);
        self.execute(query, resolved.operation_name(), resolved.variables(), &context)
            .await
    }

    async fn respond(&self, req: &mut Request, depot: &Depot) -> Result<Rendered, GraphQLError> {
        let resolved = ResolvedQuery::from_request(req).await?;

        if show_graphiql(self.graphiql, resolved.raw(), accepts_html(req)) {
            let result = match resolved.query() {
                Some(query) => Some(self.run(req, depot, &resolved, query).await?),
                None => None,
            };
            let html = graphiql::render(
                resolved.query(),
                resolved.variables(),
                resolved.operation_name(),
                result.as_ref(),
            );
            Ok(Rendered::Html(html))
        } else {
            let query = resolved.query().ok_or(GraphQLError::MissingQuery)?;
            let result = self.run(req, depot, &resolved, query).await?;
            Ok(Rendered::Json(result))
        }
    }
}

#[async_trait]
impl<Query, Mutation, Subscription, CtxT> Handler for GraphQL<Query, Mutation, Subscription, CtxT>
where
    Query: GraphQLTypeAsync<DefaultScalarValue, Context = CtxT> + Send + Sync + 'static,
    Query::TypeInfo: Send + Sync,
    Mutation: GraphQLTypeAsync<DefaultScalarValue, Context = CtxT> + Send + Sync + 'static,
    Mutation::TypeInfo: Send + Sync,
    Subscription: GraphQLType<DefaultScalarValue, Context = CtxT> + Send + Sync + 'static,
    Subscription::TypeInfo: Send + Sync,
    CtxT: Send + Sync + 'static,
{
    async fn handle(
        &self,
        req: &mut Request,
        depot: &mut Depot,
        res: &mut Response,
        _ctrl: &mut FlowCtrl,
    ) {
        match self.respond(req, depot).await {
            Ok(Rendered::Json(result)) => res.render(result),
            Ok(Rendered::Html(html)) => res.render(Text::Html(html)),
            Err(e) => {
                tracing::info!(error = ?e, "graphql request failed");
                res.render(e);
            }
        }
    }
}
