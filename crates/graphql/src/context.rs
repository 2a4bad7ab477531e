//! Providers of the juniper context passed to resolvers.
//!
//! A provider is installed on the handler once and asked for a context each
//! time a query runs.
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use multimap::MultiMap;
use salvo_core::conn::SocketAddr;
use salvo_core::http::{HeaderMap, Method, Request, uri::Uri};
use salvo_core::Depot;

/// Supplies the juniper context for each executed request.
///
/// The provider is chosen once, when the [`GraphQL`](crate::GraphQL) handler is
/// built, and is then called for every request that runs a query.
///
/// The crate provides these implementations:
/// - [`FixedContext`]: one value shared by all requests.
/// - [`DefaultContext`]: a fresh `C::default()` per request, for schemas that
///   need no context (`()`).
/// - [`FromRequest`]: a context built from the request, such as [`RequestContext`].
/// - [`ContextFn`]: a closure, which may also read the [`Depot`].
pub trait ContextProvider<C>: Send + Sync + 'static {
    /// Returns the context for the current request.
    fn provide(&self, req: &Request, depot: &Depot) -> Arc<C>;
}

/// Shares one context value between all requests.
#[derive(Debug)]
pub struct FixedContext<C>(Arc<C>);

impl<C> FixedContext<C> {
    /// Creates a new `FixedContext`.
    pub fn new(context: C) -> Self {
        Self(Arc::new(context))
    }
}

impl<C> From<Arc<C>> for FixedContext<C> {
    fn from(context: Arc<C>) -> Self {
        Self(context)
    }
}

impl<C> ContextProvider<C> for FixedContext<C>
where
    C: Send + Sync + 'static,
{
    #[inline]
    fn provide(&self, _req: &Request, _depot: &Depot) -> Arc<C> {
        self.0.clone()
    }
}

/// Creates `C::default()` for every request.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultContext;

impl<C> ContextProvider<C> for DefaultContext
where
    C: Default + Send + Sync + 'static,
{
    #[inline]
    fn provide(&self, _req: &Request, _depot: &Depot) -> Arc<C> {
        Arc::new(C::default())
    }
}

/// Builds the context from the request itself.
///
/// Works with any context type that implements `From<&Request>`, such as
/// [`RequestContext`].
#[derive(Clone, Copy, Debug, Default)]
pub struct FromRequest;

impl<C> ContextProvider<C> for FromRequest
where
    C: for<'a> From<&'a Request> + Send + Sync + 'static,
{
    #[inline]
    fn provide(&self, req: &Request, _depot: &Depot) -> Arc<C> {
        Arc::new(C::from(req))
    }
}

/// Builds the context with a closure.
///
/// # Example
///
/// ```
/// use salvo_core::{Depot, Request};
/// use salvo_graphql::ContextFn;
///
/// struct Database;
/// struct Context {
///     db: Option<std::sync::Arc<Database>>,
/// }
///
/// let provider = ContextFn::new(|_req: &Request, depot: &Depot| Context {
///     db: depot.obtain::<std::sync::Arc<Database>>().ok().cloned(),
/// });
/// ```
pub struct ContextFn<F>(F);

impl<F> ContextFn<F> {
    /// Creates a new `ContextFn`.
    pub fn new<C>(f: F) -> Self
    where
        F: Fn(&Request, &Depot) -> C,
    {
        Self(f)
    }
}

impl<F> Debug for ContextFn<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextFn").finish()
    }
}

impl<C, F> ContextProvider<C> for ContextFn<F>
where
    C: Send + Sync + 'static,
    F: Fn(&Request, &Depot) -> C + Send + Sync + 'static,
{
    #[inline]
    fn provide(&self, req: &Request, depot: &Depot) -> Arc<C> {
        Arc::new((self.0)(req, depot))
    }
}

/// An owned snapshot of the request, usable as juniper context.
///
/// Resolvers get access to the method, URI, query parameters, headers and
/// peer address of the request that carried the query.
#[derive(Clone, Debug)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    queries: MultiMap<String, String>,
    headers: HeaderMap,
    remote_addr: SocketAddr,
}

impl RequestContext {
    /// Request method.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request URI.
    #[inline]
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Query string parameters.
    #[inline]
    #[must_use]
    pub fn queries(&self) -> &MultiMap<String, String> {
        &self.queries
    }

    /// Request headers.
    #[inline]
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the first value of header `name` if it is visible ASCII.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Peer address of the connection.
    #[inline]
    #[must_use]
    pub fn remote_addr(&self) -> &SocketAddr {
        &self.remote_addr
    }
}

impl From<&Request> for RequestContext {
    fn from(req: &Request) -> Self {
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            queries: req.queries().clone(),
            headers: req.headers().clone(),
            remote_addr: req.remote_addr().clone(),
        }
    }
}

impl juniper::Context for RequestContext {}

#[cfg(test)]
mod tests {
    use salvo_core::test::TestClient;

    use super::*;

    #[test]
    fn test_fixed_context_is_shared() {
        let provider = FixedContext::new(String::from("shared"));
        let req = Request::new();
        let depot = Depot::new();
        let first = provider.provide(&req, &depot);
        let second = provider.provide(&req, &depot);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, "shared");
    }

    #[test]
    fn test_default_context() {
        let context: Arc<u32> = DefaultContext.provide(&Request::new(), &Depot::new());
        assert_eq!(*context, 0);
    }

    #[test]
    fn test_request_context() {
        let req = TestClient::post("http://127.0.0.1:5800/graphql?raw=true")
            .add_header("user-agent", "salvo-test", true)
            .build();
        let context: Arc<RequestContext> = FromRequest.provide(&req, &Depot::new());
        assert_eq!(*context.method(), Method::POST);
        assert_eq!(context.uri().path(), "/graphql");
        assert_eq!(context.uri().query(), Some("raw=true"));
        assert_eq!(context.queries().get("raw").map(String::as_str), Some("true"));
        assert_eq!(context.header("user-agent"), Some("salvo-test"));
    }

    #[test]
    fn test_context_fn_reads_depot() {
        let provider = ContextFn::new(|_req: &Request, depot: &Depot| {
            depot.get::<String>("user").cloned().unwrap_or_default()
        });
        let mut depot = Depot::new();
        depot.insert("user", String::from("alice"));
        let context = provider.provide(&Request::new(), &depot);
        assert_eq!(*context, "alice");
    }
}
