//! Request routing by method and path pattern.
//!
//! Patterns use `{name}` placeholders for whole path segments, e.g.
//! `/users/{id}/posts`. A route matches when both the [`Verb`] and the
//! pattern match; the query string is decomposed into [`PathComponents`]
//! alongside the captured parameters.

use std::collections::HashMap;
use std::fmt;

use brook_http::connection::ResponseWriter;
use brook_http::protocol::RequestHead;
use brook_http::protocol::body::BodyProcessing;
use http::Method;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

type InnerRouter<T> = matchit::Router<T>;

/// The methods a route can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
}

impl Verb {
    /// `None` for methods that can't be routed, like `CONNECT` or extensions.
    pub fn from_method(method: &Method) -> Option<Self> {
        let verb = match method.as_str() {
            "GET" => Self::Get,
            "PUT" => Self::Put,
            "POST" => Self::Post,
            "DELETE" => Self::Delete,
            "OPTIONS" => Self::Options,
            "HEAD" => Self::Head,
            "PATCH" => Self::Patch,
            _ => return None,
        };
        Some(verb)
    }
}

/// What a matched route captured from the request target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathComponents {
    parameters: HashMap<String, String>,
    queries: Vec<(String, String)>,
    raw_query: Option<String>,
}

impl PathComponents {
    pub fn new(parameters: HashMap<String, String>, raw_query: Option<&str>) -> Self {
        let queries = match raw_query {
            Some(raw) => serde_urlencoded::from_str(raw).unwrap_or_else(|e| {
                debug!(query = raw, cause = %e, "malformed query string ignored");
                Vec::new()
            }),
            None => Vec::new(),
        };
        Self { parameters, queries, raw_query: raw_query.map(str::to_owned) }
    }

    /// The value captured by the `{name}` placeholder.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    /// The first value of query item `name`, percent-decoded.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.queries.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn queries(&self) -> &[(String, String)] {
        &self.queries
    }

    /// Decodes the whole query string into `T`.
    pub fn deserialize_queries<T: DeserializeOwned>(&self) -> Result<T, serde_urlencoded::de::Error> {
        serde_urlencoded::from_str(self.raw_query.as_deref().unwrap_or_default())
    }
}

/// An application reachable through the [`Router`].
pub trait RouteHandler: Send + Sync {
    fn serve(&self, req: RequestHead, path: PathComponents, res: ResponseWriter) -> BodyProcessing;
}

#[derive(Debug)]
pub struct RouteFn<F> {
    f: F,
}

impl<F> RouteHandler for RouteFn<F>
where
    F: Fn(RequestHead, PathComponents, ResponseWriter) -> BodyProcessing + Send + Sync,
{
    fn serve(&self, req: RequestHead, path: PathComponents, res: ResponseWriter) -> BodyProcessing {
        (self.f)(req, path, res)
    }
}

/// Turns a closure into a [`RouteHandler`].
pub fn route_fn<F>(f: F) -> RouteFn<F>
where
    F: Fn(RequestHead, PathComponents, ResponseWriter) -> BodyProcessing + Send + Sync,
{
    RouteFn { f }
}

pub struct Router {
    routes: HashMap<Verb, InnerRouter<Box<dyn RouteHandler>>>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Finds the handler for `req`, if any route matches its method and path.
    pub fn route(&self, req: &RequestHead) -> Option<(PathComponents, &dyn RouteHandler)> {
        let verb = Verb::from_method(req.method())?;
        let matched = self
            .routes
            .get(&verb)?
            .at(req.path())
            .map_err(|e| debug!(path = req.path(), cause = %e, "no route"))
            .ok()?;

        let parameters = matched.params.iter().map(|(name, value)| (name.to_owned(), value.to_owned())).collect();
        Some((PathComponents::new(parameters, req.query()), matched.value.as_ref()))
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("verbs", &self.routes.keys().collect::<Vec<_>>()).finish()
    }
}

#[derive(Default)]
pub struct RouterBuilder {
    routes: Vec<(Verb, String, Box<dyn RouteHandler>)>,
}

impl RouterBuilder {
    fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, verb: Verb, path: impl Into<String>, handler: impl RouteHandler + 'static) -> Self {
        self.routes.push((verb, path.into(), Box::new(handler)));
        self
    }

    pub fn build(self) -> Result<Router, RouterError> {
        let mut routes: HashMap<Verb, InnerRouter<Box<dyn RouteHandler>>> = HashMap::new();
        for (verb, path, handler) in self.routes {
            routes
                .entry(verb)
                .or_insert_with(InnerRouter::new)
                .insert(path.as_str(), handler)
                .map_err(|source| RouterError::Insert { verb, path, source })?;
        }
        Ok(Router { routes })
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routes = self.routes.iter().map(|(verb, path, _)| (verb, path)).collect::<Vec<_>>();
        f.debug_struct("RouterBuilder").field("routes", &routes).finish()
    }
}

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("can't add route {verb:?} {path}: {source}")]
    Insert { verb: Verb, path: String, source: matchit::InsertError },
}

#[cfg(test)]
mod tests {
    use super::*;
    use brook_http::protocol::{Headers, HttpVersion};
    use serde::Deserialize;

    fn noop() -> impl RouteHandler {
        route_fn(|_req, _path, _res| BodyProcessing::DiscardBody)
    }

    fn router() -> Router {
        Router::builder()
            .route(Verb::Get, "/", noop())
            .route(Verb::Post, "/echo", noop())
            .route(Verb::Get, "/users/{id}/posts/{post}", noop())
            .build()
            .unwrap()
    }

    fn request(method: Method, target: &str) -> RequestHead {
        RequestHead::new(method, target, HttpVersion::HTTP_11, Headers::default())
    }

    #[test]
    fn matches_method_and_path() {
        let router = router();
        assert!(router.route(&request(Method::GET, "/")).is_some());
        assert!(router.route(&request(Method::POST, "/echo")).is_some());
        assert!(router.route(&request(Method::GET, "/echo")).is_none());
        assert!(router.route(&request(Method::GET, "/missing")).is_none());
    }

    #[test]
    fn unsupported_method_never_matches() {
        let router = router();
        assert!(router.route(&request(Method::CONNECT, "/")).is_none());
        assert_eq!(Verb::from_method(&Method::TRACE), None);
    }

    #[test]
    fn captures_parameters_and_queries() {
        let router = router();
        let (path, _handler) = router.route(&request(Method::GET, "/users/42/posts/7?sort=desc&tag=a%20b")).unwrap();

        assert_eq!(path.parameter("id"), Some("42"));
        assert_eq!(path.parameter("post"), Some("7"));
        assert_eq!(path.parameter("missing"), None);
        assert_eq!(path.query("sort"), Some("desc"));
        assert_eq!(path.query("tag"), Some("a b"));
        assert_eq!(path.queries().len(), 2);
    }

    #[test]
    fn queries_deserialize_into_struct() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Paging {
            page: u32,
            size: Option<u32>,
        }

        let path = PathComponents::new(HashMap::new(), Some("page=3"));
        assert_eq!(path.deserialize_queries::<Paging>().unwrap(), Paging { page: 3, size: None });

        let empty = PathComponents::new(HashMap::new(), None);
        assert!(empty.queries().is_empty());
        assert!(empty.deserialize_queries::<Paging>().is_err());
    }

    #[test]
    fn conflicting_routes_fail_to_build() {
        let result = Router::builder()
            .route(Verb::Get, "/users/{id}", noop())
            .route(Verb::Get, "/users/{name}", noop())
            .build();
        assert!(matches!(result, Err(RouterError::Insert { verb: Verb::Get, .. })));

        // the same pattern under another verb is fine
        let result = Router::builder()
            .route(Verb::Get, "/users/{id}", noop())
            .route(Verb::Delete, "/users/{id}", noop())
            .build();
        assert!(result.is_ok());
    }
}
