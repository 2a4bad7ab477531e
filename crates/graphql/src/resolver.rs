//! Extraction of the GraphQL parameters from a request.
//!
//! Parameters come from two sources: the query string and the request body.
//! The query string always wins; the body only fills what is still missing.
use indexmap::IndexMap;
use multimap::MultiMap;
use salvo_core::http::{Method, Mime, Request, mime};
use serde_json::{Map, Value as JsonValue};

use crate::{GenericValue, GraphQLError};

/// Body fields of a request, as a JSON object.
pub type RequestContent = Map<String, JsonValue>;

const QUERY: &str = "query";
const VARIABLES: &str = "variables";
const OPERATION_NAME: &str = "operationName";
const RAW: &str = "raw";

/// The GraphQL parameters of one request.
///
/// Every field is optional. A missing `query` is not an error at this stage,
/// the handler decides what to do with it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedQuery {
    query: Option<String>,
    variables: Option<IndexMap<String, GenericValue>>,
    operation_name: Option<String>,
    raw: Option<bool>,
}

impl ResolvedQuery {
    /// Resolves the parameters from query string values and body fields.
    ///
    /// For each of `query`, `variables`, `operationName` and `raw` the query
    /// string is consulted first. When a name is repeated the last value
    /// counts. Whatever is still unset afterwards is read from `content`.
    ///
    /// `raw` must be a boolean literal and `variables` a JSON object, other
    /// values leave the parameter unset instead of failing the request.
    ///
    /// # Example
    ///
    /// ```
    /// use multimap::MultiMap;
    /// use salvo_graphql::ResolvedQuery;
    /// use serde_json::json;
    ///
    /// let mut queries = MultiMap::new();
    /// queries.insert("query".to_owned(), "{ fromQueryString }".to_owned());
    /// let content = json!({"query": "{ fromBody }", "operationName": "Op"});
    ///
    /// let resolved = ResolvedQuery::resolve(&queries, content.as_object());
    /// assert_eq!(resolved.query(), Some("{ fromQueryString }"));
    /// assert_eq!(resolved.operation_name(), Some("Op"));
    /// ```
    #[must_use]
    pub fn resolve(queries: &MultiMap<String, String>, content: Option<&RequestContent>) -> Self {
        let last = |name: &str| queries.get_vec(name).and_then(|values| values.last());

        let mut query = last(QUERY).cloned();
        let mut variables = last(VARIABLES).and_then(|text| parse_variables(text));
        let mut operation_name = last(OPERATION_NAME).cloned();
        let mut raw = last(RAW).and_then(|text| text.parse::<bool>().ok());

        if let Some(content) = content {
            if query.is_none() {
                query = content.get(QUERY).and_then(JsonValue::as_str).map(str::to_owned);
            }
            if variables.is_none() {
                variables = match content.get(VARIABLES) {
                    Some(JsonValue::Object(vars)) => Some(
                        vars.iter()
                            .map(|(name, value)| (name.clone(), GenericValue::from(value.clone())))
                            .collect(),
                    ),
                    Some(JsonValue::String(text)) => parse_variables(text),
                    _ => None,
                };
            }
            if operation_name.is_none() {
                operation_name = content
                    .get(OPERATION_NAME)
                    .and_then(JsonValue::as_str)
                    .map(str::to_owned);
            }
            if raw.is_none() {
                raw = match content.get(RAW) {
                    Some(JsonValue::Bool(raw)) => Some(*raw),
                    Some(JsonValue::String(text)) => text.parse::<bool>().ok(),
                    _ => None,
                };
            }
        }

        Self {
            query,
            variables,
            operation_name,
            raw,
        }
    }

    /// Reads the body of `req` and resolves the parameters from it and the
    /// query string.
    ///
    /// # Errors
    ///
    /// Returns [`GraphQLError::InvalidBody`] if a JSON body does not parse and
    /// [`GraphQLError::ReadBody`] if the body could not be read.
    pub async fn from_request(req: &mut Request) -> Result<Self, GraphQLError> {
        let content = read_content(req).await?;
        Ok(Self::resolve(req.queries(), content.as_ref()))
    }

    /// The query document.
    #[inline]
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Variables of the operation.
    #[inline]
    #[must_use]
    pub fn variables(&self) -> Option<&IndexMap<String, GenericValue>> {
        self.variables.as_ref()
    }

    /// Name of the operation to run.
    #[inline]
    #[must_use]
    pub fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    /// Whether the client asked for raw JSON.
    #[inline]
    #[must_use]
    pub fn raw(&self) -> Option<bool> {
        self.raw
    }
}

fn parse_variables(text: &str) -> Option<IndexMap<String, GenericValue>> {
    match serde_json::from_str::<JsonValue>(text) {
        Ok(JsonValue::Object(vars)) => Some(
            vars.into_iter()
                .map(|(name, value)| (name, GenericValue::from(value)))
                .collect(),
        ),
        Ok(JsonValue::Null) => None,
        Ok(_) => {
            tracing::debug!(variables = %text, "graphql variables are not an object, ignored");
            None
        }
        Err(e) => {
            tracing::debug!(error = ?e, "graphql variables are not valid json, ignored");
            None
        }
    }
}

fn is_graphql(ctype: &Mime) -> bool {
    ctype.type_() == mime::APPLICATION && ctype.subtype().as_str() == "graphql"
}

/// Reads the body fields of `req`.
///
/// JSON bodies must hold an object, form bodies contribute their fields as
/// strings and an `application/graphql` body is the query itself. Requests
/// without a body, and other content types, have no content.
pub(crate) async fn read_content(req: &mut Request) -> Result<Option<RequestContent>, GraphQLError> {
    if matches!(*req.method(), Method::GET | Method::HEAD) {
        return Ok(None);
    }
    let Some(ctype) = req.content_type() else {
        return Ok(None);
    };

    if ctype.subtype() == mime::JSON {
        let payload = req.payload().await.map_err(GraphQLError::ReadBody)?;
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        match serde_json::from_slice::<JsonValue>(payload).map_err(GraphQLError::InvalidBody)? {
            JsonValue::Object(content) => Ok(Some(content)),
            _ => Ok(None),
        }
    } else if ctype.subtype() == mime::WWW_FORM_URLENCODED || ctype.subtype() == mime::FORM_DATA {
        let form = req.form_data().await.map_err(GraphQLError::ReadBody)?;
        let content = form
            .fields
            .iter_all()
            .filter_map(|(name, values)| {
                values
                    .last()
                    .map(|value| (name.clone(), JsonValue::String(value.clone())))
            })
            .collect();
        Ok(Some(content))
    } else if is_graphql(&ctype) {
        let payload = req.payload().await.map_err(GraphQLError::ReadBody)?;
        let query = String::from_utf8_lossy(payload).into_owned();
        let mut content = RequestContent::new();
        content.insert(QUERY.to_owned(), JsonValue::String(query));
        Ok(Some(content))
    } else {
        tracing::debug!(content_type = %ctype, "unsupported graphql body, ignored");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use multimap::MultiMap;
    use salvo_core::test::TestClient;
    use serde_json::json;

    use super::*;

    fn queries(pairs: &[(&str, &str)]) -> MultiMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_query_string_only() {
        let queries = queries(&[
            ("query", "{ hello }"),
            ("operationName", "Hello"),
            ("raw", "true"),
            ("other", "ignored"),
        ]);
        let resolved = ResolvedQuery::resolve(&queries, None);
        assert_eq!(resolved.query(), Some("{ hello }"));
        assert_eq!(resolved.operation_name(), Some("Hello"));
        assert_eq!(resolved.raw(), Some(true));
        assert_eq!(resolved.variables(), None);
    }

    #[test]
    fn test_body_only() {
        let content = json!({
            "query": "{ hello }",
            "variables": {"id": 7, "name": "Bob"},
            "operationName": "Hello",
            "raw": false,
        });
        let resolved = ResolvedQuery::resolve(&MultiMap::new(), content.as_object());
        assert_eq!(resolved.query(), Some("{ hello }"));
        assert_eq!(resolved.operation_name(), Some("Hello"));
        assert_eq!(resolved.raw(), Some(false));
        let vars = resolved.variables().unwrap();
        assert_eq!(vars.get("id"), Some(&GenericValue::Int(7)));
        assert_eq!(vars.get("name"), Some(&GenericValue::String("Bob".into())));
    }

    #[test]
    fn test_query_string_wins_per_parameter() {
        let content = json!({
            "query": "{ body }",
            "variables": {"from": "body"},
            "operationName": "Body",
            "raw": true,
        });

        let resolved = ResolvedQuery::resolve(&queries(&[("query", "{ qs }")]), content.as_object());
        assert_eq!(resolved.query(), Some("{ qs }"));
        assert_eq!(resolved.operation_name(), Some("Body"));
        assert_eq!(resolved.raw(), Some(true));

        let resolved =
            ResolvedQuery::resolve(&queries(&[("operationName", "Qs")]), content.as_object());
        assert_eq!(resolved.query(), Some("{ body }"));
        assert_eq!(resolved.operation_name(), Some("Qs"));

        let resolved = ResolvedQuery::resolve(&queries(&[("raw", "false")]), content.as_object());
        assert_eq!(resolved.raw(), Some(false));

        let resolved = ResolvedQuery::resolve(
            &queries(&[("variables", r#"{"from": "query"}"#)]),
            content.as_object(),
        );
        assert_eq!(
            resolved.variables().and_then(|v| v.get("from")),
            Some(&GenericValue::String("query".into()))
        );
    }

    #[test]
    fn test_malformed_values_are_unset() {
        let resolved = ResolvedQuery::resolve(
            &queries(&[("raw", "yes"), ("variables", "{not json")]),
            None,
        );
        assert_eq!(resolved.raw(), None);
        assert_eq!(resolved.variables(), None);

        let resolved = ResolvedQuery::resolve(&queries(&[("raw", "")]), None);
        assert_eq!(resolved.raw(), None);

        let resolved = ResolvedQuery::resolve(&queries(&[("variables", "[1, 2]")]), None);
        assert_eq!(resolved.variables(), None);
    }

    #[test]
    fn test_malformed_query_string_falls_back_to_body() {
        let content = json!({"raw": true, "variables": {"a": 1}});
        let resolved = ResolvedQuery::resolve(
            &queries(&[("raw", "nope"), ("variables", "nope")]),
            content.as_object(),
        );
        assert_eq!(resolved.raw(), Some(true));
        assert_eq!(
            resolved.variables().and_then(|v| v.get("a")),
            Some(&GenericValue::Int(1))
        );
    }

    #[test]
    fn test_wrong_body_types_are_ignored() {
        let content = json!({
            "query": 12,
            "variables": [1],
            "operationName": false,
            "raw": "maybe",
        });
        let resolved = ResolvedQuery::resolve(&MultiMap::new(), content.as_object());
        assert_eq!(resolved, ResolvedQuery::default());
    }

    #[test]
    fn test_last_repeated_parameter_wins() {
        let resolved = ResolvedQuery::resolve(
            &queries(&[("query", "{ first }"), ("query", "{ second }")]),
            None,
        );
        assert_eq!(resolved.query(), Some("{ second }"));
    }

    #[tokio::test]
    async fn test_from_json_request() {
        let mut req = TestClient::post("http://127.0.0.1:5800/graphql?operationName=Qs")
            .json(&json!({"query": "{ hello }", "operationName": "Body", "variables": "{\"x\": true}"}))
            .build();
        let resolved = ResolvedQuery::from_request(&mut req).await.unwrap();
        assert_eq!(resolved.query(), Some("{ hello }"));
        assert_eq!(resolved.operation_name(), Some("Qs"));
        assert_eq!(
            resolved.variables().and_then(|v| v.get("x")),
            Some(&GenericValue::Bool(true))
        );
    }

    #[tokio::test]
    async fn test_from_form_request() {
        let mut req = TestClient::post("http://127.0.0.1:5800/graphql")
            .form(&[("query", "{ hello }"), ("raw", "true")])
            .build();
        let resolved = ResolvedQuery::from_request(&mut req).await.unwrap();
        assert_eq!(resolved.query(), Some("{ hello }"));
        assert_eq!(resolved.raw(), Some(true));
    }

    #[tokio::test]
    async fn test_from_graphql_request() {
        let mut req = TestClient::post("http://127.0.0.1:5800/graphql")
            .text("{ hello }")
            .add_header("content-type", "application/graphql", true)
            .build();
        let resolved = ResolvedQuery::from_request(&mut req).await.unwrap();
        assert_eq!(resolved.query(), Some("{ hello }"));
    }

    #[tokio::test]
    async fn test_invalid_json_body() {
        let mut req = TestClient::post("http://127.0.0.1:5800/graphql")
            .raw_json("{\"query\": ")
            .build();
        let err = ResolvedQuery::from_request(&mut req).await.unwrap_err();
        assert!(matches!(err, GraphQLError::InvalidBody(_)));
    }

    #[tokio::test]
    async fn test_get_ignores_body() {
        let mut req = TestClient::get("http://127.0.0.1:5800/graphql?query=%7B%20hello%20%7D")
            .json(&json!({"operationName": "Body"}))
            .build();
        let resolved = ResolvedQuery::from_request(&mut req).await.unwrap();
        assert_eq!(resolved.query(), Some("{ hello }"));
        assert_eq!(resolved.operation_name(), None);
    }
}
