//! GraphiQL page served to browsers that ask for HTML.
//!
//! The page is a static template, the only dynamic parts are the four values
//! the editor is pre-populated with. They are written as JavaScript string
//! literals inside a `<script>` block, see [`safe_serialize`].
use indexmap::IndexMap;

use crate::{ExecutionResult, GenericValue};

/// GraphiQL release loaded from the CDN.
pub const GRAPHIQL_VERSION: &str = "0.7.1";
/// React release matching [`GRAPHIQL_VERSION`].
pub const REACT_VERSION: &str = "15.0.0";
/// `fetch` polyfill release.
pub const FETCH_VERSION: &str = "0.9.0";

const INDEX_TMPL: &str = include_str!("graphiql.html");

const LINE_SEPARATOR: char = '\u{2028}';
const PARAGRAPH_SEPARATOR: char = '\u{2029}';

/// Writes `data` as a double quoted JavaScript string literal which is safe to
/// place inside a `<script>` element. `None` becomes `null`.
///
/// Backslash, double quote, carriage return, line feed, tab and the two
/// Unicode line terminators are written as escape sequences. `<` is written as
/// `\u003c` so the value can never close the surrounding script element.
#[must_use]
pub fn safe_serialize(data: Option<&str>) -> String {
    let Some(data) = data else {
        return "null".to_owned();
    };
    let mut literal = String::with_capacity(data.len() + 2);
    literal.push('"');
    for c in data.chars() {
        match c {
            '\\' => literal.push_str("\\\\"),
            '"' => literal.push_str("\\\""),
            '\r' => literal.push_str("\\r"),
            '\n' => literal.push_str("\\n"),
            '\t' => literal.push_str("\\t"),
            LINE_SEPARATOR => literal.push_str("\\u2028"),
            PARAGRAPH_SEPARATOR => literal.push_str("\\u2029"),
            '<' => literal.push_str("\\u003c"),
            c => literal.push(c),
        }
    }
    literal.push('"');
    literal
}

/// Renders the GraphiQL page pre-populated with the given request and result.
#[must_use]
pub fn render(
    query: Option<&str>,
    variables: Option<&IndexMap<String, GenericValue>>,
    operation_name: Option<&str>,
    result: Option<&ExecutionResult>,
) -> String {
    let variables = variables.and_then(|vars| serde_json::to_string_pretty(vars).ok());
    let result = result.and_then(|result| serde_json::to_string_pretty(result).ok());
    fill(INDEX_TMPL, |name| match name {
        "graphiql_version" => Some(GRAPHIQL_VERSION.to_owned()),
        "react_version" => Some(REACT_VERSION.to_owned()),
        "fetch_version" => Some(FETCH_VERSION.to_owned()),
        "query" => Some(safe_serialize(query)),
        "variables" => Some(safe_serialize(variables.as_deref())),
        "operation_name" => Some(safe_serialize(operation_name)),
        "result" => Some(safe_serialize(result.as_deref())),
        _ => None,
    })
}

// Single pass, so placeholder-like text inside substituted values stays as is.
fn fill(template: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut output = String::with_capacity(template.len() + 256);
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        let name = &rest[start + 2..start + 2 + len];
        output.push_str(&rest[..start]);
        match lookup(name) {
            Some(value) => output.push_str(&value),
            None => output.push_str(&rest[start..start + len + 4]),
        }
        rest = &rest[start + len + 4..];
    }
    output.push_str(rest);
    output
}
