//! Structural value shared by the HTTP side and the GraphQL engine.
//!
//! Request bodies arrive as [`serde_json::Value`], juniper wants
//! [`InputValue`] for variables and hands back [`juniper::Value`] as results.
//! [`GenericValue`] sits in between so each side only needs one conversion.
use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;
use juniper::{DefaultScalarValue, InputValue, Spanning};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::{Map, Number, Value as JsonValue};

/// A tagged value with exactly seven shapes.
///
/// Conversions from [`serde_json::Value`] and [`juniper::Value`] are total and
/// lossless. Converting from [`InputValue`] maps enum literals and unbound
/// variables, which have no counterpart here, to [`GenericValue::Null`].
#[derive(Clone, Debug, Default, PartialEq)]
pub enum GenericValue {
    /// Absent value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Floating point number.
    Double(f64),
    /// Integer.
    Int(i64),
    /// UTF-8 string.
    String(String),
    /// Ordered list.
    Array(Vec<GenericValue>),
    /// Mapping with string keys, insertion ordered.
    Map(IndexMap<String, GenericValue>),
}

impl GenericValue {
    /// Returns the string slice if this is a [`GenericValue::String`].
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the mapping if this is a [`GenericValue::Map`].
    #[inline]
    #[must_use]
    pub fn as_map(&self) -> Option<&IndexMap<String, Self>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns `true` if this is [`GenericValue::Null`].
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Converts a map of variables into the engine's variable set.
    #[must_use]
    pub fn to_variables(variables: &IndexMap<String, Self>) -> juniper::Variables {
        variables
            .iter()
            .map(|(name, value)| (name.clone(), InputValue::from(value)))
            .collect()
    }
}

impl Serialize for GenericValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Double(d) => serializer.serialize_f64(*d),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

impl Display for GenericValue {
    /// Formats the value as pretty printed JSON.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl From<JsonValue> for GenericValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Self::String(s),
            JsonValue::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            JsonValue::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<GenericValue> for JsonValue {
    /// Non finite doubles have no JSON form and become `null`.
    fn from(value: GenericValue) -> Self {
        match value {
            GenericValue::Null => Self::Null,
            GenericValue::Bool(b) => Self::Bool(b),
            GenericValue::Double(d) => Number::from_f64(d).map_or(Self::Null, Self::Number),
            GenericValue::Int(i) => Self::Number(i.into()),
            GenericValue::String(s) => Self::String(s),
            GenericValue::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            GenericValue::Map(entries) => Self::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect::<Map<_, _>>(),
            ),
        }
    }
}

impl From<&GenericValue> for InputValue<DefaultScalarValue> {
    /// juniper integers are 32 bit, wider integers are passed as floats.
    fn from(value: &GenericValue) -> Self {
        match value {
            GenericValue::Null => Self::Null,
            GenericValue::Bool(b) => Self::Scalar(DefaultScalarValue::Boolean(*b)),
            GenericValue::Double(d) => Self::Scalar(DefaultScalarValue::Float(*d)),
            GenericValue::Int(i) => match i32::try_from(*i) {
                Ok(i) => Self::Scalar(DefaultScalarValue::Int(i)),
                Err(_) => Self::Scalar(DefaultScalarValue::Float(*i as f64)),
            },
            GenericValue::String(s) => Self::Scalar(DefaultScalarValue::String(s.clone())),
            GenericValue::Array(items) => Self::List(
                items
                    .iter()
                    .map(|item| Spanning::unlocated(Self::from(item)))
                    .collect(),
            ),
            GenericValue::Map(entries) => Self::Object(
                entries
                    .iter()
                    .map(|(key, value)| {
                        (
                            Spanning::unlocated(key.clone()),
                            Spanning::unlocated(Self::from(value)),
                        )
                    })
                    .collect(),
            ),
        }
    }
}

impl From<&InputValue<DefaultScalarValue>> for GenericValue {
    fn from(value: &InputValue<DefaultScalarValue>) -> Self {
        match value {
            InputValue::Null => Self::Null,
            InputValue::Scalar(scalar) => Self::from(scalar),
            InputValue::List(items) => {
                Self::Array(items.iter().map(|item| Self::from(&item.item)).collect())
            }
            InputValue::Object(entries) => Self::Map(
                entries
                    .iter()
                    .map(|(key, value)| (key.item.clone(), Self::from(&value.item)))
                    .collect(),
            ),
            InputValue::Enum(_) | InputValue::Variable(_) => Self::Null,
        }
    }
}

impl From<&juniper::Value<DefaultScalarValue>> for GenericValue {
    fn from(value: &juniper::Value<DefaultScalarValue>) -> Self {
        match value {
            juniper::Value::Null => Self::Null,
            juniper::Value::Scalar(scalar) => Self::from(scalar),
            juniper::Value::List(items) => Self::Array(items.iter().map(Self::from).collect()),
            juniper::Value::Object(object) => Self::Map(
                object
                    .iter()
                    .map(|(key, value)| (key.clone(), Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&DefaultScalarValue> for GenericValue {
    fn from(scalar: &DefaultScalarValue) -> Self {
        match scalar {
            DefaultScalarValue::Int(i) => Self::Int(i64::from(*i)),
            DefaultScalarValue::Float(f) => Self::Double(*f),
            DefaultScalarValue::String(s) => Self::String(s.clone()),
            DefaultScalarValue::Boolean(b) => Self::Bool(*b),
        }
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use juniper::{DefaultScalarValue, InputValue, graphql_value};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_json_round_trip() {
        let original = json!({
            "name": "salvo",
            "stars": 1024,
            "ratio": 0.25,
            "tags": ["web", null, true],
            "nested": {"z": 1, "a": {"deep": []}},
        });
        let generic = GenericValue::from(original.clone());
        assert_eq!(
            generic.as_map().map(|m| m.keys().cloned().collect::<Vec<_>>()),
            Some(vec![
                "name".to_owned(),
                "stars".to_owned(),
                "ratio".to_owned(),
                "tags".to_owned(),
                "nested".to_owned(),
            ])
        );
        assert_eq!(JsonValue::from(generic), original);
    }

    #[test]
    fn test_json_numbers() {
        assert_eq!(GenericValue::from(json!(7)), GenericValue::Int(7));
        assert_eq!(GenericValue::from(json!(-7)), GenericValue::Int(-7));
        assert_eq!(GenericValue::from(json!(1.5)), GenericValue::Double(1.5));
        assert_eq!(
            GenericValue::from(json!(u64::MAX)),
            GenericValue::Double(u64::MAX as f64)
        );
        assert_eq!(JsonValue::from(GenericValue::Double(f64::NAN)), JsonValue::Null);
    }

    #[test]
    fn test_input_value_round_trip() {
        let mut inner = IndexMap::new();
        inner.insert("b".to_owned(), GenericValue::Bool(false));
        inner.insert("a".to_owned(), GenericValue::Double(2.5));
        let mut map = IndexMap::new();
        map.insert("id".to_owned(), GenericValue::Int(42));
        map.insert("name".to_owned(), GenericValue::String("Alice".into()));
        map.insert(
            "list".to_owned(),
            GenericValue::Array(vec![GenericValue::Null, GenericValue::Map(inner)]),
        );
        let original = GenericValue::Map(map);

        let input = InputValue::<DefaultScalarValue>::from(&original);
        assert_eq!(GenericValue::from(&input), original);
    }

    #[test]
    fn test_wide_int_becomes_float() {
        let input = InputValue::<DefaultScalarValue>::from(&GenericValue::Int(i64::from(i32::MAX) + 1));
        assert_eq!(
            input,
            InputValue::Scalar(DefaultScalarValue::Float(f64::from(i32::MAX) + 1.0))
        );
    }

    #[test]
    fn test_unknown_input_tags_become_null() {
        let input = InputValue::<DefaultScalarValue>::Enum("RED".into());
        assert!(GenericValue::from(&input).is_null());
        let input = InputValue::<DefaultScalarValue>::Variable("id".into());
        assert!(GenericValue::from(&input).is_null());
    }

    #[test]
    fn test_engine_value() {
        let value: juniper::Value = graphql_value!({
            "hello": "world",
            "count": 3,
            "items": [1.5, true, null],
        });
        assert_eq!(
            JsonValue::from(GenericValue::from(&value)),
            json!({"hello": "world", "count": 3, "items": [1.5, true, null]})
        );
    }

    #[test]
    fn test_display_and_serialize() {
        let value = GenericValue::from(json!({"a": [1, "two"]}));
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"a":[1,"two"]}"#);
        assert_eq!(value.to_string(), "{\n  \"a\": [\n    1,\n    \"two\"\n  ]\n}");
    }

    #[test]
    fn test_to_variables() {
        let mut vars = IndexMap::new();
        vars.insert("name".to_owned(), GenericValue::String("Bob".into()));
        let variables = GenericValue::to_variables(&vars);
        assert_eq!(
            variables.get("name"),
            Some(&InputValue::Scalar(DefaultScalarValue::String("Bob".into())))
        );
    }
}
