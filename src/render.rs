//! Query Renderer: the consumed query-building interface
//!
//! The host application turns a (definition, variant) pair into backend SQL
//! with placeholder tokens plus the values of those tokens. The engine only
//! consumes the result; [`StaticRenderer`] is an in-memory registry for
//! embedders that render ahead of time (and for tests).

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{VivError, VivResult};

/// A scalar placeholder value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Text(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::Text(s)
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Integer(i)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

/// Value bound to a placeholder; lists come from "value is one of" predicates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlaceholderValue {
    Scalar(Literal),
    List(Vec<Literal>),
}

impl From<Literal> for PlaceholderValue {
    fn from(v: Literal) -> Self {
        PlaceholderValue::Scalar(v)
    }
}

impl From<Vec<Literal>> for PlaceholderValue {
    fn from(v: Vec<Literal>) -> Self {
        PlaceholderValue::List(v)
    }
}

impl From<&str> for PlaceholderValue {
    fn from(s: &str) -> Self {
        PlaceholderValue::Scalar(s.into())
    }
}

impl From<String> for PlaceholderValue {
    fn from(s: String) -> Self {
        PlaceholderValue::Scalar(s.into())
    }
}

impl From<i64> for PlaceholderValue {
    fn from(i: i64) -> Self {
        PlaceholderValue::Scalar(i.into())
    }
}

impl From<bool> for PlaceholderValue {
    fn from(b: bool) -> Self {
        PlaceholderValue::Scalar(b.into())
    }
}

/// Placeholder token → value, in the order the renderer produced them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Vec<(String, PlaceholderValue)>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value; `region` is stored as `:region`
    pub fn insert(&mut self, token: &str, value: impl Into<PlaceholderValue>) {
        let token = normalize_token(token);
        let value = value.into();
        match self.0.iter_mut().find(|(t, _)| *t == token) {
            Some(slot) => slot.1 = value,
            None => self.0.push((token, value)),
        }
    }

    pub fn with(mut self, token: &str, value: impl Into<PlaceholderValue>) -> Self {
        self.insert(token, value);
        self
    }

    pub fn get(&self, token: &str) -> Option<&PlaceholderValue> {
        self.0.iter().find(|(t, _)| t == token).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PlaceholderValue)> {
        self.0.iter().map(|(t, v)| (t.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn normalize_token(token: &str) -> String {
    if token.starts_with(':') || token.starts_with('$') {
        token.to_string()
    } else {
        format!(":{token}")
    }
}

impl Serialize for Arguments {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (token, value) in &self.0 {
            map.serialize_entry(token, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Arguments {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ArgumentsVisitor;

        impl<'de> Visitor<'de> for ArgumentsVisitor {
            type Value = Arguments;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of placeholder tokens to scalar or list values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut args = Arguments::new();
                while let Some((token, value)) = access.next_entry::<String, PlaceholderValue>()? {
                    args.insert(&token, value);
                }
                Ok(args)
            }
        }

        deserializer.deserialize_map(ArgumentsVisitor)
    }
}

/// Backend SQL with placeholder tokens and their values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedQuery {
    pub sql: String,
    #[serde(default)]
    pub arguments: Arguments,
}

impl RenderedQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            arguments: Arguments::new(),
        }
    }

    pub fn with_argument(mut self, token: &str, value: impl Into<PlaceholderValue>) -> Self {
        self.arguments.insert(token, value);
        self
    }

    /// Reject output that is not a SELECT statement
    pub fn ensure_select(&self, definition_id: &str, variant_id: &str) -> VivResult<()> {
        let render_error = |reason: &str| VivError::RenderError {
            definition_id: definition_id.to_string(),
            variant_id: variant_id.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = self.sql.trim_start();
        if trimmed.trim_end().trim_end_matches(';').trim().is_empty() {
            return Err(render_error("renderer returned empty SQL"));
        }

        let keyword: String = trimmed
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        if !keyword.eq_ignore_ascii_case("select") {
            return Err(render_error(&format!(
                "expected a SELECT statement, got '{}'",
                if keyword.is_empty() { trimmed.chars().take(20).collect() } else { keyword }
            )));
        }

        Ok(())
    }
}

/// How the renderer must build the query for materialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Ignore runtime (exposed/contextual) filters
    pub definition_only: bool,
    /// Emit LIMIT/OFFSET; views must not carry them
    pub paginate: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            definition_only: true,
            paginate: false,
        }
    }
}

/// Source of rendered queries
pub trait QueryRenderer {
    fn render(
        &self,
        definition_id: &str,
        variant_id: &str,
        options: &RenderOptions,
    ) -> VivResult<RenderedQuery>;
}

impl<T: QueryRenderer + ?Sized> QueryRenderer for &T {
    fn render(
        &self,
        definition_id: &str,
        variant_id: &str,
        options: &RenderOptions,
    ) -> VivResult<RenderedQuery> {
        (**self).render(definition_id, variant_id, options)
    }
}

/// In-memory registry of pre-rendered queries
///
/// Queries registered here are already definition-only and unpaginated, so
/// [`RenderOptions`] is not consulted.
#[derive(Debug, Clone, Default)]
pub struct StaticRenderer {
    definitions: BTreeMap<String, BTreeMap<String, RenderedQuery>>,
}

impl StaticRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, definition_id: &str, variant_id: &str, query: RenderedQuery) {
        self.definitions
            .entry(definition_id.to_string())
            .or_default()
            .insert(variant_id.to_string(), query);
    }

    pub fn with_variant(mut self, definition_id: &str, variant_id: &str, query: RenderedQuery) -> Self {
        self.insert(definition_id, variant_id, query);
        self
    }

    /// Register a definition that has no variants yet
    pub fn with_definition(mut self, definition_id: &str) -> Self {
        self.definitions.entry(definition_id.to_string()).or_default();
        self
    }
}

impl QueryRenderer for StaticRenderer {
    fn render(
        &self,
        definition_id: &str,
        variant_id: &str,
        _options: &RenderOptions,
    ) -> VivResult<RenderedQuery> {
        let variants = self
            .definitions
            .get(definition_id)
            .ok_or_else(|| VivError::DefinitionNotFound {
                definition_id: definition_id.to_string(),
            })?;

        variants
            .get(variant_id)
            .cloned()
            .ok_or_else(|| VivError::VariantNotFound {
                definition_id: definition_id.to_string(),
                variant_id: variant_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_query_from_json_keeps_argument_order() {
        let json = r#"{
            "sql": "SELECT 1 FROM t WHERE a = :b AND c IN (:ids)",
            "arguments": {":b": "x", "ids": [1, 2, 3], ":flag": true, ":none": null, ":f": 1.25}
        }"#;
        let query: RenderedQuery = serde_json::from_str(json).unwrap();

        let tokens: Vec<&str> = query.arguments.iter().map(|(t, _)| t).collect();
        assert_eq!(tokens, vec![":b", ":ids", ":flag", ":none", ":f"]);
        assert_eq!(query.arguments.get(":b"), Some(&PlaceholderValue::Scalar(Literal::Text("x".into()))));
        assert_eq!(
            query.arguments.get(":ids"),
            Some(&PlaceholderValue::List(vec![Literal::Integer(1), Literal::Integer(2), Literal::Integer(3)]))
        );
        assert_eq!(query.arguments.get(":none"), Some(&PlaceholderValue::Scalar(Literal::Null)));
        assert_eq!(query.arguments.get(":f"), Some(&PlaceholderValue::Scalar(Literal::Float(1.25))));
    }

    #[test]
    fn test_arguments_insert_replaces() {
        let mut args = Arguments::new();
        args.insert("region", "east");
        args.insert(":region", "west");

        assert_eq!(args.len(), 1);
        assert_eq!(args.get(":region"), Some(&PlaceholderValue::from("west")));
    }

    #[test]
    fn test_arguments_serialize_round_trip() {
        let args = Arguments::new().with(":a", 1i64).with("$1", "x");
        let json = serde_json::to_string(&args).unwrap();
        assert_eq!(json, r#"{":a":1,"$1":"x"}"#);
    }

    #[test]
    fn test_ensure_select() {
        assert!(RenderedQuery::new("  select * FROM t").ensure_select("d", "v").is_ok());
        assert!(RenderedQuery::new("SELECT\n1").ensure_select("d", "v").is_ok());

        for bad in ["", "  ;  ", "DELETE FROM t", "WITH x AS (SELECT 1) SELECT * FROM x", "SELECTED"] {
            let err = RenderedQuery::new(bad).ensure_select("d", "v").unwrap_err();
            assert!(matches!(err, VivError::RenderError { .. }), "{bad}: {err:?}");
        }
    }

    #[test]
    fn test_static_renderer_errors() {
        let renderer = StaticRenderer::new()
            .with_variant("sales_report", "summary", RenderedQuery::new("SELECT 1"))
            .with_definition("empty_report");
        let opts = RenderOptions::default();

        assert!(renderer.render("sales_report", "summary", &opts).is_ok());
        assert!(matches!(
            renderer.render("sales_report", "nope", &opts),
            Err(VivError::VariantNotFound { .. })
        ));
        assert!(matches!(
            renderer.render("empty_report", "summary", &opts),
            Err(VivError::VariantNotFound { .. })
        ));
        assert!(matches!(
            renderer.render("missing", "summary", &opts),
            Err(VivError::DefinitionNotFound { .. })
        ));
    }

    #[test]
    fn test_render_options_default_is_view_safe() {
        let opts = RenderOptions::default();
        assert!(opts.definition_only);
        assert!(!opts.paginate);
    }
}
