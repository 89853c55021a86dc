//! URL templates with `:name` placeholders.
//!
//! # Design
//! A template is compiled once into literal and placeholder tokens, then
//! rendered per call against the merged parameter values. Rendering never
//! fails: a placeholder without a usable value is removed, and the leftover
//! separators are normalized afterwards.
//!
//! Recognition rules:
//! - a placeholder is `:` followed by a maximal run of ASCII word characters
//! - `\:` is a literal colon and never starts a placeholder
//! - a purely numeric name is literal, so `http://host:8080/` keeps its port
//!
//! Parameters that are not placeholders of the template are handed back as
//! query parameters, untouched.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::encoding::encode_uri_segment;

/// Parameter values for one call, keyed by name. `Value::Null` means "no value".
pub type ParamValues = BTreeMap<String, Value>;

static EXTENSION_DOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/\.([A-Za-z0-9_]+)($|\?)").expect("static regex is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Param(String),
}

/// A compiled URL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    tokens: Vec<Token>,
    names: Vec<String>,
}

/// Result of rendering a template: the final URL plus the parameters that
/// belong in the query string.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedUrl {
    pub url: String,
    pub query: ParamValues,
}

impl Template {
    pub fn compile(source: &str) -> Self {
        let mut tokens = Vec::new();
        let mut names: Vec<String> = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            match c {
                '\\' if matches!(chars.peek(), Some((_, ':'))) => {
                    chars.next();
                    literal.push(':');
                }
                ':' => {
                    let rest = &source[i + 1..];
                    let len = rest.find(|c: char| !is_word_char(c)).unwrap_or(rest.len());
                    let name = &rest[..len];
                    if name.is_empty() || name.bytes().all(|b| b.is_ascii_digit()) {
                        literal.push(':');
                        continue;
                    }
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    if !names.iter().any(|n| n == name) {
                        names.push(name.to_string());
                    }
                    tokens.push(Token::Param(name.to_string()));
                    // Word characters are ASCII, one byte per char.
                    for _ in 0..len {
                        chars.next();
                    }
                }
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        Self {
            source: source.to_string(),
            tokens,
            names,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Placeholder names in first-seen order.
    pub fn param_names(&self) -> &[String] {
        &self.names
    }

    pub fn is_url_param(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn render(&self, params: &ParamValues) -> RenderedUrl {
        let mut url = String::with_capacity(self.source.len());

        for (index, token) in self.tokens.iter().enumerate() {
            match token {
                Token::Literal(text) => url.push_str(text),
                Token::Param(name) => match params.get(name).and_then(|v| segment_value(name, v)) {
                    Some(value) => url.push_str(&encode_uri_segment(&value)),
                    None => {
                        // `/:a/` collapses to `/`; `/:a.` and a trailing `/:a` keep their slash.
                        if self.char_after(index) == Some('/') && url.ends_with('/') {
                            url.pop();
                        }
                    }
                },
            }
        }

        let url = normalize(url.trim_end_matches('/'));
        let query = params
            .iter()
            .filter(|(key, _)| !self.is_url_param(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        tracing::trace!(template = %self.source, %url, "rendered url template");
        RenderedUrl { url, query }
    }

    fn char_after(&self, index: usize) -> Option<char> {
        match self.tokens.get(index + 1)? {
            Token::Literal(text) => text.chars().next(),
            Token::Param(_) => Some(':'),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// String form of a value substituted into a path segment. Arrays, objects
/// and null carry no segment text and count as absent.
fn segment_value(name: &str, value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        Value::Array(_) | Value::Object(_) => {
            tracing::debug!(param = name, "non-primitive value ignored for url segment");
            None
        }
    }
}

/// Collapse `/.ext` at the end of the path into `.ext`, then turn an escaped
/// `/\.` back into `/.`.
fn normalize(url: &str) -> String {
    let collapsed = EXTENSION_DOT.replacen(url, 1, |caps: &Captures| {
        format!(".{}{}", &caps[1], &caps[2])
    });
    collapsed.replacen("/\\.", "/.", 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> ParamValues {
        serde_json::from_value(value).unwrap()
    }

    fn render(template: &str, value: Value) -> RenderedUrl {
        Template::compile(template).render(&params(value))
    }

    #[test]
    fn compile_splits_literals_and_params() {
        let template = Template::compile("/user/:id/:format");
        assert_eq!(
            template.tokens(),
            &[
                Token::Literal("/user/".into()),
                Token::Param("id".into()),
                Token::Literal("/".into()),
                Token::Param("format".into()),
            ]
        );
        assert_eq!(template.param_names(), &["id".to_string(), "format".to_string()]);
    }

    #[test]
    fn escaped_colon_is_literal() {
        let template = Template::compile(r"/time/12\:00/:id");
        assert_eq!(template.param_names(), &["id".to_string()]);
        assert_eq!(template.render(&params(json!({"id": 1}))).url, "/time/12:00/1");
    }

    #[test]
    fn port_numbers_are_not_params() {
        let rendered = render("http://localhost:8080/items/:id", json!({"id": 7}));
        assert_eq!(rendered.url, "http://localhost:8080/items/7");
    }

    #[test]
    fn repeated_placeholder_is_substituted_everywhere() {
        let rendered = render("/a/:id/b/:id", json!({"id": "x"}));
        assert_eq!(rendered.url, "/a/x/b/x");
    }

    #[test]
    fn bound_value_replaces_placeholder_verbatim() {
        assert_eq!(render("/user/:id", json!({"id": "abc"})).url, "/user/abc");
        assert_eq!(render("/user/:id", json!({"id": 42})).url, "/user/42");
        assert_eq!(render("/flag/:on", json!({"on": true})).url, "/flag/true");
    }

    #[test]
    fn bound_value_is_segment_encoded() {
        assert_eq!(render("/q/:term", json!({"term": "a b/c"})).url, "/q/a%20b%2Fc");
        assert_eq!(render("/q/:term", json!({"term": "a&b=c"})).url, "/q/a&b=c");
    }

    #[test]
    fn missing_middle_param_leaves_no_double_slash() {
        assert_eq!(render("/user/:id/:format", json!({"format": "json"})).url, "/user/json");
        assert_eq!(render("/user/:id/:format", json!({})).url, "/user");
    }

    #[test]
    fn missing_trailing_param_drops_trailing_slash() {
        assert_eq!(render("/user/:id/:format", json!({"id": 42})).url, "/user/42");
        assert_eq!(render("/user/:id", json!({"id": null})).url, "/user");
    }

    #[test]
    fn doubled_slash_outside_placeholders_is_preserved() {
        assert_eq!(render("http://host//api/:id", json!({})).url, "http://host//api");
    }

    #[test]
    fn format_scenarios() {
        let both = json!({"id": 42, "format": "json"});
        assert_eq!(render("/user/:id/:format", both.clone()).url, "/user/42/json");
        assert_eq!(render("/user/:id.:format", both).url, "/user/42.json");
    }

    #[test]
    fn dot_before_extension_collapses_onto_previous_segment() {
        assert_eq!(render("/user/:id.:format", json!({"format": "json"})).url, "/user.json");
    }

    #[test]
    fn escaped_dot_segment_is_kept() {
        assert_eq!(render(r"/static/\.hidden", json!({})).url, "/static/.hidden");
    }

    #[test]
    fn non_primitive_value_counts_as_absent() {
        assert_eq!(render("/user/:id/x", json!({"id": {"a": 1}})).url, "/user/x");
        assert_eq!(render("/user/:id", json!({"id": [1, 2]})).url, "/user");
    }

    #[test]
    fn non_placeholder_params_become_query() {
        let rendered = render("/user/:id", json!({"id": 1, "page": 2, "q": "a b"}));
        assert_eq!(rendered.url, "/user/1");
        assert_eq!(rendered.query, params(json!({"page": 2, "q": "a b"})));
    }

    #[test]
    fn rendering_a_rendered_url_is_identity() {
        for (template, value) in [
            ("/user/:id/:format", json!({"id": 42, "format": "json"})),
            ("/user/:id.:format", json!({"id": 42, "format": "json"})),
            ("http://localhost:8080/items/:id", json!({"id": "a b"})),
            ("/user/:id/:format", json!({})),
        ] {
            let once = render(template, value).url;
            let twice = Template::compile(&once).render(&ParamValues::new()).url;
            assert_eq!(once, twice, "{template}");
        }
    }
}
