//! Minimal `{{.Name}}` template rendering for URLs, headers, and details.
//!
//! Supported actions:
//!
//! - `{{.Name}}` substitutes the variable `Name`
//! - `{{index . "a.b"}}` substitutes a variable whose name is not an identifier
//! - `{{/* comment */}}` renders nothing
//!
//! `{{-` and `-}}` trim the whitespace next to the action. Variables that are
//! not defined render as an empty string.
//!
//! Rendering never fails from the caller's point of view: a template that
//! cannot be parsed is returned unchanged.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

#[cfg(feature = "tracing")]
use tracing::trace;

/// Variable holding the credential under test.
pub const KEY_VAR: &str = "Key";

/// Variable holding a freshly rotated user agent string.
pub const USER_AGENT_VAR: &str = "UserAgent";

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Renders `template` against `vars`, falling back to the unrendered text if
/// the template is malformed.
#[must_use]
pub fn render<K, V>(template: &str, vars: &HashMap<K, V>) -> String
where
    K: Borrow<str> + Eq + Hash,
    V: AsRef<str>,
{
    match parse(template) {
        Ok(nodes) => execute(&nodes, vars),
        Err(e) => {
            #[cfg(feature = "tracing")]
            trace!(error = %e, "template left unrendered");
            #[cfg(not(feature = "tracing"))]
            let _ = e;
            template.to_string()
        }
    }
}

/// Reasons a template fails to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// An action was opened with `{{` but never closed.
    #[error("unclosed action at byte {0}")]
    Unclosed(usize),
    /// An action's contents are not one of the supported forms.
    #[error("unsupported action '{0}'")]
    Unsupported(String),
}

#[derive(Debug, PartialEq, Eq)]
enum Node<'a> {
    Text(&'a str),
    Var(&'a str),
}

fn parse(template: &str) -> Result<Vec<Node<'_>>, TemplateError> {
    let mut nodes = Vec::new();
    let mut rest = template;
    let mut offset = 0;
    let mut trim_next = false;

    while let Some(start) = rest.find(OPEN) {
        let mut text = &rest[..start];
        if trim_next {
            text = text.trim_start();
        }

        let after_open = &rest[start + OPEN.len()..];
        let end = after_open
            .find(CLOSE)
            .ok_or(TemplateError::Unclosed(offset + start))?;
        let mut inner = &after_open[..end];

        if let Some(stripped) = trim_marker_left(inner) {
            text = text.trim_end();
            inner = stripped;
        }
        trim_next = false;
        if let Some(stripped) = trim_marker_right(inner) {
            trim_next = true;
            inner = stripped;
        }

        if !text.is_empty() {
            nodes.push(Node::Text(text));
        }
        if let Some(node) = parse_action(inner.trim())? {
            nodes.push(node);
        }

        let consumed = start + OPEN.len() + end + CLOSE.len();
        offset += consumed;
        rest = &rest[consumed..];
    }

    let tail = if trim_next { rest.trim_start() } else { rest };
    if !tail.is_empty() {
        nodes.push(Node::Text(tail));
    }

    Ok(nodes)
}

/// `{{- x` trims only when the dash is followed by whitespace, so `{{-3}}`
/// stays a (rejected) literal.
fn trim_marker_left(inner: &str) -> Option<&str> {
    let stripped = inner.strip_prefix('-')?;
    stripped.starts_with(char::is_whitespace).then_some(stripped)
}

fn trim_marker_right(inner: &str) -> Option<&str> {
    let stripped = inner.strip_suffix('-')?;
    stripped.ends_with(char::is_whitespace).then_some(stripped)
}

fn parse_action(action: &str) -> Result<Option<Node<'_>>, TemplateError> {
    if action.starts_with("/*") && action.ends_with("*/") && action.len() >= 4 {
        return Ok(None);
    }

    if let Some(name) = action.strip_prefix('.') {
        if is_identifier(name) {
            return Ok(Some(Node::Var(name)));
        }
        return Err(TemplateError::Unsupported(action.to_string()));
    }

    let mut parts = action.split_whitespace();
    if let (Some("index"), Some("."), Some(literal), None) = (parts.next(), parts.next(), parts.next(), parts.next()) {
        if let Some(key) = unquote(literal) {
            return Ok(Some(Node::Var(key)));
        }
    }

    Err(TemplateError::Unsupported(action.to_string()))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn unquote(literal: &str) -> Option<&str> {
    let quoted = |q: char| {
        literal
            .strip_prefix(q)
            .and_then(|s| s.strip_suffix(q))
            .filter(|s| !s.contains(q) && !s.contains('\\'))
    };
    quoted('"').or_else(|| quoted('`'))
}

fn execute<K, V>(nodes: &[Node<'_>], vars: &HashMap<K, V>) -> String
where
    K: Borrow<str> + Eq + Hash,
    V: AsRef<str>,
{
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var(name) => {
                if let Some(value) = vars.get(*name) {
                    out.push_str(value.as_ref());
                }
            }
        }
    }
    out
}
