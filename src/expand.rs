//! Shell-style parameter expansion for configuration text.
//!
//! Only the braced form is recognized (`$VAR` is left alone):
//! - `${VAR}` - substitution, empty when unset
//! - `${VAR:-word}` / `${VAR-word}` - fallback when unset-or-empty / unset
//! - `${VAR:+word}` / `${VAR+word}` - alternate when set-and-non-empty / set
//! - `${VAR:?msg}` / `${VAR?msg}` - fail when unset-or-empty / unset
//! - `${VAR:=word}` / `${VAR=word}` - fallback that is also assigned for the
//!   rest of the same expansion
//! - `$$` - a literal `$`
//!
//! Operands are expanded recursively, so `${A:-${B:-x}}` works. Anything inside
//! `${...}` that is not a valid expression is copied through untouched.

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// A required parameter (`:?` / `?`) was not satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct ExpandError {
    /// Name of the offending variable.
    pub name: String,
    /// Custom message from the expression, or the shell's default text.
    pub message: String,
}

impl ExpandError {
    fn required(name: &str, word: &str) -> Self {
        let message = if word.is_empty() {
            "parameter null or not set".to_string()
        } else {
            word.to_string()
        };
        Self {
            name: name.to_string(),
            message,
        }
    }
}

/// Variables visible to one expansion.
///
/// Assignments made by `:=` / `=` land here and nowhere else; the process
/// environment is never written.
#[derive(Debug, Clone, Default)]
pub struct Session {
    vars: HashMap<String, String>,
}

impl Session {
    /// Snapshot the current process environment.
    ///
    /// Variables whose name or value is not valid unicode are left out.
    pub fn from_env() -> Self {
        Self::with_vars(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    /// Build a session from explicit variables.
    pub fn with_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }
}

/// Expand `text` against a fresh snapshot of the process environment.
pub fn expand(text: &str) -> Result<String, ExpandError> {
    expand_with(text, &mut Session::from_env())
}

/// Expand `text` against `session`, recording any assignments in it.
pub fn expand_with(text: &str, session: &mut Session) -> Result<String, ExpandError> {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < bytes.len() {
        let Some(offset) = text[i..].find('$') else {
            out.push_str(&text[i..]);
            break;
        };
        out.push_str(&text[i..i + offset]);
        i += offset;

        match bytes.get(i + 1) {
            Some(b'$') => {
                out.push('$');
                i += 2;
            }
            Some(b'{') => match find_closing_brace(bytes, i + 2) {
                Some(end) => {
                    let expr = &text[i + 2..end];
                    match expand_expression(expr, session)? {
                        Some(expanded) => out.push_str(&expanded),
                        None => out.push_str(&text[i..=end]),
                    }
                    i = end + 1;
                }
                None => {
                    out.push('$');
                    i += 1;
                }
            },
            _ => {
                out.push('$');
                i += 1;
            }
        }
    }

    Ok(out)
}

/// Expand every string scalar inside `value` in place.
///
/// On failure the error is paired with the dot-joined path of the string that
/// failed (array elements use their index as the segment).
pub fn expand_tree(value: &mut Value, session: &mut Session) -> Result<(), (String, ExpandError)> {
    expand_tree_at(value, session, "")
}

fn expand_tree_at(
    value: &mut Value,
    session: &mut Session,
    path: &str,
) -> Result<(), (String, ExpandError)> {
    match value {
        Value::String(s) => {
            if s.contains('$') {
                *s = expand_with(s, session).map_err(|e| (path.to_string(), e))?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for (idx, item) in items.iter_mut().enumerate() {
                expand_tree_at(item, session, &join_path(path, &idx.to_string()))?;
            }
            Ok(())
        }
        Value::Object(map) => {
            for (key, item) in map.iter_mut() {
                expand_tree_at(item, session, &join_path(path, key))?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

/// Operator of a `${name<op>word}` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Get,
    /// `:-` (`colon = true`) or `-`
    Default { colon: bool },
    /// `:+` or `+`
    Alternate { colon: bool },
    /// `:?` or `?`
    Require { colon: bool },
    /// `:=` or `=`
    Assign { colon: bool },
}

fn is_name_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_name_char(ch: u8) -> bool {
    is_name_start(ch) || ch.is_ascii_digit()
}

/// Split an expression into name, operator and operand.
///
/// Returns `None` when the text does not have the shape of a parameter
/// expression.
fn parse_expression(expr: &str) -> Option<(&str, Op, &str)> {
    let bytes = expr.as_bytes();
    if !bytes.first().copied().is_some_and(is_name_start) {
        return None;
    }

    let name_len = 1 + bytes[1..].iter().take_while(|b| is_name_char(**b)).count();
    let name = &expr[..name_len];
    let rest = &bytes[name_len..];

    let (colon, op_byte, op_len) = match rest {
        [] => return Some((name, Op::Get, "")),
        [b':', op, ..] => (true, *op, 2),
        [op, ..] => (false, *op, 1),
    };

    let op = match op_byte {
        b'-' => Op::Default { colon },
        b'+' => Op::Alternate { colon },
        b'?' => Op::Require { colon },
        b'=' => Op::Assign { colon },
        _ => return None,
    };

    Some((name, op, &expr[name_len + op_len..]))
}

/// Evaluate one expression. `Ok(None)` means "not an expression, keep verbatim".
fn expand_expression(expr: &str, session: &mut Session) -> Result<Option<String>, ExpandError> {
    let Some((name, op, word)) = parse_expression(expr) else {
        return Ok(None);
    };

    let current = session.get(name).map(str::to_string);
    // "missing" is the operator's notion of absence: unset, or also empty with ':'
    let missing = |colon: bool| match current.as_deref() {
        None => true,
        Some(v) => colon && v.is_empty(),
    };

    let expanded = match op {
        Op::Get => current.unwrap_or_default(),
        Op::Default { colon } => {
            if missing(colon) {
                expand_word(word, session)?
            } else {
                current.unwrap_or_default()
            }
        }
        Op::Alternate { colon } => {
            if missing(colon) {
                String::new()
            } else {
                expand_word(word, session)?
            }
        }
        Op::Require { colon } => {
            if missing(colon) {
                return Err(ExpandError::required(name, word));
            }
            current.unwrap_or_default()
        }
        Op::Assign { colon } => {
            if missing(colon) {
                let value = expand_word(word, session)?;
                session.set(name, value.clone());
                value
            } else {
                current.unwrap_or_default()
            }
        }
    };

    Ok(Some(expanded))
}

fn expand_word(word: &str, session: &mut Session) -> Result<String, ExpandError> {
    if word.contains("${") {
        expand_with(word, session)
    } else {
        Ok(word.to_string())
    }
}

/// Index of the `}` closing an expression whose body starts at `start`,
/// skipping over nested `${...}` pairs.
fn find_closing_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                depth += 1;
                i += 2;
                continue;
            }
            b'}' => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            _ => {}
        }
        i += 1;
    }
    None
}
