//! JSON pointer helpers (RFC 6901).
//!
//! Every location inside a generic tree - including intermediate maps and
//! array indices - has a pointer. The empty pointer designates the root.
//! These helpers are the leaf utilities the canonicalizer and the differ
//! are built on.

use serde_json::Value;

use crate::error::PointerError;

/// Result type local to pointer navigation.
type PointerResult<T> = std::result::Result<T, PointerError>;

/// Escapes a single reference token: `~` becomes `~0`, `/` becomes `~1`.
#[must_use]
pub fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Unescapes a single reference token: `~1` becomes `/`, `~0` becomes `~`.
#[must_use]
pub fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Returns true if `prefix` is a strict prefix of `path`.
///
/// A pointer P is a prefix of Q iff Q begins with P followed by `/`.
#[must_use]
pub fn is_prefix(prefix: &str, path: &str) -> bool {
    path.len() > prefix.len()
        && path.starts_with(prefix)
        && path.as_bytes()[prefix.len()] == b'/'
}

/// Returns true if any element of `prefixes` is a strict prefix of `path`.
#[must_use]
pub fn includes_prefix(prefixes: &[String], path: &str) -> bool {
    prefixes.iter().any(|prefix| is_prefix(prefix, path))
}

/// Resolves `pointer` to a reference into `value`.
///
/// # Errors
///
/// Returns an error if the pointer is syntactically invalid, steps through
/// a scalar, or does not resolve to a value.
pub fn resolve<'a>(value: &'a Value, pointer: &str) -> PointerResult<&'a Value> {
    let mut current = value;
    for token in tokens(pointer)? {
        current = step(current, &token, pointer)?;
    }
    Ok(current)
}

/// Resolves `pointer` to a mutable reference into `value`.
///
/// # Errors
///
/// Same conditions as [`resolve`].
pub fn resolve_mut<'a>(value: &'a mut Value, pointer: &str) -> PointerResult<&'a mut Value> {
    let mut current = value;
    for token in tokens(pointer)? {
        current = step_mut(current, &token, pointer)?;
    }
    Ok(current)
}

/// Sets `new` at `pointer`, overwriting any existing value.
///
/// The parent container must already exist; intermediate containers are not
/// created. For arrays, the token may address an existing index, the index
/// one past the end, or `-` to append.
///
/// # Errors
///
/// Returns an error if the pointer is invalid, addresses the root, the
/// parent is missing or not a container, or an array index is out of range.
pub fn set(value: &mut Value, pointer: &str, new: Value) -> PointerResult<()> {
    let all_tokens = tokens(pointer)?;
    let Some((last, parents)) = all_tokens.split_last() else {
        return Err(PointerError::InvalidSyntax {
            pointer: pointer.to_string(),
        });
    };

    let mut current = value;
    for token in parents {
        current = step_mut(current, token, pointer)?;
    }

    match current {
        Value::Object(map) => {
            map.insert(last.clone(), new);
            Ok(())
        }
        Value::Array(items) => {
            if last == "-" {
                items.push(new);
                return Ok(());
            }
            let index = parse_index(last, pointer)?;
            if index < items.len() {
                items[index] = new;
                Ok(())
            } else if index == items.len() {
                items.push(new);
                Ok(())
            } else {
                Err(PointerError::NotFound {
                    pointer: pointer.to_string(),
                })
            }
        }
        _ => Err(PointerError::NotAContainer {
            pointer: pointer.to_string(),
        }),
    }
}

/// Deletes the value at `pointer`, returning it.
///
/// # Errors
///
/// Returns an error if the pointer is invalid, addresses the root, or does
/// not resolve to a value.
pub fn delete(value: &mut Value, pointer: &str) -> PointerResult<Value> {
    let all_tokens = tokens(pointer)?;
    let Some((last, parents)) = all_tokens.split_last() else {
        return Err(PointerError::InvalidSyntax {
            pointer: pointer.to_string(),
        });
    };

    let mut current = value;
    for token in parents {
        current = step_mut(current, token, pointer)?;
    }

    match current {
        Value::Object(map) => map.remove(last).ok_or_else(|| PointerError::NotFound {
            pointer: pointer.to_string(),
        }),
        Value::Array(items) => {
            let index = parse_index(last, pointer)?;
            if index < items.len() {
                Ok(items.remove(index))
            } else {
                Err(PointerError::NotFound {
                    pointer: pointer.to_string(),
                })
            }
        }
        _ => Err(PointerError::NotAContainer {
            pointer: pointer.to_string(),
        }),
    }
}

/// Splits a pointer into unescaped reference tokens.
fn tokens(pointer: &str) -> PointerResult<Vec<String>> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    if !pointer.starts_with('/') {
        return Err(PointerError::InvalidSyntax {
            pointer: pointer.to_string(),
        });
    }
    Ok(pointer[1..].split('/').map(unescape).collect())
}

/// Steps one token deeper into `value`.
fn step<'a>(value: &'a Value, token: &str, pointer: &str) -> PointerResult<&'a Value> {
    match value {
        Value::Object(map) => map.get(token).ok_or_else(|| PointerError::NotFound {
            pointer: pointer.to_string(),
        }),
        Value::Array(items) => {
            let index = parse_index(token, pointer)?;
            items.get(index).ok_or_else(|| PointerError::NotFound {
                pointer: pointer.to_string(),
            })
        }
        _ => Err(PointerError::NotAContainer {
            pointer: pointer.to_string(),
        }),
    }
}

/// Steps one token deeper into `value`, mutably.
fn step_mut<'a>(value: &'a mut Value, token: &str, pointer: &str) -> PointerResult<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(token).ok_or_else(|| PointerError::NotFound {
            pointer: pointer.to_string(),
        }),
        Value::Array(items) => {
            let index = parse_index(token, pointer)?;
            items.get_mut(index).ok_or_else(|| PointerError::NotFound {
                pointer: pointer.to_string(),
            })
        }
        _ => Err(PointerError::NotAContainer {
            pointer: pointer.to_string(),
        }),
    }
}

/// Parses a reference token as an array index.
fn parse_index(token: &str, pointer: &str) -> PointerResult<usize> {
    token.parse::<usize>().map_err(|_| PointerError::InvalidIndex {
        pointer: pointer.to_string(),
        token: token.to_string(),
    })
}
