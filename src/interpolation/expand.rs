//! Shell-style variable substitution.
//!
//! Supported forms:
//! - `$NAME` and `${NAME}`
//! - `${NAME:-word}` / `${NAME-word}`: `word` when unset or empty / only when unset
//! - `${NAME:+word}` / `${NAME+word}`: `word` when set and non-empty / when set
//! - `$$`: an escaped dollar
//!
//! `word` may itself contain references. Anything that does not parse as a
//! reference is copied through unchanged.

use super::VariableSource;

/// Expand every variable reference in `text`.
///
/// A reference to an undefined variable without an operator becomes `default`,
/// or stays as written when `default` is `None`. With `skip_escaped`, `$$`
/// turns into a literal `$`; otherwise it is left as `$$` for a later pass.
pub fn expand(text: &str, source: &dyn VariableSource, default: Option<&str>, skip_escaped: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push_str(if skip_escaped { "$" } else { "$$" });
            rest = tail;
        } else if let Some(inner) = after.strip_prefix('{') {
            match closing_brace(inner) {
                Some(end) => {
                    let body = &inner[..end];
                    out.push_str(&expand_braced(body, source, default, skip_escaped));
                    rest = &inner[end + 1..];
                }
                None => {
                    // Unterminated: keep the remainder as written.
                    out.push_str(&rest[pos..]);
                    rest = "";
                }
            }
        } else {
            let len = name_len(after);
            if len == 0 {
                out.push('$');
            } else {
                let name = &after[..len];
                match source.get(name) {
                    Some(value) => out.push_str(&value),
                    None => match default {
                        Some(d) => out.push_str(d),
                        None => {
                            out.push('$');
                            out.push_str(name);
                        }
                    },
                }
            }
            rest = &after[len..];
        }
    }

    out.push_str(rest);
    out
}

fn expand_braced(body: &str, source: &dyn VariableSource, default: Option<&str>, skip_escaped: bool) -> String {
    let verbatim = || format!("${{{}}}", body);

    let len = name_len(body);
    if len == 0 {
        return verbatim();
    }
    let (name, operator) = body.split_at(len);
    let value = source.get(name);
    let word = |w: &str| expand(w, source, default, skip_escaped);

    if operator.is_empty() {
        return match (value, default) {
            (Some(v), _) => v,
            (None, Some(d)) => d.to_string(),
            (None, None) => verbatim(),
        };
    }

    if let Some(fallback) = operator.strip_prefix(":-") {
        match value {
            Some(v) if !v.is_empty() => v,
            _ => word(fallback),
        }
    } else if let Some(fallback) = operator.strip_prefix('-') {
        match value {
            Some(v) => v,
            None => word(fallback),
        }
    } else if let Some(alternate) = operator.strip_prefix(":+") {
        match value {
            Some(v) if !v.is_empty() => word(alternate),
            _ => String::new(),
        }
    } else if let Some(alternate) = operator.strip_prefix('+') {
        match value {
            Some(_) => word(alternate),
            None => String::new(),
        }
    } else {
        verbatim()
    }
}

/// Length of the variable name at the start of `s`, 0 if there is none.
fn name_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Index of the `}` closing an already opened `${`, honouring nested braces.
fn closing_brace(s: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, b) in s.bytes().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
