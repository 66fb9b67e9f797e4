//! Backslash sanitization for quoted literals in code snippets
//!
//! Model-written snippets often carry Windows paths inside ordinary string
//! literals (`"C:\Users\data.csv"`), which the interpreter rejects as bad
//! escape sequences before anything runs. The scanner below walks the source,
//! finds every quote-delimited literal and doubles each backslash inside
//! literals that are not raw.
//!
//! Rules:
//! - `'…'`, `"…"`, `'''…'''` and `"""…"""` are literals.
//! - A literal is raw when its prefix (the letters glued to the opening quote,
//!   such as `r`, `rb`, `Rf`) contains `r` or `R`. Raw literals are copied as is.
//! - Inside a non-raw literal, `\` followed by the literal's own quote
//!   character stays a single escape so the literal keeps its extent.
//! - `#` outside a literal starts a comment that runs to end of line.

use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanitizeError {
    /// A literal opened at this byte offset never closes.
    UnterminatedLiteral { offset: usize },
}

impl fmt::Display for SanitizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SanitizeError::UnterminatedLiteral { offset } => {
                write!(f, "unterminated string literal starting at byte {}", offset)
            }
        }
    }
}

impl std::error::Error for SanitizeError {}

/// Which path a snippet took through sanitization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanitizeTier {
    /// At least one literal was rewritten
    Rewritten,
    /// Nothing needed changing
    Untouched,
    /// The scanner failed; the original snippet is used
    Fallback(SanitizeError),
}

/// A snippet ready for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSnippet {
    pub source: String,
    pub tier: SanitizeTier,
}

/// Sanitize, falling back to the original snippet when scanning fails.
pub fn prepare_snippet(code: &str) -> PreparedSnippet {
    match sanitize_literals(code) {
        Ok(Cow::Owned(source)) => PreparedSnippet {
            source,
            tier: SanitizeTier::Rewritten,
        },
        Ok(Cow::Borrowed(_)) => PreparedSnippet {
            source: code.to_string(),
            tier: SanitizeTier::Untouched,
        },
        Err(e) => PreparedSnippet {
            source: code.to_string(),
            tier: SanitizeTier::Fallback(e),
        },
    }
}

/// Double the backslashes of every non-raw literal that contains one.
///
/// Borrows the input when no literal needed rewriting.
pub fn sanitize_literals(code: &str) -> Result<Cow<'_, str>, SanitizeError> {
    if !code.contains('\\') {
        return Ok(Cow::Borrowed(code));
    }

    let bytes = code.as_bytes();
    let mut out = String::with_capacity(code.len() + 16);
    let mut changed = false;
    // Start of the not-yet-copied region
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'#' => {
                i = code[i..].find('\n').map_or(bytes.len(), |n| i + n);
            }
            quote @ (b'\'' | b'"') => {
                let raw = is_raw_prefix(&code[..i]);
                let triple = bytes.len() >= i + 3 && bytes[i + 1] == quote && bytes[i + 2] == quote;
                let delim_len = if triple { 3 } else { 1 };
                let body_start = i + delim_len;
                let body_end = find_literal_end(bytes, body_start, quote, triple)
                    .ok_or(SanitizeError::UnterminatedLiteral { offset: i })?;

                let body = &code[body_start..body_end];
                if !raw && body.contains('\\') {
                    out.push_str(&code[copied..body_start]);
                    out.push_str(&double_backslashes(body, quote as char));
                    copied = body_end;
                    changed = true;
                }
                i = body_end + delim_len;
            }
            _ => i += 1,
        }
    }

    if !changed {
        return Ok(Cow::Borrowed(code));
    }
    out.push_str(&code[copied..]);
    Ok(Cow::Owned(out))
}

/// Letters directly before the quote form a raw string prefix.
fn is_raw_prefix(before: &str) -> bool {
    let prefix: String = before
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    let valid = !prefix.is_empty()
        && prefix.len() <= 2
        && prefix
            .chars()
            .all(|c| matches!(c.to_ascii_lowercase(), 'r' | 'b' | 'f' | 'u' | 't'));

    valid && prefix.chars().any(|c| c == 'r' || c == 'R')
}

/// Byte offset of the closing delimiter of a literal whose body starts at `start`.
///
/// A backslash always pairs with the next byte, raw or not, so an escaped
/// quote never closes the literal.
fn find_literal_end(bytes: &[u8], start: usize, quote: u8, triple: bool) -> Option<usize> {
    let mut j = start;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b if b == quote => {
                if !triple || (bytes.get(j + 1) == Some(&quote) && bytes.get(j + 2) == Some(&quote)) {
                    return Some(j);
                }
                j += 1;
            }
            b'\n' if !triple => return None,
            _ => j += 1,
        }
    }
    None
}

fn double_backslashes(body: &str, quote: char) -> String {
    let mut out = String::with_capacity(body.len() * 2);
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next) if next == quote => {
                out.push('\\');
                out.push(next);
            }
            Some('\\') => out.push_str("\\\\\\\\"),
            Some(next) => {
                out.push_str("\\\\");
                out.push(next);
            }
            None => out.push_str("\\\\"),
        }
    }
    out
}
