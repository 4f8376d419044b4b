//! Safe SQL identifier handling.
//!
//! Every name that ends up in generated SQL text (tables, aliases, columns and
//! result aliases) goes through [`Ident`]. A name is accepted only when it matches
//! `[A-Za-z_][A-Za-z0-9_]*`; anything else is a [`CtxError::Security`] and no SQL
//! is produced. Accepted names are rendered double-quoted so mixed-case catalog
//! names survive PostgreSQL case folding.
//!
//! # Example
//! ```ignore
//! use pgctx::Ident;
//!
//! let col = Ident::parse("UnitPrice")?;
//! assert_eq!(col.to_sql(), r#""UnitPrice""#);
//! assert!(Ident::parse("bad alias").is_err());
//! # Ok::<(), pgctx::CtxError>(())
//! ```

use crate::error::{CtxError, CtxResult};
use std::fmt;

/// A validated, single-part SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident(String);

impl Ident {
    /// Validate `s` and wrap it.
    pub fn parse(s: &str) -> CtxResult<Self> {
        if is_safe_ident(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(CtxError::security(format!("Invalid SQL identifier: {s}")))
        }
    }

    /// The unquoted name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render the identifier as SQL.
    pub fn to_sql(&self) -> String {
        let mut out = String::with_capacity(self.0.len() + 2);
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        // Validated names never contain '"', so no escaping is needed.
        out.push('"');
        out.push_str(&self.0);
        out.push('"');
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether `s` matches `^[A-Za-z_][A-Za-z0-9_]*$`.
pub fn is_safe_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Validate and quote an identifier in one step.
pub fn quote_ident(s: &str) -> CtxResult<String> {
    Ident::parse(s).map(|ident| ident.to_sql())
}
