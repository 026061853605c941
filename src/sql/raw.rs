//! Hand-written SQL models: `:name` parameters and the text safety check.

use crate::error::EngineError;
use crate::sql::builder::Params;
use crate::sql::dialect::Dialect;
use crate::sql::params::Value;
use crate::sql::query::Fragment;

/// Replace `:name` with a bound argument wherever `name` is in `params`.
///
/// Unknown names are left as written. `::` casts and quoted identifiers are not
/// touched. Inside a string literal a known parameter splits the literal into a
/// concatenation (`CONCAT('a', ?, 'b')` on MySQL, `('a' || ? || 'b')` elsewhere).
pub fn substitute_params(sql: &str, params: &Params, dialect: Dialect) -> Fragment {
    let bytes = sql.as_bytes();
    let mut out = Fragment::new();
    let mut pending = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                out.push_sql(&sql[pending..i]);
                let (content, next) = read_literal(sql, i);
                write_literal(&mut out, &content, params, dialect);
                i = next;
                pending = i;
            }
            q @ (b'"' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != q {
                    i += 1;
                }
                i += 1;
            }
            b':' if bytes.get(i + 1) == Some(&b':') => i += 2,
            b':' => {
                let start = i + 1;
                let end = ident_end(bytes, start);
                match params.get(&sql[start..end]) {
                    Some(v) if end > start => {
                        out.push_sql(&sql[pending..i]);
                        out.push_arg(Value::from_json(v));
                        i = end;
                        pending = i;
                    }
                    _ => i += 1,
                }
            }
            _ => i += 1,
        }
    }
    out.push_sql(&sql[pending.min(sql.len())..]);
    out
}

fn ident_end(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() {
        let c = bytes[end];
        let ok = c == b'_' || c.is_ascii_alphabetic() || (end > start && c.is_ascii_digit());
        if !ok {
            break;
        }
        end += 1;
    }
    end
}

/// Unescaped literal body starting at the opening quote, and the index after the closing one.
fn read_literal(sql: &str, open: usize) -> (String, usize) {
    let bytes = sql.as_bytes();
    let mut content = String::new();
    let mut i = open + 1;
    let mut run = i;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            content.push_str(&sql[run..i]);
            if bytes.get(i + 1) == Some(&b'\'') {
                content.push('\'');
                i += 2;
                run = i;
                continue;
            }
            return (content, i + 1);
        }
        i += 1;
    }
    content.push_str(&sql[run..]);
    (content, bytes.len())
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

enum Piece {
    Text(String),
    Arg(Value),
}

fn write_literal(out: &mut Fragment, content: &str, params: &Params, dialect: Dialect) {
    let bytes = content.as_bytes();
    let mut pieces = Vec::new();
    let mut last = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b':' {
            i += 1;
            continue;
        }
        let end = ident_end(bytes, i + 1);
        match params.get(&content[i + 1..end]) {
            Some(v) if end > i + 1 => {
                if i > last {
                    pieces.push(Piece::Text(content[last..i].to_string()));
                }
                pieces.push(Piece::Arg(Value::from_json(v)));
                last = end;
                i = end;
            }
            _ => i += 1,
        }
    }
    if pieces.is_empty() {
        out.push_sql(quote_literal(content));
        return;
    }
    if last < content.len() {
        pieces.push(Piece::Text(content[last..].to_string()));
    }
    let (open, sep) = match dialect {
        Dialect::MySql => ("CONCAT(", ", "),
        _ => ("(", " || "),
    };
    out.push_sql(open);
    for (n, p) in pieces.into_iter().enumerate() {
        if n > 0 {
            out.push_sql(sep);
        }
        match p {
            Piece::Text(t) => out.push_sql(quote_literal(&t)),
            Piece::Arg(v) => out.push_arg(v),
        }
    }
    out.push_sql(")");
}

const DANGEROUS_KEYWORDS: &[&str] = &["DROP", "TRUNCATE", "ALTER", "GRANT", "REVOKE", "SHUTDOWN", "EXEC"];

/// Reject multiple statements, dangerous keywords and unbalanced parentheses.
/// Quoted identifiers and string literals are not inspected.
pub fn validate_sql(sql: &str) -> Result<(), EngineError> {
    let bare = strip_quoted(sql.trim())?;
    let trimmed = bare.trim();
    let semis = trimmed.matches(';').count();
    if semis > 1 || (semis == 1 && !trimmed.ends_with(';')) {
        return Err(EngineError::Unsafe("multiple SQL statements are not allowed".into()));
    }
    let upper = trimmed.to_uppercase();
    let words = upper.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'));
    for word in words {
        if let Some(kw) = DANGEROUS_KEYWORDS.iter().find(|kw| **kw == word) {
            return Err(EngineError::Unsafe(format!("dangerous SQL keyword detected: {}", kw)));
        }
    }
    if trimmed.matches('(').count() != trimmed.matches(')').count() {
        return Err(EngineError::Unsafe("unbalanced parentheses in SQL".into()));
    }
    Ok(())
}

/// The text with every quoted span replaced by one space. A doubled quote escapes itself.
fn strip_quoted(sql: &str) -> Result<String, EngineError> {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        if !matches!(c, '\'' | '"' | '`') {
            out.push(c);
            continue;
        }
        let mut closed = false;
        while let Some(n) = chars.next() {
            if n != c {
                continue;
            }
            if chars.peek() == Some(&c) {
                chars.next();
                continue;
            }
            closed = true;
            break;
        }
        if !closed {
            return Err(EngineError::Unsafe("unterminated quote in SQL".into()));
        }
        out.push(' ');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::query::{QueryBuf, SelectQuery};
    use serde_json::json;

    fn params(v: serde_json::Value) -> Params {
        v.as_object().cloned().unwrap_or_default()
    }

    fn render(f: Fragment, dialect: Dialect) -> QueryBuf {
        let mut s = SelectQuery::new(dialect, f);
        s.columns = vec!["1".into()];
        let q = s.to_sql();
        QueryBuf {
            sql: q.sql.trim_start_matches("SELECT 1 FROM ").to_string(),
            ..q
        }
    }

    #[test]
    fn known_names_become_placeholders() {
        let p = params(json!({"status": 1, "name": "x"}));
        let f = substitute_params(
            "SELECT * FROM t WHERE status = :status AND owner = :owner AND v::text = :name",
            &p,
            Dialect::Postgres,
        );
        let q = render(f, Dialect::Postgres);
        assert_eq!(
            q.sql,
            "SELECT * FROM t WHERE status = $1 AND owner = :owner AND v::text = $2"
        );
        assert_eq!(q.params, vec![Value::Int(1), Value::String("x".into())]);
    }

    #[test]
    fn literals_with_params_are_concatenated() {
        let p = params(json!({"name": "bob"}));
        let sql = "SELECT * FROM t WHERE n LIKE '%:name%' AND note = 'it''s :other'";
        let q = render(substitute_params(sql, &p, Dialect::MySql), Dialect::MySql);
        assert_eq!(
            q.sql,
            "SELECT * FROM t WHERE n LIKE CONCAT('%', ?, '%') AND note = 'it''s :other'"
        );
        let q = render(substitute_params(sql, &p, Dialect::Ansi), Dialect::Ansi);
        assert!(q.sql.contains("LIKE ('%' || ? || '%')"));
        assert_eq!(q.params, vec![Value::String("bob".into())]);
    }

    #[test]
    fn quoted_identifiers_are_skipped() {
        let p = params(json!({"x": 1}));
        let f = substitute_params("SELECT \":x\", `:x` FROM t", &p, Dialect::MySql);
        assert_eq!(f.arg_count(), 0);
    }

    #[test]
    fn unsafe_text_is_rejected() {
        assert!(validate_sql("SELECT 1;").is_ok());
        assert!(validate_sql("SELECT 1; SELECT 2").is_err());
        assert!(validate_sql("DROP TABLE users").is_err());
        assert!(validate_sql("SELECT * FROM t WHERE x = 1 OR 1=1 ; TRUNCATE t").is_err());
        assert!(validate_sql("SELECT COUNT(* FROM t").is_err());
        assert!(validate_sql("SELECT `exec_time` FROM jobs").is_ok());
    }

    #[test]
    fn quoted_spans_are_not_inspected() {
        assert!(validate_sql("SELECT `exec`, \"grant\" FROM perms").is_ok());
        assert!(validate_sql("SELECT * FROM notes WHERE body = 'drop; it''s (fine'").is_ok());
        assert!(validate_sql("SELECT \"a\"\"b\" FROM t; DROP TABLE t").is_err());
        assert!(validate_sql("SELECT 'open FROM t").is_err());
    }
}
