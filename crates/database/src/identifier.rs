use std::sync::LazyLock;

use regex::Regex;
use xiyan_core::Dialect;

use crate::DbError;

#[expect(clippy::unwrap_used, reason = "static regex literal")]
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(\.[A-Za-z_][A-Za-z0-9_$]*)?$").unwrap());

/// Accepts `table` or `schema.table`.
pub(crate) fn validate_table_name(name: &str) -> Result<&str, DbError> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(DbError::InvalidIdentifier(name.to_owned()))
    }
}

/// Quotes each dot-separated part for the dialect.
pub(crate) fn quote_ident(dialect: Dialect, name: &str) -> String {
    name.split('.')
        .map(|part| match dialect {
            Dialect::Mysql => format!("`{}`", part.replace('`', "``")),
            Dialect::Postgresql | Dialect::Sqlite => format!("\"{}\"", part.replace('"', "\"\"")),
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Expression casting `expr` to the dialect's text type.
pub(crate) fn text_cast(dialect: Dialect, expr: &str) -> String {
    match dialect {
        Dialect::Mysql => format!("CAST({expr} AS CHAR)"),
        Dialect::Postgresql | Dialect::Sqlite => format!("CAST({expr} AS TEXT)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("sys_user").is_ok());
        assert!(validate_table_name("public.orders").is_ok());
        assert!(validate_table_name("users; DROP TABLE users").is_err());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("1abc").is_err());
    }

    #[test]
    fn test_quote_ident_per_dialect() {
        assert_eq!(quote_ident(Dialect::Mysql, "sys_user"), "`sys_user`");
        assert_eq!(quote_ident(Dialect::Postgresql, "public.orders"), "\"public\".\"orders\"");
        assert_eq!(quote_ident(Dialect::Sqlite, "we\"ird"), "\"we\"\"ird\"");
    }
}
