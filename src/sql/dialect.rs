//! Datasource kinds and their identifier quoting / placeholder style.

use crate::error::ConfigError;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbKind {
    MySql,
    MariaDb,
    TiDb,
    OceanBase,
    Doris,
    StarRocks,
    ClickHouse,
    Postgres,
    OpenGauss,
    Kingbase,
    Sqlite,
    SqlServer,
    Oracle,
    Dameng,
    MongoDb,
    Redis,
}

impl FromStr for DbKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "mysql" => DbKind::MySql,
            "mariadb" => DbKind::MariaDb,
            "tidb" => DbKind::TiDb,
            "oceanbase" => DbKind::OceanBase,
            "doris" => DbKind::Doris,
            "starrocks" => DbKind::StarRocks,
            "clickhouse" => DbKind::ClickHouse,
            "postgres" | "postgresql" | "pg" => DbKind::Postgres,
            "opengauss" => DbKind::OpenGauss,
            "kingbase" => DbKind::Kingbase,
            "sqlite" | "sqlite3" => DbKind::Sqlite,
            "sqlserver" | "sql server" | "mssql" => DbKind::SqlServer,
            "oracle" => DbKind::Oracle,
            "dm" | "dameng" => DbKind::Dameng,
            "mongodb" | "mongo" => DbKind::MongoDb,
            "redis" => DbKind::Redis,
            _ => return Err(ConfigError::UnsupportedConnectionKind(s.to_string())),
        })
    }
}

impl DbKind {
    pub fn dialect(self) -> Dialect {
        match self {
            DbKind::MySql
            | DbKind::MariaDb
            | DbKind::TiDb
            | DbKind::OceanBase
            | DbKind::Doris
            | DbKind::StarRocks
            | DbKind::ClickHouse => Dialect::MySql,
            DbKind::Postgres | DbKind::OpenGauss | DbKind::Kingbase => Dialect::Postgres,
            _ => Dialect::Ansi,
        }
    }

    /// URL scheme of the sqlx driver that can open this kind, if any.
    pub fn driver_scheme(self) -> Option<&'static str> {
        match self {
            DbKind::MySql
            | DbKind::MariaDb
            | DbKind::TiDb
            | DbKind::OceanBase
            | DbKind::Doris
            | DbKind::StarRocks => Some("mysql"),
            DbKind::Postgres | DbKind::OpenGauss | DbKind::Kingbase => Some("postgres"),
            DbKind::Sqlite => Some("sqlite"),
            _ => None,
        }
    }
}

/// SQL text conventions. `Ansi` covers SQLite, SQL Server, Oracle and DM.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Dialect {
    #[default]
    MySql,
    Postgres,
    Ansi,
}

impl Dialect {
    pub fn quote(self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
            _ => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// `schema.table`, or just the table when no schema is set.
    pub fn qualified_table(self, schema: &str, table: &str) -> String {
        if schema.is_empty() {
            self.quote(table)
        } else {
            format!("{}.{}", self.quote(schema), self.quote(table))
        }
    }

    /// Column reference, qualified by table when one is given.
    pub fn column(self, table: &str, column: &str) -> String {
        if table.is_empty() {
            self.quote(column)
        } else {
            format!("{}.{}", self.quote(table), self.quote(column))
        }
    }

    /// Placeholder for the 1-based argument `n`.
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", n),
            _ => "?".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_case_insensitive_and_map_to_families() {
        assert_eq!("PostgreSQL".parse::<DbKind>().unwrap(), DbKind::Postgres);
        assert_eq!(" TiDB ".parse::<DbKind>().unwrap().dialect(), Dialect::MySql);
        assert_eq!("kingbase".parse::<DbKind>().unwrap().dialect(), Dialect::Postgres);
        assert_eq!("dm".parse::<DbKind>().unwrap().dialect(), Dialect::Ansi);
        assert!("db2".parse::<DbKind>().is_err());
    }

    #[test]
    fn only_sql_drivers_have_a_scheme() {
        assert_eq!(DbKind::Doris.driver_scheme(), Some("mysql"));
        assert_eq!(DbKind::Sqlite.driver_scheme(), Some("sqlite"));
        assert_eq!(DbKind::Redis.driver_scheme(), None);
        assert_eq!(DbKind::Oracle.driver_scheme(), None);
    }

    #[test]
    fn quoting_and_placeholders() {
        assert_eq!(Dialect::MySql.column("u", "name"), "`u`.`name`");
        assert_eq!(Dialect::Postgres.qualified_table("app", "user"), "\"app\".\"user\"");
        assert_eq!(Dialect::Ansi.quote("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
        assert_eq!(Dialect::Ansi.placeholder(3), "?");
    }
}
