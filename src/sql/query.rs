//! Structured SELECT that renders as either a data query or a COUNT query.

use crate::sql::dialect::Dialect;
use crate::sql::params::Value;

/// Rendered SQL plus its positional arguments.
#[derive(Clone, Debug)]
pub struct QueryBuf {
    pub dialect: Dialect,
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    pub fn new(dialect: Dialect) -> Self {
        QueryBuf {
            dialect,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push one argument; returns its 1-based number.
    pub fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }

    /// Push one argument and return the placeholder text for it.
    ///
    /// NULL is written as a literal and takes no argument slot: a bound NULL
    /// carries a type on Postgres, and a text NULL is rejected by non-text columns.
    pub fn bind(&mut self, v: Value) -> String {
        if v.is_null() {
            return "NULL".to_string();
        }
        let n = self.push_param(v);
        self.dialect.placeholder(n)
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Part {
    Text(String),
    Arg(Value),
}

/// SQL text with arguments kept inline, numbered only when rendered.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fragment {
    parts: Vec<Part>,
}

impl Fragment {
    pub fn new() -> Self {
        Fragment::default()
    }

    pub fn text(sql: impl Into<String>) -> Self {
        let mut f = Fragment::new();
        f.push_sql(sql);
        f
    }

    pub fn push_sql(&mut self, sql: impl Into<String>) {
        let sql = sql.into();
        if sql.is_empty() {
            return;
        }
        match self.parts.last_mut() {
            Some(Part::Text(prev)) => prev.push_str(&sql),
            _ => self.parts.push(Part::Text(sql)),
        }
    }

    pub fn push_arg(&mut self, v: Value) {
        self.parts.push(Part::Arg(v));
    }

    pub fn append(&mut self, other: Fragment) {
        for p in other.parts {
            match p {
                Part::Text(s) => self.push_sql(s),
                Part::Arg(v) => self.push_arg(v),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn arg_count(&self) -> usize {
        self.parts.iter().filter(|p| matches!(p, Part::Arg(_))).count()
    }

    fn write(&self, q: &mut QueryBuf) {
        for p in &self.parts {
            match p {
                Part::Text(s) => q.sql.push_str(s),
                Part::Arg(v) => {
                    let ph = q.bind(v.clone());
                    q.sql.push_str(&ph);
                }
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct SelectQuery {
    pub dialect: Dialect,
    /// Rendered projection items; empty selects `*`.
    pub columns: Vec<String>,
    pub from: Fragment,
    pub joins: Vec<String>,
    /// Metadata WHERE group (wheres, templates, ad-hoc filters).
    pub filter: Fragment,
    /// Required predicates ANDed outside the metadata group.
    pub extra: Vec<Fragment>,
    pub group_by: Vec<String>,
    pub having: Fragment,
    pub order_by: Vec<String>,
    /// (limit, offset)
    pub limit: Option<(u64, u64)>,
}

impl SelectQuery {
    pub fn new(dialect: Dialect, from: Fragment) -> Self {
        SelectQuery {
            dialect,
            columns: Vec::new(),
            from,
            joins: Vec::new(),
            filter: Fragment::new(),
            extra: Vec::new(),
            group_by: Vec::new(),
            having: Fragment::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn and_where(&mut self, predicate: Fragment) {
        if !predicate.is_empty() {
            self.extra.push(predicate);
        }
    }

    pub fn to_sql(&self) -> QueryBuf {
        let mut q = QueryBuf::new(self.dialect);
        self.write_body(&mut q);
        if !self.order_by.is_empty() {
            q.sql.push_str(" ORDER BY ");
            q.sql.push_str(&self.order_by.join(", "));
        }
        match self.limit {
            Some((limit, 0)) => q.sql.push_str(&format!(" LIMIT {}", limit)),
            Some((limit, offset)) => q.sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
            None => {}
        }
        q
    }

    /// `SELECT COUNT(*)` over the query without ORDER BY and LIMIT; same arguments.
    pub fn to_count_sql(&self) -> QueryBuf {
        let mut q = QueryBuf::new(self.dialect);
        q.sql.push_str("SELECT COUNT(*) FROM (");
        self.write_body(&mut q);
        q.sql.push_str(") AS total_rows");
        q
    }

    fn write_body(&self, q: &mut QueryBuf) {
        q.sql.push_str("SELECT ");
        if self.columns.is_empty() {
            q.sql.push('*');
        } else {
            q.sql.push_str(&self.columns.join(", "));
        }
        q.sql.push_str(" FROM ");
        self.from.write(q);
        for j in &self.joins {
            q.sql.push(' ');
            q.sql.push_str(j);
        }
        match (self.filter.is_empty(), self.extra.is_empty()) {
            (true, true) => {}
            (false, true) => {
                q.sql.push_str(" WHERE ");
                self.filter.write(q);
            }
            (filter_empty, false) => {
                q.sql.push_str(" WHERE ");
                if !filter_empty {
                    q.sql.push('(');
                    self.filter.write(q);
                    q.sql.push_str(") AND ");
                }
                for (i, p) in self.extra.iter().enumerate() {
                    if i > 0 {
                        q.sql.push_str(" AND ");
                    }
                    p.write(q);
                }
            }
        }
        if !self.group_by.is_empty() {
            q.sql.push_str(" GROUP BY ");
            q.sql.push_str(&self.group_by.join(", "));
        }
        if !self.having.is_empty() {
            q.sql.push_str(" HAVING ");
            self.having.write(q);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users(dialect: Dialect) -> SelectQuery {
        let mut s = SelectQuery::new(dialect, Fragment::text(dialect.quote("user")));
        s.columns = vec![dialect.quote("id"), dialect.quote("name")];
        let mut f = Fragment::text(format!("{} > ", dialect.quote("age")));
        f.push_arg(Value::Int(18));
        s.filter = f;
        s.order_by = vec![format!("{} ASC", dialect.quote("id"))];
        s.limit = Some((10, 20));
        s
    }

    #[test]
    fn data_and_count_share_arguments() {
        let s = users(Dialect::MySql);
        let data = s.to_sql();
        assert_eq!(
            data.sql,
            "SELECT `id`, `name` FROM `user` WHERE `age` > ? ORDER BY `id` ASC LIMIT 10 OFFSET 20"
        );
        let count = s.to_count_sql();
        assert_eq!(
            count.sql,
            "SELECT COUNT(*) FROM (SELECT `id`, `name` FROM `user` WHERE `age` > ?) AS total_rows"
        );
        assert_eq!(data.params, count.params);
    }

    #[test]
    fn extra_predicates_wrap_the_metadata_group() {
        let mut s = users(Dialect::Postgres);
        let mut pk = Fragment::text("\"user\".\"id\" = ");
        pk.push_arg(Value::Int(7));
        s.and_where(pk);
        s.order_by.clear();
        s.limit = None;
        let q = s.to_sql();
        assert_eq!(
            q.sql,
            "SELECT \"id\", \"name\" FROM \"user\" WHERE (\"age\" > $1) AND \"user\".\"id\" = $2"
        );
        assert_eq!(q.params, vec![Value::Int(18), Value::Int(7)]);
    }

    #[test]
    fn null_arguments_render_as_literals() {
        let mut q = QueryBuf::new(Dialect::Postgres);
        let slots = vec![q.bind(Value::Int(1)), q.bind(Value::Null), q.bind(Value::from("x"))];
        assert_eq!(slots, vec!["$1", "NULL", "$2"]);
        assert_eq!(q.params, vec![Value::Int(1), Value::from("x")]);
    }

    #[test]
    fn empty_projection_selects_star() {
        let s = SelectQuery::new(Dialect::Ansi, Fragment::text("\"t\""));
        assert_eq!(s.to_sql().sql, "SELECT * FROM \"t\"");
    }
}
