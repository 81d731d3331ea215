//! Dialect-aware SQL rendering.
//!
//! Rendering is the only place values become SQL text, so every literal goes
//! through [`literal`] and every identifier through [`quote_identifier`].
//! A [`Renderer`] walks an expression tree (and the datasets nested in it),
//! writing into a single buffer and recording every placeholder it emits.
//!
//! ```rust
//! use strata_query::{col, render, Dialect};
//!
//! let expr = col("name").eq("O'Brien");
//! assert_eq!(render(&expr, &Dialect::GENERIC).unwrap(), "(name = 'O''Brien')");
//! assert_eq!(render(&expr, &Dialect::MYSQL).unwrap(), "(`name` = 'O\\'Brien')");
//! ```

use std::borrow::Cow;
use std::fmt::Write as _;

use indexmap::IndexSet;

use crate::dialect::{
    BlobStyle, CaseFold, ConcatStyle, Dialect, PlaceholderStyle, QuotePolicy, StringEscape,
    TemporalStyle,
};
use crate::error::{QueryError, QueryResult};
use crate::expr::{Expr, NullsOrder, Operator};
use crate::value::Value;

/// Render an expression for a dialect.
pub fn render(expr: &Expr, dialect: &Dialect) -> QueryResult<String> {
    Renderer::new(dialect).expr(expr)
}

/// Check if an identifier must be quoted under [`QuotePolicy::WhenNeeded`].
pub fn needs_quoting(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "user", "order", "group", "select", "from", "where", "table", "index", "key", "primary",
        "foreign", "check", "default", "null", "not", "and", "or", "in", "is", "like", "between",
        "case", "when", "then", "else", "end", "as", "on", "join", "left", "right", "inner",
        "outer", "cross", "natural", "using", "limit", "offset", "union", "intersect", "except",
        "all", "distinct", "having", "create", "alter", "drop", "insert", "update", "delete",
        "into", "values", "set", "returning", "true", "false",
    ];

    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        return true;
    }
    if RESERVED.contains(&name.to_lowercase().as_str()) {
        return true;
    }
    !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Fold and quote an identifier according to the dialect.
pub fn quote_identifier(name: &str, dialect: &Dialect) -> String {
    let folded: Cow<'_, str> = match dialect.case_fold {
        CaseFold::None => Cow::Borrowed(name),
        CaseFold::Lower => Cow::Owned(name.to_lowercase()),
        CaseFold::Upper => Cow::Owned(name.to_uppercase()),
    };

    let quote = match dialect.quoting {
        QuotePolicy::Always => true,
        QuotePolicy::WhenNeeded => needs_quoting(&folded),
        QuotePolicy::Never => false,
    };
    if !quote {
        return folded.into_owned();
    }

    let (open, close) = dialect.identifier_quote;
    let mut out = String::with_capacity(folded.len() + 2);
    out.push(open);
    for c in folded.chars() {
        // Doubling the closing quote is the only escape identifiers have.
        if c == close {
            out.push(close);
        }
        out.push(c);
    }
    out.push(close);
    out
}

/// Quote and escape a string literal.
pub fn quote_string(s: &str, dialect: &Dialect) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    match dialect.string_escape {
        StringEscape::Doubling => {
            for c in s.chars() {
                if c == '\'' {
                    out.push('\'');
                }
                out.push(c);
            }
        }
        StringEscape::Backslash => {
            for c in s.chars() {
                match c {
                    '\'' => out.push_str("\\'"),
                    '\\' => out.push_str("\\\\"),
                    '\0' => out.push_str("\\0"),
                    c => out.push(c),
                }
            }
        }
    }
    out.push('\'');
    out
}

/// Render a value as an inline SQL literal.
pub fn literal(value: &Value, dialect: &Dialect) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => {
            let (t, f) = dialect.bool_literals;
            (if *b { t } else { f }).to_string()
        }
        Value::Int(i) => i.to_string(),
        Value::Float(f) => float_literal(*f, dialect),
        Value::Decimal(d) => d.to_string(),
        Value::String(s) => quote_string(s, dialect),
        Value::Blob(bytes) => blob_literal(bytes, dialect),
        Value::Date(d) => temporal(dialect, "DATE", &d.format("%Y-%m-%d").to_string()),
        Value::Time(t) => temporal(dialect, "TIME", &t.format("%H:%M:%S%.f").to_string()),
        Value::Timestamp(ts) => temporal(
            dialect,
            "TIMESTAMP",
            &ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        ),
        Value::TimestampTz(ts) => temporal(
            dialect,
            "TIMESTAMP WITH TIME ZONE",
            &ts.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string(),
        ),
        Value::Json(json) => quote_string(&json.to_string(), dialect),
        Value::List(items) if items.is_empty() => "(NULL)".to_string(),
        Value::List(items) => {
            let rendered: Vec<String> = items.iter().map(|v| literal(v, dialect)).collect();
            format!("({})", rendered.join(", "))
        }
    }
}

fn float_literal(f: f64, dialect: &Dialect) -> String {
    if f.is_nan() {
        quote_string("NaN", dialect)
    } else if f.is_infinite() {
        quote_string(if f > 0.0 { "Infinity" } else { "-Infinity" }, dialect)
    } else {
        // Debug formatting keeps a decimal point on whole numbers.
        format!("{:?}", f)
    }
}

fn temporal(dialect: &Dialect, keyword: &str, text: &str) -> String {
    match dialect.temporal_style {
        TemporalStyle::Ansi => format!("{} '{}'", keyword, text),
        TemporalStyle::Quoted => format!("'{}'", text),
    }
}

fn blob_literal(bytes: &[u8], dialect: &Dialect) -> String {
    let hex = |upper: bool| {
        bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
            if upper {
                let _ = write!(s, "{:02X}", b);
            } else {
                let _ = write!(s, "{:02x}", b);
            }
            s
        })
    };

    match dialect.blob_style {
        BlobStyle::XHex => format!("X'{}'", hex(true)),
        BlobStyle::ZeroXHex => format!("0x{}", hex(true)),
        BlobStyle::ByteaHex => format!("'\\x{}'::bytea", hex(false)),
        BlobStyle::HexToRaw => format!("HEXTORAW('{}')", hex(true)),
        BlobStyle::ByteaOctal => {
            let mut out = String::from("'");
            for &b in bytes {
                match b {
                    b'\'' => out.push_str("''"),
                    b'\\' => out.push_str("\\\\"),
                    0x20..=0x7e => out.push(b as char),
                    _ => {
                        let _ = write!(out, "\\{:03o}", b);
                    }
                }
            }
            out.push_str("'::bytea");
            out
        }
    }
}

/// Renders expressions and datasets into one buffer, collecting the
/// placeholders emitted along the way.
///
/// Nested subqueries are rendered by the same renderer so placeholder
/// numbering continues across them.
#[derive(Debug)]
pub struct Renderer<'d> {
    dialect: &'d Dialect,
    occurrences: Vec<String>,
    names: IndexSet<String>,
}

impl<'d> Renderer<'d> {
    /// Create a renderer for a dialect.
    pub fn new(dialect: &'d Dialect) -> Self {
        Self {
            dialect,
            occurrences: Vec::new(),
            names: IndexSet::new(),
        }
    }

    /// The dialect being rendered.
    pub fn dialect(&self) -> &'d Dialect {
        self.dialect
    }

    /// Placeholder names in the order they appear in the SQL text.
    pub fn occurrences(&self) -> &[String] {
        &self.occurrences
    }

    /// Distinct placeholder names in first-appearance order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Render an expression to a new string.
    pub fn expr(&mut self, expr: &Expr) -> QueryResult<String> {
        let mut out = String::new();
        self.write_expr(&mut out, expr)?;
        Ok(out)
    }

    pub(crate) fn ident(&self, name: &str) -> String {
        quote_identifier(name, self.dialect)
    }

    pub(crate) fn write_list(&mut self, out: &mut String, exprs: &[Expr]) -> QueryResult<()> {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_expr(out, expr)?;
        }
        Ok(())
    }

    /// Write an expression in table position (FROM, JOIN, modify targets).
    pub(crate) fn write_table(&mut self, out: &mut String, table: &Expr) -> QueryResult<()> {
        match table {
            Expr::Identifier {
                name,
                table: schema,
                alias: Some(alias),
            } => {
                if let Some(schema) = schema {
                    out.push_str(&self.ident(schema));
                    out.push('.');
                }
                out.push_str(&self.ident(name));
                self.write_table_alias(out, alias);
            }
            Expr::Aliased { expr, alias } => {
                self.write_expr(out, expr)?;
                self.write_table_alias(out, alias);
            }
            other => self.write_expr(out, other)?,
        }
        Ok(())
    }

    pub(crate) fn write_table_list(&mut self, out: &mut String, tables: &[Expr]) -> QueryResult<()> {
        for (i, table) in tables.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_table(out, table)?;
        }
        Ok(())
    }

    fn write_table_alias(&self, out: &mut String, alias: &str) {
        out.push_str(if self.dialect.table_alias_as { " AS " } else { " " });
        out.push_str(&self.ident(alias));
    }

    pub(crate) fn write_expr(&mut self, out: &mut String, expr: &Expr) -> QueryResult<()> {
        match expr {
            Expr::Literal(value) => out.push_str(&literal(value, self.dialect)),
            Expr::Identifier { name, table, alias } => {
                if let Some(table) = table {
                    out.push_str(&self.ident(table));
                    out.push('.');
                }
                out.push_str(&self.ident(name));
                if let Some(alias) = alias {
                    out.push_str(" AS ");
                    out.push_str(&self.ident(alias));
                }
            }
            Expr::BinaryOp { op, left, right } => self.write_binary(out, *op, left, right)?,
            Expr::NaryOp { op, operands } => {
                if !op.accepts(operands.len()) {
                    return Err(QueryError::operator_arity(op.as_str(), operands.len()));
                }
                self.write_operation(out, *op, operands.iter())?;
            }
            Expr::Not(inner) => {
                out.push_str("NOT ");
                self.write_expr(out, inner)?;
            }
            Expr::FunctionCall {
                name,
                args,
                distinct,
            } => {
                out.push_str(name);
                out.push('(');
                if *distinct {
                    out.push_str("DISTINCT ");
                }
                self.write_list(out, args)?;
                out.push(')');
            }
            Expr::Case { branches, default } => {
                if branches.is_empty() {
                    return Err(QueryError::invalid_operation(
                        "CASE",
                        "at least one WHEN branch is required",
                    ));
                }
                out.push_str("(CASE");
                for (condition, result) in branches {
                    out.push_str(" WHEN ");
                    self.write_expr(out, condition)?;
                    out.push_str(" THEN ");
                    self.write_expr(out, result)?;
                }
                if let Some(default) = default {
                    out.push_str(" ELSE ");
                    self.write_expr(out, default)?;
                }
                out.push_str(" END)");
            }
            Expr::Subscript { expr, indexes } => {
                self.write_expr(out, expr)?;
                out.push('[');
                self.write_list(out, indexes)?;
                out.push(']');
            }
            Expr::Ordered { expr, desc, nulls } => {
                self.write_expr(out, expr)?;
                out.push_str(if *desc { " DESC" } else { " ASC" });
                if let Some(nulls) = nulls {
                    let clause = match nulls {
                        NullsOrder::First => "NULLS FIRST",
                        NullsOrder::Last => "NULLS LAST",
                    };
                    if !self.dialect.supports_nulls_ordering {
                        return Err(QueryError::unsupported_operator(clause, self.dialect.name));
                    }
                    out.push(' ');
                    out.push_str(clause);
                }
            }
            Expr::Aliased { expr, alias } => {
                self.write_expr(out, expr)?;
                out.push_str(" AS ");
                out.push_str(&self.ident(alias));
            }
            Expr::Subquery(dataset) => {
                out.push('(');
                dataset.write_select(self, out)?;
                out.push(')');
            }
            Expr::Placeholder(name) => self.write_placeholder(out, name),
            Expr::Wildcard(None) => out.push('*'),
            Expr::Wildcard(Some(table)) => {
                out.push_str(&self.ident(table));
                out.push_str(".*");
            }
            Expr::Raw(sql) => out.push_str(sql),
            Expr::PlaceholderLiteral { sql, args } => {
                let markers = sql.matches('?').count();
                if markers != args.len() {
                    return Err(QueryError::invalid_parameter(format!(
                        "{} arguments supplied for {} placeholders",
                        args.len(),
                        markers
                    ))
                    .with_sql(sql.clone()));
                }
                let mut args = args.iter().peekable();
                for c in sql.chars() {
                    match (c, args.next_if(|_| c == '?')) {
                        (_, Some(arg)) => self.write_expr(out, arg)?,
                        (c, None) => out.push(c),
                    }
                }
            }
        }
        Ok(())
    }

    fn write_binary(
        &mut self,
        out: &mut String,
        op: Operator,
        left: &Expr,
        right: &Expr,
    ) -> QueryResult<()> {
        if matches!(op, Operator::In | Operator::NotIn) {
            if let Expr::Literal(Value::List(items)) = right {
                if items.is_empty() {
                    // Nothing is IN an empty set.
                    out.push_str(if op == Operator::In { "(1 = 0)" } else { "(1 = 1)" });
                    return Ok(());
                }
            }
            out.push('(');
            self.write_expr(out, left)?;
            out.push(' ');
            out.push_str(op.as_str());
            out.push(' ');
            match right {
                Expr::Placeholder(_) => {
                    out.push('(');
                    self.write_expr(out, right)?;
                    out.push(')');
                }
                Expr::Literal(value) if !matches!(value, Value::List(_)) => {
                    out.push('(');
                    self.write_expr(out, right)?;
                    out.push(')');
                }
                _ => self.write_expr(out, right)?,
            }
            out.push(')');
            return Ok(());
        }

        self.write_operation(out, op, [left, right].into_iter())
    }

    fn write_operation<'e>(
        &mut self,
        out: &mut String,
        op: Operator,
        operands: impl Iterator<Item = &'e Expr>,
    ) -> QueryResult<()> {
        if op == Operator::Concat && self.dialect.concat == ConcatStyle::Function {
            out.push_str("CONCAT(");
            for (i, operand) in operands.enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                self.write_expr(out, operand)?;
            }
            out.push(')');
            return Ok(());
        }

        let token = self.operator_token(op)?;
        out.push('(');
        for (i, operand) in operands.enumerate() {
            if i > 0 {
                out.push(' ');
                out.push_str(token);
                out.push(' ');
            }
            self.write_expr(out, operand)?;
        }
        out.push(')');
        Ok(())
    }

    fn operator_token(&self, op: Operator) -> QueryResult<&'static str> {
        let dialect = self.dialect;
        match op {
            Operator::ILike | Operator::NotILike if !dialect.supports_ilike => {
                Err(QueryError::unsupported_operator(op.as_str(), dialect.name))
            }
            Operator::Regex | Operator::NotRegex => match dialect.regex_operators {
                Some((matches, not_matches)) => Ok(if op == Operator::Regex {
                    matches
                } else {
                    not_matches
                }),
                None => Err(QueryError::unsupported_operator("regex match", dialect.name)),
            },
            Operator::Concat => match dialect.concat {
                ConcatStyle::Operator(token) => Ok(token),
                ConcatStyle::Function => Ok("||"),
            },
            _ => Ok(op.as_str()),
        }
    }

    fn write_placeholder(&mut self, out: &mut String, name: &str) {
        self.occurrences.push(name.to_string());
        let (index, _) = self.names.insert_full(name.to_string());
        match self.dialect.placeholder_style {
            PlaceholderStyle::Question => out.push('?'),
            PlaceholderStyle::Numbered => {
                let _ = write!(out, "${}", index + 1);
            }
            PlaceholderStyle::Colon => {
                out.push(':');
                out.push_str(name);
            }
            PlaceholderStyle::At => {
                out.push('@');
                out.push_str(name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{case, col, count_all, func, lit, placeholder, qualified, raw_with};
    use chrono::{NaiveDate, TimeZone};
    use pretty_assertions::assert_eq;

    fn generic(expr: &Expr) -> String {
        render(expr, &Dialect::GENERIC).unwrap()
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(literal(&"it's".into(), &Dialect::GENERIC), "'it''s'");
        assert_eq!(literal(&"a\\'b".into(), &Dialect::MYSQL), "'a\\\\\\'b'");
        // An injection attempt stays inside one literal.
        let evil = "x'; DROP TABLE items; --";
        assert_eq!(
            literal(&evil.into(), &Dialect::POSTGRES),
            "'x''; DROP TABLE items; --'"
        );
    }

    #[test]
    fn test_boolean_tokens() {
        assert_eq!(literal(&true.into(), &Dialect::GENERIC), "TRUE");
        assert_eq!(literal(&true.into(), &Dialect::POSTGRES), "true");
        assert_eq!(literal(&false.into(), &Dialect::SQLITE), "0");
    }

    #[test]
    fn test_numbers() {
        assert_eq!(literal(&Value::Int(-42), &Dialect::GENERIC), "-42");
        assert_eq!(literal(&Value::Float(1.0), &Dialect::GENERIC), "1.0");
        assert_eq!(literal(&Value::Float(f64::NAN), &Dialect::GENERIC), "'NaN'");
        assert_eq!(
            literal(&Value::Float(f64::NEG_INFINITY), &Dialect::GENERIC),
            "'-Infinity'"
        );
        let d = rust_decimal::Decimal::new(12345, 2);
        assert_eq!(literal(&d.into(), &Dialect::GENERIC), "123.45");
    }

    #[test]
    fn test_blob_styles() {
        let blob = Value::blob(vec![0xde, 0xad, b'\'', 0x07]);
        assert_eq!(literal(&blob, &Dialect::GENERIC), "X'DEAD2707'");
        assert_eq!(literal(&blob, &Dialect::MYSQL), "0xDEAD2707");
        assert_eq!(literal(&blob, &Dialect::POSTGRES), "'\\xdead2707'::bytea");
        assert_eq!(literal(&blob, &Dialect::ORACLE), "HEXTORAW('DEAD2707')");
        let octal = Dialect {
            blob_style: BlobStyle::ByteaOctal,
            ..Dialect::POSTGRES
        };
        assert_eq!(literal(&blob, &octal), "'\\336\\255''\\007'::bytea");
    }

    #[test]
    fn test_temporal_precision() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_micro_opt(8, 5, 1, 250_000)
            .unwrap();
        assert_eq!(
            literal(&ts.into(), &Dialect::GENERIC),
            "TIMESTAMP '2024-03-09 08:05:01.250'"
        );
        assert_eq!(
            literal(&ts.into(), &Dialect::MYSQL),
            "'2024-03-09 08:05:01.250'"
        );
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(literal(&date.into(), &Dialect::POSTGRES), "DATE '2024-01-02'");

        let offset = chrono::FixedOffset::east_opt(3600).unwrap();
        let tz = offset.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            literal(&tz.into(), &Dialect::POSTGRES),
            "TIMESTAMP WITH TIME ZONE '2024-01-02 03:04:05+01:00'"
        );
    }

    #[test]
    fn test_json_and_lists() {
        let json = serde_json::json!({"a": "b'c"});
        assert_eq!(literal(&json.into(), &Dialect::GENERIC), "'{\"a\":\"b''c\"}'");
        assert_eq!(
            literal(&Value::from(vec![1, 2, 3]), &Dialect::GENERIC),
            "(1, 2, 3)"
        );
    }

    #[test]
    fn test_identifier_quoting_policies() {
        assert_eq!(quote_identifier("items", &Dialect::GENERIC), "items");
        assert_eq!(quote_identifier("order", &Dialect::GENERIC), "\"order\"");
        assert_eq!(quote_identifier("1st", &Dialect::GENERIC), "\"1st\"");
        assert_eq!(quote_identifier("items", &Dialect::MYSQL), "`items`");
        assert_eq!(quote_identifier("a]b", &Dialect::MSSQL), "[a]]b]");
        assert_eq!(quote_identifier("we\"ird", &Dialect::POSTGRES), "\"we\"\"ird\"");
        assert_eq!(quote_identifier("items", &Dialect::ORACLE), "\"ITEMS\"");
        let never = Dialect {
            quoting: QuotePolicy::Never,
            case_fold: CaseFold::Lower,
            ..Dialect::GENERIC
        };
        assert_eq!(quote_identifier("Items", &never), "items");
    }

    #[test]
    fn test_qualified_and_aliased_identifiers() {
        assert_eq!(generic(&qualified("i", "id").alias("item_id")), "i.id AS item_id");
        assert_eq!(generic(&col("i.*")), "i.*");
        assert_eq!(
            render(&qualified("i", "id"), &Dialect::POSTGRES).unwrap(),
            "\"i\".\"id\""
        );
    }

    #[test]
    fn test_binary_and_nary_parenthesized() {
        assert_eq!(generic(&col("a").eq(1)), "(a = 1)");
        let expr = col("a").eq(1) & col("b").eq(2) & col("c").is_null();
        assert_eq!(generic(&expr), "((a = 1) AND (b = 2) AND (c IS NULL))");
        assert_eq!(generic(&(col("a") + 1 + col("b"))), "(a + 1 + b)");
        assert_eq!(generic(&!(col("a").eq(1) | col("b").eq(2))), "NOT ((a = 1) OR (b = 2))");
    }

    #[test]
    fn test_in_lists() {
        assert_eq!(generic(&col("id").in_list(vec![1, 2])), "(id IN (1, 2))");
        assert_eq!(generic(&col("id").in_list(Vec::<i64>::new())), "(1 = 0)");
        assert_eq!(generic(&col("id").not_in(Vec::<i64>::new())), "(1 = 1)");
        assert_eq!(generic(&col("id").in_list(5)), "(id IN (5))");
    }

    #[test]
    fn test_in_placeholder_is_parenthesized() {
        let expr = col("id").in_list(placeholder("id"));
        assert_eq!(render(&expr, &Dialect::POSTGRES).unwrap(), "(\"id\" IN ($1))");
        let expr = col("id").not_in(placeholder("id"));
        assert_eq!(render(&expr, &Dialect::SQLITE).unwrap(), "(`id` NOT IN (:id))");
    }

    #[test]
    fn test_wrong_arity_fails() {
        let expr = Expr::nary(Operator::Eq, [col("a"), lit(1), lit(2)]);
        let err = render(&expr, &Dialect::GENERIC).unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::UnsupportedOperator);

        let lonely = Expr::nary(Operator::And, [col("a")]);
        assert!(render(&lonely, &Dialect::GENERIC).is_err());
    }

    #[test]
    fn test_dialect_gated_operators() {
        let expr = col("name").ilike("a%");
        assert_eq!(
            render(&expr, &Dialect::POSTGRES).unwrap(),
            "(\"name\" ILIKE 'a%')"
        );
        let err = render(&expr, &Dialect::MYSQL).unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::UnsupportedOperator);
        assert_eq!(err.context.dialect.as_deref(), Some("mysql"));

        let regex = col("name").matches("^a");
        assert_eq!(render(&regex, &Dialect::MYSQL).unwrap(), "(`name` REGEXP '^a')");
        assert!(render(&regex, &Dialect::SQLITE).is_err());

        let nulls = col("a").desc().nulls_last();
        assert_eq!(generic(&nulls), "a DESC NULLS LAST");
        assert!(render(&nulls, &Dialect::MSSQL).is_err());
    }

    #[test]
    fn test_concat_styles() {
        let expr = col("first").concat(" ").concat(col("last"));
        assert_eq!(generic(&expr), "(first || ' ' || last)");
        assert_eq!(
            render(&expr, &Dialect::MYSQL).unwrap(),
            "CONCAT(`first`, ' ', `last`)"
        );
        assert_eq!(
            render(&expr, &Dialect::MSSQL).unwrap(),
            "([first] + ' ' + [last])"
        );
    }

    #[test]
    fn test_functions_case_and_subscripts() {
        assert_eq!(generic(&count_all()), "count(*)");
        assert_eq!(generic(&func("count", [col("id")]).distinct()), "count(DISTINCT id)");
        let expr = case()
            .when(col("a").gt(1), "big")
            .otherwise("small");
        assert_eq!(generic(&expr), "(CASE WHEN (a > 1) THEN 'big' ELSE 'small' END)");
        assert_eq!(generic(&col("tags").subscript([lit(1)])), "tags[1]");
        assert!(render(&case().end(), &Dialect::GENERIC).is_err());
    }

    #[test]
    fn test_placeholder_literal_substitution() {
        let expr = raw_with("price > ? AND name = ?", [lit(10), lit("x'y")]);
        assert_eq!(generic(&expr), "price > 10 AND name = 'x''y'");

        let err = render(&raw_with("a = ? OR b = ?", [lit(1)]), &Dialect::GENERIC).unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::InvalidParameter);
    }

    #[test]
    fn test_placeholder_numbering() {
        let expr = col("a").eq(placeholder("x")) & col("b").eq(placeholder("y"))
            | col("c").eq(placeholder("x"));
        let mut renderer = Renderer::new(&Dialect::POSTGRES);
        let sql = renderer.expr(&expr).unwrap();
        assert_eq!(
            sql,
            "(((\"a\" = $1) AND (\"b\" = $2)) OR (\"c\" = $1))"
        );
        assert_eq!(renderer.occurrences(), &["x", "y", "x"]);
        assert_eq!(renderer.names().collect::<Vec<_>>(), vec!["x", "y"]);

        let mut renderer = Renderer::new(&Dialect::MSSQL);
        assert_eq!(renderer.expr(&placeholder("id")).unwrap(), "@id");
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let expr = col("a").in_list(vec!["x", "y"]) & !col("b").like("%z");
        assert_eq!(generic(&expr), generic(&expr));
    }
}
