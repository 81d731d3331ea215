//! Backend dialects.
//!
//! A [`Dialect`] is plain data: every backend-specific rendering decision
//! the renderer and the dataset compilers make is read from one of its
//! fields. Presets cover the common backends; a custom dialect is built with
//! struct update syntax from the closest preset.
//!
//! ```rust
//! use strata_query::{Dialect, PlaceholderStyle};
//!
//! let dialect = Dialect {
//!     name: "pg-named",
//!     placeholder_style: PlaceholderStyle::Colon,
//!     ..Dialect::POSTGRES
//! };
//! assert!(dialect.supports_returning);
//! ```

use std::fmt;

/// When identifiers are quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotePolicy {
    /// Quote every identifier.
    Always,
    /// Quote reserved words and names with special characters.
    WhenNeeded,
    /// Never quote.
    Never,
}

/// Identifier case folding applied before quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseFold {
    /// Keep identifiers as written.
    None,
    /// Fold to lowercase.
    Lower,
    /// Fold to uppercase.
    Upper,
}

/// How quotes inside string literals are escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringEscape {
    /// `'` becomes `''`.
    Doubling,
    /// `'` becomes `\'` and `\` becomes `\\`.
    Backslash,
}

/// Row limiting syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitStyle {
    /// `LIMIT n OFFSET m`
    LimitOffset,
    /// `OFFSET m ROWS FETCH NEXT n ROWS ONLY`
    OffsetFetch,
    /// `SELECT TOP n`, falling back to `OFFSET/FETCH` when an offset is set.
    Top,
}

/// How an offset without a limit is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OffsetWithoutLimit {
    /// `OFFSET m` alone is valid.
    Bare,
    /// A sentinel limit must precede the offset (e.g. `LIMIT -1`).
    Sentinel(&'static str),
    /// Offsets require a limit.
    Unsupported,
}

/// Blob literal encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobStyle {
    /// `X'DEADBEEF'`
    XHex,
    /// `0xDEADBEEF`
    ZeroXHex,
    /// `'\xdeadbeef'::bytea`
    ByteaHex,
    /// `'\336\255'::bytea` (backslash-octal escape format)
    ByteaOctal,
    /// `HEXTORAW('DEADBEEF')`
    HexToRaw,
}

/// Date and time literal syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalStyle {
    /// `DATE '...'`, `TIMESTAMP '...'`
    Ansi,
    /// Bare quoted strings.
    Quoted,
}

/// Placeholder syntax for prepared statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderStyle {
    /// `?`, one positional value per occurrence.
    Question,
    /// `$1`, one number per distinct name.
    Numbered,
    /// `:name`
    Colon,
    /// `@name`
    At,
}

impl PlaceholderStyle {
    /// Whether values are bound by position rather than by name.
    pub fn is_positional(&self) -> bool {
        matches!(self, Self::Question | Self::Numbered)
    }
}

/// String concatenation syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConcatStyle {
    /// An infix operator such as `||` or `+`.
    Operator(&'static str),
    /// `CONCAT(a, b)`
    Function,
}

/// UPDATE/DELETE over several tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifyingJoins {
    /// Single-table updates and deletes only.
    Unsupported,
    /// `UPDATE t SET .. FROM x` and `DELETE FROM t USING x`.
    Using,
    /// `UPDATE t, x SET ..` and `DELETE t FROM t, x`.
    Join,
}

/// Transaction control statement syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionSyntax {
    /// `BEGIN`, `SAVEPOINT x`, `RELEASE SAVEPOINT x`, `ROLLBACK TO SAVEPOINT x`
    Standard,
    /// `BEGIN TRANSACTION`, `SAVE TRANSACTION x`, `ROLLBACK TRANSACTION x`
    SqlServer,
}

/// How an isolation level is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationStyle {
    /// `BEGIN ISOLATION LEVEL ...`
    InBegin,
    /// `SET TRANSACTION ISOLATION LEVEL ...` before the begin statement.
    SetTransaction,
    /// Isolation levels are ignored.
    Unsupported,
}

/// Set operations beyond `UNION`/`UNION ALL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SetOperations {
    /// `INTERSECT` is supported.
    pub intersect: bool,
    /// `EXCEPT` is supported.
    pub except: bool,
    /// `INTERSECT ALL` and `EXCEPT ALL` are supported.
    pub all: bool,
    /// Keyword used for `EXCEPT` (`MINUS` on some backends).
    pub except_keyword: &'static str,
}

/// Row locking support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockSupport {
    /// `FOR UPDATE`
    pub update: bool,
    /// `FOR SHARE`
    pub share: bool,
    /// `NOWAIT`
    pub nowait: bool,
    /// `SKIP LOCKED`
    pub skip_locked: bool,
}

/// A clause of a compiled SELECT statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectClause {
    /// `SELECT [DISTINCT] columns`
    Select,
    /// `FROM`
    From,
    /// `JOIN`s
    Join,
    /// `WHERE`
    Where,
    /// `GROUP BY`
    Group,
    /// `HAVING`
    Having,
    /// `ORDER BY`
    Order,
    /// `LIMIT`/`OFFSET`
    Limit,
    /// `FOR UPDATE` and friends
    Lock,
    /// `UNION`/`INTERSECT`/`EXCEPT`
    Compounds,
}

/// Default SELECT clause order.
pub const DEFAULT_SELECT_ORDER: &[SelectClause] = &[
    SelectClause::Select,
    SelectClause::From,
    SelectClause::Join,
    SelectClause::Where,
    SelectClause::Group,
    SelectClause::Having,
    SelectClause::Order,
    SelectClause::Limit,
    SelectClause::Lock,
    SelectClause::Compounds,
];

/// Backend-specific rendering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dialect {
    /// Dialect name, used in error messages.
    pub name: &'static str,
    /// Opening and closing identifier quote characters.
    pub identifier_quote: (char, char),
    /// When identifiers are quoted.
    pub quoting: QuotePolicy,
    /// Case folding applied to identifiers.
    pub case_fold: CaseFold,
    /// Tokens for `true` and `false`.
    pub bool_literals: (&'static str, &'static str),
    /// String literal escaping.
    pub string_escape: StringEscape,
    /// Row limiting syntax.
    pub limit_style: LimitStyle,
    /// Offset without limit handling.
    pub offset_without_limit: OffsetWithoutLimit,
    /// Blob literal encoding.
    pub blob_style: BlobStyle,
    /// Temporal literal syntax.
    pub temporal_style: TemporalStyle,
    /// Placeholder syntax.
    pub placeholder_style: PlaceholderStyle,
    /// Supported set operations.
    pub set_operations: SetOperations,
    /// `RETURNING` on INSERT/UPDATE/DELETE.
    pub supports_returning: bool,
    /// Row locking.
    pub locks: LockSupport,
    /// `SELECT DISTINCT ON (...)`
    pub supports_distinct_on: bool,
    /// `NULLS FIRST`/`NULLS LAST` in ORDER BY.
    pub supports_nulls_ordering: bool,
    /// `ILIKE`
    pub supports_ilike: bool,
    /// Regex match operators (match, negated match).
    pub regex_operators: Option<(&'static str, &'static str)>,
    /// String concatenation syntax.
    pub concat: ConcatStyle,
    /// Multi-table UPDATE/DELETE.
    pub modifying_joins: ModifyingJoins,
    /// `LIMIT` on UPDATE/DELETE.
    pub supports_modify_limit: bool,
    /// Multi-row `INSERT ... VALUES (..), (..)`.
    pub supports_multi_row_insert: bool,
    /// Suffix for an INSERT without columns, if the backend has one.
    pub empty_insert: Option<&'static str>,
    /// Transaction control syntax.
    pub transaction_syntax: TransactionSyntax,
    /// Isolation level syntax.
    pub isolation_style: IsolationStyle,
    /// Order of SELECT clauses.
    pub select_order: &'static [SelectClause],
    /// Table and subquery aliases take `AS`. Oracle only accepts `FROM t x`.
    pub table_alias_as: bool,
}

const ALL_SET_OPERATIONS: SetOperations = SetOperations {
    intersect: true,
    except: true,
    all: true,
    except_keyword: "EXCEPT",
};

const ALL_LOCKS: LockSupport = LockSupport {
    update: true,
    share: true,
    nowait: true,
    skip_locked: true,
};

const NO_LOCKS: LockSupport = LockSupport {
    update: false,
    share: false,
    nowait: false,
    skip_locked: false,
};

impl Dialect {
    /// ANSI-flavoured default dialect: identifiers quoted only when needed.
    pub const GENERIC: Dialect = Dialect {
        name: "generic",
        identifier_quote: ('"', '"'),
        quoting: QuotePolicy::WhenNeeded,
        case_fold: CaseFold::None,
        bool_literals: ("TRUE", "FALSE"),
        string_escape: StringEscape::Doubling,
        limit_style: LimitStyle::LimitOffset,
        offset_without_limit: OffsetWithoutLimit::Bare,
        blob_style: BlobStyle::XHex,
        temporal_style: TemporalStyle::Ansi,
        placeholder_style: PlaceholderStyle::Question,
        set_operations: ALL_SET_OPERATIONS,
        supports_returning: false,
        locks: LockSupport {
            update: true,
            share: false,
            nowait: false,
            skip_locked: false,
        },
        supports_distinct_on: false,
        supports_nulls_ordering: true,
        supports_ilike: false,
        regex_operators: None,
        concat: ConcatStyle::Operator("||"),
        modifying_joins: ModifyingJoins::Unsupported,
        supports_modify_limit: false,
        supports_multi_row_insert: true,
        empty_insert: Some("DEFAULT VALUES"),
        transaction_syntax: TransactionSyntax::Standard,
        isolation_style: IsolationStyle::InBegin,
        select_order: DEFAULT_SELECT_ORDER,
        table_alias_as: true,
    };

    /// PostgreSQL.
    pub const POSTGRES: Dialect = Dialect {
        name: "postgres",
        quoting: QuotePolicy::Always,
        bool_literals: ("true", "false"),
        blob_style: BlobStyle::ByteaHex,
        placeholder_style: PlaceholderStyle::Numbered,
        supports_returning: true,
        locks: ALL_LOCKS,
        supports_distinct_on: true,
        supports_ilike: true,
        regex_operators: Some(("~", "!~")),
        modifying_joins: ModifyingJoins::Using,
        ..Dialect::GENERIC
    };

    /// MySQL / MariaDB.
    pub const MYSQL: Dialect = Dialect {
        name: "mysql",
        identifier_quote: ('`', '`'),
        quoting: QuotePolicy::Always,
        bool_literals: ("1", "0"),
        string_escape: StringEscape::Backslash,
        offset_without_limit: OffsetWithoutLimit::Unsupported,
        blob_style: BlobStyle::ZeroXHex,
        temporal_style: TemporalStyle::Quoted,
        set_operations: SetOperations {
            intersect: false,
            except: false,
            all: false,
            except_keyword: "EXCEPT",
        },
        locks: ALL_LOCKS,
        supports_nulls_ordering: false,
        regex_operators: Some(("REGEXP", "NOT REGEXP")),
        concat: ConcatStyle::Function,
        modifying_joins: ModifyingJoins::Join,
        supports_modify_limit: true,
        empty_insert: Some("() VALUES ()"),
        isolation_style: IsolationStyle::SetTransaction,
        ..Dialect::GENERIC
    };

    /// SQLite.
    pub const SQLITE: Dialect = Dialect {
        name: "sqlite",
        identifier_quote: ('`', '`'),
        quoting: QuotePolicy::Always,
        bool_literals: ("1", "0"),
        offset_without_limit: OffsetWithoutLimit::Sentinel("LIMIT -1"),
        temporal_style: TemporalStyle::Quoted,
        placeholder_style: PlaceholderStyle::Colon,
        set_operations: SetOperations {
            all: false,
            ..ALL_SET_OPERATIONS
        },
        supports_returning: true,
        locks: NO_LOCKS,
        isolation_style: IsolationStyle::Unsupported,
        ..Dialect::GENERIC
    };

    /// Microsoft SQL Server.
    pub const MSSQL: Dialect = Dialect {
        name: "mssql",
        identifier_quote: ('[', ']'),
        quoting: QuotePolicy::Always,
        bool_literals: ("1", "0"),
        limit_style: LimitStyle::Top,
        blob_style: BlobStyle::ZeroXHex,
        temporal_style: TemporalStyle::Quoted,
        placeholder_style: PlaceholderStyle::At,
        set_operations: SetOperations {
            all: false,
            ..ALL_SET_OPERATIONS
        },
        locks: NO_LOCKS,
        supports_nulls_ordering: false,
        concat: ConcatStyle::Operator("+"),
        transaction_syntax: TransactionSyntax::SqlServer,
        isolation_style: IsolationStyle::SetTransaction,
        ..Dialect::GENERIC
    };

    /// Oracle.
    pub const ORACLE: Dialect = Dialect {
        name: "oracle",
        quoting: QuotePolicy::Always,
        case_fold: CaseFold::Upper,
        bool_literals: ("1", "0"),
        limit_style: LimitStyle::OffsetFetch,
        blob_style: BlobStyle::HexToRaw,
        placeholder_style: PlaceholderStyle::Colon,
        set_operations: SetOperations {
            intersect: true,
            except: true,
            all: false,
            except_keyword: "MINUS",
        },
        locks: LockSupport {
            update: true,
            share: false,
            nowait: true,
            skip_locked: true,
        },
        supports_multi_row_insert: false,
        empty_insert: None,
        isolation_style: IsolationStyle::SetTransaction,
        table_alias_as: false,
        ..Dialect::GENERIC
    };

    /// Look up a preset by name. Accepts common aliases.
    pub fn by_name(name: &str) -> Option<Dialect> {
        match name.to_lowercase().as_str() {
            "generic" | "ansi" => Some(Self::GENERIC),
            "postgres" | "postgresql" | "pg" => Some(Self::POSTGRES),
            "mysql" | "mariadb" => Some(Self::MYSQL),
            "sqlite" | "sqlite3" => Some(Self::SQLITE),
            "mssql" | "sqlserver" | "tsql" => Some(Self::MSSQL),
            "oracle" => Some(Self::ORACLE),
            _ => None,
        }
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Self::GENERIC
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_by_name() {
        assert_eq!(Dialect::by_name("PostgreSQL"), Some(Dialect::POSTGRES));
        assert_eq!(Dialect::by_name("sqlite3"), Some(Dialect::SQLITE));
        assert_eq!(Dialect::by_name("db2"), None);
    }

    #[test]
    fn test_presets_inherit_generic_defaults() {
        assert_eq!(Dialect::POSTGRES.select_order, DEFAULT_SELECT_ORDER);
        assert_eq!(Dialect::POSTGRES.string_escape, StringEscape::Doubling);
        assert_eq!(Dialect::MYSQL.identifier_quote, ('`', '`'));
        assert!(!Dialect::MYSQL.set_operations.intersect);
        assert_eq!(Dialect::ORACLE.set_operations.except_keyword, "MINUS");
    }

    #[test]
    fn test_placeholder_positional() {
        assert!(PlaceholderStyle::Numbered.is_positional());
        assert!(!PlaceholderStyle::At.is_positional());
    }
}
