//! Fuzz target for dataset compilation.
//!
//! Builds datasets from arbitrary operation sequences; compiling may fail
//! but must never panic.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_dataset_compile
//! ```

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use strata_query::{col, placeholder, Dataset, Dialect, StatementKind};

#[derive(Debug, Arbitrary)]
enum Op {
    Filter(String, i64),
    FilterText(String, String),
    Or(String, i64),
    InList(String, Vec<i64>),
    Exclude(String, String),
    Group(String),
    Having(String, i64),
    Order(String, bool),
    Limit(u64),
    Offset(u64),
    Distinct,
    FromSelf,
    Union,
    Placeholder(String, String),
}

#[derive(Debug, Arbitrary)]
struct Input {
    table: String,
    dialect: u8,
    ops: Vec<Op>,
}

fn dialect(n: u8) -> Dialect {
    match n % 6 {
        0 => Dialect::GENERIC,
        1 => Dialect::POSTGRES,
        2 => Dialect::MYSQL,
        3 => Dialect::SQLITE,
        4 => Dialect::MSSQL,
        _ => Dialect::ORACLE,
    }
}

fuzz_target!(|input: Input| {
    if input.table.is_empty() || input.ops.len() > 32 {
        return;
    }
    let mut ds = Dataset::table(input.table.as_str()).with_dialect(dialect(input.dialect));

    for op in input.ops {
        ds = match op {
            Op::Filter(c, v) => ds.filter(col(c).eq(v)),
            Op::FilterText(c, v) => ds.filter([(c, v)]),
            Op::Or(c, v) => ds.or(col(c).lt(v)).unwrap_or(ds),
            Op::InList(c, vs) => ds.filter(col(c).in_list(vs)),
            Op::Exclude(c, v) => ds.exclude([(c, v)]),
            Op::Group(c) => ds.group([c]),
            Op::Having(c, v) => ds.having(col(c).gt(v)).unwrap_or(ds),
            Op::Order(c, desc) => {
                if desc {
                    ds.order([col(c).desc()])
                } else {
                    ds.order([c])
                }
            }
            Op::Limit(n) => ds.limit(n).unwrap_or(ds),
            Op::Offset(n) => ds.offset(n),
            Op::Distinct => ds.distinct(),
            Op::FromSelf => ds.from_self(),
            Op::Union => ds.union(&ds.clone()),
            Op::Placeholder(c, name) => ds.filter(col(c).eq(placeholder(name))),
        };
    }

    let sql = ds.select_sql();
    // Compilation is deterministic.
    assert_eq!(sql.is_ok(), ds.select_sql().is_ok());
    if let (Ok(a), Ok(b)) = (sql, ds.select_sql()) {
        assert_eq!(a, b);
    }
    let _ = ds.delete_sql();
    let _ = ds.prepare(StatementKind::Select);
});
