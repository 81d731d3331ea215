//! Fuzz target for literal and identifier rendering.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_literal_render
//! ```

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use strata_query::render::{literal, quote_identifier, quote_string};
use strata_query::{Dialect, Value};

#[derive(Debug, Arbitrary)]
enum FuzzDialect {
    Generic,
    Postgres,
    MySql,
    Sqlite,
    Mssql,
    Oracle,
}

impl From<FuzzDialect> for Dialect {
    fn from(val: FuzzDialect) -> Self {
        match val {
            FuzzDialect::Generic => Dialect::GENERIC,
            FuzzDialect::Postgres => Dialect::POSTGRES,
            FuzzDialect::MySql => Dialect::MYSQL,
            FuzzDialect::Sqlite => Dialect::SQLITE,
            FuzzDialect::Mssql => Dialect::MSSQL,
            FuzzDialect::Oracle => Dialect::ORACLE,
        }
    }
}

#[derive(Debug, Arbitrary)]
struct Input {
    dialect: FuzzDialect,
    text: String,
    bytes: Vec<u8>,
    number: i64,
    float: f64,
}

fuzz_target!(|input: Input| {
    let dialect: Dialect = input.dialect.into();

    let _ = quote_string(&input.text, &dialect);

    let _ = quote_identifier(&input.text, &dialect);
    let _ = literal(&Value::from(input.text.as_str()), &dialect);
    let _ = literal(&Value::from(input.bytes.as_slice()), &dialect);
    let _ = literal(&Value::from(input.number), &dialect);
    let _ = literal(&Value::from(input.float), &dialect);
});
