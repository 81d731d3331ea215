//! Fuzz target for connection URL parsing.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_connection_string
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use strata_query::connection::ConnectionString;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(conn) = ConnectionString::parse(input) {
        let _ = conn.pool_options();
        let _ = conn.to_string();
        if let Ok(reparsed) = ConnectionString::parse(&conn.to_url()) {
            assert_eq!(reparsed.driver(), conn.driver());
        }
    }
});
