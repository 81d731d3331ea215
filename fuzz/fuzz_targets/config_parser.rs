//! Fuzz target for the `strata.toml` parser.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_config_parser
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use strata_query::connection::{EnvExpander, MapEnvSource};
use strata_query::StrataConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    // The parser should never panic, only return errors.
    if let Ok(config) = StrataConfig::parse(input) {
        if let Ok(config) = config.resolve(&MapEnvSource::new().set("HOME", "/root")) {
            let _ = config.dialect();
            let _ = config.pool_options();
        }
    }

    let _ = EnvExpander::with_source(MapEnvSource::new()).expand(input);
});
