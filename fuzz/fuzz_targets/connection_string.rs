//! Fuzz connection-string parsing for both connect options and pool settings.

#![no_main]

use connpool::{ConnectOptions, PoolConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(conn_str) = std::str::from_utf8(data) else {
        return;
    };

    let _ = ConnectOptions::from_connection_string(conn_str);

    if let Ok(config) = PoolConfig::from_connection_string(conn_str) {
        // Anything that parses must also pass validation or be rejected cleanly
        let _ = config.validate();
    }
});
