//! UsageX ledger node entrypoint.
//!
//! - `usagex-server [serve]` runs the HTTP node
//! - `usagex-server sign-settlement --user <addr> --used <amount> --nonce <n>`
//!   prints an operator signature made with the configured `operatorKey`
//! - `usagex-server hashes --user <addr> --used <amount> --nonce <n>` prints
//!   the settlement message hash and its personal-sign hash
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `CONFIG` selects the config file, `HOST` and `PORT` the bind address
//! - `RUST_LOG` and `LOG_FORMAT=json` control logging

use std::process;

#[tokio::main]
async fn main() {
    let result = usagex_server::run().await;
    if let Err(e) = result {
        eprintln!("{e}");
        process::exit(1)
    }
}
