//! Runs one oracle node. Settings are read from `./config/*.json`, the files
//! listed in `CONFIG_FILES` and `ORACLE_` environment variables.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use eyre::Result;

use oracle::Oracle;
use oracle_base::agent_main;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    agent_main::<Oracle>().await
}
