//! Version command implementation.

use crate::error::Result;
use crate::storage::schema::CURRENT_SCHEMA_VERSION;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    schema_version: i32,
    build: &'static str,
}

impl VersionOutput {
    fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            schema_version: CURRENT_SCHEMA_VERSION,
            build: if cfg!(debug_assertions) { "dev" } else { "release" },
        }
    }
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let info = VersionOutput::current();

    if json {
        println!("{}", serde_json::to_string(&info)?);
    } else {
        println!(
            "plog {} (schema v{}, {})",
            info.version, info.schema_version, info.build
        );
    }
    Ok(())
}
