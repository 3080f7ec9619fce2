use std::path::Path;

use lawer_backend_client::ClientConfig;
use lawer_login::get_session_file;
use serde_json::json;

const EXIT_CODE_INVALID_CONFIG: i32 = 3;

/// Load the configuration, exiting with code 3 when `config.toml` cannot be
/// parsed. Prints the effective settings when `should_print` is set.
pub(crate) fn validate_config(lawer_home: &Path, should_print: bool) -> ClientConfig {
    match ClientConfig::load(lawer_home) {
        Ok(config) => {
            if should_print {
                let summary = json!({
                    "home": lawer_home.display().to_string(),
                    "sessionFile": get_session_file(lawer_home).display().to_string(),
                    "config": config,
                });
                match serde_json::to_string_pretty(&summary) {
                    Ok(text) => println!("{text}"),
                    Err(err) => eprintln!("failed to render config: {err}"),
                }
            }
            config
        }
        Err(err) => {
            eprintln!("Config validation error: {err}");
            std::process::exit(EXIT_CODE_INVALID_CONFIG);
        }
    }
}
