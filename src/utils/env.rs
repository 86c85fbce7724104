// src/utils/env.rs
use log::{debug, warn};

/// Loads variables from a `.env` file in the working directory, if present.
/// Variables already set in the process environment take precedence.
pub fn load_env() {
    match dotenv::dotenv() {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(dotenv::Error::Io(_)) => debug!("No .env file found, using process environment"),
        Err(e) => warn!("Failed to parse .env file: {}", e),
    }
}
