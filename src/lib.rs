//! Vibeify Backend Library
//!
//! Session-backed Spotify OAuth proxy. The browser authenticates once through
//! the authorization-code flow; afterwards it only carries a signed session
//! cookie while the server holds the Spotify credentials, refreshes them and
//! composes the listening-personality summary the frontend renders.
//!
//! # Modules
//!
//! - `api` - HTTP handlers, signed-cookie helpers and the session extractor
//! - `config` - Configuration resolved once from environment variables
//! - `error` - Error taxonomy and its HTTP mapping
//! - `management` - Session store and the background expiry sweep
//! - `server` - Shared state, router and the serve loop
//! - `spotify` - Token client, authenticated proxy, retry and aggregation
//! - `types` - Session records and Spotify data structures
//! - `utils` - Token generation and small list helpers
//!
//! # Example
//!
//! ```
//! use vibeify::{config, server};
//!
//! #[tokio::main]
//! async fn main() -> vibeify::Res<()> {
//!     config::load_env();
//!     let config = config::Config::from_env()?;
//!     server::start_api_server(config).await
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod management;
pub mod server;
pub mod spotify;
pub mod types;
pub mod utils;

pub use error::{Error, Result};

/// A convenient Result type alias for the binary and the serve loop.
///
/// Boxes any error so startup can mix crate [`Error`]s with I/O failures
/// from binding the listener.
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints an informational message with a blue bullet point.
///
/// Terminal output for the CLI only; the server logs through `tracing`.
///
/// ```
/// info!("Loaded {} env files", count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits with code 1.
///
/// Only for fatal startup errors, such as missing credentials.
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
