//! HTTP request handlers for the web server.

mod files;
mod helpers;
mod pages;
mod scrape;
mod session;

// Re-export handlers for use by the router
pub use files::{download_all, download_file};
pub use pages::index;
pub use scrape::{cancel_scraping, progress, results, start_scraping};
pub use session::validate_session;

#[cfg(test)]
pub(crate) use scrape::store_export;
