//! Shared utility functions.
//!
//! - `html`: HTML escaping for values injected into the front-end page
//! - `format`: human-readable durations for progress output

mod format;
mod html;

pub use format::format_duration;
pub use html::html_escape;
