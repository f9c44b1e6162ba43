//! Embedded static HTML served by the status server.
//!
//! Kept as `&'static str` so the binary has no filesystem dependency at runtime.

mod dashboard;

pub(crate) use dashboard::INDEX_HTML;
