//! Traffic monitor: capture → detect → count → signal → annotate → serve.
//!
//! - `config`: CLI parsing into a validated `TrafficConfig`.
//! - `pipeline`: capture loop, frame skipping and lifecycle.
//! - `processing`: detector worker, vehicle counting and signal updates.
//! - `annotation` / `draw`: frame overlays and JPEG encoding.
//! - `server`: actix-web routes.
//! - `telemetry`: tracing subscriber and Prometheus recorder.
//! - `data`: snapshots shared between the worker and HTTP handlers.

pub use config::{TrafficCliArgs, TrafficConfig};
pub use pipeline::run;
pub(crate) use telemetry::init_tracing;

mod annotation;
mod config;
mod data;
mod draw;
mod pipeline;
mod processing;
mod server;
mod telemetry;
