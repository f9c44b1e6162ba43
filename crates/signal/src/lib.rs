//! Traffic signal state machine driven by elapsed time and vehicle counts.
//!
//! The signal cycles red → (green | yellow | red) → yellow → red. Each color is
//! held for a fixed duration; when the hold elapses the next color is chosen
//! from the most recent vehicle count.

mod color;
mod state;
mod timing;

pub use color::SignalColor;
pub use state::{SignalState, Transition, next_color};
pub use timing::{SignalTiming, TimingError};
