//! Local mirror of the daemon's lifecycle
//!
//! - `LifecycleState` / `StatusSnapshot`: parsed wire values
//! - `Reconciler`: the single writer that merges signals, polls and
//!   presence changes

mod lifecycle;
mod reconciler;

pub use lifecycle::{LifecycleState, StatusSnapshot};
pub use reconciler::{Origin, Reconciler};
