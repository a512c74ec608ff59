//! Controller layer: UI events, the listing session state machine, and command orchestration.

pub mod events;
pub mod orchestration;
pub mod session;
