pub mod gate;

pub use gate::{AccessDecision, AccessGate};
