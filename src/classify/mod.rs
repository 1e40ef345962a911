//! Crossing-line color decisions from light states.

/// Single and split signal classification.
pub mod violation;
