//! Frame-indexed traffic-light phase schedules.

/// Pure `(light, frame) -> state` lookup.
pub mod clock;
/// Repeating cycle schedule builder.
pub mod cycle;
