//! # engine_math
//!
//! 2D math types for the replicated world. Re-exports [`glam`] for vectors
//! and defines [`Rect`], the axis-aligned box every arena entity occupies,
//! together with the axis-separated sweep used for collision resolution.

pub mod collision;
pub mod rect;

// Re-export glam types for convenience.
pub use glam::Vec2;

pub use collision::{Contact, sweep_x, sweep_y};
pub use rect::Rect;
