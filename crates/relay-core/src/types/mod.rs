//! Canonical types shared by every actor.

pub mod enums;
pub mod market_data;

pub use enums::*;
pub use market_data::*;
