//! Core data types for the USD/GTQ rate bot.

pub mod comparison;
pub mod rate;
pub mod source;

pub use comparison::*;
pub use rate::*;
pub use source::*;
