//! Query functions, one module per table.

pub mod children;
pub mod events;
pub mod plans;
