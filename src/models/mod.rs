pub mod api;
pub mod attempt;
