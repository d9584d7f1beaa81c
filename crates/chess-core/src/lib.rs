pub mod captures;
pub mod notation;
pub mod rules;

pub use shakmaty::{Color, Role, Square};
