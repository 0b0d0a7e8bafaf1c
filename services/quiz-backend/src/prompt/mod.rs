//! AI 出题、对话与修题

mod generator;
mod schema;
mod templates;
mod validate;
mod variety;

pub use generator::*;
pub use schema::*;
pub use templates::*;
pub use validate::*;
pub use variety::*;
