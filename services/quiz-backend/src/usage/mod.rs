//! 月度用量统计与配额

mod model;
mod repository;
mod tracker;

pub use model::*;
pub use repository::*;
pub use tracker::*;
