pub mod etl;
pub mod output;
pub mod pagination;
pub mod summary;

pub use crate::domain::model::TransformResult;
pub use crate::domain::ports::{Pipeline, Storage};
pub use crate::utils::error::Result;
