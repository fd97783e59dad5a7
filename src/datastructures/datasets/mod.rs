//! The data sets of a time-aware system that feed message construction and
//! the best master clock algorithm

mod current;
mod default;
mod parent;

pub use current::CurrentDS;
pub use default::DefaultDS;
pub use parent::ParentDS;
