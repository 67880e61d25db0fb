pub mod bucket;
pub mod members;
