pub mod art;
pub mod story;
