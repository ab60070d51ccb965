pub mod history;
pub mod trajectory;
pub mod summary;
