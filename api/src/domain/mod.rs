//! Domain layer - entities, pagination and DB queries

pub mod comments;
pub mod follows;
pub mod pagination;
pub mod posts;
pub mod users;

pub use pagination::{Page, PageQuery, PageRequest};
pub use posts::PostFilter;
