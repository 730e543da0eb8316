pub mod db;
pub mod envelope;
pub mod error;
pub mod graph;
pub mod password;
pub mod rate_limit;
pub mod session;
pub mod validation;
