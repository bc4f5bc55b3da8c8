pub mod domain;
pub mod export;
pub mod infrastructure;
