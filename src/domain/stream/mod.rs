pub mod filter;
pub mod model;
pub mod pagination;
pub mod query;
pub mod serialize;
pub mod service;
