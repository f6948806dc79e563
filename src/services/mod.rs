pub mod converter;
pub mod staging;
pub mod worker_pool;
