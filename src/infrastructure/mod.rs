pub mod memory_cache;
pub mod search_client;
pub mod statistics_client;
