pub mod position_service;
pub mod snapshot_export;
pub mod stats_service;
