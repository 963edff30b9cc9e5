pub mod catalog;
pub mod fields;
pub mod record;
pub mod report;
