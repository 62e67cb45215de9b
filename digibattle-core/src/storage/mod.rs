pub mod capture_writer;
pub mod metadata;
