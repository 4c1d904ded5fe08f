pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect_with_settings, DbPool};
pub use fixtures::{SampleCallDataset, SeedResult, SeededCall, VerificationResult};
pub use repositories::{
    CallLogFilter, CallRecordRepository, InMemoryCallRecordRepository, RepositoryError,
    SqlCallRecordRepository,
};
