//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod ingest;
pub mod migration;
mod paginator;
mod status;
mod transactions;

pub use ingest::{IngestionService, IngestionSettings, SourceConfig};
pub use migration::{MigrationResult, MigrationService};
pub use paginator::{PaginationRun, RetryPolicy, ThreadedPaginator};
pub use status::{DateBounds, SourceCount, SourceSummarySpec, StatusService, StatusSummary};
pub use transactions::{PageRequest, TransactionService};
