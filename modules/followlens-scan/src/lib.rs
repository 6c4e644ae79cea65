pub mod cache;
pub mod categorizer;
pub mod error;
pub mod jobs;
pub mod reader;
pub mod stats;
pub mod store;
pub mod testing;
pub mod traits;
pub mod workflow;

pub use cache::{CachePartition, CachePartitioner, DEFAULT_FRESHNESS_DAYS};
pub use categorizer::{CategorizationOutcome, Categorizer};
pub use error::ScanError;
pub use jobs::{Job, JobStore, ScanRegistry, ScanStage};
pub use reader::{AccountFilter, AccountReader};
pub use stats::{CategoryStatistics, EngagementMetrics, OverallStatistics, StatisticsReader};
pub use store::MemoryStore;
pub use traits::{AccountStore, ClassificationModel, FollowingSource};
pub use workflow::{ProgressListener, ScanRunner, ScanTarget};
