pub mod days;
pub mod filter;
pub mod scheduler;
pub mod state;

pub use days::{classify, DayBucket, DayBuckets, DayInfo, TemporalClassifier, DAYS};
pub use filter::{apply_filters, FilterState, Filterable};
pub use scheduler::MidnightScheduler;
pub use state::{FeedEvent, FeedState};

pub mod prelude {
    pub use super::days::{classify, DayBuckets, DayInfo};
    pub use super::filter::{FilterState, Filterable};
    pub use super::scheduler::MidnightScheduler;
    pub use super::state::{FeedEvent, FeedState};
}
