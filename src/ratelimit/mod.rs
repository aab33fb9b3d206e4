//! Fixed-window quota state and the atomic admit-or-reject protocol.

mod bucket;
mod clock;
mod limiter;
mod rules;
mod store;
mod subject;
mod sweeper;
pub mod window;

pub use bucket::Bucket;
pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{FailurePolicy, LimitVerdict, Limiter};
pub use rules::{Policy, PolicySet};
pub use store::{BucketStore, InMemoryBucketStore};
pub use subject::{SubjectKey, SubjectKind};
pub use sweeper::{Sweeper, SweeperHandle};
pub use window::TimeWindow;
