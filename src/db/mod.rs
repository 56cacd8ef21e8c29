pub mod ids;
pub mod store;

pub use ids::{IdGenerator, MonotonicIds, SequentialIds};
pub use store::RecordStore;
