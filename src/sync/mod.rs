pub mod batch;
pub mod poller;

pub use batch::BatchFetcher;
pub use poller::{FetchFn, PollState, Poller, PollerConfig};
