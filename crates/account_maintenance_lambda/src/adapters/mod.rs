pub mod fleet;
pub mod object_store;
pub mod snapshots;

use std::future::Future;

/// Drives an SDK future to completion from a synchronous adapter method.
/// Requires the multi-threaded tokio runtime the binaries start.
pub fn block_on_current<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
