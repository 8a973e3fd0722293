//! Driving a future to completion from synchronous code.
//!
//! Synchronous callers may themselves be running inside a tokio runtime
//! (a blocking section of an async server, a `#[tokio::test]`). Starting a
//! second runtime on that thread panics, so the bridge picks a strategy from
//! the ambient context:
//!
//! | Context                     | Strategy                                         |
//! |-----------------------------|--------------------------------------------------|
//! | no runtime                  | one-shot current-thread runtime on this thread   |
//! | multi-thread runtime        | `block_in_place` + the existing runtime's handle |
//! | current-thread runtime      | one-shot runtime on a scoped helper thread       |

use crate::error::IngestError;
use std::future::Future;
use tokio::runtime::{Builder, Handle, RuntimeFlavor};
use tracing::debug;

/// Run `fut` to completion and return its output, without nesting runtimes.
pub fn block_on<F>(fut: F) -> Result<F::Output, IngestError>
where
    F: Future + Send,
    F::Output: Send,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            debug!("Bridging onto the running multi-thread runtime");
            Ok(tokio::task::block_in_place(|| handle.block_on(fut)))
        }
        Ok(_) => {
            debug!("Bridging through a helper thread");
            std::thread::scope(|scope| {
                scope
                    .spawn(move || one_shot(fut))
                    .join()
                    .map_err(|_| IngestError::Runtime("bridge thread panicked".into()))?
            })
        }
        Err(_) => one_shot(fut),
    }
}

fn one_shot<F: Future>(fut: F) -> Result<F::Output, IngestError> {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| IngestError::Runtime(e.to_string()))?;
    Ok(runtime.block_on(fut))
}
