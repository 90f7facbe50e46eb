//! Call tracing wrapper
//!
//! Every public transport operation runs inside [`logged`], which opens a span
//! named after the operation and records its outcome. With verbose tracing on
//! (`init(debug = true)`) entry and exit are logged at `debug`, otherwise at
//! `trace`.

use std::fmt::Debug;
use std::future::Future;
use tokio::time::Instant;
use tracing::{Instrument, debug, debug_span, trace};

pub(crate) async fn logged<T, E, F>(verbose: bool, op: &'static str, fut: F) -> Result<T, E>
where
    T: Debug,
    E: std::fmt::Display,
    F: Future<Output = Result<T, E>>,
{
    let span = debug_span!("transport", op);

    async move {
        if verbose {
            debug!("[{}] start", op);
        } else {
            trace!("[{}] start", op);
        }

        let started = Instant::now();
        let result = fut.await;
        let elapsed = started.elapsed();

        match (&result, verbose) {
            (Ok(value), true) => debug!("[{}] done in {:?}: {:?}", op, elapsed, value),
            (Ok(value), false) => trace!("[{}] done in {:?}: {:?}", op, elapsed, value),
            (Err(e), true) => debug!("[{}] failed in {:?}: {}", op, elapsed, e),
            (Err(e), false) => trace!("[{}] failed in {:?}: {}", op, elapsed, e),
        }

        result
    }
    .instrument(span)
    .await
}
