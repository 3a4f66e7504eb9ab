/// Parallel metadata loader
///
/// Decoding headers is blocking file I/O, so every probe runs on tokio's
/// blocking pool. A semaphore bounds how many decoders run at once, and
/// results are collected in submission order so the output lines up with
/// the manifest row for row.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task;
use tracing::{debug, warn};

use super::{DecodeFailure, ShapeDecoder};
use crate::state::record::Shape;

/// Probe many images concurrently
///
/// # Arguments
/// * `paths` - Absolute image paths, in manifest order
/// * `decoder` - Codec collaborator shared by all workers
/// * `workers` - Maximum decodes in flight (values below 1 are treated as 1)
/// * `timeout` - Optional per-image budget; an expired decode yields `None`
///
/// # Returns
/// * One entry per input path, same order, `None` where the image was unreadable
pub async fn probe_all(
    paths: Vec<String>,
    decoder: Arc<dyn ShapeDecoder>,
    workers: usize,
    timeout: Option<Duration>,
) -> Vec<Option<Shape>> {
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    let mut handles = Vec::with_capacity(paths.len());

    for path in paths {
        let permits = Arc::clone(&permits);
        let decoder = Arc::clone(&decoder);

        handles.push(tokio::spawn(async move {
            // The semaphore is never closed, so acquire cannot fail
            let _permit = permits.acquire_owned().await.ok();
            let result = probe_one(PathBuf::from(&path), decoder, timeout).await;
            match &result {
                Err(e @ DecodeFailure::Timeout(_)) => warn!(path = %path, "{}", e),
                Err(e) => debug!(path = %path, error = %e, "image could not be probed"),
                Ok(_) => {}
            }
            result.ok()
        }));
    }

    // Awaiting in submission order keeps results index-aligned
    let mut shapes = Vec::with_capacity(handles.len());
    for handle in handles {
        let shape = match handle.await {
            Ok(shape) => shape,
            Err(e) => {
                warn!("probe task failed: {}", e);
                None
            }
        };
        shapes.push(shape);
    }

    shapes
}

/// Run one blocking decode, bounded by `timeout` if given
async fn probe_one(
    path: PathBuf,
    decoder: Arc<dyn ShapeDecoder>,
    timeout: Option<Duration>,
) -> Result<Shape, DecodeFailure> {
    // Spawn blocking because header decoding hits the filesystem
    let job = task::spawn_blocking(move || decoder.decode_shape(&path));

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, job).await {
            Ok(joined) => joined,
            Err(_) => {
                // The blocking thread finishes on its own; its result is dropped
                return Err(DecodeFailure::Timeout(limit.as_millis()));
            }
        },
        None => job.await,
    };

    joined.map_err(|e| DecodeFailure::Task(e.to_string()))?
}
