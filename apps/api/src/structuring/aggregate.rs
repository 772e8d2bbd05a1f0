//! Bounded aggregation of a structurer's chunk stream into one string.
//!
//! Partial output never leaves this function: the caller gets the complete
//! concatenation or an error.

use std::time::Duration;

use futures::StreamExt;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

use super::{ChunkStream, StructuringError};

/// Output cap for one structuring attempt.
pub const MAX_STRUCTURED_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct AggregationLimits {
    pub deadline: Duration,
    pub max_bytes: usize,
}

/// Consumes `stream` to completion, concatenating chunks in arrival order.
/// Dropping the returned future drops the stream and stops consumption.
pub async fn collect_chunks(
    mut stream: ChunkStream,
    limits: AggregationLimits,
) -> Result<String, StructuringError> {
    let deadline = Instant::now() + limits.deadline;
    let mut output = String::new();
    let mut chunks = 0usize;

    loop {
        let next = timeout_at(deadline, stream.next())
            .await
            .map_err(|_| StructuringError::Timeout(limits.deadline.as_secs()))?;

        match next {
            Some(chunk) => {
                let chunk = chunk?;
                if output.len() + chunk.len() > limits.max_bytes {
                    return Err(StructuringError::OutputTooLarge(limits.max_bytes));
                }
                output.push_str(&chunk);
                chunks += 1;
            }
            None => break,
        }
    }

    debug!("Aggregated {chunks} chunks into {} bytes", output.len());
    Ok(output)
}
