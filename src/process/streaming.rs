/*!
 * Log Streaming Pipeline
 *
 * One detached thread per running process drains its combined output into the
 * application log, chunk by chunk, in the order produced. The thread lives
 * exactly as long as the output stream: it exits on end-of-input, which
 * coincides with the process (and anything sharing its output) exiting.
 *
 * The only synchronization point is the end of the stream, observed through
 * `DrainMonitor`.
 */

use crate::core::limits::DRAIN_CHUNK_SIZE;
use crate::core::types::AppKey;
use crate::storage::LogWriter;
use std::io::{self, Read};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Observes completion of a drain thread
#[derive(Debug, Clone)]
pub struct DrainMonitor {
    // Never sent on; the sender is dropped when the drain thread returns
    done: flume::Receiver<()>,
}

impl DrainMonitor {
    /// Wait up to `timeout` for the stream to end. Returns whether it ended.
    pub fn wait(&self, timeout: Duration) -> bool {
        matches!(
            self.done.recv_timeout(timeout),
            Err(flume::RecvTimeoutError::Disconnected) | Ok(())
        )
    }

    pub fn is_finished(&self) -> bool {
        self.done.is_disconnected()
    }

    #[cfg(test)]
    pub(crate) fn finished() -> Self {
        let (_, done) = flume::bounded(0);
        Self { done }
    }
}

/// Start draining `source` into `sink` on a detached thread
pub fn spawn_drain<R>(key: &AppKey, source: R, sink: LogWriter) -> io::Result<DrainMonitor>
where
    R: Read + Send + 'static,
{
    let (done_tx, done) = flume::bounded::<()>(0);
    let label = key.to_string();

    thread::Builder::new()
        .name(format!("drain-{}-{}", key.tenant, key.name))
        .spawn(move || {
            let bytes = drain(&label, source, sink);
            debug!(app = %label, bytes = bytes, "Output stream ended");
            drop(done_tx);
        })?;

    Ok(DrainMonitor { done })
}

/// Copy `source` to `sink` until end-of-input; returns bytes forwarded
fn drain<R: Read>(label: &str, mut source: R, mut sink: LogWriter) -> u64 {
    let mut buf = vec![0u8; DRAIN_CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = sink.append(&buf[..n]) {
                    warn!(app = %label, error = %e, "Log write failed, stopping drain");
                    break;
                }
                total += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(app = %label, error = %e, "Output stream read failed");
                break;
            }
        }
    }

    total
}
