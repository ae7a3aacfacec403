//! Shared HTTP client configuration and streaming download helpers.

use std::io::{self, Read, Write};
use std::sync::OnceLock;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(60);
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry settings for network operations with exponential backoff.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RetryConfig {
    /// Maximum number of attempts, including the first try.
    pub max_attempts: usize,
    /// Base delay used for the exponential backoff.
    pub base_delay: Duration,
    /// Maximum delay allowed between attempts.
    pub max_delay: Duration,
}

/// Return a shared HTTP agent with consistent timeouts.
pub(crate) fn agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .timeout_write(WRITE_TIMEOUT)
            .build()
    })
}

/// Retry an operation with bounded exponential backoff when the predicate allows it.
pub(crate) fn retry_with_backoff<T, E, F, R>(
    config: RetryConfig,
    mut action: F,
    mut should_retry: R,
) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    R: FnMut(&E) -> bool,
{
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match action() {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= config.max_attempts || !should_retry(&err) {
                    return Err(err);
                }
                std::thread::sleep(backoff_delay(config.base_delay, config.max_delay, attempt));
            }
        }
    }
}

/// Parsed `Content-Length` header, when the server sent one.
pub(crate) fn content_length(response: &ureq::Response) -> Option<u64> {
    response.header("Content-Length")?.parse::<u64>().ok()
}

/// Stream a response body to `writer`, reporting the running byte total.
pub(crate) fn copy_response_to_writer(
    response: ureq::Response,
    writer: &mut impl Write,
    mut on_progress: impl FnMut(u64),
) -> Result<u64, io::Error> {
    let mut reader = response.into_reader();
    let mut total = 0u64;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        writer.write_all(&buf[..read])?;
        total += read as u64;
        on_progress(total);
    }
    writer.flush()?;
    Ok(total)
}

fn backoff_delay(base: Duration, max: Duration, attempt: usize) -> Duration {
    let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
    let delay = base.checked_mul(factor).unwrap_or(max);
    if delay > max { max } else { delay }
}
