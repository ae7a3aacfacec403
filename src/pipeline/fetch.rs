//! Archive acquisition: fetch a remote archive and verify its byte size.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ArchiveSpec;
use crate::http_client::{self, RetryConfig};
use crate::pipeline::error::PipelineError;

const FETCH_RETRY: RetryConfig = RetryConfig {
    max_attempts: 3,
    base_delay: Duration::from_secs(1),
    max_delay: Duration::from_secs(8),
};

/// Console progress reporter for one download.
///
/// Prints the percentage at 5% steps and a dot for intermediate changes,
/// collapsing repeated identical percentages.
pub struct ProgressPrinter<W: Write> {
    out: W,
    last_percent: Option<u64>,
}

impl ProgressPrinter<std::io::Stdout> {
    /// Progress printer writing to stdout.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ProgressPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_percent: None,
        }
    }

    /// Record that `done` of `total` bytes have arrived.
    pub fn report(&mut self, done: u64, total: u64) {
        if total == 0 {
            return;
        }
        let percent = done.saturating_mul(100) / total;
        if self.last_percent == Some(percent) {
            return;
        }
        if percent % 5 == 0 {
            let _ = write!(self.out, "{percent}%");
        } else {
            let _ = write!(self.out, ".");
        }
        let _ = self.out.flush();
        self.last_percent = Some(percent);
    }

    /// Terminate the progress line.
    pub fn finish(&mut self) {
        let _ = writeln!(self.out);
    }
}

/// Return a verified local copy of `archive`, downloading when absent or forced.
///
/// Size verification failures are fatal and never retried; only transport
/// errors go through the bounded retry.
pub fn maybe_download(
    data_root: &Path,
    base_url: &str,
    archive: &ArchiveSpec,
    force: bool,
    progress: &mut ProgressPrinter<impl Write>,
) -> Result<PathBuf, PipelineError> {
    fs::create_dir_all(data_root)?;
    let dest = data_root.join(&archive.filename);
    if force || !dest.exists() {
        let url = format!("{}{}", base_url, archive.filename);
        tracing::info!("Attempting to download {url}");
        download_to(&url, &dest, archive.expected_bytes, progress)?;
        progress.finish();
        tracing::info!("Download complete: {}", dest.display());
    }
    let actual = fs::metadata(&dest)?.len();
    if actual != archive.expected_bytes {
        return Err(PipelineError::Verification {
            path: dest,
            expected: archive.expected_bytes,
            actual,
        });
    }
    tracing::info!("Found and verified {}", dest.display());
    Ok(dest)
}

fn download_to(
    url: &str,
    dest: &Path,
    expected_bytes: u64,
    progress: &mut ProgressPrinter<impl Write>,
) -> Result<(), PipelineError> {
    let parent = dest.parent().unwrap_or(Path::new("."));
    http_client::retry_with_backoff(
        FETCH_RETRY,
        || {
            let response = http_client::agent().get(url).call().map_err(|err| {
                PipelineError::Http {
                    url: url.to_string(),
                    message: err.to_string(),
                }
            })?;
            let total = http_client::content_length(&response).unwrap_or(expected_bytes);
            // Write to a sibling temp file so an interrupted download never
            // leaves a partial archive at the destination path.
            let mut file = tempfile::NamedTempFile::new_in(parent)?;
            http_client::copy_response_to_writer(response, file.as_file_mut(), |done| {
                progress.report(done, total);
            })?;
            file.persist(dest)
                .map_err(|err| PipelineError::Io(err.error))?;
            Ok(())
        },
        |err| matches!(err, PipelineError::Http { .. }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::tests::serve_once;
    use tempfile::tempdir;

    fn printed(done_total: &[(u64, u64)]) -> String {
        let mut printer = ProgressPrinter::new(Vec::new());
        for &(done, total) in done_total {
            printer.report(done, total);
        }
        String::from_utf8(printer.out).unwrap()
    }

    #[test]
    fn progress_prints_percents_at_five_percent_steps() {
        let out = printed(&[(5, 100), (10, 100), (15, 100)]);
        assert_eq!(out, "5%10%15%");
    }

    #[test]
    fn progress_prints_dots_between_steps() {
        let out = printed(&[(3, 100), (4, 100)]);
        assert_eq!(out, "..");
    }

    #[test]
    fn progress_collapses_repeated_percentages() {
        let out = printed(&[(50, 1000), (51, 1000), (59, 1000), (60, 1000)]);
        assert_eq!(out, "5%.");
    }

    #[test]
    fn progress_ignores_unknown_totals() {
        let out = printed(&[(10, 0), (20, 0)]);
        assert_eq!(out, "");
    }

    #[test]
    fn download_verifies_expected_size() {
        let dir = tempdir().unwrap();
        let body = "archive-bytes";
        let url = serve_once(format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        ));
        let (base_url, filename) = split_url(&url);
        let archive = ArchiveSpec {
            filename,
            expected_bytes: body.len() as u64,
            min_images_per_class: 1,
        };
        let mut progress = ProgressPrinter::new(Vec::new());
        let path =
            maybe_download(dir.path(), &base_url, &archive, false, &mut progress).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), body.as_bytes());
    }

    #[test]
    fn size_mismatch_is_a_verification_error() {
        let dir = tempdir().unwrap();
        let body = "short";
        let url = serve_once(format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        ));
        let (base_url, filename) = split_url(&url);
        let archive = ArchiveSpec {
            filename,
            expected_bytes: 9999,
            min_images_per_class: 1,
        };
        let mut progress = ProgressPrinter::new(Vec::new());
        let err = maybe_download(dir.path(), &base_url, &archive, false, &mut progress)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Verification {
                expected: 9999,
                actual: 5,
                ..
            }
        ));
    }

    #[test]
    fn existing_verified_archive_skips_download() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("data.tar.gz"), b"cached").unwrap();
        let archive = ArchiveSpec {
            filename: "data.tar.gz".to_string(),
            expected_bytes: 6,
            min_images_per_class: 1,
        };
        let mut progress = ProgressPrinter::new(Vec::new());
        // No server behind this URL; an attempted fetch would fail.
        let path = maybe_download(
            dir.path(),
            "http://127.0.0.1:1/",
            &archive,
            false,
            &mut progress,
        )
        .unwrap();
        assert_eq!(path, dir.path().join("data.tar.gz"));
    }

    fn split_url(url: &str) -> (String, String) {
        // serve_once answers any request path, so any filename works.
        (format!("{url}/"), "archive.bin".to_string())
    }
}
