//! Tracking of image pull and push progress reported by a container engine.
//!
//! The engine answers a pull or a push with a stream of JSON objects, one per status
//! update. [`ProgressStream`] consumes that stream, keeps the completion fraction of the
//! layer seen last, and returns the image digest once the stream ends.

use std::io::{self, Read};
use std::sync::LazyLock;

use anyhow::{Context, anyhow, bail};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, trace};

static DIGEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("sha256:[0-9a-fA-F]{64}").unwrap_or_else(|e| panic!("digest pattern: {e}"))
});

/// Returns the first `sha256:` digest found in `text`.
pub fn find_digest(text: &str) -> Option<&str> {
    DIGEST.find(text).map(|m| m.as_str())
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operation {
    Pull,
    Push,
}

impl Operation {
    /// Statuses after which a layer needs no more transfer.
    fn is_done(&self, status: &str) -> bool {
        match self {
            Operation::Pull => matches!(status, "Pull complete" | "Already exists"),
            Operation::Push => matches!(status, "Pushed" | "Layer already exists"),
        }
    }
}

/// One object of the status stream. Every field is optional on the wire.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusLine {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    progress_detail: Option<ProgressDetail>,
    #[serde(default)]
    error_detail: Option<ErrorDetail>,
    #[serde(default)]
    aux: Option<Aux>,
}

#[derive(Debug, Default, Deserialize)]
struct ProgressDetail {
    #[serde(default)]
    current: u64,
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct Aux {
    #[serde(rename = "Digest", default)]
    digest: Option<String>,
}

/// State observed so far; handed to the `wait` callback after every update.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    operation: Operation,
    layer: Option<String>,
    fraction: Option<f64>,
    digest: Option<String>,
}

impl ProgressTracker {
    fn new(operation: Operation) -> Self {
        Self {
            operation,
            layer: None,
            fraction: None,
            digest: None,
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Id of the layer the last update was about.
    pub fn layer(&self) -> Option<&str> {
        self.layer.as_deref()
    }

    /// Completion of the layer seen last, from `0.0` to `1.0`.
    /// `0.0` until something is observed.
    pub fn progress(&self) -> f64 {
        self.fraction.unwrap_or(0.0)
    }

    /// Digest reported so far, if any.
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    fn observe(&mut self, line: &StatusLine) {
        if let Some(found) = line
            .status
            .as_deref()
            .and_then(find_digest)
            .or_else(|| line.aux.as_ref()?.digest.as_deref().and_then(find_digest))
        {
            self.digest = Some(found.to_string());
        }

        let Some(id) = &line.id else {
            return;
        };
        self.layer = Some(id.clone());

        let status = line.status.as_deref().unwrap_or_default();
        if self.operation.is_done(status) {
            self.fraction = Some(1.0);
        } else if let Some(detail) = line.progress_detail.as_ref().filter(|d| d.total > 0) {
            let fraction = detail.current as f64 / detail.total as f64;
            self.fraction = Some(fraction.clamp(0.0, 1.0));
        }
    }
}

/// Consumer of a pull or push status stream.
///
/// ### Example
///
/// ```
/// use mockfs_kit::progress::ProgressStream;
///
/// let digest = format!("sha256:{}", "ab".repeat(32));
/// let body = format!(
///     "{{\"id\":\"l1\",\"status\":\"Pull complete\"}}\n{{\"status\":\"Digest: {digest}\"}}"
/// );
///
/// let mut pull = ProgressStream::pull(body.as_bytes());
/// let mut last = 0.0;
/// let result = pull.wait(|tracker| last = tracker.progress()).unwrap();
/// assert_eq!(result, digest);
/// assert_eq!(last, 1.0);
/// ```
pub struct ProgressStream<R> {
    reader: Option<R>,
    tracker: ProgressTracker,
}

impl<R: Read> ProgressStream<R> {
    pub fn pull(reader: R) -> Self {
        Self::new(Operation::Pull, reader)
    }

    pub fn push(reader: R) -> Self {
        Self::new(Operation::Push, reader)
    }

    fn new(operation: Operation, reader: R) -> Self {
        Self {
            reader: Some(reader),
            tracker: ProgressTracker::new(operation),
        }
    }

    /// Completion of the layer seen last. `0.0` before [`wait`](Self::wait) observed anything.
    pub fn progress(&self) -> f64 {
        self.tracker.progress()
    }

    /// Reads the stream to its end, calling `on_update` after every status object, and
    /// returns the image digest.
    ///
    /// Fails if the engine reports an error (its message is kept), if reading fails
    /// (the `io::Error` can be recovered with `downcast_ref`), if an object is not valid
    /// JSON, or if the stream ends without a digest. A stream can be waited on once.
    pub fn wait<F>(&mut self, mut on_update: F) -> anyhow::Result<String>
    where
        F: FnMut(&ProgressTracker),
    {
        let reader = self
            .reader
            .take()
            .ok_or_else(|| anyhow!("{:?} stream already consumed", self.tracker.operation))?;

        let lines = serde_json::Deserializer::from_reader(reader).into_iter::<StatusLine>();
        for line in lines {
            let line = match line {
                Ok(line) => line,
                Err(e) if e.is_io() => return Err(io::Error::from(e).into()),
                Err(e) => {
                    return Err(e).context(format!(
                        "malformed {:?} status",
                        self.tracker.operation
                    ));
                }
            };
            trace!("{:?} status: {:?}", self.tracker.operation, line);

            if let Some(error) = &line.error_detail {
                debug!("{:?} failed: {}", self.tracker.operation, error.message);
                bail!("{:?} failed: {}", self.tracker.operation, error.message);
            }

            self.tracker.observe(&line);
            on_update(&self.tracker);
        }

        match self.tracker.digest() {
            Some(digest) => Ok(digest.to_string()),
            None => bail!("{:?} finished without reporting a digest", self.tracker.operation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_digest() -> String {
        format!("sha256:{}", "0123456789abcdef".repeat(4))
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader failed"))
        }
    }

    mod pull {
        use super::*;

        #[test]
        fn test_single_complete_layer_reports_full_progress() {
            let mut pull = ProgressStream::pull(&br#"{"id":"layer1","status":"Pull complete"}"#[..]);
            let mut updates = Vec::new();
            let _ = pull.wait(|tracker| updates.push(tracker.progress()));
            assert_eq!(updates, vec![1.0]);
        }

        #[test]
        fn test_progress_is_zero_before_wait() {
            let pull = ProgressStream::pull(&br#"{"id":"layer1","status":"Pull complete"}"#[..]);
            assert_eq!(pull.progress(), 0.0);
        }

        #[test]
        fn test_engine_error_is_returned() {
            let mut pull = ProgressStream::pull(&br#"{"errorDetail":{"message":"asdf"}}"#[..]);
            let err = pull.wait(|_| {}).unwrap_err();
            assert!(err.to_string().contains("asdf"));
        }

        #[test]
        fn test_missing_digest_is_an_error() {
            let mut pull = ProgressStream::pull(&br#"{"id":"layer1","status":"Pull complete"}"#[..]);
            assert!(pull.wait(|_| {}).is_err());
        }

        #[test]
        fn test_digest_from_status() {
            let body = format!(r#"{{"status":"{} "}}"#, test_digest());
            let mut pull = ProgressStream::pull(body.as_bytes());
            assert_eq!(pull.wait(|_| {}).unwrap(), test_digest());
        }

        #[test]
        fn test_multiple_lines_track_last_layer() {
            let body = format!(
                "{}\n{}\n{}",
                r#"{"id":"a","status":"Downloading","progressDetail":{"current":1,"total":4}}"#,
                r#"{"id":"b","status":"Already exists"}"#,
                format_args!(r#"{{"status":"Digest: {}"}}"#, test_digest()),
            );
            let mut pull = ProgressStream::pull(body.as_bytes());
            let mut seen = Vec::new();
            let digest = pull
                .wait(|tracker| seen.push((tracker.layer().map(String::from), tracker.progress())))
                .unwrap();

            assert_eq!(digest, test_digest());
            assert_eq!(
                seen,
                vec![
                    (Some("a".to_string()), 0.25),
                    (Some("b".to_string()), 1.0),
                    (Some("b".to_string()), 1.0),
                ]
            );
        }

        #[test]
        fn test_malformed_json_is_an_error() {
            let mut pull = ProgressStream::pull(&b"{not json"[..]);
            assert!(pull.wait(|_| {}).is_err());
        }

        #[test]
        fn test_wait_twice_is_an_error() {
            let body = format!(r#"{{"status":"{}"}}"#, test_digest());
            let mut pull = ProgressStream::pull(body.as_bytes());
            assert!(pull.wait(|_| {}).is_ok());
            assert!(pull.wait(|_| {}).is_err());
        }
    }

    mod push {
        use super::*;

        #[test]
        fn test_reader_error_is_returned() {
            let mut push = ProgressStream::push(FailingReader);
            let err = push.wait(|_| {}).unwrap_err();
            let io_err = err.downcast_ref::<io::Error>().unwrap();
            assert_eq!(io_err.kind(), io::ErrorKind::BrokenPipe);
            assert!(io_err.to_string().contains("reader failed"));
        }

        #[test]
        fn test_engine_error_is_returned() {
            let mut push = ProgressStream::push(&br#"{"errorDetail":{"message":"asdf"}}"#[..]);
            let err = push.wait(|_| {}).unwrap_err();
            assert!(err.to_string().contains("asdf"));
        }

        #[test]
        fn test_pushed_layer_reports_full_progress() {
            let mut push = ProgressStream::push(&br#"{"id":"layer1","status":"Pushed"}"#[..]);
            let mut updates = Vec::new();
            let _ = push.wait(|tracker| updates.push(tracker.progress()));
            assert_eq!(updates, vec![1.0]);
        }

        #[test]
        fn test_partial_progress() {
            let mut push = ProgressStream::push(
                &br#"{"id":"layer1","status":"Pushing","progressDetail":{"current":1,"total":2}}"#
                    [..],
            );
            let mut updates = Vec::new();
            // no digest in the stream, so this fails after the update
            assert!(push.wait(|tracker| updates.push(tracker.progress())).is_err());
            assert_eq!(updates.len(), 1);
            assert!(updates[0] > 0.0 && updates[0] < 1.0);
        }

        #[test]
        fn test_digest_from_aux() {
            let body = format!(
                r#"{{"progressDetail":{{}},"aux":{{"Tag":"latest","Digest":"{}","Size":524}}}}"#,
                test_digest()
            );
            let mut push = ProgressStream::push(body.as_bytes());
            assert_eq!(push.wait(|_| {}).unwrap(), test_digest());
        }
    }

    #[test]
    fn test_find_digest() {
        let digest = test_digest();
        assert_eq!(find_digest(&digest), Some(digest.as_str()));
        assert_eq!(
            find_digest(&format!("Digest: {digest} size: 1")),
            Some(digest.as_str())
        );
        assert_eq!(find_digest("zz"), None);
        assert_eq!(find_digest("sha256:abc"), None);
    }
}
