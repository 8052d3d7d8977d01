// src/supervisor/drain.rs

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::task::JoinHandle;
use tracing::debug;

use super::log_buffer::LogBuffer;

/// Longest line kept as one entry; longer output is split into pieces.
const MAX_LINE_BYTES: usize = 16 * 1024;

/// Spawn the single task that copies a child's stdout and stderr into `logs`.
///
/// Both streams are read line by line and interleaved in arrival order. The
/// task ends once both pipes are closed, which normally means the child has
/// exited. Output is consumed even if nobody reads the buffer, so the child
/// never blocks on a full pipe.
pub fn spawn_log_drainer(
    server: String,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    logs: LogBuffer,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut out = stdout.map(LineReader::new);
        let mut err = stderr.map(LineReader::new);

        while out.is_some() || err.is_some() {
            let (stream, segment) = tokio::select! {
                seg = next_segment(&mut out), if out.is_some() => (Stream::Stdout, seg),
                seg = next_segment(&mut err), if err.is_some() => (Stream::Stderr, seg),
            };

            match segment {
                Some(bytes) => {
                    let line = decode_line(&bytes);
                    debug!(server = %server, ?stream, "{}", line);
                    logs.push(line);
                }
                None => match stream {
                    Stream::Stdout => out = None,
                    Stream::Stderr => err = None,
                },
            }
        }

        debug!(server = %server, "log drainer ended");
    })
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Newline-delimited reader that never buffers more than
/// [`MAX_LINE_BYTES`] of one line.
///
/// Partial lines live in `pending`, so a read cancelled by `select!` loses
/// nothing.
struct LineReader<R> {
    inner: BufReader<R>,
    pending: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            pending: Vec::new(),
        }
    }

    /// Next line without its `\n`, or `None` on EOF / read error.
    async fn next_line(&mut self) -> Option<Vec<u8>> {
        loop {
            let available = self.inner.fill_buf().await.ok()?;
            if available.is_empty() {
                return (!self.pending.is_empty()).then(|| std::mem::take(&mut self.pending));
            }

            let room = MAX_LINE_BYTES.saturating_sub(self.pending.len());
            let window = &available[..available.len().min(room)];
            if let Some(newline) = window.iter().position(|&b| b == b'\n') {
                self.pending.extend_from_slice(&window[..newline]);
                self.inner.consume(newline + 1);
                return Some(std::mem::take(&mut self.pending));
            }

            let taken = window.len();
            self.pending.extend_from_slice(window);
            self.inner.consume(taken);
            if self.pending.len() >= MAX_LINE_BYTES {
                return Some(std::mem::take(&mut self.pending));
            }
        }
    }
}

async fn next_segment<R>(lines: &mut Option<LineReader<R>>) -> Option<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    match lines {
        Some(reader) => reader.next_line().await,
        None => None,
    }
}

/// Lossy UTF-8 with the trailing `\r` of CRLF output removed.
fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
