//! Streaming multipart encoding
//!
//! Turns a pin source (buffer, open stream, file or directory tree) into a
//! `multipart/form-data` request body without materializing the payload in
//! memory. A spawned producer task writes the envelope into an in-process
//! pipe while the HTTP layer consumes the other end as the request body, so
//! encoding and upload overlap.
//!
//! Failure on the producer side is pushed through the pipe as an
//! `io::Error`, which the body consumer observes as a failed read - a short
//! body can never masquerade as a successful upload. If the consumer goes
//! away first, the producer's next write fails with `BrokenPipe` and the
//! task winds down, releasing any open file handles.

use bytes::Bytes;
use futures::channel::mpsc;
use futures::stream::BoxStream;
use futures::{future, stream, Future, SinkExt, StreamExt};
use rand::Rng;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::types::StreamSource;

const COPY_CHUNK: usize = 8 * 1024;
const CRLF: &str = "\r\n";

/// A wire-ready request body plus its declared content type.
///
/// The byte stream is single-pass: remote uploads are one-shot, so there is
/// no rewinding. Callers that need a replayable body re-encode per attempt.
pub struct EncodedBody {
    content_type: String,
    stream: BoxStream<'static, io::Result<Bytes>>,
}

impl fmt::Debug for EncodedBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedBody")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl EncodedBody {
    /// The `Content-Type` header value to send with this body, including
    /// the multipart boundary where one applies
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Convert into a streaming request body
    pub(crate) fn into_body(self) -> reqwest::Body {
        reqwest::Body::wrap_stream(self.stream)
    }

    /// Drain the body into one buffer. Useful for inspecting the envelope;
    /// uploads never buffer this way.
    pub async fn collect(mut self) -> io::Result<Bytes> {
        let mut out = Vec::new();
        while let Some(chunk) = self.stream.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out.into())
    }
}

/// Writer half of the producer/consumer pipe
struct PipeSender {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl PipeSender {
    async fn send(&mut self, chunk: impl Into<Bytes>) -> io::Result<()> {
        self.tx
            .send(Ok(chunk.into()))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "request body consumer dropped"))
    }
}

/// Spawn `produce` as the write side of a pipe and expose the read side as
/// the body stream. A producer error is forwarded down the pipe so the
/// consumer fails instead of seeing a truncated body.
fn piped<F, Fut>(content_type: String, produce: F) -> EncodedBody
where
    F: FnOnce(PipeSender) -> Fut,
    Fut: Future<Output = io::Result<()>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(1);
    let mut failures = tx.clone();
    let writer = produce(PipeSender { tx });

    tokio::spawn(async move {
        if let Err(err) = writer.await {
            // Fails only when the consumer is already gone.
            let _ = failures.send(Err(err)).await;
        }
    });

    EncodedBody {
        content_type,
        stream: rx.boxed(),
    }
}

/// Random lowercase token, used for boundaries and generated filenames so
/// caller-chosen names never leak when they are not needed
pub(crate) fn rand_token(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| char::from(rng.gen_range(b'a'..=b'z'))).collect()
}

fn part_header(boundary: &str, field: &str, filename: &str, content_type: &str) -> String {
    format!(
        "--{boundary}{CRLF}Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"{CRLF}Content-Type: {content_type}{CRLF}{CRLF}"
    )
}

fn closing(boundary: &str) -> String {
    format!("--{boundary}--{CRLF}")
}

fn form_data(boundary: &str) -> String {
    format!("multipart/form-data; boundary={boundary}")
}

async fn copy_into<R>(reader: &mut R, pipe: &mut PipeSender) -> io::Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; COPY_CHUNK];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        pipe.send(Bytes::copy_from_slice(&buf[..n])).await?;
    }
}

/// Encode an in-memory buffer as a one-part form
pub fn bytes_body(field: &str, buf: Bytes) -> EncodedBody {
    let boundary = rand_token(32);
    let header = part_header(&boundary, field, &rand_token(6), "application/octet-stream");
    let content_type = form_data(&boundary);

    piped(content_type, move |mut pipe| async move {
        pipe.send(header).await?;
        pipe.send(buf).await?;
        pipe.send(CRLF).await?;
        pipe.send(closing(&boundary)).await
    })
}

/// Encode an open reader as a one-part form; the reader is consumed
pub fn stream_body(field: &str, reader: StreamSource) -> EncodedBody {
    let boundary = rand_token(32);
    let header = part_header(&boundary, field, &rand_token(6), "application/octet-stream");
    let content_type = form_data(&boundary);

    piped(content_type, move |mut pipe| async move {
        let mut reader = reader;
        pipe.send(header).await?;
        copy_into(&mut reader, &mut pipe).await?;
        pipe.send(CRLF).await?;
        pipe.send(closing(&boundary)).await
    })
}

/// Encode the file or directory at `path`.
///
/// A regular file becomes a single part named after the file. Anything else
/// (a directory, or a non-regular path like a socket or FIFO) is serialized
/// as a tree: one part per contained file in sorted order, with the relative
/// path (directory name included) preserved in the part filename. Stat and
/// walk failures surface here, before any request is built.
pub fn path_body(field: &str, path: &Path) -> io::Result<EncodedBody> {
    let meta = std::fs::metadata(path)?;
    if meta.is_file() {
        file_body(field, path)
    } else {
        tree_body(field, path)
    }
}

fn file_body(field: &str, path: &Path) -> io::Result<EncodedBody> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| rand_token(6));
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    let boundary = rand_token(32);
    let header = part_header(&boundary, field, &filename, mime.as_ref());
    let content_type = form_data(&boundary);
    let path = path.to_path_buf();

    Ok(piped(content_type, move |mut pipe| async move {
        pipe.send(header).await?;
        let mut file = tokio::fs::File::open(&path).await?;
        copy_into(&mut file, &mut pipe).await?;
        pipe.send(CRLF).await?;
        pipe.send(closing(&boundary)).await
    }))
}

fn tree_body(field: &str, root: &Path) -> io::Result<EncodedBody> {
    let files = collect_files(root)?;
    let field = field.to_string();
    let boundary = rand_token(32);
    let content_type = form_data(&boundary);

    Ok(piped(content_type, move |mut pipe| async move {
        for (path, rel) in files {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            pipe.send(part_header(&boundary, &field, &rel, mime.as_ref()))
                .await?;
            let mut file = tokio::fs::File::open(&path).await?;
            copy_into(&mut file, &mut pipe).await?;
            pipe.send(CRLF).await?;
        }
        pipe.send(closing(&boundary)).await
    }))
}

/// Walk a directory tree, returning `(absolute path, relative part name)`
/// pairs in a stable sorted order. Part names keep the root directory name
/// as their leading component and use `/` separators.
fn collect_files(root: &Path) -> io::Result<Vec<(PathBuf, String)>> {
    let base = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string());

    let mut files = Vec::new();
    walk(root, &base, &mut files)?;
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

fn walk(dir: &Path, prefix: &str, out: &mut Vec<(PathBuf, String)>) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let rel = format!("{prefix}/{name}");
        if entry.file_type()?.is_dir() {
            walk(&entry.path(), &rel, out)?;
        } else {
            out.push((entry.path(), rel));
        }
    }
    Ok(())
}

/// A raw (non-multipart) body from an in-memory buffer
pub fn raw_bytes(buf: Bytes) -> EncodedBody {
    EncodedBody {
        content_type: "application/octet-stream".to_string(),
        stream: stream::once(future::ready(Ok(buf))).boxed(),
    }
}

/// A raw (non-multipart) body from an open reader; the reader is consumed
pub fn raw_stream(reader: StreamSource) -> EncodedBody {
    piped("application/octet-stream".to_string(), move |mut pipe| async move {
        let mut reader = reader;
        copy_into(&mut reader, &mut pipe).await
    })
}

/// A raw body streaming a regular file from disk
pub fn raw_file(path: &Path) -> io::Result<EncodedBody> {
    let meta = std::fs::metadata(path)?;
    if !meta.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "only regular files can be a raw body",
        ));
    }

    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let path = path.to_path_buf();

    Ok(piped(mime.to_string(), move |mut pipe| async move {
        let mut file = tokio::fs::File::open(&path).await?;
        copy_into(&mut file, &mut pipe).await
    }))
}
