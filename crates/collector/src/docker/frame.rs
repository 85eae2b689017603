//! Decoder for the engine's multiplexed log wire format.
//!
//! A non-TTY log stream interleaves stdout and stderr as frames, each
//! prefixed with an 8-byte header:
//!
//! ```text
//! byte 0:    stream tag (0=stdin, 1=stdout, 2=stderr)
//! bytes 1-3: reserved (zero)
//! bytes 4-7: payload size (big-endian u32)
//! ```

use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("reading frame header: {0}")]
    HeaderRead(#[source] std::io::Error),
    #[error("reading frame payload: {0}")]
    PayloadRead(#[source] std::io::Error),
}

/// Which engine stream a frame belongs to.
///
/// Unknown tags are carried verbatim so newer engine revisions do not
/// break decoding; the payload is still delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
    Other(u8),
}

impl From<u8> for StreamKind {
    fn from(tag: u8) -> Self {
        match tag {
            0 => StreamKind::Stdin,
            1 => StreamKind::Stdout,
            2 => StreamKind::Stderr,
            other => StreamKind::Other(other),
        }
    }
}

/// A single decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: StreamKind,
    pub payload: Bytes,
}

/// Read one frame from `reader`.
///
/// Returns `Ok(None)` on end-of-stream at a frame boundary. Truncation
/// inside the header or payload is an error, distinguishable by variant.
/// Short reads are retried until the full header and payload arrive.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 8];
    let mut filled = 0;
    while filled < header.len() {
        let n = reader
            .read(&mut header[filled..])
            .await
            .map_err(FrameError::HeaderRead)?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(FrameError::HeaderRead(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stream ended inside frame header",
            )));
        }
        filled += n;
    }

    let size = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
    let mut payload = vec![0u8; size];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(FrameError::PayloadRead)?;

    Ok(Some(Frame {
        kind: StreamKind::from(header[0]),
        payload: Bytes::from(payload),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::build_frame;

    #[tokio::test]
    async fn test_read_stdout_frame() {
        let data = build_frame(1, b"hello stdout\n");
        let mut reader = data.as_slice();

        let frame = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(frame.kind, StreamKind::Stdout);
        assert_eq!(&frame.payload[..], b"hello stdout\n");
    }

    #[tokio::test]
    async fn test_read_stderr_frame() {
        let data = build_frame(2, b"error msg\n");
        let mut reader = data.as_slice();

        let frame = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(frame.kind, StreamKind::Stderr);
        assert_eq!(&frame.payload[..], b"error msg\n");
    }

    #[tokio::test]
    async fn test_read_stdin_frame() {
        let data = build_frame(0, b"input");
        let mut reader = data.as_slice();

        let frame = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(frame.kind, StreamKind::Stdin);
        assert_eq!(&frame.payload[..], b"input");
    }

    #[tokio::test]
    async fn test_unknown_tag_passes_through() {
        let data = build_frame(7, b"future");
        let mut reader = data.as_slice();

        let frame = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(frame.kind, StreamKind::Other(7));
        assert_eq!(&frame.payload[..], b"future");
    }

    #[tokio::test]
    async fn test_empty_reader_is_clean_eof() {
        let mut reader: &[u8] = &[];
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_truncated_header_is_error() {
        let mut reader: &[u8] = &[1, 0, 0];
        match read_frame(&mut reader).await {
            Err(FrameError::HeaderRead(_)) => {}
            other => panic!("expected HeaderRead error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_truncated_payload_is_error() {
        let data = build_frame(1, b"hello");
        let mut reader = &data[..10]; // cut payload short
        match read_frame(&mut reader).await {
            Err(FrameError::PayloadRead(_)) => {}
            other => panic!("expected PayloadRead error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_payload_frame() {
        let data = build_frame(1, b"");
        let mut reader = data.as_slice();

        let frame = read_frame(&mut reader).await.unwrap().unwrap();
        assert!(frame.payload.is_empty());
    }

    #[tokio::test]
    async fn test_multiple_frames_then_eof() {
        let mut data = build_frame(1, b"line1\n");
        data.extend(build_frame(2, b"line2\n"));
        let mut reader = data.as_slice();

        let f1 = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(f1.kind, StreamKind::Stdout);
        assert_eq!(&f1.payload[..], b"line1\n");

        let f2 = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(f2.kind, StreamKind::Stderr);
        assert_eq!(&f2.payload[..], b"line2\n");

        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }
}
