//! Dedicated writer task for outbound frames.
//!
//! All senders funnel pre-encoded frames through one mpsc channel into a
//! single task that owns the transport's write half:
//!
//! ```text
//! set_float ─┐
//! set_string ┼─► mpsc::Sender<Bytes> ─► Writer Task ─► transport
//! keepalive ─┘
//! ```
//!
//! Frames leave the wire in exactly the order they enter the channel, so
//! the handshake ordering guarantee (Hello before Subscribe before any
//! parameter write) follows from send order alone. The bounded channel
//! provides natural backpressure: senders await capacity instead of
//! contending on a writer lock.

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, UcNetError};

/// Default channel capacity for the outbound frame queue.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Maximum frames to batch into a single vectored write.
const MAX_BATCH_SIZE: usize = 32;

/// Handle for queueing frames to the writer task.
///
/// Cheaply cloneable; every public engine operation that writes holds one.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<Bytes>,
}

impl WriterHandle {
    /// Queue a fully encoded frame for writing.
    ///
    /// Waits for channel capacity under backpressure. Fails with
    /// [`UcNetError::TransportClosed`] once the writer task has exited.
    pub async fn send(&self, frame: impl Into<Bytes>) -> Result<()> {
        self.tx
            .send(frame.into())
            .await
            .map_err(|_| UcNetError::TransportClosed)
    }
}

/// Spawn the writer task that owns `writer`.
///
/// Returns the send handle and the task's join handle; the task exits
/// cleanly when every handle is dropped, or with an error when the
/// transport fails mid-write.
pub fn spawn_writer_task<W>(writer: W, capacity: usize) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity);
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

/// Receive frames and write them out, batching whatever is already queued.
async fn writer_loop<W>(mut rx: mpsc::Receiver<Bytes>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch: Vec<Bytes> = Vec::with_capacity(MAX_BATCH_SIZE);

    loop {
        let first = match rx.recv().await {
            Some(frame) => frame,
            // All handles dropped: clean shutdown.
            None => return Ok(()),
        };

        batch.clear();
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        if let Err(err) = write_batch(&mut writer, &batch).await {
            tracing::error!(%err, "transport write failed, writer task exiting");
            return Err(err);
        }
    }
}

/// Write a batch of frames with a vectored write, falling back to
/// sequential writes on partial progress.
async fn write_batch<W>(writer: &mut W, batch: &[Bytes]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if batch.is_empty() {
        return Ok(());
    }

    let slices: Vec<IoSlice<'_>> = batch.iter().map(|f| IoSlice::new(f)).collect();
    let total: usize = batch.iter().map(|f| f.len()).sum();

    let written = writer.write_vectored(&slices).await?;
    if written == 0 {
        return Err(UcNetError::Io(std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            "write_vectored returned 0",
        )));
    }

    if written < total {
        // Partial vectored write: finish the straddled frame and any
        // untouched ones with plain write_all.
        let mut consumed = 0;
        for frame in batch {
            let end = consumed + frame.len();
            if written < end {
                let skip = written.saturating_sub(consumed);
                writer.write_all(&frame[skip..]).await?;
            }
            consumed = end;
        }
    }

    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_frame, build_keepalive_frame, FrameType, HEADER_SIZE};
    use std::io::Cursor;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt};

    #[tokio::test]
    async fn test_send_reaches_transport() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, DEFAULT_CHANNEL_CAPACITY);

        handle.send(build_keepalive_frame()).await.unwrap();

        let mut buf = vec![0u8; 64];
        let n = server.read(&mut buf).await.unwrap();
        assert_eq!(n, HEADER_SIZE);
        assert_eq!(&buf[6..8], b"KA");
    }

    #[tokio::test]
    async fn test_frames_arrive_in_send_order() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, DEFAULT_CHANNEL_CAPACITY);

        for i in 0..20u8 {
            handle
                .send(build_frame(FrameType::ParamFloat, &[i; 4]))
                .await
                .unwrap();
        }

        let frame_len = HEADER_SIZE + 4;
        let mut buf = vec![0u8; 20 * frame_len];
        server.read_exact(&mut buf).await.unwrap();

        for i in 0..20usize {
            let payload = &buf[i * frame_len + HEADER_SIZE..(i + 1) * frame_len];
            assert_eq!(payload, &[i as u8; 4]);
        }
    }

    #[tokio::test]
    async fn test_write_batch_multiple() {
        let mut buf = Cursor::new(Vec::new());
        let batch: Vec<Bytes> = (0..5u8)
            .map(|i| Bytes::from(build_frame(FrameType::ParamFloat, &[i, 0, 0, 0])))
            .collect();

        write_batch(&mut buf, &batch).await.unwrap();

        assert_eq!(buf.into_inner().len(), 5 * (HEADER_SIZE + 4));
    }

    #[tokio::test]
    async fn test_send_after_shutdown_fails() {
        let (client, server) = duplex(4096);
        let (handle, task) = spawn_writer_task(client, 4);

        drop(server);
        // First write may still land in the duplex buffer; loop until the
        // task notices the closed transport.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        loop {
            if task.is_finished() {
                break;
            }
            let _ = handle.send(build_keepalive_frame()).await;
            assert!(tokio::time::Instant::now() < deadline, "writer never exited");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(matches!(
            handle.send(build_keepalive_frame()).await,
            Err(UcNetError::TransportClosed)
        ));
    }

    #[tokio::test]
    async fn test_clean_shutdown_on_handle_drop() {
        let (client, _server) = duplex(4096);
        let (handle, task) = spawn_writer_task(client, 4);

        drop(handle);

        assert!(task.await.unwrap().is_ok());
    }
}
