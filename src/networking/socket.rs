// Copyright (c) 2026 PeerLinks
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Length-delimited framing over any async byte stream.
//!
//! The peer layer consumes an already-established bidirectional socket;
//! frames are a 4-byte big-endian length prefix followed by the payload,
//! capped at [`MAX_FRAME_SIZE`].

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::core::constants::MAX_FRAME_SIZE;

/// Socket errors.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("io")]
    Io,
    #[error("frame too large")]
    FrameTooLarge,
    #[error("closed")]
    Closed,
}

/// Reading half: yields whole frames.
pub struct FrameReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Read the next frame; `None` on a clean end of stream.
    pub async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, SocketError> {
        let mut len_buf = [0u8; 4];
        match self.inner.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(_) => return Err(SocketError::Io),
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(SocketError::FrameTooLarge);
        }
        let mut frame = vec![0u8; len];
        self.inner
            .read_exact(&mut frame)
            .await
            .map_err(|_| SocketError::Io)?;
        Ok(Some(frame))
    }
}

/// Writing half: emits whole frames in call order.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Write one frame.
    pub async fn send_frame(&mut self, frame: &[u8]) -> Result<(), SocketError> {
        if frame.len() > MAX_FRAME_SIZE {
            return Err(SocketError::FrameTooLarge);
        }
        self.inner
            .write_all(&(frame.len() as u32).to_be_bytes())
            .await
            .map_err(|_| SocketError::Io)?;
        self.inner
            .write_all(frame)
            .await
            .map_err(|_| SocketError::Io)?;
        self.inner.flush().await.map_err(|_| SocketError::Io)?;
        Ok(())
    }

    /// Best-effort shutdown of the underlying stream.
    pub async fn shutdown(&mut self) {
        let _ = self.inner.shutdown().await;
    }
}

/// Split a duplex byte stream into framed halves.
pub fn frame_socket<T: AsyncRead + AsyncWrite>(
    io: T,
) -> (FrameReader<ReadHalf<T>>, FrameWriter<WriteHalf<T>>) {
    let (read, write) = tokio::io::split(io);
    (FrameReader { inner: read }, FrameWriter { inner: write })
}
