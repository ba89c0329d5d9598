// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Chain archives: a CARv1 container of length-prefixed records.
//!
//! ```text
//! varint(len) header{roots, version}
//! varint(len) cid ++ data
//! ...
//! ```
//!
//! Readers accept plain and zstd compressed archives.

use crate::utils::cid::CidCborExt as _;
use async_compression::tokio::bufread::ZstdDecoder;
use bytes::{BufMut as _, Bytes, BytesMut};
use cid::Cid;
use futures::{Stream, ready};
use integer_encoding::VarInt as _;
use multihash_codetable::{Code, MultihashDigest as _};
use nunny::Vec as NonEmpty;
use pin_project_lite::pin_project;
use serde::{Deserialize, Serialize};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, AsyncWrite, AsyncWriteExt as _};
use tokio_util::codec::FramedRead;
use tokio_util::either::Either;
use unsigned_varint::codec::UviBytes;

/// The only container version written and accepted.
pub const CAR_VERSION: u64 = 1;

#[derive(Debug, Error)]
pub enum CarError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Malformed archive header: {0}")]
    Header(String),
    #[error("Unsupported archive version {0}")]
    Version(u64),
    #[error("Malformed record #{index}: {reason}")]
    Record { index: usize, reason: String },
    #[error("Record #{index} does not hash to {cid}")]
    Mismatch { index: usize, cid: Cid },
}

/// First frame of an archive. Decoding fails on an empty root list.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CarHeader {
    pub roots: NonEmpty<Cid>,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarRecord {
    pub cid: Cid,
    pub data: Vec<u8>,
}

impl CarRecord {
    /// Record of `data` as `dag-cbor` under its BLAKE2b-256 identifier.
    pub fn new_cbor(data: Vec<u8>) -> Self {
        Self {
            cid: Cid::from_bytes_blake2b256(&data),
            data,
        }
    }

    /// Whether `data` hashes to `cid` with the hash function named by `cid`.
    pub fn is_intact(&self) -> bool {
        Code::try_from(self.cid.hash().code())
            .is_ok_and(|code| Cid::new_v1(self.cid.codec(), code.digest(&self.data)) == self.cid)
    }

    fn decode(frame: Bytes) -> Result<Self, String> {
        let mut cursor = io::Cursor::new(frame.as_ref());
        let cid = Cid::read_bytes(&mut cursor).map_err(|e| e.to_string())?;
        let offset = usize::try_from(cursor.position()).map_err(|e| e.to_string())?;
        Ok(Self {
            cid,
            data: frame[offset..].to_vec(),
        })
    }
}

pin_project! {
    /// Yields the records of an archive in order, checking each against its
    /// identifier. Errors name the offending record.
    pub struct CarReader<R> {
        #[pin]
        frames: FramedRead<Either<R, ZstdDecoder<R>>, UviBytes>,
        header: CarHeader,
        index: usize,
    }
}

impl<R: AsyncBufRead + Unpin> CarReader<R> {
    /// Reads and checks the header.
    pub async fn new(mut reader: R) -> Result<Self, CarError> {
        let source = if is_zstd(reader.fill_buf().await?) {
            let mut decoder = ZstdDecoder::new(reader);
            decoder.multiple_members(true);
            Either::Right(decoder)
        } else {
            Either::Left(reader)
        };
        let mut frames = FramedRead::new(source, UviBytes::default());
        let frame = futures::StreamExt::next(&mut frames)
            .await
            .ok_or_else(|| CarError::Header("archive is empty".into()))??;
        let header: CarHeader = fvm_ipld_encoding::from_slice(&frame)
            .map_err(|e| CarError::Header(e.to_string()))?;
        if header.version != CAR_VERSION {
            return Err(CarError::Version(header.version));
        }
        Ok(Self {
            frames,
            header,
            index: 0,
        })
    }
}

/// A zstd frame header parses from the first bytes of the buffer.
fn is_zstd(buf: &[u8]) -> bool {
    zstd::zstd_safe::get_frame_content_size(buf).is_ok()
}

impl<R> CarReader<R> {
    pub fn header(&self) -> &CarHeader {
        &self.header
    }

    pub fn roots(&self) -> &NonEmpty<Cid> {
        &self.header.roots
    }
}

impl<R: AsyncBufRead> Stream for CarReader<R> {
    type Item = Result<CarRecord, CarError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let Some(frame) = ready!(this.frames.poll_next(cx)) else {
            return Poll::Ready(None);
        };
        let index = *this.index;
        *this.index += 1;
        let record = frame
            .map_err(|e| e.to_string())
            .and_then(|frame| CarRecord::decode(frame.freeze()))
            .map_err(|reason| CarError::Record { index, reason })
            .and_then(|record| match record.is_intact() {
                true => Ok(record),
                false => Err(CarError::Mismatch {
                    index,
                    cid: record.cid,
                }),
            });
        Poll::Ready(Some(record))
    }
}

/// Writes an archive frame by frame. Call [`CarWriter::finish`] to flush.
pub struct CarWriter<W> {
    inner: W,
    records: usize,
}

impl<W: AsyncWrite + Unpin> CarWriter<W> {
    pub async fn new(roots: NonEmpty<Cid>, mut inner: W) -> Result<Self, CarError> {
        let header = CarHeader {
            roots,
            version: CAR_VERSION,
        };
        let encoded =
            fvm_ipld_encoding::to_vec(&header).map_err(|e| CarError::Header(e.to_string()))?;
        write_frame(&mut inner, &[&encoded]).await?;
        Ok(Self { inner, records: 0 })
    }

    pub async fn write(&mut self, record: &CarRecord) -> Result<(), CarError> {
        write_frame(&mut self.inner, &[&record.cid.to_bytes(), &record.data]).await?;
        self.records += 1;
        Ok(())
    }

    /// Flushes the writer and returns the number of records written.
    pub async fn finish(mut self) -> Result<usize, CarError> {
        self.inner.flush().await?;
        self.inner.shutdown().await?;
        Ok(self.records)
    }
}

async fn write_frame(writer: &mut (impl AsyncWrite + Unpin), parts: &[&[u8]]) -> io::Result<()> {
    let len: usize = parts.iter().map(|part| part.len()).sum();
    let mut frame = BytesMut::with_capacity(len + 10);
    frame.put_slice(&len.encode_var_vec());
    for part in parts {
        frame.put_slice(part);
    }
    writer.write_all(&frame).await
}
