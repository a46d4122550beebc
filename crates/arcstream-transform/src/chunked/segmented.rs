//! Table-described chunk streams
//!
//! Chunk boundaries come from the resource's segment table, not from the
//! data. Each chunk is read from its own offset with a fresh codec; stored
//! chunks are copied verbatim. The spacer variant also copies a fixed-size
//! record found right after each chunk (except the last) into the output.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::codec::{CodecAdapter, CodecKind};
use crate::config::TransformConfig;
use crate::error::{TransformError, TransformResult};
use crate::resource::{Resource, SegmentTable};
use crate::source::{ByteSource, SourceCursor};
use crate::stream::Decode;
use crate::transform::Transform;

/// Decoder for resources carrying a segment table
#[derive(Debug, Clone)]
pub struct SegmentedChunks {
    codec: CodecKind,
    spacer: bool,
    config: TransformConfig,
}

impl SegmentedChunks {
    /// Chunks compressed with `codec`, laid out back to back.
    pub fn new(codec: CodecKind) -> Self {
        Self {
            codec,
            spacer: false,
            config: TransformConfig::default(),
        }
    }

    /// Chunks separated by spacer records that belong in the output.
    pub fn with_spacer(codec: CodecKind) -> Self {
        Self {
            spacer: true,
            ..Self::new(codec)
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: TransformConfig) -> Self {
        self.config = config;
        self
    }
}

impl Transform for SegmentedChunks {
    fn name(&self) -> &'static str {
        if self.spacer {
            "segmented-spacer"
        } else {
            "segmented"
        }
    }

    fn decoder(&self, resource: &Resource) -> TransformResult<Box<dyn Decode>> {
        let spacer = self.spacer.then_some(u64::from(self.config.spacer_length));
        Ok(Box::new(SegmentedDecoder::open(
            resource,
            self.codec,
            spacer,
            self.config.clone(),
        )?))
    }
}

enum Phase {
    Pending,
    Stored { remaining: u64 },
    Coded(CodecAdapter),
    Spacer { data: Vec<u8>, position: usize },
    Done,
}

/// Decoder session over a segment table
pub struct SegmentedDecoder {
    source: Arc<dyn ByteSource>,
    cursor: SourceCursor,
    table: Arc<SegmentTable>,
    codec: CodecKind,
    spacer: Option<u64>,
    config: TransformConfig,
    index: usize,
    phase: Phase,
}

impl SegmentedDecoder {
    /// Check every segment lies inside the source and start before chunk 0.
    pub fn open(
        resource: &Resource,
        codec: CodecKind,
        spacer: Option<u64>,
        config: TransformConfig,
    ) -> TransformResult<Self> {
        let table = resource.shared_segments().ok_or_else(|| {
            TransformError::InvalidResource("segmented transform needs a segment table".to_string())
        })?;
        let source = resource.source().clone();
        let source_len = source.len();
        if let Some(segment) = table.iter().find(|segment| segment.end() > source_len) {
            return Err(TransformError::InvalidSegmentTable(format!(
                "segment {}..{} exceeds source length {}",
                segment.offset,
                segment.end(),
                source_len
            )));
        }
        if codec.requires_decoded_length() && !table.has_decoded_lengths() {
            return Err(TransformError::InvalidSegmentTable(format!(
                "{codec} segments need decoded lengths"
            )));
        }

        debug!(
            "Opened segmented stream: {} chunks, codec {}, spacer {:?}",
            table.len(),
            codec,
            spacer
        );

        let cursor = SourceCursor::new(source.clone(), 0, 0, config.effective_buffer_size());
        Ok(Self {
            source,
            cursor,
            table,
            codec,
            spacer,
            config,
            index: 0,
            phase: Phase::Pending,
        })
    }

    /// Index of the chunk being decoded.
    pub const fn chunk_index(&self) -> usize {
        self.index
    }

    fn enter_chunk(&mut self, index: usize) -> TransformResult<()> {
        self.index = index;
        let Some(segment) = self.table.get(index) else {
            debug!("Segmented stream exhausted after {} chunks", self.table.len());
            self.phase = Phase::Done;
            return Ok(());
        };
        trace!(
            "Chunk {}: {} bytes at {}",
            index, segment.encoded_length, segment.offset
        );

        self.phase = if self.codec == CodecKind::Stored {
            self.cursor.rebind(segment.offset, segment.encoded_length);
            Phase::Stored {
                remaining: segment.encoded_length,
            }
        } else {
            let input = SourceCursor::new(
                self.source.clone(),
                segment.offset,
                segment.encoded_length,
                self.config.effective_buffer_size(),
            );
            Phase::Coded(CodecAdapter::new(
                self.codec,
                Box::new(input),
                segment.decoded_length,
                &self.config,
            )?)
        };
        Ok(())
    }

    fn read_spacer(&mut self, length: u64) -> TransformResult<Phase> {
        let Some(segment) = self.table.get(self.index) else {
            return Ok(Phase::Done);
        };
        trace!("Spacer after chunk {} at {}", self.index, segment.end());
        self.cursor.rebind(segment.end(), length);
        let data = self.cursor.read_vec(length as usize)?;
        Ok(Phase::Spacer { data, position: 0 })
    }

    fn advance(&mut self) -> TransformResult<()> {
        match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::Pending => self.enter_chunk(0),
            Phase::Stored { .. } | Phase::Coded(_) => {
                let next = self.index + 1;
                match self.spacer {
                    Some(length) if next < self.table.len() => {
                        self.phase = self.read_spacer(length)?;
                        Ok(())
                    }
                    _ => self.enter_chunk(next),
                }
            }
            Phase::Spacer { .. } => self.enter_chunk(self.index + 1),
            Phase::Done => Ok(()),
        }
    }
}

impl Decode for SegmentedDecoder {
    fn pull(&mut self) -> TransformResult<Option<u8>> {
        loop {
            match &mut self.phase {
                Phase::Stored { remaining } if *remaining > 0 => {
                    let byte = self.cursor.read_u8()?.ok_or_else(|| {
                        TransformError::InvalidSegmentTable(format!(
                            "chunk {} ended early",
                            self.index
                        ))
                    })?;
                    *remaining -= 1;
                    return Ok(Some(byte));
                }
                Phase::Coded(adapter) => {
                    if let Some(byte) = adapter.pull()? {
                        return Ok(Some(byte));
                    }
                }
                Phase::Spacer { data, position } if *position < data.len() => {
                    let byte = data[*position];
                    *position += 1;
                    return Ok(Some(byte));
                }
                Phase::Done => return Ok(None),
                _ => {}
            }
            self.advance()?;
        }
    }
}

impl fmt::Debug for SegmentedDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentedDecoder")
            .field("codec", &self.codec)
            .field("chunks", &self.table.len())
            .field("index", &self.index)
            .field("spacer", &self.spacer)
            .finish_non_exhaustive()
    }
}
