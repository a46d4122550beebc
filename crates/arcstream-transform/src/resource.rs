//! Resources: where a logical file's bytes live and which transform decodes them

use std::fmt;
use std::sync::Arc;

use crate::error::{TransformError, TransformResult};
use crate::raw::Raw;
use crate::source::{ByteSource, MemorySource};
use crate::transform::Transform;

/// One chunk of a segmented resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Absolute start offset in the source
    pub offset: u64,
    /// Bytes stored on disk
    pub encoded_length: u64,
    /// Bytes produced after decoding, when the format records it
    pub decoded_length: Option<u64>,
}

impl Segment {
    /// Absolute offset just past this segment's stored bytes.
    pub const fn end(&self) -> u64 {
        self.offset + self.encoded_length
    }
}

/// Parallel chunk tables of a segmented resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTable {
    offsets: Vec<u64>,
    encoded_lengths: Vec<u64>,
    decoded_lengths: Option<Vec<u64>>,
    total_encoded: u64,
    total_decoded: Option<u64>,
}

fn checked_sum(lengths: &[u64], what: &str) -> TransformResult<u64> {
    lengths
        .iter()
        .try_fold(0u64, |total, length| total.checked_add(*length))
        .ok_or_else(|| TransformError::InvalidSegmentTable(format!("{what} lengths overflow u64")))
}

impl SegmentTable {
    /// Build a table of stored (uncompressed) segments.
    ///
    /// Offsets must be non-decreasing, both tables the same length, and the
    /// lengths must sum without overflow.
    pub fn new(offsets: Vec<u64>, encoded_lengths: Vec<u64>) -> TransformResult<Self> {
        if offsets.len() != encoded_lengths.len() {
            return Err(TransformError::InvalidSegmentTable(format!(
                "{} offsets but {} encoded lengths",
                offsets.len(),
                encoded_lengths.len()
            )));
        }
        if let Some(index) = offsets.windows(2).position(|pair| pair[1] < pair[0]) {
            return Err(TransformError::InvalidSegmentTable(format!(
                "offset {} at index {} is below offset {} at index {}",
                offsets[index + 1],
                index + 1,
                offsets[index],
                index
            )));
        }
        if offsets
            .iter()
            .zip(&encoded_lengths)
            .any(|(offset, length)| offset.checked_add(*length).is_none())
        {
            return Err(TransformError::InvalidSegmentTable(
                "segment end overflows u64".to_string(),
            ));
        }

        let total_encoded = checked_sum(&encoded_lengths, "encoded")?;

        Ok(Self {
            offsets,
            encoded_lengths,
            decoded_lengths: None,
            total_encoded,
            total_decoded: None,
        })
    }

    /// Attach per-chunk decoded lengths (compressed chunk variants).
    pub fn with_decoded_lengths(mut self, decoded_lengths: Vec<u64>) -> TransformResult<Self> {
        if decoded_lengths.len() != self.offsets.len() {
            return Err(TransformError::InvalidSegmentTable(format!(
                "{} decoded lengths for {} segments",
                decoded_lengths.len(),
                self.offsets.len()
            )));
        }
        self.total_decoded = Some(checked_sum(&decoded_lengths, "decoded")?);
        self.decoded_lengths = Some(decoded_lengths);
        Ok(self)
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// `true` when the table has no segments.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Segment at `index`.
    pub fn get(&self, index: usize) -> Option<Segment> {
        Some(Segment {
            offset: *self.offsets.get(index)?,
            encoded_length: *self.encoded_lengths.get(index)?,
            decoded_length: self
                .decoded_lengths
                .as_ref()
                .and_then(|lengths| lengths.get(index).copied()),
        })
    }

    /// Iterate over all segments in order.
    pub fn iter(&self) -> impl Iterator<Item = Segment> + '_ {
        (0..self.len()).filter_map(|index| self.get(index))
    }

    /// Sum of stored lengths.
    pub const fn total_encoded(&self) -> u64 {
        self.total_encoded
    }

    /// Sum of decoded lengths, if recorded.
    pub const fn total_decoded(&self) -> Option<u64> {
        self.total_decoded
    }

    /// `true` when per-chunk decoded lengths are recorded.
    pub fn has_decoded_lengths(&self) -> bool {
        self.decoded_lengths.is_some()
    }
}

/// A logical file inside an archive
///
/// Immutable once built. Cloning is cheap: the source and transform are
/// shared handles.
#[derive(Clone)]
pub struct Resource {
    source: Arc<dyn ByteSource>,
    offset: u64,
    length: u64,
    decompressed_length: Option<u64>,
    type_hint: Option<String>,
    transform: Arc<dyn Transform>,
    segments: Option<Arc<SegmentTable>>,
}

impl Resource {
    /// A stored resource covering `[offset, offset + length)` of `source`.
    pub fn new(source: Arc<dyn ByteSource>, offset: u64, length: u64) -> Self {
        Self {
            source,
            offset,
            length,
            decompressed_length: None,
            type_hint: None,
            transform: Arc::new(Raw),
            segments: None,
        }
    }

    /// A resource over an in-memory buffer, covering all of it.
    ///
    /// Typical for replacement files handed to `pack`. The decoded length is
    /// left unknown.
    pub fn from_bytes(data: impl Into<bytes::Bytes>) -> Self {
        let data = data.into();
        let length = data.len() as u64;
        Self::new(Arc::new(MemorySource::new(data)), 0, length)
    }

    /// Set the decoded length.
    ///
    /// Fails when an attached segment table records a different total.
    pub fn with_decompressed_length(mut self, length: u64) -> TransformResult<Self> {
        if let Some(table) = &self.segments {
            check_decoded_total(table, Some(length))?;
        }
        self.decompressed_length = Some(length);
        Ok(self)
    }

    /// Set the decoded length from an archive field where negative means unknown.
    pub fn with_declared_decompressed_length(self, length: i64) -> TransformResult<Self> {
        match u64::try_from(length) {
            Ok(length) => self.with_decompressed_length(length),
            Err(_) => Ok(Self {
                decompressed_length: None,
                ..self
            }),
        }
    }

    /// Set the extension / type hint.
    #[must_use]
    pub fn with_type_hint(mut self, hint: impl Into<String>) -> Self {
        self.type_hint = Some(hint.into());
        self
    }

    /// Assign the transform that decodes this resource.
    #[must_use]
    pub fn with_transform(mut self, transform: Arc<dyn Transform>) -> Self {
        self.transform = transform;
        self
    }

    /// Attach a segment table.
    ///
    /// When both the table's decoded lengths and the resource's decoded
    /// length are known they must agree.
    pub fn with_segments(mut self, table: SegmentTable) -> TransformResult<Self> {
        check_decoded_total(&table, self.decompressed_length)?;
        self.segments = Some(Arc::new(table));
        Ok(self)
    }

    /// Backing source.
    pub fn source(&self) -> &Arc<dyn ByteSource> {
        &self.source
    }

    /// Start offset in the source.
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Encoded (stored) length.
    pub const fn length(&self) -> u64 {
        self.length
    }

    /// Absolute offset just past the stored bytes.
    pub const fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }

    /// Decoded length, if known.
    pub const fn decompressed_length(&self) -> Option<u64> {
        self.decompressed_length
    }

    /// Extension / type hint.
    pub fn type_hint(&self) -> Option<&str> {
        self.type_hint.as_deref()
    }

    /// Assigned transform.
    pub fn transform(&self) -> &Arc<dyn Transform> {
        &self.transform
    }

    /// Segment table, for segmented resources.
    pub fn segments(&self) -> Option<&SegmentTable> {
        self.segments.as_deref()
    }

    pub(crate) fn shared_segments(&self) -> Option<Arc<SegmentTable>> {
        self.segments.clone()
    }

    /// Check that the stored region lies inside the source.
    pub fn validate_region(&self) -> TransformResult<()> {
        let end = self.offset.checked_add(self.length).ok_or_else(|| {
            TransformError::InvalidResource(format!(
                "offset {} + length {} overflows",
                self.offset, self.length
            ))
        })?;
        if end > self.source.len() {
            return Err(TransformError::InvalidResource(format!(
                "region {}..{} exceeds source length {}",
                self.offset,
                end,
                self.source.len()
            )));
        }
        Ok(())
    }
}

fn check_decoded_total(table: &SegmentTable, expected: Option<u64>) -> TransformResult<()> {
    if let (Some(total), Some(expected)) = (table.total_decoded(), expected) {
        if total != expected {
            return Err(TransformError::InvalidSegmentTable(format!(
                "segment decoded lengths sum to {total}, resource declares {expected}"
            )));
        }
    }
    Ok(())
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("decompressed_length", &self.decompressed_length)
            .field("type_hint", &self.type_hint)
            .field("transform", &self.transform.name())
            .field("segments", &self.segments.as_ref().map(|table| table.len()))
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_table_rejects_mismatched_lengths() {
        let result = SegmentTable::new(vec![0, 10], vec![10]);
        assert!(matches!(
            result,
            Err(TransformError::InvalidSegmentTable(_))
        ));
    }

    #[test]
    fn test_segment_table_rejects_decreasing_offsets() {
        let result = SegmentTable::new(vec![0, 20, 10], vec![5, 5, 5]);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("index 2"), "{err}");
    }

    #[test]
    fn test_segment_table_allows_equal_offsets() {
        let table = SegmentTable::new(vec![4, 4], vec![0, 8]).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.total_encoded(), 8);
    }

    #[test]
    fn test_decoded_sum_must_match_resource() {
        let table = SegmentTable::new(vec![0, 10], vec![10, 10])
            .unwrap()
            .with_decoded_lengths(vec![30, 30])
            .unwrap();

        let resource = Resource::from_bytes(vec![0u8; 20])
            .with_decompressed_length(50)
            .unwrap();
        assert!(resource.with_segments(table.clone()).is_err());

        let resource = Resource::from_bytes(vec![0u8; 20])
            .with_decompressed_length(60)
            .unwrap();
        let resource = resource.with_segments(table).unwrap();
        assert_eq!(resource.segments().unwrap().total_decoded(), Some(60));
    }

    #[test]
    fn test_length_set_after_segments_must_match() {
        let table = SegmentTable::new(vec![0, 10], vec![10, 10])
            .unwrap()
            .with_decoded_lengths(vec![30, 30])
            .unwrap();
        let resource = Resource::from_bytes(vec![0u8; 20])
            .with_segments(table)
            .unwrap();

        assert!(matches!(
            resource.clone().with_decompressed_length(50),
            Err(TransformError::InvalidSegmentTable(_))
        ));
        assert!(matches!(
            resource.clone().with_declared_decompressed_length(50),
            Err(TransformError::InvalidSegmentTable(_))
        ));

        let unknown = resource.clone().with_declared_decompressed_length(-1).unwrap();
        assert_eq!(unknown.decompressed_length(), None);
        let known = resource.with_decompressed_length(60).unwrap();
        assert_eq!(known.decompressed_length(), Some(60));
    }

    #[test]
    fn test_overflowing_length_sums_are_rejected() {
        let table = SegmentTable::new(vec![0, 10], vec![10, 10]).unwrap();
        assert!(matches!(
            table.with_decoded_lengths(vec![u64::MAX, 2]),
            Err(TransformError::InvalidSegmentTable(_))
        ));

        let result = SegmentTable::new(vec![0, 0], vec![u64::MAX, 1]);
        assert!(matches!(
            result,
            Err(TransformError::InvalidSegmentTable(_))
        ));
    }

    #[test]
    fn test_segment_accessors() {
        let table = SegmentTable::new(vec![100, 300], vec![50, 60])
            .unwrap()
            .with_decoded_lengths(vec![80, 90])
            .unwrap();
        let second = table.get(1).unwrap();
        assert_eq!(second.offset, 300);
        assert_eq!(second.end(), 360);
        assert_eq!(second.decoded_length, Some(90));
        assert!(table.get(2).is_none());
        assert_eq!(table.iter().count(), 2);
    }

    #[test]
    fn test_negative_declared_length_is_unknown() {
        let resource = Resource::from_bytes(vec![1, 2, 3])
            .with_declared_decompressed_length(-1)
            .unwrap();
        assert_eq!(resource.decompressed_length(), None);
    }

    #[test]
    fn test_validate_region() {
        let source = MemorySource::shared(vec![0u8; 16]);
        assert!(Resource::new(source.clone(), 8, 8).validate_region().is_ok());
        assert!(Resource::new(source.clone(), 8, 9).validate_region().is_err());
        assert!(Resource::new(source, u64::MAX, 2).validate_region().is_err());
    }
}
