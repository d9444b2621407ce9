//! Read-only vector index over the reference chunks.
//!
//! The vectors come from a FAISS flat index file (`IndexFlatL2` or
//! `IndexFlatIP`) and the chunk texts from a JSON metadata file whose
//! `chunks` array is positionally aligned with the vectors. Both are loaded
//! once at startup and never mutated afterwards, so the index can be shared
//! across requests without locking.

use std::fmt;
use std::path::Path;

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::IndexError;

const FOURCC_FLAT_L2: &[u8; 4] = b"IxF2";
const FOURCC_FLAT_IP: &[u8; 4] = b"IxFI";

/// Written by FAISS into the two unused header fields.
const HEADER_DUMMY: i64 = 1 << 20;

/// Distance metric of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Squared Euclidean distance
    L2,
    /// Inner product; reported as the negated dot product
    InnerProduct,
}

impl Metric {
    fn fourcc(self) -> &'static [u8; 4] {
        match self {
            Metric::L2 => FOURCC_FLAT_L2,
            Metric::InnerProduct => FOURCC_FLAT_IP,
        }
    }

    /// FAISS `MetricType` code.
    fn code(self) -> i32 {
        match self {
            Metric::InnerProduct => 0,
            Metric::L2 => 1,
        }
    }

    fn distance(self, stored: ArrayView1<'_, f32>, query: ArrayView1<'_, f32>) -> f32 {
        match self {
            Metric::L2 => stored
                .iter()
                .zip(query.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum(),
            Metric::InnerProduct => -stored.dot(&query),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::L2 => write!(f, "l2"),
            Metric::InnerProduct => write!(f, "inner_product"),
        }
    }
}

/// One nearest-neighbor hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Companion metadata file; extra fields are ignored.
#[derive(Debug, Deserialize)]
struct IndexMetadata {
    chunks: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    vectors: Array2<f32>,
    chunks: Vec<String>,
    metric: Metric,
}

impl VectorIndex {
    /// Build an index from rows of vectors and their aligned chunk texts.
    pub fn new(
        vectors: Array2<f32>,
        chunks: Vec<String>,
        metric: Metric,
    ) -> Result<Self, IndexError> {
        if vectors.nrows() != chunks.len() {
            return Err(IndexError::LengthMismatch {
                vectors: vectors.nrows(),
                chunks: chunks.len(),
            });
        }

        Ok(Self {
            vectors,
            chunks,
            metric,
        })
    }

    /// Load the FAISS vector file and the JSON chunk metadata.
    pub fn load(vectors_path: &Path, metadata_path: &Path) -> Result<Self, IndexError> {
        let bytes = std::fs::read(vectors_path)?;
        let (vectors, metric) = decode_flat_index(&bytes)?;

        let metadata = std::fs::read(metadata_path)?;
        let metadata: IndexMetadata = serde_json::from_slice(&metadata)?;

        let index = Self::new(vectors, metadata.chunks, metric)?;
        info!(
            vectors = %vectors_path.display(),
            metadata = %metadata_path.display(),
            count = index.len(),
            dimension = index.dimension(),
            metric = %index.metric,
            "vector index loaded"
        );
        Ok(index)
    }

    /// Return up to `top_k` positions ordered by increasing distance.
    ///
    /// Asking for more neighbors than the index holds returns every entry.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if query.len() != self.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension(),
                actual: query.len(),
            });
        }

        let query = ArrayView1::from(query);
        let mut scored: Vec<Neighbor> = self
            .vectors
            .rows()
            .into_iter()
            .enumerate()
            .map(|(position, row)| Neighbor {
                position,
                distance: self.metric.distance(row, query),
            })
            .collect();

        // Stable, so equal distances keep index order.
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(top_k);
        Ok(scored)
    }

    pub fn chunk(&self, position: usize) -> Option<&str> {
        self.chunks.get(position).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }
}

/// Serialize vectors with the FAISS flat index layout.
pub fn encode_flat_index(vectors: &Array2<f32>, metric: Metric) -> Vec<u8> {
    let (rows, dim) = vectors.dim();
    let mut buf = Vec::with_capacity(45 + rows * dim * 4);
    buf.extend_from_slice(metric.fourcc());
    buf.extend_from_slice(&(dim as i32).to_le_bytes());
    buf.extend_from_slice(&(rows as i64).to_le_bytes());
    buf.extend_from_slice(&HEADER_DUMMY.to_le_bytes());
    buf.extend_from_slice(&HEADER_DUMMY.to_le_bytes());
    buf.push(1);
    buf.extend_from_slice(&metric.code().to_le_bytes());
    buf.extend_from_slice(&((rows * dim) as u64).to_le_bytes());
    for value in vectors.iter() {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    buf
}

/// Parse a FAISS flat index into row vectors.
pub fn decode_flat_index(bytes: &[u8]) -> Result<(Array2<f32>, Metric), IndexError> {
    let mut reader = ByteReader::new(bytes);

    let fourcc = reader.take(4)?;
    let metric = if fourcc == FOURCC_FLAT_L2 {
        Metric::L2
    } else if fourcc == FOURCC_FLAT_IP {
        Metric::InnerProduct
    } else {
        return Err(IndexError::Format(format!(
            "unsupported index type {:?}, only flat L2/IP indexes are supported",
            String::from_utf8_lossy(fourcc)
        )));
    };

    let dim = reader.i32()?;
    let ntotal = reader.i64()?;
    let _dummy = reader.i64()?;
    let _dummy = reader.i64()?;
    let _is_trained = reader.u8()?;
    let metric_type = reader.i32()?;
    if metric_type > 1 {
        let _metric_arg = reader.f32()?;
    }

    let dim = usize::try_from(dim)
        .map_err(|_| IndexError::Format(format!("negative dimension {dim}")))?;
    let ntotal = usize::try_from(ntotal)
        .map_err(|_| IndexError::Format(format!("negative vector count {ntotal}")))?;

    let count = reader.u64()? as usize;
    let expected = ntotal
        .checked_mul(dim)
        .ok_or_else(|| IndexError::Format("vector count overflows".to_string()))?;
    if count != expected {
        return Err(IndexError::Format(format!(
            "expected {expected} floats ({ntotal} x {dim}), found {count}"
        )));
    }

    let raw = reader.take(count.saturating_mul(4))?;
    let values: Vec<f32> = raw
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    let vectors = Array2::from_shape_vec((ntotal, dim), values)
        .map_err(|e| IndexError::Format(e.to_string()))?;
    Ok((vectors, metric))
}

struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], IndexError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| IndexError::Format("truncated index file".to_string()))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], IndexError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, IndexError> {
        Ok(self.take(1)?[0])
    }

    fn i32(&mut self) -> Result<i32, IndexError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64, IndexError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, IndexError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn f32(&mut self) -> Result<f32, IndexError> {
        Ok(f32::from_le_bytes(self.array()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample_index() -> VectorIndex {
        let vectors = array![[0.0, 0.0], [1.0, 0.0], [3.0, 0.0], [0.0, 2.0]];
        let chunks = vec![
            "origin".to_string(),
            "one".to_string(),
            "three".to_string(),
            "two up".to_string(),
        ];
        VectorIndex::new(vectors, chunks, Metric::L2).unwrap()
    }

    #[test]
    fn test_search_orders_by_distance() {
        let index = sample_index();
        let hits = index.search(&[0.9, 0.0], 3).unwrap();

        let positions: Vec<usize> = hits.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![1, 0, 2]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!((hits[0].distance - 0.01).abs() < 1e-5);
    }

    #[test]
    fn test_top_k_larger_than_index_returns_all() {
        let index = sample_index();
        let hits = index.search(&[0.0, 0.0], 50).unwrap();
        assert_eq!(hits.len(), index.len());
    }

    #[test]
    fn test_top_k_zero_returns_nothing() {
        let index = sample_index();
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let index = sample_index();
        let err = index.search(&[0.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_ties_keep_index_order() {
        let vectors = array![[1.0, 0.0], [-1.0, 0.0], [0.0, 1.0]];
        let chunks = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let index = VectorIndex::new(vectors, chunks, Metric::L2).unwrap();
        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        let positions: Vec<usize> = hits.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_inner_product_prefers_larger_dot() {
        let vectors = array![[0.1, 0.0], [0.9, 0.1], [0.5, 0.5]];
        let chunks = vec!["low".to_string(), "high".to_string(), "mid".to_string()];
        let index = VectorIndex::new(vectors, chunks, Metric::InnerProduct).unwrap();
        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(index.chunk(hits[0].position), Some("high"));
        assert_eq!(index.chunk(hits[1].position), Some("mid"));
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let vectors = array![[0.0, 0.0], [1.0, 1.0]];
        let err = VectorIndex::new(vectors, vec!["only".to_string()], Metric::L2).unwrap_err();
        assert!(matches!(
            err,
            IndexError::LengthMismatch {
                vectors: 2,
                chunks: 1
            }
        ));
    }

    #[test]
    fn test_flat_index_decoding() {
        let vectors = array![[0.5, -1.0, 2.0], [3.0, 4.0, 5.5]];
        let bytes = encode_flat_index(&vectors, Metric::InnerProduct);
        assert_eq!(&bytes[..4], b"IxFI");

        let (decoded, metric) = decode_flat_index(&bytes).unwrap();
        assert_eq!(decoded, vectors);
        assert_eq!(metric, Metric::InnerProduct);
    }

    #[test]
    fn test_truncated_file_is_format_error() {
        let vectors = array![[1.0, 2.0], [3.0, 4.0]];
        let bytes = encode_flat_index(&vectors, Metric::L2);
        let err = decode_flat_index(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, IndexError::Format(_)));
    }

    #[test]
    fn test_unknown_index_type() {
        let err = decode_flat_index(b"IHNf\0\0\0\0").unwrap_err();
        assert!(err.to_string().contains("unsupported index type"));
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let vectors_path = dir.path().join("data.faiss");
        let metadata_path = dir.path().join("data.json");

        let vectors = array![[0.0, 1.0], [1.0, 0.0]];
        std::fs::write(&vectors_path, encode_flat_index(&vectors, Metric::L2)).unwrap();
        std::fs::write(
            &metadata_path,
            r#"{"chunks": ["binary search", "merge sort"], "source": "dsa.pdf"}"#,
        )
        .unwrap();

        let index = VectorIndex::load(&vectors_path, &metadata_path).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.dimension(), 2);
        assert_eq!(index.metric(), Metric::L2);
        assert_eq!(index.chunk(1), Some("merge sort"));
        assert_eq!(index.chunk(2), None);
    }

    #[test]
    fn test_load_rejects_misaligned_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let vectors_path = dir.path().join("data.faiss");
        let metadata_path = dir.path().join("data.json");

        let vectors = array![[0.0, 1.0], [1.0, 0.0]];
        std::fs::write(&vectors_path, encode_flat_index(&vectors, Metric::L2)).unwrap();
        std::fs::write(&metadata_path, r#"{"chunks": ["only one"]}"#).unwrap();

        let err = VectorIndex::load(&vectors_path, &metadata_path).unwrap_err();
        assert!(matches!(err, IndexError::LengthMismatch { .. }));
    }
}
