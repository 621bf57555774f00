//! Flat Vector Index - 전수 내적 검색
//!
//! 정규화된 벡터를 행 우선(row-major)으로 보관하고 모든 행과의 내적으로
//! top-k 를 찾습니다. 근사 검색 계층은 없습니다.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{Result, RetrievalError};

/// 정규화 분모에 더하는 epsilon (영벡터 보호)
pub const NORM_EPSILON: f32 = 1e-10;

/// 결과 슬롯이 비어 있음을 나타내는 위치 값
pub const NO_MATCH: i64 = -1;

/// 파일 식별 태그
const MAGIC: [u8; 4] = *b"SMFI";
/// 포맷 버전
const FORMAT_VERSION: u32 = 2;

// ============================================================================
// Types
// ============================================================================

/// 검색 결과 슬롯
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// 내적 스코어 (빈 슬롯은 `f32::NEG_INFINITY`)
    pub score: f32,
    /// 저장 위치, 빈 슬롯은 [`NO_MATCH`]
    pub position: i64,
}

impl Neighbor {
    fn empty() -> Self {
        Self {
            score: f32::NEG_INFINITY,
            position: NO_MATCH,
        }
    }

    /// 유효한 위치 (빈 슬롯이면 None)
    pub fn position(&self) -> Option<usize> {
        usize::try_from(self.position).ok()
    }
}

// ============================================================================
// FlatIndex
// ============================================================================

/// 평면 내적 인덱스
///
/// 각 행은 청크 라벨(소스 + chunk_id)을 함께 가지므로 메타데이터 파일과의
/// 위치 정렬을 로드 시점에 검증할 수 있습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatIndex {
    magic: [u8; 4],
    version: u32,
    dimension: usize,
    labels: Vec<String>,
    vectors: Vec<f32>,
}

impl FlatIndex {
    /// 빈 인덱스 생성
    pub fn new(dimension: usize) -> Self {
        Self {
            magic: MAGIC,
            version: FORMAT_VERSION,
            dimension,
            labels: Vec::new(),
            vectors: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// 저장된 벡터 수
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// 위치별 라벨
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// 위치 `i` 의 벡터
    pub fn vector(&self, i: usize) -> Option<&[f32]> {
        if i >= self.len() {
            return None;
        }
        let start = i * self.dimension;
        Some(&self.vectors[start..start + self.dimension])
    }

    /// 벡터 추가 (호출자가 정규화 책임)
    pub fn add(&mut self, vector: &[f32], label: impl Into<String>) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.vectors.extend_from_slice(vector);
        self.labels.push(label.into());
        Ok(())
    }

    /// top-k 전수 검색
    ///
    /// 항상 `k` 개의 슬롯을 반환합니다. 저장된 벡터보다 많이 요청하면
    /// 남는 슬롯은 [`NO_MATCH`] 위치를 가집니다. 스코어 내림차순이며,
    /// 동점은 삽입 순서를 유지합니다.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if self.is_empty() {
            return Ok(vec![Neighbor::empty(); k]);
        }
        if query.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<Neighbor> = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(i, row)| Neighbor {
                score: dot_product(row, query),
                position: i as i64,
            })
            .collect();

        // 안정 정렬: 동점은 낮은 위치 우선
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        scored.resize(k, Neighbor::empty());

        Ok(scored)
    }

    /// 파일로 저장 (임시 파일에 쓴 뒤 rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomically(path, |writer| {
            bincode::serialize_into(writer, self)?;
            Ok(())
        })
    }

    /// 파일에서 로드
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let index: FlatIndex = bincode::deserialize_from(BufReader::new(file))?;
        index.check()?;
        Ok(index)
    }

    /// 역직렬화된 내용 검증
    fn check(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(RetrievalError::Corrupted(
                "not a flat index file".to_string(),
            ));
        }
        if self.version != FORMAT_VERSION {
            return Err(RetrievalError::Corrupted(format!(
                "unsupported index format version {}",
                self.version
            )));
        }
        if self.vectors.len() != self.labels.len() * self.dimension {
            return Err(RetrievalError::Corrupted(format!(
                "{} values for {} rows of dimension {}",
                self.vectors.len(),
                self.labels.len(),
                self.dimension
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Persistence Helper
// ============================================================================

/// 같은 디렉토리의 임시 파일에 쓰고 대상 경로로 rename
///
/// 실패 시 임시 파일은 제거되고 대상 파일은 변경되지 않습니다.
pub(crate) fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let tmp_path = tmp_path_for(path);

    let result: Result<()> = (|| {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }

    std::fs::rename(&tmp_path, path).inspect_err(|_| {
        let _ = std::fs::remove_file(&tmp_path);
    })?;

    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 내적
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// 유클리드 노름
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// L2 정규화 (in-place)
///
/// `norm + NORM_EPSILON` 으로 나누므로 영벡터는 영벡터로 남습니다.
pub fn normalize(v: &mut [f32]) {
    let denom = l2_norm(v) + NORM_EPSILON;
    for x in v.iter_mut() {
        *x /= denom;
    }
}

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다. 길이가 다르거나 영벡터면 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product(a, b) / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn unit(v: &[f32]) -> Vec<f32> {
        let mut v = v.to_vec();
        normalize(&mut v);
        v
    }

    fn sample_index() -> FlatIndex {
        let mut index = FlatIndex::new(3);
        index.add(&unit(&[1.0, 0.0, 0.0]), "0_0").unwrap();
        index.add(&unit(&[0.0, 1.0, 0.0]), "0_1").unwrap();
        index.add(&unit(&[1.0, 1.0, 0.0]), "0_2").unwrap();
        index
    }

    #[test]
    fn test_cosine_similarity_same() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) - -1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_empty() {
        let a: Vec<f32> = vec![];
        assert_eq!(cosine_similarity(&a, &a), 0.0);
    }

    #[test]
    fn test_normalize_unit_norm() {
        let v = unit(&[3.0, 4.0]);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-5);
        assert!((v[0] - 0.6).abs() < 1e-5);
    }

    #[test]
    fn test_normalize_zero_vector() {
        let v = unit(&[0.0, 0.0, 0.0]);
        assert!(v.iter().all(|x| *x == 0.0 && x.is_finite()));
    }

    #[test]
    fn test_search_ranking() {
        let index = sample_index();
        let results = index.search(&unit(&[1.0, 0.2, 0.0]), 3).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].position(), Some(0));
        assert_eq!(results[1].position(), Some(2));
        assert_eq!(results[2].position(), Some(1));
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_search_pads_with_no_match() {
        let index = sample_index();
        let results = index.search(&unit(&[0.0, 1.0, 0.0]), 5).unwrap();

        assert_eq!(results.len(), 5);
        assert_eq!(results[0].position(), Some(1));
        assert_eq!(results[3].position, NO_MATCH);
        assert_eq!(results[4].position(), None);
    }

    #[test]
    fn test_search_empty_index() {
        let index = FlatIndex::new(0);
        let results = index.search(&[], 3).unwrap();
        assert!(results.iter().all(|n| n.position == NO_MATCH));
    }

    #[test]
    fn test_search_ties_keep_insertion_order() {
        let mut index = FlatIndex::new(2);
        index.add(&[1.0, 0.0], "a").unwrap();
        index.add(&[1.0, 0.0], "b").unwrap();
        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].position(), Some(0));
        assert_eq!(results[1].position(), Some(1));
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = sample_index();
        assert!(matches!(
            index.add(&[1.0, 0.0], "bad"),
            Err(RetrievalError::DimensionMismatch { expected: 3, actual: 2 })
        ));
        assert!(matches!(
            index.search(&[1.0], 1),
            Err(RetrievalError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_save_and_open() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.bin");

        let index = sample_index();
        index.save(&path).unwrap();

        let loaded = FlatIndex::open(&path).unwrap();
        assert_eq!(loaded, index);
        assert_eq!(loaded.labels(), &["0_0", "0_1", "0_2"]);
        assert!(!tmp_path_for(&path).exists());
    }

    #[test]
    fn test_open_garbage_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.bin");
        std::fs::write(&path, b"definitely not an index").unwrap();

        assert!(FlatIndex::open(&path).is_err());
    }
}
