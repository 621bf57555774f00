//! Embed Index - 청크 임베딩 + 평면 내적 인덱스 + 메타데이터
//!
//! 두 개의 아티팩트로 영속화됩니다:
//! - 벡터 구조 (`index.bin`, bincode)
//! - 위치 정렬된 청크 메타데이터 (`meta.json`)
//!
//! 위치 `i` 의 벡터는 위치 `i` 의 청크입니다. 벡터 파일은 각 행의
//! chunk_id 를 함께 저장하므로 로드 시 두 파일의 정렬을 검증합니다.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::embedding::EmbeddingProvider;

use super::chunker::Chunk;
use super::error::{Result, RetrievalError};
use super::vector::{normalize, write_atomically, FlatIndex};

// ============================================================================
// Types
// ============================================================================

/// 쿼리 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// 내적 유사도 (단위 벡터 → 코사인)
    pub score: f32,
    /// 매칭된 청크
    pub chunk: Chunk,
}

/// 메모리에 올라온 인덱스 상태
struct Loaded {
    index: FlatIndex,
    metadata: Vec<Chunk>,
}

// ============================================================================
// EmbedIndex
// ============================================================================

/// 임베딩 인덱스
///
/// `build` / `load` 는 `&mut self`, `query` 는 `&self` 이므로 동시 변경은
/// 컴파일 시점에 막힙니다. 여러 태스크에서 공유하려면 호출자가 락으로 감쌉니다.
pub struct EmbedIndex {
    encoder: Box<dyn EmbeddingProvider>,
    index_path: PathBuf,
    meta_path: PathBuf,
    state: Option<Loaded>,
}

impl EmbedIndex {
    /// 인덱스 생성 (아직 빌드/로드되지 않은 상태)
    ///
    /// # Arguments
    /// * `encoder` - 텍스트 인코더
    /// * `index_path` - 벡터 구조 파일 경로
    /// * `meta_path` - 메타데이터 파일 경로
    pub fn new(
        encoder: Box<dyn EmbeddingProvider>,
        index_path: impl Into<PathBuf>,
        meta_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            encoder,
            index_path: index_path.into(),
            meta_path: meta_path.into(),
            state: None,
        }
    }

    /// 디렉토리 아래 기본 파일명(`index.bin`, `meta.json`)으로 생성
    pub fn in_dir(encoder: Box<dyn EmbeddingProvider>, dir: &Path) -> Self {
        Self::new(encoder, dir.join("index.bin"), dir.join("meta.json"))
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn meta_path(&self) -> &Path {
        &self.meta_path
    }

    /// 인코더 이름
    pub fn encoder_name(&self) -> &str {
        self.encoder.name()
    }

    /// 두 아티팩트가 모두 디스크에 있는지
    pub fn artifacts_exist(&self) -> bool {
        self.index_path.exists() && self.meta_path.exists()
    }

    /// build() 또는 load() 가 성공했는지
    pub fn is_ready(&self) -> bool {
        self.state.is_some()
    }

    /// 저장된 청크 수 (준비되지 않았으면 0)
    pub fn len(&self) -> usize {
        self.state.as_ref().map(|s| s.metadata.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 벡터 차원 (준비되지 않았으면 None)
    pub fn dimension(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.index.dimension())
    }

    /// 저장된 청크 (위치 순서)
    pub fn chunks(&self) -> &[Chunk] {
        self.state
            .as_ref()
            .map(|s| s.metadata.as_slice())
            .unwrap_or(&[])
    }

    /// 위치 `i` 의 저장 벡터
    pub fn vector(&self, i: usize) -> Option<&[f32]> {
        self.state.as_ref().and_then(|s| s.index.vector(i))
    }

    /// 텍스트 배치를 인코딩 후 정규화
    async fn encode_normalized(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = self
            .encoder
            .embed_batch(texts)
            .await
            .map_err(RetrievalError::Encoding)?;

        if vectors.len() != texts.len() {
            return Err(RetrievalError::Encoding(anyhow::anyhow!(
                "{} returned {} vectors for {} texts",
                self.encoder.name(),
                vectors.len(),
                texts.len()
            )));
        }

        for v in vectors.iter_mut() {
            normalize(v);
        }
        Ok(vectors)
    }

    /// 청크로 인덱스 전체 재구성 및 저장
    ///
    /// 인코딩 → L2 정규화 → 평면 내적 구조 → 두 아티팩트 저장 순으로 진행하며,
    /// 모든 단계가 성공한 뒤에야 메모리 상태를 교체합니다.
    /// 빈 입력은 차원 0 의 빈 인덱스가 됩니다.
    pub async fn build(&mut self, chunks: Vec<Chunk>) -> Result<()> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.encode_normalized(&texts).await?
        };

        let dimension = vectors.first().map(|v| v.len()).unwrap_or(0);
        let mut index = FlatIndex::new(dimension);
        for (vector, chunk) in vectors.iter().zip(chunks.iter()) {
            index.add(vector, row_label(chunk))?;
        }

        self.persist(&index, &chunks)?;

        tracing::info!(
            "Built index: {} chunks, dimension {} ({})",
            chunks.len(),
            dimension,
            self.index_path.display()
        );

        self.state = Some(Loaded {
            index,
            metadata: chunks,
        });
        Ok(())
    }

    /// 두 아티팩트 저장 (디렉토리 생성 포함)
    fn persist(&self, index: &FlatIndex, metadata: &[Chunk]) -> Result<()> {
        for path in [&self.index_path, &self.meta_path] {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        index.save(&self.index_path)?;
        write_atomically(&self.meta_path, |writer| {
            serde_json::to_writer(writer, metadata)?;
            Ok(())
        })
    }

    /// 저장된 아티팩트 로드
    ///
    /// 어느 하나라도 없으면 `NotFound`. 실패 시 기존 메모리 상태는 유지됩니다.
    pub fn load(&mut self) -> Result<()> {
        if !self.artifacts_exist() {
            return Err(RetrievalError::NotFound {
                index: self.index_path.clone(),
                meta: self.meta_path.clone(),
            });
        }

        let index = FlatIndex::open(&self.index_path)?;
        let metadata: Vec<Chunk> =
            serde_json::from_reader(BufReader::new(File::open(&self.meta_path)?))?;

        check_alignment(&index, &metadata)?;

        tracing::info!(
            "Loaded index: {} chunks, dimension {}",
            metadata.len(),
            index.dimension()
        );

        self.state = Some(Loaded { index, metadata });
        Ok(())
    }

    /// 유사 청크 top-k 검색
    ///
    /// 스코어 내림차순이며 결과 수는 `top_k` 이하입니다.
    /// 빈 슬롯(`NO_MATCH`)은 건너뜁니다.
    pub async fn query(&self, text: &str, top_k: usize) -> Result<Vec<QueryResult>> {
        let state = self.state.as_ref().ok_or(RetrievalError::NotReady)?;

        if top_k == 0 {
            return Err(RetrievalError::InvalidConfiguration(
                "top_k must be positive".to_string(),
            ));
        }

        if state.metadata.is_empty() {
            return Ok(Vec::new());
        }

        let mut encoded = self.encode_normalized(&[text.to_string()]).await?;
        let query_vector = encoded
            .pop()
            .ok_or_else(|| RetrievalError::Encoding(anyhow::anyhow!("empty query encoding")))?;

        let neighbors = state.index.search(&query_vector, top_k)?;

        let results: Vec<QueryResult> = neighbors
            .into_iter()
            .filter_map(|n| {
                let position = n.position()?;
                state.metadata.get(position).map(|chunk| QueryResult {
                    score: n.score,
                    chunk: chunk.clone(),
                })
            })
            .collect();

        tracing::debug!("Query returned {} results (top_k={})", results.len(), top_k);
        Ok(results)
    }
}

/// 벡터 행 라벨: 소스 + chunk_id (chunk_id 는 문서 간에 겹침)
fn row_label(chunk: &Chunk) -> String {
    format!("{}#{}", chunk.source, chunk.chunk_id)
}

/// 벡터 파일과 메타데이터 파일의 위치 정렬 검증
fn check_alignment(index: &FlatIndex, metadata: &[Chunk]) -> Result<()> {
    if index.len() != metadata.len() {
        return Err(RetrievalError::Corrupted(format!(
            "{} vectors but {} metadata records",
            index.len(),
            metadata.len()
        )));
    }

    for (i, (label, chunk)) in index.labels().iter().zip(metadata).enumerate() {
        let expected = row_label(chunk);
        if *label != expected {
            return Err(RetrievalError::Corrupted(format!(
                "position {}: vector label '{}' != metadata '{}'",
                i, label, expected
            )));
        }
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
