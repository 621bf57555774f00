//! Retrieval 에러 타입
//!
//! 청킹/인덱스 계층의 모든 실패를 구분 가능한 조건으로 노출합니다.
//! 인코더 에러는 감싸지 않고 그대로 전달합니다.

use std::path::PathBuf;

use thiserror::Error;

/// Retrieval 서브시스템 에러
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// 진행 불가능한 파라미터 (overlap >= chunk_size, top_k == 0 등)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// 영속 아티팩트 중 하나 이상이 없음
    #[error("Index or metadata not found ({index:?}, {meta:?}); build the index first")]
    NotFound { index: PathBuf, meta: PathBuf },

    /// build()/load() 이전에 query() 호출
    #[error("Index not loaded. Call load() or build() first")]
    NotReady,

    /// 외부 텍스트 인코더 실패 (원인 그대로)
    #[error(transparent)]
    Encoding(anyhow::Error),

    /// 쿼리/입력 벡터 차원 불일치
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// 두 아티팩트의 정렬이 깨졌거나 형식이 잘못됨
    #[error("Index artifacts are corrupted: {0}")]
    Corrupted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Index format error: {0}")]
    Format(#[from] bincode::Error),
}

/// Retrieval 결과 타입
pub type Result<T> = std::result::Result<T, RetrievalError>;
