//! Knowledge 모듈 - 청킹 + 벡터 인덱스 기반 검색
//!
//! - Chunker: 페이지별 겹치는 단어 윈도우
//! - FlatIndex: 정규화 벡터의 전수 내적 검색
//! - EmbedIndex: 임베딩 + 영속화 + top-k 쿼리
//! - Retriever: PDF 수집과 질의응답 연결

mod chunker;
mod error;
mod index;
mod retriever;
mod vector;

// Re-exports
pub use chunker::{chunk, Chunk, ChunkConfig};
pub use error::{Result, RetrievalError};
pub use index::{EmbedIndex, QueryResult};
pub use retriever::{Answer, IngestStats, Retriever};
pub use vector::{
    cosine_similarity, dot_product, l2_norm, normalize, FlatIndex, Neighbor, NORM_EPSILON,
    NO_MATCH,
};
