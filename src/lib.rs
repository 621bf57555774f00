//! studymate - PDF 질의응답 시스템
//!
//! PDF 페이지를 겹치는 단어 윈도우로 청킹하고, 정규화된 임베딩의
//! 평면 내적 인덱스로 유사 청크를 찾아 생성 모델에 전달합니다.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod extractor;
pub mod generation;
pub mod knowledge;
pub mod transcript;

// Re-exports
pub use config::{get_data_dir, Settings};
pub use embedding::{
    create_embedder, get_api_key, has_api_key, EmbedderKind, EmbeddingProvider, GeminiEmbedding,
    HashEmbedding,
};
pub use extractor::{DocumentReader, ExtractedDocument, PdfReader};
pub use generation::{build_prompt, HuggingFaceGenerator, TextGenerator};
pub use knowledge::{
    chunk, Answer, Chunk, ChunkConfig, EmbedIndex, FlatIndex, IngestStats, QueryResult,
    RetrievalError, Retriever,
};
pub use transcript::{SessionHistory, TranscriptEntry};
