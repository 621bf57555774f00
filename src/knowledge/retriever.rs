//! Retriever - 문서 수집 → 인덱스 → 질의응답 오케스트레이션
//!
//! PDF 를 페이지로 추출하고 청킹하여 `EmbedIndex` 를 통째로 재구성합니다.
//! 질문 시에는 상위 청크를 찾아 프롬프트를 만들고 생성기를 호출합니다.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::config::Settings;
use crate::embedding::create_embedder;
use crate::extractor::{read_document, DocumentReader, ExtractedDocument, PdfReader};
use crate::generation::{build_prompt, TextGenerator};

use super::chunker::{Chunk, ChunkConfig};
use super::index::{EmbedIndex, QueryResult};

// ============================================================================
// Types
// ============================================================================

/// 수집 통계
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub documents: usize,
    pub pages: usize,
    pub chunks: usize,
}

/// 질의응답 결과
#[derive(Debug, Clone)]
pub struct Answer {
    /// 생성된 답변 (검색 결과가 없으면 None, 생성기를 호출하지 않음)
    pub text: Option<String>,
    /// 참조된 청크
    pub results: Vec<QueryResult>,
}

// ============================================================================
// Retriever
// ============================================================================

/// 검색 오케스트레이터
pub struct Retriever {
    index: EmbedIndex,
    reader: Box<dyn DocumentReader>,
    chunk_config: ChunkConfig,
}

impl Retriever {
    pub fn new(index: EmbedIndex, reader: Box<dyn DocumentReader>, chunk_config: ChunkConfig) -> Self {
        Self {
            index,
            reader,
            chunk_config,
        }
    }

    /// 설정으로 생성
    ///
    /// 디스크에 인덱스가 있으면 자동으로 로드합니다. 로드 실패는 경고만 남기고
    /// 준비되지 않은 상태로 계속합니다.
    pub fn open(settings: &Settings) -> Result<Self> {
        let embedder = create_embedder(settings.embedder).context("Failed to create embedder")?;
        let mut index = EmbedIndex::in_dir(embedder, &settings.index_dir());

        if index.artifacts_exist() {
            match index.load() {
                Ok(()) => tracing::info!("Existing index loaded automatically"),
                Err(e) => tracing::warn!("Could not auto-load index: {}", e),
            }
        }

        Ok(Self::new(index, Box::new(PdfReader), settings.chunk))
    }

    pub fn index(&self) -> &EmbedIndex {
        &self.index
    }

    pub fn chunk_config(&self) -> ChunkConfig {
        self.chunk_config
    }

    /// 청킹 설정 변경 (검증 후)
    pub fn set_chunk_config(&mut self, config: ChunkConfig) -> Result<()> {
        config.validate()?;
        self.chunk_config = config;
        Ok(())
    }

    /// 추출된 문서들로 인덱스 재구성
    pub async fn ingest_documents(&mut self, documents: &[ExtractedDocument]) -> Result<IngestStats> {
        let mut all_chunks: Vec<Chunk> = Vec::new();
        let mut stats = IngestStats::default();

        for doc in documents {
            let chunks = self
                .chunk_config
                .chunk_pages(&doc.source, &doc.pages)
                .with_context(|| format!("Failed to chunk {}", doc.source))?;

            tracing::info!(
                "{}: {} pages -> {} chunks",
                doc.source,
                doc.pages.len(),
                chunks.len()
            );

            stats.documents += 1;
            stats.pages += doc.pages.len();
            stats.chunks += chunks.len();
            all_chunks.extend(chunks);
        }

        self.index
            .build(all_chunks)
            .await
            .context("Failed to build index")?;

        Ok(stats)
    }

    /// PDF 파일들을 읽어 인덱스 재구성
    pub async fn ingest_files(&mut self, paths: &[PathBuf]) -> Result<IngestStats> {
        if paths.is_empty() {
            bail!("Upload 1+ PDF to build index");
        }

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            documents.push(read_document(self.reader.as_ref(), path).await?);
        }

        self.ingest_documents(&documents).await
    }

    /// 상위 k 청크 검색
    pub async fn search(&self, question: &str, top_k: usize) -> Result<Vec<QueryResult>> {
        Ok(self.index.query(question, top_k).await?)
    }

    /// 질문에 답변
    ///
    /// 검색 결과가 없으면 생성기를 호출하지 않습니다.
    pub async fn ask(
        &self,
        generator: &dyn TextGenerator,
        question: &str,
        top_k: usize,
    ) -> Result<Answer> {
        if question.trim().is_empty() {
            bail!("Type a question first");
        }

        let results = self
            .search(question, top_k)
            .await
            .context("Failed to query index")?;

        if results.is_empty() {
            return Ok(Answer {
                text: None,
                results,
            });
        }

        let prompt = build_prompt(question, &results);
        let text = generator
            .generate(&prompt)
            .await
            .with_context(|| format!("LLM call failed ({})", generator.name()))?;

        Ok(Answer {
            text: Some(text),
            results,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::embedding::HashEmbedding;
    use crate::knowledge::RetrievalError;

    /// 프롬프트를 기록하고 고정 답변을 돌려주는 생성기
    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingGenerator {
        fn new() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextGenerator for RecordingGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("stub answer".to_string())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn retriever(dir: &TempDir, config: ChunkConfig) -> Retriever {
        let index = EmbedIndex::in_dir(Box::new(HashEmbedding::new(64).unwrap()), dir.path());
        Retriever::new(index, Box::new(PdfReader), config)
    }

    fn documents() -> Vec<ExtractedDocument> {
        vec![
            ExtractedDocument {
                source: "biology.pdf".to_string(),
                pages: vec![
                    "Cells are the basic unit of life. Mitochondria produce ATP.".to_string(),
                    String::new(),
                    "Ribosomes synthesize proteins from amino acids.".to_string(),
                ],
            },
            ExtractedDocument {
                source: "history.pdf".to_string(),
                pages: vec!["The Roman Empire fell in 476 AD.".to_string()],
            },
        ]
    }

    #[tokio::test]
    async fn test_ingest_and_ask() {
        let dir = TempDir::new().unwrap();
        let mut retriever = retriever(&dir, ChunkConfig::new(6, 2).unwrap());

        let stats = retriever.ingest_documents(&documents()).await.unwrap();
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.pages, 4);
        assert_eq!(stats.chunks, retriever.index().len());

        let generator = RecordingGenerator::new();
        let answer = retriever
            .ask(&generator, "What do ribosomes synthesize?", 2)
            .await
            .unwrap();

        assert_eq!(answer.text.as_deref(), Some("stub answer"));
        assert!(answer.results.len() <= 2);
        assert_eq!(answer.results[0].chunk.source, "biology.pdf");
        assert_eq!(answer.results[0].chunk.page_id, 2);

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].starts_with("Answer the question based on the context:\n"));
        assert!(prompts[0].ends_with("Question: What do ribosomes synthesize?"));
    }

    #[tokio::test]
    async fn test_ask_before_build_is_not_ready() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir, ChunkConfig::default());
        let generator = RecordingGenerator::new();

        let err = retriever.ask(&generator, "anything?", 3).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RetrievalError>(),
            Some(RetrievalError::NotReady)
        ));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_ask_empty_index_skips_generation() {
        let dir = TempDir::new().unwrap();
        let mut retriever = retriever(&dir, ChunkConfig::default());
        retriever.ingest_documents(&[]).await.unwrap();

        let generator = RecordingGenerator::new();
        let answer = retriever.ask(&generator, "anything?", 3).await.unwrap();
        assert!(answer.text.is_none());
        assert!(answer.results.is_empty());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir, ChunkConfig::default());
        let generator = RecordingGenerator::new();

        assert!(retriever.ask(&generator, "   ", 3).await.is_err());
    }

    #[tokio::test]
    async fn test_ingest_no_files_rejected() {
        let dir = TempDir::new().unwrap();
        let mut retriever = retriever(&dir, ChunkConfig::default());
        assert!(retriever.ingest_files(&[]).await.is_err());
    }

    #[test]
    fn test_set_chunk_config_validates() {
        let dir = TempDir::new().unwrap();
        let mut retriever = retriever(&dir, ChunkConfig::default());

        let bad = ChunkConfig {
            chunk_size: 100,
            overlap: 100,
        };
        assert!(retriever.set_chunk_config(bad).is_err());
        assert_eq!(retriever.chunk_config(), ChunkConfig::default());
    }
}
