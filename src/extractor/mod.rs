//! 문서 추출 모듈
//!
//! 바이너리 문서 스트림에서 페이지별 평문을 추출합니다.

pub mod pdf;

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

// ============================================================================
// DocumentReader Trait
// ============================================================================

/// 문서 리더 트레이트
#[async_trait]
pub trait DocumentReader: Send + Sync {
    /// 바이트 스트림 → 페이지 순서의 텍스트
    async fn extract_pages(&self, bytes: Vec<u8>) -> Result<Vec<String>>;
}

// ============================================================================
// PdfReader
// ============================================================================

/// pdf-extract 기반 PDF 리더
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfReader;

#[async_trait]
impl DocumentReader for PdfReader {
    async fn extract_pages(&self, bytes: Vec<u8>) -> Result<Vec<String>> {
        // PDF 파싱은 CPU 바운드이므로 spawn_blocking 사용
        tokio::task::spawn_blocking(move || pdf::extract_pages_from_pdf(&bytes))
            .await
            .context("PDF extraction task failed")?
    }
}

// ============================================================================
// Document
// ============================================================================

/// 추출된 문서
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// 소스 이름 (파일명)
    pub source: String,
    /// 페이지별 텍스트
    pub pages: Vec<String>,
}

/// 파일에서 문서 읽기
///
/// 소스 이름은 경로의 파일명입니다.
pub async fn read_document(reader: &dyn DocumentReader, path: &Path) -> Result<ExtractedDocument> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read document: {:?}", path))?;

    let pages = reader
        .extract_pages(bytes)
        .await
        .with_context(|| format!("Failed to extract pages: {:?}", path))?;

    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    tracing::debug!("Extracted {} pages from {}", pages.len(), source);

    Ok(ExtractedDocument { source, pages })
}

// ============================================================================
// Tests
// ============================================================================
