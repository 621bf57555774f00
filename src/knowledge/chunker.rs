//! Text Chunking Module
//!
//! 페이지 텍스트를 겹치는 고정 크기 단어 윈도우로 분할합니다.
//! 각 청크는 (소스, 페이지, 시작 오프셋) 식별자를 가집니다.

use serde::{Deserialize, Serialize};

use super::error::{Result, RetrievalError};

// ============================================================================
// Chunk
// ============================================================================

/// 검색 단위 청크
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 단어들을 공백 하나로 이은 본문
    pub text: String,
    /// 원본 문서 식별자 (파일명 등)
    pub source: String,
    /// 원본 페이지 인덱스 (0부터 시작)
    pub page_id: usize,
    /// `"{page_id}_{start}"`
    pub chunk_id: String,
}

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정 (단어 수 기준)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// 청크 당 최대 단어 수
    pub chunk_size: usize,
    /// 인접 청크 간 중첩 단어 수
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 100,
        }
    }
}

impl ChunkConfig {
    /// 검증된 설정 생성
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// 윈도우가 전진할 수 있는지 확인
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RetrievalError::InvalidConfiguration(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(RetrievalError::InvalidConfiguration(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// 윈도우 시작 오프셋 간격
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// 페이지 목록을 청크로 분할
    pub fn chunk_pages<S: AsRef<str>>(&self, source_name: &str, pages: &[S]) -> Result<Vec<Chunk>> {
        self.validate()?;

        let step = self.step();
        let mut chunks = Vec::new();

        for (page_id, page) in pages.iter().enumerate() {
            let words: Vec<&str> = page.as_ref().split_whitespace().collect();

            let mut start = 0;
            while start < words.len() {
                let end = (start + self.chunk_size).min(words.len());
                chunks.push(Chunk {
                    text: words[start..end].join(" "),
                    source: source_name.to_string(),
                    page_id,
                    chunk_id: format!("{}_{}", page_id, start),
                });
                start += step;
            }
        }

        tracing::debug!(
            "Chunked {} ({} pages) into {} chunks",
            source_name,
            pages.len(),
            chunks.len()
        );

        Ok(chunks)
    }
}

/// 페이지 텍스트를 겹치는 단어 윈도우 청크로 분할
///
/// # Arguments
/// * `source_name` - 원본 문서 식별자
/// * `pages` - 페이지 순서대로의 텍스트
/// * `chunk_size` - 청크 당 단어 수 (양수)
/// * `overlap` - 청크 간 중첩 단어 수 (`chunk_size` 미만)
///
/// # Errors
/// `overlap >= chunk_size` 이거나 `chunk_size == 0` 이면
/// 어떤 페이지도 처리하기 전에 `InvalidConfiguration` 을 반환합니다.
pub fn chunk<S: AsRef<str>>(
    source_name: &str,
    pages: &[S],
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    ChunkConfig::new(chunk_size, overlap)?.chunk_pages(source_name, pages)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn numbered_words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_chunk_starts_and_tail() {
        let page = numbered_words(1000);
        let chunks = chunk("doc.pdf", &[page], 500, 100).unwrap();

        assert_eq!(chunks.len(), 3);
        let ids: Vec<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["0_0", "0_400", "0_800"]);

        // 마지막 청크는 800..1000 (200 단어)
        let last: Vec<&str> = chunks[2].text.split(' ').collect();
        assert_eq!(last.len(), 200);
        assert_eq!(last[0], "w800");
        assert_eq!(last[199], "w999");
    }

    #[test]
    fn test_chunk_small_window() {
        let chunks = chunk("a.pdf", &["a b c d e f g h i j"], 4, 1).unwrap();

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a b c d", "d e f g", "g h i j", "j"]);
        assert_eq!(chunks[3].chunk_id, "0_9");
    }

    #[test]
    fn test_chunk_no_overlap() {
        let chunks = chunk("a.pdf", &["a b c d e f g h"], 4, 0).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "a b c d");
        assert_eq!(chunks[1].text, "e f g h");
    }

    #[test]
    fn test_chunk_normalizes_whitespace() {
        let chunks = chunk("a.pdf", &["  hello\n\n world\t again  "], 10, 2).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world again");
    }

    #[test]
    fn test_chunk_empty_pages_keep_page_ids() {
        let pages = vec!["", "   \n ", "one two three"];
        let chunks = chunk("paper.pdf", &pages, 2, 1).unwrap();

        assert!(chunks.iter().all(|c| c.page_id == 2));
        assert_eq!(chunks[0].chunk_id, "2_0");
        assert_eq!(chunks[0].source, "paper.pdf");
    }

    #[test]
    fn test_chunk_no_pages() {
        let pages: Vec<String> = vec![];
        assert!(chunk("empty.pdf", &pages, 500, 100).unwrap().is_empty());
    }

    #[test]
    fn test_chunk_order_and_unique_ids() {
        let pages = vec![numbered_words(37), numbered_words(5), numbered_words(64)];
        let chunks = chunk("multi.pdf", &pages, 10, 3).unwrap();

        let ids: HashSet<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids.len(), chunks.len());

        let pages_seen: Vec<usize> = chunks.iter().map(|c| c.page_id).collect();
        let mut sorted = pages_seen.clone();
        sorted.sort();
        assert_eq!(pages_seen, sorted);
    }

    #[test]
    fn test_chunk_count_matches_step() {
        // 모든 시작 오프셋 < n 이므로 ceil(n / step)
        for (n, c, o) in [(1000, 500, 100), (10, 4, 1), (50, 500, 100), (7, 3, 0)] {
            let chunks = chunk("x", &[numbered_words(n)], c, o).unwrap();
            let step = c - o;
            assert_eq!(chunks.len(), n.div_ceil(step), "n={} c={} o={}", n, c, o);
        }
    }

    #[test]
    fn test_overlap_not_smaller_than_size_rejected() {
        let err = chunk("x", &["a b c"], 4, 4).unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidConfiguration(_)));

        let err = chunk("x", &["a b c"], 4, 9).unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let pages: Vec<String> = vec![];
        let err = chunk("x", &pages, 0, 0).unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_config_default() {
        let config = ChunkConfig::default();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.overlap, 100);
        assert_eq!(config.step(), 400);
        assert!(config.validate().is_ok());
    }
}
