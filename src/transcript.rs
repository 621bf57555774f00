//! 세션 기록 - 질문/답변 트랜스크립트 저장
//!
//! 저장 위치: `<data_dir>/transcripts/transcript_YYYYmmdd_HHMMSS.json`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};

/// 타임스탬프 포맷
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 현재 시각 문자열
pub fn timestamp_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// 기록 엔트리
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub timestamp: String,
    pub question: String,
    pub answer: String,
}

/// 세션 기록
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    entries: Vec<TranscriptEntry>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 현재 시각으로 엔트리 추가
    pub fn record(&mut self, question: &str, answer: &str) -> &TranscriptEntry {
        self.entries.push(TranscriptEntry {
            timestamp: timestamp_now(),
            question: question.to_string(),
            answer: answer.to_string(),
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 최신순 순회
    pub fn latest_first(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter().rev()
    }

    /// `dir` 아래에 JSON 트랜스크립트 저장 후 파일 경로 반환
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create transcript directory: {:?}", dir))?;

        let filename = format!("transcript_{}.json", Local::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(filename);

        let json = serde_json::to_string_pretty(&self.entries)
            .context("Failed to serialize transcript")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write transcript: {:?}", path))?;

        tracing::info!("Saved transcript ({} entries) to {:?}", self.len(), path);
        Ok(path)
    }

    /// 저장된 트랜스크립트 로드
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read transcript: {:?}", path))?;
        let entries = serde_json::from_str(&json).context("Failed to parse transcript")?;
        Ok(Self { entries })
    }
}

// ============================================================================
// Tests
// ============================================================================
