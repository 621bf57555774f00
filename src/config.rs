//! 설정 - 환경변수 기반
//!
//! | 변수 | 기본값 |
//! |---|---|
//! | `STUDYMATE_DATA_DIR` | `<data_local_dir>/.studymate` |
//! | `STUDYMATE_EMBEDDER` | `gemini` (API 키 없으면 `hash`) |
//! | `STUDYMATE_CHUNK_SIZE` | 500 |
//! | `STUDYMATE_OVERLAP` | 100 |
//! | `STUDYMATE_TOP_K` | 3 |
//! | `HF_MODEL_ID`, `HF_TOKEN` | 없음 |

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::embedding::{has_api_key, EmbedderKind};
use crate::knowledge::ChunkConfig;

/// 기본 검색 개수
pub const DEFAULT_TOP_K: usize = 3;

/// 데이터 디렉토리 경로 (~/.studymate/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".studymate")
}

/// 실행 설정
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub embedder: EmbedderKind,
    pub chunk: ChunkConfig,
    pub top_k: usize,
    pub hf_model_id: Option<String>,
    pub hf_token: Option<String>,
}

impl Settings {
    /// 프로세스 환경변수에서 로드
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 조회 함수로 로드 (테스트용으로 분리)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = get("STUDYMATE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(get_data_dir);

        let embedder = match get("STUDYMATE_EMBEDDER") {
            Some(value) => value.parse()?,
            None if has_api_key() => EmbedderKind::Gemini,
            None => EmbedderKind::Hash,
        };

        let defaults = ChunkConfig::default();
        let chunk_size = parse_usize(get("STUDYMATE_CHUNK_SIZE"), "STUDYMATE_CHUNK_SIZE")?
            .unwrap_or(defaults.chunk_size);
        let overlap = parse_usize(get("STUDYMATE_OVERLAP"), "STUDYMATE_OVERLAP")?
            .unwrap_or(defaults.overlap);
        let chunk = ChunkConfig::new(chunk_size, overlap)?;

        let top_k = parse_usize(get("STUDYMATE_TOP_K"), "STUDYMATE_TOP_K")?.unwrap_or(DEFAULT_TOP_K);
        if top_k == 0 {
            anyhow::bail!("STUDYMATE_TOP_K must be positive");
        }

        Ok(Self {
            data_dir,
            embedder,
            chunk,
            top_k,
            hf_model_id: get("HF_MODEL_ID"),
            hf_token: get("HF_TOKEN"),
        })
    }

    /// 인덱스 디렉토리 (`<data_dir>/index`)
    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("index")
    }

    /// 트랜스크립트 디렉토리 (`<data_dir>/transcripts`)
    pub fn transcript_dir(&self) -> PathBuf {
        self.data_dir.join("transcripts")
    }
}

fn parse_usize(value: Option<String>, key: &str) -> Result<Option<usize>> {
    value
        .map(|v| {
            v.trim()
                .parse::<usize>()
                .with_context(|| format!("{} must be a non-negative integer, got '{}'", key, v))
        })
        .transpose()
}

// ============================================================================
// Tests
// ============================================================================
