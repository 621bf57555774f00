//! 답변 생성 모듈
//!
//! 검색된 청크로 프롬프트를 만들고 텍스트 생성 모델을 호출합니다.
//! 생성기는 명시적으로 생성/소유되는 값이며 전역 상태가 아닙니다.
//! 모델 ID 가 없으면 생성 시점에 실패합니다.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::knowledge::QueryResult;

/// Hugging Face Inference API 엔드포인트
const HF_INFERENCE_URL: &str = "https://api-inference.huggingface.co/models";

/// 생성 토큰 상한
pub const DEFAULT_MAX_NEW_TOKENS: usize = 500;

// ============================================================================
// TextGenerator Trait
// ============================================================================

/// 텍스트 생성기 트레이트
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// 프롬프트 → 완성 텍스트
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// 모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Prompt Assembly
// ============================================================================

/// 컨텍스트 청크와 질문으로 프롬프트 구성
pub fn build_prompt(question: &str, results: &[QueryResult]) -> String {
    let context = results
        .iter()
        .map(|r| r.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Answer the question based on the context:\n{}\n\nQuestion: {}",
        context, question
    )
}

// ============================================================================
// Hugging Face Generator
// ============================================================================

/// Hugging Face 호스팅 추론 API 생성기 (text2text-generation)
#[derive(Debug)]
pub struct HuggingFaceGenerator {
    model_id: String,
    token: Option<String>,
    max_new_tokens: usize,
    client: reqwest::Client,
}

impl HuggingFaceGenerator {
    /// 생성기 생성
    ///
    /// # Arguments
    /// * `model_id` - 모델 ID (예: `google/flan-t5-small`)
    /// * `token` - 액세스 토큰 (비어 있으면 익명 호출)
    pub fn new(model_id: &str, token: Option<String>) -> Result<Self> {
        let model_id = model_id.trim();
        if model_id.is_empty() {
            bail!("HF_MODEL_ID not set");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            model_id: model_id.to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            client,
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    max_new_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    #[serde(default)]
    generated_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InferenceError {
    error: String,
}

/// 추론 API 응답 본문에서 생성 텍스트 추출
fn parse_generation(body: &str) -> Result<String> {
    let outputs: Vec<GeneratedText> =
        serde_json::from_str(body).context("Failed to parse generation response")?;

    match outputs.into_iter().next().and_then(|o| o.generated_text) {
        Some(text) => Ok(text.trim().to_string()),
        None => Ok("No response generated.".to_string()),
    }
}

#[async_trait]
impl TextGenerator for HuggingFaceGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/{}", HF_INFERENCE_URL, self.model_id);
        let request = InferenceRequest {
            inputs: prompt,
            parameters: InferenceParameters {
                max_new_tokens: self.max_new_tokens,
            },
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(ref token) = self.token {
            builder = builder.bearer_auth(token);
        }

        tracing::debug!("Calling {} ({} prompt chars)", self.model_id, prompt.len());

        let response = builder
            .send()
            .await
            .context("Failed to send generation request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<InferenceError>(&body) {
                bail!("Hugging Face API error ({}): {}", status, error.error);
            }
            bail!("Hugging Face API error ({}): {}", status, body);
        }

        parse_generation(&body)
    }

    fn name(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Tests
// ============================================================================
