//! CLI 모듈
//!
//! studymate CLI 명령어 정의 및 구현

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::config::Settings;
use crate::embedding::has_api_key;
use crate::generation::{HuggingFaceGenerator, TextGenerator};
use crate::knowledge::{Answer, ChunkConfig, QueryResult, Retriever};
use crate::transcript::SessionHistory;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "studymate")]
#[command(version, about = "PDF 질의응답 (청킹 + 벡터 인덱스 + LLM)", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// PDF 파일로 인덱스 재구성
    Build {
        /// PDF 파일 경로 (1개 이상)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// 청크 크기 (단어 수)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// 청크 간 중첩 (단어 수)
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// 유사 청크 검색 (생성 없음)
    Search {
        /// 검색 쿼리
        query: String,

        /// 가져올 청크 수
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// 질문에 답변
    Ask {
        /// 질문
        question: String,

        /// 가져올 청크 수
        #[arg(short, long)]
        k: Option<usize>,

        /// 트랜스크립트 저장
        #[arg(long)]
        save_transcript: bool,
    },

    /// 대화형 세션 (종료 시 트랜스크립트 저장)
    Chat {
        /// 가져올 청크 수
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env().context("설정 로드 실패")?;

    match cli.command {
        Commands::Build {
            files,
            chunk_size,
            overlap,
        } => cmd_build(&settings, files, chunk_size, overlap).await,
        Commands::Search { query, k } => {
            cmd_search(&settings, &query, k.unwrap_or(settings.top_k)).await
        }
        Commands::Ask {
            question,
            k,
            save_transcript,
        } => cmd_ask(&settings, &question, k.unwrap_or(settings.top_k), save_transcript).await,
        Commands::Chat { k } => cmd_chat(&settings, k.unwrap_or(settings.top_k)).await,
        Commands::Status => cmd_status(&settings),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 인덱스 구축 명령어 (build)
async fn cmd_build(
    settings: &Settings,
    files: Vec<PathBuf>,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
) -> Result<()> {
    let mut retriever = Retriever::open(settings).context("Retriever 초기화 실패")?;

    let config = ChunkConfig::new(
        chunk_size.unwrap_or(settings.chunk.chunk_size),
        overlap.unwrap_or(settings.chunk.overlap),
    )?;
    retriever.set_chunk_config(config)?;

    println!(
        "[*] {} 개 PDF 처리 중 (청크 {} 단어, 중첩 {} 단어)...",
        files.len(),
        config.chunk_size,
        config.overlap
    );

    let stats = retriever
        .ingest_files(&files)
        .await
        .context("인덱스 구축 실패")?;

    println!("[OK] 인덱스 구축 및 저장 완료");
    println!(
        "     문서 {}, 페이지 {}, 청크 {}",
        stats.documents, stats.pages, stats.chunks
    );
    println!("     {}", retriever.index().index_path().display());

    Ok(())
}

/// 검색 명령어 (search)
async fn cmd_search(settings: &Settings, query: &str, k: usize) -> Result<()> {
    let retriever = Retriever::open(settings).context("Retriever 초기화 실패")?;
    ensure_ready(&retriever)?;

    println!("[*] 검색 중: \"{}\"", query);

    let results = retriever.search(query, k).await.context("검색 실패")?;

    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());
    print_results(&results);

    Ok(())
}

/// 질문 명령어 (ask)
async fn cmd_ask(settings: &Settings, question: &str, k: usize, save_transcript: bool) -> Result<()> {
    let retriever = Retriever::open(settings).context("Retriever 초기화 실패")?;
    ensure_ready(&retriever)?;
    let generator = create_generator(settings)?;

    let mut history = SessionHistory::new();
    answer_question(&retriever, &generator, &mut history, question, k).await?;

    if save_transcript && !history.is_empty() {
        let path = history.save(&settings.transcript_dir())?;
        println!("[OK] 트랜스크립트 저장: {}", path.display());
    }

    Ok(())
}

/// 대화형 세션 명령어 (chat)
async fn cmd_chat(settings: &Settings, k: usize) -> Result<()> {
    let retriever = Retriever::open(settings).context("Retriever 초기화 실패")?;
    ensure_ready(&retriever)?;
    let generator = create_generator(settings)?;

    println!("[*] 질문을 입력하세요 (빈 줄 또는 Ctrl-D 로 종료)");

    let mut history = SessionHistory::new();
    let input = BufReader::new(tokio::io::stdin());
    chat_session(&retriever, &generator, &mut history, input, k).await?;

    if !history.is_empty() {
        println!("\n[*] 세션 기록 ({} 건):", history.len());
        for entry in history.latest_first() {
            println!("  {} Q: {}", entry.timestamp, truncate_text(&entry.question, 60));
        }
        let path = history.save(&settings.transcript_dir())?;
        println!("[OK] 트랜스크립트 저장: {}", path.display());
    }

    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status(settings: &Settings) -> Result<()> {
    println!("studymate v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", settings.data_dir.display());
    println!("[*] 임베딩: {:?}", settings.embedder);
    println!(
        "[*] 청킹: {} 단어, 중첩 {} 단어",
        settings.chunk.chunk_size, settings.chunk.overlap
    );

    if has_api_key() {
        println!("[OK] Gemini API 키: 설정됨");
    } else {
        println!("[!] Gemini API 키: 미설정 (로컬 해시 임베딩 사용 가능)");
    }

    match settings.hf_model_id {
        Some(ref model) => println!("[OK] 생성 모델: {}", model),
        None => println!("[!] 생성 모델: 미설정 (export HF_MODEL_ID=google/flan-t5-small)"),
    }

    match Retriever::open(settings) {
        Ok(retriever) => {
            let index = retriever.index();
            if index.is_ready() {
                println!(
                    "[OK] 인덱스: {} 청크 (차원 {}, {})",
                    index.len(),
                    index.dimension().unwrap_or(0),
                    index.encoder_name()
                );
            } else {
                println!("[!] 인덱스: 없음 (studymate build <pdf>...)");
            }
        }
        Err(e) => {
            tracing::debug!("Retriever 초기화 실패: {}", e);
            println!("[!] 인덱스: 확인 실패 ({})", e);
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn ensure_ready(retriever: &Retriever) -> Result<()> {
    if !retriever.index().is_ready() {
        bail!("인덱스가 없습니다. 먼저 실행하세요: studymate build <pdf>...");
    }
    Ok(())
}

fn create_generator(settings: &Settings) -> Result<HuggingFaceGenerator> {
    HuggingFaceGenerator::new(
        settings.hf_model_id.as_deref().unwrap_or_default(),
        settings.hf_token.clone(),
    )
    .context("LLM 생성기 초기화 실패. HF_MODEL_ID / HF_TOKEN 을 확인하세요")
}

/// 입력이 끝나거나 빈 줄이 올 때까지 질문 처리
///
/// 한 질문의 실패는 세션을 끝내지 않고 `Error: ...` 답변으로 기록됩니다.
async fn chat_session<R: AsyncBufRead + Unpin>(
    retriever: &Retriever,
    generator: &dyn TextGenerator,
    history: &mut SessionHistory,
    input: R,
    k: usize,
) -> Result<()> {
    let mut lines = input.lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            break;
        }

        if let Err(e) = answer_question(retriever, generator, history, question, k).await {
            println!("[!] {:#}", e);
            history.record(question, &format!("Error: {:#}", e));
        }
    }

    Ok(())
}

/// 질문 하나 처리 후 출력 및 기록
async fn answer_question(
    retriever: &Retriever,
    generator: &dyn TextGenerator,
    history: &mut SessionHistory,
    question: &str,
    k: usize,
) -> Result<()> {
    let Answer { text, results } = retriever.ask(generator, question, k).await?;

    let Some(answer) = text else {
        println!("[!] 질문에 답할 청크를 찾지 못했습니다.");
        return Ok(());
    };

    println!("\n[답변]\n{}\n", answer);
    println!("[참조 청크]");
    print_results(&results);

    history.record(question, &answer);
    Ok(())
}

fn print_results(results: &[QueryResult]) {
    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. {} (chunk {}) [점수: {:.4}]",
            i + 1,
            result.chunk.source,
            result.chunk.chunk_id,
            result.score
        );
        println!("   {}", truncate_text(&result.chunk.text, 200));
        println!();
    }
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// Tests
// ============================================================================
