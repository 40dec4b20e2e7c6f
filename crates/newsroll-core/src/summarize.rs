//! Hierarchical summarization over a text-generation backend.
//!
//! [`Summarizer::summarize`] renders the items into one numbered block
//! and asks the backend for a single paragraph. When the rendered block
//! is longer than [`HIERARCHICAL_THRESHOLD`] characters, the items are
//! first split into groups of [`CHUNK_SIZE`], each group is summarized
//! on its own with a token budget capped at [`PARTIAL_MAX_TOKENS`], and
//! the final call runs over the joined partial summaries.
//!
//! Summarization is fail-soft: callers only ever see `Some(text)` or
//! `None`. A missing API key, a failed final call, or an empty answer
//! all yield `None`; a failed partial call is dropped from the join.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::chunk::chunk;
use crate::models::Item;

/// Rendered content longer than this (in characters) is summarized hierarchically.
pub const HIERARCHICAL_THRESHOLD: usize = 6000;

/// Items per partial summary.
pub const CHUNK_SIZE: usize = 8;

/// Upper bound on the token budget of a partial summary call.
pub const PARTIAL_MAX_TOKENS: u32 = 800;

/// Separator placed between partial summaries before the final call.
pub const PARTIAL_SEPARATOR: &str = "\n- ";

pub const SYSTEM_PROMPT: &str = "Bạn là trợ lý tóm tắt bằng tiếng Việt, súc tích, rõ ràng, luôn trả về đoạn văn hoàn chỉnh và tôn trọng giới hạn ký tự đã yêu cầu.";

const PROMPT_HEAD: &str = "Bạn là trợ lý tóm tắt tiếng Việt. Hãy viết MỘT đoạn văn tóm tắt hoàn chỉnh, mạch lạc và tự nhiên về nội dung sau, tránh liệt kê khô cứng, không dùng tiêu đề hay mục đánh số. ";

const PROMPT_TAIL: &str = "Chỉ nhắc đến hình ảnh khi thực sự cần để làm rõ ý. Không kết thúc giữa chừng, đảm bảo câu văn trọn vẹn.\n\n";

const PROMPT_CONTENT_LABEL: &str = "Nội dung cần tóm tắt:\n";

/// Resolved backend settings. A missing `api_key` disables summaries.
#[derive(Debug, Clone, PartialEq)]
pub struct SummarySettings {
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens_default: u32,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            max_tokens_default: 1500,
        }
    }
}

/// One backend call.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub api_key: &'a str,
    pub model: &'a str,
    pub system_prompt: &'a str,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Text-generation backend (chat completion or equivalent).
#[async_trait]
pub trait TextBackend: Send + Sync {
    async fn generate(&self, request: &GenerationRequest<'_>) -> anyhow::Result<String>;
}

/// The parts of an item the summarizer reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryItem {
    pub text: Option<String>,
    /// A prior summary; used instead of `text` when present.
    pub summary: Option<String>,
    pub pictures: Vec<String>,
}

impl From<&Item> for SummaryItem {
    fn from(item: &Item) -> Self {
        Self {
            text: item.content_text.clone(),
            summary: item.summary.clone(),
            pictures: item.pictures.clone(),
        }
    }
}

/// Render items as `- Mục N: <text>` lines.
///
/// Items without text are skipped, but numbering follows the position in
/// `items`, so skipped items leave gaps in the sequence.
pub fn build_joined_content(items: &[SummaryItem]) -> String {
    let mut blocks = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let content = item
            .summary
            .as_deref()
            .or(item.text.as_deref())
            .unwrap_or("")
            .trim();
        if content.is_empty() {
            continue;
        }

        let images = if item.pictures.is_empty() {
            String::new()
        } else {
            format!("\nHình ảnh liên quan: {}", item.pictures.join(", "))
        };
        blocks.push(format!("- Mục {}: {}{}", index + 1, content, images));
    }

    blocks.join("\n")
}

/// User prompt for one call. `max_chars` becomes a soft length instruction.
pub fn build_user_prompt(text: &str, max_chars: Option<usize>) -> String {
    let limit_note = match max_chars.filter(|&n| n > 0) {
        Some(n) => format!(
            "Không vượt quá {} ký tự; nếu gần chạm giới hạn, hãy kết thúc câu cho trọn vẹn. ",
            n
        ),
        None => String::new(),
    };
    format!(
        "{}{}{}{}{}",
        PROMPT_HEAD, limit_note, PROMPT_TAIL, PROMPT_CONTENT_LABEL, text
    )
}

pub struct Summarizer<B: ?Sized> {
    backend: Arc<B>,
    settings: SummarySettings,
}

impl<B: TextBackend + ?Sized> Summarizer<B> {
    pub fn new(backend: Arc<B>, settings: SummarySettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &SummarySettings {
        &self.settings
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key().is_some()
    }

    fn api_key(&self) -> Option<&str> {
        self.settings
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
    }

    /// Summarize `items` into one paragraph.
    ///
    /// `max_tokens_override` (when positive) replaces the configured
    /// default token budget.
    pub async fn summarize(
        &self,
        items: &[SummaryItem],
        max_chars: Option<usize>,
        max_tokens_override: Option<u32>,
    ) -> Option<String> {
        let api_key = self.api_key()?;
        let token_budget = max_tokens_override
            .filter(|&t| t > 0)
            .unwrap_or(self.settings.max_tokens_default);

        let mut joined = build_joined_content(items);

        if joined.chars().count() > HIERARCHICAL_THRESHOLD {
            let groups = chunk(items, CHUNK_SIZE);
            debug!(
                items = items.len(),
                groups = groups.len(),
                "content too long; summarizing hierarchically"
            );

            let partial_budget = token_budget.min(PARTIAL_MAX_TOKENS);
            let mut partials = Vec::with_capacity(groups.len());
            for (i, group) in groups.iter().enumerate() {
                let prompt = build_user_prompt(&build_joined_content(group), None);
                match self.call(api_key, prompt, partial_budget).await {
                    Ok(text) if !text.trim().is_empty() => partials.push(text),
                    Ok(_) => warn!(group = i, "partial summary was empty; dropped"),
                    Err(e) => warn!(group = i, err = %e, "partial summary failed; dropped"),
                }
            }
            joined = partials.join(PARTIAL_SEPARATOR);
        }

        let prompt = build_user_prompt(&joined, max_chars);
        match self.call(api_key, prompt, token_budget).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                warn!("final summary was empty");
                None
            }
            Err(e) => {
                error!(err = %e, "final summary failed");
                None
            }
        }
    }

    async fn call(
        &self,
        api_key: &str,
        user_prompt: String,
        max_tokens: u32,
    ) -> anyhow::Result<String> {
        let request = GenerationRequest {
            api_key,
            model: &self.settings.model,
            system_prompt: SYSTEM_PROMPT,
            user_prompt,
            temperature: self.settings.temperature,
            max_tokens,
        };
        self.backend.generate(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every call; answers from a script, then echoes a default.
    #[derive(Default)]
    struct ScriptedBackend {
        calls: Mutex<Vec<(String, u32)>>,
        script: Mutex<Vec<anyhow::Result<String>>>,
    }

    impl ScriptedBackend {
        fn answering(answers: Vec<anyhow::Result<String>>) -> Self {
            let mut script = answers;
            script.reverse();
            Self {
                calls: Mutex::new(Vec::new()),
                script: Mutex::new(script),
            }
        }

        fn calls(&self) -> Vec<(String, u32)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextBackend for ScriptedBackend {
        async fn generate(&self, request: &GenerationRequest<'_>) -> anyhow::Result<String> {
            assert_eq!(request.system_prompt, SYSTEM_PROMPT);
            self.calls
                .lock()
                .unwrap()
                .push((request.user_prompt.clone(), request.max_tokens));
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok("Tóm tắt.".to_string()))
        }
    }

    fn settings(key: Option<&str>) -> SummarySettings {
        SummarySettings {
            api_key: key.map(str::to_string),
            ..Default::default()
        }
    }

    fn item(text: &str) -> SummaryItem {
        SummaryItem {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn long_items(n: usize) -> Vec<SummaryItem> {
        (0..n).map(|i| item(&format!("{} {}", i, "x".repeat(400)))).collect()
    }

    #[tokio::test]
    async fn test_no_api_key_returns_none_without_calls() {
        let backend = Arc::new(ScriptedBackend::default());
        for key in [None, Some(""), Some("   ")] {
            let s = Summarizer::new(backend.clone(), settings(key));
            assert_eq!(s.summarize(&[item("hello")], None, None).await, None);
        }
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_short_input_makes_one_call() {
        let backend = Arc::new(ScriptedBackend::answering(vec![Ok("Một đoạn văn.".to_string())]));
        let s = Summarizer::new(backend.clone(), settings(Some("sk-test")));
        let out = s.summarize(&[item("a"), item("b")], Some(300), None).await;

        assert_eq!(out.as_deref(), Some("Một đoạn văn."));
        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, 1500);
        assert!(calls[0].0.contains("Không vượt quá 300 ký tự"));
        assert!(calls[0].0.ends_with("- Mục 1: a\n- Mục 2: b"));
    }

    #[tokio::test]
    async fn test_long_input_is_summarized_hierarchically() {
        let backend = Arc::new(ScriptedBackend::default());
        let s = Summarizer::new(backend.clone(), settings(Some("sk-test")));
        let items = long_items(20);
        assert!(build_joined_content(&items).chars().count() > HIERARCHICAL_THRESHOLD);

        let out = s.summarize(&items, Some(500), None).await;
        assert!(out.is_some());

        let calls = backend.calls();
        assert_eq!(calls.len(), 20usize.div_ceil(CHUNK_SIZE) + 1);
        for (prompt, tokens) in &calls[..3] {
            assert_eq!(*tokens, PARTIAL_MAX_TOKENS);
            assert!(!prompt.contains("Không vượt quá"));
        }
        let (final_prompt, final_tokens) = &calls[3];
        assert_eq!(*final_tokens, 1500);
        assert!(final_prompt.ends_with("Tóm tắt.\n- Tóm tắt.\n- Tóm tắt."));
    }

    #[tokio::test]
    async fn test_partial_failures_are_dropped_in_order() {
        let backend = Arc::new(ScriptedBackend::answering(vec![
            Ok("P1".to_string()),
            Err(anyhow::anyhow!("rate limited")),
            Ok("P3".to_string()),
            Ok("FINAL".to_string()),
        ]));
        let s = Summarizer::new(backend.clone(), settings(Some("sk-test")));

        let out = s.summarize(&long_items(24), None, None).await;
        assert_eq!(out.as_deref(), Some("FINAL"));
        let calls = backend.calls();
        assert_eq!(calls.len(), 4);
        assert!(calls[3].0.ends_with("P1\n- P3"));
    }

    #[tokio::test]
    async fn test_final_failure_returns_none() {
        let backend = Arc::new(ScriptedBackend::answering(vec![Err(anyhow::anyhow!("timeout"))]));
        let s = Summarizer::new(backend.clone(), settings(Some("sk-test")));
        assert_eq!(s.summarize(&[item("a")], None, None).await, None);
    }

    #[tokio::test]
    async fn test_empty_answer_returns_none() {
        let backend = Arc::new(ScriptedBackend::answering(vec![Ok("  \n".to_string())]));
        let s = Summarizer::new(backend.clone(), settings(Some("sk-test")));
        assert_eq!(s.summarize(&[item("a")], None, None).await, None);
    }

    #[tokio::test]
    async fn test_token_override_caps_partials_and_sets_final() {
        let backend = Arc::new(ScriptedBackend::default());
        let s = Summarizer::new(backend.clone(), settings(Some("sk-test")));

        s.summarize(&long_items(16), None, Some(300)).await;
        let tokens: Vec<u32> = backend.calls().iter().map(|c| c.1).collect();
        assert_eq!(tokens, vec![300, 300, 300]);

        let backend = Arc::new(ScriptedBackend::default());
        let s = Summarizer::new(backend.clone(), settings(Some("sk-test")));
        s.summarize(&[item("a")], None, Some(0)).await;
        assert_eq!(backend.calls()[0].1, 1500);
    }

    #[test]
    fn test_joined_content_numbering_keeps_gaps() {
        let items = vec![
            item("first"),
            item("   "),
            SummaryItem {
                text: Some("raw".to_string()),
                summary: Some("prior summary".to_string()),
                pictures: vec!["a.webp".to_string(), "b.webp".to_string()],
            },
        ];
        assert_eq!(
            build_joined_content(&items),
            "- Mục 1: first\n- Mục 3: prior summary\nHình ảnh liên quan: a.webp, b.webp"
        );
    }

    #[test]
    fn test_prompt_without_limit_has_no_limit_note() {
        let p = build_user_prompt("body", None);
        assert!(p.starts_with(PROMPT_HEAD));
        assert!(!p.contains("Không vượt quá"));
        assert!(p.ends_with("Nội dung cần tóm tắt:\nbody"));
        assert_eq!(build_user_prompt("body", Some(0)), p);
    }
}
