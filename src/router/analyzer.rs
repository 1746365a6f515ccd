//! Prompt feature extraction
//!
//! Pure lexical analysis over the prompt text and conversation context.
//! No I/O, no model calls. All detectors are case-insensitive keyword or
//! regex matches with word boundaries, compiled once per process.

use crate::client::Message;
use crate::router::{Intent, PromptFeatures};
use regex::Regex;
use std::sync::LazyLock;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[\w'-]+\b").expect("valid word regex"));

static CODE_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(def|class|import|function|const|let|var)\b").expect("valid code keyword regex")
});

// Any brace-delimited block; combined with a ':' check this catches JSON and
// struct-ish snippets without code fences.
static BRACE_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid brace regex"));

static LOGS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\btraceback\b|\bexception\b|\berror\b|\bwarn\b|\bfatal\b|\bat\s+\S+:\d+\b")
        .expect("valid logs regex")
});

static MATH_EXPR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\s*[+\-*/=]\s*\d+").expect("valid math expression regex"));

static MATH_PHRASES: LazyLock<Regex> = LazyLock::new(|| {
    phrase_set(&[
        "calculate",
        "compute",
        "derive",
        "equation",
        "integral",
        "derivative",
        "probability",
        "statistics",
        "math",
    ])
});

static ANALYSIS_PHRASES: LazyLock<Regex> = LazyLock::new(|| {
    phrase_set(&[
        "analyze",
        "analysis",
        "compare",
        "evaluate",
        "tradeoff",
        "multi-step",
        "multi step",
        "step-by-step",
        "step by step",
        "proof",
        "derive",
        "plan",
        "architecture",
    ])
});

static CREATIVE_PHRASES: LazyLock<Regex> =
    LazyLock::new(|| phrase_set(&["poem", "story", "creative", "imagine", "metaphor", "character"]));

static FACTUAL_PHRASES: LazyLock<Regex> = LazyLock::new(|| {
    phrase_set(&[
        "what is",
        "what are",
        "how many",
        "how much",
        "price",
        "rate",
        "percentage",
        "percent",
        "latest",
        "recent",
        "today",
        "current",
    ])
});

static STRICT_FORMAT_PHRASES: LazyLock<Regex> = LazyLock::new(|| {
    phrase_set(&[
        "json only",
        "respond in json",
        "no extra text",
        "exactly",
        "follow template",
        "strict format",
        "return only",
    ])
});

static STRICT_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bexactly\s+\d+\s+(bullets|bullet|items|steps|lines)\b")
        .expect("valid strict count regex")
});

static STRICT_CONSTRAINT_PHRASES: LazyLock<Regex> = LazyLock::new(|| {
    phrase_set(&[
        "no extra text",
        "follow template exactly",
        "must follow the template",
        "output only",
        "long structured output",
    ])
});

static FOLLOW_UP_PHRASES: LazyLock<Regex> = LazyLock::new(|| {
    phrase_set(&["continue", "refine this", "try again", "go on", "keep going"])
});

static LATEST_INFO_PHRASES: LazyLock<Regex> = LazyLock::new(|| {
    phrase_set(&[
        "latest",
        "recent",
        "today",
        "this week",
        "this month",
        "this year",
        "current",
        "up to date",
    ])
});

static ACCURACY_PHRASES: LazyLock<Regex> = LazyLock::new(|| {
    phrase_set(&[
        "accurate",
        "precise",
        "exact",
        "verify",
        "fact check",
        "cite",
        "best quality",
        "deep reasoning",
        "production code",
        "step-by-step proof",
        "step by step proof",
    ])
});

static INTENT_ANALYSIS_PHRASES: LazyLock<Regex> =
    LazyLock::new(|| phrase_set(&["production code", "implementation plan", "test strategy"]));

static INTENT_REWRITE_PHRASES: LazyLock<Regex> =
    LazyLock::new(|| phrase_set(&["rewrite", "rephrase", "paraphrase"]));

static INTENT_SUMMARIZE_PHRASES: LazyLock<Regex> =
    LazyLock::new(|| phrase_set(&["summarize", "summary", "tl;dr"]));

static INTENT_BULLETS_PHRASES: LazyLock<Regex> =
    LazyLock::new(|| phrase_set(&["bullet", "bullets", "bullet points", "list"]));

static INTENT_BRAINSTORM_PHRASES: LazyLock<Regex> =
    LazyLock::new(|| phrase_set(&["brainstorm", "ideas", "ideate"]));

static INTENT_CODE_PHRASES: LazyLock<Regex> =
    LazyLock::new(|| phrase_set(&["code", "implement", "bug", "stack trace"]));

/// Compile a case-insensitive word-boundary alternation over literal phrases.
fn phrase_set(phrases: &[&str]) -> Regex {
    let escaped: Vec<String> = phrases.iter().map(|p| regex::escape(p)).collect();
    let pattern = format!(r"(?i)\b(?:{})\b", escaped.join("|"));
    Regex::new(&pattern).expect("valid phrase set regex")
}

/// Ratio of structural punctuation above which text is treated as code
const CODE_SYMBOL_RATIO: f64 = 0.08;

/// Max word count for a message to qualify as a follow-up continuation
const FOLLOW_UP_MAX_WORDS: u64 = 6;

/// Extracts [`PromptFeatures`] from a prompt and its conversation context
///
/// Stateless and deterministic. Shared freely across requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptAnalyzer;

impl PromptAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyze a prompt and optional prior messages into routing features.
    pub fn analyze(&self, prompt: &str, context: &[Message]) -> PromptFeatures {
        let word_count = WORD_RE.find_iter(prompt).count() as u64;
        let char_count = prompt.chars().count() as u64;
        let token_estimate = estimate_tokens(word_count, char_count);

        let has_code = detect_code(prompt);
        let has_logs_stacktrace = LOGS_RE.is_match(prompt);
        let has_math = MATH_PHRASES.is_match(prompt) || MATH_EXPR_RE.is_match(prompt);
        let has_analysis = ANALYSIS_PHRASES.is_match(prompt);
        let has_creative = CREATIVE_PHRASES.is_match(prompt);
        let has_factual = FACTUAL_PHRASES.is_match(prompt);
        let strict_format = STRICT_FORMAT_PHRASES.is_match(prompt);
        let has_strict_constraints =
            STRICT_COUNT_RE.is_match(prompt) || STRICT_CONSTRAINT_PHRASES.is_match(prompt);

        let (context_token_estimate, context_messages) = estimate_context_tokens(context);

        let is_follow_up = context_messages > 0
            && FOLLOW_UP_PHRASES.is_match(prompt)
            && word_count <= FOLLOW_UP_MAX_WORDS;

        let needs_latest_info = LATEST_INFO_PHRASES.is_match(prompt);
        let needs_accuracy = ACCURACY_PHRASES.is_match(prompt);

        let intent = derive_intent(prompt, has_code, has_analysis);

        PromptFeatures {
            word_count,
            char_count,
            token_estimate,
            has_code,
            has_math,
            has_analysis,
            has_creative,
            has_factual,
            strict_format,
            has_logs_stacktrace,
            has_strict_constraints,
            needs_latest_info,
            needs_accuracy,
            is_follow_up,
            context_token_estimate,
            context_messages,
            intent,
        }
    }
}

/// `max(words * 1.3, chars / 4)` floored; zero for empty input.
fn estimate_tokens(words: u64, chars: u64) -> u64 {
    if words == 0 && chars == 0 {
        return 0;
    }
    let by_words = (words as f64 * 1.3) as u64;
    let by_chars = chars / 4;
    by_words.max(by_chars)
}

fn detect_code(text: &str) -> bool {
    if text.contains("```") {
        return true;
    }
    if CODE_KEYWORD_RE.is_match(text) {
        return true;
    }
    if BRACE_BLOCK_RE.is_match(text) && text.contains(':') {
        return true;
    }

    let total = text.chars().count();
    if total == 0 {
        return false;
    }
    let symbols = text
        .chars()
        .filter(|ch| "{}[]();:=<>".contains(*ch))
        .count();
    (symbols as f64 / total as f64) > CODE_SYMBOL_RATIO
}

fn estimate_context_tokens(context: &[Message]) -> (u64, u64) {
    let mut total = 0;
    for message in context {
        let words = WORD_RE.find_iter(&message.content).count() as u64;
        let chars = message.content.chars().count() as u64;
        total += estimate_tokens(words, chars);
    }
    (total, context.len() as u64)
}

/// First-match priority cascade from most to least specific
fn derive_intent(text: &str, has_code: bool, has_analysis: bool) -> Intent {
    if INTENT_ANALYSIS_PHRASES.is_match(text) {
        return Intent::Analysis;
    }
    if INTENT_REWRITE_PHRASES.is_match(text) {
        return Intent::Rewrite;
    }
    if INTENT_SUMMARIZE_PHRASES.is_match(text) {
        return Intent::Summarize;
    }
    if INTENT_BULLETS_PHRASES.is_match(text) {
        return Intent::Bullets;
    }
    if INTENT_BRAINSTORM_PHRASES.is_match(text) {
        return Intent::Brainstorm;
    }
    if has_code || INTENT_CODE_PHRASES.is_match(text) {
        return Intent::Code;
    }
    if has_analysis {
        return Intent::Analysis;
    }
    Intent::General
}
