//! Request classification: does this request need the remote provider?
//!
//! Rules are evaluated in strict priority order, first match wins. The
//! classifier is a pure function of the request -- no health state, no
//! side effects, deterministic for identical input.

use super::RouteReason;
use crate::config::ClassifierConfig;
use crate::types::RequestContext;

/// Score above which a request counts as high-complexity.
const COMPLEXITY_THRESHOLD: f64 = 0.7;

/// Vocabulary whose presence nudges the complexity score up (0.1 each).
const TECHNICAL_TERMS: &[&str] = &[
    "algorithm",
    "architecture",
    "asynchronous",
    "compiler",
    "concurrency",
    "database",
    "distributed",
    "encryption",
    "latency",
    "optimization",
    "protocol",
    "refactor",
    "scalability",
    "throughput",
];

/// Code-syntax tokens that nudge the complexity score up (0.05 each).
const CODE_SYNTAX_TOKENS: &[&str] = &[
    "{", "}", "=>", "();", "fn ", "def ", "class ", "import ", "return ", "const ", "```",
];

/// Tokens whose presence marks a request as code-related outright.
const CODE_KEYWORDS: &[&str] = &[
    "function",
    "def ",
    "fn ",
    "class ",
    "import ",
    "#include",
    "println!",
    "console.log",
    "struct ",
    "impl ",
    "select * from",
    "```",
];

/// Result of classifying a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub specialized: bool,
    pub reason: RouteReason,
}

/// Inspects inbound requests for specialization signals.
#[derive(Debug, Clone)]
pub struct Classifier {
    specialized_tasks: Vec<String>,
    trigger_phrases: Vec<String>,
}

impl Classifier {
    /// Build a classifier from the configured vocabulary. Both sets are
    /// matched case-insensitively, so they are lowercased once here.
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            specialized_tasks: config
                .specialized_tasks
                .iter()
                .map(|t| t.to_lowercase())
                .collect(),
            trigger_phrases: config
                .trigger_phrases
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }

    /// Classify a request. Priority order:
    /// 1. task hint in the specialized-task set
    /// 2. explicit force-remote override
    /// 3. trigger phrase in the text
    /// 4. complexity score above threshold
    /// 5. code-relatedness heuristic
    /// 6. standard request
    pub fn classify(&self, ctx: &RequestContext) -> Classification {
        if let Some(hint) = &ctx.task_hint {
            let hint = hint.to_lowercase();
            if self.specialized_tasks.iter().any(|t| *t == hint) {
                tracing::debug!(hint = %hint, "classified by task hint");
                return Classification {
                    specialized: true,
                    reason: RouteReason::SpecializedTask(hint),
                };
            }
        }

        if ctx.force_remote {
            return Classification {
                specialized: true,
                reason: RouteReason::ForceOverride,
            };
        }

        let text = ctx.joined_text().to_lowercase();

        if let Some(phrase) = self
            .trigger_phrases
            .iter()
            .find(|p| text.contains(p.as_str()))
        {
            tracing::debug!(phrase = %phrase, "classified by trigger phrase");
            return Classification {
                specialized: true,
                reason: RouteReason::KeywordTrigger(phrase.clone()),
            };
        }

        let score = complexity_score(&text);
        if score > COMPLEXITY_THRESHOLD {
            tracing::debug!(score, "classified by complexity score");
            return Classification {
                specialized: true,
                reason: RouteReason::HighComplexity(score),
            };
        }

        if CODE_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            return Classification {
                specialized: true,
                reason: RouteReason::CodeRelated,
            };
        }

        Classification {
            specialized: false,
            reason: RouteReason::StandardRequest,
        }
    }
}

/// Heuristic complexity score in [0, 1].
///
/// Length bonuses: +0.2 above 1000 chars, +0.2 more above 3000 (capped at
/// 0.4 by construction). Each distinct technical term present adds 0.1,
/// more than three question marks adds 0.2, and each distinct code-syntax
/// token present adds 0.05.
fn complexity_score(text: &str) -> f64 {
    let mut score = 0.0;

    let chars = text.chars().count();
    if chars > 1000 {
        score += 0.2;
    }
    if chars > 3000 {
        score += 0.2;
    }

    let technical = TECHNICAL_TERMS
        .iter()
        .filter(|term| text.contains(*term))
        .count();
    score += technical as f64 * 0.1;

    if text.matches('?').count() > 3 {
        score += 0.2;
    }

    let code_tokens = CODE_SYNTAX_TOKENS
        .iter()
        .filter(|token| text.contains(*token))
        .count();
    score += code_tokens as f64 * 0.05;

    score.clamp(0.0, 1.0)
}
