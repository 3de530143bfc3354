//! Query classification — does this query need tools at all?
//!
//! A cheap, pattern-based decision made before any tool discovery or model
//! call. Informational queries ("what is X", "explain Y") go straight to a
//! pure completion; action queries get the full tool-calling loop.
//!
//! Misclassifying an action query as informational would break the task, so
//! the action patterns win ties and anything unmatched defaults to Action.
//! Classification is a latency optimization, never a correctness decision.

use regex::RegexSet;

/// The two execution modes a query can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Answerable from the model alone; skip tool loading entirely
    Informational,
    /// Needs tool access; run the full loop
    Action,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Informational => "informational",
            QueryMode::Action => "action",
        }
    }
}

/// Patterns that indicate the query wants the agent to *do* something.
const ACTION_PATTERNS: &[&str] = &[
    r"\bsearch\b",
    r"\bfind\b",
    r"\bexecute\b",
    r"\brun\b",
    r"\bread\b.*\bfile\b",
    r"\bwrite\b.*\bfile\b",
    r"\bedit\b",
    r"\banalyze\b",
    r"\bcheck\b",
    r"\binstall\b",
    r"\bdownload\b",
    r"\bcreate\b",
    r"\bdelete\b",
    r"\bmove\b",
    r"\bcopy\b",
    r"\blist\b",
    r"\bfetch\b",
    r"\bcalculate\b",
    r"\bcompute\b",
    r"\bsummarize\b.*\bfile\b",
    r"\bbrowse\b",
];

/// Patterns for explanatory queries the model can answer directly.
const INFORMATIONAL_PATTERNS: &[&str] = &[
    r"^what (is|are)\b",
    r"^explain\b",
    r"^tell me about\b",
    r"^define\b",
    r"^describe\b",
    r"^how (does|do)\b",
    r"^why (does|do|is|are)\b",
    r"^when (is|are|was|were)\b",
    r"^where (is|are)\b",
    r"^who (is|are|was|were)\b",
];

/// Pattern-based query classifier.
///
/// Pure and deterministic: the same input always yields the same mode, and
/// classifying has no side effects.
pub struct QueryClassifier {
    action: RegexSet,
    informational: RegexSet,
}

impl QueryClassifier {
    pub fn new() -> Self {
        // Pattern lists are static; compilation cannot fail at runtime.
        let action = RegexSet::new(ACTION_PATTERNS).expect("invalid action patterns");
        let informational =
            RegexSet::new(INFORMATIONAL_PATTERNS).expect("invalid informational patterns");
        Self {
            action,
            informational,
        }
    }

    /// Classify a query. Action patterns take precedence, and anything
    /// unrecognized is Action — the full loop is always correct, just
    /// slower.
    pub fn classify(&self, query: &str) -> QueryMode {
        let normalized = query.to_lowercase();
        let normalized = normalized.trim();

        if self.action.is_match(normalized) {
            QueryMode::Action
        } else if self.informational.is_match(normalized) {
            QueryMode::Informational
        } else {
            QueryMode::Action
        }
    }
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::new()
    }
}
