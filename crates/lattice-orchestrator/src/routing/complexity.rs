//! Complexity scoring for band escalation.
//!
//! Every factor is a count that can only grow when text is appended, divided by
//! a fixed scale and clamped to 1.0, so the weighted score never decreases as a
//! prompt gets longer or more structured.

use super::types::{ComplexityScore, ScorerWeights};
use tracing::debug;

/// Characters per unit of length factor.
const LENGTH_SCALE: f64 = 2000.0;
/// Structural markers for a full structure factor.
const STRUCTURE_SCALE: f64 = 12.0;
/// Question marks for a full question factor.
const QUESTION_SCALE: f64 = 3.0;
/// Digits and symbols for a full symbol factor.
const SYMBOL_SCALE: f64 = 60.0;
/// Contribution of each distinct keyword.
const KEYWORD_STEP: f64 = 0.25;

const CODE_FENCE: &str = "```";

/// Lowercase phrases that signal analytical or multi-step work.
const KEYWORDS: &[&str] = &[
    "analyze",
    "analyse",
    "compare",
    "contrast",
    "step by step",
    "step-by-step",
    "explain",
    "evaluate",
    "optimize",
    "design",
    "architecture",
    "trade-off",
    "tradeoff",
    "summarize",
    "derive",
    "prove",
    "refactor",
    "implement",
    "migration",
    "security",
    "compliance",
    "regulation",
    "policy",
    "contract",
    "legal",
    "governance",
];

/// Substrings that mark inline code when no fence is present.
const CODE_TOKENS: &[&str] = &["fn ", "def ", "class ", "function ", "=>", "();", "#include", "import ", "SELECT "];

const SYMBOLS: &str = "{}[]()<>=+*/%&|^~$#@\\;:_`";

/// Deterministic prompt complexity scorer.
///
/// Holds only its weights; scoring reads nothing but the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexityScorer {
    weights: ScorerWeights,
}

impl ComplexityScorer {
    /// Creates a scorer with default weights.
    #[must_use]
    pub fn new() -> Self {
        Self::with_weights(ScorerWeights::default())
    }

    /// Creates a scorer with custom weights.
    #[must_use]
    pub fn with_weights(weights: ScorerWeights) -> Self {
        Self { weights }
    }

    /// The weights in use.
    #[must_use]
    pub fn weights(&self) -> &ScorerWeights {
        &self.weights
    }

    /// Scores a prompt into `[0, 1]`. The empty prompt scores 0.
    pub fn score(&self, prompt: &str) -> ComplexityScore {
        let length_factor = ratio(prompt.chars().count(), LENGTH_SCALE);
        let structure_factor = ratio(structural_markers(prompt), STRUCTURE_SCALE);
        let code_factor = code_presence(prompt);
        let keyword_factor = (keyword_hits(prompt) as f64 * KEYWORD_STEP).min(1.0);
        let question_factor = ratio(prompt.matches('?').count(), QUESTION_SCALE);
        let symbol_factor = ratio(
            prompt.chars().filter(|c| c.is_ascii_digit() || SYMBOLS.contains(*c)).count(),
            SYMBOL_SCALE,
        );

        let w = &self.weights;
        let total = w.total();
        let weighted = w.length * length_factor
            + w.structure * structure_factor
            + w.code * code_factor
            + w.keywords * keyword_factor
            + w.questions * question_factor
            + w.symbols * symbol_factor;
        let score = if total > 0.0 { (weighted / total).clamp(0.0, 1.0) } else { 0.0 };

        debug!(
            complexity_score = score,
            length_factor,
            structure_factor,
            code_factor,
            keyword_factor,
            question_factor,
            symbol_factor,
            "complexity scored"
        );

        ComplexityScore {
            score,
            length_factor,
            structure_factor,
            code_factor,
            keyword_factor,
            question_factor,
            symbol_factor,
        }
    }
}

impl Default for ComplexityScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn ratio(count: usize, scale: f64) -> f64 {
    (count as f64 / scale).min(1.0)
}

/// Newlines, numbered-list lines, bullet lines and code fences.
fn structural_markers(prompt: &str) -> usize {
    let newlines = prompt.matches('\n').count();
    let list_lines = prompt
        .split('\n')
        .map(str::trim_start)
        .filter(|line| is_numbered_item(line) || is_bullet_item(line))
        .count();
    let fences = prompt.matches(CODE_FENCE).count();
    newlines + list_lines + fences
}

/// `1.` / `12)` style list item.
fn is_numbered_item(line: &str) -> bool {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    digits > 0 && matches!(line.as_bytes().get(digits), Some(b'.' | b')'))
}

fn is_bullet_item(line: &str) -> bool {
    line.starts_with("- ") || line.starts_with("* ") || line.starts_with("• ")
}

/// 1.0 for fenced code, 0.5 for inline code tokens, else 0.
fn code_presence(prompt: &str) -> f64 {
    if prompt.contains(CODE_FENCE) {
        1.0
    } else if CODE_TOKENS.iter().any(|token| prompt.contains(token)) {
        0.5
    } else {
        0.0
    }
}

/// Number of distinct keywords present (case-insensitive).
fn keyword_hits(prompt: &str) -> usize {
    let lower = prompt.to_lowercase();
    KEYWORDS.iter().filter(|keyword| lower.contains(*keyword)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANALYTICAL: &str = "Analyze and compare the two designs step by step.\n\
        1. Explain the architecture of each.\n\
        2. Evaluate the security trade-offs.\n\
        3. Summarize a migration plan.\n\
        - What breaks first?\n\
        - What does it cost?\n\
        - Which is safer?\n\
        ```\nfn main() { let x = compute(42); }\n```\n";

    #[test]
    fn test_empty_prompt_scores_zero() {
        let score = ComplexityScorer::new().score("");
        assert!(score.score.abs() < f64::EPSILON);
    }

    #[test]
    fn test_short_prompt_scores_low() {
        let score = ComplexityScorer::new().score("hi");
        assert!(score.score < 0.01, "got {}", score.score);
    }

    #[test]
    fn test_analytical_prompt_scores_high() {
        let score = ComplexityScorer::new().score(ANALYTICAL);
        assert!(score.score > 0.6, "got {}", score.score);
        assert!((score.keyword_factor - 1.0).abs() < f64::EPSILON);
        assert!((score.code_factor - 1.0).abs() < f64::EPSILON);
        assert!((score.question_factor - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_score_is_deterministic() {
        let scorer = ComplexityScorer::new();
        for prompt in ["", "hi", ANALYTICAL, "compare x and y?"] {
            assert_eq!(scorer.score(prompt), scorer.score(prompt));
        }
    }

    #[test]
    fn test_appending_never_lowers_score() {
        let scorer = ComplexityScorer::new();
        let long = "x".repeat(5000);
        let bases = ["", "hi", "- item", "1", "``", "plain text", ANALYTICAL];
        let suffixes = [
            "",
            "\n",
            ". next",
            ") next",
            "`",
            "```",
            "?",
            " analyze this step by step",
            "\n- bullet\n2. numbered",
            long.as_str(),
            "{}[]();=>",
        ];

        for base in bases {
            let before = scorer.score(base).score;
            for suffix in suffixes {
                let after = scorer.score(&format!("{base}{suffix}")).score;
                assert!(after >= before, "score dropped from {before} to {after} for {base:?} + {suffix:?}");
            }
        }
    }

    #[test]
    fn test_score_is_bounded() {
        let scorer = ComplexityScorer::new();
        let huge = ANALYTICAL.repeat(200);
        let score = scorer.score(&huge);
        assert!(score.score <= 1.0);
        assert!(score.score > 0.9);
    }

    #[test]
    fn test_custom_weights_isolate_factor() {
        let weights = ScorerWeights { length: 1.0, structure: 0.0, code: 0.0, keywords: 0.0, questions: 0.0, symbols: 0.0 };
        let scorer = ComplexityScorer::with_weights(weights);
        let score = scorer.score(&"a".repeat(1000));
        assert!((score.score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_list_item_detection() {
        assert!(is_numbered_item("1. first"));
        assert!(is_numbered_item("12) twelfth"));
        assert!(!is_numbered_item("1 first"));
        assert!(!is_numbered_item("a. first"));
        assert!(is_bullet_item("- item"));
        assert!(!is_bullet_item("-item"));
    }
}
