//! Deterministic fast-path tool detection.
//!
//! A fixed trigger table (keywords plus regex patterns per tool), evaluated
//! against the folded message text. No I/O, microsecond-scale: this is the
//! common-case path that keeps obviously-patterned requests ("draw a...",
//! "search the web for...") away from the fallback classifier entirely.

use crate::catalog::ToolId;
use crate::config::MatchRule;
use crate::util::fold_for_match;
use regex::Regex;
use std::collections::BTreeSet;

/// Outcome of the deterministic stage, consumed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionResult {
    /// True iff at least one trigger fired. When true the fallback
    /// classifier is never invoked for this turn.
    pub matched_by_fast_path: bool,
    /// Union of all fired tools, always a subset of the candidate pool.
    pub selected: BTreeSet<ToolId>,
}

impl DetectionResult {
    pub fn none() -> Self {
        Self {
            matched_by_fast_path: false,
            selected: BTreeSet::new(),
        }
    }
}

struct CompiledRule {
    tool: ToolId,
    /// Pre-folded substring triggers.
    keywords: Vec<String>,
    /// Patterns run against the folded (lowercased) message.
    patterns: Vec<Regex>,
}

pub struct FastMatcher {
    rules: Vec<CompiledRule>,
}

impl FastMatcher {
    /// Matcher with the built-in trigger table only.
    pub fn new() -> Self {
        Self::with_rules(&[])
    }

    /// Built-in table merged with operator-supplied rules. Invalid regexes
    /// are logged and skipped rather than failing construction.
    pub fn with_rules(extra: &[MatchRule]) -> Self {
        let mut rules: Vec<CompiledRule> = BUILTIN_RULES
            .iter()
            .map(|(tool, keywords, patterns)| CompiledRule {
                tool: *tool,
                keywords: keywords.iter().map(|k| fold_for_match(k)).collect(),
                patterns: compile_patterns(*tool, patterns.iter().copied()),
            })
            .collect();

        for rule in extra {
            rules.push(CompiledRule {
                tool: rule.tool,
                keywords: rule.keywords.iter().map(|k| fold_for_match(k)).collect(),
                patterns: compile_patterns(rule.tool, rule.patterns.iter().map(String::as_str)),
            });
        }

        Self { rules }
    }

    /// Match `message` against every trigger whose tool is in the candidate
    /// pool. Rules fire independently, so one message can select several
    /// tools at once.
    pub fn quick_match(&self, message: &str, pool: &BTreeSet<ToolId>) -> DetectionResult {
        let folded = fold_for_match(message);
        let mut selected = BTreeSet::new();

        for rule in &self.rules {
            if !pool.contains(&rule.tool) || selected.contains(&rule.tool) {
                continue;
            }
            let keyword_hit = rule.keywords.iter().any(|kw| folded.contains(kw.as_str()));
            let pattern_hit = || rule.patterns.iter().any(|re| re.is_match(&folded));
            if keyword_hit || pattern_hit() {
                selected.insert(rule.tool);
            }
        }

        DetectionResult {
            matched_by_fast_path: !selected.is_empty(),
            selected,
        }
    }
}

impl Default for FastMatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn compile_patterns<'a>(tool: ToolId, raw: impl Iterator<Item = &'a str>) -> Vec<Regex> {
    raw.filter_map(|pattern| match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(error) => {
            tracing::warn!(tool = %tool, pattern, error = %error, "skipping invalid trigger pattern");
            None
        }
    })
    .collect()
}

/// The built-in trigger table. Keywords are substring matches; patterns are
/// regexes over the folded message. Both sides are matched case- and
/// diacritic-insensitively.
const BUILTIN_RULES: &[(ToolId, &[&str], &[&str])] = &[
    (
        ToolId::WebSearch,
        &[
            "search the web",
            "web search",
            "search online",
            "search the internet",
            "latest news",
            "busca en la web",
        ],
        &[
            r"\blook up\b.{0,40}\b(online|web|internet)\b",
            r"\bwhat('| i)s the latest\b",
            r"\bgoogle\b",
        ],
    ),
    (
        ToolId::ImageGeneration,
        &[
            "generate an image",
            "generate a picture",
            "create an image",
            "make an image",
            "text-to-image",
        ],
        &[
            r"\bdraw\b",
            r"\bsketch\b",
            r"\billustrat(e|ion)\b",
            r"\b(paint|render)\b.{0,40}\b(picture|image|scene|portrait)\b",
            r"\b(image|picture|logo|icon|poster)\b.{0,30}\bof\b",
        ],
    ),
    (
        ToolId::CodeInterpreter,
        &["execute code", "run this code", "code interpreter", "```"],
        &[
            r"\brun\b.{0,30}\b(code|script|program|snippet)\b",
            r"\b(python|javascript|bash)\b.{0,30}\b(script|snippet|one-liner)\b",
            r"\bcalculate\b.{0,50}\b(exactly|precisely)\b",
        ],
    ),
    (
        ToolId::FileSearch,
        &[
            "in my files",
            "in my documents",
            "the attached file",
            "the uploaded file",
            "attached document",
        ],
        &[
            r"\b(search|find|look)\b.{0,40}\b(file|files|document|documents|pdf)\b",
            r"\bmy upload(s|ed)?\b",
        ],
    ),
    (
        ToolId::MemoryRecall,
        &["remember when", "what did i tell you", "as i mentioned before"],
        &[r"\b(recall|remember)\b.{0,40}\b(conversation|earlier|before|last time)\b"],
    ),
];
