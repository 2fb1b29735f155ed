use anyhow::{Context, Result};
use parking_lot::RwLock;
use regex::Regex;

/// Built-in prompt shapes, in priority order. Matching stops at the first hit.
const DEFAULT_PATTERNS: &[&str] = &[
    // Yes/No prompts
    r"(?i)\[y/n\]",
    r"(?i)\(y/n\)",
    // Questions
    r"\?\s*$",
    r"Do you want to",
    // Action prompts
    r"(?i)press enter",
    r"Choose.*:\s*$",
    r"Select.*:\s*$",
    r"Enter.*:\s*$",
    r"Type.*:\s*$",
    // Waiting states
    r"(?i)waiting for.*input",
    // Confirmations
    r"continue\?",
    r"proceed\?",
    r"confirm",
    // CLI selectors (Claude Code uses these)
    r"❯\s+\d+\.",
    r"^\s*❯",
    r">>\s*$",
    // Tool action confirmations
    r"Create file",
    r"Edit file",
    r"Run command",
    r"Allow once",
    r"Allow all",
];

/// Ordered, first-match heuristic classifier for input prompts.
///
/// Patterns are compiled once at construction. Runtime registration appends
/// under the same lock that guards evaluation; patterns are never removed or
/// reordered.
pub struct PromptClassifier {
    patterns: RwLock<Vec<Regex>>,
}

impl PromptClassifier {
    pub fn new() -> Self {
        let patterns = DEFAULT_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("Invalid built-in prompt pattern"))
            .collect();
        Self {
            patterns: RwLock::new(patterns),
        }
    }

    /// Whether any pattern matches, in priority order
    pub fn matches(&self, text: &str) -> bool {
        self.patterns.read().iter().any(|re| re.is_match(text))
    }

    /// The substring matched by the first matching pattern
    pub fn matched_pattern(&self, text: &str) -> Option<String> {
        self.patterns
            .read()
            .iter()
            .find_map(|re| re.find(text))
            .map(|m| m.as_str().to_string())
    }

    /// Append a pattern at runtime. Invalid patterns are rejected and leave
    /// the existing list untouched.
    pub fn register(&self, pattern: &str) -> Result<()> {
        let re = Regex::new(pattern)
            .with_context(|| format!("invalid prompt pattern: {}", pattern))?;
        self.patterns.write().push(re);
        Ok(())
    }

    /// Number of active patterns
    pub fn len(&self) -> usize {
        self.patterns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.read().is_empty()
    }
}

impl Default for PromptClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Last `n` lines of `text`, the bounded window classification runs on
pub fn tail_lines(text: &str, n: usize) -> String {
    let trimmed = text.trim();
    let lines: Vec<&str> = trimmed.lines().collect();
    if lines.len() <= n {
        return text.to_string();
    }
    lines[lines.len() - n..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_yes_no_prompt_matches() {
        let classifier = PromptClassifier::new();
        assert!(classifier.matches("Continue? [y/n] "));
        assert!(classifier.matches("Overwrite existing file? (Y/n)"));
    }

    #[test]
    fn test_plain_progress_output_does_not_match() {
        let classifier = PromptClassifier::new();
        assert!(!classifier.matches("Processing files..."));
        assert!(!classifier.matches("Compiling sprig v0.1.0"));
    }

    #[test]
    fn test_question_and_selector_shapes() {
        let classifier = PromptClassifier::new();
        assert!(classifier.matches("Which branch should I use?"));
        assert!(classifier.matches("  ❯ 1. Yes"));
        assert!(classifier.matches("Press Enter to continue"));
        assert!(classifier.matches("Do you want to make this edit?"));
    }

    #[test]
    fn test_first_match_wins() {
        let classifier = PromptClassifier::new();
        // Both the yes/no pattern and "Do you want to" match; the yes/no
        // pattern is declared first so its substring is reported.
        let text = "Do you want to proceed? [y/N]";
        assert_eq!(classifier.matched_pattern(text), Some("[y/N]".to_string()));
    }

    #[test]
    fn test_no_match_reports_nothing() {
        let classifier = PromptClassifier::new();
        assert_eq!(classifier.matched_pattern("building..."), None);
    }

    #[test]
    fn test_register_appends() {
        let classifier = PromptClassifier::new();
        let before = classifier.len();
        classifier
            .register(r"PIN:\s*$")
            .expect("valid pattern should register");
        assert_eq!(classifier.len(), before + 1);
        assert!(classifier.matches("Enter device PIN: "));
    }

    #[test]
    fn test_register_rejects_invalid_pattern() {
        let classifier = PromptClassifier::new();
        let before = classifier.len();
        assert!(classifier.register(r"[unclosed").is_err());
        // Built-ins remain intact and in force
        assert_eq!(classifier.len(), before);
        assert!(classifier.matches("Continue? [y/n] "));
    }

    #[test]
    fn test_tail_lines() {
        let text = "a\nb\nc\nd\ne\nf\ng";
        assert_eq!(tail_lines(text, 3), "e\nf\ng");
        assert_eq!(tail_lines("a\nb", 5), "a\nb");
    }

    #[test]
    fn test_stale_prompt_outside_tail_window() {
        let classifier = PromptClassifier::new();
        let scrollback = "Continue? [y/n] \nok\nworking\nstep 1\nstep 2\nstep 3\ndone";
        assert!(!classifier.matches(&tail_lines(scrollback, 5)));
    }
}
