//! Rule-driven classification: an ordered list of `(pattern, classification)`
//! pairs evaluated independently over the whole buffer.

use bitflags::bitflags;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::span::{merge_ranges, ClassifiedSpan, Classification};
use crate::error::ConfigError;

/// Upper bound on the compiled size of a single rule.
const REGEX_SIZE_LIMIT: usize = 10 * (1 << 20);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RegexOptions: u8 {
        const IGNORE_CASE = 1;
        const MULTILINE = 1 << 1;
        const SINGLELINE = 1 << 2;
        const IGNORE_PATTERN_WHITESPACE = 1 << 3;
    }
}

impl FromStr for RegexOptions {
    type Err = ConfigError;

    /// Parse a comma or pipe separated list such as `"IgnoreCase, Multiline"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut options = RegexOptions::empty();
        for name in s.split([',', '|']).map(str::trim).filter(|n| !n.is_empty()) {
            options |= match name.to_ascii_lowercase().as_str() {
                "ignorecase" => RegexOptions::IGNORE_CASE,
                "multiline" => RegexOptions::MULTILINE,
                "singleline" => RegexOptions::SINGLELINE,
                "ignorepatternwhitespace" => RegexOptions::IGNORE_PATTERN_WHITESPACE,
                // Accepted for compatibility, they change nothing here
                "none" | "compiled" | "cultureinvariant" | "explicitcapture" => {
                    RegexOptions::empty()
                }
                _ => return Err(ConfigError::UnknownRegexOption(name.to_string())),
            };
        }
        Ok(options)
    }
}

/// A rule as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub pattern: String,
    pub classification: Classification,
    #[serde(default)]
    pub options: String,
    /// Overrides the classifier-wide time budget for this rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl RuleDefinition {
    pub fn new(pattern: &str, classification: Classification) -> Self {
        Self {
            pattern: pattern.to_string(),
            classification,
            options: String::new(),
            timeout_ms: None,
        }
    }

    pub fn with_options(mut self, options: &str) -> Self {
        self.options = options.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }
}

/// A compiled rule.
///
/// Named groups whose names are classifications override the rule's
/// classification with the group's range; a group named `text` narrows the
/// span without changing its classification.
#[derive(Debug, Clone)]
pub struct ClassifierRule {
    regex: Regex,
    classification: Classification,
    group_classes: Vec<(usize, Classification)>,
    text_group: Option<usize>,
    budget: Option<Duration>,
}

impl ClassifierRule {
    /// Compile a rule. `Ok(None)` means the pattern itself is malformed, which
    /// is logged and skipped rather than failing the whole definition.
    pub fn compile(
        classifier_id: &str,
        definition: &RuleDefinition,
    ) -> Result<Option<Self>, ConfigError> {
        let options: RegexOptions = definition.options.parse()?;

        let regex = match RegexBuilder::new(&definition.pattern)
            .case_insensitive(options.contains(RegexOptions::IGNORE_CASE))
            .multi_line(options.contains(RegexOptions::MULTILINE))
            .dot_matches_new_line(options.contains(RegexOptions::SINGLELINE))
            .ignore_whitespace(options.contains(RegexOptions::IGNORE_PATTERN_WHITESPACE))
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
        {
            Ok(regex) => regex,
            Err(e) => {
                warn!(
                    classifier = classifier_id,
                    pattern = %definition.pattern,
                    "skipping rule with invalid pattern: {e}"
                );
                return Ok(None);
            }
        };

        let mut group_classes = Vec::new();
        let mut text_group = None;
        for (index, name) in regex.capture_names().enumerate() {
            let Some(name) = name else { continue };
            if name == "text" {
                text_group = Some(index);
            } else if let Ok(class) = name.parse::<Classification>() {
                group_classes.push((index, class));
            }
        }

        Ok(Some(Self {
            regex,
            classification: definition.classification,
            group_classes,
            text_group,
            budget: definition.timeout_ms.map(Duration::from_millis),
        }))
    }

    /// Every match of this rule, or `None` if the time budget ran out before
    /// a match could be accepted. A zero budget never accepts a match.
    fn matches(&self, content: &str, budget: Duration) -> Option<Vec<(Range<usize>, Classification)>> {
        let budget = self.budget.unwrap_or(budget);
        let started = Instant::now();
        let mut found = Vec::new();

        if self.group_classes.is_empty() && self.text_group.is_none() {
            for m in self.regex.find_iter(content) {
                if started.elapsed() >= budget {
                    return None;
                }
                found.push((m.range(), self.classification));
            }
            return Some(found);
        }

        for caps in self.regex.captures_iter(content) {
            if started.elapsed() >= budget {
                return None;
            }
            let overridden = self
                .group_classes
                .iter()
                .find_map(|(index, class)| caps.get(*index).map(|m| (m.range(), *class)));

            let hit = match overridden {
                Some(hit) => hit,
                None => match self.text_group.and_then(|i| caps.get(i)) {
                    Some(m) => (m.range(), self.classification),
                    None => match caps.get(0) {
                        Some(m) => (m.range(), self.classification),
                        None => continue,
                    },
                },
            };
            found.push(hit);
        }
        Some(found)
    }
}

/// Ordered rules with first-declared-wins tie breaking.
#[derive(Debug, Clone)]
pub struct RegexClassifier {
    rules: Vec<ClassifierRule>,
    timeout: Duration,
}

impl RegexClassifier {
    pub fn new(rules: Vec<ClassifierRule>, timeout: Duration) -> Self {
        Self { rules, timeout }
    }

    pub fn compile(
        classifier_id: &str,
        definitions: &[RuleDefinition],
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let mut rules = Vec::with_capacity(definitions.len());
        for definition in definitions {
            if let Some(rule) = ClassifierRule::compile(classifier_id, definition)? {
                rules.push(rule);
            }
        }
        Ok(Self::new(rules, timeout))
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Run every rule. Ranges already claimed by an earlier rule are cut out of
    /// later matches; `Undefined` matches never claim and are never cut, they
    /// are returned as-is for the undefined-span filter.
    pub fn classify_raw<'a>(&self, content: &'a str) -> Vec<ClassifiedSpan<'a>> {
        let mut claimed: Vec<Range<usize>> = Vec::new();
        let mut spans = Vec::new();

        for (index, rule) in self.rules.iter().enumerate() {
            let Some(matches) = rule.matches(content, self.timeout) else {
                warn!(rule = index, "regex rule exceeded its time budget, treating as no match");
                continue;
            };
            debug!(rule = index, count = matches.len(), "rule matched");

            let mut newly_claimed = Vec::with_capacity(matches.len());
            for (range, class) in matches {
                if range.is_empty() {
                    continue;
                }
                if class == Classification::Undefined {
                    spans.push(ClassifiedSpan::new(content, range, class));
                    continue;
                }
                for piece in unclaimed_pieces(&claimed, &range) {
                    spans.push(ClassifiedSpan::new(content, piece, class));
                }
                newly_claimed.push(range);
            }
            claimed.extend(newly_claimed);
            claimed = merge_ranges(claimed);
        }

        spans.sort_by_key(|s| (s.start, s.end()));
        spans
    }
}

/// The parts of `range` not covered by the sorted, merged `claimed` list.
fn unclaimed_pieces(claimed: &[Range<usize>], range: &Range<usize>) -> Vec<Range<usize>> {
    let mut pieces = Vec::new();
    let mut cursor = range.start;

    for taken in claimed
        .iter()
        .filter(|c| c.start < range.end && range.start < c.end)
    {
        if taken.start > cursor {
            pieces.push(cursor..taken.start);
        }
        cursor = cursor.max(taken.end);
    }
    if cursor < range.end {
        pieces.push(cursor..range.end);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier(rules: &[RuleDefinition]) -> RegexClassifier {
        RegexClassifier::compile("test", rules, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_parse_options() {
        let options: RegexOptions = "IgnoreCase, Multiline".parse().unwrap();
        assert!(options.contains(RegexOptions::IGNORE_CASE | RegexOptions::MULTILINE));
        assert!(!options.contains(RegexOptions::SINGLELINE));
        assert_eq!("".parse::<RegexOptions>().unwrap(), RegexOptions::empty());
        assert!("Sideways".parse::<RegexOptions>().is_err());
    }

    #[test]
    fn test_first_declared_rule_wins_overlap() {
        let c = classifier(&[
            RuleDefinition::new(r"#[^\n]*", Classification::SingleLineComment),
            RuleDefinition::new(r#""[^"\n]*""#, Classification::NormalStringLiteral),
        ]);
        let content = "x = \"a # b\" # note";
        let spans = c.classify_raw(content);

        // The comment rule claims `# b" # note`; the string is truncated to `"a `.
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].classification, Classification::NormalStringLiteral);
        assert_eq!(spans[0].text, "\"a ");
        assert_eq!(spans[1].classification, Classification::SingleLineComment);
        assert_eq!(spans[1].text, "# b\" # note");
    }

    #[test]
    fn test_named_groups_override_classification() {
        let c = classifier(&[RuleDefinition::new(
            r#"(?P<SingleLineComment>//[^\n]*)|(?P<NormalStringLiteral>"[^"\n]*")"#,
            Classification::PlainText,
        )]);
        let spans = c.classify_raw("s = \"a // b\"; // real");
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].classification, Classification::NormalStringLiteral);
        assert_eq!(spans[0].text, "\"a // b\"");
        assert_eq!(spans[1].classification, Classification::SingleLineComment);
        assert_eq!(spans[1].text, "// real");
    }

    #[test]
    fn test_text_group_narrows_span() {
        let c = classifier(&[RuleDefinition::new(
            r"#region (?P<text>[^\n]+)",
            Classification::RegionDirective,
        )]);
        let spans = c.classify_raw("#region Public methods\n");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "Public methods");
    }

    #[test]
    fn test_undefined_matches_are_not_truncated() {
        let c = classifier(&[
            RuleDefinition::new(r"//[^\n]*", Classification::SingleLineComment),
            RuleDefinition::new(r"https?://\S+", Classification::Undefined),
        ]);
        let spans = c.classify_raw("// see http://example.com/x");
        assert_eq!(spans.len(), 2);
        assert!(spans
            .iter()
            .any(|s| s.classification == Classification::Undefined
                && s.text == "http://example.com/x"));
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let c = classifier(&[
            RuleDefinition::new(r"(unclosed", Classification::PlainText),
            RuleDefinition::new(r"ok", Classification::PlainText),
        ]);
        assert_eq!(c.rule_count(), 1);
    }

    #[test]
    fn test_exhausted_budget_contributes_no_spans() {
        let c = RegexClassifier::compile(
            "test",
            &[RuleDefinition::new(r"\w+", Classification::PlainText)],
            Duration::ZERO,
        )
        .unwrap();
        assert!(c.classify_raw(&"word ".repeat(100)).is_empty());
    }

    #[test]
    fn test_timed_out_rule_leaves_later_rules_working() {
        let c = classifier(&[
            RuleDefinition::new(r"\w+", Classification::PlainText).with_timeout(Duration::ZERO),
            RuleDefinition::new(r"//[^\n]*", Classification::SingleLineComment),
        ]);
        let spans: Vec<_> = c
            .classify_raw("let x = 1; // a note")
            .iter()
            .map(|s| (s.classification, s.text))
            .collect();
        assert_eq!(spans, vec![(Classification::SingleLineComment, "// a note")]);
    }

    #[test]
    fn test_rule_timeout_from_config() {
        let definition: RuleDefinition = toml::from_str(
            "pattern = 'x'\nclassification = 'PlainText'\ntimeout_ms = 0\n",
        )
        .unwrap();
        assert_eq!(definition.timeout_ms, Some(0));
        let c = classifier(&[definition]);
        assert!(c.classify_raw("xxx").is_empty());
    }
}
