//! The code classifier: regex rules followed by three reclassification passes.
//!
//! Each pass takes the span list by value and returns a new one. Passes only
//! reclassify or narrow, never widen.

use serde::{Deserialize, Serialize};

use super::doc_comment::DocCommentExtractor;
use super::regex_rules::RegexClassifier;
use super::span::{ClassifiedSpan, Classification};

/// Which subtype wins when a string carries both the verbatim and the
/// interpolation prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrefixPrecedence {
    /// The prefix character closest to the opening quote decides.
    #[default]
    Adjacent,
    Verbatim,
    Interpolated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringPrefixes {
    pub verbatim: Option<char>,
    pub interpolation: Option<char>,
    pub precedence: PrefixPrecedence,
}

impl StringPrefixes {
    fn is_prefix(&self, c: char) -> bool {
        Some(c) == self.verbatim || Some(c) == self.interpolation
    }

    /// Classify a string literal from the prefix characters in front of its
    /// opening quote and whether it is a triple-quoted raw string.
    fn subtype(&self, prefix: &str, raw: bool) -> Classification {
        let verbatim = self.verbatim.is_some_and(|v| prefix.contains(v));
        let interpolated = self.interpolation.is_some_and(|i| prefix.contains(i));

        match (verbatim || raw, interpolated) {
            (false, false) => Classification::NormalStringLiteral,
            (true, false) => Classification::VerbatimStringLiteral,
            (false, true) => Classification::InterpolatedStringLiteral,
            // A raw string has no verbatim prefix to compete with
            (true, true) if raw && !verbatim => Classification::InterpolatedStringLiteral,
            (true, true) => match self.precedence {
                PrefixPrecedence::Verbatim => Classification::VerbatimStringLiteral,
                PrefixPrecedence::Interpolated => Classification::InterpolatedStringLiteral,
                PrefixPrecedence::Adjacent => {
                    if prefix.chars().last() == self.interpolation {
                        Classification::InterpolatedStringLiteral
                    } else {
                        Classification::VerbatimStringLiteral
                    }
                }
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentDelimiters {
    pub doc_comment: Option<String>,
    pub quad_slash: Option<String>,
    pub old_style_doc_comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CodeClassifier {
    rules: RegexClassifier,
    prefixes: StringPrefixes,
    delimiters: CommentDelimiters,
    doc_comments: DocCommentExtractor,
}

impl CodeClassifier {
    pub fn new(
        rules: RegexClassifier,
        prefixes: StringPrefixes,
        delimiters: CommentDelimiters,
        doc_comments: DocCommentExtractor,
    ) -> Self {
        Self {
            rules,
            prefixes,
            delimiters,
            doc_comments,
        }
    }

    pub fn delimiters(&self) -> &CommentDelimiters {
        &self.delimiters
    }

    pub fn classify_raw<'a>(&self, content: &'a str) -> Vec<ClassifiedSpan<'a>> {
        let spans = self.rules.classify_raw(content);
        let spans = subtype_strings(content, spans, &self.prefixes);
        let spans = subtype_comments(spans, &self.delimiters);
        self.doc_comments.extract(content, spans, &self.delimiters)
    }
}

/// Refine `NormalStringLiteral` spans into verbatim or interpolated ones.
///
/// Prefix characters are looked for at the start of the span (when the rule
/// includes them in its match) or immediately before it, ignoring whitespace.
pub fn subtype_strings<'a>(
    content: &'a str,
    spans: Vec<ClassifiedSpan<'a>>,
    prefixes: &StringPrefixes,
) -> Vec<ClassifiedSpan<'a>> {
    if prefixes.verbatim.is_none() && prefixes.interpolation.is_none() {
        return spans
            .into_iter()
            .map(|s| match s.classification {
                Classification::NormalStringLiteral if s.text.starts_with("\"\"\"") => {
                    s.reclassify(Classification::VerbatimStringLiteral)
                }
                _ => s,
            })
            .collect();
    }

    spans
        .into_iter()
        .map(|span| {
            if span.classification != Classification::NormalStringLiteral {
                return span;
            }
            let quote = span.text.find(['"', '\'']).unwrap_or(0);
            let body = &span.text[quote..];
            let raw = body.starts_with("\"\"\"");

            let prefix = if quote > 0 {
                &span.text[..quote]
            } else {
                preceding_prefix(&content[..span.start], prefixes)
            };
            span.reclassify(prefixes.subtype(prefix, raw))
        })
        .collect()
}

/// The run of prefix characters ending just before `before` (after skipping
/// trailing whitespace).
fn preceding_prefix<'a>(before: &'a str, prefixes: &StringPrefixes) -> &'a str {
    let trimmed = before.trim_end();
    let start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| prefixes.is_prefix(*c))
        .last()
        .map_or(trimmed.len(), |(i, _)| i);
    &trimmed[start..]
}

/// Refine comments by their opening delimiter. The quad-slash marker is
/// checked first so `////` is never mistaken for a doc comment.
pub fn subtype_comments<'a>(
    spans: Vec<ClassifiedSpan<'a>>,
    delimiters: &CommentDelimiters,
) -> Vec<ClassifiedSpan<'a>> {
    let starts = |text: &str, delimiter: &Option<String>| {
        delimiter
            .as_deref()
            .is_some_and(|d| !d.is_empty() && text.starts_with(d))
    };

    spans
        .into_iter()
        .map(|span| match span.classification {
            Classification::SingleLineComment if starts(span.text, &delimiters.quad_slash) => {
                span.reclassify(Classification::QuadSlashComment)
            }
            Classification::SingleLineComment | Classification::DelimitedComment => {
                // An empty `/**/` is not a doc comment
                let empty_block = span.text == "/**/";
                if !empty_block
                    && (starts(span.text, &delimiters.doc_comment)
                        || starts(span.text, &delimiters.old_style_doc_comment))
                {
                    span.reclassify(Classification::XmlDocComment)
                } else {
                    span
                }
            }
            _ => span,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::builtin::CSHARP_LEXER;
    use crate::classifier::markup::{MarkupFilter, MarkupSettings};
    use crate::classifier::regex_rules::RuleDefinition;
    use std::time::Duration;

    fn prefixes(precedence: PrefixPrecedence) -> StringPrefixes {
        StringPrefixes {
            verbatim: Some('@'),
            interpolation: Some('$'),
            precedence,
        }
    }

    fn csharp(precedence: PrefixPrecedence) -> CodeClassifier {
        let rules = RegexClassifier::compile(
            "csharp",
            &[RuleDefinition::new(CSHARP_LEXER, Classification::PlainText)],
            Duration::from_secs(1),
        )
        .unwrap();
        CodeClassifier::new(
            rules,
            prefixes(precedence),
            CommentDelimiters {
                doc_comment: Some("///".into()),
                quad_slash: Some("////".into()),
                old_style_doc_comment: Some("/**".into()),
            },
            DocCommentExtractor::new(MarkupFilter::new(&MarkupSettings::default())),
        )
    }

    fn classes(content: &str, precedence: PrefixPrecedence) -> Vec<(Classification, &str)> {
        csharp(precedence)
            .classify_raw(content)
            .into_iter()
            .map(|s| (s.classification, s.text))
            .collect()
    }

    #[test]
    fn test_string_subtypes() {
        let found = classes(
            r#"var a = @"text"; var b = $"text"; var c = "text";"#,
            PrefixPrecedence::Adjacent,
        );
        assert_eq!(
            found,
            vec![
                (Classification::VerbatimStringLiteral, "@\"text\""),
                (Classification::InterpolatedStringLiteral, "$\"text\""),
                (Classification::NormalStringLiteral, "\"text\""),
            ]
        );
    }

    #[test]
    fn test_combined_prefix_precedence_is_configurable() {
        let content = r#"x = $@"a {b}"; y = @$"c {d}";"#;

        let adjacent = classes(content, PrefixPrecedence::Adjacent);
        assert_eq!(adjacent[0].0, Classification::VerbatimStringLiteral);
        assert_eq!(adjacent[1].0, Classification::InterpolatedStringLiteral);

        let interpolated = classes(content, PrefixPrecedence::Interpolated);
        assert!(interpolated
            .iter()
            .all(|(c, _)| *c == Classification::InterpolatedStringLiteral));

        let verbatim = classes(content, PrefixPrecedence::Verbatim);
        assert!(verbatim
            .iter()
            .all(|(c, _)| *c == Classification::VerbatimStringLiteral));
    }

    #[test]
    fn test_raw_strings_are_verbatim_unless_interpolated() {
        let found = classes(
            "var a = \"\"\"raw text\"\"\"; var b = $\"\"\"raw {x}\"\"\";",
            PrefixPrecedence::Adjacent,
        );
        assert_eq!(found[0].0, Classification::VerbatimStringLiteral);
        assert_eq!(found[1].0, Classification::InterpolatedStringLiteral);
    }

    #[test]
    fn test_prefix_before_span_with_whitespace() {
        let content = "x = @ \"text\"";
        let spans = vec![ClassifiedSpan::new(
            content,
            6..12,
            Classification::NormalStringLiteral,
        )];
        let spans = subtype_strings(content, spans, &prefixes(PrefixPrecedence::Adjacent));
        assert_eq!(spans[0].classification, Classification::VerbatimStringLiteral);
        assert_eq!(spans[0].range(), 6..12);
    }

    #[test]
    fn test_comment_subtypes() {
        let content = "//// old code();\n// note here\n/**/ x();";
        let found = classes(content, PrefixPrecedence::Adjacent);
        assert_eq!(
            found,
            vec![
                (Classification::QuadSlashComment, "//// old code();"),
                (Classification::SingleLineComment, "// note here"),
                (Classification::DelimitedComment, "/**/"),
            ]
        );
    }

    #[test]
    fn test_doc_comment_is_extracted() {
        let content = "/// <summary>Gets the vaule.</summary>\nint Value { get; }";
        let found = classes(content, PrefixPrecedence::Adjacent);
        assert_eq!(
            found,
            vec![(Classification::XmlCommentsInnerText, "Gets the vaule.")]
        );
    }

    #[test]
    fn test_passes_never_widen_spans() {
        let content = "s = $\"a\"; // c\n/// <summary>d</summary>\n";
        let c = csharp(PrefixPrecedence::Adjacent);
        let raw = c.rules.classify_raw(content);
        let refined = c.classify_raw(content);
        for span in &refined {
            assert!(raw.iter().any(|r| r.contains_range(&span.range())));
        }
    }
}
