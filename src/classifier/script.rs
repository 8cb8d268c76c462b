//! Script languages with inline markup (JSX, TSX and friends).
//!
//! The code classifier runs over the whole buffer; tag regions found outside
//! comments and strings are then walked as HTML. Inside a tag region only the
//! code spans nested in `{...}` expressions survive, and markup text spans
//! win over any code span they fully contain.

use lazy_static::lazy_static;
use regex::Regex;
use std::ops::Range;

use super::code::CodeClassifier;
use super::markup::html::HtmlClassifier;
use super::span::{subtract_ranges, ClassifiedSpan, Classification};

lazy_static! {
    static ref TAG: Regex = Regex::new(r"<(/?)([A-Za-z][\w.:-]*)(?:\s[^<>]*?)?(/?)>").unwrap();
    /// A `{...}` block with no nested braces: a JSX expression or a string
    /// interpolation hole.
    pub(crate) static ref BRACED_EXPRESSION: Regex = Regex::new(r"\{[^{}]*\}").unwrap();
}

#[derive(Debug, Clone)]
pub struct ScriptWithMarkupClassifier {
    code: CodeClassifier,
    html: HtmlClassifier,
}

impl ScriptWithMarkupClassifier {
    pub fn new(code: CodeClassifier, html: HtmlClassifier) -> Self {
        Self { code, html }
    }

    pub fn classify_raw<'a>(&self, content: &'a str) -> Vec<ClassifiedSpan<'a>> {
        let mut code = self.code.classify_raw(content);
        let shields: Vec<Range<usize>> = code
            .iter()
            .filter(|s| s.classification.is_comment() || s.classification.is_string_literal())
            .map(|s| s.range())
            .collect();

        let regions = markup_regions(content, &shields);
        let mut markup = Vec::new();
        let mut expressions: Vec<Range<usize>> = Vec::new();
        for region in &regions {
            for span in self.html.classify_range(content, region.clone()) {
                if span.classification != Classification::InnerText {
                    markup.push(span);
                    continue;
                }
                // Embedded `{expression}` blocks are code, not prose
                let holes: Vec<Range<usize>> = BRACED_EXPRESSION
                    .find_iter(span.text)
                    .map(|m| span.start + m.start()..span.start + m.end())
                    .collect();
                expressions.extend(holes.iter().cloned());
                markup.extend(subtract_ranges(vec![span], &holes));
            }
        }

        code.retain(|c| {
            if !regions.iter().any(|r| c.overlaps(r)) {
                return true;
            }
            let range = c.range();
            let in_expression = expressions.iter().any(|e| e.start <= range.start && range.end <= e.end);
            let shadowed = markup.iter().any(|m| {
                matches!(
                    m.classification,
                    Classification::InnerText | Classification::AttributeValue
                ) && m.contains_range(&range)
            });
            in_expression && !shadowed
        });
        code.extend(markup);
        code.sort_by_key(|s| (s.start, s.end()));
        code
    }
}

/// Outermost tag regions: an opening tag through its matching close, or a
/// lone tag when nothing closes it. Tags starting inside `shields` are skipped.
fn markup_regions(content: &str, shields: &[Range<usize>]) -> Vec<Range<usize>> {
    let mut regions = Vec::new();
    let mut cursor = 0;

    for caps in TAG.captures_iter(content) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() < cursor || !caps[1].is_empty() {
            continue;
        }
        if shields
            .iter()
            .any(|s| s.start <= whole.start() && whole.start() < s.end)
        {
            continue;
        }

        let self_closing = !caps[3].is_empty();
        let end = if self_closing {
            whole.end()
        } else {
            matching_close(content, &caps[2], whole.end()).unwrap_or(whole.end())
        };
        regions.push(whole.start()..end);
        cursor = end;
    }
    regions
}

fn matching_close(content: &str, name: &str, from: usize) -> Option<usize> {
    let mut depth = 1usize;
    for caps in TAG.captures_iter(&content[from..]) {
        if &caps[2] != name {
            continue;
        }
        let whole = caps.get(0)?;
        if !caps[1].is_empty() {
            depth -= 1;
            if depth == 0 {
                return Some(from + whole.end());
            }
        } else if caps[3].is_empty() {
            depth += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::builtin;
    use crate::classifier::markup::{MarkupFilter, MarkupSettings};
    use crate::classifier::span::{is_ordered, subtract_undefined};
    use std::time::Duration;

    fn classifier() -> ScriptWithMarkupClassifier {
        let filter = MarkupFilter::new(&MarkupSettings::default());
        let code = builtin::script_code_classifier(filter.clone(), Duration::from_secs(1)).unwrap();
        ScriptWithMarkupClassifier::new(code, HtmlClassifier::new(filter))
    }

    fn classify(content: &str) -> Vec<(Classification, &str)> {
        subtract_undefined(classifier().classify_raw(content))
            .into_iter()
            .map(|s| (s.classification, s.text))
            .collect()
    }

    #[test]
    fn test_jsx_text_and_attributes() {
        let content = r#"// Render the greeting
const App = () => (
  <div className="box" title="Welcome home">
    Don't forget <b>this</b>
  </div>
);"#;
        let found = classify(content);
        assert_eq!(
            found,
            vec![
                (Classification::SingleLineComment, "// Render the greeting"),
                (Classification::AttributeValue, "Welcome home"),
                (Classification::InnerText, "Don't forget"),
                (Classification::InnerText, "this"),
            ]
        );
    }

    #[test]
    fn test_markup_inside_strings_is_not_walked() {
        let found = classify(r#"const s = "<p>Helo</p>";"#);
        assert_eq!(found, vec![(Classification::NormalStringLiteral, "\"<p>Helo</p>\"")]);
    }

    #[test]
    fn test_expressions_in_text_are_removed() {
        let content = "const x = <p>Hello {user.nmae}, welcome</p>;";
        let spans = subtract_undefined(classifier().classify_raw(content));
        assert!(is_ordered(&spans));
        let text: Vec<_> = spans.iter().map(|s| s.text).collect();
        assert_eq!(text, vec!["Hello ", ", welcome"]);
    }

    #[test]
    fn test_nested_same_name_tags() {
        let content = "<div><div>inner</div>outer</div> const y = 1;";
        let regions = markup_regions(content, &[]);
        assert_eq!(regions, vec![0..32]);
    }

    #[test]
    fn test_comments_and_strings_in_expressions_survive() {
        let found = classify("const a = <div>{/* a wrod here */} {\"a strng\"}</div>;");
        assert_eq!(
            found,
            vec![
                (Classification::DelimitedComment, "/* a wrod here */"),
                (Classification::InnerText, " "),
                (Classification::NormalStringLiteral, "\"a strng\""),
            ]
        );
    }

    #[test]
    fn test_expression_code_beside_text() {
        let content = "const b = <p title=\"Tïtle\">Grüße {cond ? \"yes\" : other} and more</p>;";
        let found = classify(content);
        assert_eq!(
            found,
            vec![
                (Classification::AttributeValue, "Tïtle"),
                (Classification::InnerText, "Grüße "),
                (Classification::NormalStringLiteral, "\"yes\""),
                (Classification::InnerText, " and more"),
            ]
        );
    }
}
