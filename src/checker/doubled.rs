//! Doubled-word detection over the word sequence of a whole file.
//!
//! The detector sees words in file order, across span and line boundaries,
//! so `the\nthe` split over two comment lines is still caught.

/// A word located in the file buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatedWord<'w> {
    pub offset: usize,
    pub length: usize,
    pub text: &'w str,
}

/// Feed words in file order; each call reports whether the word repeats the
/// one before it.
#[derive(Debug, Default)]
pub struct DoubledWordDetector {
    previous: Option<(usize, String)>,
}

impl DoubledWordDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// `content` is the whole file, used to look at what separates the two
    /// words. Inside one span only whitespace may come between them. Across
    /// spans the gap must include a line break and nothing alphanumeric, so
    /// comment markers starting the next line are allowed.
    pub fn observe(&mut self, content: &str, word: LocatedWord<'_>, same_span: bool) -> bool {
        let doubled = match &self.previous {
            Some((end, text)) if *end <= word.offset => {
                let gap = &content[*end..word.offset];
                let separated = if same_span {
                    !gap.is_empty() && gap.chars().all(char::is_whitespace)
                } else {
                    gap.contains('\n') && !gap.chars().any(char::is_alphanumeric)
                };
                separated && text.to_lowercase() == word.text.to_lowercase()
            }
            _ => false,
        };
        self.previous = Some((word.offset + word.length, word.text.to_string()));
        doubled
    }

    /// Forget the previous word, e.g. after a skipped or excluded range.
    pub fn reset(&mut self) {
        self.previous = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(content: &str) -> usize {
        let mut detector = DoubledWordDetector::new();
        let mut hits = 0;
        let mut offset = 0;
        for part in content.split_whitespace() {
            let start = offset + content[offset..].find(part).unwrap();
            let word = LocatedWord {
                offset: start,
                length: part.len(),
                text: part,
            };
            if detector.observe(content, word, true) {
                hits += 1;
            }
            offset = start + part.len();
        }
        hits
    }

    #[test]
    fn test_doubles_across_line_break() {
        assert_eq!(scan("the the\nthe cat"), 2);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(scan("The the end"), 1);
        assert_eq!(scan("one two three"), 0);
    }

    #[test]
    fn test_punctuation_between_words_breaks_the_pair() {
        let content = "that, that is";
        let mut detector = DoubledWordDetector::new();
        assert!(!detector.observe(content, LocatedWord { offset: 0, length: 4, text: "that" }, true));
        assert!(!detector.observe(content, LocatedWord { offset: 6, length: 4, text: "that" }, true));
    }

    #[test]
    fn test_separate_spans_on_one_line_are_not_doubles() {
        // `"is" + "is"` in code: two string spans on the same line
        let content = "\"is\" + \"is\"";
        let mut detector = DoubledWordDetector::new();
        assert!(!detector.observe(content, LocatedWord { offset: 1, length: 2, text: "is" }, false));
        assert!(!detector.observe(content, LocatedWord { offset: 8, length: 2, text: "is" }, false));
    }

    #[test]
    fn test_comment_lines_are_one_sequence() {
        let content = "// check the\n// the value";
        let mut detector = DoubledWordDetector::new();
        detector.observe(content, LocatedWord { offset: 9, length: 3, text: "the" }, false);
        assert!(detector.observe(content, LocatedWord { offset: 16, length: 3, text: "the" }, false));
    }
}
