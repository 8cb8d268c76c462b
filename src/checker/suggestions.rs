//! Candidate generation helpers shared by the dictionaries and the service.

/// A suggestion and how far it is from the misspelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub word: String,
    pub distance: usize,
}

/// Edit distance over chars where swapping two adjacent chars costs one,
/// so `teh` is as close to `the` as `tha` is.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut matrix = vec![vec![0; b_chars.len() + 1]; a_chars.len() + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, item) in matrix[0].iter_mut().enumerate() {
        *item = j;
    }

    for i in 1..=a_chars.len() {
        for j in 1..=b_chars.len() {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            let mut best = (matrix[i - 1][j] + 1) // deletion
                .min(matrix[i][j - 1] + 1) // insertion
                .min(matrix[i - 1][j - 1] + cost); // substitution
            if i > 1
                && j > 1
                && a_chars[i - 1] == b_chars[j - 2]
                && a_chars[i - 2] == b_chars[j - 1]
            {
                best = best.min(matrix[i - 2][j - 2] + 1); // transposition
            }
            matrix[i][j] = best;
        }
    }

    matrix[a_chars.len()][b_chars.len()]
}

/// Cheap edits that catch common typos: deletions, adjacent swaps and a few
/// phonetic letter swaps. Used when the automaton search finds nothing.
pub fn transformations(word: &str) -> Vec<String> {
    let mut transformations = Vec::new();
    let chars: Vec<char> = word.chars().collect();

    for i in 0..chars.len() {
        let mut new_word = chars.clone();
        new_word.remove(i);
        transformations.push(new_word.iter().collect());
    }

    for i in 0..chars.len().saturating_sub(1) {
        let mut new_word = chars.clone();
        new_word.swap(i, i + 1);
        transformations.push(new_word.iter().collect());
    }

    let common_replacements = [
        ('a', 'e'),
        ('e', 'i'),
        ('i', 'o'),
        ('o', 'u'),
        ('b', 'v'),
        ('c', 'k'),
        ('f', 'v'),
        ('g', 'j'),
        ('m', 'n'),
        ('s', 'z'),
        ('t', 'd'),
    ];

    for (i, &ch) in chars.iter().enumerate() {
        for &(from, to) in &common_replacements {
            if ch == from {
                let mut new_word = chars.clone();
                new_word[i] = to;
                transformations.push(new_word.iter().collect());
            }
        }
    }

    transformations
}

pub(crate) fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(crate) fn is_capitalized(word: &str) -> bool {
    let mut chars = word.chars();
    chars.next().is_some_and(char::is_uppercase) && chars.all(|c| !c.is_uppercase())
}

pub(crate) fn is_all_uppercase(word: &str) -> bool {
    word.chars().any(char::is_alphabetic) && !word.chars().any(char::is_lowercase)
}

/// Shape `suggestion` after the capitalisation of `original`.
pub fn match_case(original: &str, suggestion: &str) -> String {
    if original.chars().count() > 1 && is_all_uppercase(original) {
        suggestion.to_uppercase()
    } else if is_capitalized(original) {
        capitalize(suggestion)
    } else {
        suggestion.to_string()
    }
}

/// Fold a multi-word suggestion into one identifier part: `ice cream`
/// becomes `iceCream`.
pub fn camel_join(suggestion: &str) -> String {
    let mut parts = suggestion
        .split(|c: char| !c.is_alphanumeric())
        .filter(|p| !p.is_empty());
    let mut joined = parts.next().unwrap_or_default().to_string();
    for part in parts {
        joined.push_str(&capitalize(part));
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("hello", "hello"), 0);
        assert_eq!(edit_distance("hello", "hallo"), 1);
        assert_eq!(edit_distance("hello", "hullo"), 1);
        assert_eq!(edit_distance("hello", "world"), 4);
        assert_eq!(edit_distance("colur", "colour"), 1);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("teh", "the"), 1);
        assert_eq!(edit_distance("recieve", "receive"), 1);
    }

    #[test]
    fn test_transformations() {
        let transforms = transformations("hello");
        assert!(transforms.contains(&"hllo".to_string())); // deletion
        assert!(transforms.contains(&"ehllo".to_string())); // transposition
        assert!(transforms.contains(&"hella".to_string()) || transforms.contains(&"hillo".to_string()));
    }

    #[test]
    fn test_match_case() {
        assert_eq!(match_case("Recieve", "receive"), "Receive");
        assert_eq!(match_case("RECIEVE", "receive"), "RECEIVE");
        assert_eq!(match_case("recieve", "receive"), "receive");
        assert_eq!(match_case("I", "a"), "A");
    }

    #[test]
    fn test_camel_join() {
        assert_eq!(camel_join("ice cream"), "iceCream");
        assert_eq!(camel_join("log-in"), "logIn");
        assert_eq!(camel_join("single"), "single");
    }
}
