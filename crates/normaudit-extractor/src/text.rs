//! Small text helpers shared by the normalizer and the extractor

use regex::Regex;

/// Pattern matching `text` word for word with any whitespace in between
///
/// Returns `None` for blank input.
pub(crate) fn whitespace_tolerant_pattern(text: &str) -> Option<String> {
    let words: Vec<String> = text.split_whitespace().map(regex::escape).collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(r"\s+"))
    }
}

/// Collapse every whitespace run to one space
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Every occurrence of `candidate` in `chunk`, as byte offset and chunk slice
///
/// The candidate is matched with flexible whitespace (the oracle often
/// reflows line breaks) and the slice of the chunk that matched is returned,
/// so each result is a literal substring of the chunk. Occurrences come back
/// in text order and never overlap.
pub(crate) fn locate_verbatim(chunk: &str, candidate: &str) -> Vec<(usize, String)> {
    let Some(pattern) = whitespace_tolerant_pattern(candidate) else {
        return Vec::new();
    };
    match Regex::new(&pattern) {
        Ok(re) => re
            .find_iter(chunk)
            .map(|m| (m.start(), m.as_str().to_string()))
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Byte offset of the `n`-th character of `text` (or its length)
pub(crate) fn byte_offset_of_char(text: &str, n: usize) -> usize {
    text.char_indices().nth(n).map(|(i, _)| i).unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let chunk = "4.1 Detectors must be installed.";
        assert_eq!(
            locate_verbatim(chunk, "Detectors must be installed."),
            vec![(4, "Detectors must be installed.".to_string())]
        );
    }

    #[test]
    fn test_reflowed_match_returns_chunk_slice() {
        let chunk = "Detectors must\nbe   installed in every room.";
        let (pos, text) = locate_verbatim(chunk, "Detectors must be installed").remove(0);
        assert_eq!(pos, 0);
        assert_eq!(text, "Detectors must\nbe   installed");
        assert!(chunk.contains(&text));
    }

    #[test]
    fn test_paraphrase_is_not_found() {
        assert!(locate_verbatim("Detectors must be installed.", "Install detectors.").is_empty());
        assert!(locate_verbatim("anything", "   ").is_empty());
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let chunk = "Pressure (min. 0.2 MPa) [see 5.3]";
        assert_eq!(locate_verbatim(chunk, "(min.  0.2 MPa) [see 5.3]").len(), 1);
    }

    #[test]
    fn test_repeated_sentence_is_found_at_every_position() {
        let chunk = "5.1 The system must be tested. 6.1 The system must\nbe tested.";
        let found = locate_verbatim(chunk, "The system must be tested.");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], (4, "The system must be tested.".to_string()));
        assert_eq!(found[1].0, 35);
        assert_eq!(found[1].1, "The system must\nbe tested.");
    }

    #[test]
    fn test_byte_offset_of_char() {
        assert_eq!(byte_offset_of_char("жжж", 2), 4);
        assert_eq!(byte_offset_of_char("ab", 5), 2);
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace(" a \n b\t c "), "a b c");
    }
}
