use regex::Regex;
use std::sync::OnceLock;

/// One clickable page reference extracted from a bracketed notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CitationToken {
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Citation(CitationToken),
}

/// Assistant text split into plain runs and clickable citation tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotatedText {
    segments: Vec<Segment>,
}

impl AnnotatedText {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn tokens(&self) -> impl Iterator<Item = &CitationToken> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Citation(token) => Some(token),
            Segment::Text(_) => None,
        })
    }

    /// Reconstructs the text as rendered, with each token shown as its
    /// page number.
    pub fn display_text(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Citation(token) => out.push_str(&token.page.to_string()),
            }
        }
        out
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Segment::Text(existing)) = self.segments.last_mut() {
            existing.push_str(text);
        } else {
            self.segments.push(Segment::Text(text.to_string()));
        }
    }

    fn push_token(&mut self, page: u32) {
        self.segments.push(Segment::Citation(CitationToken { page }));
    }
}

fn page_notation() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\[pages?\s+([0-9][0-9,\s]*)\]").expect("page notation pattern compiles")
    })
}

/// Rewrites bracketed page notations (`[Page 3]`, `[Pages 1, 7]`, any
/// case) into citation tokens, one per listed page number. The keyword is
/// normalized to singular `Page` and the list is comma-joined, so
/// `[Pages 1, 7]` renders as `[Page 1, 7]` with each number clickable.
/// Text without a well-formed notation passes through unchanged.
pub fn annotate(text: &str) -> AnnotatedText {
    let mut out = AnnotatedText::default();
    let mut last = 0;

    for caps in page_notation().captures_iter(text) {
        let (Some(matched), Some(list)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let pages = parse_page_list(list.as_str());
        if pages.is_empty() {
            // No usable entry; the matched text flows through as-is.
            continue;
        }

        out.push_text(&text[last..matched.start()]);
        out.push_text("[Page ");
        for (index, page) in pages.iter().enumerate() {
            if index > 0 {
                out.push_text(", ");
            }
            out.push_token(*page);
        }
        out.push_text("]");
        last = matched.end();
    }

    out.push_text(&text[last..]);
    out
}

/// Splits a matched number list on commas, trimming each entry and
/// dropping entries that are empty or not a positive integer.
fn parse_page_list(list: &str) -> Vec<u32> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| entry.parse::<u32>().ok())
        .filter(|page| *page >= 1)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{annotate, parse_page_list};

    #[test]
    fn single_page_notation_yields_one_token() {
        let annotated = annotate("[page 3]");
        let pages: Vec<u32> = annotated.tokens().map(|token| token.page).collect();
        assert_eq!(pages, vec![3]);
        assert_eq!(annotated.display_text(), "[Page 3]");
    }

    #[test]
    fn multi_page_notation_yields_independent_tokens() {
        let annotated = annotate("[Pages 1, 7]");
        let pages: Vec<u32> = annotated.tokens().map(|token| token.page).collect();
        assert_eq!(pages, vec![1, 7]);
        assert_eq!(annotated.display_text(), "[Page 1, 7]");
    }

    #[test]
    fn unspaced_list_is_accepted() {
        let annotated = annotate("[Pages 2,4,6]");
        let pages: Vec<u32> = annotated.tokens().map(|token| token.page).collect();
        assert_eq!(pages, vec![2, 4, 6]);
        assert_eq!(annotated.display_text(), "[Page 2, 4, 6]");
    }

    #[test]
    fn text_without_notation_passes_through() {
        let annotated = annotate("no citation here");
        assert_eq!(annotated.tokens().count(), 0);
        assert_eq!(annotated.display_text(), "no citation here");
    }

    #[test]
    fn keyword_is_case_insensitive() {
        assert_eq!(annotate("[PAGE 12]").display_text(), "[Page 12]");
        let annotated = annotate("[pages 12,14]");
        let pages: Vec<u32> = annotated.tokens().map(|token| token.page).collect();
        assert_eq!(pages, vec![12, 14]);
    }

    #[test]
    fn surrounding_text_is_preserved() {
        let annotated = annotate("See [Page 3] for details, then [Pages 5, 9].");
        assert_eq!(
            annotated.display_text(),
            "See [Page 3] for details, then [Page 5, 9]."
        );
        assert_eq!(annotated.tokens().count(), 3);
    }

    #[test]
    fn empty_entries_are_discarded() {
        let annotated = annotate("[Pages 1,,7]");
        let pages: Vec<u32> = annotated.tokens().map(|token| token.page).collect();
        assert_eq!(pages, vec![1, 7]);
    }

    #[test]
    fn invalid_entries_are_dropped_when_a_valid_one_remains() {
        let annotated = annotate("[Pages 3, 1 2]");
        let pages: Vec<u32> = annotated.tokens().map(|token| token.page).collect();
        assert_eq!(pages, vec![3]);
        assert_eq!(annotated.display_text(), "[Page 3]");
    }

    #[test]
    fn notation_with_no_valid_entries_passes_through() {
        let annotated = annotate("[Pages 0]");
        assert_eq!(annotated.tokens().count(), 0);
        assert_eq!(annotated.display_text(), "[Pages 0]");
    }

    #[test]
    fn keyword_without_list_is_left_alone() {
        assert_eq!(annotate("[Page ]").display_text(), "[Page ]");
        assert_eq!(annotate("[Page3]").display_text(), "[Page3]");
    }

    #[test]
    fn parse_page_list_trims_and_validates() {
        assert_eq!(parse_page_list(" 1 , 7 "), vec![1, 7]);
        assert_eq!(parse_page_list("0, 5"), vec![5]);
        assert!(parse_page_list(" , ").is_empty());
    }
}
