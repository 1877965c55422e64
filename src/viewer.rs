use std::fmt;

/// Where the active document can be fetched from and what to call it.
/// Replaced wholesale by each successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub url: String,
    pub name: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PageJumpError {
    NoDocument,
}

impl fmt::Display for PageJumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageJumpError::NoDocument => write!(f, "no document loaded"),
        }
    }
}

impl std::error::Error for PageJumpError {}

/// Extracted page text for the active document, filled in by a
/// background fetch after the upload succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageContent {
    #[default]
    Pending,
    Loaded(Vec<String>),
    Failed(String),
}

/// Owns what the embedded viewer shows. Every navigation bumps the
/// generation counter, even when the target page is unchanged: the page
/// widget's identity is keyed off the generation, so a repeated jump to
/// the same page still resets the widget instead of being swallowed by
/// cached scroll state.
#[derive(Debug, Default)]
pub struct Viewer {
    doc: Option<DocumentRef>,
    page: Option<u32>,
    generation: u64,
    reveal_requested: bool,
    content: PageContent,
}

impl Viewer {
    /// Replaces the active document and shows it from its first page.
    pub fn load_document(&mut self, doc: DocumentRef) {
        self.doc = Some(doc);
        self.page = None;
        self.generation += 1;
        self.content = PageContent::Pending;
    }

    pub fn navigate(&mut self, page: u32) -> Result<(), PageJumpError> {
        if self.doc.is_none() {
            return Err(PageJumpError::NoDocument);
        }

        self.page = Some(page.max(1));
        self.generation += 1;
        self.reveal_requested = true;
        Ok(())
    }

    pub fn document(&self) -> Option<&DocumentRef> {
        self.doc.as_ref()
    }

    pub fn current_page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn content(&self) -> &PageContent {
        &self.content
    }

    pub fn page_count(&self) -> Option<usize> {
        match &self.content {
            PageContent::Loaded(pages) => Some(pages.len()),
            _ => None,
        }
    }

    /// Stores extracted pages, ignoring results for a document that is
    /// no longer active.
    pub fn set_pages(&mut self, url: &str, pages: Vec<String>) {
        if self.doc.as_ref().map(|doc| doc.url.as_str()) == Some(url) {
            self.content = PageContent::Loaded(pages);
        }
    }

    pub fn fail_pages(&mut self, url: &str, message: String) {
        if self.doc.as_ref().map(|doc| doc.url.as_str()) == Some(url) {
            self.content = PageContent::Failed(message);
        }
    }

    /// True once after a successful navigation; narrow layouts use this
    /// to bring the viewer panel into view.
    pub fn take_reveal_request(&mut self) -> bool {
        std::mem::take(&mut self.reveal_requested)
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentRef, PageContent, PageJumpError, Viewer};

    fn sample_doc() -> DocumentRef {
        DocumentRef {
            url: "http://127.0.0.1:8000/files/report.pdf".to_string(),
            name: "report.pdf".to_string(),
        }
    }

    #[test]
    fn navigate_without_document_reports_no_document() {
        let mut viewer = Viewer::default();
        assert_eq!(viewer.navigate(5), Err(PageJumpError::NoDocument));
        assert!(viewer.document().is_none());
        assert_eq!(viewer.generation(), 0);
    }

    #[test]
    fn load_document_starts_at_first_page_and_bumps_generation() {
        let mut viewer = Viewer::default();
        viewer.load_document(sample_doc());

        assert_eq!(viewer.current_page(), 1);
        assert_eq!(viewer.generation(), 1);
        assert_eq!(viewer.content(), &PageContent::Pending);
    }

    #[test]
    fn repeated_navigation_to_the_same_page_bumps_generation_twice() {
        let mut viewer = Viewer::default();
        viewer.load_document(sample_doc());
        let base = viewer.generation();

        viewer.navigate(5).expect("document is loaded");
        viewer.navigate(5).expect("document is loaded");

        assert_eq!(viewer.current_page(), 5);
        assert_eq!(viewer.generation(), base + 2);
    }

    #[test]
    fn navigation_requests_panel_reveal_once() {
        let mut viewer = Viewer::default();
        viewer.load_document(sample_doc());

        assert!(!viewer.take_reveal_request());
        viewer.navigate(2).expect("document is loaded");
        assert!(viewer.take_reveal_request());
        assert!(!viewer.take_reveal_request());
    }

    #[test]
    fn stale_page_results_are_ignored() {
        let mut viewer = Viewer::default();
        viewer.load_document(sample_doc());
        viewer.set_pages("http://127.0.0.1:8000/files/old.pdf", vec!["old".to_string()]);
        assert_eq!(viewer.content(), &PageContent::Pending);

        viewer.set_pages(&sample_doc().url, vec!["first page".to_string()]);
        assert_eq!(viewer.page_count(), Some(1));

        viewer.fail_pages("http://127.0.0.1:8000/files/old.pdf", "gone".to_string());
        assert_eq!(viewer.page_count(), Some(1));
    }

    #[test]
    fn replacing_the_document_resets_page_and_content() {
        let mut viewer = Viewer::default();
        viewer.load_document(sample_doc());
        viewer.navigate(9).expect("document is loaded");
        viewer.set_pages(&sample_doc().url, vec!["text".to_string()]);

        let replacement = DocumentRef {
            url: "http://127.0.0.1:8000/files/other.pdf".to_string(),
            name: "other.pdf".to_string(),
        };
        viewer.load_document(replacement);

        assert_eq!(viewer.current_page(), 1);
        assert_eq!(viewer.content(), &PageContent::Pending);
    }
}
