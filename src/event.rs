#[derive(Debug, Clone)]
pub enum AppEvent {
    UploadSucceeded {
        upload_id: u64,
        stored_name: String,
        original_name: String,
    },
    UploadFailed {
        upload_id: u64,
        message: String,
    },
    StreamDelta(String),
    StreamEnd,
    StreamFailed(String),
    DocumentPagesLoaded {
        url: String,
        pages: Vec<String>,
    },
    DocumentPagesFailed {
        url: String,
        message: String,
    },
}
