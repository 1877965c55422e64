use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Uploading,
    Cancelled,
    Succeeded,
    Failed(String),
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadStatus::Uploading)
    }
}

/// One file transfer. Created on selection or drop, terminal after
/// success, failure, or cancellation, never reused.
#[derive(Debug)]
pub struct UploadSession {
    pub upload_id: u64,
    pub file_name: String,
    pub status: UploadStatus,
    token: Option<CancellationToken>,
}

/// Tracks upload sessions, newest first. At most one session is
/// non-terminal at any time; the first terminal transition for a session
/// is authoritative and every later report is discarded.
#[derive(Debug, Default)]
pub struct UploadController {
    sessions: Vec<UploadSession>,
    next_id: u64,
}

impl UploadController {
    /// Starts a new session, cancelling any transfer still in flight.
    /// Returns the session id and the token the transfer task must race
    /// its request against.
    pub fn begin(&mut self, file_name: &str) -> (u64, CancellationToken) {
        self.cancel_active();

        let upload_id = self.next_id;
        self.next_id += 1;
        let token = CancellationToken::new();
        self.sessions.insert(
            0,
            UploadSession {
                upload_id,
                file_name: file_name.to_string(),
                status: UploadStatus::Uploading,
                token: Some(token.clone()),
            },
        );
        (upload_id, token)
    }

    /// Triggers the in-flight session's token and marks it `Cancelled`.
    /// Returns false when nothing was uploading.
    pub fn cancel_active(&mut self) -> bool {
        let Some(session) = self
            .sessions
            .iter_mut()
            .find(|session| session.status == UploadStatus::Uploading)
        else {
            return false;
        };

        if let Some(token) = session.token.take() {
            token.cancel();
        }
        session.status = UploadStatus::Cancelled;
        true
    }

    /// Returns true when the transition was accepted; a report for an
    /// unknown id or an already-terminal session is dropped.
    pub fn report_success(&mut self, upload_id: u64) -> bool {
        self.finish(upload_id, UploadStatus::Succeeded)
    }

    pub fn report_failure(&mut self, upload_id: u64, message: String) -> bool {
        self.finish(upload_id, UploadStatus::Failed(message))
    }

    fn finish(&mut self, upload_id: u64, status: UploadStatus) -> bool {
        let Some(session) = self
            .sessions
            .iter_mut()
            .find(|session| session.upload_id == upload_id)
        else {
            return false;
        };
        if session.status.is_terminal() {
            return false;
        }

        session.token = None;
        session.status = status;
        true
    }

    pub fn active(&self) -> Option<&UploadSession> {
        self.sessions
            .iter()
            .find(|session| session.status == UploadStatus::Uploading)
    }

    pub fn sessions(&self) -> &[UploadSession] {
        &self.sessions
    }
}

#[cfg(test)]
mod tests {
    use super::{UploadController, UploadStatus};

    #[test]
    fn starting_a_second_upload_cancels_the_first() {
        let mut controller = UploadController::default();
        let (first_id, first_token) = controller.begin("a.pdf");
        let (second_id, _second_token) = controller.begin("b.pdf");

        assert!(first_token.is_cancelled());
        assert_eq!(controller.sessions()[1].status, UploadStatus::Cancelled);

        assert!(!controller.report_success(first_id));
        assert!(controller.report_success(second_id));
        assert_eq!(controller.sessions()[0].status, UploadStatus::Succeeded);
    }

    #[test]
    fn late_result_after_cancel_is_discarded() {
        let mut controller = UploadController::default();
        let (upload_id, token) = controller.begin("report.pdf");

        assert!(controller.cancel_active());
        assert!(token.is_cancelled());

        assert!(!controller.report_success(upload_id));
        assert!(!controller.report_failure(upload_id, "too late".to_string()));
        assert_eq!(controller.sessions()[0].status, UploadStatus::Cancelled);
    }

    #[test]
    fn failure_carries_the_reported_message() {
        let mut controller = UploadController::default();
        let (upload_id, _token) = controller.begin("broken.docx");

        assert!(controller.report_failure(upload_id, "Security Check Failed".to_string()));
        assert_eq!(
            controller.sessions()[0].status,
            UploadStatus::Failed("Security Check Failed".to_string())
        );
    }

    #[test]
    fn terminal_status_is_sticky() {
        let mut controller = UploadController::default();
        let (upload_id, _token) = controller.begin("a.pdf");

        assert!(controller.report_success(upload_id));
        assert!(!controller.report_failure(upload_id, "after the fact".to_string()));
        assert_eq!(controller.sessions()[0].status, UploadStatus::Succeeded);
    }

    #[test]
    fn unknown_upload_id_is_ignored() {
        let mut controller = UploadController::default();
        assert!(!controller.report_success(42));
        assert!(!controller.cancel_active());
    }

    #[test]
    fn active_points_at_the_in_flight_session() {
        let mut controller = UploadController::default();
        assert!(controller.active().is_none());

        let (upload_id, _token) = controller.begin("a.pdf");
        assert_eq!(
            controller.active().map(|session| session.upload_id),
            Some(upload_id)
        );

        controller.cancel_active();
        assert!(controller.active().is_none());
    }
}
