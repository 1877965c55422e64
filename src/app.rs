use crate::backend::BackendClient;
use crate::chat::{ChatMessage, MessageBody, Sender, Transcript};
use crate::citation::Segment;
use crate::event::AppEvent;
use crate::theme::Theme;
use crate::upload::{UploadController, UploadStatus};
use crate::viewer::{DocumentRef, PageContent, PageJumpError, Viewer};
use eframe::egui::{self, Align2, CornerRadius, RichText, ScrollArea};
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NARROW_LAYOUT_WIDTH: f32 = 900.0;

/// The one interaction the transcript can produce per frame; routed to
/// the viewer after the panel has rendered.
enum ChatAction {
    CitationClicked(u32),
}

pub struct PagemarkApp {
    rx: Receiver<AppEvent>,
    backend: BackendClient,
    theme: Theme,
    transcript: Transcript,
    uploads: UploadController,
    viewer: Viewer,
    input_buffer: String,
    diagnostics_log: Vec<String>,
    scroll_to_bottom: bool,
    drop_armed: bool,
    viewer_revealed: bool,
    notice: Option<String>,
}

impl PagemarkApp {
    pub fn new(rx: Receiver<AppEvent>, backend: BackendClient) -> Self {
        Self {
            rx,
            backend,
            theme: Theme::default(),
            transcript: Transcript::default(),
            uploads: UploadController::default(),
            viewer: Viewer::default(),
            input_buffer: String::new(),
            diagnostics_log: Vec::new(),
            scroll_to_bottom: false,
            drop_armed: false,
            viewer_revealed: false,
            notice: None,
        }
    }

    fn timestamp() -> String {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(duration) => duration.as_secs().to_string(),
            Err(_) => "0".to_string(),
        }
    }

    fn log_diagnostic(&mut self, message: impl Into<String>) {
        self.diagnostics_log
            .push(format!("[{}] {}", Self::timestamp(), message.into()));
    }

    fn submit_message(&mut self, ctx: &egui::Context) {
        let text = self.input_buffer.trim().to_string();
        if text.is_empty() {
            return;
        }

        self.transcript.push_user(text.clone());
        self.transcript.begin_assistant();
        self.backend.send_chat(text);
        self.input_buffer.clear();
        self.scroll_to_bottom = true;
        ctx.request_repaint();
    }

    fn start_upload(&mut self, path: PathBuf) {
        let Some(file_name) = path.file_name().map(|name| name.to_string_lossy().to_string())
        else {
            return;
        };
        if file_name.is_empty() {
            return;
        }

        let (upload_id, token) = self.uploads.begin(&file_name);
        self.log_diagnostic(format!("upload started: {file_name}"));
        self.backend.upload(path, upload_id, token);
    }

    fn cancel_upload(&mut self) {
        if self.uploads.cancel_active() {
            self.log_diagnostic("upload cancelled by user");
        }
    }

    fn jump_to_page(&mut self, page: u32) {
        match self.viewer.navigate(page) {
            Ok(()) => {}
            Err(PageJumpError::NoDocument) => {
                self.notice =
                    Some("No document loaded yet. Upload one to jump to its pages.".to_string());
            }
        }
    }

    fn drain_events(&mut self, ctx: &egui::Context) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.apply_event(event, Some(ctx)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.log_diagnostic("event channel disconnected");
                    break;
                }
            }
        }
    }

    fn apply_event(&mut self, event: AppEvent, ctx: Option<&egui::Context>) {
        match event {
            AppEvent::UploadSucceeded {
                upload_id,
                stored_name,
                original_name,
            } => {
                if self.uploads.report_success(upload_id) {
                    let doc = DocumentRef {
                        url: self.backend.file_url(&stored_name),
                        name: original_name.clone(),
                    };
                    self.backend.fetch_document_pages(doc.url.clone());
                    self.viewer.load_document(doc);
                    self.transcript.push_assistant_note(format!(
                        "\"{original_name}\" is ready. Ask me anything about it."
                    ));
                    self.scroll_to_bottom = true;
                } else {
                    self.log_diagnostic(format!("dropped stale result for upload #{upload_id}"));
                }
            }
            AppEvent::UploadFailed { upload_id, message } => {
                if self.uploads.report_failure(upload_id, message.clone()) {
                    self.log_diagnostic(format!("upload failed: {message}"));
                } else {
                    self.log_diagnostic(format!("dropped stale failure for upload #{upload_id}"));
                }
            }
            AppEvent::StreamDelta(text) => {
                self.transcript.apply_delta(&text);
                self.scroll_to_bottom = true;
                if let Some(ctx) = ctx {
                    ctx.request_repaint();
                }
            }
            AppEvent::StreamEnd => {
                self.transcript.complete_stream();
                self.scroll_to_bottom = true;
                if let Some(ctx) = ctx {
                    ctx.request_repaint();
                }
            }
            AppEvent::StreamFailed(message) => {
                self.log_diagnostic(format!("chat stream failed: {message}"));
                self.transcript
                    .fail_stream("Error: could not reach the assistant.".to_string());
                self.scroll_to_bottom = true;
                if let Some(ctx) = ctx {
                    ctx.request_repaint();
                }
            }
            AppEvent::DocumentPagesLoaded { url, pages } => {
                self.viewer.set_pages(&url, pages);
            }
            AppEvent::DocumentPagesFailed { url, message } => {
                self.log_diagnostic(format!("page extraction failed: {message}"));
                self.viewer.fail_pages(&url, message);
            }
        }
    }

    fn handle_file_drops(&mut self, ctx: &egui::Context) {
        self.drop_armed = ctx.input(|i| !i.raw.hovered_files.is_empty());

        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|file| file.path.clone())
                .collect()
        });
        if let Some(path) = dropped.into_iter().next() {
            self.start_upload(path);
        }
    }

    fn render_top_bar(&mut self, ctx: &egui::Context, narrow: bool) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong("Pagemark");
                ui.separator();
                ui.label(RichText::new(self.backend.base()).color(self.theme.text_muted));
                ui.separator();
                if self.transcript.is_streaming() {
                    ui.label(RichText::new("Streaming reply...").color(self.theme.warning));
                } else if self.uploads.active().is_some() {
                    ui.label(RichText::new("Uploading...").color(self.theme.warning));
                } else {
                    ui.label(RichText::new("Ready").color(self.theme.text_muted));
                }

                if narrow {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("Viewer").clicked() {
                            self.viewer_revealed = !self.viewer_revealed;
                        }
                    });
                }
            });
        });
    }

    fn render_upload_panel(&mut self, ctx: &egui::Context) {
        let mut pick_requested = false;
        let mut stop_requested = false;

        egui::SidePanel::left("upload_panel")
            .resizable(true)
            .default_width(240.0)
            .show(ctx, |ui| {
                ui.heading("Documents");
                ui.separator();

                if ui.button("Choose file...").clicked() {
                    pick_requested = true;
                }
                let drop_hint = if self.drop_armed {
                    RichText::new("Release to upload").color(self.theme.accent_primary)
                } else {
                    RichText::new("or drop a PDF/DOCX anywhere").color(self.theme.text_muted)
                };
                ui.label(drop_hint);

                ui.separator();
                ui.strong("Uploads");
                for session in self.uploads.sessions() {
                    match &session.status {
                        UploadStatus::Uploading => {
                            ui.horizontal(|ui| {
                                ui.spinner();
                                ui.label(format!("Uploading {}...", session.file_name));
                                if ui.small_button("Stop").clicked() {
                                    stop_requested = true;
                                }
                            });
                        }
                        UploadStatus::Succeeded => {
                            ui.colored_label(self.theme.success, &session.file_name);
                        }
                        UploadStatus::Cancelled => {
                            ui.colored_label(self.theme.text_muted, "Cancelled by user.");
                        }
                        UploadStatus::Failed(message) => {
                            ui.colored_label(self.theme.danger, format!("Error: {message}"));
                        }
                    }
                }
            });

        if stop_requested {
            self.cancel_upload();
        }
        if pick_requested {
            let picked = rfd::FileDialog::new()
                .add_filter("Documents", &["pdf", "docx"])
                .pick_file();
            if let Some(path) = picked {
                self.start_upload(path);
            }
        }
    }

    fn render_viewer_panel(&mut self, ctx: &egui::Context, narrow: bool) {
        let visible = !narrow || self.viewer_revealed;
        let mut nav: Option<u32> = None;

        egui::SidePanel::right("viewer_panel")
            .resizable(true)
            .default_width(380.0)
            .show_animated(ctx, visible, |ui| {
                let Some(doc) = self.viewer.document() else {
                    ui.heading("Viewer");
                    ui.separator();
                    ui.label(
                        RichText::new("No document loaded. Upload a PDF or DOCX to get started.")
                            .color(self.theme.text_muted),
                    );
                    return;
                };

                ui.heading(&doc.name);
                ui.separator();

                let page = self.viewer.current_page();
                let total = self.viewer.page_count();
                ui.horizontal(|ui| {
                    if ui.add_enabled(page > 1, egui::Button::new("Prev")).clicked() {
                        nav = Some(page - 1);
                    }
                    match total {
                        Some(total) => ui.label(format!("Page {page} of {total}")),
                        None => ui.label(format!("Page {page}")),
                    };
                    let next_enabled = total.map_or(true, |total| (page as usize) < total);
                    if ui
                        .add_enabled(next_enabled, egui::Button::new("Next"))
                        .clicked()
                    {
                        nav = Some(page + 1);
                    }
                });
                ui.separator();

                match self.viewer.content() {
                    PageContent::Pending => {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label("Extracting pages...");
                        });
                    }
                    PageContent::Failed(message) => {
                        ui.colored_label(self.theme.danger, message);
                    }
                    PageContent::Loaded(pages) => {
                        // Salting with the generation gives every navigation a
                        // fresh widget identity, so a repeated jump to the same
                        // page still resets the cached scroll position.
                        ScrollArea::vertical()
                            .id_salt(("document_page", self.viewer.generation()))
                            .show(ui, |ui| match pages.get(page as usize - 1) {
                                Some(text) => {
                                    ui.label(text);
                                }
                                None => {
                                    ui.colored_label(
                                        self.theme.warning,
                                        format!(
                                            "Page {page} is past the end of this document ({} pages).",
                                            pages.len()
                                        ),
                                    );
                                }
                            });
                    }
                }
            });

        if let Some(page) = nav {
            self.jump_to_page(page);
        }
    }

    fn render_message(theme: &Theme, ui: &mut egui::Ui, message: &ChatMessage) -> Option<ChatAction> {
        let mut action = None;
        let (who, fill) = match message.sender {
            Sender::User => ("You", theme.bubble_user),
            Sender::Assistant => ("Assistant", theme.bubble_assistant),
        };

        ui.label(RichText::new(who).small().color(theme.text_muted));
        theme.bubble_frame(fill).show(ui, |ui| match &message.body {
            MessageBody::Plain(text) => {
                ui.label(text);
            }
            MessageBody::Error(text) => {
                ui.colored_label(theme.danger, text);
            }
            MessageBody::Annotated(annotated) => {
                ui.horizontal_wrapped(|ui| {
                    ui.spacing_mut().item_spacing.x = 0.0;
                    for segment in annotated.segments() {
                        match segment {
                            Segment::Text(text) => {
                                ui.label(text);
                            }
                            Segment::Citation(token) => {
                                if ui.link(token.page.to_string()).clicked() {
                                    action = Some(ChatAction::CitationClicked(token.page));
                                }
                            }
                        }
                    }
                });
            }
        });
        ui.add_space(theme.spacing_8);
        action
    }

    fn render_chat_panel(&mut self, ctx: &egui::Context) -> Option<ChatAction> {
        let mut action = None;
        let mut send_now = false;
        let input_enabled = !self.transcript.is_streaming();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Chat");
            ui.separator();

            let transcript_height = (ui.available_height() - 150.0).max(120.0);
            ScrollArea::vertical()
                .id_salt("chat_transcript")
                .max_height(transcript_height)
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for message in self.transcript.messages() {
                        if let Some(clicked) = Self::render_message(&self.theme, ui, message) {
                            action = Some(clicked);
                        }
                    }

                    if let Some(partial) = self.transcript.streamed_so_far() {
                        ui.label(RichText::new("Assistant").small().color(self.theme.text_muted));
                        self.theme
                            .bubble_frame(self.theme.bubble_assistant)
                            .show(ui, |ui| {
                                if partial.is_empty() {
                                    ui.label(RichText::new("...").color(self.theme.text_muted));
                                } else {
                                    ui.label(partial);
                                }
                            });
                    }

                    if self.scroll_to_bottom {
                        ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
                    }
                });
            self.scroll_to_bottom = false;

            egui::CollapsingHeader::new("Diagnostics")
                .default_open(false)
                .show(ui, |ui| {
                    ScrollArea::vertical()
                        .id_salt("diagnostics_log")
                        .max_height(90.0)
                        .stick_to_bottom(true)
                        .show(ui, |ui| {
                            for entry in &self.diagnostics_log {
                                ui.label(entry);
                            }
                        });
                });

            ui.separator();
            let hint = if input_enabled {
                "Ask about the document..."
            } else {
                "Waiting for reply..."
            };

            self.theme.composer_frame().show(ui, |ui| {
                ui.horizontal(|ui| {
                    let response = ui.add_enabled(
                        input_enabled,
                        egui::TextEdit::singleline(&mut self.input_buffer)
                            .desired_width(f32::INFINITY)
                            .hint_text(hint),
                    );
                    if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                        send_now = true;
                    }

                    let clicked = ui
                        .add_enabled(
                            input_enabled && !self.input_buffer.trim().is_empty(),
                            egui::Button::new("Send"),
                        )
                        .clicked();
                    send_now |= clicked;
                });
            });
        });

        if send_now && input_enabled {
            self.submit_message(ctx);
        }
        action
    }

    fn render_notice(&mut self, ctx: &egui::Context) {
        let Some(message) = self.notice.clone() else {
            return;
        };

        let mut dismissed = false;
        egui::Window::new("Notice")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(message);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.notice = None;
        }
    }

    fn render_drop_overlay(&self, ctx: &egui::Context) {
        if !self.drop_armed {
            return;
        }

        let painter = ctx.layer_painter(egui::LayerId::new(
            egui::Order::Foreground,
            egui::Id::new("drop_overlay"),
        ));
        let rect = ctx.screen_rect();
        painter.rect_filled(rect, CornerRadius::ZERO, self.theme.drop_target_glow);
        painter.text(
            rect.center(),
            Align2::CENTER_CENTER,
            "Drop document to upload",
            egui::FontId::proportional(22.0),
            self.theme.text_primary,
        );
    }
}

impl eframe::App for PagemarkApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events(ctx);
        self.handle_file_drops(ctx);

        let narrow = ctx.screen_rect().width() < NARROW_LAYOUT_WIDTH;
        self.render_top_bar(ctx, narrow);
        self.render_upload_panel(ctx);
        self.render_viewer_panel(ctx, narrow);
        let action = self.render_chat_panel(ctx);
        if let Some(ChatAction::CitationClicked(page)) = action {
            self.jump_to_page(page);
        }
        if self.viewer.take_reveal_request() {
            self.viewer_revealed = true;
        }

        self.render_notice(ctx);
        self.render_drop_overlay(ctx);

        if self.transcript.is_streaming() || self.uploads.active().is_some() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}
