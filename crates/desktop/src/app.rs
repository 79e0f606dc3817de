//! Docent Desktop — egui app state and UI.

use eframe::egui;
use lib::backend::{has_pdf_extension, AskResponse, BackendError, UploadResponse};
use lib::conversation::{transfer, Conversation, UploadStatus};
use lib::init::Profile;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

const CHAT_INPUT_HEIGHT: f32 = 32.0;
const LOG_BUFFER_MAX_LINES: usize = 2000;
/// Repaint cadence while a request is in flight, so results are picked up without input events.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Ring buffer of log lines for the Logs screen. Written by DesktopLogger.
static LOG_LINES: OnceLock<Mutex<VecDeque<String>>> = OnceLock::new();

fn log_buffer() -> &'static Mutex<VecDeque<String>> {
    LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()))
}

fn push_log_line(line: String) {
    if let Ok(mut buf) = log_buffer().lock() {
        buf.push_back(line);
        while buf.len() > LOG_BUFFER_MAX_LINES {
            buf.pop_front();
        }
    }
}

/// Logger that appends to LOG_LINES for display in the Logs screen.
struct DesktopLogger;

impl log::Log for DesktopLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let line = format!(
            "{} [{}] {}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.args()
        );
        push_log_line(line);
    }

    fn flush(&self) {}
}

static LOGGER: DesktopLogger = DesktopLogger;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum Screen {
    #[default]
    Chat,
    Info,
    Logs,
}

/// A request running on the runtime; `seq` ties the result back to the conversation.
struct InFlight<T> {
    seq: u64,
    receiver: mpsc::Receiver<Result<T, BackendError>>,
}

impl<T> InFlight<T> {
    /// Some(result) once the worker has answered. A dropped sender counts as a failed request.
    fn poll(&self) -> Option<Result<T, BackendError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(BackendError::Api(
                "request worker stopped".to_string(),
            ))),
        }
    }
}

pub struct DocentApp {
    /// Loaded profile (config, session identity, backend client). None if loading failed.
    profile: Option<Profile>,
    /// Error from loading the profile or starting the runtime.
    startup_error: Option<String>,
    /// Runs backend requests off the UI thread.
    runtime: Option<tokio::runtime::Runtime>,
    /// Transcript, reasoning log and upload status. Only mutated on the UI thread.
    conversation: Conversation,
    /// Current input text for the chat box.
    chat_input: String,
    /// Path typed into the upload field.
    upload_path: String,
    /// Local validation message for the upload field (e.g. not a PDF).
    upload_hint: Option<String>,
    ask: Option<InFlight<AskResponse>>,
    upload: Option<InFlight<UploadResponse>>,
    current_screen: Screen,
}

impl DocentApp {
    /// Space between the main screen title and the content below.
    const SCREEN_TITLE_BOTTOM_SPACING: f32 = 18.0;
    /// Space between the bottom of the content and the window edge.
    const SCREEN_FOOTER_SPACING: f32 = 24.0;

    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Debug);
        log::info!("desktop started");

        let mut startup_error = None;
        let profile = match Profile::open(None) {
            Ok(p) => Some(p),
            Err(e) => {
                log::error!("failed to open profile: {:#}", e);
                startup_error = Some(format!("failed to load config: {:#}", e));
                None
            }
        };
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(rt) => Some(rt),
            Err(e) => {
                log::error!("failed to start runtime: {}", e);
                startup_error.get_or_insert_with(|| format!("failed to start runtime: {}", e));
                None
            }
        };
        let conversation = match &profile {
            Some(p) => p.conversation(),
            None => Conversation::new(None, Default::default()),
        };
        Self {
            profile,
            startup_error,
            runtime,
            conversation,
            chat_input: String::new(),
            upload_path: String::new(),
            upload_hint: None,
            ask: None,
            upload: None,
            current_screen: Screen::default(),
        }
    }

    fn ready(&self) -> bool {
        self.profile.is_some() && self.runtime.is_some()
    }

    /// Echo the message and send it on the runtime. Empty input and overlapping sends are ignored.
    fn start_chat_turn(&mut self) {
        let (Some(profile), Some(runtime)) = (&self.profile, &self.runtime) else {
            return;
        };
        let turn = match self.conversation.begin_turn(&self.chat_input) {
            Ok(t) => t,
            Err(e) => {
                log::debug!("send ignored: {}", e);
                return;
            }
        };
        self.chat_input.clear();
        let backend = profile.backend.clone();
        let (tx, rx) = mpsc::channel();
        runtime.spawn(async move {
            let result = backend.ask(&turn.request).await;
            let _ = tx.send(result);
        });
        self.ask = Some(InFlight {
            seq: turn.seq,
            receiver: rx,
        });
    }

    fn start_upload(&mut self) {
        let (Some(profile), Some(runtime)) = (&self.profile, &self.runtime) else {
            return;
        };
        let path = PathBuf::from(self.upload_path.trim());
        if !has_pdf_extension(&path) {
            self.upload_hint = Some("Only PDF files can be uploaded.".to_string());
            return;
        }
        self.upload_hint = None;
        let seq = match self.conversation.begin_upload() {
            Ok(seq) => seq,
            Err(e) => {
                log::debug!("upload ignored: {}", e);
                return;
            }
        };
        let backend = profile.backend.clone();
        let (tx, rx) = mpsc::channel();
        runtime.spawn(async move {
            let result = transfer(&backend, &path).await;
            let _ = tx.send(result);
        });
        self.upload = Some(InFlight { seq, receiver: rx });
    }

    /// Apply finished requests to the conversation. Call each frame.
    fn poll_requests(&mut self) {
        if let Some(result) = self.ask.as_ref().and_then(InFlight::poll) {
            if let Some(inflight) = self.ask.take() {
                self.conversation.finish_turn(inflight.seq, result);
            }
        }
        if let Some(result) = self.upload.as_ref().and_then(InFlight::poll) {
            if let Some(inflight) = self.upload.take() {
                self.conversation.finish_upload(inflight.seq, result);
            }
        }
    }

    fn ui_upload_row(&mut self, ui: &mut egui::Ui) {
        let uploading = self.conversation.upload_in_flight();
        ui.label(egui::RichText::new("Upload PDF").strong());
        ui.add_space(4.0);
        ui.horizontal(|ui| {
            let field = ui.add_enabled(
                !uploading,
                egui::TextEdit::singleline(&mut self.upload_path)
                    .hint_text("/path/to/document.pdf")
                    .desired_width(ui.available_width() - 100.0),
            );
            let submitted = field.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            let clicked = ui
                .add_enabled(self.ready() && !uploading, egui::Button::new("Upload"))
                .clicked();
            if (clicked || submitted) && self.ready() && !uploading {
                self.start_upload();
            }
        });
        if let Some(ref hint) = self.upload_hint {
            ui.colored_label(egui::Color32::RED, hint);
        }
        match self.conversation.upload_status() {
            UploadStatus::Idle => {}
            UploadStatus::Uploading => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Uploading...");
                });
            }
            UploadStatus::Uploaded(message) => {
                ui.colored_label(egui::Color32::DARK_GREEN, format!("Uploaded: {}", message));
            }
            UploadStatus::Error(reason) => {
                ui.colored_label(egui::Color32::RED, format!("Upload failed: {}", reason));
            }
        }
    }

    fn render_chat_entry(ui: &mut egui::Ui, entry: &str) {
        let frame = egui::Frame::none()
            .fill(ui.style().visuals.extreme_bg_color)
            .stroke(egui::Stroke::new(
                1.0,
                ui.style().visuals.widgets.noninteractive.bg_stroke.color,
            ))
            .rounding(egui::Rounding::same(6.0))
            .inner_margin(egui::Margin::same(8.0));
        frame.show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.label(entry);
        });
    }

    /// Chat transcript on the left with the input row, reasoning log on the right.
    fn ui_chat(&mut self, ui: &mut egui::Ui) {
        let can_send = self.ready() && !self.conversation.ask_in_flight();
        let panel_height = (ui.available_height() - Self::SCREEN_FOOTER_SPACING).max(120.0);
        let mut send_now = false;

        ui.columns(2, |columns| {
            let left = &mut columns[0];
            left.label(egui::RichText::new("Chat").strong());
            left.add_space(8.0);
            let messages_height = (panel_height - CHAT_INPUT_HEIGHT - 24.0).max(60.0);
            egui::ScrollArea::vertical()
                .id_source("transcript")
                .max_height(messages_height)
                .min_scrolled_height(messages_height)
                .auto_shrink([false, false])
                .stick_to_bottom(true)
                .show(left, |ui| {
                    for entry in self.conversation.transcript().entries() {
                        Self::render_chat_entry(ui, entry);
                        ui.add_space(6.0);
                    }
                    if self.conversation.transcript().is_empty() {
                        ui.label("Upload a PDF, then ask a question about it.");
                    }
                });
            left.add_space(8.0);
            left.horizontal(|ui| {
                let input = ui.add_sized(
                    [ui.available_width() - 70.0, CHAT_INPUT_HEIGHT],
                    egui::TextEdit::singleline(&mut self.chat_input).hint_text("Ask a question..."),
                );
                if input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    send_now = true;
                    input.request_focus();
                }
                if ui.add_enabled(can_send, egui::Button::new("Send")).clicked() {
                    send_now = true;
                }
            });

            let right = &mut columns[1];
            right.label(egui::RichText::new("Reasoning").strong());
            right.add_space(8.0);
            egui::ScrollArea::vertical()
                .id_source("reasoning_log")
                .max_height(panel_height - 24.0)
                .auto_shrink([false, false])
                .stick_to_bottom(true)
                .show(right, |ui| {
                    for line in self.conversation.reasoning_log().entries() {
                        ui.label(egui::RichText::new(line.as_str()).monospace());
                    }
                });
        });

        if send_now && can_send {
            self.start_chat_turn();
        }
    }

    fn ui_info_screen(&self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Info");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);
        if let Some(ref err) = self.startup_error {
            ui.colored_label(egui::Color32::RED, err);
            ui.add_space(8.0);
        }
        let Some(ref profile) = self.profile else {
            ui.label("No profile loaded.");
            return;
        };
        egui::Grid::new("info_grid")
            .num_columns(2)
            .spacing([24.0, 8.0])
            .show(ui, |ui| {
                ui.label(egui::RichText::new("Backend").strong());
                ui.label(profile.backend.base_url());
                ui.end_row();
                ui.label(egui::RichText::new("Session").strong());
                if profile.identity.is_persisted() {
                    ui.label(egui::RichText::new(profile.identity.id()).monospace());
                } else {
                    ui.label(format!("{} (not saved)", profile.identity.id()));
                }
                ui.end_row();
                ui.label(egui::RichText::new("Config").strong());
                ui.label(profile.config_path.display().to_string());
                ui.end_row();
                ui.label(egui::RichText::new("Storage").strong());
                ui.label(profile.storage_path.display().to_string());
                ui.end_row();
            });
    }

    fn ui_logs_screen(&self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Logs");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);
        let lines: Vec<String> = log_buffer()
            .lock()
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default();
        let available = ui.available_height();
        egui::ScrollArea::vertical()
            .max_height((available - Self::SCREEN_FOOTER_SPACING).max(80.0))
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &lines {
                    ui.label(egui::RichText::new(line.as_str()).family(egui::FontFamily::Monospace));
                }
                if lines.is_empty() {
                    ui.label("No log output yet.");
                }
            });
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }
}

impl eframe::App for DocentApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_requests();
        if self.ask.is_some() || self.upload.is_some() {
            ctx.request_repaint_after(POLL_INTERVAL);
        }

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                .show(ui, |ui| {
                    ui.add_space(16.0);
                    ui.horizontal(|ui| {
                        ui.heading("Docent");
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if self.conversation.ask_in_flight() {
                                ui.spinner();
                                ui.label("Thinking...");
                            } else if !self.ready() {
                                ui.colored_label(egui::Color32::RED, "Not connected");
                            }
                        });
                    });
                    ui.add_space(16.0);
                });
        });

        let current_screen = &mut self.current_screen;
        egui::SidePanel::left("sidebar")
            .resizable(false)
            .exact_width(140.0)
            .show(ctx, |ui| {
                egui::Frame::none()
                    .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                    .show(ui, |ui| {
                        ui.add_space(24.0);
                        if ui.selectable_label(*current_screen == Screen::Chat, "Chat").clicked() {
                            *current_screen = Screen::Chat;
                        }
                        ui.add_space(12.0);
                        if ui.selectable_label(*current_screen == Screen::Info, "Info").clicked() {
                            *current_screen = Screen::Info;
                        }
                        ui.add_space(12.0);
                        if ui.selectable_label(*current_screen == Screen::Logs, "Logs").clicked() {
                            *current_screen = Screen::Logs;
                        }
                    });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                .show(ui, |ui| match self.current_screen {
                    Screen::Chat => {
                        ui.add_space(24.0);
                        self.ui_upload_row(ui);
                        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);
                        ui.separator();
                        ui.add_space(8.0);
                        self.ui_chat(ui);
                    }
                    Screen::Info => self.ui_info_screen(ui),
                    Screen::Logs => self.ui_logs_screen(ui),
                });
        });
    }
}
