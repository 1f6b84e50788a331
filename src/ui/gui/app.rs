//! Watch window - eframe application around one [`WatchSession`].
//!
//! Every frame is a render tick. Update ticks come from the toolbar, from
//! pausing the attached process, or from the poll timer.

use eframe::egui;
use std::time::{Duration, Instant};

use super::status_bar;
use super::theme::catppuccin;
use super::tree::{EguiSurface, TreeState};
use crate::app::WatchSession;
use crate::core::{Debugger, TargetState};

/// Highlights fade smoothly only if frames keep coming
const FADE_REPAINT: Duration = Duration::from_millis(50);

/// Main application struct that implements eframe::App
pub struct WatchApp {
    session: WatchSession,
    debugger: Option<Debugger>,
    tree: TreeState,
    clock: Instant,
    /// Update tick interval for a running target
    poll: Option<Duration>,
    last_poll: Instant,
    rows: usize,
    message: Option<String>,
}

impl WatchApp {
    pub fn new(session: WatchSession, debugger: Option<Debugger>, poll: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            session,
            debugger,
            tree: TreeState::default(),
            clock: now,
            poll,
            last_poll: now,
            rows: 0,
            message: None,
        }
    }

    fn target_state(&self) -> TargetState {
        self.debugger
            .as_ref()
            .map_or(TargetState::Detached, Debugger::state)
    }

    fn poll(&mut self, ctx: &egui::Context) {
        let Some(interval) = self.poll else {
            return;
        };
        if self.target_state() == TargetState::Stopped {
            return;
        }
        if self.last_poll.elapsed() >= interval {
            self.session.update_tick();
            self.last_poll = Instant::now();
        }
        ctx.request_repaint_after(interval);
    }

    fn pause(&mut self) {
        let Some(debugger) = self.debugger.as_mut() else {
            return;
        };
        match debugger.pause() {
            Ok(()) => {
                self.session.update_tick();
                self.message = None;
            }
            Err(e) => self.message = Some(e.to_string()),
        }
    }

    fn resume(&mut self) {
        let Some(debugger) = self.debugger.as_mut() else {
            return;
        };
        if let Err(e) = debugger.resume() {
            self.message = Some(e.to_string());
        }
    }

    fn render_toolbar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("⟳ Update").clicked() {
                    self.session.update_tick();
                }

                if self.debugger.is_some() {
                    ui.separator();
                    match self.target_state() {
                        TargetState::Running => {
                            if ui.button("⏸ Pause").clicked() {
                                self.pause();
                            }
                        }
                        _ => {
                            if ui.button("▶ Resume").clicked() {
                                self.resume();
                            }
                        }
                    }
                }

                ui.separator();
                let mut expand_all = self.session.expand_all();
                if ui.checkbox(&mut expand_all, "Expand all").changed() {
                    self.session.set_expand_all(expand_all);
                }

                ui.separator();
                ui.label("Filter:");
                ui.add(
                    egui::TextEdit::singleline(&mut self.tree.filter)
                        .desired_width(180.0)
                        .hint_text("name"),
                );

                if let Some(message) = &self.message {
                    ui.separator();
                    ui.colored_label(catppuccin::RED, message);
                }
            });
        });
    }
}

impl eframe::App for WatchApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll(ctx);
        self.render_toolbar(ctx);
        status_bar::render(ctx, &self.session, self.target_state(), self.rows);

        let now = self.clock.elapsed().as_millis() as u64;
        let fade_secs = self.session.config().fade_secs;
        let Self {
            session,
            tree,
            rows,
            ..
        } = self;

        egui::CentralPanel::default().show(ctx, |ui| {
            if session.schema().is_none() {
                ui.centered_and_justified(|ui| {
                    ui.label("No schema loaded. Start with --binary <elf>.");
                });
                return;
            }
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    let mut surface = EguiSurface::new(ui, tree, fade_secs);
                    session.render_tick(now, &mut surface);
                    *rows = surface.rows();
                });
        });

        ctx.request_repaint_after(FADE_REPAINT);
    }
}

impl Drop for WatchApp {
    fn drop(&mut self) {
        if let Some(debugger) = self.debugger.as_mut() {
            if let Err(e) = debugger.detach() {
                log::warn!("{}", e);
            }
        }
    }
}

/// Run the watch window on the main thread until it is closed
pub fn run_gui(
    session: WatchSession,
    debugger: Option<Debugger>,
    poll: Option<Duration>,
) -> anyhow::Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([960.0, 720.0])
            .with_min_inner_size([480.0, 320.0])
            .with_title("memwatch - Live Memory Inspector"),
        ..Default::default()
    };

    let app = WatchApp::new(session, debugger, poll);
    eframe::run_native(
        "memwatch",
        native_options,
        Box::new(|cc| {
            super::theme::init(&cc.egui_ctx);
            Box::new(app)
        }),
    )
    .map_err(|e| anyhow::anyhow!("GUI Error: {}", e))
}
