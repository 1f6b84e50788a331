//! Status bar rendering at the bottom of the window.

use eframe::egui;

use super::theme::catppuccin;
use crate::app::WatchSession;
use crate::core::TargetState;

/// Render the status bar at the very bottom.
pub fn render(ctx: &egui::Context, session: &WatchSession, state: TargetState, rows: usize) {
    egui::TopBottomPanel::bottom("status_bar")
        .exact_height(24.0)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                let (color, icon, text) = match state {
                    TargetState::Running => (catppuccin::GREEN, "▶", "Running"),
                    TargetState::Stopped => (catppuccin::YELLOW, "■", "Stopped"),
                    TargetState::Detached if session.has_reader() => {
                        (catppuccin::TEAL, "◉", "Reading")
                    }
                    TargetState::Detached => (catppuccin::OVERLAY0, "○", "No target"),
                };
                ui.label(egui::RichText::new(icon).color(color).small());
                ui.label(egui::RichText::new(text).color(color).small());

                ui.separator();

                match session.schema() {
                    Some(schema) => ui.label(
                        egui::RichText::new(format!(
                            "{} types | {} symbols",
                            schema.len(),
                            schema.symbols().len()
                        ))
                        .color(catppuccin::SUBTEXT0)
                        .small(),
                    ),
                    None => ui.label(
                        egui::RichText::new("No schema")
                            .color(catppuccin::OVERLAY0)
                            .small(),
                    ),
                };

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(
                        egui::RichText::new(format!("memwatch v{}", env!("CARGO_PKG_VERSION")))
                            .color(catppuccin::LAVENDER)
                            .small(),
                    );
                    ui.separator();
                    let stats = session.cache_stats();
                    ui.label(
                        egui::RichText::new(format!(
                            "{} rows | {} records | {} pages | {} swaps",
                            rows,
                            session.history_len(),
                            session.resident_pages(),
                            stats.swaps
                        ))
                        .color(catppuccin::SUBTEXT0)
                        .small(),
                    );
                });
            });
        });
}
