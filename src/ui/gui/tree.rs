//! Tree surface - renders visited nodes as egui rows

use std::collections::HashMap;

use eframe::egui::{self, RichText};

use super::theme::{fade, tree};
use crate::present::{highlight, Node, Payload, Surface};

/// Textures uploaded for image payloads, keyed by path
#[derive(Default)]
pub struct TextureCache {
    entries: HashMap<String, (u32, egui::TextureHandle)>,
}

impl TextureCache {
    /// Texture for `path`, re-uploaded when `generation` moves
    fn get(
        &mut self,
        ctx: &egui::Context,
        path: &str,
        generation: u32,
        size: [usize; 2],
        rgba: &[u8],
    ) -> egui::TextureId {
        if let Some((seen, handle)) = self.entries.get_mut(path) {
            if *seen != generation {
                handle.set(
                    egui::ColorImage::from_rgba_unmultiplied(size, rgba),
                    egui::TextureOptions::NEAREST,
                );
                *seen = generation;
            }
            return handle.id();
        }
        let handle = ctx.load_texture(
            path,
            egui::ColorImage::from_rgba_unmultiplied(size, rgba),
            egui::TextureOptions::NEAREST,
        );
        let id = handle.id();
        self.entries.insert(path.to_string(), (generation, handle));
        id
    }
}

/// UI-side tree state that outlives a frame
#[derive(Default)]
pub struct TreeState {
    /// Expand/collapse choices made by clicking; everything else uses the
    /// node's starting state
    pub expanded: HashMap<String, bool>,
    pub filter: String,
    pub textures: TextureCache,
}

/// [`Surface`] drawing into an egui `Ui`
pub struct EguiSurface<'a> {
    ui: &'a mut egui::Ui,
    state: &'a mut TreeState,
    fade_secs: f32,
    depth: usize,
    rows: usize,
}

impl<'a> EguiSurface<'a> {
    pub fn new(ui: &'a mut egui::Ui, state: &'a mut TreeState, fade_secs: f32) -> Self {
        Self {
            ui,
            state,
            fade_secs,
            depth: 0,
            rows: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// One row; `toggle` is present for containers
    fn row(&mut self, node: &Node<'_>, payload: &Payload<'_>, toggle: Option<&mut bool>) {
        let indent = self.depth as f32 * self.ui.spacing().indent;
        let base = match payload {
            Payload::Text { .. } => tree::STRING,
            Payload::Pointer { .. } => tree::POINTER,
            Payload::Unavailable | Payload::Unknown(_) => tree::UNAVAILABLE,
            _ => tree::VALUE,
        };
        let color = fade(base, tree::CHANGED, highlight(node.age, self.fade_secs));
        let textures = &mut self.state.textures;

        self.ui.horizontal(|ui| {
            ui.add_space(indent);
            match toggle {
                Some(expanded) => {
                    let icon = if *expanded { "▼" } else { "▶" };
                    if ui.small_button(icon).clicked() {
                        *expanded = !*expanded;
                    }
                }
                None => ui.add_space(ui.spacing().interact_size.y),
            }
            ui.label(RichText::new(node.label).color(tree::LABEL));

            match payload {
                Payload::Image {
                    width,
                    height,
                    bytes_per_pixel: 4,
                    bytes,
                    generation,
                } => {
                    let size = [*width as usize, *height as usize];
                    let id = textures.get(ui.ctx(), node.path, *generation, size, bytes);
                    let scale = (128.0 / (*width).max(*height).max(1) as f32).max(1.0);
                    ui.image((id, egui::vec2(*width as f32 * scale, *height as f32 * scale)));
                }
                _ => {
                    let text = RichText::new(payload.summary()).color(color);
                    ui.label(if node.fresh { text.strong() } else { text });
                }
            }

            ui.label(RichText::new(node.type_name).color(tree::TYPE).small());
            if node.address != 0 {
                ui.label(
                    RichText::new(format!("{:#x}", node.address))
                        .color(tree::ADDRESS)
                        .small(),
                );
            }
        });
        self.rows += 1;
    }
}

impl Surface for EguiSurface<'_> {
    fn leaf(&mut self, node: &Node<'_>, payload: Payload<'_>) {
        self.row(node, &payload, None);
    }

    fn open(&mut self, node: &Node<'_>, payload: Payload<'_>) -> bool {
        let was_expanded = self
            .state
            .expanded
            .get(node.path)
            .copied()
            .unwrap_or(!node.on_demand);
        let mut expanded = was_expanded;
        self.row(node, &payload, Some(&mut expanded));

        if expanded != was_expanded {
            self.state.expanded.insert(node.path.to_string(), expanded);
        }
        if expanded {
            self.depth += 1;
        }
        expanded
    }

    fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn filter(&self, _path: &str) -> Option<&str> {
        let filter = self.state.filter.trim();
        (!filter.is_empty()).then_some(filter)
    }
}
