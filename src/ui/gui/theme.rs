//! Catppuccin-inspired theme for the watch window.
//!
//! Provides the palette, the change-highlight fade and the egui style.

use eframe::egui::{self, Color32, FontFamily, FontId, Rounding, Stroke, TextStyle, Vec2};

/// Catppuccin Mocha palette
pub mod catppuccin {
    use super::Color32;

    // Base colors
    pub const BASE: Color32 = Color32::from_rgb(30, 30, 46); // #1e1e2e
    pub const MANTLE: Color32 = Color32::from_rgb(24, 24, 37); // #181825
    pub const CRUST: Color32 = Color32::from_rgb(17, 17, 27); // #11111b
    pub const SURFACE0: Color32 = Color32::from_rgb(49, 50, 68); // #313244
    pub const SURFACE1: Color32 = Color32::from_rgb(69, 71, 90); // #45475a
    pub const SURFACE2: Color32 = Color32::from_rgb(88, 91, 112); // #585b70

    // Text colors
    pub const TEXT: Color32 = Color32::from_rgb(205, 214, 244); // #cdd6f4
    pub const SUBTEXT1: Color32 = Color32::from_rgb(186, 194, 222); // #bac2de
    pub const SUBTEXT0: Color32 = Color32::from_rgb(166, 173, 200); // #a6adc8
    pub const OVERLAY1: Color32 = Color32::from_rgb(127, 132, 156); // #7f849c
    pub const OVERLAY0: Color32 = Color32::from_rgb(108, 112, 134); // #6c7086

    // Accent colors
    pub const RED: Color32 = Color32::from_rgb(243, 139, 168); // #f38ba8
    pub const PEACH: Color32 = Color32::from_rgb(250, 179, 135); // #fab387
    pub const YELLOW: Color32 = Color32::from_rgb(249, 226, 175); // #f9e2af
    pub const GREEN: Color32 = Color32::from_rgb(166, 227, 161); // #a6e3a1
    pub const TEAL: Color32 = Color32::from_rgb(148, 226, 213); // #94e2d5
    pub const SAPPHIRE: Color32 = Color32::from_rgb(116, 199, 236); // #74c7ec
    pub const BLUE: Color32 = Color32::from_rgb(137, 180, 250); // #89b4fa
    pub const LAVENDER: Color32 = Color32::from_rgb(180, 190, 254); // #b4befe
}

/// Semantic colors for tree rows
pub mod tree {
    use super::catppuccin::*;

    pub const LABEL: super::Color32 = BLUE;
    pub const VALUE: super::Color32 = TEXT;
    pub const CHANGED: super::Color32 = PEACH;
    pub const TYPE: super::Color32 = YELLOW;
    pub const ADDRESS: super::Color32 = OVERLAY1;
    pub const POINTER: super::Color32 = TEAL;
    pub const STRING: super::Color32 = GREEN;
    pub const UNAVAILABLE: super::Color32 = OVERLAY0;
}

/// Blend `from` toward `to`; `t` is clamped to `[0, 1]`
pub fn fade(from: Color32, to: Color32, t: f32) -> Color32 {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| egui::lerp(a as f32..=b as f32, t).round() as u8;
    Color32::from_rgb(mix(from.r(), to.r()), mix(from.g(), to.g()), mix(from.b(), to.b()))
}

/// Widget look for one interaction state
fn widget(fill: Color32, text: Color32, outline: Stroke) -> egui::style::WidgetVisuals {
    egui::style::WidgetVisuals {
        bg_fill: fill,
        weak_bg_fill: fill,
        bg_stroke: outline,
        rounding: Rounding::same(3.0),
        fg_stroke: Stroke::new(1.0, text),
        expansion: 0.0,
    }
}

/// Dark Catppuccin look with tight rows for deep trees
pub fn apply_catppuccin_theme(ctx: &egui::Context) {
    use catppuccin::*;

    let mut visuals = egui::Visuals::dark();
    visuals.window_fill = BASE;
    visuals.panel_fill = BASE;
    visuals.window_stroke = Stroke::new(1.0, SURFACE0);
    visuals.extreme_bg_color = CRUST;
    visuals.code_bg_color = MANTLE;
    visuals.faint_bg_color = MANTLE;
    visuals.warn_fg_color = PEACH;
    visuals.error_fg_color = RED;
    visuals.hyperlink_color = SAPPHIRE;
    visuals.selection.bg_fill = LAVENDER.linear_multiply(0.25);
    visuals.selection.stroke = Stroke::new(1.0, LAVENDER);

    visuals.widgets.noninteractive = widget(SURFACE0, TEXT, Stroke::NONE);
    visuals.widgets.inactive = widget(SURFACE0, SUBTEXT1, Stroke::NONE);
    visuals.widgets.hovered = widget(SURFACE1, TEXT, Stroke::new(1.0, BLUE));
    visuals.widgets.active = widget(SURFACE2, TEXT, Stroke::new(1.5, BLUE));
    visuals.widgets.open = widget(SURFACE1, TEXT, Stroke::new(1.0, SURFACE2));

    ctx.style_mut(|style| {
        style.visuals = visuals;
        style.spacing.item_spacing = Vec2::new(6.0, 1.0);
        style.spacing.button_padding = Vec2::new(6.0, 2.0);
        style.spacing.window_margin = egui::Margin::same(8.0);
        style.spacing.indent = 16.0;
    });
}

/// Configure text sizes; values are monospace so columns line up
pub fn configure_fonts(ctx: &egui::Context) {
    ctx.style_mut(|style| {
        style.text_styles = [
            (TextStyle::Small, FontId::new(11.0, FontFamily::Proportional)),
            (TextStyle::Body, FontId::new(13.0, FontFamily::Monospace)),
            (TextStyle::Button, FontId::new(13.0, FontFamily::Proportional)),
            (TextStyle::Heading, FontId::new(18.0, FontFamily::Proportional)),
            (TextStyle::Monospace, FontId::new(13.0, FontFamily::Monospace)),
        ]
        .into();
    });
}

/// Initialize theme and fonts
pub fn init(ctx: &egui::Context) {
    apply_catppuccin_theme(ctx);
    configure_fonts(ctx);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fade_endpoints() {
        let a = Color32::from_rgb(0, 0, 0);
        let b = Color32::from_rgb(200, 100, 50);
        assert_eq!(fade(a, b, 0.0), a);
        assert_eq!(fade(a, b, 1.0), b);
        assert_eq!(fade(a, b, 0.5), Color32::from_rgb(100, 50, 25));
        assert_eq!(fade(a, b, 7.0), b);
    }
}
