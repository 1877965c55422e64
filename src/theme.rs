use eframe::egui::{self, Color32, CornerRadius, FontId, Frame, Margin, Stroke, TextStyle};

#[derive(Debug, Clone)]
pub struct Theme {
    pub surface_0: Color32,
    pub surface_1: Color32,
    pub surface_2: Color32,
    pub surface_3: Color32,
    pub accent_primary: Color32,
    pub accent_muted: Color32,
    pub success: Color32,
    pub warning: Color32,
    pub danger: Color32,
    pub text_primary: Color32,
    pub text_muted: Color32,
    pub border_subtle: Color32,
    pub bubble_user: Color32,
    pub bubble_assistant: Color32,
    pub drop_target_glow: Color32,
    pub spacing_8: f32,
    pub spacing_12: f32,
    pub radius_10: u8,
    pub radius_12: u8,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            surface_0: Color32::from_rgb(0x10, 0x13, 0x17),
            surface_1: Color32::from_rgb(0x17, 0x1B, 0x21),
            surface_2: Color32::from_rgb(0x1E, 0x24, 0x2C),
            surface_3: Color32::from_rgb(0x26, 0x2E, 0x38),
            accent_primary: Color32::from_rgb(0x7C, 0x8C, 0xF5),
            accent_muted: Color32::from_rgb(0x5A, 0x68, 0xC4),
            success: Color32::from_rgb(0x34, 0xD3, 0x99),
            warning: Color32::from_rgb(0xFB, 0xBF, 0x24),
            danger: Color32::from_rgb(0xF8, 0x71, 0x71),
            text_primary: Color32::from_rgb(0xE7, 0xEC, 0xF2),
            text_muted: Color32::from_rgb(0x8A, 0x93, 0x9E),
            border_subtle: Color32::from_rgba_premultiplied(255, 255, 255, 13),
            bubble_user: Color32::from_rgb(0x2A, 0x38, 0x52),
            bubble_assistant: Color32::from_rgb(0x21, 0x27, 0x2F),
            drop_target_glow: Color32::from_rgba_premultiplied(0x2E, 0x36, 0x66, 140),
            spacing_8: 8.0,
            spacing_12: 12.0,
            radius_10: 10,
            radius_12: 12,
        }
    }
}

impl Theme {
    pub fn apply_visuals(&self, ctx: &egui::Context) {
        let mut visuals = egui::Visuals::dark();
        visuals.panel_fill = self.surface_0;
        visuals.override_text_color = Some(self.text_primary);
        visuals.widgets.noninteractive.fg_stroke.color = self.text_primary;
        visuals.widgets.noninteractive.bg_fill = self.surface_2;
        visuals.widgets.noninteractive.weak_bg_fill = self.surface_2;
        visuals.widgets.noninteractive.bg_stroke = Stroke::NONE;
        visuals.widgets.inactive.bg_fill = self.surface_2;
        visuals.widgets.inactive.fg_stroke.color = self.text_primary;
        visuals.widgets.inactive.bg_stroke = Stroke::NONE;
        visuals.widgets.hovered.bg_fill = self.surface_3;
        visuals.widgets.hovered.bg_stroke = Stroke::NONE;
        visuals.widgets.hovered.fg_stroke.color = self.text_primary;
        visuals.widgets.active.bg_fill = self.accent_muted;
        visuals.widgets.active.bg_stroke = Stroke::NONE;
        visuals.widgets.active.fg_stroke.color = self.text_primary;
        visuals.widgets.open.bg_fill = self.surface_3;
        visuals.widgets.open.bg_stroke = Stroke::NONE;
        visuals.selection.bg_fill = self.accent_muted;
        visuals.hyperlink_color = self.accent_primary;
        visuals.window_fill = self.surface_1;
        visuals.window_stroke = Stroke::new(1.0, self.border_subtle);
        visuals.window_corner_radius = CornerRadius::same(self.radius_10);

        let mut style = (*ctx.style()).clone();
        style.visuals = visuals;
        style.spacing.item_spacing = egui::vec2(8.0, 8.0);
        style.spacing.button_padding = egui::vec2(12.0, 6.0);
        style.text_styles.insert(TextStyle::Heading, FontId::proportional(17.0));
        style.text_styles.insert(TextStyle::Body, FontId::proportional(14.0));
        style.text_styles.insert(TextStyle::Monospace, FontId::monospace(13.0));
        style.text_styles.insert(TextStyle::Small, FontId::proportional(12.0));
        ctx.set_style(style);
    }

    pub fn bubble_frame(&self, fill: Color32) -> Frame {
        Frame::new()
            .fill(fill)
            .inner_margin(Margin::same(self.spacing_12 as i8))
            .corner_radius(CornerRadius::same(self.radius_12))
            .stroke(Stroke::NONE)
    }

    pub fn composer_frame(&self) -> Frame {
        Frame::new()
            .fill(self.surface_1)
            .inner_margin(Margin::symmetric(self.spacing_12 as i8, 8))
            .corner_radius(CornerRadius::same(self.radius_12))
            .stroke(Stroke::new(1.0, self.border_subtle))
    }
}
