use crate::agent::types::TaskStatus;
use crate::log::LogStatus;
use eframe::egui::{self, Color32, CornerRadius, FontId, Frame, Margin, Stroke, TextStyle};

#[derive(Debug, Clone)]
pub struct Theme {
    /// Activity bar and status bar.
    pub surface_0: Color32,
    /// Sidebar, assistant panel and bottom panel.
    pub surface_1: Color32,
    /// Editor area.
    pub surface_2: Color32,
    pub surface_3: Color32,
    pub accent_primary: Color32,
    pub accent_muted: Color32,
    pub success: Color32,
    pub warning: Color32,
    pub danger: Color32,
    pub text_primary: Color32,
    pub text_muted: Color32,
    pub text_on_accent: Color32,
    pub border_subtle: Color32,
    pub warning_tint: Color32,
    pub spacing_4: f32,
    pub spacing_8: f32,
    pub spacing_12: f32,
    pub spacing_16: f32,
    pub spacing_24: f32,
    pub radius_4: u8,
    pub radius_8: u8,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            surface_0: Color32::from_rgb(0x0F, 0x17, 0x2A),
            surface_1: Color32::from_rgb(0x1E, 0x29, 0x3B),
            surface_2: Color32::from_rgb(0x17, 0x20, 0x33),
            surface_3: Color32::from_rgb(0x33, 0x41, 0x55),
            accent_primary: Color32::from_rgb(0x06, 0xB6, 0xD4),
            accent_muted: Color32::from_rgb(0x0E, 0x74, 0x90),
            success: Color32::from_rgb(0x4A, 0xDE, 0x80),
            warning: Color32::from_rgb(0xFA, 0xCC, 0x15),
            danger: Color32::from_rgb(0xF8, 0x71, 0x71),
            text_primary: Color32::from_rgb(0xE2, 0xE8, 0xF0),
            text_muted: Color32::from_rgb(0x94, 0xA3, 0xB8),
            text_on_accent: Color32::from_rgb(0x0F, 0x17, 0x2A),
            border_subtle: Color32::from_rgb(0x33, 0x41, 0x55),
            warning_tint: Color32::from_rgba_premultiplied(0x25, 0x1F, 0x05, 0x40),
            spacing_4: 4.0,
            spacing_8: Self::P8,
            spacing_12: 12.0,
            spacing_16: Self::P16,
            spacing_24: Self::P24,
            radius_4: 4,
            radius_8: Self::R8,
        }
    }
}

impl Theme {
    pub const R8: u8 = 8;
    pub const P8: f32 = 8.0;
    pub const P16: f32 = 16.0;
    pub const P24: f32 = 24.0;

    pub fn apply_visuals(&self, ctx: &egui::Context) {
        let mut visuals = egui::Visuals::dark();
        visuals.panel_fill = self.surface_1;
        visuals.extreme_bg_color = self.surface_0;
        visuals.override_text_color = Some(self.text_primary);
        visuals.widgets.noninteractive.fg_stroke.color = self.text_primary;
        visuals.widgets.noninteractive.bg_fill = self.surface_2;
        visuals.widgets.noninteractive.weak_bg_fill = self.surface_2;
        visuals.widgets.noninteractive.bg_stroke = Stroke::new(1.0, self.border_subtle);
        visuals.widgets.inactive.bg_fill = self.surface_3;
        visuals.widgets.inactive.weak_bg_fill = self.surface_3;
        visuals.widgets.inactive.fg_stroke.color = self.text_primary;
        visuals.widgets.inactive.bg_stroke = Stroke::NONE;
        visuals.widgets.hovered.bg_fill = self.accent_muted;
        visuals.widgets.hovered.weak_bg_fill = Color32::from_rgb(0x47, 0x55, 0x69);
        visuals.widgets.hovered.bg_stroke = Stroke::NONE;
        visuals.widgets.hovered.fg_stroke.color = Color32::WHITE;
        visuals.widgets.active.bg_fill = self.accent_primary;
        visuals.widgets.active.bg_stroke = Stroke::NONE;
        visuals.widgets.active.fg_stroke.color = self.text_on_accent;
        visuals.selection.bg_fill = self.accent_muted;
        visuals.selection.stroke = Stroke::new(1.0, self.accent_primary);
        visuals.hyperlink_color = self.accent_primary;
        visuals.window_fill = self.surface_1;
        visuals.window_stroke = Stroke::new(1.0, self.border_subtle);
        visuals.window_corner_radius = CornerRadius::same(self.radius_8);

        let mut style = (*ctx.style()).clone();
        style.visuals = visuals;
        style.spacing.item_spacing = egui::vec2(8.0, 8.0);
        style.spacing.button_padding = egui::vec2(10.0, 6.0);
        style.text_styles.insert(TextStyle::Heading, FontId::proportional(20.0));
        style.text_styles.insert(TextStyle::Body, FontId::proportional(14.0));
        style.text_styles.insert(TextStyle::Button, FontId::proportional(14.0));
        style.text_styles.insert(TextStyle::Monospace, FontId::monospace(13.0));
        style.text_styles.insert(TextStyle::Small, FontId::proportional(12.0));
        ctx.set_style(style);
    }

    pub fn panel_frame(&self, fill: Color32, inner_padding: i8) -> Frame {
        Frame::new()
            .fill(fill)
            .inner_margin(Margin::same(inner_padding))
            .stroke(Stroke::NONE)
    }

    pub fn card_frame(&self) -> Frame {
        Frame::new()
            .fill(self.surface_1)
            .inner_margin(Margin::same(self.spacing_12 as i8))
            .corner_radius(CornerRadius::same(self.radius_8))
            .stroke(Stroke::new(1.0, self.border_subtle))
    }

    /// Replaces a plugin's mount target when it fails.
    pub fn diagnostic_frame(&self) -> Frame {
        Frame::new()
            .fill(self.warning_tint)
            .inner_margin(Margin::same(self.spacing_16 as i8))
            .corner_radius(CornerRadius::same(self.radius_8))
            .stroke(Stroke::new(1.0, self.warning))
    }

    pub fn code_frame(&self) -> Frame {
        Frame::new()
            .fill(self.surface_0)
            .inner_margin(Margin::same(self.spacing_8 as i8))
            .corner_radius(CornerRadius::same(self.radius_4))
    }

    /// Maps a plugin's accent class (`bg-sky-500` and friends) to a colour.
    pub fn accent_for_class(&self, class: &str) -> Color32 {
        match class.trim() {
            "bg-sky-500" => Color32::from_rgb(0x0E, 0xA5, 0xE9),
            "bg-indigo-500" => Color32::from_rgb(0x63, 0x66, 0xF1),
            "bg-green-500" => Color32::from_rgb(0x22, 0xC5, 0x5E),
            "bg-amber-500" => Color32::from_rgb(0xF5, 0x9E, 0x0B),
            "bg-purple-500" => Color32::from_rgb(0xA8, 0x55, 0xF7),
            "bg-pink-500" => Color32::from_rgb(0xEC, 0x48, 0x99),
            "bg-red-500" => Color32::from_rgb(0xEF, 0x44, 0x44),
            _ => self.accent_muted,
        }
    }

    pub fn log_status_color(&self, status: LogStatus) -> Color32 {
        match status {
            LogStatus::Info => self.text_muted,
            LogStatus::Success => self.success,
            LogStatus::Warning => self.warning,
            LogStatus::Error => self.danger,
        }
    }

    pub fn task_status_color(&self, status: TaskStatus) -> Color32 {
        match status {
            TaskStatus::Pending => self.text_muted,
            TaskStatus::InProgress => self.accent_primary,
            TaskStatus::Completed => self.success,
            TaskStatus::Error => self.danger,
        }
    }
}
