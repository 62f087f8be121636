use crate::runtime::dom::{DomEvent, DomNode};
use crate::runtime::host::{HostView, PLACEHOLDER_TEXT};
use crate::runtime::style::{is_bold, parse_css_color, parse_length, parse_padding};
use crate::theme::Theme;
use eframe::egui::{self, Color32, RichText, Sense};

const INLINE_TAGS: &[&str] = &[
    "a", "b", "code", "em", "i", "label", "mark", "small", "span", "strong", "sub", "sup", "u",
];

/// Text properties that cascade from parent to child.
#[derive(Debug, Clone, Copy)]
struct Inherited {
    color: Color32,
    size: f32,
    bold: bool,
    strike: bool,
    mono: bool,
}

impl Inherited {
    fn root(theme: &Theme) -> Self {
        Self {
            color: theme.text_primary,
            size: 14.0,
            bold: false,
            strike: false,
            mono: false,
        }
    }

    fn apply(mut self, node: &DomNode) -> Self {
        if let Some(color) = node.style("color").and_then(parse_css_color) {
            self.color = color;
        }
        if let Some(size) = node.style("fontSize").and_then(parse_length) {
            self.size = size.clamp(8.0, 48.0);
        }
        if let Some(weight) = node.style("fontWeight") {
            self.bold = is_bold(weight);
        }
        if node
            .style("textDecoration")
            .is_some_and(|value| value.contains("line-through"))
        {
            self.strike = true;
        }
        match node.tag.as_str() {
            "b" | "strong" | "th" => self.bold = true,
            "s" | "del" | "strike" => self.strike = true,
            "code" | "pre" | "kbd" | "samp" => self.mono = true,
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.bold = true;
                if node.style("fontSize").is_none() {
                    self.size = heading_size(&node.tag);
                }
            }
            _ => {}
        }
        self
    }

    fn rich(&self, text: impl Into<String>) -> RichText {
        let mut rich = RichText::new(text).color(self.color).size(self.size);
        if self.bold {
            rich = rich.strong();
        }
        if self.strike {
            rich = rich.strikethrough();
        }
        if self.mono {
            rich = rich.monospace();
        }
        rich
    }
}

fn heading_size(tag: &str) -> f32 {
    match tag {
        "h1" => 26.0,
        "h2" => 22.0,
        "h3" => 19.0,
        "h4" => 17.0,
        _ => 15.0,
    }
}

/// Draws the mount target.
pub fn show(ui: &mut egui::Ui, theme: &Theme, view: &mut HostView, emit: &mut dyn FnMut(DomEvent)) {
    match view {
        HostView::Empty => {}
        HostView::Placeholder => {
            ui.vertical_centered(|ui| {
                ui.add_space(theme.spacing_24);
                ui.label(RichText::new(PLACEHOLDER_TEXT).color(theme.text_muted).size(13.0));
            });
        }
        HostView::Diagnostic(failure) => {
            theme.diagnostic_frame().show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.label(
                    RichText::new(failure.header())
                        .color(theme.warning)
                        .size(14.0)
                        .strong(),
                );
                ui.add_space(theme.spacing_8);
                ui.label(
                    RichText::new(&failure.message)
                        .color(theme.text_primary)
                        .size(13.0)
                        .monospace(),
                );
                if let Some(cause) = &failure.cause {
                    ui.add_space(theme.spacing_4);
                    egui::CollapsingHeader::new(RichText::new("Stack").color(theme.text_muted).size(12.0))
                        .id_salt("plugin_failure_cause")
                        .show(ui, |ui| {
                            ui.label(RichText::new(cause).color(theme.text_muted).size(12.0).monospace());
                        });
                }
            });
        }
        HostView::Rendered(root) => {
            let inherited = Inherited::root(theme).apply(root);
            render_element(ui, theme, root, inherited, emit);
        }
    }
}

fn render_node(
    ui: &mut egui::Ui,
    theme: &Theme,
    node: &mut DomNode,
    inherited: Inherited,
    emit: &mut dyn FnMut(DomEvent),
) {
    if node.is_text() {
        let text = node.text.as_deref().unwrap_or_default();
        if !text.trim().is_empty() {
            ui.label(inherited.rich(collapse_whitespace(text, inherited.mono)));
        }
        return;
    }
    if node
        .style("display")
        .is_some_and(|display| display.trim() == "none")
    {
        return;
    }
    let inherited = inherited.apply(node);
    match node.tag.as_str() {
        "button" => render_button(ui, theme, node, inherited, emit),
        "input" => render_input(ui, theme, node, inherited, emit),
        "textarea" => render_textarea(ui, node, inherited, emit),
        "select" => render_select(ui, node, inherited, emit),
        "hr" => {
            ui.separator();
        }
        "br" => {}
        "img" => {
            let alt = node.attrs.alt.as_deref().unwrap_or("image");
            ui.label(RichText::new(format!("[{alt}]")).color(theme.text_muted).size(12.0));
        }
        "pre" => {
            let text = node.text_content();
            egui::Frame::new()
                .fill(theme.surface_0)
                .corner_radius(egui::CornerRadius::same(theme.radius_8))
                .inner_margin(egui::Margin::same(theme.spacing_8 as i8))
                .show(ui, |ui| {
                    ui.label(inherited.rich(text));
                });
        }
        _ => render_element(ui, theme, node, inherited, emit),
    }
}

fn render_element(
    ui: &mut egui::Ui,
    theme: &Theme,
    node: &mut DomNode,
    inherited: Inherited,
    emit: &mut dyn FnMut(DomEvent),
) {
    let fill = node
        .style("backgroundColor")
        .or_else(|| node.style("background"))
        .and_then(parse_css_color);
    let padding = node.style("padding").and_then(parse_padding);
    let radius = node.style("borderRadius").and_then(parse_length);
    let clickable = node.listens("click");

    let mut frame = egui::Frame::new();
    if let Some(fill) = fill {
        frame = frame.fill(fill);
    }
    if let Some((vertical, horizontal)) = padding {
        frame = frame.inner_margin(egui::Margin::symmetric(
            clamp_margin(horizontal),
            clamp_margin(vertical),
        ));
    }
    if let Some(radius) = radius {
        frame = frame.corner_radius(egui::CornerRadius::same(radius.clamp(0.0, 255.0) as u8));
    }

    let node_id = node.id;
    let response = frame
        .show(ui, |ui| {
            ui.push_id(node_id, |ui| layout_children(ui, theme, node, inherited, emit));
        })
        .response;
    if clickable && response.interact(Sense::click()).clicked() {
        emit(DomEvent::Click { target: node_id });
    }
    if node_tag_is_block(&node.tag) {
        ui.add_space(theme.spacing_4);
    }
}

fn layout_children(
    ui: &mut egui::Ui,
    theme: &Theme,
    node: &mut DomNode,
    inherited: Inherited,
    emit: &mut dyn FnMut(DomEvent),
) {
    let row = node.style("display").is_some_and(|display| display.contains("flex"))
        && !node
            .style("flexDirection")
            .is_some_and(|direction| direction.starts_with("column"));
    let inline = !node.children.is_empty()
        && node
            .children
            .iter()
            .all(|child| child.is_text() || INLINE_TAGS.contains(&child.tag.as_str()));
    let ordered = node.tag == "ol";
    let list = ordered || node.tag == "ul";

    if row || inline {
        ui.horizontal_wrapped(|ui| {
            ui.spacing_mut().item_spacing.x = if inline { 0.0 } else { theme.spacing_8 };
            for child in &mut node.children {
                render_node(ui, theme, child, inherited, emit);
            }
        });
    } else {
        ui.vertical(|ui| {
            ui.spacing_mut().item_spacing.y = theme.spacing_4;
            let mut index = 0;
            for child in &mut node.children {
                if list && child.tag == "li" {
                    index += 1;
                    let marker = if ordered { format!("{index}.") } else { "•".to_string() };
                    let bare = child.style("backgroundColor").is_none();
                    if bare {
                        ui.horizontal(|ui| {
                            ui.label(inherited.rich(marker));
                            render_node(ui, theme, child, inherited, emit);
                        });
                        continue;
                    }
                }
                render_node(ui, theme, child, inherited, emit);
            }
        });
    }
}

fn render_button(
    ui: &mut egui::Ui,
    theme: &Theme,
    node: &DomNode,
    inherited: Inherited,
    emit: &mut dyn FnMut(DomEvent),
) {
    let label = node.text_content();
    let label = if label.trim().is_empty() { "·".to_string() } else { label };
    let fill = node
        .style("backgroundColor")
        .or_else(|| node.style("background"))
        .and_then(parse_css_color)
        .unwrap_or(theme.surface_3);
    let radius = node
        .style("borderRadius")
        .and_then(parse_length)
        .map_or(theme.radius_8, |radius| radius.clamp(0.0, 255.0) as u8);
    let button = egui::Button::new(inherited.rich(label.trim().to_string()))
        .fill(fill)
        .stroke(egui::Stroke::NONE)
        .corner_radius(egui::CornerRadius::same(radius));
    if ui.add_enabled(!node.attrs.disabled, button).clicked() {
        emit(DomEvent::Click { target: node.id });
    }
}

fn render_input(
    ui: &mut egui::Ui,
    theme: &Theme,
    node: &mut DomNode,
    inherited: Inherited,
    emit: &mut dyn FnMut(DomEvent),
) {
    let target = node.id;
    match node.input_type() {
        "checkbox" => {
            let mut checked = node.attrs.checked;
            let response = ui.add_enabled(!node.attrs.disabled, egui::Checkbox::without_text(&mut checked));
            if response.changed() {
                node.attrs.checked = checked;
                emit(DomEvent::Toggle { target, checked });
            }
        }
        "radio" => {
            if ui
                .add_enabled(!node.attrs.disabled, egui::RadioButton::new(node.attrs.checked, ""))
                .clicked()
                && !node.attrs.checked
            {
                node.attrs.checked = true;
                emit(DomEvent::Toggle { target, checked: true });
            }
        }
        "submit" | "button" | "reset" => {
            let label = node.attrs.value.clone().unwrap_or_else(|| "Submit".to_string());
            if ui
                .add_enabled(!node.attrs.disabled, egui::Button::new(inherited.rich(label)))
                .clicked()
            {
                emit(DomEvent::Click { target });
            }
        }
        kind => {
            let password = kind == "password";
            let hint = node.attrs.placeholder.clone().unwrap_or_default();
            let width = node
                .style("width")
                .and_then(parse_length)
                .unwrap_or(ui.available_width().min(260.0));
            let value = node.attrs.value.get_or_insert_with(String::new);
            let response = ui.add_enabled(
                !node.attrs.disabled,
                egui::TextEdit::singleline(value)
                    .id_salt(("plugin_input", target))
                    .hint_text(RichText::new(hint).color(theme.text_muted))
                    .password(password)
                    .text_color(inherited.color)
                    .desired_width(width),
            );
            if response.changed() {
                emit(DomEvent::Input { target, value: value.clone() });
            }
            if response.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter)) {
                emit(DomEvent::Submit { target });
            }
        }
    }
}

fn render_textarea(
    ui: &mut egui::Ui,
    node: &mut DomNode,
    inherited: Inherited,
    emit: &mut dyn FnMut(DomEvent),
) {
    let target = node.id;
    let hint = node.attrs.placeholder.clone().unwrap_or_default();
    let value = node.attrs.value.get_or_insert_with(String::new);
    let response = ui.add_enabled(
        !node.attrs.disabled,
        egui::TextEdit::multiline(value)
            .id_salt(("plugin_textarea", target))
            .hint_text(hint)
            .text_color(inherited.color)
            .desired_rows(4)
            .desired_width(f32::INFINITY),
    );
    if response.changed() {
        emit(DomEvent::Input { target, value: value.clone() });
    }
}

fn render_select(
    ui: &mut egui::Ui,
    node: &mut DomNode,
    inherited: Inherited,
    emit: &mut dyn FnMut(DomEvent),
) {
    let target = node.id;
    let options: Vec<(String, String)> = node
        .children
        .iter()
        .filter(|child| child.tag == "option")
        .map(|option| {
            let label = option.text_content();
            let value = option.attrs.value.clone().filter(|value| !value.is_empty()).unwrap_or_else(|| label.clone());
            (value, label)
        })
        .collect();
    let mut current = node.attrs.value.clone().unwrap_or_default();
    let selected_label = options
        .iter()
        .find(|(value, _)| *value == current)
        .map(|(_, label)| label.clone())
        .unwrap_or_else(|| current.clone());
    let mut changed = false;
    egui::ComboBox::from_id_salt(("plugin_select", target))
        .selected_text(inherited.rich(selected_label))
        .show_ui(ui, |ui| {
            for (value, label) in &options {
                if ui
                    .selectable_value(&mut current, value.clone(), label.as_str())
                    .changed()
                {
                    changed = true;
                }
            }
        });
    if changed {
        node.attrs.value = Some(current.clone());
        emit(DomEvent::Select { target, value: current });
    }
}

fn node_tag_is_block(tag: &str) -> bool {
    matches!(
        tag,
        "div" | "form" | "section" | "article" | "header" | "footer" | "main" | "p" | "ul" | "ol" | "table"
    )
}

fn clamp_margin(value: f32) -> i8 {
    value.clamp(0.0, 64.0) as i8
}

fn collapse_whitespace(text: &str, preserve: bool) -> String {
    if preserve {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut last_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out
}
