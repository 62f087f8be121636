use crate::agent::types::{AgentTask, ChatMessage, ChatSender};
use crate::agent::AgentClient;
use crate::config::AppConfig;
use crate::event::AppEvent;
use crate::log::{LogEntry, LogStatus};
use crate::plugin::{Plugin, PluginCatalog};
use crate::runtime::sandbox::ConsoleLine;
use crate::runtime::{render, DomEvent, HostNotice, PluginHost, PluginLifecycle};
use crate::theme::Theme;
use eframe::egui::{self, Color32, RichText, ScrollArea};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;
use tracing::{info, warn};

const WELCOME_TAB_ID: &str = "tab-welcome";
const WELCOME_MESSAGE: &str = "Welcome to Catalyst! I'm your AI assistant. I can build new plugins for this application based on your requests. What would you like to build first? You can also try the pre-installed 'To-Do List' plugin by clicking its icon on the far left.";
const QUICK_ACTIONS: &[&str] = &[
    "Create a to-do list plugin",
    "Build a simple notes widget",
    "Generate a random number utility",
];
const AGENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum PluginPage {
    #[default]
    Details,
    Api,
    Source,
    Live,
}

impl PluginPage {
    const ALL: [PluginPage; 4] = [Self::Details, Self::Api, Self::Source, Self::Live];

    fn label(self) -> &'static str {
        match self {
            Self::Details => "Details",
            Self::Api => "API",
            Self::Source => "Source Code",
            Self::Live => "Live",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TabKind {
    Welcome,
    Plugin { plugin_id: String, page: PluginPage },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Tab {
    id: String,
    title: String,
    icon: String,
    kind: TabKind,
}

impl Tab {
    fn welcome() -> Self {
        Self {
            id: WELCOME_TAB_ID.to_string(),
            title: "Welcome".to_string(),
            icon: "BeakerIcon".to_string(),
            kind: TabKind::Welcome,
        }
    }
}

/// What the sidebar shows.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SideView {
    Plugins,
    Search,
    /// A plugin's custom view, by view id.
    Custom(String),
}

/// Tab strip and sidebar state.
#[derive(Debug)]
struct Workbench {
    tabs: Vec<Tab>,
    active_tab: Option<String>,
    side_view: SideView,
    sidebar_open: bool,
}

impl Default for Workbench {
    fn default() -> Self {
        Self {
            tabs: vec![Tab::welcome()],
            active_tab: Some(WELCOME_TAB_ID.to_string()),
            side_view: SideView::Plugins,
            sidebar_open: true,
        }
    }
}

impl Workbench {
    /// Clicking the view that is already showing collapses the sidebar.
    fn activity_clicked(&mut self, view: SideView) {
        if self.side_view == view && self.sidebar_open {
            self.sidebar_open = false;
        } else {
            self.side_view = view;
            self.sidebar_open = true;
        }
    }

    fn open_plugin(&mut self, plugin: &Plugin) {
        let tab_id = format!("tab-plugin-{}", plugin.id);
        if !self.tabs.iter().any(|tab| tab.id == tab_id) {
            self.tabs.push(Tab {
                id: tab_id.clone(),
                title: plugin.name.clone(),
                icon: plugin.icon.clone(),
                kind: TabKind::Plugin {
                    plugin_id: plugin.id.clone(),
                    page: PluginPage::default(),
                },
            });
        }
        self.active_tab = Some(tab_id);
    }

    /// Closing the active tab activates its left neighbour.
    fn close_tab(&mut self, tab_id: &str) {
        let Some(index) = self.tabs.iter().position(|tab| tab.id == tab_id) else {
            return;
        };
        self.tabs.remove(index);
        if self.active_tab.as_deref() == Some(tab_id) {
            self.active_tab = self
                .tabs
                .get(index.saturating_sub(1))
                .map(|tab| tab.id.clone());
        }
    }

    fn active(&self) -> Option<&Tab> {
        let active = self.active_tab.as_deref()?;
        self.tabs.iter().find(|tab| tab.id == active)
    }

    fn active_mut(&mut self) -> Option<&mut Tab> {
        let active = self.active_tab.clone()?;
        self.tabs.iter_mut().find(|tab| tab.id == active)
    }

    /// Plugin whose Live page is on screen, if any.
    fn live_plugin(&self) -> Option<&str> {
        match &self.active()?.kind {
            TabKind::Plugin {
                plugin_id,
                page: PluginPage::Live,
            } => Some(plugin_id),
            _ => None,
        }
    }

    fn visible_custom_view(&self) -> Option<&str> {
        match &self.side_view {
            SideView::Custom(view_id) if self.sidebar_open => Some(view_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum BottomTab {
    #[default]
    AgentPlan,
    SystemLog,
}

pub struct CatalystApp {
    rx: Receiver<AppEvent>,
    agent: AgentClient,
    theme: Theme,
    catalog: PluginCatalog,
    chat: Vec<ChatMessage>,
    logs: Vec<LogEntry>,
    tasks: Vec<AgentTask>,
    is_thinking: bool,
    workbench: Workbench,
    search_query: String,
    bottom_panel_open: bool,
    bottom_tab: BottomTab,
    input_buffer: String,
    /// Backs the Live page of the active plugin tab.
    live: PluginLifecycle,
    /// Backs the custom view shown in the sidebar.
    side: PluginLifecycle,
    scroll_to_bottom: bool,
    visuals_applied: bool,
}

impl CatalystApp {
    pub fn new(rx: Receiver<AppEvent>, agent: AgentClient, config: &AppConfig) -> Self {
        let host = || PluginLifecycle::new(PluginHost::new(config.convention, config.sandbox_limits()));
        Self {
            rx,
            agent,
            theme: Theme::default(),
            catalog: PluginCatalog::with_builtins(),
            chat: vec![ChatMessage::agent(WELCOME_MESSAGE)],
            logs: vec![
                LogEntry::now("Catalyst environment initialized.", LogStatus::Info),
                LogEntry::now("AI Agent is online and awaiting instructions.", LogStatus::Success),
            ],
            tasks: Vec::new(),
            is_thinking: false,
            workbench: Workbench::default(),
            search_query: String::new(),
            bottom_panel_open: false,
            bottom_tab: BottomTab::default(),
            input_buffer: String::new(),
            live: host(),
            side: host(),
            scroll_to_bottom: false,
            visuals_applied: false,
        }
    }

    fn log(&mut self, text: impl Into<String>, status: LogStatus) {
        self.logs.push(LogEntry::now(text, status));
    }

    fn agent_status(&self) -> &'static str {
        if self.is_thinking {
            "Agent is working..."
        } else if !self.tasks.is_empty() {
            "Task completed"
        } else {
            "Agent is idle"
        }
    }

    fn submit_prompt(&mut self, prompt: &str) {
        let prompt = prompt.trim();
        if prompt.is_empty() || self.is_thinking {
            return;
        }

        self.chat.push(ChatMessage::user(prompt));
        self.is_thinking = true;
        self.tasks.clear();
        self.bottom_panel_open = true;
        self.log(format!("User request received: \"{prompt}\""), LogStatus::Info);
        self.log("Contacting AI agent...", LogStatus::Info);
        self.scroll_to_bottom = true;

        self.agent.send(self.chat.clone(), self.catalog.names());
    }

    fn drain_events(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.apply_event(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.is_thinking {
                        self.log("Agent channel disconnected.", LogStatus::Error);
                        self.is_thinking = false;
                    }
                    break;
                }
            }
        }
    }

    fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Chat(message) => {
                self.chat.push(message);
                self.scroll_to_bottom = true;
            }
            AppEvent::Log(entry) => self.logs.push(entry),
            AppEvent::TasksPlanned(tasks) => self.tasks = tasks,
            AppEvent::TaskStatus { task_id, status } => {
                if let Some(task) = self.tasks.iter_mut().find(|task| task.id == task_id) {
                    task.status = status;
                }
            }
            AppEvent::PluginBuilt(plugin) => match self.catalog.add(plugin).cloned() {
                Ok(plugin) => {
                    info!(plugin_id = %plugin.id, "plugin added to catalog");
                    self.workbench.open_plugin(&plugin);
                }
                Err(err) => self.log(format!("Could not add plugin: {err}"), LogStatus::Warning),
            },
            AppEvent::AgentIdle => {
                self.tasks.clear();
                self.is_thinking = false;
            }
        }
    }

    /// Mounts, remounts or tears down the two hosts to match what is on screen.
    fn sync_hosts(&mut self) {
        match self
            .workbench
            .live_plugin()
            .and_then(|plugin_id| self.catalog.get(plugin_id))
        {
            Some(plugin) => {
                self.live.sync(&plugin.id, plugin.source());
            }
            None if self.live.mounted_plugin().is_some() => self.live.unmount(),
            None => {}
        }

        match self
            .workbench
            .visible_custom_view()
            .and_then(|view_id| self.catalog.by_view(view_id))
        {
            Some(plugin) => {
                self.side.sync(&plugin.id, plugin.source());
            }
            None if self.side.mounted_plugin().is_some() => self.side.unmount(),
            None => {}
        }
    }

    /// Runs plugin timers and forwards console output and failures to the system log.
    fn pump_hosts(&mut self, ctx: &egui::Context) {
        for next in [self.live.host_mut().tick(), self.side.host_mut().tick()]
            .into_iter()
            .flatten()
        {
            ctx.request_repaint_after(next);
        }

        let mut notices = Vec::new();
        for lifecycle in [&mut self.live, &mut self.side] {
            let name = lifecycle
                .mounted_plugin()
                .and_then(|plugin_id| self.catalog.get(plugin_id))
                .map_or_else(|| "plugin".to_string(), |plugin| plugin.name.clone());
            for notice in lifecycle.host_mut().take_notices() {
                notices.push((name.clone(), notice));
            }
        }
        for (name, notice) in notices {
            match notice {
                HostNotice::Console(ConsoleLine { level, text }) => {
                    self.log(format!("[{name}] {text}"), console_status(&level));
                }
                HostNotice::Failure(failure) => {
                    warn!(plugin = %name, phase = %failure.phase, "plugin failure surfaced");
                    self.log(format!("{name}: {}", failure.to_log_line()), LogStatus::Error);
                }
            }
        }
    }

    fn render_activity_bar(&mut self, ctx: &egui::Context) {
        let theme = &self.theme;
        let mut clicked: Option<SideView> = None;
        egui::SidePanel::left("activity_bar")
            .exact_width(52.0)
            .resizable(false)
            .frame(theme.panel_frame(theme.surface_0, 6))
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    let mut entries = vec![
                        (SideView::Plugins, "🧩".to_string(), "Plugins".to_string()),
                        (SideView::Search, "🔍".to_string(), "Search".to_string()),
                    ];
                    entries.extend(self.catalog.custom_views().map(|(_, view)| {
                        (
                            SideView::Custom(view.id.clone()),
                            icon_glyph(&view.icon).to_string(),
                            view.name.clone(),
                        )
                    }));

                    for (view, glyph, name) in entries {
                        let selected =
                            self.workbench.sidebar_open && self.workbench.side_view == view;
                        let color = if selected { theme.text_primary } else { theme.text_muted };
                        let response = ui
                            .add(
                                egui::Button::new(RichText::new(glyph).size(20.0).color(color))
                                    .frame(selected)
                                    .min_size(egui::vec2(38.0, 38.0)),
                            )
                            .on_hover_text(name);
                        if response.clicked() {
                            clicked = Some(view);
                        }
                    }
                });
            });

        if let Some(view) = clicked {
            self.workbench.activity_clicked(view);
        }
    }

    fn render_sidebar(&mut self, ctx: &egui::Context) {
        if !self.workbench.sidebar_open {
            return;
        }

        let mut selected: Option<String> = None;
        egui::SidePanel::left("sidebar")
            .default_width(256.0)
            .resizable(true)
            .frame(self.theme.panel_frame(self.theme.surface_1, 8))
            .show(ctx, |ui| match self.workbench.side_view.clone() {
                SideView::Plugins => {
                    section_title(ui, &self.theme, &format!("Plugins ({})", self.catalog.len()));
                    for plugin in self.catalog.iter() {
                        if plugin_row(ui, &self.theme, plugin).clicked() {
                            selected = Some(plugin.id.clone());
                        }
                    }
                }
                SideView::Search => {
                    section_title(ui, &self.theme, "Search");
                    ui.add(
                        egui::TextEdit::singleline(&mut self.search_query)
                            .hint_text("Search plugins...")
                            .desired_width(f32::INFINITY),
                    );
                    let results = self.catalog.search(&self.search_query);
                    if results.is_empty() {
                        ui.label(RichText::new("No plugins match.").color(self.theme.text_muted));
                    }
                    for plugin in results {
                        if plugin_row(ui, &self.theme, plugin).clicked() {
                            selected = Some(plugin.id.clone());
                        }
                    }
                }
                SideView::Custom(view_id) => {
                    let title = self
                        .catalog
                        .by_view(&view_id)
                        .and_then(|plugin| plugin.custom_view.as_ref())
                        .map_or_else(|| view_id.clone(), |view| view.name.clone());
                    section_title(ui, &self.theme, &title);
                    ScrollArea::vertical()
                        .id_salt("custom_view_scroll")
                        .show(ui, |ui| show_host(ui, &self.theme, &mut self.side));
                }
            });

        if let Some(plugin) = selected.and_then(|plugin_id| self.catalog.get(&plugin_id)) {
            let plugin = plugin.clone();
            self.workbench.open_plugin(&plugin);
        }
    }

    fn render_assistant_panel(&mut self, ctx: &egui::Context) {
        let mut send_now = false;
        egui::SidePanel::right("assistant_panel")
            .default_width(360.0)
            .resizable(true)
            .frame(self.theme.panel_frame(self.theme.surface_1, 10))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(RichText::new("AI Assistant").strong().size(15.0));
                    if self.is_thinking {
                        ui.add(egui::Spinner::new().size(14.0));
                    }
                });
                ui.separator();

                let transcript_height = (ui.available_height() - 56.0).max(120.0);
                ScrollArea::vertical()
                    .id_salt("chat_transcript")
                    .max_height(transcript_height)
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for (index, message) in self.chat.iter().enumerate() {
                            chat_bubble(ui, &self.theme, index, message);
                        }
                        if self.is_thinking {
                            ui.label(RichText::new("Thinking...").italics().color(self.theme.text_muted));
                        }
                        if self.scroll_to_bottom {
                            ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
                        }
                    });
                self.scroll_to_bottom = false;

                ui.separator();
                let hint = if self.is_thinking {
                    "Agent is working..."
                } else {
                    "Describe a plugin to build..."
                };
                ui.horizontal(|ui| {
                    let response = ui.add_enabled(
                        !self.is_thinking,
                        egui::TextEdit::singleline(&mut self.input_buffer)
                            .desired_width(ui.available_width() - 64.0)
                            .hint_text(hint),
                    );
                    if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                        send_now = true;
                    }
                    send_now |= ui
                        .add_enabled(
                            !self.is_thinking && !self.input_buffer.trim().is_empty(),
                            egui::Button::new("Send"),
                        )
                        .clicked();
                });
            });

        if send_now {
            let prompt = std::mem::take(&mut self.input_buffer);
            self.submit_prompt(&prompt);
        }
    }

    fn render_status_bar(&mut self, ctx: &egui::Context) {
        let status = self.agent_status();
        egui::TopBottomPanel::bottom("status_bar")
            .exact_height(24.0)
            .frame(self.theme.panel_frame(self.theme.surface_3, 2))
            .show(ctx, |ui| {
                ui.horizontal_centered(|ui| {
                    if self.is_thinking {
                        ui.add(egui::Spinner::new().size(11.0));
                    }
                    let toggle = ui.add(
                        egui::Button::new(RichText::new(status).size(12.0).color(self.theme.text_muted))
                            .frame(false),
                    );
                    if toggle.clicked() {
                        self.bottom_panel_open = !self.bottom_panel_open;
                    }
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        let muted = |text: &str| RichText::new(text).size(12.0).color(self.theme.text_muted);
                        ui.label(muted(concat!("v", env!("CARGO_PKG_VERSION"))));
                        ui.label(muted("UTF-8"));
                        ui.label(muted(self.live.host().policy().as_str()));
                    });
                });
            });
    }

    fn render_bottom_panel(&mut self, ctx: &egui::Context) {
        if !self.bottom_panel_open {
            return;
        }

        egui::TopBottomPanel::bottom("bottom_panel")
            .default_height(192.0)
            .resizable(true)
            .frame(self.theme.panel_frame(self.theme.surface_1, 8))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.selectable_value(&mut self.bottom_tab, BottomTab::AgentPlan, "Agent Plan");
                    ui.selectable_value(&mut self.bottom_tab, BottomTab::SystemLog, "System Log");
                });
                ui.separator();
                match self.bottom_tab {
                    BottomTab::AgentPlan => {
                        if self.tasks.is_empty() {
                            ui.label(RichText::new("No active tasks.").color(self.theme.text_muted));
                        }
                        for task in &self.tasks {
                            ui.horizontal(|ui| {
                                ui.label(
                                    RichText::new(format!("[{}]", task.status.label()))
                                        .monospace()
                                        .color(self.theme.task_status_color(task.status)),
                                );
                                ui.label(&task.description);
                            });
                        }
                    }
                    BottomTab::SystemLog => {
                        ScrollArea::vertical()
                            .id_salt("system_log")
                            .stick_to_bottom(true)
                            .auto_shrink([false, false])
                            .show(ui, |ui| {
                                for entry in &self.logs {
                                    ui.horizontal(|ui| {
                                        ui.label(
                                            RichText::new(&entry.timestamp)
                                                .monospace()
                                                .color(self.theme.text_muted),
                                        );
                                        ui.label(
                                            RichText::new(&entry.text)
                                                .monospace()
                                                .color(self.theme.log_status_color(entry.status)),
                                        );
                                    });
                                }
                            });
                    }
                }
            });
    }

    fn render_tab_strip(&mut self, ui: &mut egui::Ui) {
        let mut activate: Option<String> = None;
        let mut close: Option<String> = None;
        ui.horizontal(|ui| {
            for tab in &self.workbench.tabs {
                let selected = self.workbench.active_tab.as_deref() == Some(tab.id.as_str());
                let label = format!("{} {}", icon_glyph(&tab.icon), tab.title);
                if ui.selectable_label(selected, label).clicked() {
                    activate = Some(tab.id.clone());
                }
                if ui.small_button("×").on_hover_text("Close tab").clicked() {
                    close = Some(tab.id.clone());
                }
                ui.add_space(self.theme.spacing_8);
            }
        });

        if let Some(tab_id) = activate {
            self.workbench.active_tab = Some(tab_id);
        }
        if let Some(tab_id) = close {
            self.workbench.close_tab(&tab_id);
        }
    }

    fn render_main_panel(&mut self, ctx: &egui::Context) {
        let mut quick_action: Option<&'static str> = None;
        egui::CentralPanel::default()
            .frame(self.theme.panel_frame(self.theme.surface_2, 12))
            .show(ctx, |ui| {
                self.render_tab_strip(ui);
                ui.separator();

                let Some(tab) = self.workbench.active().cloned() else {
                    ui.centered_and_justified(|ui| {
                        ui.label(RichText::new("No open tabs.").color(self.theme.text_muted));
                    });
                    return;
                };

                match tab.kind {
                    TabKind::Welcome => {
                        quick_action = welcome_page(ui, &self.theme, self.is_thinking);
                    }
                    TabKind::Plugin { plugin_id, page } => {
                        let Some(plugin) = self.catalog.get(&plugin_id).cloned() else {
                            ui.label(RichText::new("Plugin not found.").color(self.theme.text_muted));
                            return;
                        };
                        self.plugin_page(ui, &plugin, page);
                    }
                }
            });

        if let Some(prompt) = quick_action {
            self.submit_prompt(prompt);
        }
    }

    fn plugin_page(&mut self, ui: &mut egui::Ui, plugin: &Plugin, page: PluginPage) {
        let theme = &self.theme;
        ui.horizontal(|ui| {
            egui::Frame::new()
                .fill(theme.accent_for_class(&plugin.color))
                .corner_radius(egui::CornerRadius::same(theme.radius_8))
                .inner_margin(egui::Margin::same(10))
                .show(ui, |ui| {
                    ui.label(RichText::new(icon_glyph(&plugin.icon)).size(24.0).color(Color32::WHITE));
                });
            ui.vertical(|ui| {
                ui.label(RichText::new(&plugin.name).size(22.0).strong());
                ui.label(RichText::new(&plugin.description).color(theme.text_muted));
            });
        });
        ui.separator();

        let mut next_page = page;
        ui.horizontal(|ui| {
            for candidate in PluginPage::ALL {
                ui.selectable_value(&mut next_page, candidate, candidate.label());
            }
        });
        if next_page != page {
            if let Some(Tab {
                kind: TabKind::Plugin { page, .. },
                ..
            }) = self.workbench.active_mut()
            {
                *page = next_page;
            }
        }
        ui.add_space(self.theme.spacing_8);

        let theme = &self.theme;
        match next_page {
            PluginPage::Details => {
                ui.label(RichText::new("Plugin Details").size(16.0).strong());
                egui::Grid::new("plugin_details").num_columns(2).show(ui, |ui| {
                    let row = |ui: &mut egui::Ui, key: &str, value: &str| {
                        ui.label(RichText::new(key).color(theme.text_muted));
                        ui.label(value);
                        ui.end_row();
                    };
                    row(ui, "Id", &plugin.id);
                    row(ui, "Icon", &plugin.icon);
                    row(ui, "Accent", &plugin.color);
                    row(ui, "Endpoints", &plugin.api_endpoints.len().to_string());
                    let view = plugin
                        .custom_view
                        .as_ref()
                        .map_or_else(|| "none".to_string(), |view| format!("{} ({})", view.name, view.id));
                    row(ui, "Custom view", &view);
                });
            }
            PluginPage::Api => {
                ui.label(RichText::new("API Endpoints").size(16.0).strong());
                if plugin.api_endpoints.is_empty() {
                    ui.label(
                        RichText::new("No API endpoints defined for this plugin.").color(theme.text_muted),
                    );
                }
                for endpoint in &plugin.api_endpoints {
                    theme.card_frame().show(ui, |ui| {
                        ui.set_width(ui.available_width());
                        let (method, path) = endpoint
                            .path
                            .split_once(' ')
                            .unwrap_or((endpoint.path.as_str(), ""));
                        ui.horizontal(|ui| {
                            ui.label(RichText::new(method).monospace().strong().color(theme.accent_primary));
                            ui.label(RichText::new(path).monospace());
                        });
                        ui.label(RichText::new(&endpoint.description).size(12.0).color(theme.text_muted));
                    });
                }
            }
            PluginPage::Source => {
                ui.label(RichText::new("Generated Source Code").size(16.0).strong());
                match plugin.source() {
                    Some(source) => code_block(ui, theme, "plugin_source", source),
                    None => {
                        ui.label(
                            RichText::new("No source code available for this plugin.").color(theme.text_muted),
                        );
                    }
                }
            }
            PluginPage::Live => {
                let mut reload = false;
                ui.horizontal(|ui| {
                    reload = ui.button("Reload").on_hover_text("Mount the source again").clicked();
                    if let Some(failure) = self.live.host().failure() {
                        ui.label(RichText::new(failure.header()).color(theme.warning));
                    } else if self.live.host().is_live() {
                        ui.label(RichText::new("● running").size(12.0).color(theme.success));
                    }
                });
                if reload {
                    self.live.reload();
                }
                ui.add_space(theme.spacing_8);
                ScrollArea::vertical()
                    .id_salt("live_plugin_scroll")
                    .auto_shrink([false, false])
                    .show(ui, |ui| show_host(ui, &self.theme, &mut self.live));
            }
        }
    }
}

/// Draws a host's mount target and delivers the interactions it produced.
fn show_host(ui: &mut egui::Ui, theme: &Theme, lifecycle: &mut PluginLifecycle) {
    let mut events: Vec<DomEvent> = Vec::new();
    render::show(ui, theme, lifecycle.host_mut().view_mut(), &mut |event| events.push(event));
    for event in events {
        lifecycle.host_mut().dispatch(&event);
    }
}

fn console_status(level: &str) -> LogStatus {
    match level {
        "error" => LogStatus::Error,
        "warn" => LogStatus::Warning,
        _ => LogStatus::Info,
    }
}

fn icon_glyph(icon: &str) -> &'static str {
    match icon {
        "TaskIcon" => "☑",
        "NoteIcon" => "🗒",
        "ChartIcon" => "📊",
        "BeakerIcon" => "⚗",
        "CodeBracketSquareIcon" => "⌨",
        "ChatBubbleLeftRightIcon" => "💬",
        "RegistryIcon" => "📦",
        "BusIcon" => "🚌",
        _ => "⬚",
    }
}

fn section_title(ui: &mut egui::Ui, theme: &Theme, title: &str) {
    ui.label(
        RichText::new(title.to_uppercase())
            .size(11.0)
            .strong()
            .color(theme.text_muted),
    );
    ui.add_space(theme.spacing_4);
}

fn plugin_row(ui: &mut egui::Ui, theme: &Theme, plugin: &Plugin) -> egui::Response {
    let text = RichText::new(format!("{}  {}", icon_glyph(&plugin.icon), plugin.name)).color(theme.text_primary);
    ui.add(egui::Button::new(text).frame(false).min_size(egui::vec2(ui.available_width(), 28.0)))
        .on_hover_text(&plugin.description)
}

fn code_block(ui: &mut egui::Ui, theme: &Theme, id: impl std::hash::Hash, source: &str) {
    theme.code_frame().show(ui, |ui| {
        ui.set_width(ui.available_width());
        ScrollArea::both().id_salt(id).max_height(360.0).show(ui, |ui| {
            ui.label(RichText::new(source).monospace().size(12.0).color(theme.text_primary));
        });
    });
}

fn chat_bubble(ui: &mut egui::Ui, theme: &Theme, index: usize, message: &ChatMessage) {
    let (fill, align) = match message.sender {
        ChatSender::User => (theme.accent_muted, egui::Align::Max),
        ChatSender::Agent => (theme.surface_3, egui::Align::Min),
    };
    ui.with_layout(egui::Layout::top_down(align), |ui| {
        egui::Frame::new()
            .fill(fill)
            .corner_radius(egui::CornerRadius::same(theme.radius_8))
            .inner_margin(egui::Margin::symmetric(10, 8))
            .show(ui, |ui| {
                ui.set_max_width(ui.available_width() * 0.9);
                ui.label(&message.text);
                if let Some(code) = &message.code {
                    egui::CollapsingHeader::new(
                        RichText::new(format!("Source ({})", code.language)).size(12.0),
                    )
                    .id_salt(("chat_code", index))
                    .show(ui, |ui| code_block(ui, theme, ("chat_code_body", index), &code.content));
                }
            });
    });
    ui.add_space(theme.spacing_4);
}

/// Returns the quick action the user picked, if any.
fn welcome_page(ui: &mut egui::Ui, theme: &Theme, busy: bool) -> Option<&'static str> {
    let mut picked = None;
    ui.vertical_centered(|ui| {
        ui.add_space(theme.spacing_24 * 2.0);
        ui.label(RichText::new("⚗").size(56.0).color(theme.accent_primary));
        ui.label(RichText::new("Welcome to Catalyst").size(28.0).strong());
        ui.add_space(theme.spacing_8);
        ui.label(
            RichText::new(
                "This is a blank canvas for your ideas. Use the AI Assistant on the right to start building, \
                 or try one of the suggestions below.",
            )
            .color(theme.text_muted),
        );
        ui.add_space(theme.spacing_16);
        ui.set_max_width(420.0);
        theme.card_frame().show(ui, |ui| {
            ui.label(RichText::new("Try a Quick Start:").strong());
            for prompt in QUICK_ACTIONS {
                let button = egui::Button::new(*prompt).min_size(egui::vec2(ui.available_width(), 32.0));
                if ui.add_enabled(!busy, button).clicked() {
                    picked = Some(*prompt);
                }
            }
        });
    });
    picked
}

impl eframe::App for CatalystApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if !self.visuals_applied {
            self.theme.apply_visuals(ctx);
            self.visuals_applied = true;
        }

        self.drain_events();
        self.sync_hosts();
        self.pump_hosts(ctx);

        self.render_status_bar(ctx);
        self.render_activity_bar(ctx);
        self.render_sidebar(ctx);
        self.render_assistant_panel(ctx);
        self.render_bottom_panel(ctx);
        self.render_main_panel(ctx);

        if self.is_thinking {
            ctx.request_repaint_after(AGENT_POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::scripted::ScriptedAgent;
    use crate::agent::types::TaskStatus;
    use crate::runtime::host::HostView;
    use std::sync::{mpsc, Arc};

    fn plugin(id: &str) -> Plugin {
        Plugin {
            id: id.to_string(),
            name: format!("Plugin {id}"),
            icon: "ChartIcon".to_string(),
            description: "test".to_string(),
            color: "bg-red-500".to_string(),
            generated_code: Some("(c) => { c.textContent = 'live'; }".to_string()),
            api_endpoints: Vec::new(),
            custom_view: None,
        }
    }

    fn app() -> (CatalystApp, tokio::runtime::Runtime) {
        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        let (tx, rx) = mpsc::channel();
        let agent = {
            let _guard = runtime.enter();
            AgentClient::new(tx, Arc::new(ScriptedAgent), 0.0).expect("agent client")
        };
        (CatalystApp::new(rx, agent, &AppConfig::default()), runtime)
    }

    #[test]
    fn closing_the_active_tab_activates_its_left_neighbour() {
        let mut workbench = Workbench::default();
        workbench.open_plugin(&plugin("a"));
        workbench.open_plugin(&plugin("b"));
        workbench.open_plugin(&plugin("a"));
        assert_eq!(workbench.tabs.len(), 3);
        assert_eq!(workbench.active_tab.as_deref(), Some("tab-plugin-a"));

        workbench.close_tab("tab-plugin-a");
        assert_eq!(workbench.active_tab.as_deref(), Some(WELCOME_TAB_ID));

        workbench.close_tab(WELCOME_TAB_ID);
        assert_eq!(workbench.active_tab.as_deref(), Some("tab-plugin-b"));
        workbench.close_tab("tab-plugin-b");
        assert!(workbench.active_tab.is_none());
    }

    #[test]
    fn closing_an_inactive_tab_keeps_the_selection() {
        let mut workbench = Workbench::default();
        workbench.open_plugin(&plugin("a"));
        workbench.close_tab(WELCOME_TAB_ID);
        assert_eq!(workbench.active_tab.as_deref(), Some("tab-plugin-a"));
    }

    #[test]
    fn clicking_the_shown_view_collapses_the_sidebar() {
        let mut workbench = Workbench::default();
        workbench.activity_clicked(SideView::Plugins);
        assert!(!workbench.sidebar_open);
        workbench.activity_clicked(SideView::Plugins);
        assert!(workbench.sidebar_open);
        workbench.activity_clicked(SideView::Custom("view-todo-list".to_string()));
        assert_eq!(workbench.visible_custom_view(), Some("view-todo-list"));
    }

    #[test]
    fn agent_events_update_tasks_catalog_and_status() {
        let (mut app, _runtime) = app();
        assert_eq!(app.agent_status(), "Agent is idle");
        app.is_thinking = true;
        assert_eq!(app.agent_status(), "Agent is working...");

        app.apply_event(AppEvent::TasksPlanned(vec![AgentTask {
            id: "task-1".to_string(),
            description: "Write code".to_string(),
            status: TaskStatus::Pending,
        }]));
        app.apply_event(AppEvent::TaskStatus {
            task_id: "task-1".to_string(),
            status: TaskStatus::Completed,
        });
        assert_eq!(app.tasks[0].status, TaskStatus::Completed);

        app.apply_event(AppEvent::PluginBuilt(plugin("plugin-9")));
        assert!(app.catalog.get("plugin-9").is_some());
        assert_eq!(app.workbench.active_tab.as_deref(), Some("tab-plugin-plugin-9"));

        app.is_thinking = false;
        assert_eq!(app.agent_status(), "Task completed");
        app.apply_event(AppEvent::AgentIdle);
        assert!(app.tasks.is_empty());
        assert_eq!(app.agent_status(), "Agent is idle");
    }

    #[test]
    fn live_page_and_custom_view_drive_their_hosts() {
        let (mut app, _runtime) = app();
        app.apply_event(AppEvent::PluginBuilt(plugin("plugin-live")));
        app.sync_hosts();
        assert!(app.live.mounted_plugin().is_none());

        if let Some(Tab {
            kind: TabKind::Plugin { page, .. },
            ..
        }) = app.workbench.active_mut()
        {
            *page = PluginPage::Live;
        }
        app.sync_hosts();
        assert_eq!(app.live.mounted_plugin(), Some("plugin-live"));
        assert_eq!(app.live.host().text_content(), "live");

        app.workbench.activity_clicked(SideView::Custom("view-todo-list".to_string()));
        app.sync_hosts();
        assert_eq!(app.side.mounted_plugin(), Some("plugin-todo-list"));
        assert!(matches!(app.side.host().view(), HostView::Rendered(_)));

        app.workbench.close_tab("tab-plugin-plugin-live");
        app.workbench.activity_clicked(SideView::Plugins);
        app.sync_hosts();
        assert!(app.live.mounted_plugin().is_none());
        assert!(app.side.mounted_plugin().is_none());
    }

    #[test]
    fn submitting_a_prompt_starts_a_turn() {
        let (mut app, _runtime) = app();
        app.submit_prompt("   ");
        assert!(!app.is_thinking);

        app.submit_prompt("hello");
        assert!(app.is_thinking);
        assert!(app.bottom_panel_open);
        assert_eq!(app.chat.last().map(|message| message.text.as_str()), Some("hello"));
        assert_eq!(
            app.logs.last().map(|entry| entry.text.as_str()),
            Some("Contacting AI agent...")
        );
    }

    #[test]
    fn plugin_failures_reach_the_system_log() {
        let (mut app, _runtime) = app();
        let mut broken = plugin("plugin-broken");
        broken.generated_code = Some("(c) => { throw new Error('kaput'); }".to_string());
        app.apply_event(AppEvent::PluginBuilt(broken));
        if let Some(Tab {
            kind: TabKind::Plugin { page, .. },
            ..
        }) = app.workbench.active_mut()
        {
            *page = PluginPage::Live;
        }
        app.sync_hosts();
        app.pump_hosts(&egui::Context::default());
        let last = app.logs.last().expect("log entry");
        assert_eq!(last.status, LogStatus::Error);
        assert!(last.text.starts_with("Plugin plugin-broken:"));
        assert!(last.text.contains("kaput"));
    }
}
