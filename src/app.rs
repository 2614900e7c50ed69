use crate::config::SkiffConfig;
use crate::input::Action;
use crate::model::{NamespaceScope, ResourceKind, split_fqn};
use crate::render::Registry;
use crate::sort::SortColumn;
use crate::table::{HeaderRow, TableData};
use crate::view::TableView;
use chrono::Local;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InputMode {
    Normal,
    Command,
    Filter,
}

/// Side effects requested by a state transition. The runtime loop executes
/// them; `App` itself never touches the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    None,
    RestartWatch {
        kind: ResourceKind,
        scope: NamespaceScope,
    },
    Describe {
        kind: ResourceKind,
        namespace: Option<String>,
        name: String,
    },
    Delete {
        kind: ResourceKind,
        targets: Vec<(Option<String>, String)>,
    },
    Rollback {
        namespace: String,
        name: String,
    },
    LoadLogs {
        namespace: String,
        pod: String,
    },
    StartPortForward {
        kind: ResourceKind,
        namespace: String,
        name: String,
        local_port: u16,
        remote_port: u16,
    },
    ResolveSelector {
        kind: ResourceKind,
        namespace: String,
        name: String,
    },
}

#[derive(Debug, Clone)]
struct PendingConfirmation {
    prompt: String,
    command: AppCommand,
}

#[derive(Debug, Clone)]
struct DetailOverlay {
    title: String,
    text: String,
}

/// Where a drill-down came from, so `Esc` can go back.
#[derive(Debug, Clone, Eq, PartialEq)]
struct ViewMemo {
    kind: ResourceKind,
    scope: NamespaceScope,
    filter: String,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PortForwardSession {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
    pub local_port: u16,
    pub remote_port: u16,
    pub pid: u32,
}

pub struct App {
    running: bool,
    mode: InputMode,
    kind: ResourceKind,
    scope: NamespaceScope,
    view: TableView,
    registry: Registry,
    config: SkiffConfig,
    context: String,
    input: String,
    status: String,
    show_help: bool,
    pending_g: bool,
    pending_confirmation: Option<PendingConfirmation>,
    detail_overlay: Option<DetailOverlay>,
    detail_scroll: u16,
    detail_view_height: u16,
    table_page_size: usize,
    history: Vec<ViewMemo>,
    active_port_forwards: Vec<PortForwardSession>,
    render_failures: usize,
    last_refresh: Option<String>,
}

impl App {
    pub fn new(
        kind: ResourceKind,
        scope: NamespaceScope,
        registry: Registry,
        config: SkiffConfig,
    ) -> Self {
        let mut view = TableView::new(kind.title());
        view.set_styles(config.styles);
        let mut app = Self {
            running: true,
            mode: InputMode::Normal,
            kind,
            scope,
            view,
            registry,
            config,
            context: "-".to_string(),
            input: String::new(),
            status: "Press : for commands, / to filter, ? for help".to_string(),
            show_help: false,
            pending_g: false,
            pending_confirmation: None,
            detail_overlay: None,
            detail_scroll: 0,
            detail_view_height: 20,
            table_page_size: 20,
            history: Vec::new(),
            active_port_forwards: Vec::new(),
            render_failures: 0,
            last_refresh: None,
        };
        app.reset_view();
        app
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn scope(&self) -> &NamespaceScope {
        &self.scope
    }

    pub fn view(&self) -> &TableView {
        &self.view
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn set_context(&mut self, context: impl Into<String>) {
        self.context = context.into();
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn pending_confirmation_prompt(&self) -> Option<&str> {
        self.pending_confirmation
            .as_ref()
            .map(|pending| pending.prompt.as_str())
    }

    pub fn render_failures(&self) -> usize {
        self.render_failures
    }

    pub fn last_refresh(&self) -> Option<&str> {
        self.last_refresh.as_deref()
    }

    pub fn config_source(&self) -> Option<&str> {
        self.config.source.as_deref()
    }

    pub fn detail_overlay_active(&self) -> bool {
        self.detail_overlay.is_some()
    }

    pub fn detail_title(&self) -> &str {
        self.detail_overlay
            .as_ref()
            .map_or("", |overlay| overlay.title.as_str())
    }

    pub fn detail_text(&self) -> &str {
        self.detail_overlay
            .as_ref()
            .map_or("", |overlay| overlay.text.as_str())
    }

    pub fn detail_scroll(&self) -> u16 {
        self.detail_scroll
    }

    pub fn set_table_page_size(&mut self, rows: usize) {
        self.table_page_size = rows.max(1);
    }

    pub fn set_detail_viewport(&mut self, height: u16) {
        self.detail_view_height = height.max(1);
        self.detail_scroll = self.detail_scroll.min(self.detail_max_scroll());
    }

    pub fn set_detail_overlay(&mut self, title: impl Into<String>, text: String) {
        self.detail_overlay = Some(DetailOverlay {
            title: title.into(),
            text,
        });
        self.detail_scroll = 0;
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = normalize_status_text(status.into());
    }

    pub fn set_error_status(&mut self, context: &str, error: &str) {
        self.set_status(format!("{context}: {}", summarize_error_line(error)));
    }

    /// Replaces the effective config. Styles and aliases apply at once,
    /// sort defaults on the next kind switch.
    pub fn apply_config(&mut self, config: SkiffConfig) {
        self.view.set_styles(config.styles);
        self.status = match config.source.as_deref() {
            Some(source) => format!("Config loaded from {source}"),
            None => "Config removed, using defaults".to_string(),
        };
        self.config = config;
    }

    /// Feeds a watch snapshot into the table. Snapshots from a worker that
    /// no longer matches the active kind/scope are dropped.
    pub fn apply_snapshot(
        &mut self,
        kind: ResourceKind,
        scope: &NamespaceScope,
        data: TableData,
        failures: usize,
    ) -> bool {
        if kind != self.kind || scope != &self.scope {
            return false;
        }

        self.view.update(data);
        if failures > 0 && self.render_failures != failures {
            self.status = format!("{failures} {} could not be rendered", kind.title());
        }
        self.render_failures = failures;
        self.last_refresh = Some(Local::now().format("%H:%M:%S").to_string());
        true
    }

    pub fn register_port_forward(&mut self, session: PortForwardSession) {
        self.active_port_forwards.retain(|existing| {
            !(existing.kind == session.kind
                && existing.namespace == session.namespace
                && existing.name == session.name
                && existing.local_port == session.local_port)
        });
        self.active_port_forwards.push(session);
    }

    pub fn remove_port_forward_by_pid(&mut self, pid: u32) -> Option<PortForwardSession> {
        let index = self
            .active_port_forwards
            .iter()
            .position(|session| session.pid == pid)?;
        Some(self.active_port_forwards.remove(index))
    }

    pub fn port_forwards(&self) -> &[PortForwardSession] {
        &self.active_port_forwards
    }

    pub fn port_forward_badge(&self) -> Option<String> {
        let (namespace, name) = self.view.selected_target()?;
        let namespace = namespace?;
        let ports = self
            .active_port_forwards
            .iter()
            .filter(|session| {
                session.kind == self.kind && session.namespace == namespace && session.name == name
            })
            .map(|session| format!("{}:{}", session.local_port, session.remote_port))
            .collect::<Vec<_>>();
        if ports.is_empty() {
            None
        } else {
            Some(format!("PF {}", ports.join(",")))
        }
    }

    pub fn apply_action(&mut self, action: Action) -> AppCommand {
        if let Some(pending) = self.pending_confirmation.take() {
            match action {
                Action::ConfirmYes | Action::EnterResource => {
                    self.status = format!("Confirmed: {}", pending.prompt);
                    return pending.command;
                }
                Action::ConfirmNo | Action::CancelInput | Action::Back => {
                    self.status = "Action cancelled".to_string();
                    return AppCommand::None;
                }
                _ => {
                    self.pending_confirmation = Some(pending);
                    self.status =
                        "Pending confirmation: press y to confirm or n to cancel".to_string();
                    return AppCommand::None;
                }
            }
        }

        let g_prefixed = std::mem::take(&mut self.pending_g);

        if self.show_help && !matches!(action, Action::ToggleHelp) {
            self.show_help = false;
            if matches!(action, Action::Back) {
                return AppCommand::None;
            }
        }

        match action {
            Action::Quit => {
                self.running = false;
                self.status = "Exit requested".to_string();
                AppCommand::None
            }
            Action::Down => {
                self.move_cursor(1);
                AppCommand::None
            }
            Action::Up => {
                self.move_cursor(-1);
                AppCommand::None
            }
            Action::PageDown => {
                self.move_cursor(self.page_step());
                AppCommand::None
            }
            Action::PageUp => {
                self.move_cursor(-self.page_step());
                AppCommand::None
            }
            Action::GPrefix => {
                if g_prefixed {
                    self.jump_top();
                } else {
                    self.pending_g = true;
                }
                AppCommand::None
            }
            Action::Top => {
                self.jump_top();
                AppCommand::None
            }
            Action::Bottom => {
                if self.detail_overlay.is_some() {
                    self.detail_scroll = self.detail_max_scroll();
                } else {
                    self.view.select_last();
                }
                AppCommand::None
            }
            Action::ToggleHelp => {
                self.show_help = !self.show_help;
                AppCommand::None
            }
            Action::StartCommand => {
                self.mode = InputMode::Command;
                self.input.clear();
                AppCommand::None
            }
            Action::StartFilter => {
                self.mode = InputMode::Filter;
                self.view.activate_filter();
                AppCommand::None
            }
            Action::Describe => self.prepare_describe(),
            Action::Delete => self.prepare_delete_confirmation(),
            Action::Rollback => self.prepare_rollback_confirmation(),
            Action::Logs => self.prepare_logs(),
            Action::ToggleMark => {
                self.view.toggle_mark();
                AppCommand::None
            }
            Action::ClearMarks => {
                self.view.clear_marks();
                self.status = "Marks cleared".to_string();
                AppCommand::None
            }
            Action::SortColumn(offset) => {
                if !self.view.sort_col_cmd(offset, true) {
                    self.status = match offset {
                        -2 => "Namespace column is only shown for all namespaces".to_string(),
                        _ => "No such column to sort by".to_string(),
                    };
                }
                AppCommand::None
            }
            Action::SortKey(key) => {
                if !self.view.sort_by_key(key) {
                    self.status = format!("No sort shortcut {key} for {}", self.kind.title());
                }
                AppCommand::None
            }
            Action::SortInvert => {
                self.view.sort_invert_cmd();
                AppCommand::None
            }
            Action::EnterResource => self.enter_selected_resource(),
            Action::Back => self.go_back(),
            Action::SubmitInput => self.submit_input(),
            Action::CancelInput => {
                if self.mode == InputMode::Filter {
                    self.view.clear_filter();
                    self.status = "Filter cleared".to_string();
                }
                self.mode = InputMode::Normal;
                self.input.clear();
                AppCommand::None
            }
            Action::Backspace => {
                match self.mode {
                    InputMode::Filter => {
                        self.view.filter_pop();
                        self.surface_filter_error();
                    }
                    InputMode::Command => {
                        self.input.pop();
                    }
                    InputMode::Normal => {}
                }
                AppCommand::None
            }
            Action::InputChar(c) => {
                match self.mode {
                    InputMode::Filter => {
                        self.view.filter_push(c);
                        self.surface_filter_error();
                    }
                    InputMode::Command => self.input.push(c),
                    InputMode::Normal => {}
                }
                AppCommand::None
            }
            Action::ConfirmYes | Action::ConfirmNo => AppCommand::None,
        }
    }

    /// Opens Pods for a workload once its selector is known.
    pub fn open_pods_with_selector(&mut self, namespace: String, selector: String) -> AppCommand {
        self.push_history();
        self.kind = ResourceKind::Pods;
        self.scope = NamespaceScope::Named(namespace);
        self.reset_view();
        self.view.set_filter(format!("-l {selector}"));
        self.status = format!("Pods matching {selector}");
        self.restart_watch()
    }

    fn surface_filter_error(&mut self) {
        if let Some(error) = self.view.filter_error() {
            self.status = normalize_status_text(format!("Invalid filter: {error}"));
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        if self.detail_overlay.is_some() {
            let max = self.detail_max_scroll() as isize;
            let next = (self.detail_scroll as isize + delta).clamp(0, max);
            self.detail_scroll = next as u16;
        } else if delta >= 0 {
            self.view.select_next(delta as usize);
        } else {
            self.view.select_previous(delta.unsigned_abs());
        }
    }

    fn jump_top(&mut self) {
        if self.detail_overlay.is_some() {
            self.detail_scroll = 0;
        } else {
            self.view.select_first();
        }
    }

    fn page_step(&self) -> isize {
        if self.detail_overlay.is_some() {
            self.detail_view_height.saturating_div(2).max(1) as isize
        } else {
            self.table_page_size.saturating_sub(1).max(1) as isize
        }
    }

    fn detail_max_scroll(&self) -> u16 {
        let lines = self.detail_text().lines().count();
        lines.saturating_sub(self.detail_view_height as usize) as u16
    }

    fn submit_input(&mut self) -> AppCommand {
        match self.mode {
            InputMode::Normal => AppCommand::None,
            InputMode::Filter => {
                self.mode = InputMode::Normal;
                match self.view.commit_filter() {
                    Some(error) => {
                        self.set_status(format!("Invalid filter dropped: {error}"));
                    }
                    None if self.view.cmd_buff().is_empty() => {
                        self.status = "Filter cleared".to_string();
                    }
                    None => {
                        self.status = format!("Filter: '{}'", self.view.cmd_buff().text());
                    }
                }
                AppCommand::None
            }
            InputMode::Command => {
                let command = self.input.trim().to_string();
                self.mode = InputMode::Normal;
                self.input.clear();
                self.execute_command_line(&command)
            }
        }
    }

    fn execute_command_line(&mut self, line: &str) -> AppCommand {
        let line = line.trim_start_matches(':').trim();
        if line.is_empty() {
            self.status = "No command entered".to_string();
            return AppCommand::None;
        }

        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default().to_ascii_lowercase();
        let argument = parts.next();

        match (command.as_str(), argument) {
            ("q" | "quit" | "exit", _) => {
                self.running = false;
                self.status = "Exit requested".to_string();
                AppCommand::None
            }
            ("help" | "?", _) => {
                self.show_help = true;
                AppCommand::None
            }
            ("ns" | "namespace", Some(namespace)) => {
                self.history.clear();
                self.switch_scope(NamespaceScope::from_token(namespace))
            }
            ("pf" | "port-forward", Some(mapping)) => match parse_port_mapping(mapping) {
                Some((local_port, remote_port)) => {
                    self.prepare_port_forward(local_port, remote_port)
                }
                None => {
                    self.status = "Usage: :pf <local>:<remote>".to_string();
                    AppCommand::None
                }
            },
            ("pf" | "port-forward", None) => {
                self.status = "Usage: :pf <local>:<remote>".to_string();
                AppCommand::None
            }
            (token, scope) => {
                let Some(kind) = self.config.resolve_kind(token) else {
                    self.status = format!("Unknown command '{token}'");
                    return AppCommand::None;
                };
                self.history.clear();
                if let Some(scope) = scope {
                    self.scope = NamespaceScope::from_token(scope);
                }
                self.switch_kind(kind)
            }
        }
    }

    fn switch_kind(&mut self, kind: ResourceKind) -> AppCommand {
        self.kind = kind;
        self.detail_overlay = None;
        self.reset_view();
        self.status = format!("Viewing {} in {}", kind.title(), self.scope.label());
        self.restart_watch()
    }

    fn switch_scope(&mut self, scope: NamespaceScope) -> AppCommand {
        self.scope = scope;
        self.detail_overlay = None;
        self.reset_view();
        self.status = format!("Namespace scope set to {}", self.scope.label());
        self.restart_watch()
    }

    fn restart_watch(&self) -> AppCommand {
        AppCommand::RestartWatch {
            kind: self.kind,
            scope: self.scope.clone(),
        }
    }

    fn reset_view(&mut self) {
        let renderer = self.registry.get(self.kind);
        let header = renderer.header(&self.scope);
        let sort = self.initial_sort(&header);
        self.view.reset(
            self.kind.title(),
            TableData::new(self.scope.clone(), header),
            renderer.colorer(),
            renderer.sort_bindings(),
            sort,
        );
        self.render_failures = 0;
        self.last_refresh = None;
    }

    fn initial_sort(&self, header: &HeaderRow) -> SortColumn {
        self.config
            .sort
            .get(&self.kind)
            .and_then(|default| {
                header
                    .index_of(&default.column)
                    .map(|index| SortColumn::new(index, default.ascending))
            })
            .unwrap_or_else(|| SortColumn::new(header.name_col(), true))
    }

    fn push_history(&mut self) {
        self.history.push(ViewMemo {
            kind: self.kind,
            scope: self.scope.clone(),
            filter: self.view.cmd_buff().text().to_string(),
        });
    }

    fn go_back(&mut self) -> AppCommand {
        if self.detail_overlay.take().is_some() {
            self.detail_scroll = 0;
            return AppCommand::None;
        }
        if !self.view.cmd_buff().is_empty() {
            self.view.clear_filter();
            self.status = "Filter cleared".to_string();
            return AppCommand::None;
        }
        let Some(memo) = self.history.pop() else {
            return AppCommand::None;
        };

        self.kind = memo.kind;
        self.scope = memo.scope;
        self.reset_view();
        if !memo.filter.is_empty() {
            self.view.set_filter(memo.filter);
        }
        self.status = format!("Back to {}", self.kind.title());
        self.restart_watch()
    }

    fn selected_namespaced_target(&mut self, action: &str) -> Option<(String, String)> {
        let Some((namespace, name)) = self.view.selected_target() else {
            self.status = format!("No selected resource to {action}");
            return None;
        };
        let Some(namespace) = namespace.or_else(|| match &self.scope {
            NamespaceScope::Named(namespace) => Some(namespace.clone()),
            NamespaceScope::All => None,
        }) else {
            self.status = "Selected resource has no namespace".to_string();
            return None;
        };
        Some((namespace, name))
    }

    fn enter_selected_resource(&mut self) -> AppCommand {
        let Some((namespace, name)) = self.view.selected_target() else {
            self.status = "No resource selected".to_string();
            return AppCommand::None;
        };

        match self.kind {
            ResourceKind::Namespaces => {
                self.push_history();
                self.kind = ResourceKind::Pods;
                self.scope = NamespaceScope::Named(name.clone());
                self.reset_view();
                self.status = format!("Entered namespace '{name}' (pods view)");
                self.restart_watch()
            }
            ResourceKind::Pods => self.prepare_logs(),
            kind if kind.has_pod_selector() => {
                let Some((namespace, name)) = self.selected_namespaced_target("drill into")
                else {
                    return AppCommand::None;
                };
                self.status = format!("Resolving pods for {} {namespace}/{name}", kind.title());
                AppCommand::ResolveSelector {
                    kind,
                    namespace,
                    name,
                }
            }
            kind => AppCommand::Describe {
                kind,
                namespace,
                name,
            },
        }
    }

    fn prepare_describe(&mut self) -> AppCommand {
        let Some((namespace, name)) = self.view.selected_target() else {
            self.status = "No resource selected".to_string();
            return AppCommand::None;
        };
        self.status = format!("Describing {name}");
        AppCommand::Describe {
            kind: self.kind,
            namespace,
            name,
        }
    }

    fn prepare_logs(&mut self) -> AppCommand {
        if self.kind != ResourceKind::Pods {
            self.status = "Logs are available in the Pods view".to_string();
            return AppCommand::None;
        }
        let Some((namespace, pod)) = self.selected_namespaced_target("show logs for") else {
            return AppCommand::None;
        };
        self.status = format!("Loading logs for {namespace}/{pod}");
        AppCommand::LoadLogs { namespace, pod }
    }

    fn prepare_delete_confirmation(&mut self) -> AppCommand {
        let ids = if self.view.has_marks() {
            self.view.marked_ids()
        } else {
            match self.view.selected_item() {
                Some(id) => vec![id.to_string()],
                None => {
                    self.status = "No selected resource to delete".to_string();
                    return AppCommand::None;
                }
            }
        };

        let targets = ids
            .iter()
            .map(|id| {
                let (namespace, name) = split_fqn(id);
                (namespace.map(str::to_string), name.to_string())
            })
            .collect::<Vec<_>>();
        let prompt = match ids.as_slice() {
            [id] => format!("Delete {} {id}", self.kind.title()),
            _ => format!("Delete {} marked {}", ids.len(), self.kind.title()),
        };

        self.pending_confirmation = Some(PendingConfirmation {
            prompt: prompt.clone(),
            command: AppCommand::Delete {
                kind: self.kind,
                targets,
            },
        });
        self.status = format!("{prompt}? [y/n]");
        AppCommand::None
    }

    fn prepare_rollback_confirmation(&mut self) -> AppCommand {
        if self.kind != ResourceKind::ReplicaSets {
            self.status = "Rollback is available in the ReplicaSets view".to_string();
            return AppCommand::None;
        }
        let Some((namespace, name)) = self.selected_namespaced_target("roll back to") else {
            return AppCommand::None;
        };

        let prompt = format!("Roll back to ReplicaSet {namespace}/{name}");
        self.pending_confirmation = Some(PendingConfirmation {
            prompt: prompt.clone(),
            command: AppCommand::Rollback { namespace, name },
        });
        self.status = format!("{prompt}? [y/n]");
        AppCommand::None
    }

    fn prepare_port_forward(&mut self, local_port: u16, remote_port: u16) -> AppCommand {
        if !matches!(self.kind, ResourceKind::Pods | ResourceKind::Services) {
            self.status = "Port-forward is available for Pods and Services".to_string();
            return AppCommand::None;
        }
        let Some((namespace, name)) = self.selected_namespaced_target("port-forward") else {
            return AppCommand::None;
        };

        self.status = format!(
            "Starting port-forward {} {namespace}/{name} {local_port}:{remote_port}",
            self.kind.title()
        );
        AppCommand::StartPortForward {
            kind: self.kind,
            namespace,
            name,
            local_port,
            remote_port,
        }
    }
}

fn parse_port_mapping(mapping: &str) -> Option<(u16, u16)> {
    let mut parts = mapping.split(':');
    let local = parts.next()?.parse::<u16>().ok()?;
    let remote = parts.next()?.parse::<u16>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((local, remote))
}

fn summarize_error_line(error: &str) -> String {
    error
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}

fn normalize_status_text(status: String) -> String {
    const MAX_STATUS_LEN: usize = 180;
    if status.chars().count() <= MAX_STATUS_LEN {
        return status;
    }

    let mut shortened = status
        .chars()
        .take(MAX_STATUS_LEN.saturating_sub(1))
        .collect::<String>();
    shortened.push('…');
    shortened
}

#[cfg(test)]
mod tests {
    use super::{App, AppCommand, InputMode, parse_port_mapping};
    use crate::config::{SkiffConfig, SortDefault};
    use crate::input::Action;
    use crate::model::{NamespaceScope, ResourceKind};
    use crate::render::Registry;
    use crate::table::{Row, TableData};

    fn default_scope() -> NamespaceScope {
        NamespaceScope::Named("default".to_string())
    }

    fn app_with(kind: ResourceKind, config: SkiffConfig) -> App {
        App::new(kind, default_scope(), Registry::builtin(), config)
    }

    fn app() -> App {
        app_with(ResourceKind::Pods, SkiffConfig::default())
    }

    fn type_command(app: &mut App, command: &str) -> AppCommand {
        app.apply_action(Action::StartCommand);
        for c in command.chars() {
            app.apply_action(Action::InputChar(c));
        }
        app.apply_action(Action::SubmitInput)
    }

    /// Snapshot for the active kind with one row per `name`; every column
    /// after NAME is filled with `fill`.
    fn snapshot(app: &App, names: &[(&str, &str)]) -> TableData {
        let header = Registry::builtin().get(app.kind()).header(app.scope());
        let mut data = TableData::new(app.scope().clone(), header.clone());
        for (name, fill) in names {
            let mut fields = vec![fill.to_string(); header.len()];
            fields[header.name_col()] = name.to_string();
            let id = match app.scope() {
                NamespaceScope::Named(ns) if app.kind().namespaced() => format!("{ns}/{name}"),
                _ => name.to_string(),
            };
            let mut row = Row::new(id, fields);
            row.labels.insert("app".to_string(), name.to_string());
            data.push(row).expect("row arity");
        }
        data
    }

    fn load(app: &mut App, names: &[(&str, &str)]) {
        let data = snapshot(app, names);
        let kind = app.kind();
        let scope = app.scope().clone();
        assert!(app.apply_snapshot(kind, &scope, data, 0));
    }

    #[test]
    fn kind_command_switches_kind_and_restarts_watch() {
        let mut app = app();
        let cmd = type_command(&mut app, "deploy");
        assert_eq!(
            cmd,
            AppCommand::RestartWatch {
                kind: ResourceKind::Deployments,
                scope: default_scope(),
            }
        );
        assert_eq!(app.view().title(), "Deployments(default)[0]");
        assert_eq!(app.mode(), InputMode::Normal);
    }

    #[test]
    fn ns_command_changes_scope() {
        let mut app = app();
        let cmd = type_command(&mut app, "ns kube-system");
        assert_eq!(
            cmd,
            AppCommand::RestartWatch {
                kind: ResourceKind::Pods,
                scope: NamespaceScope::Named("kube-system".to_string()),
            }
        );

        let cmd = type_command(&mut app, "ns all");
        assert_eq!(
            cmd,
            AppCommand::RestartWatch {
                kind: ResourceKind::Pods,
                scope: NamespaceScope::All,
            }
        );
    }

    #[test]
    fn ns_without_arg_switches_to_namespaces_kind() {
        let mut app = app();
        type_command(&mut app, "ns");
        assert_eq!(app.kind(), ResourceKind::Namespaces);
    }

    #[test]
    fn kind_token_with_scope_argument_sets_both() {
        let mut app = app();
        let cmd = type_command(&mut app, "svc -A");
        assert_eq!(
            cmd,
            AppCommand::RestartWatch {
                kind: ResourceKind::Services,
                scope: NamespaceScope::All,
            }
        );
    }

    #[test]
    fn config_aliases_resolve_kinds() {
        let config =
            SkiffConfig::from_yaml("aliases:\n  work: deploy\n", None).expect("config parses");
        let mut app = app_with(ResourceKind::Pods, config);
        type_command(&mut app, "work");
        assert_eq!(app.kind(), ResourceKind::Deployments);

        let cmd = type_command(&mut app, "bogus");
        assert_eq!(cmd, AppCommand::None);
        assert!(app.status().contains("Unknown command"));
    }

    #[test]
    fn stale_snapshots_are_ignored() {
        let mut app = app();
        let data = snapshot(&app, &[("web", "1")]);
        let scope = app.scope().clone();
        assert!(!app.apply_snapshot(ResourceKind::Services, &scope, data.clone(), 0));
        assert!(!app.apply_snapshot(ResourceKind::Pods, &NamespaceScope::All, data, 0));
        assert_eq!(app.view().row_count(), 0);

        load(&mut app, &[("web", "1")]);
        assert_eq!(app.view().row_count(), 1);
        assert!(app.last_refresh().is_some());
    }

    #[test]
    fn render_failures_reach_the_status_line() {
        let mut app = app();
        let data = snapshot(&app, &[("web", "1")]);
        let scope = app.scope().clone();
        app.apply_snapshot(ResourceKind::Pods, &scope, data, 2);
        assert_eq!(app.render_failures(), 2);
        assert_eq!(app.status(), "2 Pods could not be rendered");
    }

    #[test]
    fn delete_uses_marks_and_waits_for_confirmation() {
        let mut app = app();
        load(&mut app, &[("a", "1"), ("b", "1"), ("c", "1")]);
        app.apply_action(Action::Top);
        app.apply_action(Action::ToggleMark);
        app.apply_action(Action::ToggleMark);

        assert_eq!(app.apply_action(Action::Delete), AppCommand::None);
        assert_eq!(app.pending_confirmation_prompt(), Some("Delete 2 marked Pods"));

        assert_eq!(app.apply_action(Action::Down), AppCommand::None);
        assert!(app.status().starts_with("Pending confirmation"));

        let cmd = app.apply_action(Action::ConfirmYes);
        assert_eq!(
            cmd,
            AppCommand::Delete {
                kind: ResourceKind::Pods,
                targets: vec![
                    (Some("default".to_string()), "a".to_string()),
                    (Some("default".to_string()), "b".to_string()),
                ],
            }
        );
    }

    #[test]
    fn declined_delete_is_cancelled() {
        let mut app = app();
        load(&mut app, &[("a", "1")]);
        app.apply_action(Action::Top);
        app.apply_action(Action::Delete);
        assert_eq!(app.apply_action(Action::ConfirmNo), AppCommand::None);
        assert_eq!(app.status(), "Action cancelled");
        assert!(app.pending_confirmation_prompt().is_none());
    }

    #[test]
    fn filter_mode_narrows_rows_and_escape_clears() {
        let mut app = app();
        load(&mut app, &[("web", "1"), ("db", "1")]);

        app.apply_action(Action::StartFilter);
        assert_eq!(app.mode(), InputMode::Filter);
        for c in "web".chars() {
            app.apply_action(Action::InputChar(c));
        }
        assert_eq!(app.view().row_count(), 1);

        app.apply_action(Action::SubmitInput);
        assert_eq!(app.mode(), InputMode::Normal);
        assert_eq!(app.view().title(), "Pods(default)[1] </web>");

        app.apply_action(Action::Back);
        assert_eq!(app.view().row_count(), 2);
    }

    #[test]
    fn invalid_filter_is_reported_and_dropped_on_submit() {
        let mut app = app();
        load(&mut app, &[("web", "1"), ("db", "1")]);

        app.apply_action(Action::StartFilter);
        app.apply_action(Action::InputChar('('));
        assert!(app.status().starts_with("Invalid filter"));
        assert_eq!(app.view().row_count(), 2);

        app.apply_action(Action::SubmitInput);
        assert!(app.status().starts_with("Invalid filter dropped"));
        assert!(app.view().cmd_buff().is_empty());
    }

    #[test]
    fn enter_on_namespace_opens_its_pods_and_esc_returns() {
        let mut app = app_with(ResourceKind::Namespaces, SkiffConfig::default());
        load(&mut app, &[("shop", "Active")]);
        app.apply_action(Action::Top);

        let cmd = app.apply_action(Action::EnterResource);
        assert_eq!(
            cmd,
            AppCommand::RestartWatch {
                kind: ResourceKind::Pods,
                scope: NamespaceScope::Named("shop".to_string()),
            }
        );

        let cmd = app.apply_action(Action::Back);
        assert_eq!(
            cmd,
            AppCommand::RestartWatch {
                kind: ResourceKind::Namespaces,
                scope: default_scope(),
            }
        );
    }

    #[test]
    fn enter_on_workload_resolves_selector_then_filters_pods() {
        let mut app = app_with(ResourceKind::Deployments, SkiffConfig::default());
        load(&mut app, &[("web", "1/1")]);
        app.apply_action(Action::Top);

        let cmd = app.apply_action(Action::EnterResource);
        assert_eq!(
            cmd,
            AppCommand::ResolveSelector {
                kind: ResourceKind::Deployments,
                namespace: "default".to_string(),
                name: "web".to_string(),
            }
        );

        let cmd = app.open_pods_with_selector("default".to_string(), "app=web".to_string());
        assert_eq!(
            cmd,
            AppCommand::RestartWatch {
                kind: ResourceKind::Pods,
                scope: default_scope(),
            }
        );
        assert_eq!(app.view().cmd_buff().text(), "-l app=web");

        load(&mut app, &[("web", "Running"), ("db", "Running")]);
        assert_eq!(app.view().row_count(), 1);
    }

    #[test]
    fn rollback_is_limited_to_replicasets() {
        let mut app = app();
        load(&mut app, &[("web", "1")]);
        app.apply_action(Action::Top);
        assert_eq!(app.apply_action(Action::Rollback), AppCommand::None);
        assert!(app.pending_confirmation_prompt().is_none());

        let mut app = app_with(ResourceKind::ReplicaSets, SkiffConfig::default());
        load(&mut app, &[("web-5d9c", "1")]);
        app.apply_action(Action::Top);
        app.apply_action(Action::Rollback);
        let cmd = app.apply_action(Action::ConfirmYes);
        assert_eq!(
            cmd,
            AppCommand::Rollback {
                namespace: "default".to_string(),
                name: "web-5d9c".to_string(),
            }
        );
    }

    #[test]
    fn port_forward_command_targets_selected_pod() {
        let mut app = app();
        load(&mut app, &[("web", "1")]);
        app.apply_action(Action::Top);

        let cmd = type_command(&mut app, "pf 8080:80");
        assert_eq!(
            cmd,
            AppCommand::StartPortForward {
                kind: ResourceKind::Pods,
                namespace: "default".to_string(),
                name: "web".to_string(),
                local_port: 8080,
                remote_port: 80,
            }
        );
        assert_eq!(parse_port_mapping("8080"), None);
        assert_eq!(parse_port_mapping("1:2:3"), None);
    }

    #[test]
    fn configured_sort_default_applies_on_kind_switch() {
        let mut config = SkiffConfig::default();
        config.sort.insert(
            ResourceKind::Pods,
            SortDefault {
                column: "RESTARTS".to_string(),
                ascending: false,
            },
        );
        let app = app_with(ResourceKind::Pods, config);
        let sort = app.view().sort_column();
        assert_eq!(sort.index, 3);
        assert!(!sort.asc);
    }

    #[test]
    fn g_prefix_jumps_to_top() {
        let mut app = app();
        load(&mut app, &[("a", "1"), ("b", "1"), ("c", "1")]);
        app.apply_action(Action::Bottom);
        assert_eq!(app.view().selected_index(), Some(2));
        app.apply_action(Action::GPrefix);
        app.apply_action(Action::GPrefix);
        assert_eq!(app.view().selected_index(), Some(0));
    }
}
