mod app;
mod cli;
mod config;
mod filter;
mod input;
mod k8s;
mod model;
mod render;
mod sort;
mod table;
mod ui;
mod view;

use anyhow::{Context, Result, bail};
use app::{App, AppCommand, PortForwardSession};
use clap::Parser;
use cli::CliArgs;
use config::{RuntimeConfigWatcher, SkiffConfig};
use crossterm::event::{
    Event, EventStream, KeyEventKind, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use futures::StreamExt;
use k8s::{KubeGateway, PortForwardExit, UiEvent, WatchWorker};
use model::{NamespaceScope, ResourceKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use render::Registry;
use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter, args.log_file.as_deref())?;

    let mut config_watcher = RuntimeConfigWatcher::discover(args.config.clone());
    let (config, config_error) = match config_watcher.load_current() {
        Ok(config) => (config, None),
        Err(error) => {
            warn!(error = %format!("{error:#}"), "config rejected, using defaults");
            (SkiffConfig::default(), Some(error))
        }
    };

    let Some(kind) = config.resolve_kind(&args.resource) else {
        bail!("unknown resource '{}'", args.resource);
    };

    let gateway = KubeGateway::new().await?;
    let scope = resolve_namespace_scope(&args, &gateway);
    if args.all_namespaces && args.namespace.is_some() {
        warn!("both --all-namespaces and --namespace were provided, using all namespaces");
    }

    let registry = Registry::builtin();
    let mut app = App::new(kind, scope, registry.clone(), config);
    app.set_context(gateway.context());
    if let Some(error) = config_error {
        app.set_error_status("Config error", &compact_error(&error));
    }

    let (tx, events) = mpsc::unbounded_channel();
    let runtime = Runtime::new(
        gateway,
        registry,
        Duration::from_millis(args.refresh_ms),
        tx,
    );
    run(&mut app, runtime, events, &mut config_watcher).await
}

fn init_tracing(level_filter: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    // The terminal belongs to the table; logs only go to an explicit file.
    let writer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(io::sink),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .compact()
        .with_writer(writer)
        .try_init();

    Ok(())
}

fn resolve_namespace_scope(args: &CliArgs, gateway: &KubeGateway) -> NamespaceScope {
    if args.all_namespaces {
        NamespaceScope::All
    } else if let Some(namespace) = &args.namespace {
        NamespaceScope::Named(namespace.clone())
    } else {
        NamespaceScope::Named(gateway.default_namespace().to_string())
    }
}

/// Owns the Kubernetes side of the loop: the active watch worker and any
/// port-forward waiters.
struct Runtime {
    gateway: KubeGateway,
    registry: Registry,
    refresh: Duration,
    tx: mpsc::UnboundedSender<UiEvent>,
    worker: Option<WatchWorker>,
    port_forwards: Vec<JoinHandle<()>>,
}

impl Runtime {
    fn new(
        gateway: KubeGateway,
        registry: Registry,
        refresh: Duration,
        tx: mpsc::UnboundedSender<UiEvent>,
    ) -> Self {
        Self {
            gateway,
            registry,
            refresh,
            tx,
            worker: None,
            port_forwards: Vec::new(),
        }
    }

    fn restart_watch(&mut self, kind: ResourceKind, scope: NamespaceScope) {
        if let Some(worker) = self.worker.take() {
            debug!(kind = %worker.kind, scope = %worker.scope, "stopping watch");
            worker.abort();
        }
        info!(kind = %kind, scope = %scope, "starting watch");
        self.worker = Some(self.gateway.spawn_watch(
            self.registry.clone(),
            kind,
            scope,
            self.refresh,
            self.tx.clone(),
        ));
    }

    fn is_current(&self, kind: ResourceKind, scope: &NamespaceScope) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| worker.kind == kind && &worker.scope == scope)
    }

    /// Runs one command. Selector lookups feed back into the app, which may
    /// hand back a follow-up command.
    async fn execute(&mut self, app: &mut App, command: AppCommand) {
        let mut next = command;
        loop {
            next = match next {
                AppCommand::None => return,
                AppCommand::RestartWatch { kind, scope } => {
                    self.restart_watch(kind, scope);
                    return;
                }
                AppCommand::Describe {
                    kind,
                    namespace,
                    name,
                } => {
                    let target = model::fqn(namespace.as_deref(), &name);
                    match self.gateway.describe(kind, namespace.as_deref(), &name).await {
                        Ok(yaml) => {
                            app.set_detail_overlay(format!("Describe {} {target}", kind.title()), yaml);
                            app.set_status(format!("Describing {target}"));
                        }
                        Err(error) => {
                            app.set_error_status(&format!("Describe failed for {target}"), &compact_error(&error));
                        }
                    }
                    return;
                }
                AppCommand::Delete { kind, targets } => {
                    let mut deleted = 0usize;
                    let mut failures = Vec::new();
                    for (namespace, name) in &targets {
                        match self.gateway.delete(kind, namespace.as_deref(), name).await {
                            Ok(()) => deleted += 1,
                            Err(error) => {
                                warn!(kind = %kind, name = %name, error = %format!("{error:#}"), "delete failed");
                                failures.push(compact_error(&error));
                            }
                        }
                    }
                    info!(kind = %kind, deleted, failed = failures.len(), "delete finished");
                    match failures.first() {
                        None => app.set_status(format!("Deleted {deleted} {}", kind.title())),
                        Some(first) => app.set_error_status(
                            &format!(
                                "Deleted {deleted}, {} failed for {}",
                                failures.len(),
                                kind.title()
                            ),
                            first,
                        ),
                    }
                    return;
                }
                AppCommand::Rollback { namespace, name } => {
                    match self.gateway.rollback(&namespace, &name).await {
                        Ok(message) => {
                            info!(namespace = %namespace, replica_set = %name, "rollback applied");
                            app.set_status(message);
                        }
                        Err(error) => app.set_error_status(
                            &format!("Rollback failed for {namespace}/{name}"),
                            &compact_error(&error),
                        ),
                    }
                    return;
                }
                AppCommand::LoadLogs { namespace, pod } => {
                    match self.gateway.fetch_pod_logs(&namespace, &pod).await {
                        Ok(logs) => {
                            app.set_detail_overlay(format!("Logs {namespace}/{pod}"), logs);
                            app.set_status(format!("Loaded logs for {namespace}/{pod}"));
                        }
                        Err(error) => app.set_error_status(
                            &format!("Failed loading logs for {namespace}/{pod}"),
                            &compact_error(&error),
                        ),
                    }
                    return;
                }
                AppCommand::StartPortForward {
                    kind,
                    namespace,
                    name,
                    local_port,
                    remote_port,
                } => {
                    self.start_port_forward(app, kind, namespace, name, local_port, remote_port)
                        .await;
                    return;
                }
                AppCommand::ResolveSelector {
                    kind,
                    namespace,
                    name,
                } => match self.gateway.pod_selector(kind, &namespace, &name).await {
                    Ok(selector) => app.open_pods_with_selector(namespace, selector),
                    Err(error) => {
                        app.set_error_status(
                            &format!("No pods for {} {namespace}/{name}", kind.title()),
                            &compact_error(&error),
                        );
                        return;
                    }
                },
            };
        }
    }

    async fn start_port_forward(
        &mut self,
        app: &mut App,
        kind: ResourceKind,
        namespace: String,
        name: String,
        local_port: u16,
        remote_port: u16,
    ) {
        match k8s::run_kubectl_port_forward(kind, &namespace, &name, local_port, remote_port).await
        {
            Ok((pid, child)) => {
                app.register_port_forward(PortForwardSession {
                    kind,
                    namespace: namespace.clone(),
                    name: name.clone(),
                    local_port,
                    remote_port,
                    pid,
                });
                app.set_status(format!(
                    "Port-forward started ({namespace}/{name}) {local_port}:{remote_port} pid={pid}"
                ));
                let exit = PortForwardExit {
                    pid,
                    kind,
                    namespace,
                    name,
                    local_port,
                    remote_port,
                    result: Err("still running".to_string()),
                };
                self.port_forwards.retain(|handle| !handle.is_finished());
                self.port_forwards
                    .push(k8s::watch_port_forward(child, exit, self.tx.clone()));
            }
            Err(error) => app.set_error_status(
                &format!("Port-forward failed for {} {namespace}/{name}", kind.title()),
                &compact_error(&error),
            ),
        }
    }

    fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        // Aborting the waiter drops the child, which kills kubectl.
        for handle in self.port_forwards.drain(..) {
            handle.abort();
        }
    }
}

fn handle_ui_event(app: &mut App, runtime: &Runtime, event: UiEvent) {
    match event {
        UiEvent::Snapshot {
            kind,
            scope,
            data,
            failures,
        } => {
            if !app.apply_snapshot(kind, &scope, data, failures) {
                debug!(kind = %kind, scope = %scope, "dropping stale snapshot");
            }
        }
        UiEvent::WatchError {
            kind,
            scope,
            message,
        } => {
            if kind == app.kind() && &scope == app.scope() && runtime.is_current(kind, &scope) {
                app.set_error_status(&format!("Watch error for {}", kind.title()), &message);
            }
        }
        UiEvent::PortForwardExit(event) => {
            let removed = app.remove_port_forward_by_pid(event.pid);
            let target = format!(
                "{} {}/{} {}:{}",
                event.kind.title(),
                event.namespace,
                event.name,
                event.local_port,
                event.remote_port
            );
            match event.result {
                Ok(status) if status.success() => {
                    if removed.is_some() {
                        app.set_status(format!("Port-forward closed: {target}"));
                    }
                }
                Ok(status) => {
                    app.set_status(format!("Port-forward exited ({status}) for {target}"));
                }
                Err(error) => {
                    app.set_status(format!("Port-forward failed for {target}: {error}"));
                }
            }
        }
    }
}

async fn run(
    app: &mut App,
    mut runtime: Runtime,
    mut events: mpsc::UnboundedReceiver<UiEvent>,
    config_watcher: &mut RuntimeConfigWatcher,
) -> Result<()> {
    let (mut terminal, keyboard_enhanced) = init_terminal()?;
    let run_result = run_loop(&mut terminal, app, &mut runtime, &mut events, config_watcher).await;
    runtime.shutdown();
    let restore_result = restore_terminal(&mut terminal, keyboard_enhanced);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<(TuiTerminal, bool)> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if keyboard_enhanced {
        execute!(
            stdout,
            EnterAlternateScreen,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_ALTERNATE_KEYS
            )
        )
        .context("failed to enter alternate screen with keyboard enhancement")?;
    } else {
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok((terminal, keyboard_enhanced))
}

fn restore_terminal(terminal: &mut TuiTerminal, keyboard_enhanced: bool) -> Result<()> {
    if keyboard_enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("failed to pop keyboard enhancement flags")?;
    }
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

async fn run_loop(
    terminal: &mut TuiTerminal,
    app: &mut App,
    runtime: &mut Runtime,
    events: &mut mpsc::UnboundedReceiver<UiEvent>,
    config_watcher: &mut RuntimeConfigWatcher,
) -> Result<()> {
    runtime.restart_watch(app.kind(), app.scope().clone());

    let mut reader = EventStream::new();
    let mut config_ticker = interval(runtime.refresh);
    config_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        terminal
            .draw(|frame| ui::render(frame, app))
            .context("failed to render terminal frame")?;

        if !app.running() {
            break;
        }

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = input::map_key(app.mode(), key) {
                            debug!("action={action:?}");
                            let command = app.apply_action(action);
                            if command != AppCommand::None {
                                terminal
                                    .draw(|frame| ui::render(frame, app))
                                    .context("failed to render terminal frame")?;
                                runtime.execute(app, command).await;
                            }
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        app.set_status(format!("terminal event error: {error}"));
                    }
                    None => {
                        app.set_status("terminal event stream closed");
                        break;
                    }
                }
            }
            _ = config_ticker.tick() => {
                match config_watcher.reload_if_changed() {
                    Ok(Some(config)) => {
                        info!(source = ?config.source, "config reloaded");
                        app.apply_config(config);
                    }
                    Ok(None) => {}
                    Err(error) => {
                        warn!(error = %format!("{error:#}"), "config reload rejected");
                        app.set_error_status("Config error", &compact_error(&error));
                    }
                }
            }
            maybe_event = events.recv() => {
                if let Some(event) = maybe_event {
                    handle_ui_event(app, runtime, event);
                }
            }
        }
    }

    Ok(())
}

fn compact_error(error: &anyhow::Error) -> String {
    let mut out = Vec::new();
    for (index, cause) in error.chain().enumerate() {
        if index == 0 {
            out.push(cause.to_string());
        } else if index <= 2 {
            out.push(format!("caused by: {cause}"));
        } else {
            break;
        }
    }

    // The status line shows a single line.
    out.join("; ")
}
