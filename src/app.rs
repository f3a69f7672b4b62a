use chrono::Local;
use std::path::PathBuf;
use tracing::debug;

use crate::bridge::{self, CaptureOutcome};
use crate::cluster::ClusterError;
use crate::input::Action;
use crate::kinds::{Operation, ResourceKind};
use crate::model::{Row, TableData};
use crate::poll::{FetchRequest, PollCoordinator};
use crate::worker::{ContainerPurpose, Job, WorkerEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Menu,
    Confirm,
    Login,
    Rescale,
    Report,
    Waiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Server,
    Username,
    Password,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    Operation(Operation),
    Namespace(String),
    Container {
        namespace: String,
        pod: String,
        name: String,
        purpose: ContainerPurpose,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub label: String,
    pub action: MenuAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    DeleteOne {
        resource_type: String,
        name: String,
    },
    DeleteAll {
        kind: ResourceKind,
    },
    Insecure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    None,
    Menu {
        title: String,
        items: Vec<MenuItem>,
        selected: usize,
        search: String,
    },
    Confirm {
        title: String,
        message: String,
        action: ConfirmAction,
    },
    Login {
        server: String,
        username: String,
        password: String,
        field: LoginField,
    },
    Rescale {
        resource_type: String,
        name: String,
        input: String,
    },
    Report {
        title: String,
        detail: String,
    },
    Notice {
        message: String,
    },
}

/// Effects the interaction loop executes on the app's behalf: background
/// jobs for the worker queue, an interactive subprocess taking over the
/// terminal, or a process exit.
#[derive(Debug, PartialEq)]
pub enum AppCommand {
    None,
    Fatal { code: i32 },
    Dispatch(Vec<Job>),
    RunInteractive { argv: Vec<String> },
    PageFile { path: PathBuf },
}

impl AppCommand {
    fn jobs(jobs: Vec<Job>) -> Self {
        if jobs.is_empty() {
            Self::None
        } else {
            Self::Dispatch(jobs)
        }
    }
}

/// All display state. Owned by the interaction loop; worker results arrive
/// only through the handle_* methods below.
pub struct App {
    running: bool,
    poll: PollCoordinator,
    table: TableData,
    status: String,
    waiting: Option<String>,
    modal: Modal,
    server: String,
    username: String,
    oc: String,
    relist_namespaces_after_login: bool,
    last_backup: Option<PathBuf>,
}

impl App {
    pub fn new(oc: String, server: String, username: String, namespace: String) -> Self {
        let kind = ResourceKind::Pods;
        let mut table = TableData::default();
        table.reset_schema(kind.columns());
        Self {
            running: true,
            poll: PollCoordinator::new(kind, namespace),
            table,
            status: "Ready".to_string(),
            waiting: None,
            modal: Modal::None,
            server,
            username,
            oc,
            relist_namespaces_after_login: false,
            last_backup: None,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn kind(&self) -> &ResourceKind {
        self.poll.kind()
    }

    pub fn namespace(&self) -> &str {
        self.poll.namespace()
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn table(&self) -> &TableData {
        &self.table
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn waiting(&self) -> Option<&str> {
        self.waiting.as_deref()
    }

    pub fn modal(&self) -> &Modal {
        &self.modal
    }

    pub fn last_backup(&self) -> Option<&PathBuf> {
        self.last_backup.as_ref()
    }

    /// An empty table after at least one applied refresh renders as the
    /// "no resources" placeholder instead of bare headers.
    pub fn shows_placeholder(&self) -> bool {
        self.table.rows.is_empty() && self.table.last_refreshed.is_some()
    }

    pub fn placeholder_text(&self) -> String {
        format!(
            "No {} in namespace {}",
            self.kind().resource_type(None),
            self.namespace()
        )
    }

    /// The dashboard is the foreground focus only while no overlay owns the
    /// screen; the poll stream is gated on this.
    pub fn foreground(&self) -> bool {
        matches!(self.modal, Modal::None) && self.waiting.is_none()
    }

    pub fn mode(&self) -> InputMode {
        if self.waiting.is_some() {
            return InputMode::Waiting;
        }
        match self.modal {
            Modal::None => InputMode::Normal,
            Modal::Menu { .. } => InputMode::Menu,
            Modal::Confirm { .. } => InputMode::Confirm,
            Modal::Login { .. } => InputMode::Login,
            Modal::Rescale { .. } => InputMode::Rescale,
            Modal::Report { .. } | Modal::Notice { .. } => InputMode::Report,
        }
    }

    /// Poll timer fired. At most one fetch goes out, and none while an
    /// overlay is up or another fetch is outstanding.
    pub fn on_tick(&mut self) -> Option<Job> {
        let foreground = self.foreground();
        self.poll.on_tick(foreground).map(Job::Fetch)
    }

    pub fn apply_action(&mut self, action: Action) -> AppCommand {
        match self.mode() {
            InputMode::Normal => self.apply_normal_action(action),
            InputMode::Menu => self.apply_menu_action(action),
            InputMode::Confirm => self.apply_confirm_action(action),
            InputMode::Login => self.apply_login_action(action),
            InputMode::Rescale => self.apply_rescale_action(action),
            InputMode::Report => self.apply_report_action(action),
            InputMode::Waiting => AppCommand::None,
        }
    }

    fn apply_normal_action(&mut self, action: Action) -> AppCommand {
        match action {
            Action::Quit => {
                self.running = false;
                AppCommand::None
            }
            Action::Down => {
                if self.table.selected + 1 < self.table.rows.len() {
                    self.table.selected += 1;
                }
                AppCommand::None
            }
            Action::Up => {
                self.table.selected = self.table.selected.saturating_sub(1);
                AppCommand::None
            }
            Action::PageDown => {
                self.table.selected = (self.table.selected + 10)
                    .min(self.table.rows.len().saturating_sub(1));
                AppCommand::None
            }
            Action::PageUp => {
                self.table.selected = self.table.selected.saturating_sub(10);
                AppCommand::None
            }
            Action::Top => {
                self.table.selected = 0;
                AppCommand::None
            }
            Action::Bottom => {
                self.table.selected = self.table.rows.len().saturating_sub(1);
                AppCommand::None
            }
            Action::SwitchKind(kind) => self.switch_kind(kind),
            Action::OpenNamespaces => {
                self.waiting = Some("Please wait for the list of namespaces".to_string());
                AppCommand::Dispatch(vec![Job::ListNamespaces])
            }
            Action::OpenMenu => self.open_operations_menu(),
            Action::ShowYaml => self.run_on_selected(Operation::ShowYaml),
            Action::EditResource => self.run_on_selected(Operation::Edit),
            Action::DeleteRow => self.run_on_selected(Operation::Delete),
            Action::DeleteAllRows => self.confirm_delete_all(),
            Action::Refresh => AppCommand::Dispatch(vec![Job::Fetch(self.poll.refetch())]),
            _ => AppCommand::None,
        }
    }

    fn apply_menu_action(&mut self, action: Action) -> AppCommand {
        let Modal::Menu {
            items,
            selected,
            search,
            ..
        } = &mut self.modal
        else {
            return AppCommand::None;
        };
        match action {
            Action::Down => {
                if *selected + 1 < items.len() {
                    *selected += 1;
                }
                search.clear();
                AppCommand::None
            }
            Action::Up => {
                *selected = selected.saturating_sub(1);
                search.clear();
                AppCommand::None
            }
            Action::InputChar(c) => {
                // Longest-prefix jump, so typing "res" lands on "rescale".
                search.push(c);
                let query = search.clone();
                let best = items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| (common_prefix_len(&item.label, &query), index))
                    .max_by_key(|(length, _)| *length)
                    .filter(|(length, _)| *length > 0);
                if let Some((_, index)) = best {
                    *selected = index;
                }
                AppCommand::None
            }
            Action::MenuAccept => {
                let item = items.get(*selected).cloned();
                self.modal = Modal::None;
                match item {
                    Some(item) => self.run_menu_action(item.action),
                    None => AppCommand::None,
                }
            }
            Action::Cancel => {
                self.modal = Modal::None;
                self.resume_foreground()
            }
            _ => AppCommand::None,
        }
    }

    fn apply_confirm_action(&mut self, action: Action) -> AppCommand {
        match action {
            Action::ConfirmYes => {
                let Modal::Confirm { action, .. } =
                    std::mem::replace(&mut self.modal, Modal::None)
                else {
                    return AppCommand::None;
                };
                self.execute_confirmed(action)
            }
            Action::ConfirmNo | Action::Cancel => {
                let Modal::Confirm { action, .. } =
                    std::mem::replace(&mut self.modal, Modal::None)
                else {
                    return AppCommand::None;
                };
                if action == ConfirmAction::Insecure {
                    // Declining an untrusted certificate is fatal by design.
                    return AppCommand::Fatal { code: 1 };
                }
                self.resume_foreground()
            }
            _ => AppCommand::None,
        }
    }

    fn apply_login_action(&mut self, action: Action) -> AppCommand {
        let Modal::Login {
            server,
            username,
            password,
            field,
        } = &mut self.modal
        else {
            return AppCommand::None;
        };
        match action {
            Action::InputChar(c) => {
                match field {
                    LoginField::Server => server.push(c),
                    LoginField::Username => username.push(c),
                    LoginField::Password => password.push(c),
                }
                AppCommand::None
            }
            Action::Backspace => {
                match field {
                    LoginField::Server => server.pop(),
                    LoginField::Username => username.pop(),
                    LoginField::Password => password.pop(),
                };
                AppCommand::None
            }
            Action::NextField => {
                *field = match field {
                    LoginField::Server => LoginField::Username,
                    LoginField::Username => LoginField::Password,
                    LoginField::Password => LoginField::Server,
                };
                AppCommand::None
            }
            Action::Submit => {
                let job = Job::Login {
                    server: server.clone(),
                    username: username.clone(),
                    password: password.clone(),
                };
                self.modal = Modal::None;
                self.waiting = Some("Logging in...".to_string());
                AppCommand::Dispatch(vec![job])
            }
            // No anonymous fallback: abandoning the login quits the process.
            Action::Cancel => AppCommand::Fatal { code: 0 },
            _ => AppCommand::None,
        }
    }

    fn apply_rescale_action(&mut self, action: Action) -> AppCommand {
        let Modal::Rescale {
            resource_type,
            name,
            input,
        } = &mut self.modal
        else {
            return AppCommand::None;
        };
        match action {
            Action::InputChar(c) if c.is_ascii_digit() => {
                input.push(c);
                AppCommand::None
            }
            Action::Backspace => {
                input.pop();
                AppCommand::None
            }
            Action::Submit => {
                let parsed = input.parse::<i32>();
                let resource_type = resource_type.clone();
                let name = name.clone();
                self.modal = Modal::None;
                match parsed {
                    Ok(replicas) => {
                        self.waiting = Some(format!("Rescaling {name}..."));
                        AppCommand::Dispatch(vec![Job::Scale {
                            resource_type,
                            namespace: self.namespace().to_string(),
                            name,
                            replicas,
                        }])
                    }
                    Err(_) => AppCommand::None,
                }
            }
            Action::Cancel => {
                self.modal = Modal::None;
                AppCommand::None
            }
            _ => AppCommand::None,
        }
    }

    fn apply_report_action(&mut self, action: Action) -> AppCommand {
        match action {
            Action::Cancel | Action::Submit | Action::MenuAccept => {
                self.modal = Modal::None;
                self.resume_foreground()
            }
            _ => AppCommand::None,
        }
    }

    /// The dashboard just became the foreground focus again; one immediate
    /// fetch replaces whatever the overlay made it skip.
    fn resume_foreground(&mut self) -> AppCommand {
        AppCommand::Dispatch(vec![Job::Fetch(self.poll.refetch())])
    }

    fn switch_kind(&mut self, kind: ResourceKind) -> AppCommand {
        self.table.reset_schema(kind.columns());
        let request = self.poll.switch_kind(kind);
        AppCommand::Dispatch(vec![Job::Fetch(request)])
    }

    fn switch_namespace(&mut self, namespace: String) -> AppCommand {
        self.table.reset_schema(self.kind().columns());
        let request = self.poll.switch_namespace(namespace.clone());
        self.set_status(format!("Namespace switched to {namespace}"));
        AppCommand::Dispatch(vec![
            Job::Fetch(request),
            Job::PersistNamespace { namespace },
        ])
    }

    fn open_operations_menu(&mut self) -> AppCommand {
        let Some(row) = self.table.selected_row().cloned() else {
            return AppCommand::None;
        };
        let operations = self.kind().operations(&row);
        if operations.is_empty() {
            return AppCommand::None;
        }
        self.modal = Modal::Menu {
            title: "Select operation".to_string(),
            items: operations
                .into_iter()
                .map(|(label, operation)| MenuItem {
                    label: label.to_string(),
                    action: MenuAction::Operation(operation),
                })
                .collect(),
            selected: 0,
            search: String::new(),
        };
        AppCommand::None
    }

    fn run_menu_action(&mut self, action: MenuAction) -> AppCommand {
        match action {
            MenuAction::Operation(operation) => self.run_on_selected(operation),
            MenuAction::Namespace(namespace) => self.switch_namespace(namespace),
            MenuAction::Container {
                namespace,
                pod,
                name,
                purpose,
            } => self.run_with_container(&namespace, &pod, &name, purpose),
        }
    }

    fn run_on_selected(&mut self, operation: Operation) -> AppCommand {
        let Some(row) = self.table.selected_row().cloned() else {
            return AppCommand::None;
        };
        self.run_operation(operation, &row)
    }

    fn run_operation(&mut self, operation: Operation, row: &Row) -> AppCommand {
        let name = row.name().to_string();
        let resource_type = self.kind().resource_type(Some(row));
        let namespace = self.namespace().to_string();
        match operation {
            Operation::Describe => {
                self.waiting = Some("Downloading...".to_string());
                AppCommand::Dispatch(vec![Job::Capture {
                    argv: bridge::describe_argv(&self.oc, &namespace, &resource_type, &name),
                    prefix: format!("{resource_type}-{name}"),
                    suffix: ".txt".to_string(),
                }])
            }
            Operation::ShowYaml => {
                self.waiting = Some("Downloading...".to_string());
                AppCommand::Dispatch(vec![Job::Capture {
                    argv: bridge::yaml_argv(&self.oc, &namespace, &resource_type, &name),
                    prefix: format!("{resource_type}-{name}"),
                    suffix: ".yaml".to_string(),
                }])
            }
            Operation::Edit => AppCommand::RunInteractive {
                argv: bridge::edit_argv(&self.oc, &namespace, &resource_type, &name),
            },
            Operation::Delete => {
                self.modal = Modal::Confirm {
                    title: "Confirm delete".to_string(),
                    message: format!("Do you really want to delete {resource_type}/{name}"),
                    action: ConfirmAction::DeleteOne {
                        resource_type,
                        name,
                    },
                };
                AppCommand::None
            }
            Operation::Logs => {
                self.waiting = Some("Loading containers...".to_string());
                AppCommand::Dispatch(vec![Job::ResolveContainers {
                    namespace,
                    pod: name,
                    purpose: ContainerPurpose::Logs,
                }])
            }
            Operation::RemoteShell => {
                self.waiting = Some("Loading containers...".to_string());
                AppCommand::Dispatch(vec![Job::ResolveContainers {
                    namespace,
                    pod: name,
                    purpose: ContainerPurpose::Shell,
                }])
            }
            Operation::NodeTop => {
                self.waiting = Some("Resolving node...".to_string());
                AppCommand::Dispatch(vec![Job::ResolvePodNode {
                    namespace,
                    pod: name,
                }])
            }
            Operation::NodeSsh => {
                self.waiting = Some("Resolving host...".to_string());
                AppCommand::Dispatch(vec![Job::ResolveNodeHost { name }])
            }
            Operation::Rescale => {
                self.modal = Modal::Rescale {
                    resource_type,
                    name,
                    input: String::new(),
                };
                AppCommand::None
            }
            Operation::RolloutLatest => {
                self.waiting = Some(format!("Rolling out {name}..."));
                AppCommand::Dispatch(vec![Job::RolloutLatest { namespace, name }])
            }
            Operation::ShowReplicaSets => self.switch_kind(ResourceKind::ReplicaSets {
                owner: name,
            }),
            Operation::ShowReplicationControllers => {
                self.switch_kind(ResourceKind::ReplicationControllers { owner: name })
            }
        }
    }

    fn confirm_delete_all(&mut self) -> AppCommand {
        let kind = self.kind().clone();
        self.modal = Modal::Confirm {
            title: "Delete all?".to_string(),
            message: format!("Really delete all {}?", kind.resource_type(None)),
            action: ConfirmAction::DeleteAll { kind },
        };
        AppCommand::None
    }

    fn execute_confirmed(&mut self, action: ConfirmAction) -> AppCommand {
        match action {
            ConfirmAction::DeleteOne {
                resource_type,
                name,
            } => {
                self.waiting = Some(format!("Deleting {resource_type}/{name}..."));
                AppCommand::Dispatch(vec![Job::DeleteOne {
                    resource_type,
                    namespace: self.namespace().to_string(),
                    name,
                }])
            }
            ConfirmAction::DeleteAll { kind } => {
                self.waiting = Some("Deleting...".to_string());
                AppCommand::Dispatch(vec![Job::DeleteAll {
                    kind,
                    namespace: self.namespace().to_string(),
                }])
            }
            ConfirmAction::Insecure => {
                self.waiting = Some("Reconnecting...".to_string());
                AppCommand::Dispatch(vec![Job::TrustAndRebuild])
            }
        }
    }

    fn open_login(&mut self) {
        self.modal = Modal::Login {
            server: self.server.clone(),
            username: self.username.clone(),
            password: String::new(),
            field: LoginField::Username,
        };
    }

    pub fn open_report(&mut self, title: impl Into<String>, detail: impl Into<String>) {
        self.modal = Modal::Report {
            title: title.into(),
            detail: detail.into(),
        };
    }

    fn open_notice(&mut self, message: impl Into<String>) {
        self.modal = Modal::Notice {
            message: message.into(),
        };
    }

    /// Marshal one worker event into display state. Returns follow-up work
    /// for the interaction loop, exactly like apply_action.
    pub fn handle_event(&mut self, event: WorkerEvent) -> AppCommand {
        match event {
            WorkerEvent::FetchDone { request, result } => self.handle_fetch_done(request, result),
            WorkerEvent::Namespaces(result) => self.handle_namespaces(result),
            WorkerEvent::Captured { outcome } => self.handle_captured(outcome),
            WorkerEvent::ContainersResolved {
                namespace,
                pod,
                purpose,
                result,
            } => self.handle_containers(namespace, pod, purpose, result),
            WorkerEvent::PodNodeResolved { result } => {
                self.waiting = None;
                match result {
                    Ok(Some(node)) => AppCommand::RunInteractive {
                        argv: bridge::ssh_argv(&node, &["-t", "top"]),
                    },
                    Ok(None) => {
                        self.set_status("Pod is not scheduled to a node yet");
                        AppCommand::None
                    }
                    Err(error) => {
                        self.open_report("Error", error.to_string());
                        AppCommand::None
                    }
                }
            }
            WorkerEvent::NodeHostResolved { result } => {
                self.waiting = None;
                match result {
                    Ok(host) => AppCommand::RunInteractive {
                        argv: bridge::ssh_argv(&host, &[]),
                    },
                    Err(error) => {
                        self.open_report("Error", error.to_string());
                        AppCommand::None
                    }
                }
            }
            WorkerEvent::MutationDone { description } => {
                self.waiting = None;
                self.set_status(description);
                AppCommand::Dispatch(vec![Job::Fetch(self.poll.refetch())])
            }
            WorkerEvent::MutationFailed { context, error } => {
                self.waiting = None;
                self.open_report("Error", format!("{context}: {error}"));
                AppCommand::None
            }
            WorkerEvent::LoginComplete { result } => self.handle_login_complete(result),
            WorkerEvent::TrustComplete { result } => self.handle_trust_complete(result),
            WorkerEvent::TokenPersistFailed { detail } => {
                self.open_report("Could not persist token", detail);
                AppCommand::None
            }
            WorkerEvent::NamespacePersistFailed { detail } => {
                self.open_report("Could not persist namespace", detail);
                AppCommand::None
            }
            WorkerEvent::BackupWritten { path } => {
                debug!("deletion backup written to {}", path.display());
                self.last_backup = Some(path);
                AppCommand::None
            }
        }
    }

    fn handle_fetch_done(
        &mut self,
        request: FetchRequest,
        result: Result<crate::model::TableSnapshot, ClusterError>,
    ) -> AppCommand {
        if !self.poll.on_result(request.generation) {
            // The view has moved on; this result is for a generation nobody
            // is looking at anymore.
            debug!(
                "discarding fetch for generation {} (current {})",
                request.generation,
                self.poll.generation()
            );
            return AppCommand::None;
        }
        match result {
            Ok(snapshot) => {
                self.table.apply_snapshot(snapshot, Local::now());
                AppCommand::None
            }
            Err(ClusterError::Unauthorized) => {
                self.poll.park_for_retry(request);
                self.open_login();
                self.set_status("Authentication required");
                AppCommand::None
            }
            Err(ClusterError::TlsUntrusted) => {
                self.poll.park_for_retry(request);
                self.modal = Modal::Confirm {
                    title: "Allow insecure connection?".to_string(),
                    message: "Certificate for the API connection is invalid. \
                              Allow insecure connection?"
                        .to_string(),
                    action: ConfirmAction::Insecure,
                };
                AppCommand::None
            }
            Err(error) => {
                // Previous snapshot stays on screen behind the report.
                self.open_report("Error", error.to_string());
                AppCommand::None
            }
        }
    }

    fn handle_namespaces(&mut self, result: Result<Vec<String>, ClusterError>) -> AppCommand {
        self.waiting = None;
        match result {
            Ok(namespaces) => {
                self.modal = Modal::Menu {
                    title: "Select namespace...".to_string(),
                    items: namespaces
                        .into_iter()
                        .map(|namespace| MenuItem {
                            label: namespace.clone(),
                            action: MenuAction::Namespace(namespace),
                        })
                        .collect(),
                    selected: 0,
                    search: String::new(),
                };
                AppCommand::None
            }
            Err(ClusterError::Unauthorized) => {
                self.relist_namespaces_after_login = true;
                self.open_login();
                AppCommand::None
            }
            Err(ClusterError::TlsUntrusted) => {
                self.modal = Modal::Confirm {
                    title: "Allow insecure connection?".to_string(),
                    message: "Certificate for the API connection is invalid. \
                              Allow insecure connection?"
                        .to_string(),
                    action: ConfirmAction::Insecure,
                };
                AppCommand::None
            }
            // A failed namespace listing outside the poll path is fatal.
            Err(_) => AppCommand::Fatal { code: 1 },
        }
    }

    fn handle_captured(&mut self, outcome: anyhow::Result<CaptureOutcome>) -> AppCommand {
        self.waiting = None;
        match outcome {
            Ok(CaptureOutcome::Ready(path)) => AppCommand::PageFile { path },
            Ok(CaptureOutcome::Failed(code)) => {
                self.open_notice(format!("Process has exited with status {code}"));
                AppCommand::None
            }
            Err(error) => {
                self.open_report("Error", format!("{error:#}"));
                AppCommand::None
            }
        }
    }

    fn handle_containers(
        &mut self,
        namespace: String,
        pod: String,
        purpose: ContainerPurpose,
        result: Result<Vec<String>, ClusterError>,
    ) -> AppCommand {
        self.waiting = None;
        let mut containers = match result {
            Ok(containers) => containers,
            Err(error) => {
                self.open_report("Error", error.to_string());
                return AppCommand::None;
            }
        };
        match containers.len() {
            0 => {
                self.set_status(format!("Pod {pod} has no containers yet"));
                AppCommand::None
            }
            // A single container is chosen without prompting.
            1 => {
                let only = containers.remove(0);
                self.run_with_container(&namespace, &pod, &only, purpose)
            }
            _ => {
                self.modal = Modal::Menu {
                    title: "Select container".to_string(),
                    items: containers
                        .into_iter()
                        .map(|name| MenuItem {
                            label: name.clone(),
                            action: MenuAction::Container {
                                namespace: namespace.clone(),
                                pod: pod.clone(),
                                name,
                                purpose,
                            },
                        })
                        .collect(),
                    selected: 0,
                    search: String::new(),
                };
                AppCommand::None
            }
        }
    }

    fn run_with_container(
        &mut self,
        namespace: &str,
        pod: &str,
        container: &str,
        purpose: ContainerPurpose,
    ) -> AppCommand {
        match purpose {
            ContainerPurpose::Logs => {
                self.waiting = Some("Downloading...".to_string());
                AppCommand::Dispatch(vec![Job::Capture {
                    argv: bridge::logs_argv(&self.oc, namespace, container, pod),
                    prefix: format!("logs-{pod}"),
                    suffix: ".log".to_string(),
                }])
            }
            ContainerPurpose::Shell => AppCommand::RunInteractive {
                argv: bridge::rsh_argv(&self.oc, namespace, container, pod),
            },
        }
    }

    fn handle_login_complete(&mut self, result: Result<(), String>) -> AppCommand {
        self.waiting = None;
        match result {
            Ok(()) => {
                self.set_status("Logged in");
                let mut jobs = Vec::new();
                if let Some(retry) = self.poll.take_retry() {
                    jobs.push(Job::Fetch(retry));
                }
                if std::mem::take(&mut self.relist_namespaces_after_login) {
                    self.waiting = Some("Please wait for the list of namespaces".to_string());
                    jobs.push(Job::ListNamespaces);
                }
                AppCommand::jobs(jobs)
            }
            Err(detail) => {
                self.open_report("Login failed", detail);
                AppCommand::None
            }
        }
    }

    fn handle_trust_complete(&mut self, result: Result<(), String>) -> AppCommand {
        self.waiting = None;
        match result {
            Ok(()) => {
                self.set_status("Insecure connection allowed");
                match self.poll.take_retry() {
                    Some(retry) => AppCommand::Dispatch(vec![Job::Fetch(retry)]),
                    None => AppCommand::Dispatch(vec![Job::Fetch(self.poll.refetch())]),
                }
            }
            Err(detail) => {
                self.open_report("Reconnect failed", detail);
                AppCommand::None
            }
        }
    }

    /// Outcome of an interactive subprocess after the terminal came back.
    pub fn after_interactive(&mut self, result: anyhow::Result<std::process::ExitStatus>) -> AppCommand {
        match result {
            Ok(status) if status.success() => {
                AppCommand::Dispatch(vec![Job::Fetch(self.poll.refetch())])
            }
            Ok(status) => {
                self.open_notice(format!(
                    "Process has exited with status {}",
                    status.code().unwrap_or(-1)
                ));
                AppCommand::None
            }
            Err(error) => {
                self.open_report("Error", format!("{error:#}"));
                AppCommand::None
            }
        }
    }

    /// Called after a login completes so the header reflects the new target.
    pub fn set_identity(&mut self, server: String, username: String) {
        self.server = server;
        self.username = username;
    }
}

fn common_prefix_len(label: &str, query: &str) -> usize {
    label
        .chars()
        .zip(query.chars())
        .take_while(|(left, right)| left == right)
        .count()
}

#[cfg(test)]
mod tests {
    use super::{App, AppCommand, ConfirmAction, Modal};
    use crate::cluster::ClusterError;
    use crate::input::Action;
    use crate::kinds::ResourceKind;
    use crate::model::{Row, TableSnapshot};
    use crate::worker::{Job, WorkerEvent};

    fn app() -> App {
        App::new(
            "oc".to_string(),
            "https://api.example.com:6443".to_string(),
            "alice".to_string(),
            "default".to_string(),
        )
    }

    fn pods_snapshot(names: &[&str]) -> TableSnapshot {
        TableSnapshot {
            headers: ResourceKind::Pods.columns(),
            rows: names
                .iter()
                .map(|name| {
                    Row::new(vec![
                        name.to_string(),
                        "1/1".to_string(),
                        "Running".to_string(),
                        "0".to_string(),
                        "30s".to_string(),
                        "10.0.0.1".to_string(),
                        "node-a".to_string(),
                    ])
                })
                .collect(),
        }
    }

    fn fetch_job(command: AppCommand) -> crate::poll::FetchRequest {
        match command {
            AppCommand::Dispatch(jobs) => match jobs.into_iter().next() {
                Some(Job::Fetch(request)) => request,
                other => panic!("expected fetch job, got {other:?}"),
            },
            other => panic!("expected dispatch, got {other:?}"),
        }
    }

    #[test]
    fn stale_fetch_never_overwrites_the_new_view() {
        let mut app = app();
        let stale = app.on_tick().expect("initial fetch");
        let stale_request = match stale {
            Job::Fetch(request) => request,
            other => panic!("expected fetch, got {other:?}"),
        };

        let _ = fetch_job(app.apply_action(Action::SwitchKind(ResourceKind::Services)));

        let command = app.handle_event(WorkerEvent::FetchDone {
            request: stale_request,
            result: Ok(pods_snapshot(&["api-0"])),
        });
        assert_eq!(command, AppCommand::None);
        assert_eq!(app.table().headers, ResourceKind::Services.columns());
        assert!(app.table().rows.is_empty());
    }

    #[test]
    fn applying_the_same_snapshot_twice_is_idempotent() {
        let mut app = app();
        let request = fetch_job(app.apply_action(Action::Refresh));
        let _ = app.handle_event(WorkerEvent::FetchDone {
            request: request.clone(),
            result: Ok(pods_snapshot(&["api-0", "api-1"])),
        });
        let first = app.table().rows.clone();

        let request2 = fetch_job(app.apply_action(Action::Refresh));
        let _ = app.handle_event(WorkerEvent::FetchDone {
            request: request2,
            result: Ok(pods_snapshot(&["api-0", "api-1"])),
        });
        assert_eq!(app.table().rows, first);
    }

    #[test]
    fn empty_snapshot_shows_the_placeholder_and_rows_bring_it_back() {
        let mut app = app();
        let request = fetch_job(app.apply_action(Action::Refresh));
        let _ = app.handle_event(WorkerEvent::FetchDone {
            request,
            result: Ok(pods_snapshot(&[])),
        });
        assert!(app.shows_placeholder());
        assert_eq!(app.placeholder_text(), "No pods in namespace default");

        let request = fetch_job(app.apply_action(Action::Refresh));
        let _ = app.handle_event(WorkerEvent::FetchDone {
            request,
            result: Ok(pods_snapshot(&["api-0"])),
        });
        assert!(!app.shows_placeholder());
    }

    #[test]
    fn no_tick_fires_while_an_overlay_owns_the_screen() {
        let mut app = app();
        let request = fetch_job(app.apply_action(Action::Refresh));
        let _ = app.handle_event(WorkerEvent::FetchDone {
            request,
            result: Ok(pods_snapshot(&["api-0"])),
        });

        let _ = app.apply_action(Action::OpenMenu);
        assert!(matches!(app.modal(), Modal::Menu { .. }));
        assert!(app.on_tick().is_none());

        // Exactly one fetch goes out the moment focus comes back, and the
        // timer stays quiet until it completes.
        let resumed = fetch_job(app.apply_action(Action::Cancel));
        assert!(app.on_tick().is_none());
        let _ = app.handle_event(WorkerEvent::FetchDone {
            request: resumed,
            result: Ok(pods_snapshot(&["api-0"])),
        });
        assert!(app.on_tick().is_some());
    }

    #[test]
    fn unauthorized_fetch_opens_login_and_retries_exactly_once() {
        let mut app = app();
        let request = fetch_job(app.apply_action(Action::Refresh));
        let generation = request.generation;

        let _ = app.handle_event(WorkerEvent::FetchDone {
            request,
            result: Err(ClusterError::Unauthorized),
        });
        assert!(matches!(app.modal(), Modal::Login { .. }));

        let _ = app.apply_action(Action::Submit);
        let command = app.handle_event(WorkerEvent::LoginComplete { result: Ok(()) });
        let retry = fetch_job(command);
        assert_eq!(retry.generation, generation);
        assert_eq!(retry.kind, ResourceKind::Pods);
        assert_eq!(retry.namespace, "default");

        // A second completion finds no parked request.
        let command = app.handle_event(WorkerEvent::LoginComplete { result: Ok(()) });
        assert_eq!(command, AppCommand::None);
    }

    #[test]
    fn delete_requires_confirmation_and_dispatches_the_guarded_delete() {
        let mut app = app();
        let request = fetch_job(app.apply_action(Action::Refresh));
        let _ = app.handle_event(WorkerEvent::FetchDone {
            request,
            result: Ok(pods_snapshot(&["api-0"])),
        });

        let command = app.apply_action(Action::DeleteRow);
        assert_eq!(command, AppCommand::None);
        match app.modal() {
            Modal::Confirm {
                message, action, ..
            } => {
                assert!(message.contains("pods/api-0"));
                assert!(matches!(action, ConfirmAction::DeleteOne { .. }));
            }
            other => panic!("expected confirm modal, got {other:?}"),
        }

        let command = app.apply_action(Action::ConfirmYes);
        match command {
            AppCommand::Dispatch(jobs) => match &jobs[0] {
                Job::DeleteOne {
                    resource_type,
                    namespace,
                    name,
                } => {
                    assert_eq!(resource_type, "pods");
                    assert_eq!(namespace, "default");
                    assert_eq!(name, "api-0");
                }
                other => panic!("expected delete job, got {other:?}"),
            },
            other => panic!("expected dispatch, got {other:?}"),
        }
        assert!(app.waiting().is_some());

        let _ = app.handle_event(WorkerEvent::BackupWritten {
            path: std::path::PathBuf::from("/tmp/pods-api-0-x1.yaml"),
        });
        assert!(app.last_backup().is_some());
    }

    #[test]
    fn non_zero_subprocess_exit_surfaces_a_dismissible_notice() {
        let mut app = app();
        let _ = app.handle_event(WorkerEvent::Captured {
            outcome: Ok(crate::bridge::CaptureOutcome::Failed(127)),
        });
        match app.modal() {
            Modal::Notice { message } => {
                assert!(message.contains("127"));
            }
            other => panic!("expected notice, got {other:?}"),
        }
        // Dismissing it resumes the poll stream with one immediate fetch.
        let _ = fetch_job(app.apply_action(Action::Cancel));
    }

    #[test]
    fn declining_the_insecure_connection_is_fatal() {
        let mut app = app();
        let request = fetch_job(app.apply_action(Action::Refresh));
        let _ = app.handle_event(WorkerEvent::FetchDone {
            request,
            result: Err(ClusterError::TlsUntrusted),
        });
        assert!(matches!(app.modal(), Modal::Confirm { .. }));

        let command = app.apply_action(Action::ConfirmNo);
        assert_eq!(command, AppCommand::Fatal { code: 1 });
    }

    #[test]
    fn generic_fetch_error_keeps_the_previous_snapshot() {
        let mut app = app();
        let request = fetch_job(app.apply_action(Action::Refresh));
        let _ = app.handle_event(WorkerEvent::FetchDone {
            request,
            result: Ok(pods_snapshot(&["api-0"])),
        });

        let request = fetch_job(app.apply_action(Action::Refresh));
        let _ = app.handle_event(WorkerEvent::FetchDone {
            request,
            result: Err(ClusterError::Other(anyhow::anyhow!("boom"))),
        });
        assert!(matches!(app.modal(), Modal::Report { .. }));
        assert_eq!(app.table().rows.len(), 1);
    }

    #[test]
    fn view_switch_resets_selection_and_schema() {
        let mut app = app();
        let request = fetch_job(app.apply_action(Action::Refresh));
        let _ = app.handle_event(WorkerEvent::FetchDone {
            request,
            result: Ok(pods_snapshot(&["a", "b", "c"])),
        });
        let _ = app.apply_action(Action::Down);
        let _ = app.apply_action(Action::Down);
        assert_eq!(app.table().selected, 2);

        let _ = app.apply_action(Action::SwitchKind(ResourceKind::ConfigMaps));
        assert_eq!(app.table().selected, 0);
        assert_eq!(app.table().headers, ResourceKind::ConfigMaps.columns());
        assert!(app.table().rows.is_empty());
    }

    #[test]
    fn cancelled_login_exits_the_process() {
        let mut app = app();
        let request = fetch_job(app.apply_action(Action::Refresh));
        let _ = app.handle_event(WorkerEvent::FetchDone {
            request,
            result: Err(ClusterError::Unauthorized),
        });
        let command = app.apply_action(Action::Cancel);
        assert_eq!(command, AppCommand::Fatal { code: 0 });
    }
}
