use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::bridge::CaptureOutcome;
use crate::cluster::{ClusterError, Gateway};
use crate::guard::{self, DeletionStore};
use crate::kinds::ResourceKind;
use crate::model::TableSnapshot;
use crate::poll::FetchRequest;
use crate::session::{self, AuthPhase, SessionCell, SharedSession};

/// Why a container is being resolved; decides what runs once one is picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerPurpose {
    Logs,
    Shell,
}

/// Work submitted by the interaction loop. Processed by a single task in
/// strict submission order, so no two jobs ever run concurrently with each
/// other, only with the interaction loop itself.
#[derive(Debug, PartialEq)]
pub enum Job {
    Fetch(FetchRequest),
    ListNamespaces,
    DeleteOne {
        resource_type: String,
        namespace: String,
        name: String,
    },
    DeleteAll {
        kind: ResourceKind,
        namespace: String,
    },
    Scale {
        resource_type: String,
        namespace: String,
        name: String,
        replicas: i32,
    },
    RolloutLatest {
        namespace: String,
        name: String,
    },
    Capture {
        argv: Vec<String>,
        prefix: String,
        suffix: String,
    },
    ResolveContainers {
        namespace: String,
        pod: String,
        purpose: ContainerPurpose,
    },
    ResolvePodNode {
        namespace: String,
        pod: String,
    },
    ResolveNodeHost {
        name: String,
    },
    Login {
        server: String,
        username: String,
        password: String,
    },
    TrustAndRebuild,
    PersistNamespace {
        namespace: String,
    },
}

impl Job {
    fn label(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::ListNamespaces => "list-namespaces",
            Self::DeleteOne { .. } => "delete-one",
            Self::DeleteAll { .. } => "delete-all",
            Self::Scale { .. } => "scale",
            Self::RolloutLatest { .. } => "rollout-latest",
            Self::Capture { .. } => "capture",
            Self::ResolveContainers { .. } => "resolve-containers",
            Self::ResolvePodNode { .. } => "resolve-pod-node",
            Self::ResolveNodeHost { .. } => "resolve-node-host",
            Self::Login { .. } => "login",
            Self::TrustAndRebuild => "trust-and-rebuild",
            Self::PersistNamespace { .. } => "persist-namespace",
        }
    }
}

/// Results marshaled back onto the interaction loop, which is the only
/// place display state is touched.
#[derive(Debug)]
pub enum WorkerEvent {
    FetchDone {
        request: FetchRequest,
        result: Result<TableSnapshot, ClusterError>,
    },
    Namespaces(Result<Vec<String>, ClusterError>),
    Captured {
        outcome: anyhow::Result<CaptureOutcome>,
    },
    ContainersResolved {
        namespace: String,
        pod: String,
        purpose: ContainerPurpose,
        result: Result<Vec<String>, ClusterError>,
    },
    PodNodeResolved {
        result: Result<Option<String>, ClusterError>,
    },
    NodeHostResolved {
        result: Result<String, ClusterError>,
    },
    MutationDone {
        description: String,
    },
    MutationFailed {
        context: String,
        error: ClusterError,
    },
    LoginComplete {
        result: Result<(), String>,
    },
    TrustComplete {
        result: Result<(), String>,
    },
    TokenPersistFailed {
        detail: String,
    },
    NamespacePersistFailed {
        detail: String,
    },
    BackupWritten {
        path: PathBuf,
    },
}

pub fn spawn(
    shared: SharedSession,
    deletions: DeletionStore,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    events: mpsc::UnboundedSender<WorkerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(job) = jobs.recv().await {
            debug!("worker job: {}", job.label());
            // The client handle is read once per job; a re-login swaps the
            // cell wholesale and must not be observed mid-job.
            let cell = session::snapshot(&shared);
            run_job(&shared, &cell, &deletions, job, &events).await;
        }
    })
}

async fn run_job(
    shared: &SharedSession,
    cell: &SessionCell,
    deletions: &DeletionStore,
    job: Job,
    events: &mpsc::UnboundedSender<WorkerEvent>,
) {
    let gateway = &cell.gateway;
    match job {
        Job::Fetch(request) => {
            let result = gateway.fetch(&request.kind, &request.namespace).await;
            let _ = events.send(WorkerEvent::FetchDone { request, result });
        }
        Job::ListNamespaces => {
            let _ = events.send(WorkerEvent::Namespaces(gateway.list_namespaces().await));
        }
        Job::DeleteOne {
            resource_type,
            namespace,
            name,
        } => {
            match guard::delete_one(gateway, deletions, &resource_type, &namespace, &name).await {
                Ok(backup) => {
                    let _ = events.send(WorkerEvent::BackupWritten { path: backup });
                    let _ = events.send(WorkerEvent::MutationDone {
                        description: format!("Deleted {resource_type}/{name}"),
                    });
                }
                Err(error) => {
                    let _ = events.send(WorkerEvent::MutationFailed {
                        context: format!("delete {resource_type}/{name}"),
                        error,
                    });
                }
            }
        }
        Job::DeleteAll { kind, namespace } => {
            match guard::delete_all(gateway, &kind, &namespace).await {
                Ok(()) => {
                    let _ = events.send(WorkerEvent::MutationDone {
                        description: format!("Deleted all {}", kind.title()),
                    });
                }
                Err(error) => {
                    let _ = events.send(WorkerEvent::MutationFailed {
                        context: format!("delete all {}", kind.title()),
                        error,
                    });
                }
            }
        }
        Job::Scale {
            resource_type,
            namespace,
            name,
            replicas,
        } => match gateway.scale(&resource_type, &namespace, &name, replicas).await {
            Ok(()) => {
                let _ = events.send(WorkerEvent::MutationDone {
                    description: format!("Rescaled {resource_type}/{name} to {replicas}"),
                });
            }
            Err(error) => {
                let _ = events.send(WorkerEvent::MutationFailed {
                    context: format!("rescale {resource_type}/{name}"),
                    error,
                });
            }
        },
        Job::RolloutLatest { namespace, name } => {
            match gateway.rollout_latest(&namespace, &name).await {
                Ok(()) => {
                    let _ = events.send(WorkerEvent::MutationDone {
                        description: format!("Rollout triggered for dc/{name}"),
                    });
                }
                Err(error) => {
                    let _ = events.send(WorkerEvent::MutationFailed {
                        context: format!("rollout latest dc/{name}"),
                        error,
                    });
                }
            }
        }
        Job::Capture {
            argv,
            prefix,
            suffix,
        } => {
            let outcome = crate::bridge::run_captured(&argv, &prefix, &suffix).await;
            let _ = events.send(WorkerEvent::Captured { outcome });
        }
        Job::ResolveContainers {
            namespace,
            pod,
            purpose,
        } => {
            let result = gateway.pod_container_names(&namespace, &pod).await;
            let _ = events.send(WorkerEvent::ContainersResolved {
                namespace,
                pod,
                purpose,
                result,
            });
        }
        Job::ResolvePodNode { namespace, pod } => {
            let result = gateway.pod_node_name(&namespace, &pod).await;
            let _ = events.send(WorkerEvent::PodNodeResolved { result });
        }
        Job::ResolveNodeHost { name } => {
            let result = gateway.node_hostname(&name).await;
            let _ = events.send(WorkerEvent::NodeHostResolved { result });
        }
        Job::Login {
            server,
            username,
            password,
        } => {
            let mut session = cell.session.clone();
            session.server = server;
            session.username = username;
            session.password = Some(password.clone());
            session.phase = AuthPhase::LoggingIn;

            // Mint a bearer token the way `oc login` does; fall back to
            // basic auth when the OAuth exchange is unavailable.
            match session::request_token(
                &session.server,
                &session.username,
                &password,
                session.trust_certs,
            )
            .await
            {
                Ok(token) => session.token = Some(token),
                Err(error) => {
                    debug!("token request failed, falling back to basic auth: {error:#}");
                    session.token = None;
                }
            }

            match session::rebuild_client(&session) {
                Ok(client) => {
                    session.phase = AuthPhase::Authenticated;
                    session::publish(
                        shared,
                        SessionCell {
                            session: session.clone(),
                            gateway: Gateway::new(client),
                        },
                    );
                    let _ = events.send(WorkerEvent::LoginComplete { result: Ok(()) });
                    // Best-effort by contract: a persist failure must never
                    // invalidate the already-authenticated client.
                    if let Err(error) = session::persist_token(&session) {
                        let _ = events.send(WorkerEvent::TokenPersistFailed {
                            detail: format!("{error:#}"),
                        });
                    }
                }
                Err(error) => {
                    let _ = events.send(WorkerEvent::LoginComplete {
                        result: Err(format!("{error:#}")),
                    });
                }
            }
        }
        Job::TrustAndRebuild => {
            let mut session = cell.session.clone();
            session.trust_certs = true;
            match session::rebuild_trusted(&session).await {
                Ok(client) => {
                    session::publish(
                        shared,
                        SessionCell {
                            session,
                            gateway: Gateway::new(client),
                        },
                    );
                    let _ = events.send(WorkerEvent::TrustComplete { result: Ok(()) });
                }
                Err(error) => {
                    let _ = events.send(WorkerEvent::TrustComplete {
                        result: Err(format!("{error:#}")),
                    });
                }
            }
        }
        Job::PersistNamespace { namespace } => {
            let mut cell = cell.clone();
            cell.session.namespace = namespace.clone();
            session::publish(shared, cell);
            if let Err(error) = session::persist_namespace(&namespace) {
                let _ = events.send(WorkerEvent::NamespacePersistFailed {
                    detail: format!("{error:#}"),
                });
            }
        }
    }
}
