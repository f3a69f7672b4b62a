use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::{
    ConfigMap, Namespace, Node, Pod, PodStatus, ReplicationController, Service, ServicePort,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Api, Client, ResourceExt};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::kinds::ResourceKind;
use crate::model::{self, Row, TableSnapshot};

/// Failure taxonomy for the poll path. Unauthorized and TlsUntrusted are
/// recovered by the session flows; everything else surfaces as a report and
/// leaves the previous snapshot in place.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("cluster authentication required")]
    Unauthorized,
    #[error("cluster certificate is not trusted")]
    TlsUntrusted,
    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

impl From<kube::Error> for ClusterError {
    fn from(error: kube::Error) -> Self {
        match &error {
            kube::Error::Api(response) if response.code == 401 => return Self::Unauthorized,
            kube::Error::Auth(_) => return Self::Unauthorized,
            _ => {}
        }
        if chain_mentions_tls(&error) {
            Self::TlsUntrusted
        } else {
            Self::Other(error.into())
        }
    }
}

fn chain_mentions_tls(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(cause) = current {
        let text = cause.to_string().to_ascii_lowercase();
        if text.contains("certificate") || text.contains("tls") || text.contains("ssl") {
            return true;
        }
        current = cause.source();
    }
    false
}

pub type ClusterResult<T> = Result<T, ClusterError>;

const DC_LABEL: &str = "openshift.io/deployment-config.name";

/// Thin wrapper over one kube client handle. Rebuilt wholesale on re-login;
/// worker jobs clone it from the shared session cell once per job.
#[derive(Clone)]
pub struct Gateway {
    client: Client,
}

impl Gateway {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn dc_api(&self, namespace: &str) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk("apps.openshift.io", "v1", "DeploymentConfig");
        let resource = ApiResource::from_gvk_with_plural(&gvk, "deploymentconfigs");
        Api::namespaced_with(self.client.clone(), namespace, &resource)
    }

    /// Complete, freshly computed snapshot for one kind. Never partial: any
    /// failure drops the whole result.
    pub async fn fetch(&self, kind: &ResourceKind, namespace: &str) -> ClusterResult<TableSnapshot> {
        let mut rows = match kind {
            ResourceKind::Pods => self.fetch_pods(namespace).await?,
            ResourceKind::Services => self.fetch_services(namespace).await?,
            ResourceKind::Deployments => self.fetch_deployments(namespace).await?,
            ResourceKind::ConfigMaps => self.fetch_configmaps(namespace).await?,
            ResourceKind::Nodes => self.fetch_nodes().await?,
            ResourceKind::ReplicaSets { owner } => {
                self.fetch_replicasets(namespace, owner).await?
            }
            ResourceKind::ReplicationControllers { owner } => {
                self.fetch_replication_controllers(namespace, owner).await?
            }
        };
        rows.sort_by(|left, right| left.name().cmp(right.name()));
        Ok(TableSnapshot {
            headers: kind.columns(),
            rows,
        })
    }

    async fn fetch_pods(&self, namespace: &str) -> ClusterResult<Vec<Row>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = pods.list(&list_params()).await?;
        Ok(list
            .into_iter()
            .map(|pod| {
                let statuses = pod
                    .status
                    .as_ref()
                    .and_then(|status| status.container_statuses.as_deref())
                    .unwrap_or(&[]);
                let ready = statuses.iter().filter(|status| status.ready).count();
                let restarts: i32 = statuses.iter().map(|status| status.restart_count).sum();
                Row::new(vec![
                    pod.name_any(),
                    format!("{ready}/{}", statuses.len()),
                    pod.status.as_ref().map(pod_phase).unwrap_or_else(|| "Unknown".to_string()),
                    restarts.to_string(),
                    model::age(pod.status.as_ref().and_then(|status| status.start_time.as_ref())),
                    pod.status
                        .as_ref()
                        .and_then(|status| status.pod_ip.clone())
                        .unwrap_or_default(),
                    pod.spec
                        .as_ref()
                        .and_then(|spec| spec.node_name.clone())
                        .unwrap_or_default(),
                ])
            })
            .collect())
    }

    async fn fetch_services(&self, namespace: &str) -> ClusterResult<Vec<Row>> {
        let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let list = services.list(&list_params()).await?;
        Ok(list
            .into_iter()
            .map(|service| {
                let spec = service.spec.clone().unwrap_or_default();
                let ports = spec
                    .ports
                    .as_deref()
                    .unwrap_or(&[])
                    .iter()
                    .map(service_port)
                    .collect::<Vec<_>>();
                let selector = spec
                    .selector
                    .as_ref()
                    .map(selector_pairs)
                    .unwrap_or_default();
                Row::new(vec![
                    service.name_any(),
                    spec.type_.unwrap_or_default(),
                    spec.cluster_ip.unwrap_or_default(),
                    model::list_or_none(spec.external_ips.as_deref().unwrap_or(&[])),
                    model::list_or_none(&ports),
                    model::age(service.metadata.creation_timestamp.as_ref()),
                    selector,
                ])
            })
            .collect())
    }

    /// Plain Deployments merged with OpenShift DeploymentConfigs, tagged in
    /// column 1 so the operation menu and CLI invocations can tell them apart.
    async fn fetch_deployments(&self, namespace: &str) -> ClusterResult<Vec<Row>> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let mut rows = deployments
            .list(&list_params())
            .await?
            .into_iter()
            .map(|deployment| {
                let status = deployment.status.as_ref();
                Row::new(vec![
                    deployment.name_any(),
                    "deployment".to_string(),
                    model::replica_ratio(
                        status.and_then(|status| status.ready_replicas),
                        status.and_then(|status| status.replicas),
                    ),
                    status
                        .and_then(|status| status.updated_replicas)
                        .unwrap_or(0)
                        .to_string(),
                    status
                        .and_then(|status| status.available_replicas)
                        .unwrap_or(0)
                        .to_string(),
                    model::age(deployment.metadata.creation_timestamp.as_ref()),
                ])
            })
            .collect::<Vec<_>>();

        // A vanilla cluster has no deploymentconfigs API group at all; treat
        // that the same as an empty list rather than failing the view.
        match self.dc_api(namespace).list(&list_params()).await {
            Ok(list) => {
                for dc in list {
                    let status = dc.data.get("status");
                    rows.push(Row::new(vec![
                        dc.name_any(),
                        "dc".to_string(),
                        model::replica_ratio(
                            int_field(status, "readyReplicas"),
                            int_field(status, "replicas"),
                        ),
                        int_field(status, "updatedReplicas").unwrap_or(0).to_string(),
                        int_field(status, "availableReplicas").unwrap_or(0).to_string(),
                        model::age(dc.metadata.creation_timestamp.as_ref()),
                    ]));
                }
            }
            Err(kube::Error::Api(response)) if response.code == 404 => {}
            Err(error) => return Err(error.into()),
        }

        Ok(rows)
    }

    async fn fetch_configmaps(&self, namespace: &str) -> ClusterResult<Vec<Row>> {
        let configmaps: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let list = configmaps.list(&list_params()).await?;
        Ok(list
            .into_iter()
            .map(|configmap| {
                Row::new(vec![
                    configmap.name_any(),
                    describe_data(configmap.data.as_ref().unwrap_or(&BTreeMap::new())),
                    model::age(configmap.metadata.creation_timestamp.as_ref()),
                ])
            })
            .collect())
    }

    async fn fetch_nodes(&self) -> ClusterResult<Vec<Row>> {
        let pods: Api<Pod> = Api::all(self.client.clone());
        let mut by_node = HashMap::<String, Vec<Pod>>::new();
        for pod in pods.list(&list_params()).await? {
            if let Some(node) = pod.spec.as_ref().and_then(|spec| spec.node_name.clone()) {
                by_node.entry(node).or_default().push(pod);
            }
        }

        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes.list(&list_params()).await?;
        Ok(list
            .into_iter()
            .map(|node| {
                let name = node.name_any();
                let status = node.status.as_ref();
                let ready = status
                    .and_then(|status| status.conditions.as_ref())
                    .and_then(|conditions| {
                        conditions.iter().find(|condition| condition.type_ == "Ready")
                    })
                    .map(|condition| {
                        if condition.status == "True" {
                            "READY"
                        } else {
                            "NOT_READY"
                        }
                    })
                    .unwrap_or("UNKNOWN");
                let roles = node
                    .metadata
                    .labels
                    .as_ref()
                    .and_then(|labels| {
                        labels
                            .keys()
                            .filter_map(|key| key.strip_prefix("node-role.kubernetes.io/"))
                            .next()
                            .map(str::to_string)
                    })
                    .unwrap_or_default();
                let internal_ip = status
                    .and_then(|status| status.addresses.as_ref())
                    .and_then(|addresses| {
                        addresses
                            .iter()
                            .find(|address| address.type_ == "InternalIP")
                            .map(|address| address.address.clone())
                    })
                    .unwrap_or_default();
                let capacity = status.and_then(|status| status.capacity.as_ref());
                let pod_capacity = capacity
                    .and_then(|capacity| capacity.get("pods"))
                    .map(|quantity| quantity.0.clone())
                    .unwrap_or_else(|| "0".to_string());
                let cpu_capacity = capacity
                    .and_then(|capacity| capacity.get("cpu"))
                    .map(|quantity| quantity.0.clone())
                    .unwrap_or_else(|| "0".to_string());
                let scheduled = by_node.get(&name).map(Vec::as_slice).unwrap_or(&[]);
                let cpu_requests: i64 = scheduled
                    .iter()
                    .flat_map(|pod| pod.spec.iter().flat_map(|spec| spec.containers.iter()))
                    .filter_map(|container| container.resources.as_ref())
                    .filter_map(|resources| resources.requests.as_ref())
                    .filter_map(|requests| requests.get("cpu"))
                    .map(model::millicores)
                    .sum();
                Row::new(vec![
                    name,
                    ready.to_string(),
                    roles,
                    model::age(node.metadata.creation_timestamp.as_ref()),
                    internal_ip,
                    format!("{}/{pod_capacity}", scheduled.len()),
                    format!("{cpu_requests}m/{cpu_capacity}"),
                ])
            })
            .collect())
    }

    /// ReplicaSets owned by one deployment. Deployment-owned sets carry no
    /// stable owner label, so ownership is matched on ownerReferences.
    async fn fetch_replicasets(&self, namespace: &str, owner: &str) -> ClusterResult<Vec<Row>> {
        let replicasets: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
        let list = replicasets.list(&list_params()).await?;
        Ok(list
            .into_iter()
            .filter(|replicaset| {
                replicaset
                    .metadata
                    .owner_references
                    .as_deref()
                    .unwrap_or(&[])
                    .iter()
                    .any(|reference| reference.name == owner)
            })
            .map(|replicaset| {
                let status = replicaset.status.as_ref();
                Row::new(vec![
                    replicaset.name_any(),
                    status.map(|status| status.replicas).unwrap_or(0).to_string(),
                    status
                        .and_then(|status| status.available_replicas)
                        .unwrap_or(0)
                        .to_string(),
                    status
                        .and_then(|status| status.ready_replicas)
                        .unwrap_or(0)
                        .to_string(),
                    model::age(replicaset.metadata.creation_timestamp.as_ref()),
                ])
            })
            .collect())
    }

    async fn fetch_replication_controllers(
        &self,
        namespace: &str,
        owner: &str,
    ) -> ClusterResult<Vec<Row>> {
        let controllers: Api<ReplicationController> =
            Api::namespaced(self.client.clone(), namespace);
        let params = list_params().labels(&format!("{DC_LABEL}={owner}"));
        let list = controllers.list(&params).await?;
        Ok(list
            .into_iter()
            .map(|controller| {
                let status = controller.status.as_ref();
                Row::new(vec![
                    controller.name_any(),
                    status.map(|status| status.replicas).unwrap_or(0).to_string(),
                    status
                        .and_then(|status| status.available_replicas)
                        .unwrap_or(0)
                        .to_string(),
                    status
                        .and_then(|status| status.ready_replicas)
                        .unwrap_or(0)
                        .to_string(),
                    model::age(controller.metadata.creation_timestamp.as_ref()),
                ])
            })
            .collect())
    }

    /// Live object serialized to YAML, keyed by the resource-type string the
    /// row resolved (the same discriminator the CLI invocations use).
    pub async fn object_yaml(
        &self,
        resource_type: &str,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<String> {
        match resource_type {
            "pods" => self.namespaced_yaml::<Pod>(namespace, name).await,
            "services" => self.namespaced_yaml::<Service>(namespace, name).await,
            "deployment" => self.namespaced_yaml::<Deployment>(namespace, name).await,
            "dc" => {
                let object = self.dc_api(namespace).get(name).await?;
                to_yaml(&object)
            }
            "configmaps" => self.namespaced_yaml::<ConfigMap>(namespace, name).await,
            "nodes" => {
                let api: Api<Node> = Api::all(self.client.clone());
                let object = api.get(name).await?;
                to_yaml(&object)
            }
            "replicaset" => self.namespaced_yaml::<ReplicaSet>(namespace, name).await,
            "replicationcontroller" => {
                self.namespaced_yaml::<ReplicationController>(namespace, name)
                    .await
            }
            other => Err(ClusterError::Other(anyhow::anyhow!(
                "unknown resource type {other}"
            ))),
        }
    }

    async fn namespaced_yaml<K>(&self, namespace: &str, name: &str) -> ClusterResult<String>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + std::fmt::Debug
            + Serialize
            + serde::de::DeserializeOwned,
        <K as kube::Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let object = api.get(name).await?;
        to_yaml(&object)
    }

    pub async fn delete_object(
        &self,
        resource_type: &str,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<()> {
        let params = DeleteParams::default();
        match resource_type {
            "pods" => {
                let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
                let _ = api.delete(name, &params).await?;
            }
            "services" => {
                let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
                let _ = api.delete(name, &params).await?;
            }
            "deployment" => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
                let _ = api.delete(name, &params).await?;
            }
            "dc" => {
                let _ = self.dc_api(namespace).delete(name, &params).await?;
            }
            "configmaps" => {
                let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
                let _ = api.delete(name, &params).await?;
            }
            "nodes" => {
                let api: Api<Node> = Api::all(self.client.clone());
                let _ = api.delete(name, &params).await?;
            }
            "replicaset" => {
                let api: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
                let _ = api.delete(name, &params).await?;
            }
            "replicationcontroller" => {
                let api: Api<ReplicationController> =
                    Api::namespaced(self.client.clone(), namespace);
                let _ = api.delete(name, &params).await?;
            }
            other => {
                return Err(ClusterError::Other(anyhow::anyhow!(
                    "unknown resource type {other}"
                )));
            }
        }
        Ok(())
    }

    /// Bulk delete for one kind. Deliberately no per-object backup.
    pub async fn delete_collection(
        &self,
        kind: &ResourceKind,
        namespace: &str,
    ) -> ClusterResult<()> {
        let delete = DeleteParams::default();
        let list = list_params();
        match kind {
            ResourceKind::Pods => {
                let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
                let _ = api.delete_collection(&delete, &list).await?;
            }
            ResourceKind::Services => {
                let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
                let _ = api.delete_collection(&delete, &list).await?;
            }
            ResourceKind::Deployments => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
                let _ = api.delete_collection(&delete, &list).await?;
                match self.dc_api(namespace).delete_collection(&delete, &list).await {
                    Ok(_) => {}
                    Err(kube::Error::Api(response)) if response.code == 404 => {}
                    Err(error) => return Err(error.into()),
                }
            }
            ResourceKind::ConfigMaps => {
                let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
                let _ = api.delete_collection(&delete, &list).await?;
            }
            ResourceKind::Nodes => {
                let api: Api<Node> = Api::all(self.client.clone());
                let _ = api.delete_collection(&delete, &list).await?;
            }
            ResourceKind::ReplicaSets { owner } => {
                let api: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
                let names = self
                    .fetch_replicasets(namespace, owner)
                    .await?
                    .into_iter()
                    .map(|row| row.name().to_string())
                    .collect::<Vec<_>>();
                for name in names {
                    let _ = api.delete(&name, &delete).await?;
                }
            }
            ResourceKind::ReplicationControllers { owner } => {
                let api: Api<ReplicationController> =
                    Api::namespaced(self.client.clone(), namespace);
                let params = list_params().labels(&format!("{DC_LABEL}={owner}"));
                let _ = api.delete_collection(&delete, &params).await?;
            }
        }
        Ok(())
    }

    pub async fn scale(
        &self,
        resource_type: &str,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> ClusterResult<()> {
        let patch = serde_json::json!({ "spec": { "replicas": replicas } });
        let params = PatchParams::default();
        match resource_type {
            "deployment" => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
                let _ = api.patch(name, &params, &Patch::Merge(&patch)).await?;
            }
            "dc" => {
                let _ = self
                    .dc_api(namespace)
                    .patch(name, &params, &Patch::Merge(&patch))
                    .await?;
            }
            other => {
                return Err(ClusterError::Other(anyhow::anyhow!(
                    "rescale is not supported for {other}"
                )));
            }
        }
        Ok(())
    }

    /// Trigger a new DC rollout through the ConfigChange path by touching the
    /// pod template annotations.
    pub async fn rollout_latest(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        let patch = serde_json::json!({
            "spec": {
                "template": {
                    "metadata": {
                        "annotations": {
                            "ocular.dev/rolloutRequestedAt": chrono::Utc::now().to_rfc3339()
                        }
                    }
                }
            }
        });
        let _ = self
            .dc_api(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    pub async fn list_namespaces(&self) -> ClusterResult<Vec<String>> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let list = namespaces.list(&list_params()).await?;
        let mut names = list
            .into_iter()
            .map(|namespace| namespace.name_any())
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    pub async fn pod_container_names(
        &self,
        namespace: &str,
        pod_name: &str,
    ) -> ClusterResult<Vec<String>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pod = pods.get(pod_name).await?;
        Ok(pod
            .status
            .as_ref()
            .and_then(|status| status.container_statuses.as_ref())
            .map(|statuses| {
                statuses
                    .iter()
                    .map(|status| status.name.clone())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default())
    }

    pub async fn pod_node_name(
        &self,
        namespace: &str,
        pod_name: &str,
    ) -> ClusterResult<Option<String>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pod = pods.get(pod_name).await?;
        Ok(pod.spec.as_ref().and_then(|spec| spec.node_name.clone()))
    }

    /// The address to ssh to: the node's Hostname address, else its name.
    pub async fn node_hostname(&self, name: &str) -> ClusterResult<String> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let node = nodes.get(name).await?;
        Ok(node
            .status
            .as_ref()
            .and_then(|status| status.addresses.as_ref())
            .and_then(|addresses| {
                addresses
                    .iter()
                    .find(|address| address.type_ == "Hostname")
                    .map(|address| address.address.clone())
            })
            .unwrap_or_else(|| node.name_any()))
    }
}

fn list_params() -> ListParams {
    ListParams::default().limit(500)
}

fn int_field(value: Option<&serde_json::Value>, field: &str) -> Option<i32> {
    value
        .and_then(|value| value.get(field))
        .and_then(serde_json::Value::as_i64)
        .map(|value| value as i32)
}

fn to_yaml<T: Serialize>(value: &T) -> ClusterResult<String> {
    serde_yaml::to_string(value)
        .map_err(|error| ClusterError::Other(anyhow::Error::from(error)))
}

/// Condition-derived pod status, closer to what `oc get pods` prints than
/// the raw phase.
fn pod_phase(status: &PodStatus) -> String {
    let conditions = status.conditions.as_deref().unwrap_or(&[]);
    let find = |kind: &str| conditions.iter().find(|condition| condition.type_ == kind);

    if let Some(scheduled) = find("PodScheduled")
        && scheduled.status != "True"
    {
        return "Pending".to_string();
    }
    let Some(initialized) = find("Initialized") else {
        return "Init:?".to_string();
    };
    if initialized.status == "True" {
        if initialized.reason.as_deref() == Some("PodCompleted") {
            return "Completed".to_string();
        }
        let Some(ready) = find("Ready") else {
            return "NotReady:?".to_string();
        };
        if ready.status == "True" {
            return "Running".to_string();
        }
        return status
            .container_statuses
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .filter_map(|container| container.state.as_ref())
            .filter_map(|state| {
                state
                    .terminated
                    .as_ref()
                    .and_then(|terminated| terminated.reason.clone())
                    .or_else(|| {
                        state
                            .waiting
                            .as_ref()
                            .and_then(|waiting| waiting.reason.clone())
                    })
            })
            .next()
            .unwrap_or_else(|| "NotReady".to_string());
    }
    if initialized.reason.as_deref() == Some("ContainersNotInitialized") {
        return "Init:Error".to_string();
    }
    "Unknown".to_string()
}

fn service_port(port: &ServicePort) -> String {
    let mut out = format!("{}/{}", port.name.clone().unwrap_or_default(), port.port);
    if let Some(node_port) = port.node_port {
        out.push_str(&format!(":{node_port}"));
    }
    match port.target_port.as_ref() {
        Some(IntOrString::Int(target)) if *target != port.port => {
            out.push_str(&format!(">{target}"));
        }
        Some(IntOrString::String(target)) => {
            out.push_str(&format!(">{target}"));
        }
        _ => {}
    }
    out.push('/');
    out.push_str(port.protocol.as_deref().unwrap_or("TCP"));
    out
}

fn selector_pairs(selector: &BTreeMap<String, String>) -> String {
    selector
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `N: key1, key2, ...` capped near one table cell's width.
fn describe_data(data: &BTreeMap<String, String>) -> String {
    let mut out = format!("{}: ", data.len());
    let mut first = true;
    for key in data.keys() {
        if out.len() + 2 + key.len() >= 32 {
            out.push_str("...");
            break;
        }
        if !first {
            out.push_str(", ");
        }
        out.push_str(key);
        first = false;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{ClusterError, describe_data, pod_phase, service_port};
    use k8s_openapi::api::core::v1::{PodCondition, PodStatus, ServicePort};
    use kube::core::Status;
    use std::collections::BTreeMap;

    fn condition(kind: &str, status: &str, reason: Option<&str>) -> PodCondition {
        PodCondition {
            type_: kind.to_string(),
            status: status.to_string(),
            reason: reason.map(str::to_string),
            ..PodCondition::default()
        }
    }

    #[test]
    fn unauthorized_status_maps_to_unauthorized() {
        let error = kube::Error::Api(Status::failure("Unauthorized", "Unauthorized").with_code(401).boxed());
        assert!(matches!(
            ClusterError::from(error),
            ClusterError::Unauthorized
        ));
    }

    #[test]
    fn other_api_errors_stay_generic() {
        let error = kube::Error::Api(Status::failure("boom", "InternalError").with_code(500).boxed());
        assert!(matches!(ClusterError::from(error), ClusterError::Other(_)));
    }

    #[test]
    fn certificate_chain_maps_to_tls_untrusted() {
        let error = kube::Error::Api(
            Status::failure("invalid peer certificate: UnknownIssuer", "").boxed(),
        );
        assert!(matches!(
            ClusterError::from(error),
            ClusterError::TlsUntrusted
        ));
    }

    #[test]
    fn pod_phase_follows_conditions() {
        let pending = PodStatus {
            conditions: Some(vec![condition("PodScheduled", "False", None)]),
            ..PodStatus::default()
        };
        assert_eq!(pod_phase(&pending), "Pending");

        let running = PodStatus {
            conditions: Some(vec![
                condition("PodScheduled", "True", None),
                condition("Initialized", "True", None),
                condition("Ready", "True", None),
            ]),
            ..PodStatus::default()
        };
        assert_eq!(pod_phase(&running), "Running");

        let completed = PodStatus {
            conditions: Some(vec![
                condition("PodScheduled", "True", None),
                condition("Initialized", "True", Some("PodCompleted")),
            ]),
            ..PodStatus::default()
        };
        assert_eq!(pod_phase(&completed), "Completed");

        let init_error = PodStatus {
            conditions: Some(vec![
                condition("PodScheduled", "True", None),
                condition("Initialized", "False", Some("ContainersNotInitialized")),
            ]),
            ..PodStatus::default()
        };
        assert_eq!(pod_phase(&init_error), "Init:Error");
    }

    #[test]
    fn service_port_renders_node_and_target_ports() {
        let port = ServicePort {
            name: Some("http".to_string()),
            port: 80,
            node_port: Some(30080),
            target_port: Some(
                k8s_openapi::apimachinery::pkg::util::intstr::IntOrString::Int(8080),
            ),
            protocol: Some("TCP".to_string()),
            ..ServicePort::default()
        };
        assert_eq!(service_port(&port), "http/80:30080>8080/TCP");
    }

    #[test]
    fn configmap_data_summary_truncates() {
        let mut data = BTreeMap::new();
        for key in ["alpha", "bravo", "charlie", "delta", "echo", "foxtrot"] {
            data.insert(key.to_string(), String::new());
        }
        let summary = describe_data(&data);
        assert!(summary.starts_with("6: "));
        assert!(summary.ends_with("..."));
        assert!(summary.len() < 40);
    }
}
