use anyhow::{Context, Result, bail};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, LogParams, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::DynamicObject;
use kube::runtime::reflector::store::Writer;
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client, Config, ResourceExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::model::{NamespaceScope, ResourceKind};
use crate::render::{Registry, build_snapshot};
use crate::table::TableData;

const REVISION_ANNOTATION: &str = "deployment.kubernetes.io/revision";
const POD_TEMPLATE_HASH: &str = "pod-template-hash";

/// Everything background work reports back to the runtime loop.
#[derive(Debug)]
pub enum UiEvent {
    Snapshot {
        kind: ResourceKind,
        scope: NamespaceScope,
        data: TableData,
        failures: usize,
    },
    WatchError {
        kind: ResourceKind,
        scope: NamespaceScope,
        message: String,
    },
    PortForwardExit(PortForwardExit),
}

#[derive(Debug)]
pub struct PortForwardExit {
    pub pid: u32,
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
    pub local_port: u16,
    pub remote_port: u16,
    pub result: std::result::Result<ExitStatus, String>,
}

#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    context: String,
    default_namespace: String,
}

/// A running watch for one kind/scope pair.
pub struct WatchWorker {
    pub kind: ResourceKind,
    pub scope: NamespaceScope,
    task: JoinHandle<()>,
}

impl WatchWorker {
    pub fn abort(self) {
        self.task.abort();
    }
}

impl KubeGateway {
    pub async fn new() -> Result<Self> {
        let kubeconfig = Kubeconfig::read().ok();
        let context = kubeconfig
            .as_ref()
            .and_then(|config| config.current_context.clone())
            .unwrap_or_else(|| "in-cluster".to_string());

        let config = match kubeconfig {
            Some(kubeconfig) => {
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .context("failed to infer Kubernetes configuration")?
            }
            None => Config::infer()
                .await
                .context("failed to infer Kubernetes configuration")?,
        };

        let default_namespace = config.default_namespace.clone();
        let client = Client::try_from(config).context("failed to initialize Kubernetes client")?;
        info!(context = %context, namespace = %default_namespace, "kubernetes client ready");

        Ok(Self {
            client,
            context,
            default_namespace,
        })
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    fn dynamic_api(&self, kind: ResourceKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = kind.api_resource();
        match namespace {
            Some(namespace) if kind.namespaced() => {
                Api::namespaced_with(self.client.clone(), namespace, &resource)
            }
            _ => Api::all_with(self.client.clone(), &resource),
        }
    }

    /// Starts a watch over `kind` in `scope`. Change notifications are
    /// coalesced so at most one snapshot is sent per `refresh`.
    pub fn spawn_watch(
        &self,
        registry: Registry,
        kind: ResourceKind,
        scope: NamespaceScope,
        refresh: Duration,
        tx: mpsc::UnboundedSender<UiEvent>,
    ) -> WatchWorker {
        let namespace = match &scope {
            NamespaceScope::Named(namespace) => Some(namespace.as_str()),
            NamespaceScope::All => None,
        };
        let api = self.dynamic_api(kind, namespace);
        let resource = kind.api_resource();
        let task_scope = scope.clone();

        let task = tokio::spawn(async move {
            let scope = task_scope;
            let renderer = registry.get(kind);
            let writer = Writer::new(resource);
            let reader = writer.as_reader();
            let mut events = watcher(api, watcher::Config::default())
                .default_backoff()
                .reflect(writer)
                .boxed();

            let mut ticker = interval(refresh);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut dirty = false;

            loop {
                tokio::select! {
                    maybe_event = events.next() => match maybe_event {
                        Some(Ok(watcher::Event::Apply(_) | watcher::Event::Delete(_) | watcher::Event::InitDone)) => {
                            dirty = true;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(error)) => {
                            warn!(kind = %kind, scope = %scope, error = %error, "watch stream error");
                            let message = error.to_string();
                            if tx.send(UiEvent::WatchError { kind, scope: scope.clone(), message }).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    _ = ticker.tick() => {
                        if !dirty {
                            continue;
                        }
                        dirty = false;

                        let objects = reader.state();
                        let (data, failures) = build_snapshot(
                            renderer.as_ref(),
                            kind,
                            objects.iter().map(|object| object.as_ref()),
                            &scope,
                        );
                        debug!(kind = %kind, scope = %scope, rows = data.len(), failures = failures.len(), "snapshot");
                        let event = UiEvent::Snapshot {
                            kind,
                            scope: scope.clone(),
                            data,
                            failures: failures.len(),
                        };
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                }
            }
            debug!(kind = %kind, "watch worker stopped");
        });

        WatchWorker { kind, scope, task }
    }

    pub async fn describe(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<String> {
        let mut object = self
            .dynamic_api(kind, namespace)
            .get(name)
            .await
            .with_context(|| format!("failed to get {} {name}", kind.title()))?;
        object.metadata.managed_fields = None;
        serde_yaml::to_string(&object).context("failed to format object as YAML")
    }

    pub async fn delete(&self, kind: ResourceKind, namespace: Option<&str>, name: &str) -> Result<()> {
        if kind.namespaced() && namespace.is_none() {
            bail!("namespace is required to delete {} {name}", kind.title());
        }
        let _ = self
            .dynamic_api(kind, namespace)
            .delete(name, &DeleteParams::default())
            .await
            .with_context(|| format!("failed to delete {} {name}", kind.title()))?;
        Ok(())
    }

    pub async fn fetch_pod_logs(&self, namespace: &str, pod_name: &str) -> Result<String> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            tail_lines: Some(500),
            timestamps: true,
            ..LogParams::default()
        };

        pods.logs(pod_name, &params)
            .await
            .with_context(|| format!("failed to load logs for {namespace}/{pod_name}"))
    }

    /// Label selector of a workload or service in `-l` filter syntax.
    pub async fn pod_selector(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<String> {
        let object = self
            .dynamic_api(kind, Some(namespace))
            .get(name)
            .await
            .with_context(|| format!("failed to get {} {namespace}/{name}", kind.title()))?;
        selector_from_object(kind, &object)
            .with_context(|| format!("{} {namespace}/{name} has no pod selector", kind.title()))
    }

    /// Points the owning Deployment's pod template back at the one stored in
    /// the ReplicaSet. Returns a status message.
    pub async fn rollback(&self, namespace: &str, name: &str) -> Result<String> {
        let replica_sets: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
        let replica_set = replica_sets
            .get(name)
            .await
            .with_context(|| format!("failed to get ReplicaSet {namespace}/{name}"))?;
        let plan = plan_rollback(&replica_set)?;

        let deployments: Api<DynamicObject> =
            self.dynamic_api(ResourceKind::Deployments, Some(namespace));
        let _ = deployments
            .patch(
                &plan.deployment,
                &PatchParams::default(),
                &Patch::Strategic(&plan.patch),
            )
            .await
            .with_context(|| format!("failed to patch Deployment {namespace}/{}", plan.deployment))?;

        Ok(format!(
            "Rolled back Deployment {namespace}/{} to revision {}",
            plan.deployment, plan.revision
        ))
    }
}

fn selector_query(selector: &BTreeMap<String, String>) -> String {
    selector
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn selector_from_object(kind: ResourceKind, object: &DynamicObject) -> Option<String> {
    let selector = object.data.get("spec")?.get("selector")?;
    let labels = match kind {
        ResourceKind::Services => selector,
        _ => selector.get("matchLabels")?,
    };
    let labels = serde_json::from_value::<BTreeMap<String, String>>(labels.clone()).ok()?;
    if labels.is_empty() {
        None
    } else {
        Some(selector_query(&labels))
    }
}

#[derive(Debug)]
struct RollbackPlan {
    deployment: String,
    revision: i64,
    patch: Value,
}

fn plan_rollback(replica_set: &ReplicaSet) -> Result<RollbackPlan> {
    let name = replica_set.name_any();
    let revision = replica_set
        .annotations()
        .get(REVISION_ANNOTATION)
        .with_context(|| format!("ReplicaSet {name} has no revision annotation"))?;
    let revision = revision
        .parse::<i64>()
        .with_context(|| format!("invalid revision '{revision}' on ReplicaSet {name}"))?;

    let replicas = replica_set
        .status
        .as_ref()
        .map_or(0, |status| status.replicas);
    if replicas != 0 {
        bail!("ReplicaSet {name} is the active revision; nothing to roll back to");
    }

    let deployment = replica_set
        .owner_references()
        .iter()
        .find(|owner| owner.controller == Some(true) && owner.kind == "Deployment")
        .map(|owner| owner.name.clone())
        .with_context(|| format!("ReplicaSet {name} is not controlled by a Deployment"))?;

    let mut template = replica_set
        .spec
        .as_ref()
        .and_then(|spec| spec.template.clone())
        .with_context(|| format!("ReplicaSet {name} has no pod template"))?;
    if let Some(labels) = template
        .metadata
        .as_mut()
        .and_then(|metadata| metadata.labels.as_mut())
    {
        labels.remove(POD_TEMPLATE_HASH);
    }

    let mut template = serde_json::to_value(template).context("failed to encode pod template")?;
    if let Value::Object(fields) = &mut template {
        fields.insert("$patch".to_string(), Value::String("replace".to_string()));
    }

    Ok(RollbackPlan {
        deployment,
        revision,
        patch: serde_json::json!({ "spec": { "template": template } }),
    })
}

pub async fn run_kubectl_port_forward(
    kind: ResourceKind,
    namespace: &str,
    name: &str,
    local_port: u16,
    remote_port: u16,
) -> Result<(u32, tokio::process::Child)> {
    let target = match kind {
        ResourceKind::Pods => format!("pod/{name}"),
        ResourceKind::Services => format!("service/{name}"),
        _ => bail!("port-forward only supports pods and services"),
    };

    let child = TokioCommand::new("kubectl")
        .arg("port-forward")
        .arg("-n")
        .arg(namespace)
        .arg(&target)
        .arg(format!("{local_port}:{remote_port}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn port-forward for {namespace}/{target}"))?;

    let pid = child
        .id()
        .context("failed to determine process id for kubectl port-forward")?;

    Ok((pid, child))
}

/// Waits for a port-forward child and reports its exit on the UI queue.
pub fn watch_port_forward(
    mut child: tokio::process::Child,
    exit: PortForwardExit,
    tx: mpsc::UnboundedSender<UiEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = child.wait().await.map_err(|error| error.to_string());
        let _ = tx.send(UiEvent::PortForwardExit(PortForwardExit { result, ..exit }));
    })
}

#[cfg(test)]
mod tests {
    use super::{plan_rollback, selector_from_object};
    use crate::model::ResourceKind;
    use k8s_openapi::api::apps::v1::ReplicaSet;
    use kube::core::DynamicObject;
    use serde_json::json;

    fn replica_set(replicas: i32) -> ReplicaSet {
        serde_json::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "ReplicaSet",
            "metadata": {
                "name": "web-5d9c",
                "namespace": "shop",
                "annotations": {"deployment.kubernetes.io/revision": "3"},
                "ownerReferences": [{
                    "apiVersion": "apps/v1", "kind": "Deployment", "name": "web",
                    "uid": "1", "controller": true,
                }],
            },
            "spec": {
                "selector": {"matchLabels": {"app": "web"}},
                "template": {
                    "metadata": {"labels": {"app": "web", "pod-template-hash": "5d9c"}},
                    "spec": {"containers": [{"name": "app", "image": "nginx:1.25"}]},
                },
            },
            "status": {"replicas": replicas},
        }))
        .expect("valid replica set")
    }

    #[test]
    fn rollback_targets_owner_with_clean_template() {
        let plan = plan_rollback(&replica_set(0)).expect("plan");
        assert_eq!(plan.deployment, "web");
        assert_eq!(plan.revision, 3);

        let template = &plan.patch["spec"]["template"];
        assert_eq!(template["$patch"], "replace");
        assert_eq!(template["metadata"]["labels"], json!({"app": "web"}));
        assert_eq!(template["spec"]["containers"][0]["image"], "nginx:1.25");
    }

    #[test]
    fn rollback_refuses_the_active_replicaset() {
        let error = plan_rollback(&replica_set(2)).expect_err("active revision");
        assert!(error.to_string().contains("active revision"));
    }

    #[test]
    fn selectors_come_from_match_labels_or_service_spec() {
        let deployment: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web", "namespace": "shop"},
            "spec": {"selector": {"matchLabels": {"tier": "front", "app": "web"}}},
        }))
        .expect("dynamic object");
        assert_eq!(
            selector_from_object(ResourceKind::Deployments, &deployment).as_deref(),
            Some("app=web,tier=front")
        );

        let service: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {"name": "web", "namespace": "shop"},
            "spec": {"selector": {"app": "web"}},
        }))
        .expect("dynamic object");
        assert_eq!(
            selector_from_object(ResourceKind::Services, &service).as_deref(),
            Some("app=web")
        );

        let headless: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {"name": "ext", "namespace": "shop"},
            "spec": {"type": "ExternalName"},
        }))
        .expect("dynamic object");
        assert_eq!(selector_from_object(ResourceKind::Services, &headless), None);
    }
}
