use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{ConfigMap, Event, Namespace, Node, Pod, Secret, Service};
use kube::core::ApiResource;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    Pods,
    Deployments,
    ReplicaSets,
    DaemonSets,
    StatefulSets,
    Jobs,
    CronJobs,
    Services,
    ConfigMaps,
    Secrets,
    Nodes,
    Namespaces,
    Events,
}

impl ResourceKind {
    pub const ALL: [Self; 13] = [
        Self::Pods,
        Self::Deployments,
        Self::ReplicaSets,
        Self::DaemonSets,
        Self::StatefulSets,
        Self::Jobs,
        Self::CronJobs,
        Self::Services,
        Self::ConfigMaps,
        Self::Secrets,
        Self::Nodes,
        Self::Namespaces,
        Self::Events,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Pods => "Pods",
            Self::Deployments => "Deployments",
            Self::ReplicaSets => "ReplicaSets",
            Self::DaemonSets => "DaemonSets",
            Self::StatefulSets => "StatefulSets",
            Self::Jobs => "Jobs",
            Self::CronJobs => "CronJobs",
            Self::Services => "Services",
            Self::ConfigMaps => "ConfigMaps",
            Self::Secrets => "Secrets",
            Self::Nodes => "Nodes",
            Self::Namespaces => "Namespaces",
            Self::Events => "Events",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "po" | "pod" | "pods" => Some(Self::Pods),
            "deploy" | "deployment" | "deployments" | "dp" => Some(Self::Deployments),
            "rs" | "replicaset" | "replicasets" | "replica-set" | "replica-sets" => {
                Some(Self::ReplicaSets)
            }
            "ds" | "daemonset" | "daemonsets" | "daemon-set" | "daemon-sets" => {
                Some(Self::DaemonSets)
            }
            "sts" | "statefulset" | "statefulsets" => Some(Self::StatefulSets),
            "job" | "jobs" => Some(Self::Jobs),
            "cj" | "cronjob" | "cronjobs" | "cron-job" | "cron-jobs" => Some(Self::CronJobs),
            "svc" | "service" | "services" => Some(Self::Services),
            "cm" | "configmap" | "configmaps" | "config-map" | "config-maps" => {
                Some(Self::ConfigMaps)
            }
            "secret" | "secrets" => Some(Self::Secrets),
            "no" | "node" | "nodes" => Some(Self::Nodes),
            "ns" | "namespace" | "namespaces" => Some(Self::Namespaces),
            "ev" | "event" | "events" => Some(Self::Events),
            _ => None,
        }
    }

    pub fn short_token(self) -> &'static str {
        match self {
            Self::Pods => "po",
            Self::Deployments => "deploy",
            Self::ReplicaSets => "rs",
            Self::DaemonSets => "ds",
            Self::StatefulSets => "sts",
            Self::Jobs => "job",
            Self::CronJobs => "cj",
            Self::Services => "svc",
            Self::ConfigMaps => "cm",
            Self::Secrets => "secret",
            Self::Nodes => "node",
            Self::Namespaces => "ns",
            Self::Events => "ev",
        }
    }

    /// Cluster-scoped kinds ignore the namespace scope entirely.
    pub fn namespaced(self) -> bool {
        !matches!(self, Self::Nodes | Self::Namespaces)
    }

    pub fn api_resource(self) -> ApiResource {
        match self {
            Self::Pods => ApiResource::erase::<Pod>(&()),
            Self::Deployments => ApiResource::erase::<Deployment>(&()),
            Self::ReplicaSets => ApiResource::erase::<ReplicaSet>(&()),
            Self::DaemonSets => ApiResource::erase::<DaemonSet>(&()),
            Self::StatefulSets => ApiResource::erase::<StatefulSet>(&()),
            Self::Jobs => ApiResource::erase::<Job>(&()),
            Self::CronJobs => ApiResource::erase::<CronJob>(&()),
            Self::Services => ApiResource::erase::<Service>(&()),
            Self::ConfigMaps => ApiResource::erase::<ConfigMap>(&()),
            Self::Secrets => ApiResource::erase::<Secret>(&()),
            Self::Nodes => ApiResource::erase::<Node>(&()),
            Self::Namespaces => ApiResource::erase::<Namespace>(&()),
            Self::Events => ApiResource::erase::<Event>(&()),
        }
    }

    /// Workloads whose pods can be listed through their label selector.
    pub fn has_pod_selector(self) -> bool {
        matches!(
            self,
            Self::Deployments
                | Self::ReplicaSets
                | Self::DaemonSets
                | Self::StatefulSets
                | Self::Jobs
                | Self::Services
        )
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum NamespaceScope {
    All,
    Named(String),
}

impl NamespaceScope {
    pub fn label(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Named(namespace) => namespace.clone(),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn from_token(token: &str) -> Self {
        match token.trim() {
            "" | "all" | "-A" | "*" => Self::All,
            namespace => Self::Named(namespace.to_string()),
        }
    }
}

impl Display for NamespaceScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Named(namespace) => write!(f, "{namespace}"),
        }
    }
}

/// Builds the stable row identity for an object.
pub fn fqn(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(namespace) if !namespace.is_empty() => format!("{namespace}/{name}"),
        _ => name.to_string(),
    }
}

/// Splits a row identity back into its namespace and name.
pub fn split_fqn(id: &str) -> (Option<&str>, &str) {
    match id.split_once('/') {
        Some((namespace, name)) => (Some(namespace), name),
        None => (None, id),
    }
}
