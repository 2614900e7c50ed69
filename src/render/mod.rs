//! Per-kind projection of raw API objects into table rows.

mod batch;
mod cluster;
mod config;
mod generic;
mod pod;
mod service;
mod workload;

use std::collections::HashMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::PodSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;
use kube::core::DynamicObject;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::model::{NamespaceScope, ResourceKind, fqn};
use crate::table::{
    Header, HeaderRow, MISSING_VALUE, NAMESPACE_COLUMN, Row, RowEvent, RowEventKind, TableData,
};

pub use batch::{CronJobRenderer, JobRenderer};
pub use cluster::{EventRenderer, NamespaceRenderer, NodeRenderer};
pub use config::{ConfigMapRenderer, SecretRenderer};
pub use generic::GenericRenderer;
pub use pod::PodRenderer;
pub use service::ServiceRenderer;
pub use workload::{
    DaemonSetRenderer, DeploymentRenderer, ReplicaSetRenderer, StatefulSetRenderer,
};

/// Number of list entries shown before folding the rest into `(+N)...`.
const MAX_SHOW: usize = 2;
const WIDE_COLUMN: usize = 48;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("expected {expected} for {id}: {source}")]
    Conversion {
        expected: &'static str,
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{kind} object without a name")]
    MissingName { kind: &'static str },
    #[error("row {id} has {actual} fields but the header has {expected}")]
    Arity {
        id: String,
        expected: usize,
        actual: usize,
    },
}

/// Semantic row color; mapped onto the configured palette when drawn.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum RowColor {
    Normal,
    Added,
    Modified,
    Deleted,
    Error,
    Pending,
    Completed,
}

pub type ColorerFn = fn(&NamespaceScope, &RowEvent) -> RowColor;

/// Kind-specific sort shortcut: `offset` is relative to the NAME column,
/// with `-1` meaning the last column and `-2` the namespace column.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SortBinding {
    pub key: char,
    pub label: &'static str,
    pub offset: isize,
}

pub trait Renderer: Send + Sync {
    fn header(&self, scope: &NamespaceScope) -> HeaderRow;

    /// Fills `row.id` and `row.fields` in header order.
    fn render(
        &self,
        object: &DynamicObject,
        scope: &NamespaceScope,
        row: &mut Row,
    ) -> Result<(), RenderError>;

    fn colorer(&self) -> ColorerFn {
        default_colorer
    }

    fn sort_bindings(&self) -> &'static [SortBinding] {
        &[]
    }
}

pub fn default_colorer(_scope: &NamespaceScope, event: &RowEvent) -> RowColor {
    match event.kind {
        RowEventKind::Add => RowColor::Added,
        RowEventKind::Update => RowColor::Modified,
        RowEventKind::Delete => RowColor::Deleted,
        RowEventKind::Unchanged => RowColor::Normal,
    }
}

#[derive(Clone)]
pub struct Registry {
    renderers: HashMap<ResourceKind, Arc<dyn Renderer>>,
    fallback: Arc<dyn Renderer>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Registry {
    /// Registry with no kind-specific renderers; every kind uses the
    /// NAME/LABELS/AGE fallback.
    pub fn empty() -> Self {
        Self {
            renderers: HashMap::new(),
            fallback: Arc::new(GenericRenderer::new(true)),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(ResourceKind::Pods, PodRenderer);
        registry.register(ResourceKind::Deployments, DeploymentRenderer);
        registry.register(ResourceKind::ReplicaSets, ReplicaSetRenderer);
        registry.register(ResourceKind::DaemonSets, DaemonSetRenderer);
        registry.register(ResourceKind::StatefulSets, StatefulSetRenderer);
        registry.register(ResourceKind::Jobs, JobRenderer);
        registry.register(ResourceKind::CronJobs, CronJobRenderer);
        registry.register(ResourceKind::Services, ServiceRenderer);
        registry.register(ResourceKind::ConfigMaps, ConfigMapRenderer);
        registry.register(ResourceKind::Secrets, SecretRenderer);
        registry.register(ResourceKind::Nodes, NodeRenderer);
        registry.register(ResourceKind::Namespaces, NamespaceRenderer);
        registry.register(ResourceKind::Events, EventRenderer);
        registry
    }

    pub fn register<R>(&mut self, kind: ResourceKind, renderer: R)
    where
        R: Renderer + 'static,
    {
        self.renderers.insert(kind, Arc::new(renderer));
    }

    pub fn get(&self, kind: ResourceKind) -> Arc<dyn Renderer> {
        match self.renderers.get(&kind) {
            Some(renderer) => Arc::clone(renderer),
            None if kind.namespaced() => Arc::clone(&self.fallback),
            None => Arc::new(GenericRenderer::new(false)),
        }
    }
}

/// Renders every object into one snapshot. Objects that fail to render are
/// skipped and returned alongside the table.
pub fn build_snapshot<'a, I>(
    renderer: &dyn Renderer,
    kind: ResourceKind,
    objects: I,
    scope: &NamespaceScope,
) -> (TableData, Vec<RenderError>)
where
    I: IntoIterator<Item = &'a DynamicObject>,
{
    let mut data = TableData::new(scope.clone(), renderer.header(scope));
    let mut failures = Vec::new();

    for object in objects {
        let mut row = Row::default();
        if let Err(error) = renderer.render(object, scope, &mut row) {
            warn!(kind = %kind, object = %object.name_any(), error = %error, "skipping row");
            failures.push(error);
            continue;
        }
        row.labels = object.labels().clone();
        if let Err(row) = data.push(row) {
            let error = RenderError::Arity {
                id: row.id,
                expected: data.header.len(),
                actual: row.fields.len(),
            };
            warn!(kind = %kind, error = %error, "skipping row");
            failures.push(error);
        }
    }

    (data, failures)
}

/// Converts a dynamic object into its typed form.
pub(crate) fn convert<K>(object: &DynamicObject) -> Result<K, RenderError>
where
    K: k8s_openapi::Resource + DeserializeOwned,
{
    let id = fqn(object.metadata.namespace.as_deref(), &object.name_any());
    let conversion = |source| RenderError::Conversion {
        expected: K::KIND,
        id: id.clone(),
        source,
    };

    let mut value = serde_json::to_value(object).map_err(conversion)?;
    if let Value::Object(map) = &mut value {
        map.entry("apiVersion")
            .or_insert_with(|| Value::String(K::API_VERSION.to_string()));
        map.entry("kind")
            .or_insert_with(|| Value::String(K::KIND.to_string()));
    }
    serde_json::from_value(value).map_err(conversion)
}

/// Row identity and leading NAMESPACE/NAME fields shared by namespaced kinds.
pub(crate) fn meta_fields<K>(
    resource: &K,
    scope: &NamespaceScope,
    row: &mut Row,
) -> Result<(), RenderError>
where
    K: kube::Resource + k8s_openapi::Resource,
{
    let name = resource
        .meta()
        .name
        .clone()
        .ok_or(RenderError::MissingName {
            kind: <K as k8s_openapi::Resource>::KIND,
        })?;
    let namespace = resource.meta().namespace.clone();

    row.id = fqn(namespace.as_deref(), &name);
    row.fields.clear();
    if scope.is_all() {
        row.fields
            .push(namespace.unwrap_or_else(|| MISSING_VALUE.to_string()));
    }
    row.fields.push(name);
    Ok(())
}

/// Identity and NAME field for cluster-scoped kinds.
pub(crate) fn cluster_meta_fields<K>(resource: &K, row: &mut Row) -> Result<(), RenderError>
where
    K: kube::Resource + k8s_openapi::Resource,
{
    let name = resource
        .meta()
        .name
        .clone()
        .ok_or(RenderError::MissingName {
            kind: <K as k8s_openapi::Resource>::KIND,
        })?;
    row.id = name.clone();
    row.fields.clear();
    row.fields.push(name);
    Ok(())
}

/// Header for a namespaced kind: NAMESPACE leads only in all-namespace scope.
pub(crate) fn namespaced_header<I>(scope: &NamespaceScope, columns: I) -> HeaderRow
where
    I: IntoIterator<Item = Header>,
{
    let mut header = Vec::new();
    if scope.is_all() {
        header.push(Header::new(NAMESPACE_COLUMN));
    }
    header.extend(columns);
    HeaderRow(header)
}

/// Column offset of NAME for colorers that read fields by position.
pub(crate) fn name_offset(scope: &NamespaceScope) -> usize {
    usize::from(scope.is_all())
}

pub(crate) fn field_at<'a>(event: &'a RowEvent, index: usize) -> &'a str {
    event.row.fields.get(index).map(String::as_str).unwrap_or(MISSING_VALUE)
}

/// Joins container names and images, init containers first.
pub(crate) fn to_containers(spec: Option<&PodSpec>) -> (String, String) {
    let Some(spec) = spec else {
        return (MISSING_VALUE.to_string(), MISSING_VALUE.to_string());
    };

    let containers = spec
        .init_containers
        .iter()
        .flatten()
        .chain(spec.containers.iter())
        .collect::<Vec<_>>();
    let names = containers
        .iter()
        .map(|container| container.name.clone())
        .collect::<Vec<_>>();
    let images = containers
        .iter()
        .map(|container| container.image.clone().unwrap_or_default())
        .collect::<Vec<_>>();

    (cap_list(names), cap_list(images))
}

pub(crate) fn cap_list(mut values: Vec<String>) -> String {
    if values.is_empty() {
        return MISSING_VALUE.to_string();
    }
    if values.len() > MAX_SHOW {
        let extra = values.len() - MAX_SHOW;
        values.truncate(MAX_SHOW);
        values.push(format!("(+{extra})..."));
    }
    values.join(",")
}

pub(crate) fn labels_summary<K: kube::Resource>(resource: &K) -> String {
    match resource.meta().labels.as_ref() {
        Some(labels) if !labels.is_empty() => labels
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(","),
        _ => MISSING_VALUE.to_string(),
    }
}

/// Column decorator that caps long values.
pub fn cap_width(value: &str) -> String {
    truncate(value, WIDE_COLUMN)
}

pub(crate) fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }

    let mut out = value
        .chars()
        .take(max.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

pub(crate) fn human_age(timestamp: Option<&Time>) -> String {
    let Some(timestamp) = timestamp else {
        return MISSING_VALUE.to_string();
    };

    human_age_timestamp(timestamp.0)
}

pub(crate) fn human_age_timestamp(ts: k8s_openapi::jiff::Timestamp) -> String {
    let elapsed_seconds =
        (k8s_openapi::jiff::Timestamp::now().as_second() - ts.as_second()).max(0);
    format_elapsed_seconds(elapsed_seconds)
}

pub(crate) fn format_elapsed_seconds(seconds: i64) -> String {
    if seconds >= 86_400 {
        return format!("{}d", seconds / 86_400);
    }

    if seconds >= 3_600 {
        return format!("{}h", seconds / 3_600);
    }

    if seconds >= 60 {
        return format!("{}m", seconds / 60);
    }

    format!("{seconds}s")
}

pub(crate) fn count(value: Option<i32>) -> String {
    value.unwrap_or(0).to_string()
}
