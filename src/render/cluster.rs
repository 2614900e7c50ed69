use k8s_openapi::api::core::v1::{Event, Namespace, Node};
use kube::core::DynamicObject;

use super::{
    ColorerFn, RenderError, Renderer, RowColor, SortBinding, cap_width, cluster_meta_fields,
    convert, default_colorer, field_at, human_age, human_age_timestamp, labels_summary,
    meta_fields, name_offset, namespaced_header,
};
use crate::model::NamespaceScope;
use crate::table::{Header, HeaderRow, MISSING_VALUE, Row, RowEvent, RowEventKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct NodeRenderer;

impl Renderer for NodeRenderer {
    fn header(&self, _scope: &NamespaceScope) -> HeaderRow {
        HeaderRow(vec![
            Header::new("NAME"),
            Header::new("STATUS"),
            Header::new("ROLES"),
            Header::new("VERSION"),
            Header::new("AGE").age(),
        ])
    }

    fn render(
        &self,
        object: &DynamicObject,
        _scope: &NamespaceScope,
        row: &mut Row,
    ) -> Result<(), RenderError> {
        let node: Node = convert(object)?;
        cluster_meta_fields(&node, row)?;

        let version = node
            .status
            .as_ref()
            .and_then(|status| status.node_info.as_ref())
            .map(|info| info.kubelet_version.clone())
            .unwrap_or_else(|| MISSING_VALUE.to_string());
        row.fields.extend([
            node_status(&node),
            node_roles(&node),
            version,
            human_age(node.metadata.creation_timestamp.as_ref()),
        ]);
        Ok(())
    }

    fn colorer(&self) -> ColorerFn {
        node_colorer
    }
}

fn node_status(node: &Node) -> String {
    let ready = node
        .status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .and_then(|conditions| conditions.iter().find(|condition| condition.type_ == "Ready"))
        .map(|condition| condition.status == "True");
    let mut status = match ready {
        Some(true) => "Ready".to_string(),
        Some(false) => "NotReady".to_string(),
        None => "Unknown".to_string(),
    };
    if node
        .spec
        .as_ref()
        .and_then(|spec| spec.unschedulable)
        .unwrap_or(false)
    {
        status.push_str(",SchedulingDisabled");
    }
    status
}

fn node_roles(node: &Node) -> String {
    let Some(labels) = node.metadata.labels.as_ref() else {
        return MISSING_VALUE.to_string();
    };

    let mut roles = labels
        .keys()
        .filter_map(|key| key.strip_prefix("node-role.kubernetes.io/"))
        .map(|role| {
            if role.is_empty() {
                "worker".to_string()
            } else {
                role.to_string()
            }
        })
        .collect::<Vec<_>>();
    if roles.is_empty()
        && let Some(role) = labels.get("kubernetes.io/role")
    {
        roles.push(role.clone());
    }

    if roles.is_empty() {
        MISSING_VALUE.to_string()
    } else {
        roles.sort();
        roles.dedup();
        roles.join(",")
    }
}

fn node_colorer(scope: &NamespaceScope, event: &RowEvent) -> RowColor {
    if event.kind != RowEventKind::Delete {
        let status = field_at(event, 1);
        if status.starts_with("NotReady") || status.starts_with("Unknown") {
            return RowColor::Error;
        }
        if status.contains("SchedulingDisabled") {
            return RowColor::Pending;
        }
    }
    default_colorer(scope, event)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NamespaceRenderer;

impl Renderer for NamespaceRenderer {
    fn header(&self, _scope: &NamespaceScope) -> HeaderRow {
        HeaderRow(vec![
            Header::new("NAME"),
            Header::new("STATUS"),
            Header::new("LABELS").decorated(cap_width),
            Header::new("AGE").age(),
        ])
    }

    fn render(
        &self,
        object: &DynamicObject,
        _scope: &NamespaceScope,
        row: &mut Row,
    ) -> Result<(), RenderError> {
        let namespace: Namespace = convert(object)?;
        cluster_meta_fields(&namespace, row)?;

        row.fields.extend([
            namespace
                .status
                .as_ref()
                .and_then(|status| status.phase.clone())
                .unwrap_or_else(|| "Active".to_string()),
            labels_summary(&namespace),
            human_age(namespace.metadata.creation_timestamp.as_ref()),
        ]);
        Ok(())
    }

    fn colorer(&self) -> ColorerFn {
        namespace_colorer
    }
}

fn namespace_colorer(scope: &NamespaceScope, event: &RowEvent) -> RowColor {
    if event.kind != RowEventKind::Delete && field_at(event, 1) == "Terminating" {
        return RowColor::Pending;
    }
    default_colorer(scope, event)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EventRenderer;

impl Renderer for EventRenderer {
    fn header(&self, scope: &NamespaceScope) -> HeaderRow {
        namespaced_header(
            scope,
            [
                Header::new("NAME"),
                Header::new("TYPE"),
                Header::new("REASON"),
                Header::new("OBJECT"),
                Header::new("COUNT").numeric(),
                Header::new("MESSAGE").decorated(cap_width),
                Header::new("AGE").age(),
            ],
        )
    }

    fn render(
        &self,
        object: &DynamicObject,
        scope: &NamespaceScope,
        row: &mut Row,
    ) -> Result<(), RenderError> {
        let event: Event = convert(object)?;
        meta_fields(&event, scope, row)?;

        let involved = &event.involved_object;
        let target = format!(
            "{}/{}",
            involved.kind.as_deref().unwrap_or("?").to_ascii_lowercase(),
            involved.name.as_deref().unwrap_or(MISSING_VALUE)
        );
        row.fields.extend([
            event.type_.clone().unwrap_or_else(|| "Normal".to_string()),
            event
                .reason
                .clone()
                .unwrap_or_else(|| MISSING_VALUE.to_string()),
            target,
            event.count.unwrap_or(1).to_string(),
            event
                .message
                .as_deref()
                .map(|message| message.replace('\n', " "))
                .unwrap_or_else(|| MISSING_VALUE.to_string()),
            event_age(&event),
        ]);
        Ok(())
    }

    fn colorer(&self) -> ColorerFn {
        event_colorer
    }

    fn sort_bindings(&self) -> &'static [SortBinding] {
        &[
            SortBinding {
                key: 'T',
                label: "Type",
                offset: 1,
            },
            SortBinding {
                key: 'R',
                label: "Reason",
                offset: 2,
            },
            SortBinding {
                key: 'O',
                label: "Count",
                offset: 4,
            },
        ]
    }
}

fn event_age(event: &Event) -> String {
    if let Some(event_time) = event.event_time.as_ref() {
        return human_age_timestamp(event_time.0);
    }
    if let Some(last_timestamp) = event.last_timestamp.as_ref() {
        return human_age(Some(last_timestamp));
    }
    if let Some(first_timestamp) = event.first_timestamp.as_ref() {
        return human_age(Some(first_timestamp));
    }
    human_age(event.metadata.creation_timestamp.as_ref())
}

fn event_colorer(scope: &NamespaceScope, event: &RowEvent) -> RowColor {
    if event.kind != RowEventKind::Delete && field_at(event, name_offset(scope) + 1) == "Warning" {
        return RowColor::Error;
    }
    default_colorer(scope, event)
}
