use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use kube::core::DynamicObject;

use super::{
    ColorerFn, RenderError, Renderer, RowColor, SortBinding, cap_width, convert, count,
    default_colorer, field_at, human_age, meta_fields, name_offset, namespaced_header,
    to_containers,
};
use crate::model::NamespaceScope;
use crate::sort::compare_numeric;
use crate::table::{Header, HeaderRow, Row, RowEvent, RowEventKind};

const DESIRED_CURRENT: &[SortBinding] = &[
    SortBinding {
        key: 'D',
        label: "Desired",
        offset: 1,
    },
    SortBinding {
        key: 'C',
        label: "Current",
        offset: 2,
    },
];

#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentRenderer;

impl Renderer for DeploymentRenderer {
    fn header(&self, scope: &NamespaceScope) -> HeaderRow {
        namespaced_header(
            scope,
            [
                Header::new("NAME"),
                Header::new("READY").numeric(),
                Header::new("UP-TO-DATE").numeric(),
                Header::new("AVAILABLE").numeric(),
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
        let deployment: Deployment = convert(object)?;
        meta_fields(&deployment, scope, row)?;

        let desired = deployment
            .spec
            .as_ref()
            .and_then(|spec| spec.replicas)
            .unwrap_or(1);
        let status = deployment.status.as_ref();
        row.fields.extend([
            format!(
                "{}/{desired}",
                status.and_then(|status| status.ready_replicas).unwrap_or(0)
            ),
            count(status.and_then(|status| status.updated_replicas)),
            count(status.and_then(|status| status.available_replicas)),
            human_age(deployment.metadata.creation_timestamp.as_ref()),
        ]);
        Ok(())
    }

    fn colorer(&self) -> ColorerFn {
        ready_ratio_colorer
    }

    fn sort_bindings(&self) -> &'static [SortBinding] {
        &[SortBinding {
            key: 'R',
            label: "Ready",
            offset: 1,
        }]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplicaSetRenderer;

impl Renderer for ReplicaSetRenderer {
    fn header(&self, scope: &NamespaceScope) -> HeaderRow {
        namespaced_header(
            scope,
            [
                Header::new("NAME"),
                Header::new("DESIRED").numeric(),
                Header::new("CURRENT").numeric(),
                Header::new("READY").numeric(),
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
        let replica_set: ReplicaSet = convert(object)?;
        meta_fields(&replica_set, scope, row)?;

        let status = replica_set.status.as_ref();
        row.fields.extend([
            count(replica_set.spec.as_ref().and_then(|spec| spec.replicas)),
            count(status.map(|status| status.replicas)),
            count(status.and_then(|status| status.ready_replicas)),
            human_age(replica_set.metadata.creation_timestamp.as_ref()),
        ]);
        Ok(())
    }

    fn colorer(&self) -> ColorerFn {
        desired_ready_colorer
    }

    fn sort_bindings(&self) -> &'static [SortBinding] {
        DESIRED_CURRENT
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DaemonSetRenderer;

impl Renderer for DaemonSetRenderer {
    fn header(&self, scope: &NamespaceScope) -> HeaderRow {
        namespaced_header(
            scope,
            [
                Header::new("NAME"),
                Header::new("DESIRED").numeric(),
                Header::new("CURRENT").numeric(),
                Header::new("READY").numeric(),
                Header::new("UP-TO-DATE").numeric(),
                Header::new("AVAILABLE").numeric(),
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
        let daemon_set: DaemonSet = convert(object)?;
        meta_fields(&daemon_set, scope, row)?;

        let status = daemon_set.status.as_ref();
        row.fields.extend([
            count(status.map(|status| status.desired_number_scheduled)),
            count(status.map(|status| status.current_number_scheduled)),
            count(status.map(|status| status.number_ready)),
            count(status.and_then(|status| status.updated_number_scheduled)),
            count(status.and_then(|status| status.number_available)),
            human_age(daemon_set.metadata.creation_timestamp.as_ref()),
        ]);
        Ok(())
    }

    fn colorer(&self) -> ColorerFn {
        desired_ready_colorer
    }

    fn sort_bindings(&self) -> &'static [SortBinding] {
        DESIRED_CURRENT
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatefulSetRenderer;

impl Renderer for StatefulSetRenderer {
    fn header(&self, scope: &NamespaceScope) -> HeaderRow {
        namespaced_header(
            scope,
            [
                Header::new("NAME"),
                Header::new("READY").numeric(),
                Header::new("CONTAINERS"),
                Header::new("IMAGES").decorated(cap_width),
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
        let stateful_set: StatefulSet = convert(object)?;
        meta_fields(&stateful_set, scope, row)?;

        let spec = stateful_set.spec.as_ref();
        let desired = spec.and_then(|spec| spec.replicas).unwrap_or(1);
        let ready = stateful_set
            .status
            .as_ref()
            .and_then(|status| status.ready_replicas)
            .unwrap_or(0);
        let (containers, images) =
            to_containers(spec.and_then(|spec| spec.template.spec.as_ref()));
        row.fields.extend([
            format!("{ready}/{desired}"),
            containers,
            images,
            human_age(stateful_set.metadata.creation_timestamp.as_ref()),
        ]);
        Ok(())
    }

    fn colorer(&self) -> ColorerFn {
        ready_ratio_colorer
    }
}

/// Flags rows whose `ready/desired` column is short of the target.
fn ready_ratio_colorer(scope: &NamespaceScope, event: &RowEvent) -> RowColor {
    if event.kind == RowEventKind::Delete {
        return RowColor::Deleted;
    }
    match field_at(event, name_offset(scope) + 1).split_once('/') {
        Some((ready, desired)) if compare_numeric(ready, desired).is_ne() => RowColor::Error,
        _ => default_colorer(scope, event),
    }
}

/// Flags rows whose DESIRED and READY counts disagree.
fn desired_ready_colorer(scope: &NamespaceScope, event: &RowEvent) -> RowColor {
    if event.kind == RowEventKind::Delete {
        return RowColor::Deleted;
    }
    let offset = name_offset(scope);
    if field_at(event, offset + 1) != field_at(event, offset + 3) {
        return RowColor::Error;
    }
    default_colorer(scope, event)
}
