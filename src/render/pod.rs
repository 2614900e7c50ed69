use k8s_openapi::api::core::v1::{Pod, PodStatus};
use kube::core::DynamicObject;

use super::{
    ColorerFn, RenderError, Renderer, RowColor, SortBinding, convert, default_colorer, field_at,
    human_age, meta_fields, name_offset, namespaced_header,
};
use crate::model::NamespaceScope;
use crate::table::{Header, HeaderRow, MISSING_VALUE, Row, RowEvent, RowEventKind};

const STATUS_OFFSET: usize = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct PodRenderer;

impl Renderer for PodRenderer {
    fn header(&self, scope: &NamespaceScope) -> HeaderRow {
        namespaced_header(
            scope,
            [
                Header::new("NAME"),
                Header::new("READY").numeric(),
                Header::new("STATUS"),
                Header::new("RESTARTS").numeric(),
                Header::new("IP"),
                Header::new("NODE"),
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
        let pod: Pod = convert(object)?;
        meta_fields(&pod, scope, row)?;

        let (ready, total, restarts) = pod.status.as_ref().map(readiness).unwrap_or((0, 0, 0));
        let ip = pod
            .status
            .as_ref()
            .and_then(|status| status.pod_ip.clone())
            .unwrap_or_else(|| MISSING_VALUE.to_string());
        let node = pod
            .spec
            .as_ref()
            .and_then(|spec| spec.node_name.clone())
            .unwrap_or_else(|| MISSING_VALUE.to_string());

        row.fields.extend([
            format!("{ready}/{total}"),
            pod_phase(&pod),
            restarts.to_string(),
            ip,
            node,
            human_age(pod.metadata.creation_timestamp.as_ref()),
        ]);
        Ok(())
    }

    fn colorer(&self) -> ColorerFn {
        pod_colorer
    }

    fn sort_bindings(&self) -> &'static [SortBinding] {
        &[
            SortBinding {
                key: 'R',
                label: "Ready",
                offset: 1,
            },
            SortBinding {
                key: 'S',
                label: "Status",
                offset: 2,
            },
            SortBinding {
                key: 'T',
                label: "Restarts",
                offset: 3,
            },
        ]
    }
}

fn readiness(status: &PodStatus) -> (usize, usize, i32) {
    let containers = status.container_statuses.as_deref().unwrap_or(&[]);
    let ready = containers.iter().filter(|container| container.ready).count();
    let restarts = containers
        .iter()
        .map(|container| container.restart_count)
        .sum();
    (ready, containers.len(), restarts)
}

/// Phase as kubectl reports it: container waiting/terminated reasons and
/// init progress win over the raw pod phase.
pub(crate) fn pod_phase(pod: &Pod) -> String {
    if pod.metadata.deletion_timestamp.is_some() {
        return "Terminating".to_string();
    }

    let Some(status) = pod.status.as_ref() else {
        return "Pending".to_string();
    };
    let mut phase = status
        .reason
        .clone()
        .or_else(|| status.phase.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let init = status.init_container_statuses.as_deref().unwrap_or(&[]);
    for (index, container) in init.iter().enumerate() {
        let state = container.state.as_ref();
        if let Some(terminated) = state.and_then(|state| state.terminated.as_ref()) {
            if terminated.exit_code == 0 {
                continue;
            }
            return format!(
                "Init:{}",
                terminated
                    .reason
                    .clone()
                    .unwrap_or_else(|| format!("ExitCode:{}", terminated.exit_code))
            );
        }
        if let Some(reason) = state
            .and_then(|state| state.waiting.as_ref())
            .and_then(|waiting| waiting.reason.clone())
            .filter(|reason| reason != "PodInitializing")
        {
            return format!("Init:{reason}");
        }
        return format!("Init:{index}/{}", init.len());
    }

    for container in status.container_statuses.iter().flatten().rev() {
        let Some(state) = container.state.as_ref() else {
            continue;
        };
        if let Some(reason) = state.waiting.as_ref().and_then(|waiting| waiting.reason.clone()) {
            phase = reason;
        } else if let Some(terminated) = state.terminated.as_ref() {
            phase = terminated.reason.clone().unwrap_or_else(|| match terminated.signal {
                Some(signal) => format!("Signal:{signal}"),
                None => format!("ExitCode:{}", terminated.exit_code),
            });
        }
    }

    phase
}

fn pod_colorer(scope: &NamespaceScope, event: &RowEvent) -> RowColor {
    if event.kind == RowEventKind::Delete {
        return RowColor::Deleted;
    }

    let status = field_at(event, name_offset(scope) + STATUS_OFFSET);
    match status {
        "Running" => default_colorer(scope, event),
        "Completed" | "Succeeded" => RowColor::Completed,
        "Pending" | "ContainerCreating" | "PodInitializing" | "Terminating" => RowColor::Pending,
        status if status.starts_with("Init:") && !status.contains("Err") => RowColor::Pending,
        _ => RowColor::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::PodRenderer;
    use crate::model::NamespaceScope;
    use crate::render::tests::{dynamic, named, render_row};
    use crate::render::{Renderer, RowColor};
    use crate::table::{Deltas, RowEvent, RowEventKind};
    use serde_json::json;

    fn pod(phase: &str, waiting: Option<&str>) -> kube::core::DynamicObject {
        let state = match waiting {
            Some(reason) => json!({"waiting": {"reason": reason}}),
            None => json!({"running": {}}),
        };
        dynamic(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "web-0", "namespace": "shop"},
            "spec": {
                "nodeName": "node-a",
                "containers": [{"name": "app", "image": "nginx"}, {"name": "proxy", "image": "envoy"}],
            },
            "status": {
                "phase": phase,
                "podIP": "10.0.0.7",
                "containerStatuses": [
                    {"name": "app", "image": "nginx", "imageID": "", "ready": true, "restartCount": 2, "state": {"running": {}}},
                    {"name": "proxy", "image": "envoy", "imageID": "", "ready": waiting.is_none(), "restartCount": 1, "state": state},
                ],
            },
        }))
    }

    #[test]
    fn renders_readiness_restarts_and_placement() {
        let row = render_row(&PodRenderer, &pod("Running", None), &named());
        assert_eq!(row.id, "shop/web-0");
        assert_eq!(row.fields[..6], ["web-0", "2/2", "Running", "3", "10.0.0.7", "node-a"]);
    }

    #[test]
    fn all_namespace_scope_leads_with_namespace() {
        let row = render_row(&PodRenderer, &pod("Running", None), &NamespaceScope::All);
        assert_eq!(row.fields[0], "shop");
        assert_eq!(row.fields[1], "web-0");
    }

    #[test]
    fn waiting_reason_replaces_phase_and_colors_error() {
        let scope = named();
        let row = render_row(&PodRenderer, &pod("Running", Some("CrashLoopBackOff")), &scope);
        assert_eq!(row.fields[2], "CrashLoopBackOff");
        assert_eq!(row.fields[1], "1/2");

        let arity = row.fields.len();
        let event = RowEvent {
            row,
            kind: RowEventKind::Unchanged,
            deltas: Deltas::blank(arity),
        };
        assert_eq!((PodRenderer.colorer())(&scope, &event), RowColor::Error);
    }

    #[test]
    fn pending_pods_use_pending_color() {
        let scope = named();
        let row = render_row(&PodRenderer, &pod("Pending", Some("ContainerCreating")), &scope);
        let event = RowEvent {
            row,
            kind: RowEventKind::Add,
            deltas: Deltas::default(),
        };
        assert_eq!((PodRenderer.colorer())(&scope, &event), RowColor::Pending);
    }

    #[test]
    fn non_pod_objects_fail_conversion() {
        let service = dynamic(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {"name": "web", "namespace": "shop"},
        }));
        let mut row = crate::table::Row::default();
        assert!(PodRenderer.render(&service, &named(), &mut row).is_err());
    }
}
