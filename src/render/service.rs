use k8s_openapi::api::core::v1::Service;
use kube::core::DynamicObject;

use super::{RenderError, Renderer, convert, human_age, meta_fields, namespaced_header};
use crate::model::NamespaceScope;
use crate::table::{Header, HeaderRow, MISSING_VALUE, Row};

#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceRenderer;

impl Renderer for ServiceRenderer {
    fn header(&self, scope: &NamespaceScope) -> HeaderRow {
        namespaced_header(
            scope,
            [
                Header::new("NAME"),
                Header::new("TYPE"),
                Header::new("CLUSTER-IP"),
                Header::new("EXTERNAL-IP"),
                Header::new("PORTS"),
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
        let service: Service = convert(object)?;
        meta_fields(&service, scope, row)?;

        let spec = service.spec.as_ref();
        row.fields.extend([
            spec.and_then(|spec| spec.type_.clone())
                .unwrap_or_else(|| "ClusterIP".to_string()),
            spec.and_then(|spec| spec.cluster_ip.clone())
                .unwrap_or_else(|| MISSING_VALUE.to_string()),
            external_ips(&service),
            ports_summary(&service),
            human_age(service.metadata.creation_timestamp.as_ref()),
        ]);
        Ok(())
    }
}

fn external_ips(service: &Service) -> String {
    let mut ips = service
        .spec
        .as_ref()
        .and_then(|spec| spec.external_ips.clone())
        .unwrap_or_default();
    let ingress = service
        .status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|balancer| balancer.ingress.as_ref());
    for entry in ingress.into_iter().flatten() {
        if let Some(address) = entry.ip.clone().or_else(|| entry.hostname.clone()) {
            ips.push(address);
        }
    }

    if ips.is_empty() {
        MISSING_VALUE.to_string()
    } else {
        ips.join(",")
    }
}

fn ports_summary(service: &Service) -> String {
    let ports = service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.clone())
        .unwrap_or_default();
    if ports.is_empty() {
        return MISSING_VALUE.to_string();
    }

    ports
        .into_iter()
        .map(|port| {
            let protocol = port.protocol.unwrap_or_else(|| "TCP".to_string());
            match port.node_port {
                Some(node_port) => format!("{}:{node_port}/{protocol}", port.port),
                None => format!("{}/{protocol}", port.port),
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::ServiceRenderer;
    use crate::render::tests::{dynamic, named, render_row};
    use serde_json::json;

    #[test]
    fn service_row_lists_ports_and_balancer_addresses() {
        let object = dynamic(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {"name": "web", "namespace": "shop"},
            "spec": {
                "type": "LoadBalancer",
                "clusterIP": "10.96.0.10",
                "ports": [{"port": 80, "nodePort": 30080}, {"port": 443, "protocol": "TCP"}],
            },
            "status": {"loadBalancer": {"ingress": [{"ip": "203.0.113.9"}]}},
        }));
        let row = render_row(&ServiceRenderer, &object, &named());
        assert_eq!(
            row.fields[..5],
            ["web", "LoadBalancer", "10.96.0.10", "203.0.113.9", "80:30080/TCP,443/TCP"]
        );
    }
}
