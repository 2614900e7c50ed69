use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::core::DynamicObject;

use super::{RenderError, Renderer, convert, human_age, meta_fields, namespaced_header};
use crate::model::NamespaceScope;
use crate::table::{Header, HeaderRow, Row};

#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigMapRenderer;

impl Renderer for ConfigMapRenderer {
    fn header(&self, scope: &NamespaceScope) -> HeaderRow {
        namespaced_header(
            scope,
            [
                Header::new("NAME"),
                Header::new("DATA").numeric(),
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
        let config_map: ConfigMap = convert(object)?;
        meta_fields(&config_map, scope, row)?;

        let keys = config_map.data.as_ref().map_or(0, |data| data.len())
            + config_map.binary_data.as_ref().map_or(0, |data| data.len());
        row.fields.extend([
            keys.to_string(),
            human_age(config_map.metadata.creation_timestamp.as_ref()),
        ]);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SecretRenderer;

impl Renderer for SecretRenderer {
    fn header(&self, scope: &NamespaceScope) -> HeaderRow {
        namespaced_header(
            scope,
            [
                Header::new("NAME"),
                Header::new("TYPE"),
                Header::new("DATA").numeric(),
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
        let secret: Secret = convert(object)?;
        meta_fields(&secret, scope, row)?;

        row.fields.extend([
            secret.type_.clone().unwrap_or_else(|| "Opaque".to_string()),
            secret.data.as_ref().map_or(0, |data| data.len()).to_string(),
            human_age(secret.metadata.creation_timestamp.as_ref()),
        ]);
        Ok(())
    }
}
