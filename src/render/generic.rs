use kube::ResourceExt;
use kube::core::DynamicObject;

use super::{RenderError, Renderer, cap_width, human_age, labels_summary, namespaced_header};
use crate::model::{NamespaceScope, fqn};
use crate::table::{Header, HeaderRow, MISSING_VALUE, Row};

/// NAME/LABELS/AGE projection for kinds without a dedicated renderer.
#[derive(Debug, Clone, Copy)]
pub struct GenericRenderer {
    namespaced: bool,
}

impl GenericRenderer {
    pub fn new(namespaced: bool) -> Self {
        Self { namespaced }
    }
}

impl Renderer for GenericRenderer {
    fn header(&self, scope: &NamespaceScope) -> HeaderRow {
        let columns = [
            Header::new("NAME"),
            Header::new("LABELS").decorated(cap_width),
            Header::new("AGE").age(),
        ];
        if self.namespaced {
            namespaced_header(scope, columns)
        } else {
            HeaderRow(columns.to_vec())
        }
    }

    fn render(
        &self,
        object: &DynamicObject,
        scope: &NamespaceScope,
        row: &mut Row,
    ) -> Result<(), RenderError> {
        let name = object.metadata.name.clone().ok_or(RenderError::MissingName {
            kind: "object",
        })?;
        let namespace = object.namespace();

        row.id = fqn(namespace.as_deref(), &name);
        row.fields.clear();
        if self.namespaced && scope.is_all() {
            row.fields
                .push(namespace.unwrap_or_else(|| MISSING_VALUE.to_string()));
        }

        row.fields.extend([
            name,
            labels_summary(object),
            human_age(object.metadata.creation_timestamp.as_ref()),
        ]);
        Ok(())
    }
}
