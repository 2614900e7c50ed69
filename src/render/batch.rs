use k8s_openapi::api::batch::v1::{CronJob, Job, JobSpec, JobStatus};
use kube::core::DynamicObject;

use super::{
    ColorerFn, RenderError, Renderer, RowColor, cap_width, convert, default_colorer, field_at,
    format_elapsed_seconds, human_age, meta_fields, name_offset, namespaced_header,
    to_containers,
};
use crate::model::NamespaceScope;
use crate::table::{Header, HeaderRow, MISSING_VALUE, Row, RowEvent, RowEventKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct JobRenderer;

impl Renderer for JobRenderer {
    fn header(&self, scope: &NamespaceScope) -> HeaderRow {
        namespaced_header(
            scope,
            [
                Header::new("NAME"),
                Header::new("COMPLETIONS").numeric(),
                Header::new("DURATION"),
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
        let job: Job = convert(object)?;
        meta_fields(&job, scope, row)?;

        let spec = job.spec.as_ref();
        let status = job.status.as_ref();
        let (containers, images) =
            to_containers(spec.and_then(|spec| spec.template.spec.as_ref()));
        row.fields.extend([
            to_completion(spec, status),
            to_duration(status),
            containers,
            images,
            human_age(job.metadata.creation_timestamp.as_ref()),
        ]);
        Ok(())
    }
}

fn to_completion(spec: Option<&JobSpec>, status: Option<&JobStatus>) -> String {
    let succeeded = status.and_then(|status| status.succeeded).unwrap_or(0);
    if let Some(completions) = spec.and_then(|spec| spec.completions) {
        return format!("{succeeded}/{completions}");
    }

    match spec.and_then(|spec| spec.parallelism) {
        Some(parallelism) if parallelism > 1 => format!("{succeeded}/1 of {parallelism}"),
        _ => format!("{succeeded}/1"),
    }
}

fn to_duration(status: Option<&JobStatus>) -> String {
    let Some(start) = status.and_then(|status| status.start_time.as_ref()) else {
        return MISSING_VALUE.to_string();
    };

    let end = status
        .and_then(|status| status.completion_time.as_ref())
        .map(|time| time.0)
        .unwrap_or_else(k8s_openapi::jiff::Timestamp::now);
    format_elapsed_seconds((end.as_second() - start.0.as_second()).max(0))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CronJobRenderer;

impl Renderer for CronJobRenderer {
    fn header(&self, scope: &NamespaceScope) -> HeaderRow {
        namespaced_header(
            scope,
            [
                Header::new("NAME"),
                Header::new("SCHEDULE"),
                Header::new("SUSPEND"),
                Header::new("ACTIVE").numeric(),
                Header::new("LAST SCHEDULE").age(),
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
        let cron_job: CronJob = convert(object)?;
        meta_fields(&cron_job, scope, row)?;

        let spec = cron_job.spec.as_ref();
        let status = cron_job.status.as_ref();
        row.fields.extend([
            spec.map(|spec| spec.schedule.clone())
                .unwrap_or_else(|| MISSING_VALUE.to_string()),
            spec.and_then(|spec| spec.suspend)
                .unwrap_or(false)
                .to_string(),
            status
                .and_then(|status| status.active.as_ref())
                .map_or(0, Vec::len)
                .to_string(),
            human_age(status.and_then(|status| status.last_schedule_time.as_ref())),
            human_age(cron_job.metadata.creation_timestamp.as_ref()),
        ]);
        Ok(())
    }

    fn colorer(&self) -> ColorerFn {
        cron_job_colorer
    }
}

fn cron_job_colorer(scope: &NamespaceScope, event: &RowEvent) -> RowColor {
    if event.kind != RowEventKind::Delete && field_at(event, name_offset(scope) + 2) == "true" {
        return RowColor::Pending;
    }
    default_colorer(scope, event)
}

#[cfg(test)]
mod tests {
    use super::{CronJobRenderer, JobRenderer, to_completion};
    use crate::render::tests::{dynamic, named, render_row};
    use k8s_openapi::api::batch::v1::{JobSpec, JobStatus};
    use serde_json::json;

    fn spec(completions: Option<i32>, parallelism: Option<i32>) -> JobSpec {
        JobSpec {
            completions,
            parallelism,
            ..JobSpec::default()
        }
    }

    #[test]
    fn completion_column_follows_parallelism_rules() {
        let status = JobStatus {
            succeeded: Some(1),
            ..JobStatus::default()
        };
        assert_eq!(to_completion(Some(&spec(Some(3), None)), Some(&status)), "1/3");
        assert_eq!(to_completion(Some(&spec(None, None)), Some(&status)), "1/1");
        assert_eq!(
            to_completion(Some(&spec(None, Some(4))), Some(&status)),
            "1/1 of 4"
        );
        assert_eq!(to_completion(Some(&spec(None, Some(1))), None), "0/1");
    }

    #[test]
    fn job_row_caps_containers_and_measures_duration() {
        let object = dynamic(json!({
            "apiVersion": "batch/v1",
            "kind": "Job",
            "metadata": {"name": "migrate", "namespace": "shop"},
            "spec": {
                "completions": 1,
                "template": {"spec": {
                    "initContainers": [{"name": "wait", "image": "busybox"}],
                    "containers": [
                        {"name": "migrate", "image": "app:1"},
                        {"name": "sidecar", "image": "proxy:2"},
                    ],
                }},
            },
            "status": {
                "succeeded": 1,
                "startTime": "2024-01-01T00:00:00Z",
                "completionTime": "2024-01-01T00:02:30Z",
            },
        }));
        let row = render_row(&JobRenderer, &object, &named());
        assert_eq!(row.id, "shop/migrate");
        assert_eq!(
            row.fields[..5],
            ["migrate", "1/1", "2m", "wait,migrate,(+1)...", "busybox,app:1,(+1)..."]
        );
    }

    #[test]
    fn unstarted_job_has_no_duration() {
        let object = dynamic(json!({
            "apiVersion": "batch/v1",
            "kind": "Job",
            "metadata": {"name": "later", "namespace": "shop"},
            "spec": {"template": {"spec": {"containers": [{"name": "c", "image": "i"}]}}},
        }));
        let row = render_row(&JobRenderer, &object, &named());
        assert_eq!(row.fields[2], "-");
    }

    #[test]
    fn cron_job_reports_schedule_and_active_count() {
        let object = dynamic(json!({
            "apiVersion": "batch/v1",
            "kind": "CronJob",
            "metadata": {"name": "nightly", "namespace": "shop"},
            "spec": {
                "schedule": "0 3 * * *",
                "suspend": true,
                "jobTemplate": {},
            },
            "status": {"active": [{"name": "nightly-1"}]},
        }));
        let row = render_row(&CronJobRenderer, &object, &named());
        assert_eq!(row.fields[..5], ["nightly", "0 3 * * *", "true", "1", "-"]);
    }
}
