use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "skiff",
    version,
    about = "A live Kubernetes resource table for the terminal."
)]
pub struct CliArgs {
    /// Start in a specific namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Start with all namespaces selected
    #[arg(short = 'A', long)]
    pub all_namespaces: bool,

    /// Initial resource kind (for example: pods, deploy, svc)
    #[arg(short, long, default_value = "pods")]
    pub resource: String,

    /// Minimum interval between table snapshots in milliseconds
    #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u64).range(100..))]
    pub refresh_ms: u64,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,

    /// Write logs to this file instead of discarding them
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Explicit config file path
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::CliArgs;
    use clap::Parser;

    #[test]
    fn defaults_start_on_pods() {
        let args = CliArgs::parse_from(["skiff"]);
        assert_eq!(args.resource, "pods");
        assert_eq!(args.refresh_ms, 300);
        assert!(!args.all_namespaces);
    }

    #[test]
    fn refresh_interval_has_a_floor() {
        assert!(CliArgs::try_parse_from(["skiff", "--refresh-ms", "50"]).is_err());
        let args = CliArgs::try_parse_from(["skiff", "-A", "-r", "deploy", "--refresh-ms", "100"])
            .expect("valid args");
        assert!(args.all_namespaces);
        assert_eq!(args.resource, "deploy");
    }
}
