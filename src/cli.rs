use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ixscale")]
#[command(about = "Reconcile ixCloud IKS node groups against autoscaling targets")]
#[command(version)]
pub struct Args {
    /// Path to the cloud configuration file (YAML)
    #[arg(long, value_name = "FILE", env = "IXSCALE_CLOUD_CONFIG")]
    pub cloud_config: PathBuf,

    /// Cluster the managed node groups belong to
    #[arg(long, value_name = "ID", env = "IXSCALE_CLUSTER_ID")]
    pub cluster_id: String,

    /// Static node group spec as min:max:name (repeatable)
    #[arg(long = "node-group", value_name = "SPEC")]
    pub node_groups: Vec<String>,

    /// Auto discovery spec as ixCloud:role=<role>[,<role>] (repeatable)
    #[arg(long = "node-group-auto-discovery", value_name = "SPEC")]
    pub auto_discovery: Vec<String>,

    /// Seconds between discovery refreshes
    #[arg(long, value_name = "SECS", default_value = "60")]
    pub refresh_interval: u64,

    /// Seconds between reconciler ticks
    #[arg(long, value_name = "SECS", default_value = "10")]
    pub tick_interval: u64,

    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Dry-run mode: validate configuration and show managed groups without running
    #[arg(long)]
    pub dry_run: bool,

    /// Path to a .env file for loading credentials
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,
}

impl Args {
    /// Static specs and auto discovery are mutually exclusive activation
    /// modes; exactly one must be supplied.
    pub fn validate_mode(&self) -> Result<(), String> {
        match (self.node_groups.is_empty(), self.auto_discovery.is_empty()) {
            (false, false) => {
                Err("--node-group and --node-group-auto-discovery cannot be combined".to_string())
            }
            (true, true) => {
                Err("one of --node-group or --node-group-auto-discovery is required".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Format a dry-run output showing the reconciler setup.
/// Pure function - returns a formatted string.
pub fn format_dry_run(args: &Args) -> String {
    let mut output = String::new();

    output.push_str("ixscale - Dry Run Mode\n\n");
    output.push_str(&format!("Cloud config: {}\n", args.cloud_config.display()));
    output.push_str(&format!("Cluster:      {}\n\n", args.cluster_id));

    if !args.node_groups.is_empty() {
        output.push_str(&format!(
            "Static node groups ({}):\n",
            args.node_groups.len()
        ));
        for spec in &args.node_groups {
            output.push_str(&format!("  - {}\n", spec));
        }
    } else {
        output.push_str(&format!(
            "Auto discovery specs ({}):\n",
            args.auto_discovery.len()
        ));
        for spec in &args.auto_discovery {
            output.push_str(&format!("  - {}\n", spec));
        }
        output.push_str(&format!(
            "\nDiscovery refresh every {}s\n",
            args.refresh_interval
        ));
    }
    output.push_str(&format!("Reconcile tick every {}s\n", args.tick_interval));

    output
}
