use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "ocular",
    version,
    about = "A terminal dashboard for browsing and mutating OpenShift resources."
)]
pub struct CliArgs {
    /// Start in a specific namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Refresh interval in milliseconds
    #[arg(long, default_value_t = 1_000)]
    pub refresh_ms: u64,

    /// CLI used for describe/edit/logs/rsh (OCULAR_OC overrides)
    #[arg(long, default_value = "oc")]
    pub oc_bin: String,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,
}
