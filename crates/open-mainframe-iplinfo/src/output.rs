//! Text and JSON rendering of configuration snapshots.
//!
//! When `--format json` is specified the CLI emits the snapshot as JSON
//! instead of the operator-style summary.

use crate::snapshot::ConfigurationSnapshot;

/// Output format selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        self == OutputFormat::Json
    }
}

/// Render `snapshot` in the requested format.
pub fn render(snapshot: &ConfigurationSnapshot, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(snapshot)),
        OutputFormat::Json => render_json(snapshot),
    }
}

/// Operator-style summary, e.g. `USED LOADEC IN SYS1.PARMLIB ON 0742`.
pub fn render_text(snapshot: &ConfigurationSnapshot) -> String {
    format!(
        "USED LOAD{} IN {} ON {}\nIODF {}\n",
        snapshot.load_dataset(),
        snapshot.parmlib_dataset_name(),
        snapshot.device_id(),
        snapshot.iodf_id()
    )
}

/// Pretty-printed JSON object keyed by snapshot field.
pub fn render_json(snapshot: &ConfigurationSnapshot) -> serde_json::Result<String> {
    serde_json::to_string_pretty(snapshot)
}
