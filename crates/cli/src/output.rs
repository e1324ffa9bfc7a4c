// SPDX-License-Identifier: MIT

//! Text/JSON rendering shared across subcommands.

use clap::ValueEnum;
use es_core::{CancelAction, JobStatusView};

#[derive(Clone, Copy, Debug, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn print_job_statuses(statuses: &[JobStatusView], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(statuses)?),
        OutputFormat::Text => {
            for status in statuses {
                let progress = status.progress.map(|p| format!(" {p}%")).unwrap_or_default();
                let cancel = status.cancel_state.map(|c| format!(" cancel={c}")).unwrap_or_default();
                println!("{}  {}{}{}", status.job_id, status.state, progress, cancel);
                if let Some(reason) = &status.failed_reason {
                    println!("    failed: {reason}");
                }
            }
        }
    }
    Ok(())
}

pub fn print_cancel_results(results: &[(String, CancelAction)], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let obj: Vec<_> = results.iter().map(|(id, action)| serde_json::json!({"jobId": id, "action": action.to_string()})).collect();
            println!("{}", serde_json::to_string_pretty(&obj)?);
        }
        OutputFormat::Text => {
            for (job_id, action) in results {
                println!("{job_id}  {action}");
            }
        }
    }
    Ok(())
}
