//! `pipewright run` - execute a payload file in-process.

use std::collections::HashMap;
use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use pipewright_core::workflow::WorkflowError;
use pipewright_types::text::{MAX_FINAL_RESULT_PREVIEW_LEN, preview};
use pipewright_types::workflow::{ExecutionResult, StepStatus};
use serde_json::{Value, json};

use crate::state::{AppState, RunRejection};

/// Run the workflow in `file` and print its result.
pub async fn run_workflow(state: &AppState, file: &Path, json_output: bool, quiet: bool) -> Result<ExitCode> {
    let payload = super::read_payload(file).await?;

    let result = match state.execute_payload(&payload).await {
        Ok(result) => result,
        Err(rejection) => {
            print_rejection(&rejection, json_output)?;
            return Ok(ExitCode::FAILURE);
        }
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if !quiet {
        print_summary(&result, &step_names(&payload));
    }

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_rejection(rejection: &RunRejection, json_output: bool) -> Result<()> {
    if json_output {
        let mut body = json!({"success": false, "error": rejection.to_string()});
        if let RunRejection::Rejected(WorkflowError::ValidationError(problems)) = rejection {
            body["validation_errors"] = json!(problems);
        }
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    match rejection {
        RunRejection::Rejected(WorkflowError::ValidationError(problems)) => {
            super::validate::print_problems(problems);
        }
        other => {
            eprintln!("  {} {}", style("✗").red().bold(), other);
        }
    }
    Ok(())
}

/// `usid -> step_name` from the raw payload.
fn step_names(payload: &Value) -> HashMap<String, String> {
    payload
        .get("STEPS_CONFIG")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|step| {
            let usid = step.get("usid")?.as_str()?;
            let name = step.get("step_name")?.as_str()?;
            Some((usid.to_string(), name.to_string()))
        })
        .collect()
}

fn print_summary(result: &ExecutionResult, names: &HashMap<String, String>) {
    println!();
    let mark = if result.success {
        style("✓").green().bold()
    } else {
        style("✗").red().bold()
    };
    println!(
        "  {} Workflow {} ({}) finished in {:.2}s",
        mark,
        style(&result.workflow_id).cyan(),
        style(&result.namespace).dim(),
        result.execution_time_secs
    );
    println!();

    if !result.execution_order.is_empty() {
        println!("{}", summary_table(result, names));
        println!();
    }

    println!(
        "  {} completed, {} failed, {} aborted",
        style(result.steps_completed).green().bold(),
        style(result.steps_failed).red().bold(),
        style(result.steps_aborted).yellow().bold()
    );

    if let Some(error) = &result.error {
        println!("  {} {}", style("Error:").red().bold(), error);
    }
    if result.success {
        println!(
            "  {} {}",
            style("Result:").bold(),
            preview(&result.final_result, MAX_FINAL_RESULT_PREVIEW_LEN)
        );
    }
    println!();
}

fn summary_table(result: &ExecutionResult, names: &HashMap<String, String>) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Step").fg(Color::White),
        Cell::new("USID").fg(Color::White),
        Cell::new("Status").fg(Color::White),
    ]);

    for (index, usid) in result.execution_order.iter().enumerate() {
        let status_cell = match result.status_of(usid) {
            StepStatus::Completed => Cell::new("● completed").fg(Color::Green),
            StepStatus::Failed => Cell::new("✗ failed").fg(Color::Red),
            StepStatus::Aborted => Cell::new("○ aborted").fg(Color::Yellow),
            StepStatus::NotReached => Cell::new("◌ not reached").fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(names.get(usid).map(String::as_str).unwrap_or("")),
            Cell::new(usid),
            status_cell,
        ]);
    }

    table
}
