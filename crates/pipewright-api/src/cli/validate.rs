//! `pipewright validate` - structural checks without execution.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use console::style;
use pipewright_core::workflow::dag::execution_order;
use pipewright_core::workflow::WorkflowError;
use pipewright_core::workflow::definition::parse_payload;
use serde_json::{Value, json};

/// Everything wrong with `payload`: structural problems first, then decode
/// and dependency-cycle errors once the structure is sound.
pub fn check_payload(payload: &Value) -> Vec<String> {
    match parse_payload(payload) {
        Ok(spec) => match execution_order(&spec.steps) {
            Ok(_) => Vec::new(),
            Err(e) => vec![e.to_string()],
        },
        Err(WorkflowError::ValidationError(problems)) => problems,
        Err(e) => vec![e.to_string()],
    }
}

pub async fn validate_workflow(file: &Path, json_output: bool) -> Result<ExitCode> {
    let payload = super::read_payload(file).await?;
    let problems = check_payload(&payload);

    if json_output {
        let body = json!({"valid": problems.is_empty(), "errors": problems});
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else if problems.is_empty() {
        println!(
            "  {} {} is a valid workflow",
            style("✓").green().bold(),
            style(file.display()).cyan()
        );
    } else {
        print_problems(&problems);
    }

    Ok(if problems.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

pub(crate) fn print_problems(problems: &[String]) {
    eprintln!();
    eprintln!(
        "  {} Payload validation failed ({} problem{}):",
        style("✗").red().bold(),
        problems.len(),
        if problems.len() == 1 { "" } else { "s" }
    );
    for problem in problems {
        eprintln!("    {} {}", style("•").dim(), problem);
    }
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(usid: &str, deps: &[&str], outputs: &[&str]) -> Value {
        json!({
            "step_name": format!("step-{usid}"),
            "usid": usid,
            "service_url": "http://localhost/x",
            "method": "POST",
            "dependencies": deps,
            "outputs": outputs,
        })
    }

    #[test]
    fn valid_payload_has_no_problems() {
        let payload = json!({"STEPS_CONFIG": [step("aaaaaaaa", &[], &["x"])]});
        assert!(check_payload(&payload).is_empty());
    }

    #[test]
    fn structural_problems_reported() {
        let problems = check_payload(&json!({"STEPS_CONFIG": []}));
        assert_eq!(problems, vec!["STEPS_CONFIG must be a non-empty array".to_string()]);
    }

    #[test]
    fn cycles_reported_after_structure_passes() {
        let payload = json!({"STEPS_CONFIG": [
            step("aaaaaaaa", &["y"], &["x"]),
            step("bbbbbbbb", &["x"], &["y"]),
        ]});
        let problems = check_payload(&payload);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].starts_with("Cycle detected in workflow dependencies"));
    }
}
