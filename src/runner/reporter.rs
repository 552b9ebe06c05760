use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, Table};

use crate::assertion::{Assertion, AssertionResult};
use crate::model::Response;
use crate::utils::{ResponseFormat, ResponseFormatter};

pub struct ResponseReporter {
    formatter: ResponseFormatter,
}

impl ResponseReporter {
    pub fn new(verbose: bool) -> Self {
        let format = if verbose {
            ResponseFormat::Verbose
        } else {
            ResponseFormat::Compact
        };

        Self {
            formatter: ResponseFormatter::new(format),
        }
    }

    /// 打印响应及其断言结果
    pub fn print_response(&self, response: &Response, assertions: &[Assertion]) {
        for line in self.formatter.format(response).lines() {
            println!("  {}", line);
        }
        println!();

        let Some(test_results) = &response.test_results else {
            return;
        };

        println!("  Assertions:");
        for result in &test_results.results {
            let label = assertions
                .iter()
                .find(|a| a.id == result.assertion_id)
                .map(|a| a.to_string())
                .unwrap_or_else(|| result.assertion_id.clone());

            if result.passed() {
                println!("    {} {}", "✓".green(), label);
            } else {
                println!("    {} {}", "✗".red(), label);
                println!("      {}", describe_failure(result).red());
            }
        }

        let summary = format!(
            "{} passed, {} failed, {} total",
            test_results.passed, test_results.failed, test_results.total
        );
        if test_results.failed == 0 {
            println!("\n  {}: {}", "Assertions".bold(), summary.green());
        } else {
            println!("\n  {}: {}", "Assertions".bold(), summary.red());
        }
    }

    /// 以表格打印历史响应，最新的在前
    pub fn print_history(&self, responses: &[Response]) {
        if responses.is_empty() {
            println!("{}", "No responses recorded yet".dimmed());
            return;
        }
        println!("{}", history_table(responses));
    }
}

fn describe_failure(result: &AssertionResult) -> String {
    if let Some(error) = &result.error {
        return error.clone();
    }
    let show = |v: &Option<serde_json::Value>| {
        v.as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "undefined".to_string())
    };
    format!(
        "expected {}, got {}",
        show(&result.expected_value),
        show(&result.actual_value)
    )
}

fn history_table(responses: &[Response]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "ID", "Time", "Request", "Status", "Duration", "Assertions",
    ]);

    for response in responses.iter().rev() {
        let status_color = if response.is_network_failure() || response.status_code >= 400 {
            Color::Red
        } else {
            Color::Green
        };
        let status = if response.is_network_failure() {
            format!("0 {}", response.status_message)
        } else {
            response.status_code.to_string()
        };
        let assertions = response
            .test_results
            .as_ref()
            .map(|t| format!("{}/{}", t.passed, t.total))
            .unwrap_or_else(|| "-".to_string());
        let short_id: String = response.id.chars().take(12).collect();

        table.add_row(vec![
            Cell::new(short_id),
            Cell::new(response.created_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(&response.request_id).add_attribute(Attribute::Dim),
            Cell::new(status).fg(status_color),
            Cell::new(format!("{}ms", response.elapsed_time)),
            Cell::new(assertions),
        ]);
    }
    table
}
