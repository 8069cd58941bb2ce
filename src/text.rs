use lazy_static::lazy_static;
use regex::Regex;

use crate::models::GenerationRequest;

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"(?s)```.*?```").unwrap();
    static ref BOLD: Regex = Regex::new(r"\*\*(.*?)\*\*").unwrap();
    static ref ITALIC: Regex = Regex::new(r"\*(.*?)\*").unwrap();
    static ref BLANK_RUNS: Regex = Regex::new(r"\n{3,}").unwrap();
}

// Wrap the user's prompt in the instruction template sent upstream
pub fn build_upstream_prompt(req: &GenerationRequest) -> String {
    match &req.chart_type {
        Some(chart_type) => format!(
            "Generate a detailed description for a {chart_type} chart based on this request: {}. \
             Include data points, labels, and styling suggestions.",
            req.prompt
        ),
        None => format!(
            "Generate a detailed chart description based on this request: {}. \
             Include data points, labels, chart type recommendation, and styling suggestions.",
            req.prompt
        ),
    }
}

// Strip markdown noise from generated text.
//
// Removes fenced code blocks, unwraps bold then italic markers, collapses
// runs of three or more newlines to two and trims the ends. Pure: the same
// input always gives the same output.
pub fn clean_output(raw: &str) -> String {
    let text = CODE_FENCE.replace_all(raw, "");
    let text = BOLD.replace_all(&text, "${1}");
    let text = ITALIC.replace_all(&text, "${1}");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}
