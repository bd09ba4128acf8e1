//! Result aggregation and report rendering: reduces a set
//! of task results to summary statistics and sanitized,
//! ranked text. Aggregation is a pure function; rendering
//! and persistence sit on top of it.

use serde::Serialize;
use log::debug;

use crate::dispatcher::{TaskResult, TaskStatus};
use crate::stream::strip_thinking;

/// Timing statistics over successful tasks only
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionSummary
{   pub total_time: f64
  , pub average_time: f64
  , pub min_time: f64
  , pub max_time: f64
  , pub success_rate: f64
}

/// One per-endpoint display row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseRow
{   pub endpoint_key: String
  , pub display_name: String
  , /// "success" / "error" / "timeout"
    pub status: String
  , pub execution_time: f64
  , /// Sanitized answer text on success, the error
    /// message otherwise
    pub response: String
  , /// Sanitized answer length in characters; zero on
    /// failure
    pub response_length: usize
}

/// Derived, read-only view over one batch of results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedReport
{   pub query: String
  , pub timestamp: String
  , pub total_endpoints: usize
  , pub successful: usize
  , pub failed: usize
  , pub summary: ExecutionSummary
  , pub responses: Vec<ResponseRow>
  , pub summary_text: String
}

/// Report format selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat
{   Table
  , List
  , Structured
  , Comparison
}

/// Aggregates task results into reports
#[derive(Debug, Clone, Default)]
pub struct ReportAggregator;

impl ReportAggregator
{   pub fn new() -> Self
    {   ReportAggregator
    }

    /// Reduce one batch of results. Pure apart from the
    /// timestamp: calling it twice over the same input
    /// yields identical statistics, rows and text.
    pub fn aggregate(
      &self
    , query: &str
    , results: &[TaskResult]
    ) -> AggregatedReport
    {   debug!(
          "Aggregating {} task results", results.len()
        );
        let successful = results.iter()
          .filter(|r| r.status == TaskStatus::Success)
          .count();
        let failed = results.len() - successful;
        let summary = execution_summary(results);

        let responses: Vec<ResponseRow> = results.iter()
          .map(|result| {
            if result.status == TaskStatus::Success
            {   // Belt-and-braces against upstream leakage
                let sanitized
                  = strip_thinking(&result.response);
                ResponseRow
                {   endpoint_key:
                      result.endpoint_key.clone()
                  , display_name:
                      result.display_name.clone()
                  , status: result.status.to_string()
                  , execution_time:
                      result.elapsed.as_secs_f64()
                  , response_length:
                      sanitized.chars().count()
                  , response: sanitized
                }
            } else
            {   ResponseRow
                {   endpoint_key:
                      result.endpoint_key.clone()
                  , display_name:
                      result.display_name.clone()
                  , status: result.status.to_string()
                  , execution_time:
                      result.elapsed.as_secs_f64()
                  , response: result.error_message
                      .clone()
                      .unwrap_or_default()
                  , response_length: 0
                }
            }
          })
          .collect();

        let summary_text
          = summary_text(query, &responses, &summary);

        AggregatedReport
        {   query: query.to_string()
          , timestamp: chrono::Local::now()
              .format("%Y-%m-%d %H:%M:%S")
              .to_string()
          , total_endpoints: results.len()
          , successful
          , failed
          , summary
          , responses
          , summary_text
        }
    }

    /// Render a report in the requested format
    pub fn render(
      &self
    , report: &AggregatedReport
    , format: ReportFormat
    ) -> String
    {   match format
        {   ReportFormat::Table => {
              render_table(report)
            }
          , ReportFormat::List => {
              render_list(report)
            }
          , ReportFormat::Structured => {
              render_structured(report)
            }
          , ReportFormat::Comparison => {
              render_comparison(report)
            }
        }
    }

    /// Render and persist to a timestamped plain-text
    /// file; returns the file name
    pub fn save(
      &self
    , report: &AggregatedReport
    , format: ReportFormat
    ) -> Result<String, crate::Error>
    {   let filename = format!(
          "search_report_{}.txt"
        , chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        std::fs::write(
          &filename
        , self.render(report, format)
        ).map_err(|e| {
          crate::Error::Other(format!(
            "Failed to write report {}: {}", filename, e
          ))
        })?;
        debug!("Report saved to {}", filename);
        Ok(filename)
    }
}

/// Success rows ranked by descending answer length:
/// longer responses get display priority (a heuristic,
/// not a guarantee).
fn ranked_successes(
  responses: &[ResponseRow]
) -> Vec<&ResponseRow>
{   let mut rows: Vec<&ResponseRow> = responses.iter()
      .filter(|r| r.status == "success")
      .collect();
    rows.sort_by(|a, b|
      b.response_length.cmp(&a.response_length)
    );
    rows
}

fn execution_summary(
  results: &[TaskResult]
) -> ExecutionSummary
{   let times: Vec<f64> = results.iter()
      .filter(|r| r.status == TaskStatus::Success)
      .map(|r| r.elapsed.as_secs_f64())
      .collect();

    if times.is_empty()
    {   return ExecutionSummary
        {   total_time: 0.0
          , average_time: 0.0
          , min_time: 0.0
          , max_time: 0.0
          , success_rate: 0.0
        };
    }

    let total: f64 = times.iter().sum();
    let min = times.iter().cloned().fold(f64::MAX, f64::min);
    let max = times.iter().cloned().fold(0.0, f64::max);

    ExecutionSummary
    {   total_time: total
      , average_time: total / times.len() as f64
      , min_time: min
      , max_time: max
      , success_rate:
          times.len() as f64 / results.len() as f64
    }
}

fn preview(text: &str, limit: usize) -> String
{   if text.chars().count() <= limit
    {   text.to_string()
    } else
    {   let cut: String = text.chars().take(limit).collect();
        format!("{}...", cut)
    }
}

fn summary_text(
  query: &str
, responses: &[ResponseRow]
, summary: &ExecutionSummary
) -> String
{   let ranked = ranked_successes(responses);

    if ranked.is_empty()
    {   return format!(
          "Query failed: no endpoint produced a usable \
           answer\n\nQuery: {}\n"
        , query
        );
    }

    let mut text = String::new();
    text.push_str("Query summary report\n");
    text.push_str(&format!("Query: {}\n", query));
    text.push_str(&format!(
      "Execution: {}/{} endpoints succeeded\n"
    , ranked.len()
    , responses.len()
    ));
    text.push_str(&format!(
      "Average time: {:.2}s\n\n", summary.average_time
    ));

    for (i, row) in ranked.iter().enumerate()
    {   text.push_str(&format!(
          "{}. {}\n", i + 1, row.display_name
        ));
        text.push_str(&format!(
          "   Time: {:.2}s\n", row.execution_time
        ));
        text.push_str(&format!(
          "   Answer: {}\n\n", preview(&row.response, 200)
        ));
    }

    text
}

fn render_header(report: &AggregatedReport) -> String
{   let mut out = String::new();
    out.push_str(&"=".repeat(100));
    out.push('\n');
    out.push_str(&format!(
      "Multi-endpoint query report - {}\n"
    , report.timestamp
    ));
    out.push_str(&"=".repeat(100));
    out.push('\n');
    out.push_str(&format!("Query: {}\n", report.query));
    out.push_str(&format!(
      "Execution: {}/{} endpoints succeeded\n"
    , report.successful
    , report.total_endpoints
    ));
    out.push_str(&format!(
      "Average time: {:.2}s\n"
    , report.summary.average_time
    ));
    out.push_str(&"=".repeat(100));
    out.push_str("\n\n");
    out
}

fn render_table(report: &AggregatedReport) -> String
{   let mut out = render_header(report);
    out.push_str(&format!(
      "{:<4} {:<32} {:<8} {:>10} {:>10}\n"
    , "#", "Endpoint", "Status", "Time (s)", "Length"
    ));
    out.push_str(&"-".repeat(100));
    out.push('\n');
    for (i, row) in report.responses.iter().enumerate()
    {   out.push_str(&format!(
          "{:<4} {:<32} {:<8} {:>10.2} {:>10}\n"
        , i + 1
        , preview(&row.display_name, 30)
        , row.status
        , row.execution_time
        , row.response_length
        ));
    }
    out
}

fn render_list(report: &AggregatedReport) -> String
{   let mut out = render_header(report);
    for row in ranked_successes(&report.responses)
    {   out.push_str(&format!(
          "- {} ({:.2}s, {} chars)\n"
        , row.display_name
        , row.execution_time
        , row.response_length
        ));
        out.push_str(&format!(
          "  {}\n\n", preview(&row.response, 300)
        ));
    }
    let failures: Vec<&ResponseRow> = report.responses
      .iter()
      .filter(|r| r.status != "success")
      .collect();
    if !failures.is_empty()
    {   out.push_str("Failures:\n");
        for row in failures
        {   out.push_str(&format!(
              "- {} ({}): {}\n"
            , row.display_name
            , row.status
            , row.response
            ));
        }
    }
    out
}

fn render_structured(report: &AggregatedReport) -> String
{   let mut out = render_header(report);
    for (i, row) in
      ranked_successes(&report.responses)
        .iter()
        .enumerate()
    {   out.push_str(&format!(
          "{}. {} ({:.2}s)\n"
        , i + 1
        , row.display_name
        , row.execution_time
        ));
        out.push_str(&"-".repeat(100));
        out.push('\n');
        out.push_str(&row.response);
        out.push_str("\n\n");
    }
    let failures: Vec<&ResponseRow> = report.responses
      .iter()
      .filter(|r| r.status != "success")
      .collect();
    if !failures.is_empty()
    {   out.push_str(&"-".repeat(100));
        out.push('\n');
        out.push_str("Failed endpoints:\n");
        for row in failures
        {   out.push_str(&format!(
              "- {} ({}): {}\n"
            , row.display_name
            , row.status
            , row.response
            ));
        }
    }
    out
}

fn render_comparison(report: &AggregatedReport) -> String
{   let mut out = render_header(report);
    let ranked = ranked_successes(&report.responses);
    if ranked.is_empty()
    {   out.push_str(
          "No endpoint produced a usable answer.\n"
        );
        return out;
    }
    out.push_str("Answer comparison (longest first):\n\n");
    for row in ranked
    {   out.push_str(&format!(
          "### {} - {:.2}s, {} chars\n"
        , row.display_name
        , row.execution_time
        , row.response_length
        ));
        out.push_str(&format!(
          "{}\n\n", preview(&row.response, 500)
        ));
    }
    out
}
