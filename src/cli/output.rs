use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::models::{AnswerResponse, OutputFormat, RetrievedChunk};
use crate::server::protocol::{IndexSummary, StatusResponse};

const PREVIEW_CHARS: usize = 200;

pub trait Formatter {
    fn format_answer(&self, question: &str, answer: &AnswerResponse) -> String;
    fn format_chunks(&self, results: &ChunkResults) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

/// Retrieval-only results for the `search` command.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkResults {
    pub query: String,
    pub chunks: Vec<RetrievedChunk>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub embedding_url: Option<String>,
    pub generation_url: Option<String>,
    pub vectors_path: String,
    pub metadata_path: String,
    pub index: Option<IndexSummary>,
    pub index_error: Option<String>,
    pub server_url: Option<String>,
    pub server: Option<StatusResponse>,
    /// Whether the server answered its health check, even without `/status`.
    pub server_running: bool,
    pub server_error: Option<String>,
}

fn preview(content: &str) -> String {
    let head: String = content.chars().take(PREVIEW_CHARS).collect();
    if content.chars().count() > PREVIEW_CHARS {
        format!("{}...", head)
    } else {
        head
    }
}

fn configured(url: &Option<String>) -> &str {
    url.as_deref().unwrap_or("(not set)")
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_answer(&self, _question: &str, answer: &AnswerResponse) -> String {
        let mut output = String::new();
        writeln!(output, "{}", answer.decision.trim_end()).unwrap();
        writeln!(output).unwrap();
        writeln!(output, "({})", answer.time).unwrap();
        output
    }

    fn format_chunks(&self, results: &ChunkResults) -> String {
        if results.chunks.is_empty() {
            return format!("No chunks found for: {}\n", results.query);
        }

        let mut output = String::new();
        writeln!(output, "Chunks for: \"{}\"", results.query).unwrap();
        writeln!(
            output,
            "Found {} chunks in {}ms\n",
            results.chunks.len(),
            results.duration_ms
        )
        .unwrap();

        for (i, chunk) in results.chunks.iter().enumerate() {
            writeln!(
                output,
                "{}. [#{} distance: {:.4}]",
                i + 1,
                chunk.position,
                chunk.distance
            )
            .unwrap();
            writeln!(output, "   ---").unwrap();
            for line in preview(&chunk.text).lines() {
                writeln!(output, "   {}", line).unwrap();
            }
            writeln!(output).unwrap();
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();
        writeln!(output, "Embedding URL: {}", configured(&status.embedding_url)).unwrap();
        writeln!(output, "LLM URL:       {}", configured(&status.generation_url)).unwrap();
        writeln!(output).unwrap();

        match (&status.index, &status.index_error) {
            (Some(index), _) => {
                writeln!(output, "Index:         [LOADED]").unwrap();
                writeln!(output, "  Vectors:     {}", status.vectors_path).unwrap();
                writeln!(output, "  Metadata:    {}", status.metadata_path).unwrap();
                writeln!(output, "  Chunks:      {}", index.chunks).unwrap();
                writeln!(output, "  Dimension:   {}", index.dimension).unwrap();
                writeln!(output, "  Metric:      {}", index.metric).unwrap();
            }
            (None, error) => {
                writeln!(output, "Index:         [UNAVAILABLE]").unwrap();
                writeln!(output, "  Vectors:     {}", status.vectors_path).unwrap();
                if let Some(e) = error {
                    writeln!(output, "  Error:       {}", e).unwrap();
                }
            }
        }

        if let Some(ref url) = status.server_url {
            writeln!(output).unwrap();
            match &status.server {
                Some(server) => {
                    writeln!(output, "Server:        [RUNNING] {}", url).unwrap();
                    writeln!(output, "  Since:       {}", server.started_at).unwrap();
                    writeln!(output, "  Requests:    {}", server.requests_served).unwrap();
                    if let Some(ref m) = server.metrics {
                        writeln!(output, "  Answered:    {}", m.questions).unwrap();
                        writeln!(output, "  Mean Answer: {}ms", m.mean_answer_ms).unwrap();
                        writeln!(output, "  Slowest:     {}ms", m.slowest_answer_ms).unwrap();
                        if m.failures > 0 {
                            writeln!(output, "  Failed:      {:.1}%", m.failure_rate()).unwrap();
                        }
                    }
                }
                None if status.server_running => {
                    writeln!(output, "Server:        [RUNNING] {}", url).unwrap();
                    writeln!(output, "  (no status endpoint)").unwrap();
                }
                None => {
                    writeln!(output, "Server:        [STOPPED] {}", url).unwrap();
                    if let Some(ref e) = status.server_error {
                        writeln!(output, "  Error:       {}", e).unwrap();
                    }
                }
            }
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render(&self, value: &impl Serialize) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        let mut output = rendered.unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e));
        output.push('\n');
        output
    }
}

impl Formatter for JsonFormatter {
    fn format_answer(&self, question: &str, answer: &AnswerResponse) -> String {
        self.render(&serde_json::json!({
            "query": question,
            "decision": answer.decision,
            "time": answer.time,
        }))
    }

    fn format_chunks(&self, results: &ChunkResults) -> String {
        self.render(results)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(status)
    }

    fn format_message(&self, message: &str) -> String {
        self.render(&serde_json::json!({"message": message}))
    }

    fn format_error(&self, error: &str) -> String {
        self.render(&serde_json::json!({"error": error}))
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_answer(&self, question: &str, answer: &AnswerResponse) -> String {
        let mut output = String::new();
        writeln!(output, "## {}\n", question.trim()).unwrap();
        writeln!(output, "{}\n", answer.decision.trim_end()).unwrap();
        writeln!(output, "_Answered in {}_", answer.time).unwrap();
        output
    }

    fn format_chunks(&self, results: &ChunkResults) -> String {
        if results.chunks.is_empty() {
            return format!("## No chunks found\n\nQuery: `{}`\n", results.query);
        }

        let mut output = String::new();
        writeln!(output, "## Retrieved Chunks\n").unwrap();
        writeln!(output, "**Query:** `{}`\n", results.query).unwrap();
        writeln!(
            output,
            "Found {} chunks in {}ms\n",
            results.chunks.len(),
            results.duration_ms
        )
        .unwrap();

        for (i, chunk) in results.chunks.iter().enumerate() {
            writeln!(
                output,
                "### {}. Chunk #{} (distance {:.4})\n",
                i + 1,
                chunk.position,
                chunk.distance
            )
            .unwrap();
            writeln!(output, "```").unwrap();
            writeln!(output, "{}", chunk.text).unwrap();
            writeln!(output, "```\n").unwrap();
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();
        writeln!(
            output,
            "- **Embedding URL:** `{}`",
            configured(&status.embedding_url)
        )
        .unwrap();
        writeln!(output, "- **LLM URL:** `{}`\n", configured(&status.generation_url)).unwrap();

        let index_status = if status.index.is_some() { "✅" } else { "❌" };
        writeln!(output, "### Index {}\n", index_status).unwrap();
        writeln!(output, "- **Vectors:** `{}`", status.vectors_path).unwrap();
        writeln!(output, "- **Metadata:** `{}`", status.metadata_path).unwrap();
        if let Some(ref index) = status.index {
            writeln!(output, "- **Chunks:** {}", index.chunks).unwrap();
            writeln!(output, "- **Dimension:** {}", index.dimension).unwrap();
            writeln!(output, "- **Metric:** {}", index.metric).unwrap();
        }
        if let Some(ref e) = status.index_error {
            writeln!(output, "- **Error:** {}", e).unwrap();
        }

        if let Some(ref url) = status.server_url {
            let server_status = if status.server_running { "✅" } else { "❌" };
            writeln!(output, "\n### Server {}\n", server_status).unwrap();
            writeln!(output, "- **URL:** `{}`", url).unwrap();
            if let Some(ref server) = status.server {
                writeln!(output, "- **Requests:** {}", server.requests_served).unwrap();
                if let Some(ref m) = server.metrics {
                    writeln!(output, "- **Mean Answer:** {}ms", m.mean_answer_ms).unwrap();
                }
            }
            if let Some(ref e) = status.server_error {
                writeln!(output, "- **Error:** {}", e).unwrap();
            }
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}
