use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use research_harness::{DEFAULT_MAX_TOOL_CALLS, ToolSpec};

use crate::query::QuerySource;

/// Conduct deep research using OpenAI's deep research models
#[derive(Parser, Debug)]
#[command(name = "deep-research", version, about, long_about = None)]
pub struct Cli {
    /// Research query to investigate
    pub query: Option<String>,

    /// Model to use for research
    #[arg(long, value_enum, default_value_t = ResearchModel::O4MiniDeepResearch)]
    pub model: ResearchModel,

    /// Run research synchronously instead of in the background
    #[arg(long)]
    pub no_background: bool,

    /// Poll for the result instead of streaming progress
    #[arg(long)]
    pub no_stream: bool,

    /// Maximum number of tool calls the run may make
    #[arg(long, default_value_t = DEFAULT_MAX_TOOL_CALLS)]
    pub max_tool_calls: u32,

    /// Disable web search
    #[arg(long)]
    pub no_web_search: bool,

    /// Enable code interpreter for data analysis
    #[arg(long)]
    pub code_interpreter: bool,

    /// Read a multi-line query from stdin until EOF
    #[arg(long)]
    pub interactive: bool,

    /// Read the query from a file
    #[arg(long, value_name = "PATH")]
    pub input_file: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ResearchModel {
    #[value(name = "o3-deep-research")]
    O3DeepResearch,
    #[value(name = "o4-mini-deep-research")]
    O4MiniDeepResearch,
}

impl ResearchModel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::O3DeepResearch => "o3-deep-research",
            Self::O4MiniDeepResearch => "o4-mini-deep-research",
        }
    }
}

/// How the request is executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Stream events and repaint the progress panel.
    Stream,
    /// Create a background run and poll it.
    Poll,
    /// Block on a synchronous create.
    Synchronous,
}

impl Cli {
    /// An input file wins over interactive input, which wins over the
    /// positional argument.
    pub fn query_source(&self) -> Option<QuerySource> {
        if let Some(path) = &self.input_file {
            Some(QuerySource::File(path.clone()))
        } else if self.interactive {
            Some(QuerySource::Interactive)
        } else {
            self.query.clone().map(QuerySource::Argument)
        }
    }

    pub fn tools(&self) -> anyhow::Result<Vec<ToolSpec>> {
        let mut tools = Vec::new();
        if !self.no_web_search {
            tools.push(ToolSpec::WebSearchPreview);
        }
        if self.code_interpreter {
            tools.push(ToolSpec::code_interpreter());
        }
        if tools.is_empty() {
            anyhow::bail!("At least one tool must be enabled");
        }
        Ok(tools)
    }

    pub fn mode(&self) -> Mode {
        if self.no_background {
            Mode::Synchronous
        } else if self.no_stream {
            Mode::Poll
        } else {
            Mode::Stream
        }
    }
}
