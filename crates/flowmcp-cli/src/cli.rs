//! CLI argument parsing

use clap::{ArgAction, Args, Parser, Subcommand};

/// Command-line client for flowmcp servers
#[derive(Parser, Debug)]
#[command(
    name = "flowmcp",
    version,
    about = "Inspect and exercise the tools, resources, and prompts of a running MCP server."
)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show server information
    Info(Connection),
    /// Tool subcommands
    #[command(subcommand)]
    Tools(ToolsCommand),
    /// Resource subcommands
    #[command(subcommand)]
    Resources(ResourcesCommand),
    /// Prompt subcommands
    #[command(subcommand)]
    Prompts(PromptsCommand),
}

/// Tool subcommands
#[derive(Subcommand, Debug)]
pub enum ToolsCommand {
    /// List the tools
    List(Connection),
    /// Call a tool
    Call {
        #[command(flatten)]
        conn: Connection,
        /// Tool name
        method: String,
        /// Tool argument as `name=value`; repeatable
        #[arg(short = 'p', long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
    },
}

/// Resource subcommands
#[derive(Subcommand, Debug)]
pub enum ResourcesCommand {
    /// List the concrete resources
    List(Connection),
    /// List the resource templates
    Templates(Connection),
    /// Describe one content of a resource
    Describe {
        #[command(flatten)]
        conn: Connection,
        /// Resource URI
        uri: String,
        /// 1-based content index
        #[arg(short, default_value_t = 1)]
        n: usize,
    },
    /// Fetch a resource
    Read {
        #[command(flatten)]
        conn: Connection,
        /// Resource URI
        uri: String,
        /// 1-based content index
        #[arg(short, default_value_t = 1)]
        n: usize,
    },
}

/// Prompt subcommands
#[derive(Subcommand, Debug)]
pub enum PromptsCommand {
    /// List the prompts
    List(Connection),
    /// Render a prompt
    Get {
        #[command(flatten)]
        conn: Connection,
        /// Prompt name
        prompt: String,
        /// Prompt argument as `name=value`; repeatable
        #[arg(short = 'p', long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
    },
}

/// Connection parameters shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct Connection {
    /// URL of the server's SSE endpoint
    pub url: String,
    /// Root advertised to the server; repeatable
    #[arg(
        short = 'r',
        long = "root",
        num_args = 2,
        value_names = ["NAME", "URI"],
        action = ArgAction::Append
    )]
    pub roots: Vec<String>,
}

impl Connection {
    /// The `--root NAME URI` pairs
    pub fn root_pairs(&self) -> Vec<(String, String)> {
        self.roots
            .chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tool_call_with_params_and_roots() {
        let cli = Cli::try_parse_from([
            "flowmcp",
            "tools",
            "call",
            "http://127.0.0.1:9000/",
            "get_temperature",
            "-p",
            "city=london",
            "--root",
            "workspace",
            "file:///tmp",
        ])
        .unwrap();

        let Commands::Tools(ToolsCommand::Call { conn, method, params }) = cli.command else {
            panic!("expected tools call");
        };
        assert_eq!(method, "get_temperature");
        assert_eq!(params, ["city=london"]);
        assert_eq!(
            conn.root_pairs(),
            [("workspace".to_owned(), "file:///tmp".to_owned())]
        );
    }

    #[test]
    fn describe_defaults_to_first_content() {
        let cli = Cli::try_parse_from([
            "flowmcp",
            "resources",
            "describe",
            "http://127.0.0.1:9000/",
            "res://report",
        ])
        .unwrap();

        let Commands::Resources(ResourcesCommand::Describe { n, uri, .. }) = cli.command else {
            panic!("expected resources describe");
        };
        assert_eq!(uri, "res://report");
        assert_eq!(n, 1);
    }
}
