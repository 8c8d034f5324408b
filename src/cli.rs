//! Command-line argument parsing for askdb.

use clap::{Parser, Subcommand};

/// AI-powered natural-language-to-SQL CLI.
#[derive(Parser, Debug)]
#[command(name = "askdb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<AppCommand>,
}

#[derive(Subcommand, Debug)]
pub enum AppCommand {
    /// Start an interactive question/answer session.
    Interactive,
    /// Run a single question end-to-end and print the reply.
    Query {
        /// Natural language question to convert to SQL.
        text: String,
    },
    /// Check the schema definition and engine connectivity.
    Health,
}

impl Cli {
    /// Parses CLI arguments from the process environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The selected command; an interactive session when none was given.
    pub fn into_command(self) -> AppCommand {
        self.command.unwrap_or(AppCommand::Interactive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_args_defaults_to_interactive() {
        let cli = Cli::parse_from(["askdb"]);
        assert!(matches!(cli.into_command(), AppCommand::Interactive));
    }

    #[test]
    fn test_query_command_takes_question() {
        let cli = Cli::parse_from(["askdb", "query", "how many sessions yesterday"]);
        match cli.into_command() {
            AppCommand::Query { text } => assert_eq!(text, "how many sessions yesterday"),
            other => panic!("expected query command, got {other:?}"),
        }
    }

    #[test]
    fn test_health_command_parses() {
        let cli = Cli::parse_from(["askdb", "health"]);
        assert!(matches!(cli.into_command(), AppCommand::Health));
    }

    #[test]
    fn test_cli_asserts() {
        use clap::CommandFactory;
        <Cli as CommandFactory>::command().debug_assert();
    }
}
