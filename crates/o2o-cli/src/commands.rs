//! Top-level CLI parser and subcommand enums.

use clap::{Parser, Subcommand};

/// Command-line interface for operating an o2o gateway instance.
#[derive(Parser)]
#[command(name = "o2o")]
#[command(about = "OpenAI-compatible gateway in front of Ollama-family backends")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP gateway and serve until interrupted.
    Serve {
        /// Override the configured port for this run.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show resolved configuration and data-directory paths.
    Paths,

    /// Manage backend credentials (the flat, channel-less pool).
    Keys {
        #[command(subcommand)]
        command: KeysCommand,
    },

    /// Manage named channels (credential groupings with their own model
    /// allow-list, remap table and concurrency cap).
    Channels {
        #[command(subcommand)]
        command: ChannelsCommand,
    },

    /// Manage gateway-issued bearer tokens.
    Tokens {
        #[command(subcommand)]
        command: TokensCommand,
    },

    /// Manage the IP access control policy.
    Access {
        #[command(subcommand)]
        command: AccessCommand,
    },
}

#[derive(Subcommand)]
pub enum KeysCommand {
    /// Add one backend credential.
    Add {
        /// `apiKey` or `apiKey@baseUrl`, defaulting to the configured Ollama base URL.
        raw: String,
    },
    /// Add many credentials at once, one `apiKey[@baseUrl]` per line of stdin.
    Import,
    /// List every credential (keys masked).
    List,
    /// Remove a credential by id.
    Remove { id: String },
    /// Flip a credential's enabled flag.
    Toggle { id: String },
    /// Probe every credential's `/tags` endpoint and update health state.
    CheckHealth,
    /// Mark every credential healthy again without probing it.
    ResetHealth,
    /// Remove every credential.
    Clear,
}

#[derive(Subcommand)]
pub enum ChannelsCommand {
    /// Add a channel over one or more existing credential ids.
    Add {
        name: String,
        /// Comma-separated credential ids.
        credentials: String,
        #[arg(long, default_value_t = 0)]
        max_concurrent: u32,
    },
    /// List every channel.
    List,
    /// Remove a channel by id.
    Remove { id: String },
}

#[derive(Subcommand)]
pub enum TokensCommand {
    /// Issue a new bearer token.
    Create {
        name: String,
        #[arg(long)]
        monthly_quota: Option<u64>,
        /// Comma-separated model glob patterns; omit to permit every model.
        #[arg(long)]
        models: Option<String>,
    },
    /// List every issued token (values masked).
    List,
    /// Revoke (remove) a token by id.
    Revoke { id: String },
}

#[derive(Subcommand)]
pub enum AccessCommand {
    /// Show the current access policy.
    Show,
    /// Switch the access mode.
    SetMode {
        #[arg(value_enum)]
        mode: AccessModeArg,
    },
    /// Add an entry (literal IPv4 or CIDR range) to the whitelist.
    Allow { entry: String },
    /// Add an entry (literal IPv4 or CIDR range) to the blacklist.
    Deny { entry: String },
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum AccessModeArg {
    Disabled,
    Whitelist,
    Blacklist,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_serve_with_port_override() {
        let cli = Cli::parse_from(["o2o", "serve", "--port", "9090"]);
        match cli.command {
            Some(Commands::Serve { port }) => assert_eq!(port, Some(9090)),
            _ => panic!("expected Serve command"),
        }
    }
}
