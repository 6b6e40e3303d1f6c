//! CLI entry point - the composition root.
//!
//! This is the only place infrastructure is wired together (via
//! `bootstrap`). Command dispatch routes straight to handlers.

use clap::Parser;

use o2o_cli::commands::{AccessCommand, ChannelsCommand, Cli, Commands, KeysCommand, TokensCommand};
use o2o_cli::{bootstrap, handlers};
use o2o_core::config::GatewayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = GatewayConfig::from_env();
    let ctx = bootstrap(config).await?;

    match command {
        Commands::Serve { port } => {
            handlers::serve::execute(&ctx, port).await?;
        }
        Commands::Paths => {
            handlers::paths::execute()?;
        }
        Commands::Keys { command } => match command {
            KeysCommand::Add { raw } => handlers::keys::add(&ctx, &raw)?,
            KeysCommand::Import => handlers::keys::import(&ctx)?,
            KeysCommand::List => handlers::keys::list(&ctx)?,
            KeysCommand::Remove { id } => handlers::keys::remove(&ctx, &id)?,
            KeysCommand::Toggle { id } => handlers::keys::toggle(&ctx, &id)?,
            KeysCommand::CheckHealth => handlers::keys::check_health(&ctx).await?,
            KeysCommand::ResetHealth => handlers::keys::reset_health(&ctx)?,
            KeysCommand::Clear => handlers::keys::clear(&ctx)?,
        },
        Commands::Channels { command } => match command {
            ChannelsCommand::Add { name, credentials, max_concurrent } => {
                handlers::channels::add(&ctx, &name, &credentials, max_concurrent)?
            }
            ChannelsCommand::List => handlers::channels::list(&ctx)?,
            ChannelsCommand::Remove { id } => handlers::channels::remove(&ctx, &id)?,
        },
        Commands::Tokens { command } => match command {
            TokensCommand::Create { name, monthly_quota, models } => {
                handlers::tokens::create(&ctx, &name, monthly_quota, models.as_deref())?
            }
            TokensCommand::List => handlers::tokens::list(&ctx)?,
            TokensCommand::Revoke { id } => handlers::tokens::revoke(&ctx, &id)?,
        },
        Commands::Access { command } => match command {
            AccessCommand::Show => handlers::access::show(&ctx)?,
            AccessCommand::SetMode { mode } => handlers::access::set_mode(&ctx, mode)?,
            AccessCommand::Allow { entry } => handlers::access::allow(&ctx, &entry)?,
            AccessCommand::Deny { entry } => handlers::access::deny(&ctx, &entry)?,
        },
    }

    ctx.state.flush_all().await;

    Ok(())
}
