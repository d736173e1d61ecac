mod commands;
mod opts;
mod output;
mod util;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};

use commands::list::{ListBlocksArgs, ListMutesArgs};
use commands::mute::{MuteFromBlocksArgs, MuteFromFileArgs, MuteFromUrlArgs, MuteUsersArgs};
use opts::{Credentials, GlobalOpts};

#[derive(Parser, Debug)]
#[command(
    name = "skymod",
    version,
    about = "Moderate your Bluesky experience by bulk muting"
)]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List mutes or blocks
    #[command(subcommand)]
    List(ListCommand),

    /// Mute users
    #[command(subcommand)]
    Mute(MuteCommand),
}

#[derive(Subcommand, Debug)]
enum ListCommand {
    /// List the users your account has muted
    Mutes(ListMutesArgs),

    /// List the users blocked by one or more users
    Blocks(ListBlocksArgs),
}

#[derive(Subcommand, Debug)]
enum MuteCommand {
    /// Mute one or more users
    Users(MuteUsersArgs),

    /// Mute every user blocked by one or more users
    FromUserBlocks(MuteFromBlocksArgs),

    /// Mute the users listed in files
    FromFile(MuteFromFileArgs),

    /// Mute the users listed at URLs
    FromUrl(MuteFromUrlArgs),
}

/// Credentials for account commands; exits with a usage error when any are
/// missing.
pub(crate) fn require_credentials(opts: &GlobalOpts) -> Credentials {
    match opts.credentials() {
        Ok(creds) => creds,
        Err(message) => Cli::command()
            .error(ErrorKind::MissingRequiredArgument, message)
            .exit(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    util::load_env(std::path::Path::new(".env"))?;
    util::setup_logging();

    let cli = Cli::parse();
    let opts = &cli.opts;

    match cli.command {
        Command::List(cmd) => match cmd {
            ListCommand::Mutes(args) => commands::list::cmd_list_mutes(opts, &args).await,
            ListCommand::Blocks(args) => commands::list::cmd_list_blocks(opts, &args).await,
        },
        Command::Mute(cmd) => match cmd {
            MuteCommand::Users(args) => commands::mute::cmd_mute_users(opts, &args).await,
            MuteCommand::FromUserBlocks(args) => {
                commands::mute::cmd_mute_from_user_blocks(opts, &args).await
            }
            MuteCommand::FromFile(args) => commands::mute::cmd_mute_from_file(opts, &args).await,
            MuteCommand::FromUrl(args) => commands::mute::cmd_mute_from_url(opts, &args).await,
        },
    }
}
