use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use skymod_core::{PageLimits, list_collection};
use skymod_xrpc::MuteList;

use crate::commands::{authenticated_client, blocked_by, name_identities, pds_client};
use crate::opts::{GlobalOpts, ListOpts};
use crate::output::{notice, print_user_list};

#[derive(Args, Debug)]
pub struct ListMutesArgs {
    #[command(flatten)]
    pub list: ListOpts,
}

#[derive(Args, Debug)]
pub struct ListBlocksArgs {
    /// Users whose blocks to list, e.g. @user1.bsky.social
    #[arg(required = true, value_name = "@USER")]
    pub users: Vec<String>,

    #[command(flatten)]
    pub list: ListOpts,

    /// Skip users whose repository cannot be read instead of stopping
    #[arg(long)]
    pub keep_going: bool,
}

pub async fn cmd_list_mutes(opts: &GlobalOpts, args: &ListMutesArgs) -> Result<()> {
    let creds = crate::require_credentials(opts);
    let client = authenticated_client(opts, &creds).await?;
    let mutes = list_collection(&MuteList::new(&client), PageLimits::default())
        .await
        .context("list mutes")?;
    print_user_list(
        opts,
        args.list.style(),
        "users my account has muted",
        &[],
        &mutes,
        None,
    )
}

pub async fn cmd_list_blocks(opts: &GlobalOpts, args: &ListBlocksArgs) -> Result<()> {
    let client = pds_client(opts)?;
    let blocked = blocked_by(&client, &args.users, args.keep_going).await?;
    let (users, skipped) = name_identities(opts, &blocked)
        .await
        .context("list blocks")?;
    print_user_list(
        opts,
        args.list.style(),
        "users blocked",
        &args.users,
        &users,
        Some(json!({ "without_handle": skipped })),
    )?;
    if users.is_empty() {
        notice(opts, "no blocked users found");
    }
    Ok(())
}
