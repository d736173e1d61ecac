use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use reqwest::StatusCode;
use skymod_core::{
    MuteSynchronizer, PageLimits, SyncReport, dids_of, parse_user_list, resolve_handles,
};
use skymod_xrpc::{MuteList, XrpcClient, http_client};

use crate::commands::{authenticated_client, blocked_by, name_identities};
use crate::opts::GlobalOpts;
use crate::output::{notice, print_json};

#[derive(Args, Debug)]
pub struct MuteUsersArgs {
    /// Users to mute, e.g. @someone.bsky.social
    #[arg(required = true, value_name = "@USER")]
    pub users: Vec<String>,
}

#[derive(Args, Debug)]
pub struct MuteFromBlocksArgs {
    /// Users whose blocks to mute
    #[arg(required = true, value_name = "@USER")]
    pub users: Vec<String>,

    /// Skip users whose repository cannot be read instead of stopping
    #[arg(long)]
    pub keep_going: bool,
}

#[derive(Args, Debug)]
pub struct MuteFromFileArgs {
    /// User lists: one identifier per line, anything after it ignored
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct MuteFromUrlArgs {
    /// URLs of user lists in the same format as files
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,
}

/// Mutes `dids` not already muted and reports what happened.
async fn sync_mutes(opts: &GlobalOpts, client: &XrpcClient, dids: &[String]) -> Result<SyncReport> {
    let mutes = MuteList::new(client);
    let outcome = MuteSynchronizer::new(&mutes, client)
        .with_limits(PageLimits::default())
        .run(dids)
        .await;
    let report = outcome.report;
    if let Some(err) = outcome.error {
        if report.newly_applied > 0 {
            notice(
                opts,
                format!("muted {} users before the failure", report.newly_applied),
            );
        }
        return Err(err.into());
    }
    if report.newly_applied == 0 {
        notice(
            opts,
            format!(
                "all {} users already muted, nothing more to do",
                report.requested
            ),
        );
        return Ok(report);
    }
    if report.already_satisfied > 0 {
        notice(
            opts,
            format!(
                "{} of {} users already muted",
                report.already_satisfied, report.requested
            ),
        );
    }
    notice(
        opts,
        format!("successfully muted {} users", report.newly_applied),
    );
    Ok(report)
}

fn finish(
    opts: &GlobalOpts,
    reports: &[(String, SyncReport)],
    meta: Option<serde_json::Value>,
) -> Result<()> {
    if opts.json {
        let data: Vec<_> = reports
            .iter()
            .map(|(source, report)| serde_json::json!({ "source": source, "report": report }))
            .collect();
        print_json(serde_json::Value::Array(data), meta)?;
    }
    Ok(())
}

pub async fn cmd_mute_users(opts: &GlobalOpts, args: &MuteUsersArgs) -> Result<()> {
    let creds = crate::require_credentials(opts);
    let client = authenticated_client(opts, &creds).await?;
    notice(opts, "muting...");
    let users = resolve_handles(&client, &args.users)
        .await
        .context("muting")?;
    let report = sync_mutes(opts, &client, &dids_of(&users)).await?;
    finish(opts, &[("users".into(), report)], None)
}

pub async fn cmd_mute_from_user_blocks(opts: &GlobalOpts, args: &MuteFromBlocksArgs) -> Result<()> {
    let creds = crate::require_credentials(opts);
    let client = authenticated_client(opts, &creds).await?;
    notice(opts, "getting blocks set by the supplied users...");
    let blocked = blocked_by(&client, &args.users, args.keep_going)
        .await
        .context("muting from user blocks")?;
    if blocked.is_empty() {
        notice(opts, "no blocks found");
        return finish(opts, &[], None);
    }
    let (users, skipped) = name_identities(opts, &blocked)
        .await
        .context("muting from user blocks")?;
    if !skipped.is_empty() {
        notice(
            opts,
            format!("skipping {} blocked users without a handle", skipped.len()),
        );
    }
    let meta = serde_json::json!({ "without_handle": skipped });
    if users.is_empty() {
        notice(opts, "no blocked users found");
        return finish(opts, &[], Some(meta));
    }
    let report = sync_mutes(opts, &client, &dids_of(&users)).await?;
    finish(opts, &[("blocks".into(), report)], Some(meta))
}

pub async fn cmd_mute_from_file(opts: &GlobalOpts, args: &MuteFromFileArgs) -> Result<()> {
    let creds = crate::require_credentials(opts);
    // Every list is read before anything is muted.
    let mut lists = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let file = File::open(path)
            .with_context(|| format!("mute from file: open {}", path.display()))?;
        let dids = parse_user_list(BufReader::new(file))
            .with_context(|| format!("parsing {}", path.display()))?;
        lists.push((path.display().to_string(), dids));
    }
    let client = authenticated_client(opts, &creds).await?;
    sync_lists(opts, &client, lists).await
}

pub async fn cmd_mute_from_url(opts: &GlobalOpts, args: &MuteFromUrlArgs) -> Result<()> {
    let creds = crate::require_credentials(opts);
    let http = http_client(&opts.service_config()?)?;
    let mut lists = Vec::with_capacity(args.urls.len());
    for url in &args.urls {
        let response = http
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed fetching {url}"))?;
        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => bail!("resource not found: {url}"),
            other => bail!(
                "unexpected status code {} when fetching {url}",
                other.as_u16()
            ),
        }
        let body = response
            .text()
            .await
            .with_context(|| format!("failed fetching {url}"))?;
        let dids = parse_user_list(body.as_bytes()).with_context(|| format!("parsing {url}"))?;
        lists.push((url.clone(), dids));
    }
    let client = authenticated_client(opts, &creds).await?;
    sync_lists(opts, &client, lists).await
}

async fn sync_lists(
    opts: &GlobalOpts,
    client: &XrpcClient,
    lists: Vec<(String, Vec<String>)>,
) -> Result<()> {
    let mut reports = Vec::with_capacity(lists.len());
    for (source, dids) in lists {
        notice(opts, format!("muting users from {source}..."));
        let report = sync_mutes(opts, client, &dids)
            .await
            .with_context(|| format!("handling {source}"))?;
        reports.push((source, report));
    }
    finish(opts, &reports, None)
}
