//! CLI command handlers.

pub mod list;
pub mod mute;

use anyhow::{Context, Result};
use skymod_core::{
    BLOCK_COLLECTION, EdgeScanner, ResolvedIdentity, resolve_handles, resolve_identifiers,
};
use skymod_xrpc::{PlcClient, XrpcClient};
use tracing::warn;

use crate::opts::{Credentials, GlobalOpts};

pub fn pds_client(opts: &GlobalOpts) -> Result<XrpcClient> {
    Ok(XrpcClient::new(&opts.service_config()?)?)
}

pub fn plc_client(opts: &GlobalOpts) -> Result<PlcClient> {
    Ok(PlcClient::new(&opts.service_config()?)?)
}

/// A PDS client with an app-password session attached.
pub async fn authenticated_client(opts: &GlobalOpts, creds: &Credentials) -> Result<XrpcClient> {
    let mut client = pds_client(opts)?;
    client
        .login(&creds.identifier, &creds.app_key)
        .await
        .context("authenticate")?;
    Ok(client)
}

/// Identifiers blocked by the given users, first appearance first.
///
/// With `keep_going`, a user whose repository cannot be read is reported
/// and skipped; otherwise the first such failure ends the command.
pub async fn blocked_by(
    client: &XrpcClient,
    handles: &[String],
    keep_going: bool,
) -> Result<Vec<String>> {
    let sources = resolve_handles(client, handles)
        .await
        .context("resolve handles")?;
    let mut scanner = EdgeScanner::new(BLOCK_COLLECTION);
    for source in &sources {
        match scanner.scan_source(client, &source.did).await {
            Ok(_) => {}
            Err(err) if keep_going && err.is_scoped_to_source() => {
                warn!(did = %source.did, handle = %source.handle, error = %err, "skipping user");
                eprintln!("notice: skipping @{}: {err}", source.handle);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("list blocks for {}", source.did));
            }
        }
    }
    Ok(scanner.into_edges())
}

/// Handles for `dids`, with the identifiers that have none.
pub async fn name_identities(
    opts: &GlobalOpts,
    dids: &[String],
) -> Result<(Vec<ResolvedIdentity>, Vec<String>)> {
    let plc = plc_client(opts)?;
    let resolution = resolve_identifiers(&plc, dids)
        .await
        .context("resolve identifiers")?;
    Ok((resolution.resolved, resolution.skipped))
}
