//! Global CLI options and credentials.

use anyhow::Result;
use clap::Args;
use skymod_core::normalize_handle;
use skymod_xrpc::ServiceConfig;

/// Options accepted before or after any subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Your handle, e.g. @me.bsky.social (env: SKYMOD_USER)
    #[arg(long = "my-user", value_name = "HANDLE", global = true, env = "SKYMOD_USER")]
    pub my_user: Option<String>,

    /// An app password created in the account settings (env: SKYMOD_APP_KEY)
    #[arg(
        long = "app-key",
        value_name = "KEY",
        global = true,
        env = "SKYMOD_APP_KEY",
        hide_env_values = true
    )]
    pub app_key: Option<String>,

    /// PDS base URL (env: SKYMOD_PDS_URL, default: https://bsky.social)
    #[arg(long, value_name = "URL", global = true, env = "SKYMOD_PDS_URL")]
    pub pds: Option<String>,

    /// PLC directory base URL (env: SKYMOD_PLC_URL, default: https://plc.directory)
    #[arg(long, value_name = "URL", global = true, env = "SKYMOD_PLC_URL")]
    pub plc: Option<String>,

    /// JSON output envelope
    #[arg(long, global = true)]
    pub json: bool,
}

/// Output options of the list commands.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct ListOpts {
    /// Print identifiers next to handles, without a header
    #[arg(long, conflicts_with = "oneline")]
    pub verbose: bool,

    /// Print all handles on a single line
    #[arg(long)]
    pub oneline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStyle {
    Plain,
    Oneline,
    Verbose,
}

impl ListOpts {
    pub fn style(&self) -> ListStyle {
        match (self.verbose, self.oneline) {
            (true, _) => ListStyle::Verbose,
            (false, true) => ListStyle::Oneline,
            (false, false) => ListStyle::Plain,
        }
    }
}

pub struct Credentials {
    pub identifier: String,
    pub app_key: String,
}

const CREDENTIALS_HELP: &str = "Example:
   skymod --my-user @me.bsky.social --app-key xyz mute users @someone.else

App passwords look something like xj5s-fqo6-rtfm-lsrt.
If you do not have one, create an app password in the account
settings of your Bluesky client.";

impl GlobalOpts {
    /// Credentials for commands that act on your account. `Err` holds the
    /// usage message for whichever flags are missing.
    pub fn credentials(&self) -> std::result::Result<Credentials, String> {
        let user = self.my_user.as_deref().filter(|s| !s.is_empty());
        let key = self.app_key.as_deref().filter(|s| !s.is_empty());
        let missing = match (user, key) {
            (Some(user), Some(key)) => {
                return Ok(Credentials {
                    identifier: normalize_handle(user).to_owned(),
                    app_key: key.to_owned(),
                });
            }
            (None, None) => {
                "both the --my-user and --app-key flags must be provided with your handle and app password"
            }
            (Some(_), None) => "the --app-key flag must be provided with an app password",
            (None, Some(_)) => "the --my-user flag must be provided with your handle",
        };
        Err(format!("{missing}\n\n{CREDENTIALS_HELP}"))
    }

    pub fn service_config(&self) -> Result<ServiceConfig> {
        let mut config = ServiceConfig::from_env()?;
        if let Some(pds) = &self.pds {
            config.pds_url = pds.clone();
        }
        if let Some(plc) = &self.plc {
            config.plc_url = plc.clone();
        }
        Ok(config)
    }
}
