//! Output helpers for human and JSON modes.
//!
//! Human mode prints results and progress notices to stdout; warnings about
//! skipped users go to stderr. JSON mode wraps results in `{ data, meta? }`
//! and suppresses notices.

use std::io::{self, Write};

use anyhow::Result;
use serde_json::{Value, json};
use skymod_core::ResolvedIdentity;

use crate::opts::{GlobalOpts, ListStyle};

const RULE_WIDTH: usize = 60;

/// Headers name at most this many users before eliding the rest.
const HEADER_USERS: usize = 2;

pub fn print_json(data: Value, meta: Option<Value>) -> Result<()> {
    let mut root = json!({ "data": data });
    if let (Some(meta), Some(obj)) = (meta, root.as_object_mut()) {
        obj.insert("meta".into(), meta);
    }
    println!("{}", serde_json::to_string(&root)?);
    Ok(())
}

/// Progress line for human mode; silent with `--json`.
pub fn notice(opts: &GlobalOpts, message: impl std::fmt::Display) {
    if !opts.json {
        println!("{message}");
    }
}

/// Writes the list header. Verbose output has none so that it can be saved
/// and fed back as a user list.
pub fn write_header<W: Write>(
    out: &mut W,
    style: ListStyle,
    title: &str,
    users: &[String],
) -> io::Result<()> {
    if style != ListStyle::Verbose {
        let mut named: Vec<&str> = users.iter().take(HEADER_USERS).map(String::as_str).collect();
        if users.len() > HEADER_USERS {
            named.push("...");
        }
        let by = if users.is_empty() { "" } else { " by " };
        write!(out, "\n{title}{by}{}", named.join(", "))?;
    }
    match style {
        ListStyle::Oneline => write!(out, ":\n\n"),
        ListStyle::Plain => write!(out, "\n{}\n", "-".repeat(RULE_WIDTH)),
        ListStyle::Verbose => Ok(()),
    }
}

pub fn write_users<W: Write>(
    out: &mut W,
    style: ListStyle,
    users: &[ResolvedIdentity],
) -> io::Result<()> {
    match style {
        ListStyle::Oneline => {
            let line: Vec<String> = users.iter().map(|u| format!("@{}", u.handle)).collect();
            if !line.is_empty() {
                writeln!(out, "{}", line.join(" "))?;
            }
        }
        ListStyle::Verbose => {
            for user in users {
                writeln!(out, "{} @{}", user.did, user.handle)?;
            }
        }
        ListStyle::Plain => {
            for user in users {
                writeln!(out, "@{}", user.handle)?;
            }
        }
    }
    Ok(())
}

/// Prints a user list with its header, or the JSON envelope.
pub fn print_user_list(
    opts: &GlobalOpts,
    style: ListStyle,
    title: &str,
    by: &[String],
    users: &[ResolvedIdentity],
    meta: Option<Value>,
) -> Result<()> {
    if opts.json {
        return print_json(serde_json::to_value(users)?, meta);
    }
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_header(&mut out, style, title, by)?;
    write_users(&mut out, style, users)?;
    out.flush()?;
    Ok(())
}
