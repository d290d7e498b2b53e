//! Build version tags and the generated version header
//!
//! A tag looks like `v2024.01.01-120000-001`: the local date and time at second granularity,
//! followed by the millisecond of the wall clock so that two tags minted within the same second
//! are still distinguishable.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Local, NaiveDateTime};
use log::{debug, info};

use crate::{BuildContext, Error};

/// The include guard of the generated header
pub const HEADER_GUARD: &str = "_AUTO_FW_VERSION_H_";
/// The macro the generated header binds the tag to
pub const VERSION_SYMBOL: &str = "FW_VERSION";
/// The tag used when no version source yields anything
pub const UNKNOWN_VERSION: &str = "unknown";

/// Replaces every run of characters outside `[0-9A-Za-z._-]` with a single `_`
///
/// Surrounding whitespace is dropped first, and an empty result becomes `unknown`.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;

    for c in text.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }

    if out.is_empty() {
        UNKNOWN_VERSION.to_string()
    } else {
        out
    }
}

/// A sanitized, non-empty firmware version string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTag(String);

impl VersionTag {
    /// Mints a tag from the current local time
    pub fn mint() -> VersionTag {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.subsec_millis())
            .unwrap_or(0);

        VersionTag::from_parts(Local::now().naive_local(), millis)
    }

    /// Builds the tag for the given local `datetime` and sub-second `millis`
    pub fn from_parts(datetime: NaiveDateTime, millis: u32) -> VersionTag {
        let text = format!("v{}-{:03}", datetime.format("%Y.%m.%d-%H%M%S"), millis % 1000);

        VersionTag::sanitized(&text)
    }

    /// Wraps an arbitrary version string, sanitizing it first
    pub fn sanitized(text: &str) -> VersionTag {
        VersionTag(sanitize(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Renders the contents of the generated version header
pub fn render_header(tag: &VersionTag) -> String {
    format!(
        "#ifndef {guard}\n#define {guard}\n#define {symbol} \"{tag}\"\n#endif\n",
        guard = HEADER_GUARD,
        symbol = VERSION_SYMBOL,
        tag = tag
    )
}

/// Writes the version header to `path`, replacing whatever was there
pub fn write_header<P: AsRef<Path>>(path: P, tag: &VersionTag) -> Result<(), Error> {
    let path = path.as_ref();

    debug!("Writing version header to {}", path.display());

    fs::write(path, render_header(tag))
        .map_err(|err| Error::HeaderWriteError(path.to_path_buf(), err))
}

/// Mints a new tag, publishes it in `ctx` and writes the version header
pub fn tag_build(ctx: &mut BuildContext) -> Result<VersionTag, Error> {
    let tag = VersionTag::mint();
    let header = ctx.header_path();

    ctx.publish_version(tag.clone())?;
    write_header(&header, &tag)?;

    info!("{}={}", VERSION_SYMBOL, tag);
    info!("Wrote {}", header.display());

    Ok(tag)
}
