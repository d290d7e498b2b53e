//! Finding the firmware version for the merged image name
//!
//! Each source is a `VersionResolver`. They are asked in order and the first one that yields a
//! non-blank value wins; whatever it yields is sanitized before use.

use std::fs;
use std::path::PathBuf;

use lazy_static::lazy_static;
use log::{debug, trace};
use regex::Regex;

use crate::version::{VersionTag, UNKNOWN_VERSION};
use crate::BuildContext;

/// A source of the firmware version
pub trait VersionResolver {
    /// A short name for logs
    fn name(&self) -> &str;

    fn resolve(&self, ctx: &BuildContext) -> Option<String>;
}

/// The tag published in the build context by the pre-build step
pub struct PublishedVersion;

impl VersionResolver for PublishedVersion {
    fn name(&self) -> &str {
        "build context"
    }

    fn resolve(&self, ctx: &BuildContext) -> Option<String> {
        ctx.version().map(|tag| tag.to_string())
    }
}

/// A `#define FW_VERSION "<value>"` line in a source file
pub struct MetadataFile {
    pub path: PathBuf,
}

impl VersionResolver for MetadataFile {
    fn name(&self) -> &str {
        "metadata source"
    }

    fn resolve(&self, _ctx: &BuildContext) -> Option<String> {
        match fs::read(&self.path) {
            Ok(bytes) => parse_version_define(&String::from_utf8_lossy(&bytes)),
            Err(err) => {
                debug!("Could not read {}: {}", self.path.display(), err);
                None
            }
        }
    }
}

/// A fixed value
pub struct Literal(pub &'static str);

impl VersionResolver for Literal {
    fn name(&self) -> &str {
        "fallback"
    }

    fn resolve(&self, _ctx: &BuildContext) -> Option<String> {
        Some(self.0.to_string())
    }
}

lazy_static! {
    /// A line-anchored `#define FW_VERSION "<value>"`, capturing the value
    static ref VERSION_DEFINE: Regex =
        Regex::new(r#"(?m)^\s*#define\s+FW_VERSION\s+"([^"]+)""#).unwrap();
}

/// Extracts the value of the first line-anchored `#define FW_VERSION "<value>"` in `source`
pub fn parse_version_define(source: &str) -> Option<String> {
    VERSION_DEFINE
        .captures(source)
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().to_string())
}

/// The resolvers `resolve_version` is normally called with: the published tag, then the
/// metadata source of `ctx`, then `unknown`
pub fn default_resolvers(ctx: &BuildContext) -> Vec<Box<dyn VersionResolver>> {
    vec![
        Box::new(PublishedVersion),
        Box::new(MetadataFile {
            path: ctx.metadata_path(),
        }),
        Box::new(Literal(UNKNOWN_VERSION)),
    ]
}

/// Asks `resolvers` in order and returns the first non-blank answer, sanitized
///
/// Returns `unknown` if none of them has an answer.
pub fn resolve_version(ctx: &BuildContext, resolvers: &[Box<dyn VersionResolver>]) -> VersionTag {
    for resolver in resolvers {
        match resolver.resolve(ctx) {
            Some(value) if !value.trim().is_empty() => {
                debug!("Using version {:?} from {}", value, resolver.name());

                return VersionTag::sanitized(&value);
            }
            _ => trace!("No version from {}", resolver.name()),
        }
    }

    VersionTag::sanitized(UNKNOWN_VERSION)
}
