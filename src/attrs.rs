//! Typed parsers for well-known wrapper attributes
//!
//! Attribute values arrive as opaque strings on the [`Body`](crate::Body)
//! attribute map. The helpers here convert the ones that carry semantics
//! (protocol version, timing bounds, request counts, encoding sets) into
//! typed values, failing with [`Error::AttributeParse`] on malformed input.
//! Every helper accepts `None` and returns `None` for an absent attribute.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::rid::MAX_RID;

/// A protocol version advertised through the `ver` attribute.
///
/// Ordering is numeric on `(major, minor)`, not lexicographic on the
/// string form, so `1.10 > 1.9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    major: u32,
    minor: u32,
}

impl Version {
    /// Construct a version from its numeric parts.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Major component.
    pub fn major(self) -> u32 {
        self.major
    }

    /// Minor component.
    pub fn minor(self) -> u32 {
        self.minor
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Parse a `ver` attribute value (`major.minor`, non-negative integers).
pub fn parse_version(value: Option<&str>) -> Result<Option<Version>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let parse = |part: &str| {
        part.parse::<u32>().map_err(|_| Error::AttributeParse {
            attribute: "ver",
            message: format!("'{value}' is not of the form major.minor"),
        })
    };
    let Some((major, minor)) = value.split_once('.') else {
        return Err(Error::AttributeParse {
            attribute: "ver",
            message: format!("'{value}' is not of the form major.minor"),
        });
    };
    Ok(Some(Version::new(parse(major)?, parse(minor)?)))
}

/// Parse a non-negative integer attribute (`wait`, `hold`, `polling`,
/// `inactivity`, `maxpause`, `pause`, `requests`, `time`).
pub fn parse_u64(attribute: &'static str, value: Option<&str>) -> Result<Option<u64>> {
    let Some(value) = value else {
        return Ok(None);
    };
    value
        .parse::<u64>()
        .map(Some)
        .map_err(|_| Error::AttributeParse {
            attribute,
            message: format!("'{value}' is not a non-negative integer"),
        })
}

/// Parse a request identifier attribute (`rid`, `ack`, `report`): a
/// positive integer strictly below 2^53.
pub fn parse_rid(attribute: &'static str, value: Option<&str>) -> Result<Option<u64>> {
    let Some(rid) = parse_u64(attribute, value)? else {
        return Ok(None);
    };
    if rid == 0 || rid >= MAX_RID {
        return Err(Error::AttributeParse {
            attribute,
            message: format!("{rid} is outside [1, 2^53)"),
        });
    }
    Ok(Some(rid))
}

/// Parse a comma-or-space separated token list (`accept`, `charsets`).
///
/// Empty segments are dropped; an attribute consisting only of separators
/// yields an empty set.
pub fn parse_token_set(value: Option<&str>) -> Option<BTreeSet<String>> {
    value.map(|v| {
        v.split([',', ' ', '\t'])
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    })
}
