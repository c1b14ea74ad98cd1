//! Tracker session state
//!
//! A [`TrackerSession`] is built by `init` and read by every dispatch. It
//! carries the selected credentials, the pre-built query string and the
//! session GUID.

use indexmap::IndexMap;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::config::CredentialSet;
use crate::error::{Error, Result};

/// Query key reserved for the compression marker
pub const COMPRESSION_KEY: &str = "compression";

/// Compression marker value expected by the collector
pub const COMPRESSION_VALUE: &str = "gzip-js";

const GUID_TEMPLATE: &str = "10000000-1000-4000-8000-100000000000";

/// Which credential set `init` selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Test,
    Production,
}

impl Environment {
    /// Code 2 selects test credentials; anything else, including no code, is production.
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(2) => Environment::Test,
            _ => Environment::Production,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }
}

/// Session state shared by all dispatches after `init`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSession {
    pub environment: Environment,
    pub token: String,
    pub api_link: String,
    pub query_param: String,
    pub guid: String,
    pub distinct_id: Option<String>,
}

impl TrackerSession {
    pub fn new(
        environment: Environment,
        credentials: &CredentialSet,
        query_param: String,
        guid: String,
    ) -> Self {
        Self {
            environment,
            token: credentials.token.clone(),
            api_link: credentials.api_link.clone(),
            query_param,
            guid,
            distinct_id: None,
        }
    }

    /// Whether the session holds usable credentials
    pub fn is_ready(&self) -> bool {
        !self.token.is_empty() && !self.api_link.is_empty()
    }

    /// Full collector URL: `{api_link}?{query_param}`
    pub fn endpoint(&self) -> String {
        format!("{}?{}", self.api_link, self.query_param)
    }
}

/// Build the collector query string.
///
/// Always starts with `compression=gzip-js`; caller pairs follow in the order
/// they were inserted, percent-encoded. A caller-supplied `compression` key is dropped so the
/// marker appears exactly once.
pub fn build_query_string(params: &IndexMap<String, String>) -> String {
    let mut query = format!("{}={}", COMPRESSION_KEY, COMPRESSION_VALUE);

    for (key, value) in params {
        if key == COMPRESSION_KEY {
            continue;
        }
        query.push('&');
        query.push_str(&urlencoding::encode(key));
        query.push('=');
        query.push_str(&urlencoding::encode(value));
    }

    query
}

/// Generate a session GUID from the OS randomness source.
///
/// Fills the `10000000-1000-4000-8000-100000000000` template: every `0` and
/// `1` becomes a random nibble, every `8` becomes one of `8..=b`, and the
/// `4` version digit is kept.
pub fn generate_guid() -> Result<String> {
    let slots = GUID_TEMPLATE
        .chars()
        .filter(|c| matches!(c, '0' | '1' | '8'))
        .count();
    let mut random = vec![0u8; slots];
    OsRng
        .try_fill_bytes(&mut random)
        .map_err(|e| Error::Guid(e.to_string()))?;

    let mut bytes = random.into_iter();
    let mut guid = String::with_capacity(GUID_TEMPLATE.len());
    for c in GUID_TEMPLATE.chars() {
        match c.to_digit(16) {
            Some(n @ (0 | 1 | 8)) => {
                let r = u32::from(bytes.next().unwrap_or_default());
                let nibble = n ^ (r & (15 >> (n / 4)));
                guid.push(char::from_digit(nibble, 16).unwrap_or('0'));
            }
            _ => guid.push(c),
        }
    }

    Ok(guid)
}
