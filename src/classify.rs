//! Bridge line classification.
//!
//! Parses one extracted line into a [`BridgeRecord`] and assigns its
//! [`Category`]. Lines that do not fit the transport's full shape are
//! reported as [`Malformed`]; that is an expected outcome, not a fault.
//!
//! The creation timestamp comes from an injected [`Clock`] so callers (and
//! tests) control `addedAt`.

use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;

use crate::models::{BridgeRecord, Transport, TransportDetails};

static OBFS4_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^obfs4\s+(\[[a-fA-F0-9:]+\]|\d{1,3}(?:\.\d{1,3}){3}):(\d+)\s+([A-F0-9]{40})\s+cert=(\S+)\s+iat-mode=([0-9]+)$",
    )
    .unwrap()
});
static WEBTUNNEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^webtunnel\s+(\[[a-fA-F0-9:]+\]|\d{1,3}(?:\.\d{1,3}){3}):(\d+)\s+([A-F0-9]{40})\s+url=(\S+)\s+ver=(\S+)$",
    )
    .unwrap()
});

/// Source of creation timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Renders a timestamp the way records store it: `2024-05-01T12:00:00.000Z`.
pub fn format_added_at(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Why a line could not be classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Malformed {
    /// Leading token is neither `obfs4` nor `webtunnel`.
    UnknownTransport(String),
    /// Transport recognised but the rest of the line does not fit.
    BadShape(Transport),
}

impl std::fmt::Display for Malformed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Malformed::UnknownTransport(t) => write!(f, "unknown transport '{}'", t),
            Malformed::BadShape(t) => write!(f, "line does not match the {} shape", t.as_str()),
        }
    }
}

/// Parses `line` into a structured record.
///
/// The category is available through [`BridgeRecord::category`].
pub fn classify(line: &str, clock: &dyn Clock) -> Result<BridgeRecord, Malformed> {
    let line = line.trim();
    let token = line.split(' ').next().unwrap_or_default();
    let transport = Transport::from_token(token)
        .ok_or_else(|| Malformed::UnknownTransport(token.to_string()))?;

    let re = match transport {
        Transport::Obfs4 => &*OBFS4_RE,
        Transport::Webtunnel => &*WEBTUNNEL_RE,
    };
    let caps = re.captures(line).ok_or(Malformed::BadShape(transport))?;

    let ip = caps[1].replace(['[', ']'], "");
    let details = match transport {
        Transport::Obfs4 => TransportDetails::Obfs4 {
            cert: caps[4].to_string(),
            iat_mode: caps[5].to_string(),
        },
        Transport::Webtunnel => TransportDetails::Webtunnel {
            url: caps[4].to_string(),
            ver: caps[5].to_string(),
        },
    };

    Ok(BridgeRecord {
        bridge: line.to_string(),
        ip,
        port: caps[2].to_string(),
        fingerprint: caps[3].to_string(),
        details,
        added_at: format_added_at(clock.now()),
    })
}
