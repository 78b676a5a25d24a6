//! Core data models used throughout the harvester.
//!
//! These types represent the bridge categories, the structured records
//! produced by classification, and the report returned from one pipeline
//! run.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use serde::{Deserialize, Serialize};

/// Pluggable transport a bridge line advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Obfs4,
    Webtunnel,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Obfs4 => "obfs4",
            Transport::Webtunnel => "webtunnel",
        }
    }

    /// Parses the leading token of a bridge line. Exact match only.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "obfs4" => Some(Transport::Obfs4),
            "webtunnel" => Some(Transport::Webtunnel),
            _ => None,
        }
    }
}

/// Address family of a bridge host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// A host containing `:` is treated as IPv6. This is not literal
    /// validation: a colon-bearing garbage host lands in IPv6 too.
    pub fn of_host(host: &str) -> Self {
        if host.contains(':') {
            AddressFamily::Ipv6
        } else {
            AddressFamily::Ipv4
        }
    }
}

/// The four bridge categories: transport × address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Obfs4Ipv4,
    Obfs4Ipv6,
    WebtunnelIpv4,
    WebtunnelIpv6,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Obfs4Ipv4,
        Category::Obfs4Ipv6,
        Category::WebtunnelIpv4,
        Category::WebtunnelIpv6,
    ];

    pub fn new(transport: Transport, family: AddressFamily) -> Self {
        match (transport, family) {
            (Transport::Obfs4, AddressFamily::Ipv4) => Category::Obfs4Ipv4,
            (Transport::Obfs4, AddressFamily::Ipv6) => Category::Obfs4Ipv6,
            (Transport::Webtunnel, AddressFamily::Ipv4) => Category::WebtunnelIpv4,
            (Transport::Webtunnel, AddressFamily::Ipv6) => Category::WebtunnelIpv6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Obfs4Ipv4 => "obfs4_ipv4",
            Category::Obfs4Ipv6 => "obfs4_ipv6",
            Category::WebtunnelIpv4 => "webtunnel_ipv4",
            Category::WebtunnelIpv6 => "webtunnel_ipv6",
        }
    }

    pub fn transport(&self) -> Transport {
        match self {
            Category::Obfs4Ipv4 | Category::Obfs4Ipv6 => Transport::Obfs4,
            Category::WebtunnelIpv4 | Category::WebtunnelIpv6 => Transport::Webtunnel,
        }
    }

    /// Section heading used in notifications, e.g. `OBFS4 IPV4`.
    pub fn label(&self) -> String {
        self.as_str().replacen('_', " ", 1).to_uppercase()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match Category::ALL.iter().find(|c| c.as_str() == s) {
            Some(c) => Ok(*c),
            None => bail!(
                "Unknown category: '{}'. Must be one of obfs4_ipv4, obfs4_ipv6, webtunnel_ipv4, webtunnel_ipv6.",
                s
            ),
        }
    }
}

/// Transport-specific trailing fields of a bridge line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransportDetails {
    Obfs4 {
        cert: String,
        #[serde(rename = "iat-mode")]
        iat_mode: String,
    },
    Webtunnel {
        url: String,
        ver: String,
    },
}

/// Structured decoding of one bridge line.
///
/// Serializes with the field names of the persisted JSON documents
/// (`bridge`, `ip`, `port`, `fingerprint`, `cert`, `iat-mode` or `url`,
/// `ver`, `addedAt`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeRecord {
    /// The trimmed source line, verbatim. Identity for deduplication.
    pub bridge: String,
    /// Host with any IPv6 brackets removed.
    pub ip: String,
    pub port: String,
    pub fingerprint: String,
    #[serde(flatten)]
    pub details: TransportDetails,
    #[serde(rename = "addedAt")]
    pub added_at: String,
}

impl BridgeRecord {
    pub fn transport(&self) -> Transport {
        match self.details {
            TransportDetails::Obfs4 { .. } => Transport::Obfs4,
            TransportDetails::Webtunnel { .. } => Transport::Webtunnel,
        }
    }

    pub fn category(&self) -> Category {
        Category::new(self.transport(), AddressFamily::of_host(&self.ip))
    }
}

/// Lines grouped by category, in discovery order within each group.
pub type CategoryLines = BTreeMap<Category, Vec<String>>;

/// Output of one pipeline run.
///
/// Categories without entries are absent from the maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub new_bridges: CategoryLines,
    pub duplicate_bridges: CategoryLines,
    pub malformed_bridges: Vec<String>,
}

impl RunReport {
    pub fn new_count(&self) -> usize {
        self.new_bridges.values().map(Vec::len).sum()
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicate_bridges.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.new_bridges.is_empty()
            && self.duplicate_bridges.is_empty()
            && self.malformed_bridges.is_empty()
    }
}
