//! Core types for lookup modes and source identification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What kind of lookup a batch performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LookupMode {
    /// Keys are domains; results are subdomains of the key.
    #[default]
    Subdomain,
    /// Keys are IP addresses; results are domains hosted on the address.
    ReverseIp,
}

impl LookupMode {
    /// Returns the stable kebab-case name used in config and query strings.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Subdomain => "subdomain",
            Self::ReverseIp => "reverse-ip",
        }
    }
}

impl fmt::Display for LookupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LookupMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subdomain" | "subdomains" => Ok(Self::Subdomain),
            "reverse-ip" | "reverse_ip" | "reverseip" | "ip" => Ok(Self::ReverseIp),
            other => Err(format!("unknown lookup mode: {other}")),
        }
    }
}

/// Lookup services that subsift can query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceId {
    /// crt.sh certificate transparency search.
    CrtSh,
    /// HackerTarget host search.
    HackerTarget,
    /// AlienVault OTX passive DNS.
    AlienVault,
    /// Anubis subdomain database (jldc.me).
    Anubis,
    /// urlscan.io search API.
    UrlScan,
    /// RapidDNS subdomain table.
    RapidDns,
    /// HackerTarget reverse IP lookup.
    HackerTargetReverseIp,
    /// RapidDNS same-IP table.
    RapidDnsSameIp,
    /// WebScan reverse IP API.
    WebScan,
}

impl SourceId {
    /// Returns the human-readable name of this source.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CrtSh => "crt.sh",
            Self::HackerTarget => "HackerTarget",
            Self::AlienVault => "AlienVault",
            Self::Anubis => "Anubis",
            Self::UrlScan => "urlscan",
            Self::RapidDns => "RapidDNS",
            Self::HackerTargetReverseIp => "HackerTarget-ReverseIP",
            Self::RapidDnsSameIp => "RapidDNS-SameIP",
            Self::WebScan => "WebScan",
        }
    }

    /// Returns which lookup mode this source serves.
    pub fn mode(&self) -> LookupMode {
        match self {
            Self::CrtSh
            | Self::HackerTarget
            | Self::AlienVault
            | Self::Anubis
            | Self::UrlScan
            | Self::RapidDns => LookupMode::Subdomain,
            Self::HackerTargetReverseIp | Self::RapidDnsSameIp | Self::WebScan => {
                LookupMode::ReverseIp
            }
        }
    }

    /// Returns all available source variants.
    pub fn all() -> &'static [SourceId] {
        &[
            Self::CrtSh,
            Self::HackerTarget,
            Self::AlienVault,
            Self::Anubis,
            Self::UrlScan,
            Self::RapidDns,
            Self::HackerTargetReverseIp,
            Self::RapidDnsSameIp,
            Self::WebScan,
        ]
    }

    /// Returns the sources registered for `mode`.
    pub fn for_mode(mode: LookupMode) -> Vec<SourceId> {
        Self::all()
            .iter()
            .copied()
            .filter(|s| s.mode() == mode)
            .collect()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
