//! Input loading: newline-separated keys, with CIDR expansion for IPs.
//!
//! Blank lines are ignored. Lines that fail validation for the lookup mode
//! are skipped and counted, never fatal. Duplicate keys are dropped, first
//! occurrence wins. Loading stops with an error as soon as the key count
//! would exceed the batch cap, so an oversized CIDR range is never
//! materialized.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

use subsift_core::validate::{is_valid_domain, normalize_candidate};
use subsift_core::LookupMode;

use crate::error::{AppError, Result};

/// Keys accepted from an input source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedKeys {
    /// Valid, distinct keys in input order.
    pub keys: Vec<String>,
    /// Non-blank lines rejected by validation.
    pub skipped: usize,
}

/// Read and parse a key file.
///
/// # Errors
///
/// Returns [`AppError::Io`] if the file cannot be read, or
/// [`AppError::Input`] if the keys exceed `max_keys`.
pub fn load_keys(path: &Path, mode: LookupMode, max_keys: usize) -> Result<LoadedKeys> {
    let text = std::fs::read_to_string(path)?;
    let loaded = parse_keys(&text, mode, max_keys)?;
    tracing::info!(
        path = %path.display(),
        keys = loaded.keys.len(),
        skipped = loaded.skipped,
        "loaded input"
    );
    Ok(loaded)
}

/// Parse newline-separated keys for `mode`.
///
/// In reverse-IP mode a line containing `/` is treated as a CIDR range and
/// expanded to its host addresses.
///
/// # Errors
///
/// Returns [`AppError::Input`] as soon as the key count exceeds `max_keys`.
pub fn parse_keys(text: &str, mode: LookupMode, max_keys: usize) -> Result<LoadedKeys> {
    let mut loaded = LoadedKeys::default();
    let mut seen = HashSet::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let candidates = match mode {
            LookupMode::Subdomain => normalize_candidate(line)
                .filter(|d| is_valid_domain(d))
                .map(|d| vec![d]),
            LookupMode::ReverseIp if line.contains('/') => {
                let remaining = max_keys.saturating_sub(loaded.keys.len());
                match parse_cidr(line) {
                    Some((addr, prefix)) => Some(
                        expand_range(addr, prefix, remaining)?
                            .into_iter()
                            .map(|ip| ip.to_string())
                            .collect(),
                    ),
                    None => {
                        tracing::debug!(%line, "skipping invalid CIDR");
                        None
                    }
                }
            }
            LookupMode::ReverseIp => line
                .parse::<IpAddr>()
                .ok()
                .map(|ip| vec![ip.to_string()]),
        };

        let Some(candidates) = candidates else {
            loaded.skipped += 1;
            continue;
        };
        for key in candidates {
            if seen.insert(key.clone()) {
                if loaded.keys.len() == max_keys {
                    return Err(too_many(max_keys));
                }
                loaded.keys.push(key);
            }
        }
    }

    Ok(loaded)
}

fn too_many(max_keys: usize) -> AppError {
    AppError::Input(format!("batch exceeds the limit of {max_keys} keys"))
}

/// Expand a CIDR range to its usable host addresses.
///
/// IPv4 excludes the network and broadcast addresses for prefixes shorter
/// than /31; /31 and /32 keep every address. IPv6 excludes the
/// subnet-router anycast (network) address for prefixes shorter than /127.
/// Host bits set in the address are masked off.
///
/// # Errors
///
/// Returns [`AppError::Input`] if the range is malformed or holds more than
/// `limit` hosts.
pub fn expand_cidr(cidr: &str, limit: usize) -> Result<Vec<IpAddr>> {
    let (addr, prefix) =
        parse_cidr(cidr).ok_or_else(|| AppError::Input(format!("invalid CIDR: {cidr}")))?;
    expand_range(addr, prefix, limit)
}

/// Split `addr/prefix`, returning `None` if either half is malformed or the
/// prefix is too long for the address family.
fn parse_cidr(cidr: &str) -> Option<(IpAddr, u32)> {
    let (addr, prefix) = cidr.trim().split_once('/')?;
    let addr: IpAddr = addr.trim().parse().ok()?;
    let prefix: u32 = prefix.trim().parse().ok()?;
    let max_prefix = if addr.is_ipv4() { 32 } else { 128 };
    (prefix <= max_prefix).then_some((addr, prefix))
}

fn expand_range(addr: IpAddr, prefix: u32, limit: usize) -> Result<Vec<IpAddr>> {
    match addr {
        IpAddr::V4(v4) => {
            let host_bits = 32 - prefix;
            let mask = if prefix == 0 { 0 } else { u32::MAX << host_bits };
            let network = u64::from(u32::from(v4) & mask);
            let size = 1u64 << host_bits;
            let (first, last) = if prefix < 31 {
                (network + 1, network + size - 2)
            } else {
                (network, network + size - 1)
            };
            check_limit(u128::from(last - first + 1), limit)?;
            Ok((first..=last)
                .filter_map(|n| u32::try_from(n).ok())
                .map(|n| IpAddr::V4(Ipv4Addr::from(n)))
                .collect())
        }
        IpAddr::V6(v6) => {
            let host_bits = 128 - prefix;
            let mask = u128::MAX.checked_shl(host_bits).unwrap_or(0);
            let network = u128::from(v6) & mask;
            let span = u128::MAX.checked_shr(prefix).unwrap_or(0);
            let first = if prefix < 127 { network + 1 } else { network };
            let last = network | span;
            check_limit((last - first).saturating_add(1), limit)?;
            Ok((first..=last)
                .map(|n| IpAddr::V6(Ipv6Addr::from(n)))
                .collect())
        }
    }
}

fn check_limit(count: u128, limit: usize) -> Result<()> {
    if count > limit as u128 {
        return Err(AppError::Input(format!(
            "CIDR range holds {count} hosts, more than the {limit} allowed"
        )));
    }
    Ok(())
}
