//! Metric path construction.
//!
//! Every path has the shape `<root>.<server>.<category>.<section>.<counter>`.
//! Counter names are lower-cased and anything outside `[a-z0-9]` becomes `_`.
//! When two counters of one section normalize to the same component (cache
//! rrsets `!A` and `#A`, for instance) both get a `-<hex>` suffix built from
//! their original bytes. Normalized components never contain `-`, so the
//! mapping stays injective.

use super::{
    MetricKind,
    MetricSample,
};
use crate::stats::{
    Section,
    StatsTree,
};
use bindstats_config::Category;
use eyre::{
    eyre,
    Result,
};
use std::{
    collections::HashMap,
    fmt,
};

/// The server's name inside metric paths. Fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerIdentity(String);

impl ServerIdentity {
    pub fn new(name: &str) -> Result<Self> {
        let name = normalize_component(name.trim());
        if name.is_empty() {
            return Err(eyre!("server name must contain at least one character"));
        }
        Ok(Self(name))
    }

    /// Uses `name` when given, else the first label of the host name.
    pub fn resolve(name: Option<&str>) -> Result<Self> {
        match name {
            Some(name) => Self::new(name),
            None => {
                let host = hostname().ok_or_else(|| eyre!("cannot determine the host name, pass --name"))?;
                Self::new(host.split('.').next().unwrap_or_default())
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    // SAFETY: the pointer and length describe `buf`, which outlives the call.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return None;
    }
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    String::from_utf8(buf[..end].to_vec()).ok().filter(|h| !h.is_empty())
}

pub fn normalize_component(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn disambiguated_component(name: &str) -> String {
    let hex: String = name.bytes().map(|b| format!("{b:02x}")).collect();
    format!("{}-{hex}", normalize_component(name))
}

/// The category a section is reported under and its path component.
pub fn placement(section: Section) -> (Category, &'static str) {
    match section {
        Section::Opcode => (Category::Auth, "opcode"),
        Section::QtypeIn => (Category::Auth, "qtype"),
        Section::Rcode => (Category::Auth, "rcode"),
        Section::NsStat => (Category::Bind, "nsstat"),
        Section::ZoneStat => (Category::Zone, "zonestat"),
        Section::ResStat => (Category::Resolver, "server"),
        Section::QtypeOut => (Category::Resolver, "qtype"),
        Section::ResolverStats => (Category::Resolver, "stats"),
        Section::CacheStats => (Category::Resolver, "cache"),
        Section::AdbStat => (Category::Resolver, "adb"),
        Section::CacheDb => (Category::Resolver, "cachedb"),
        Section::SockStat => (Category::Socket, "sockstat"),
        Section::Memory => (Category::Memory, "summary"),
    }
}

/// Fixed kind table; gauges are listed, everything else counts up.
pub fn kind_of(section: Section, name: &str) -> MetricKind {
    let gauge = match section {
        Section::Memory | Section::CacheDb | Section::AdbStat => true,
        Section::SockStat => name.ends_with("Active"),
        Section::CacheStats => {
            name.ends_with("MemInUse")
                || name.ends_with("MemMax")
                || name.ends_with("MemTotal")
                || matches!(name, "CacheNodes" | "CacheBuckets")
        }
        Section::ResolverStats => matches!(name, "NumFetch" | "BucketSize"),
        _ => false,
    };
    if gauge {
        MetricKind::Gauge
    } else {
        MetricKind::Counter
    }
}

/// Flattens a [`StatsTree`] into metric samples for the enabled categories.
#[derive(Debug, Clone)]
pub struct Namer {
    root: String,
    identity: ServerIdentity,
    categories: Vec<Category>,
}

impl Namer {
    pub fn new(root: impl Into<String>, identity: ServerIdentity, categories: Vec<Category>) -> Self {
        Self {
            root: root.into(),
            identity,
            categories,
        }
    }

    pub fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    fn join(&self, section: Section, leaf: &str) -> String {
        let (category, component) = placement(section);
        format!("{}.{}.{}.{}.{}", self.root, self.identity, category, component, leaf)
    }

    pub fn name(&self, tree: &StatsTree, timestamp: i64) -> Vec<MetricSample> {
        let mut samples = Vec::with_capacity(tree.len());
        for (section, counters) in tree.iter() {
            let (category, _) = placement(section);
            if !self.categories.contains(&category) {
                continue;
            }

            let mut seen = HashMap::<String, usize>::new();
            for name in counters.keys() {
                *seen.entry(normalize_component(name)).or_default() += 1;
            }

            for (name, value) in counters {
                let leaf = normalize_component(name);
                let leaf = if seen.get(&leaf).copied().unwrap_or_default() > 1 {
                    disambiguated_component(name)
                } else {
                    leaf
                };
                samples.push(MetricSample {
                    path: self.join(section, &leaf),
                    value: *value,
                    timestamp,
                    kind: kind_of(section, name),
                });
            }
        }
        samples
    }
}
