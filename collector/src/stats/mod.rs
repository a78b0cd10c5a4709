//! # Statistics documents
//!
//! The BIND9 statistics channel serves the same counters either as an XML
//! tree (schema version 3) or as a JSON object. Both are normalized into a
//! [`StatsTree`] by a [`StatsSource`] chosen from the document's format tag,
//! so nothing downstream knows which one the server spoke.

use crate::error::ParseError;
use std::collections::BTreeMap;

mod json;
mod xml;

pub use json::JsonSource;
pub use xml::XmlSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Xml,
    Json,
}

impl DocumentFormat {
    /// Classify a response by its declared content type, falling back to the
    /// first non-whitespace byte of the body.
    pub fn classify(content_type: Option<&str>, body: &[u8]) -> Option<Self> {
        if let Some(content_type) = content_type.map(str::to_ascii_lowercase) {
            if content_type.contains("xml") {
                return Some(DocumentFormat::Xml);
            }
            if content_type.contains("json") {
                return Some(DocumentFormat::Json);
            }
        }
        match body.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'<') => Some(DocumentFormat::Xml),
            Some(b'{') => Some(DocumentFormat::Json),
            _ => None,
        }
    }

    pub fn source(&self) -> &'static dyn StatsSource {
        match self {
            DocumentFormat::Xml => &XmlSource,
            DocumentFormat::Json => &JsonSource,
        }
    }
}

/// One poll's worth of statistics as returned by the server. Dropped once parsed.
#[derive(Debug, Clone)]
pub struct RawStatsDocument {
    pub body: Vec<u8>,
    pub format: DocumentFormat,
}

impl RawStatsDocument {
    pub fn new(body: impl Into<Vec<u8>>, format: DocumentFormat) -> Self {
        Self {
            body: body.into(),
            format,
        }
    }

    pub fn parse(&self) -> Result<StatsTree, ParseError> {
        let source = self.format.source();
        trace!(source = source.name(), bytes = self.body.len(), "Parsing statistics document");
        source.parse(&self.body)
    }
}

/// A group of counters as published by the server.
///
/// Server-wide sections come first, then the resolver sections of the
/// `_default` view, then memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Opcode,
    QtypeIn,
    Rcode,
    NsStat,
    ZoneStat,
    ResStat,
    SockStat,
    QtypeOut,
    ResolverStats,
    CacheStats,
    AdbStat,
    CacheDb,
    Memory,
}

impl Section {
    /// Section for a `<counters type="...">` element below `<server>`.
    pub(crate) fn from_server_counters(kind: &str) -> Option<Self> {
        Some(match kind {
            "opcode" => Section::Opcode,
            "qtype" => Section::QtypeIn,
            "rcode" => Section::Rcode,
            "nsstat" => Section::NsStat,
            "zonestat" => Section::ZoneStat,
            "resstat" => Section::ResStat,
            "sockstat" => Section::SockStat,
            _ => return None,
        })
    }

    /// Section for a `<counters type="...">` element below the default view.
    pub(crate) fn from_view_counters(kind: &str) -> Option<Self> {
        Some(match kind {
            "resqtype" => Section::QtypeOut,
            "resstats" => Section::ResolverStats,
            "cachestats" => Section::CacheStats,
            "adbstat" => Section::AdbStat,
            _ => return None,
        })
    }
}

/// Counters of one poll, grouped by section. Counter names are unique within
/// a section and values are never negative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsTree {
    sections: BTreeMap<Section, BTreeMap<String, u64>>,
}

impl StatsTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a counter. A repeated name within a section keeps the first value.
    pub fn insert(&mut self, section: Section, name: impl Into<String>, value: u64) {
        let name = name.into();
        let counters = self.sections.entry(section).or_default();
        if counters.contains_key(&name) {
            debug!(?section, %name, "Ignoring repeated counter");
            return;
        }
        counters.insert(name, value);
    }

    pub fn get(&self, section: Section, name: &str) -> Option<u64> {
        self.sections.get(&section).and_then(|c| c.get(name)).copied()
    }

    pub fn section(&self, section: Section) -> Option<&BTreeMap<String, u64>> {
        self.sections.get(&section)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Section, &BTreeMap<String, u64>)> {
        self.sections.iter().map(|(section, counters)| (*section, counters))
    }

    pub fn len(&self) -> usize {
        self.sections.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turns the body of one statistics document into a [`StatsTree`].
pub trait StatsSource: Sync {
    fn parse(&self, raw: &[u8]) -> Result<StatsTree, ParseError>;

    fn name(&self) -> &'static str;
}

/// Coerce a leaf to a counter value. Anything that is not a non-negative
/// integer is dropped with a warning instead of failing the document.
pub(crate) fn coerce_leaf(section: Section, name: &str, text: &str) -> Option<u64> {
    match text.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(?section, counter = %name, value = %text.trim(), "Dropping counter that is not a non-negative integer: {err}");
            None
        }
    }
}
