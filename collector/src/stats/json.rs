use super::{
    coerce_leaf,
    Section,
    StatsSource,
    StatsTree,
};
use crate::error::ParseError;
use serde_json::{
    Map,
    Value,
};

const VERSION_KEY: &str = "json-stats-version";

const SERVER_SECTIONS: &[(&str, Section)] = &[
    ("opcodes", Section::Opcode),
    ("qtypes", Section::QtypeIn),
    ("rcodes", Section::Rcode),
    ("nsstats", Section::NsStat),
    ("zonestats", Section::ZoneStat),
    ("resstats", Section::ResStat),
    ("sockstats", Section::SockStat),
];

const RESOLVER_SECTIONS: &[(&str, Section)] = &[
    ("qtypes", Section::QtypeOut),
    ("stats", Section::ResolverStats),
    ("cachestats", Section::CacheStats),
    ("adb", Section::AdbStat),
    ("cache", Section::CacheDb),
];

/// Reads the `/json/v1` statistics layout.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSource;

impl StatsSource for JsonSource {
    fn parse(&self, raw: &[u8]) -> Result<StatsTree, ParseError> {
        let doc: Value = serde_json::from_slice(raw).map_err(|e| {
            if e.is_eof() {
                ParseError::Truncated(e.to_string())
            } else {
                ParseError::UnsupportedSchema(e.to_string())
            }
        })?;
        let Value::Object(root) = doc else {
            return Err(ParseError::UnsupportedSchema("top level is not a JSON object".to_string()));
        };
        check_version(&root)?;

        let mut tree = StatsTree::new();
        for (key, section) in SERVER_SECTIONS {
            if let Some(counters) = root.get(*key) {
                read_counters(counters, *section, &mut tree);
            }
        }
        if let Some(resolver) = root
            .get("views")
            .and_then(|views| views.get("_default"))
            .and_then(|view| view.get("resolver"))
        {
            for (key, section) in RESOLVER_SECTIONS {
                if let Some(counters) = resolver.get(*key) {
                    read_counters(counters, *section, &mut tree);
                }
            }
        }
        if let Some(Value::Object(memory)) = root.get("memory") {
            for (name, value) in memory {
                // `contexts` and friends are per-allocator details, not summary counters.
                if value.is_array() || value.is_object() {
                    continue;
                }
                if let Some(value) = coerce_value(Section::Memory, name, value) {
                    tree.insert(Section::Memory, name.as_str(), value);
                }
            }
        }
        Ok(tree)
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

fn check_version(root: &Map<String, Value>) -> Result<(), ParseError> {
    match root.get(VERSION_KEY) {
        Some(version) => {
            let version = version.as_str().unwrap_or_default();
            match version.split('.').next().map(str::parse::<u32>) {
                Some(Ok(1)) => Ok(()),
                _ => Err(ParseError::UnsupportedSchema(format!(
                    "statistics version `{version}` is not supported, expected 1.x"
                ))),
            }
        }
        None => {
            let recognized = SERVER_SECTIONS.iter().any(|(key, _)| root.contains_key(*key))
                || root.contains_key("views")
                || root.contains_key("memory");
            if recognized {
                Ok(())
            } else {
                Err(ParseError::UnsupportedSchema(
                    "no statistics sections in JSON document".to_string(),
                ))
            }
        }
    }
}

fn read_counters(counters: &Value, section: Section, tree: &mut StatsTree) {
    let Value::Object(counters) = counters else {
        warn!(?section, "Ignoring statistics section that is not an object");
        return;
    };
    for (name, value) in counters {
        if let Some(value) = coerce_value(section, name, value) {
            tree.insert(section, name.as_str(), value);
        }
    }
}

fn coerce_value(section: Section, name: &str, value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| coerce_leaf(section, name, &number.to_string())),
        Value::String(text) => coerce_leaf(section, name, text),
        other => coerce_leaf(section, name, &other.to_string()),
    }
}
