use serde::{
    de,
    Deserialize,
    Deserializer,
    Serialize,
};
use std::str::FromStr;
use strum::{
    Display,
    EnumIter,
    EnumString,
    IntoEnumIterator as _,
};

/// Top-level metric groups that can be switched on and off.
#[derive(Debug, Clone, Copy, Display, EnumIter, EnumString, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[strum(ascii_case_insensitive)]
pub enum Category {
    /// Authoritative server counters: opcodes, incoming query types, rcodes.
    #[strum(to_string = "auth")]
    #[serde(rename = "auth")]
    Auth,
    /// Resolver, cache and address database statistics of the default view.
    #[strum(to_string = "res", serialize = "resolver")]
    #[serde(rename = "res")]
    Resolver,
    /// General name server statistics (nsstat).
    #[strum(to_string = "bind")]
    #[serde(rename = "bind")]
    Bind,
    /// Zone maintenance statistics.
    #[strum(to_string = "zone")]
    #[serde(rename = "zone")]
    Zone,
    #[strum(to_string = "memory")]
    #[serde(rename = "memory")]
    Memory,
    /// Socket I/O statistics.
    #[strum(to_string = "socket")]
    #[serde(rename = "socket")]
    Socket,
}

impl Category {
    pub fn all() -> Vec<Category> {
        Category::iter().collect()
    }

    /// Parse a comma separated list such as `auth,res,memory`.
    ///
    /// Unknown names are an error; duplicates are folded.
    pub fn parse_list(list: &str) -> Result<Vec<Category>, String> {
        let mut categories = Vec::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let category = Category::from_str(name).map_err(|_| {
                let known = Category::iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ");
                format!("unknown metric category `{name}` (known: {known})")
            })?;
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
        Ok(categories)
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        match Category::parse_list(&name).map_err(de::Error::custom)?.as_slice() {
            [category] => Ok(*category),
            _ => Err(de::Error::custom(format!("expected a single metric category, got `{name}`"))),
        }
    }
}

/// Accepts either a YAML sequence or a comma separated string.
pub(crate) fn deserialize_categories<'de, D>(deserializer: D) -> Result<Vec<Category>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Csv(String),
    }

    let joined = match Raw::deserialize(deserializer)? {
        Raw::List(names) => names.join(","),
        Raw::Csv(list) => list,
    };
    Category::parse_list(&joined).map_err(de::Error::custom)
}

/// How COUNTER metrics are turned into emitted values.
#[derive(Debug, Default, Clone, Copy, Display, EnumIter, EnumString, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeriveMode {
    /// The raw cumulative value, no previous-sample state is kept.
    Absolute,
    /// `current - previous` per poll interval.
    #[default]
    Delta,
    /// `(current - previous) / elapsed_seconds`.
    Rate,
}

/// What to emit the first time a COUNTER path is seen.
#[derive(Debug, Default, Clone, Copy, Display, EnumIter, EnumString, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FirstSample {
    /// Emit the cumulative value as-is.
    #[default]
    Emit,
    /// Emit `0`.
    Zero,
    /// Emit nothing until a second sample arrives.
    Suppress,
}
