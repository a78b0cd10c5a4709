use super::{
    coerce_leaf,
    Section,
    StatsSource,
    StatsTree,
};
use crate::error::ParseError;
use roxmltree::{
    Document,
    Node,
};

const DEFAULT_VIEW: &str = "_default";

/// Reads the `/xml/v3` statistics layout.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlSource;

impl StatsSource for XmlSource {
    fn parse(&self, raw: &[u8]) -> Result<StatsTree, ParseError> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| ParseError::UnsupportedSchema(format!("document is not UTF-8: {e}")))?;
        let doc = Document::parse(text).map_err(|e| ParseError::Truncated(e.to_string()))?;

        let root = doc.root_element();
        if !root.has_tag_name("statistics") {
            return Err(ParseError::UnsupportedSchema(format!(
                "expected <statistics> root, found <{}>",
                root.tag_name().name()
            )));
        }
        check_version(root)?;

        let mut tree = StatsTree::new();
        for child in elements(root) {
            match child.tag_name().name() {
                "server" => read_server(child, &mut tree),
                "views" => read_views(child, &mut tree),
                "memory" => read_memory(child, &mut tree),
                other => trace!(element = other, "Skipping unsupported statistics element"),
            }
        }
        Ok(tree)
    }

    fn name(&self) -> &'static str {
        "xml"
    }
}

fn check_version(root: Node) -> Result<(), ParseError> {
    let version = root
        .attribute("version")
        .ok_or_else(|| ParseError::UnsupportedSchema("missing statistics version".to_string()))?;
    match version.split('.').next().map(str::parse::<u32>) {
        Some(Ok(3)) => Ok(()),
        _ => Err(ParseError::UnsupportedSchema(format!(
            "statistics version {version} is not supported, expected 3.x"
        ))),
    }
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

fn read_server(server: Node, tree: &mut StatsTree) {
    for counters in elements(server).filter(|n| n.has_tag_name("counters")) {
        let Some(section) = counters.attribute("type").and_then(Section::from_server_counters) else {
            continue;
        };
        read_counters(counters, section, tree);
    }
}

fn read_views(views: Node, tree: &mut StatsTree) {
    let Some(view) =
        elements(views).find(|n| n.has_tag_name("view") && n.attribute("name") == Some(DEFAULT_VIEW))
    else {
        debug!("No default view in statistics document");
        return;
    };

    for child in elements(view) {
        match child.tag_name().name() {
            "counters" => {
                if let Some(section) = child.attribute("type").and_then(Section::from_view_counters) {
                    read_counters(child, section, tree);
                }
            }
            "cache" if child.attribute("name") == Some(DEFAULT_VIEW) => read_cachedb(child, tree),
            _ => {}
        }
    }
}

/// `<counter name="QUERY">1000</counter>` children.
fn read_counters(counters: Node, section: Section, tree: &mut StatsTree) {
    for counter in elements(counters).filter(|n| n.has_tag_name("counter")) {
        let Some(name) = counter.attribute("name") else {
            continue;
        };
        if let Some(value) = coerce_leaf(section, name, counter.text().unwrap_or_default()) {
            tree.insert(section, name, value);
        }
    }
}

/// `<rrset><name>A</name><counter>12</counter></rrset>` children.
fn read_cachedb(cache: Node, tree: &mut StatsTree) {
    for rrset in elements(cache).filter(|n| n.has_tag_name("rrset")) {
        let name = child_text(rrset, "name");
        let counter = child_text(rrset, "counter");
        let (Some(name), Some(counter)) = (name, counter) else {
            continue;
        };
        if let Some(value) = coerce_leaf(Section::CacheDb, name, counter) {
            tree.insert(Section::CacheDb, name, value);
        }
    }
}

/// `<summary><InUse>123</InUse>...</summary>`; per-context details are skipped.
fn read_memory(memory: Node, tree: &mut StatsTree) {
    let Some(summary) = elements(memory).find(|n| n.has_tag_name("summary")) else {
        return;
    };
    for leaf in elements(summary) {
        let name = leaf.tag_name().name();
        if let Some(value) = coerce_leaf(Section::Memory, name, leaf.text().unwrap_or_default()) {
            tree.insert(Section::Memory, name, value);
        }
    }
}

fn child_text<'a>(node: Node<'a, '_>, tag: &str) -> Option<&'a str> {
    elements(node).find(|n| n.has_tag_name(tag)).and_then(|n| n.text())
}
