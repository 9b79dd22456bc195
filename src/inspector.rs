//! Tools for inspecting the structure of encoded graphs.
//! Useful for debugging handlers and tracking down dangling references.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::tags::{self, Node, Record};

/// A structural report of an intermediate tree.
#[derive(Debug, Serialize)]
pub struct TreeReport {
    /// Total number of nodes, leaves included.
    pub node_count: usize,
    /// Number of memo slots a restore would reserve.
    pub memo_slots: usize,
    /// Deepest container nesting.
    pub max_depth: usize,
    /// Occurrences of each tag.
    pub tags: BTreeMap<String, usize>,
    /// `$ref` indices that point past every slot defined before them.
    pub dangling_refs: Vec<usize>,
    /// The hierarchical tree of nodes.
    pub tree: NodeInfo,
}

/// Summary of one node.
#[derive(Debug, Serialize)]
pub struct NodeInfo {
    /// Mapping key or record part this node sits under.
    pub key: Option<String>,
    /// Short description (kind, size, tag payload).
    pub label: String,
    /// Memo slot the node occupies, if any.
    pub slot: Option<usize>,
    /// Child nodes.
    pub children: Vec<NodeInfo>,
}

/// The tree inspector.
#[derive(Debug)]
pub struct TreeInspector;

impl TreeInspector {
    /// Walks `node` in restore order and returns a structural report.
    pub fn inspect(node: &Node) -> TreeReport {
        let mut walk = Walk::default();
        let tree = walk.visit(None, node, 0);
        TreeReport {
            node_count: walk.nodes,
            memo_slots: walk.slots,
            max_depth: walk.max_depth,
            tags: walk.tags,
            dangling_refs: walk.dangling,
            tree,
        }
    }
}

#[derive(Default)]
struct Walk {
    nodes: usize,
    slots: usize,
    max_depth: usize,
    tags: BTreeMap<String, usize>,
    dangling: Vec<usize>,
}

const LEAF_LABEL_LIMIT: usize = 40;

impl Walk {
    fn claim(&mut self) -> Option<usize> {
        self.slots += 1;
        Some(self.slots - 1)
    }

    fn count_tag(&mut self, tag: &str) {
        *self.tags.entry(tag.to_string()).or_default() += 1;
    }

    fn info(key: Option<String>, label: String, slot: Option<usize>, children: Vec<NodeInfo>) -> NodeInfo {
        NodeInfo {
            key,
            label,
            slot,
            children,
        }
    }

    fn visit(&mut self, key: Option<String>, node: &Node, depth: usize) -> NodeInfo {
        self.nodes += 1;
        match node {
            Node::Array(items) => {
                self.max_depth = self.max_depth.max(depth + 1);
                let slot = self.claim();
                let children = self.visit_items(items, depth + 1);
                Self::info(key, format!("list[{}]", items.len()), slot, children)
            }
            Node::Object(record) => {
                self.max_depth = self.max_depth.max(depth + 1);
                self.visit_record(key, record, depth + 1)
            }
            leaf => {
                let mut label = leaf.to_string();
                if label.chars().count() > LEAF_LABEL_LIMIT {
                    label = label.chars().take(LEAF_LABEL_LIMIT).chain("…".chars()).collect();
                }
                Self::info(key, label, None, Vec::new())
            }
        }
    }

    fn visit_items(&mut self, items: &[Node], depth: usize) -> Vec<NodeInfo> {
        items.iter().map(|item| self.visit(None, item, depth)).collect()
    }

    /// A payload array: visited element by element, no slot of its own.
    fn visit_bare(&mut self, key: &str, node: &Node, depth: usize) -> NodeInfo {
        match node.as_array() {
            Some(items) => {
                self.nodes += 1;
                let children = self.visit_items(items, depth);
                Self::info(Some(key.to_string()), format!("[{}]", items.len()), None, children)
            }
            None => self.visit(Some(key.to_string()), node, depth),
        }
    }

    fn visit_record(&mut self, key: Option<String>, record: &Record, depth: usize) -> NodeInfo {
        let tagged = tags::DISCRIMINATORS
            .iter()
            .find_map(|&tag| record.get(tag).map(|payload| (tag, payload)));
        let Some((tag, payload)) = tagged else {
            let slot = self.claim();
            let children = record
                .iter()
                .map(|(k, v)| self.visit(Some(k.clone()), v, depth))
                .collect();
            return Self::info(key, format!("dict{{{}}}", record.len()), slot, children);
        };

        self.count_tag(tag);
        let text = payload.as_str().map(str::to_string).unwrap_or_else(|| payload.to_string());
        match tag {
            tags::REF => {
                let index = payload.as_u64().and_then(|n| usize::try_from(n).ok());
                let dangling = index.is_none_or(|i| i >= self.slots);
                if dangling && let Some(index) = index {
                    self.dangling.push(index);
                }
                let label = if dangling { format!("$ref {text} (dangling)") } else { format!("$ref {text}") };
                Self::info(key, label, None, Vec::new())
            }
            tags::TUPLE => {
                let items = payload.as_array().map(Vec::as_slice).unwrap_or_default();
                let children = self.visit_items(items, depth);
                Self::info(key, format!("$tuple[{}]", items.len()), None, children)
            }
            tags::SET => {
                let slot = self.claim();
                let items = payload.as_array().map(Vec::as_slice).unwrap_or_default();
                let children = self.visit_items(items, depth);
                Self::info(key, format!("$set[{}]", items.len()), slot, children)
            }
            tags::TYPEREF => Self::info(key, format!("$typeref {text}"), None, Vec::new()),
            tags::REPR => {
                let slot = if record.contains_key(tags::ID) { self.claim() } else { None };
                Self::info(key, format!("$repr {text}"), slot, Vec::new())
            }
            tags::REDUCE => {
                let slot = self.claim();
                let parts = payload.as_array().map(Vec::as_slice).unwrap_or_default();
                let names = ["callable", "args", "state", "list_items", "dict_items"];
                let children = parts
                    .iter()
                    .zip(names)
                    .map(|(part, name)| match name {
                        "callable" | "state" => self.visit(Some(name.to_string()), part, depth),
                        _ => self.visit_bare(name, part, depth),
                    })
                    .collect();
                Self::info(key, "$reduce".to_string(), slot, children)
            }
            _ => {
                let slot = self.claim();
                let children = record
                    .iter()
                    .filter(|(k, _)| !tags::is_reserved(k))
                    .map(|(k, v)| self.visit(Some(tags::unescape(k).to_string()), v, depth))
                    .collect();
                Self::info(key, format!("$type {text}"), slot, children)
            }
        }
    }
}

impl std::fmt::Display for TreeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== GRAPHPICKLE INSPECTOR REPORT ===")?;
        writeln!(f, "Nodes:       {}", self.node_count)?;
        writeln!(f, "Memo slots:  {}", self.memo_slots)?;
        writeln!(f, "Max depth:   {}", self.max_depth)?;
        for (tag, count) in &self.tags {
            writeln!(f, "  {tag:<10} {count}")?;
        }
        if !self.dangling_refs.is_empty() {
            writeln!(f, "Dangling:    {:?}", self.dangling_refs)?;
        }
        writeln!(f, "\n[TREE]")?;
        self.tree.fmt_recursive(f, "", true)
    }
}

impl NodeInfo {
    fn fmt_recursive(&self, f: &mut std::fmt::Formatter<'_>, prefix: &str, is_last: bool) -> std::fmt::Result {
        let connector = if is_last { "└── " } else { "├── " };
        let child_prefix = if is_last { "    " } else { "│   " };
        let key = self.key.as_deref().map(|k| format!("{k}: ")).unwrap_or_default();
        let slot = self.slot.map(|s| format!(" #{s}")).unwrap_or_default();

        writeln!(f, "{prefix}{connector}{key}{}{slot}", self.label)?;

        let new_prefix = format!("{prefix}{child_prefix}");
        for (i, child) in self.children.iter().enumerate() {
            child.fmt_recursive(f, &new_prefix, i == self.children.len() - 1)?;
        }
        Ok(())
    }
}
