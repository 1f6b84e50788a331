//! Presentation surface - what the traversal engine renders into
//!
//! The engine decides what each node shows and whether it changed; a
//! surface decides how to draw it. Surfaces only feed structural choices
//! back (expanded or not, filter text) and never touch history.

use std::collections::HashMap;

/// One visited node
#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    pub path: &'a str,
    pub label: &'a str,
    pub type_name: &'a str,
    pub address: u64,
    /// Seconds since the value last changed, if it ever did
    pub age: Option<f32>,
    /// Changed during this tick
    pub fresh: bool,
    /// Container that starts collapsed and is only walked when a user
    /// expands it (pointers, large arrays)
    pub on_demand: bool,
}

/// Type-specific content of a node
#[derive(Debug, Clone, PartialEq)]
pub enum Payload<'a> {
    /// Formatted scalar
    Scalar(String),
    /// Decoded text; `truncated` when no terminator was found
    Text { text: String, truncated: bool },
    Pointer { address: u64, symbol: Option<String> },
    /// Raw pixel window
    Image {
        width: u32,
        height: u32,
        bytes_per_pixel: u8,
        bytes: &'a [u8],
        generation: u32,
    },
    /// Container with this many children
    Children(usize),
    /// Bytes not (yet) readable
    Unavailable,
    /// Opaque value with a short description
    Unknown(&'a str),
}

impl Payload<'_> {
    /// Single-line rendering for text surfaces
    pub fn summary(&self) -> String {
        match self {
            Payload::Scalar(value) => value.clone(),
            Payload::Text { text, truncated } => {
                format!("\"{}\"{}", text.escape_debug(), if *truncated { "..." } else { "" })
            }
            Payload::Pointer { address, symbol } => match symbol {
                Some(symbol) => format!("{:#x} <{}>", address, symbol),
                None => format!("{:#x}", address),
            },
            Payload::Image {
                width,
                height,
                bytes_per_pixel,
                bytes,
                generation,
            } => {
                let preview = &bytes[..bytes.len().min(8)];
                format!(
                    "{}x{}x{} gen {} [{}..]",
                    width,
                    height,
                    bytes_per_pixel,
                    generation,
                    hex::encode(preview)
                )
            }
            Payload::Children(count) => format!("{{{} items}}", count),
            Payload::Unavailable => "<unavailable>".to_string(),
            Payload::Unknown(what) => format!("<{}>", what),
        }
    }
}

/// Receiver of visited nodes
pub trait Surface {
    /// A node without children
    fn leaf(&mut self, node: &Node<'_>, payload: Payload<'_>);

    /// A container header; returns whether its children should be shown.
    /// `close` is called once after the children iff this returned true.
    fn open(&mut self, node: &Node<'_>, payload: Payload<'_>) -> bool;

    fn close(&mut self);

    /// Substring filter for the children of the namespace at `path`
    fn filter(&self, _path: &str) -> Option<&str> {
        None
    }
}

/// Highlight intensity in `[0, 1]`: 1 right after a change, fading to 0
pub fn highlight(age: Option<f32>, fade_secs: f32) -> f32 {
    match age {
        Some(age) if fade_secs > 0.0 => (1.0 - age / fade_secs).clamp(0.0, 1.0),
        Some(age) if age <= 0.0 => 1.0,
        _ => 0.0,
    }
}

/// A captured node
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub depth: usize,
    pub path: String,
    pub label: String,
    pub type_name: String,
    pub address: u64,
    pub value: String,
    pub fresh: bool,
    pub age: Option<f32>,
    pub container: bool,
    pub expanded: bool,
}

/// Surface that records rows; used by the REPL and by tests
#[derive(Debug, Default)]
pub struct RecordingSurface {
    rows: Vec<Row>,
    depth: usize,
    /// Explicit expand/collapse choices by path
    expanded: HashMap<String, bool>,
    /// Initial state of every container seen so far
    defaults: HashMap<String, bool>,
    filters: HashMap<String, String>,
    /// Used for namespaces without their own filter
    global_filter: Option<String>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip a container between expanded and collapsed
    pub fn toggle(&mut self, path: &str) -> bool {
        let expanded = !self.is_expanded(path);
        self.expanded.insert(path.to_string(), expanded);
        expanded
    }

    pub fn collapse(&mut self, path: &str) {
        self.expanded.insert(path.to_string(), false);
    }

    pub fn expand(&mut self, path: &str) {
        self.expanded.insert(path.to_string(), true);
    }

    /// Current state of a container; one never seen counts as expanded
    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded
            .get(path)
            .or_else(|| self.defaults.get(path))
            .copied()
            .unwrap_or(true)
    }

    pub fn set_filter(&mut self, path: &str, text: &str) {
        if text.is_empty() {
            self.filters.remove(path);
        } else {
            self.filters.insert(path.to_string(), text.to_string());
        }
    }

    pub fn set_global_filter(&mut self, text: &str) {
        self.global_filter = (!text.is_empty()).then(|| text.to_string());
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Hand over the rows captured so far and start a new frame
    pub fn take_rows(&mut self) -> Vec<Row> {
        self.depth = 0;
        std::mem::take(&mut self.rows)
    }

    pub fn row(&self, path: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.path == path)
    }

    fn push(&mut self, node: &Node<'_>, payload: &Payload<'_>, container: bool, expanded: bool) {
        self.rows.push(Row {
            depth: self.depth,
            path: node.path.to_string(),
            label: node.label.to_string(),
            type_name: node.type_name.to_string(),
            address: node.address,
            value: payload.summary(),
            fresh: node.fresh,
            age: node.age,
            container,
            expanded,
        });
    }
}

impl Surface for RecordingSurface {
    fn leaf(&mut self, node: &Node<'_>, payload: Payload<'_>) {
        self.push(node, &payload, false, false);
    }

    fn open(&mut self, node: &Node<'_>, payload: Payload<'_>) -> bool {
        if !self.defaults.contains_key(node.path) {
            self.defaults.insert(node.path.to_string(), !node.on_demand);
        }
        let expanded = self.is_expanded(node.path);
        self.push(node, &payload, true, expanded);
        if expanded {
            self.depth += 1;
        }
        expanded
    }

    fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn filter(&self, path: &str) -> Option<&str> {
        self.filters
            .get(path)
            .or(self.global_filter.as_ref())
            .map(String::as_str)
    }
}
