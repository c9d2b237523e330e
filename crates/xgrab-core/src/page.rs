//! Explicit page model: an arena tree standing in for the host page's DOM.
//!
//! The engine never owns real page nodes; it works against this tree so the
//! locator, the resolution strategies, and the button controller can be
//! exercised without a browser. Click handlers and the document-level
//! escape handler let tests (or an embedding layer) script the host page's
//! reactions, e.g. a share menu appearing after a click.

use std::collections::HashMap;
use std::rc::Rc;

/// Handle to a node in a [`Page`]. Valid for the lifetime of the page;
/// detached nodes keep their id but disappear from traversals.
pub type NodeId = usize;

type Handler = Rc<dyn Fn(&mut Page)>;

#[derive(Debug, Default)]
struct NodeData {
    tag: String,
    attrs: HashMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    detached: bool,
}

/// Arena-backed page tree with a fixed root ("body").
pub struct Page {
    nodes: Vec<NodeData>,
    click_handlers: HashMap<NodeId, Handler>,
    escape_handlers: Vec<Handler>,
    reload_requested: bool,
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Page {
    pub fn new() -> Self {
        let root = NodeData {
            tag: "body".to_string(),
            ..NodeData::default()
        };
        Self {
            nodes: vec![root],
            click_handlers: HashMap::new(),
            escape_handlers: Vec::new(),
            reload_requested: false,
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    /// Appends a new child under `parent` and returns its id.
    pub fn append(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(NodeData {
            tag: tag.to_string(),
            parent: Some(parent),
            ..NodeData::default()
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn tag(&self, id: NodeId) -> &str {
        &self.nodes[id].tag
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes[id].attrs.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.nodes[id].attrs.contains_key(name)
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        self.nodes[id]
            .attrs
            .insert(name.to_string(), value.to_string());
    }

    pub fn attr_names(&self, id: NodeId) -> impl Iterator<Item = &str> {
        self.nodes[id].attrs.keys().map(String::as_str)
    }

    pub fn text(&self, id: NodeId) -> &str {
        &self.nodes[id].text
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) {
        self.nodes[id].text = text.to_string();
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// Detaches `id` (and with it its whole subtree) from the page.
    /// Detaching the root is a no-op.
    pub fn remove(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id].parent else {
            return;
        };
        self.nodes[parent].children.retain(|&c| c != id);
        self.nodes[id].parent = None;
        self.nodes[id].detached = true;
    }

    /// True while the node is reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cur = id;
        loop {
            if self.nodes[cur].detached {
                return false;
            }
            match self.nodes[cur].parent {
                Some(p) => cur = p,
                None => return cur == self.root(),
            }
        }
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&n| self.parent(n))
    }

    /// Pre-order descendants of `scope`, excluding `scope` itself.
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[scope].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id].children.iter().rev());
        }
        out
    }

    /// First descendant of `scope` matching `pred`, in document order.
    pub fn find<F>(&self, scope: NodeId, pred: F) -> Option<NodeId>
    where
        F: Fn(&Page, NodeId) -> bool,
    {
        self.descendants(scope).into_iter().find(|&n| pred(self, n))
    }

    /// All descendants of `scope` matching `pred`, in document order.
    pub fn find_all<F>(&self, scope: NodeId, pred: F) -> Vec<NodeId>
    where
        F: Fn(&Page, NodeId) -> bool,
    {
        self.descendants(scope)
            .into_iter()
            .filter(|&n| pred(self, n))
            .collect()
    }

    /// Registers what the host page does when `id` is clicked.
    pub fn on_click<F>(&mut self, id: NodeId, handler: F)
    where
        F: Fn(&mut Page) + 'static,
    {
        self.click_handlers.insert(id, Rc::new(handler));
    }

    /// Simulates a click on `id`, running the registered handler if any.
    pub fn click(&mut self, id: NodeId) {
        if let Some(handler) = self.click_handlers.get(&id).cloned() {
            handler(self);
        }
    }

    /// Registers a document-level reaction to the Escape key.
    pub fn on_escape<F>(&mut self, handler: F)
    where
        F: Fn(&mut Page) + 'static,
    {
        self.escape_handlers.push(Rc::new(handler));
    }

    /// Dispatches Escape to all registered document-level handlers.
    pub fn press_escape(&mut self) {
        for handler in self.escape_handlers.clone() {
            handler(self);
        }
    }

    /// Last-resort cleanup signal: the embedding layer should reload the
    /// host page at the next safe point.
    pub fn request_reload(&mut self) {
        self.reload_requested = true;
    }

    pub fn reload_requested(&self) -> bool {
        self.reload_requested
    }
}
