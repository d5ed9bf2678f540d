#![forbid(unsafe_code)]

//! Host element tree.
//!
//! The drag-and-drop core never inspects widget internals. It only needs to
//! answer "which registered element is the nearest ancestor of the node under
//! the pointer". [`Document`] is the minimal arena tree that makes this
//! possible: element and text nodes, parent links, and per-node [`Markers`].
//!
//! Hosts mirror their widget tree into a `Document` (or keep one as their
//! retained tree) and report the node under the pointer as the `target` of
//! each [`NativeEvent`](crate::native::NativeEvent).
//!
//! # Markers
//!
//! Markers are the only persisted wire format of the subsystem:
//! - [`Markers::DRAGGABLE`] flags drag sources.
//! - One drop-target marker per [`OriginKind`] flags registered drop targets,
//!   so a hit-test can walk ancestors without consulting any registry.
//!
//! # Invariants
//!
//! 1. Node ids are never reused within one document.
//! 2. The root is always an element and never detached.
//! 3. Parent links are acyclic.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use crate::cleanup::Cleanup;
use crate::error::{DndError, Result};
use crate::types::OriginKind;

/// Stable handle for a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Build a node id from its raw index.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw index of this node.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags! {
    /// Markers written onto elements to make ancestor-walking possible.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Markers: u8 {
        /// The element is a drag source.
        const DRAGGABLE                 = 0b0001;
        /// Drop target for in-page element drags.
        const DROP_TARGET_ELEMENT       = 0b0010;
        /// Drop target for external (platform) content.
        const DROP_TARGET_EXTERNAL      = 0b0100;
        /// Drop target for text-selection drags.
        const DROP_TARGET_TEXT_SELECTION = 0b1000;
    }
}

impl Markers {
    /// Drop-target marker for an origin kind.
    #[must_use]
    pub const fn drop_target(kind: OriginKind) -> Self {
        match kind {
            OriginKind::Element => Self::DROP_TARGET_ELEMENT,
            OriginKind::External => Self::DROP_TARGET_EXTERNAL,
            OriginKind::TextSelection => Self::DROP_TARGET_TEXT_SELECTION,
        }
    }
}

/// Node flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// An element; can carry markers and children.
    Element,
    /// A text node; hit-tests starting here begin at the parent element.
    Text,
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    markers: Markers,
}

/// Arena-backed element tree.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

/// A document shared between registrations and the lifecycle.
pub type SharedDocument = Rc<RefCell<Document>>;

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document containing only its root element.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Element,
                parent: None,
                children: Vec::new(),
                markers: Markers::empty(),
            }],
        }
    }

    /// Wrap a new document for sharing.
    #[must_use]
    pub fn shared() -> SharedDocument {
        Rc::new(RefCell::new(Self::new()))
    }

    /// The root element.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes ever created (attached or not).
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root exists from construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0 as usize)
            .ok_or(DndError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0 as usize)
            .ok_or(DndError::UnknownNode(id))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
            markers: Markers::empty(),
        });
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self) -> NodeId {
        self.push(NodeKind::Element)
    }

    /// Create a detached text node.
    pub fn create_text(&mut self) -> NodeId {
        self.push(NodeKind::Text)
    }

    /// Append `child` as the last child of `parent`, detaching it first if needed.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.node(parent)?.kind != NodeKind::Element {
            return Err(DndError::NotAnElement(parent));
        }
        self.node(child)?;
        if child == self.root() {
            return Err(DndError::RootImmutable);
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DndError::CycleDetected { parent, child });
        }
        self.detach(child)?;
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Create an element and append it under `parent`.
    pub fn append_element(&mut self, parent: NodeId) -> Result<NodeId> {
        let child = self.create_element();
        self.append_child(parent, child)?;
        Ok(child)
    }

    /// Create a text node and append it under `parent`.
    pub fn append_text(&mut self, parent: NodeId) -> Result<NodeId> {
        let child = self.create_text();
        self.append_child(parent, child)?;
        Ok(child)
    }

    /// Remove a node (and its subtree) from its parent.
    ///
    /// The subtree keeps its internal links and markers, like a DOM node that
    /// was removed but is still referenced.
    pub fn detach(&mut self, node: NodeId) -> Result<()> {
        if node == self.root() {
            return Err(DndError::RootImmutable);
        }
        let Some(parent) = self.node(node)?.parent else {
            return Ok(());
        };
        self.node_mut(parent)?.children.retain(|c| *c != node);
        self.node_mut(node)?.parent = None;
        Ok(())
    }

    /// Parent of a node, if attached.
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).ok().and_then(|n| n.parent)
    }

    /// Children of a node in insertion order.
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Whether the node exists and is an element.
    #[must_use]
    pub fn is_element(&self, node: NodeId) -> bool {
        self.node(node).is_ok_and(|n| n.kind == NodeKind::Element)
    }

    /// Whether the node is reachable from the root.
    #[must_use]
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.node(node).is_ok() && self.is_inclusive_ancestor(self.root(), node)
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    #[must_use]
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Nearest element at or above `node`.
    ///
    /// Text nodes resolve to their parent element.
    #[must_use]
    pub fn nearest_element(&self, node: NodeId) -> Option<NodeId> {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if self.is_element(current) {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    /// Nearest inclusive ancestor carrying all of `marker`.
    #[must_use]
    pub fn closest(&self, node: NodeId, marker: Markers) -> Option<NodeId> {
        let mut cursor = self.nearest_element(node);
        while let Some(current) = cursor {
            if self.has_marker(current, marker) {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    /// Every inclusive ancestor of `node` carrying `marker`, innermost first.
    ///
    /// This is the explicit chain the drop-target walk iterates over.
    #[must_use]
    pub fn marked_ancestors(&self, node: NodeId, marker: Markers) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut cursor = self.nearest_element(node);
        while let Some(current) = cursor {
            if self.has_marker(current, marker) {
                chain.push(current);
            }
            cursor = self.parent(current);
        }
        chain
    }

    /// Markers currently set on a node (empty for unknown nodes).
    #[must_use]
    pub fn markers(&self, node: NodeId) -> Markers {
        self.node(node).map(|n| n.markers).unwrap_or_default()
    }

    /// Whether `node` carries all of `marker`.
    #[must_use]
    pub fn has_marker(&self, node: NodeId, marker: Markers) -> bool {
        !marker.is_empty() && self.markers(node).contains(marker)
    }

    /// Set markers on an element.
    pub fn set_marker(&mut self, node: NodeId, marker: Markers) -> Result<()> {
        if !self.is_element(node) {
            self.node(node)?;
            return Err(DndError::NotAnElement(node));
        }
        self.node_mut(node)?.markers.insert(marker);
        Ok(())
    }

    /// Clear markers from a node. Unknown nodes are ignored.
    pub fn remove_marker(&mut self, node: NodeId, marker: Markers) {
        if let Ok(n) = self.node_mut(node) {
            n.markers.remove(marker);
        }
    }
}

/// Flag `element` as a drag source.
///
/// The returned cleanup removes the marker again.
pub fn mark_draggable(document: &SharedDocument, element: NodeId) -> Result<Cleanup> {
    document
        .borrow_mut()
        .set_marker(element, Markers::DRAGGABLE)?;
    let document = Rc::downgrade(document);
    Ok(Cleanup::new(move || {
        if let Some(document) = document.upgrade() {
            document
                .borrow_mut()
                .remove_marker(element, Markers::DRAGGABLE);
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let outer = doc.append_element(doc.root()).unwrap();
        let inner = doc.append_element(outer).unwrap();
        let text = doc.append_text(inner).unwrap();
        (doc, outer, inner, text)
    }

    #[test]
    fn text_nodes_resolve_to_parent_element() {
        let (doc, _, inner, text) = nested();
        assert!(!doc.is_element(text));
        assert_eq!(doc.nearest_element(text), Some(inner));
    }

    #[test]
    fn marked_ancestors_are_innermost_first() {
        let (mut doc, outer, inner, text) = nested();
        let marker = Markers::drop_target(OriginKind::Element);
        doc.set_marker(outer, marker).unwrap();
        doc.set_marker(inner, marker).unwrap();

        assert_eq!(doc.marked_ancestors(text, marker), vec![inner, outer]);
        assert_eq!(doc.closest(text, marker), Some(inner));
    }

    #[test]
    fn markers_are_per_kind() {
        let (mut doc, outer, _, text) = nested();
        doc.set_marker(outer, Markers::drop_target(OriginKind::External))
            .unwrap();
        assert!(
            doc.closest(text, Markers::drop_target(OriginKind::Element))
                .is_none()
        );
        assert_eq!(
            doc.closest(text, Markers::drop_target(OriginKind::External)),
            Some(outer)
        );
    }

    #[test]
    fn text_nodes_cannot_be_marked() {
        let (mut doc, _, _, text) = nested();
        assert_eq!(
            doc.set_marker(text, Markers::DRAGGABLE),
            Err(DndError::NotAnElement(text))
        );
    }

    #[test]
    fn detach_disconnects_subtree() {
        let (mut doc, outer, inner, text) = nested();
        doc.detach(inner).unwrap();
        assert!(doc.is_connected(outer));
        assert!(!doc.is_connected(text));
        assert_eq!(doc.nearest_element(text), Some(inner));
        assert!(doc.children(outer).is_empty());
    }

    #[test]
    fn append_rejects_cycles_and_root_moves() {
        let (mut doc, outer, inner, _) = nested();
        assert_eq!(
            doc.append_child(inner, outer),
            Err(DndError::CycleDetected {
                parent: inner,
                child: outer
            })
        );
        let root = doc.root();
        assert_eq!(doc.append_child(outer, root), Err(DndError::RootImmutable));
        assert_eq!(doc.detach(root), Err(DndError::RootImmutable));
    }

    #[test]
    fn append_reparents() {
        let (mut doc, outer, inner, _) = nested();
        let other = doc.append_element(doc.root()).unwrap();
        doc.append_child(other, inner).unwrap();
        assert_eq!(doc.parent(inner), Some(other));
        assert!(doc.children(outer).is_empty());
    }

    #[test]
    fn unknown_nodes_are_errors() {
        let mut doc = Document::new();
        let ghost = NodeId::from_raw(99);
        assert_eq!(
            doc.append_child(doc.root(), ghost),
            Err(DndError::UnknownNode(ghost))
        );
        assert_eq!(doc.markers(ghost), Markers::empty());
    }

    #[test]
    fn mark_draggable_round_trip() {
        let doc = Document::shared();
        let el = doc.borrow_mut().append_element(NodeId::from_raw(0)).unwrap();
        let cleanup = mark_draggable(&doc, el).unwrap();
        assert!(doc.borrow().has_marker(el, Markers::DRAGGABLE));
        cleanup.run();
        assert!(!doc.borrow().has_marker(el, Markers::DRAGGABLE));
    }
}
