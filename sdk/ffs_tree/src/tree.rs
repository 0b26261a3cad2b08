//! Destination tree for decoded volumes, files and sections.
//!
//! The decoders only need [`SectionTree::add_child`]; [`FirmwareTree`] is an arena-backed
//! implementation suitable for browsing and extraction.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::{borrow::Cow, format, string::String, vec::Vec};
use core::fmt;

/// Capabilities every filesystem-visible object exposes.
pub trait FirmwareObject {
    /// Display name of the node.
    fn name(&self) -> String;
    /// Bytes returned when the node is read as a file.
    fn data(&self) -> Cow<'_, [u8]>;
    /// Whether the node is directory-like.
    fn is_container(&self) -> bool;
}

/// A tree the decoders register objects into.
///
/// Name collisions among siblings are resolved by the implementation.
pub trait SectionTree {
    /// Handle identifying a node.
    type Handle: Copy;

    /// Add `object` as the last child of `parent` and return the new node's handle.
    fn add_child(&mut self, parent: Self::Handle, object: &dyn FirmwareObject) -> Self::Handle;
}

/// Index of a node in a [`FirmwareTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One node of a [`FirmwareTree`].
#[derive(Clone)]
pub struct Node {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    is_container: bool,
    data: Vec<u8>,
}

impl Node {
    /// Name, unique among its siblings.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent node; `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in registration order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether the node is directory-like.
    pub fn is_container(&self) -> bool {
        self.is_container
    }

    /// Node contents.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("is_container", &self.is_container)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// Arena-backed in-memory tree with a root directory named `/`.
#[derive(Debug, Clone)]
pub struct FirmwareTree {
    nodes: Vec<Node>,
}

impl Default for FirmwareTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FirmwareTree {
    /// Create a tree holding only the root directory.
    pub fn new() -> Self {
        let root = Node { name: String::from("/"), parent: None, children: Vec::new(), is_container: true, data: Vec::new() };
        Self { nodes: alloc::vec![root] }
    }

    /// The root directory.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds nothing but the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Look up a node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Children of `id` in registration order; empty for unknown ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|node| node.children()).unwrap_or(&[])
    }

    /// Names of the children of `id` in registration order.
    pub fn child_names(&self, id: NodeId) -> Vec<&str> {
        self.children(id).iter().filter_map(|child| self.node(*child)).map(|node| node.name()).collect()
    }

    /// Find a direct child of `parent` by name.
    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent).iter().copied().find(|child| self.node(*child).is_some_and(|node| node.name == name))
    }

    /// Resolve a `/`-separated path relative to the root.
    pub fn lookup(&self, path: &str) -> Option<NodeId> {
        path.split('/').filter(|component| !component.is_empty()).try_fold(self.root(), |id, component| self.child(id, component))
    }

    /// Absolute path of `id`.
    pub fn path(&self, id: NodeId) -> String {
        let mut components = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current.and_then(|id| self.node(id)) {
            if node.parent.is_some() {
                components.push(node.name.as_str());
            }
            current = node.parent;
        }
        components.reverse();
        format!("/{}", components.join("/"))
    }

    fn unique_name(&self, parent: NodeId, name: &str) -> String {
        if self.child(parent, name).is_none() {
            return String::from(name);
        }
        (1..)
            .map(|suffix| format!("{} ({})", name, suffix))
            .find(|candidate| self.child(parent, candidate).is_none())
            .unwrap_or_else(|| String::from(name))
    }
}

impl SectionTree for FirmwareTree {
    type Handle = NodeId;

    fn add_child(&mut self, parent: NodeId, object: &dyn FirmwareObject) -> NodeId {
        let name = self.unique_name(parent, &object.name());
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name,
            parent: Some(parent),
            children: Vec::new(),
            is_container: object.is_container(),
            data: object.data().into_owned(),
        });
        if let Some(parent) = self.nodes.get_mut(parent.0) {
            parent.children.push(id);
        }
        id
    }
}
