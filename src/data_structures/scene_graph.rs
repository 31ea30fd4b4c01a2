//! Scene graph and hierarchical scene organization.
//!
//! A [`Scene`] is the root of a tree of [`Node`]s. Every node owns its children
//! and optionally a [`Mesh`] (geometry plus material). Transforms are local to
//! the parent; walking the tree is always pre-order, parents before children.

use std::{
    cell::RefCell,
    rc::Rc,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use cgmath::{Matrix4, SquareMatrix};

use crate::{
    data_structures::{geometry::Geometry, transform::Transform},
    ibl::EnvironmentMap,
    material::Material,
};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a node, stable for the node's lifetime. GPU resources are keyed by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone, Debug)]
pub struct Mesh {
    pub geometry: Geometry,
    pub material: Material,
}

/// What a node carries besides its transform and children.
#[derive(Debug)]
pub enum NodeKind {
    Mesh(Mesh),
    Group,
}

#[derive(Debug)]
pub struct Node {
    id: NodeId,
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    children: Vec<Node>,
}

impl Node {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            id: NodeId::next(),
            name: name.into(),
            transform: Transform::new(),
            kind: NodeKind::Group,
            children: Vec::new(),
        }
    }

    pub fn mesh(name: impl Into<String>, geometry: Geometry, material: Material) -> Self {
        Self {
            kind: NodeKind::Mesh(Mesh { geometry, material }),
            ..Self::group(name)
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    /// Detaches and returns all direct children.
    pub fn take_children(&mut self) -> Vec<Node> {
        std::mem::take(&mut self.children)
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            NodeKind::Group => None,
        }
    }

    pub fn as_mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            NodeKind::Group => None,
        }
    }

    /// Pre-order iterator over this node and all its descendants.
    pub fn traverse(&self) -> Traverse<'_> {
        Traverse { stack: vec![self] }
    }

    /// Pre-order mutable visit of this node and all its descendants.
    pub fn traverse_mut(&mut self, visit: &mut dyn FnMut(&mut Node)) {
        visit(self);
        for child in &mut self.children {
            child.traverse_mut(visit);
        }
    }

    /// Visits every node with its world matrix, parents before children.
    pub fn visit_world(&self, parent: &Matrix4<f32>, visit: &mut dyn FnMut(&Node, &Matrix4<f32>)) {
        let world = parent * self.transform.to_matrix();
        visit(self, &world);
        for child in &self.children {
            child.visit_world(&world, visit);
        }
    }

    pub fn find(&self, id: NodeId) -> Option<&Node> {
        self.traverse().find(|node| node.id == id)
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(id))
    }
}

pub struct Traverse<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Traverse<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // reversed so the first child is visited first
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// The result of decoding a model file: a root group holding the file's nodes.
#[derive(Debug)]
pub struct SceneFragment {
    pub root: Node,
}

impl SceneFragment {
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    pub fn mesh_count(&self) -> usize {
        self.root.traverse().filter(|node| node.as_mesh().is_some()).count()
    }
}

#[derive(Debug, Default)]
pub struct Scene {
    pub background: Option<Arc<EnvironmentMap>>,
    pub environment: Option<Arc<EnvironmentMap>>,
    children: Vec<Node>,
}

/// The scene as shared between the render loop and control bindings.
pub type SharedScene = Rc<RefCell<Scene>>;

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedScene {
        Rc::new(RefCell::new(self))
    }

    pub fn add(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.children.push(node);
        id
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Pre-order walk over every node in the scene.
    pub fn traverse(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().flat_map(|child| child.traverse())
    }

    pub fn visit_world(&self, visit: &mut dyn FnMut(&Node, &Matrix4<f32>)) {
        let root = Matrix4::identity();
        for child in &self.children {
            child.visit_world(&root, visit);
        }
    }

    pub fn find(&self, id: NodeId) -> Option<&Node> {
        self.children.iter().find_map(|child| child.find(id))
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.children.iter_mut().find_map(|child| child.find_mut(id))
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Point3, Quaternion, Rotation3, Transform as _, Vector3};

    use super::*;

    fn tree() -> Node {
        let mut root = Node::group("root");
        let mut a = Node::group("a");
        a.add_child(Node::group("a1"));
        a.add_child(Node::group("a2"));
        root.add_child(a);
        root.add_child(Node::group("b"));
        root
    }

    #[test]
    fn traversal_is_pre_order() {
        let root = tree();
        let names: Vec<_> = root.traverse().map(|node| node.name.as_str()).collect();
        assert_eq!(names, ["root", "a", "a1", "a2", "b"]);
    }

    #[test]
    fn traverse_mut_matches_traverse_order() {
        let mut root = tree();
        let mut names = Vec::new();
        root.traverse_mut(&mut |node| names.push(node.name.clone()));
        assert_eq!(names, ["root", "a", "a1", "a2", "b"]);
    }

    #[test]
    fn world_transforms_compose_down_the_tree() {
        let mut parent =
            Node::group("parent").with_transform(Transform::from_position(Vector3::new(0.0, 2.0, 0.0)));
        let child = Node::group("child").with_transform(Transform::from_position(Vector3::new(1.0, 0.0, 0.0)));
        let child_id = child.id();
        parent.add_child(child);
        let mut scene = Scene::new();
        scene.add(parent);

        let mut found = None;
        scene.visit_world(&mut |node, world| {
            if node.id() == child_id {
                found = Some(world.w.truncate());
            }
        });
        assert_eq!(found, Some(Vector3::new(1.0, 2.0, 0.0)));
    }

    #[test]
    fn rotated_child_under_stretched_parent_stays_in_parent_space() {
        let mut parent = Node::group("parent").with_transform(Transform {
            scale: Vector3::new(2.0, 1.0, 1.0),
            ..Transform::new()
        });
        let child = Node::group("child").with_transform(Transform {
            rotation: Quaternion::from_angle_z(Deg(90.0)),
            ..Transform::new()
        });
        let child_id = child.id();
        parent.add_child(child);
        let mut scene = Scene::new();
        scene.add(parent);

        let mut found = None;
        scene.visit_world(&mut |node, world| {
            if node.id() == child_id {
                found = Some(world.transform_point(Point3::new(1.0, 0.0, 0.0)));
            }
        });
        // the child's x axis turns onto the parent's y axis, which is not stretched
        let point = found.expect("child visited");
        assert!(point.x.abs() < 1e-5);
        assert!((point.y - 1.0).abs() < 1e-5);
        assert!(point.z.abs() < 1e-5);
    }

    #[test]
    fn find_mut_reaches_nested_nodes() {
        let mut scene = Scene::new();
        let root = tree();
        let nested = root.children()[0].children()[1].id();
        scene.add(root);
        scene.find_mut(nested).unwrap().transform.position.y = 3.0;
        assert_eq!(scene.find(nested).unwrap().transform.position.y, 3.0);
    }

    #[test]
    fn node_ids_are_unique() {
        let a = Node::group("a");
        let b = Node::group("a");
        assert_ne!(a.id(), b.id());
    }
}
