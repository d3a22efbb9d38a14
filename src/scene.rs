use crate::defaults;
use crate::material::SharedMaterial;
use crate::model::Geometry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    pub fn from_points(points: impl IntoIterator<Item = [f32; 3]>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Aabb { min: p, max: p },
                Some(aabb) => aabb.union(&Aabb { min: p, max: p }),
            })
        })
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: [0, 1, 2].map(|i| self.min[i].min(other.min[i])),
            max: [0, 1, 2].map(|i| self.max[i].max(other.max[i])),
        }
    }

    pub fn center(&self) -> [f32; 3] {
        [0, 1, 2].map(|i| (self.min[i] + self.max[i]) * 0.5)
    }

    pub fn corners(&self) -> [[f32; 3]; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            [lo[0], lo[1], lo[2]],
            [hi[0], lo[1], lo[2]],
            [hi[0], hi[1], lo[2]],
            [lo[0], hi[1], lo[2]],
            [lo[0], lo[1], hi[2]],
            [hi[0], lo[1], hi[2]],
            [hi[0], hi[1], hi[2]],
            [lo[0], hi[1], hi[2]],
        ]
    }
}

/// Colored line segment vertex used by helpers and bounding boxes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl LineVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Pairs of vertices, one segment each
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineSet {
    pub vertices: Vec<LineVertex>,
}

impl LineSet {
    fn segment(&mut self, a: [f32; 3], b: [f32; 3], color: [f32; 3]) {
        self.vertices.push(LineVertex { position: a, color });
        self.vertices.push(LineVertex { position: b, color });
    }

    /// Square grid on the XZ plane centered at the origin
    pub fn grid(size: f32, divisions: u32) -> Self {
        const CENTER_COLOR: [f32; 3] = [0.027, 0.027, 0.027];
        const LINE_COLOR: [f32; 3] = [0.246, 0.246, 0.246];

        let mut lines = LineSet::default();
        let half = size / 2.0;
        let step = size / divisions as f32;
        for i in 0..=divisions {
            let k = -half + i as f32 * step;
            let color = if i * 2 == divisions {
                CENTER_COLOR
            } else {
                LINE_COLOR
            };
            lines.segment([-half, 0.0, k], [half, 0.0, k], color);
            lines.segment([k, 0.0, -half], [k, 0.0, half], color);
        }
        lines
    }

    /// X, Y, Z axes in red, green, blue
    pub fn axes(length: f32, lift: f32) -> Self {
        let mut lines = LineSet::default();
        let origin = [0.0, lift, 0.0];
        lines.segment(origin, [length, lift, 0.0], [1.0, 0.0, 0.0]);
        lines.segment(origin, [0.0, lift + length, 0.0], [0.0, 1.0, 0.0]);
        lines.segment(origin, [0.0, lift, length], [0.0, 0.0, 1.0]);
        lines
    }

    /// The twelve edges of a box
    pub fn bounding_box(bounds: &Aabb, color: [f32; 3]) -> Self {
        const EDGES: [(usize, usize); 12] = [
            (0, 1),
            (1, 2),
            (2, 3),
            (3, 0),
            (4, 5),
            (5, 6),
            (6, 7),
            (7, 4),
            (0, 4),
            (1, 5),
            (2, 6),
            (3, 7),
        ];
        let corners = bounds.corners();
        let mut lines = LineSet::default();
        for (a, b) in EDGES {
            lines.segment(corners[a], corners[b], color);
        }
        lines
    }
}

/// One drawable part of a mesh, sharing the scene-wide material
#[derive(Debug, Clone)]
pub struct Surface {
    pub name: String,
    pub geometry: Arc<Geometry>,
    pub material: SharedMaterial,
}

#[derive(Debug, Clone)]
pub struct MeshObject {
    pub name: String,
    pub surfaces: Vec<Surface>,
}

/// Box outline drawn around the displayed mesh
#[derive(Debug, Clone)]
pub struct BoundsIndicator {
    pub bounds: Aabb,
    pub lines: LineSet,
}

impl BoundsIndicator {
    pub fn new(bounds: Aabb) -> Self {
        Self {
            bounds,
            lines: LineSet::bounding_box(&bounds, defaults::BOUNDS_COLOR),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SceneNode {
    Mesh(MeshObject),
    BoundsIndicator(BoundsIndicator),
    Lines { name: String, lines: LineSet },
}

impl SceneNode {
    pub fn name(&self) -> &str {
        match self {
            SceneNode::Mesh(mesh) => &mesh.name,
            SceneNode::BoundsIndicator(_) => "bounds",
            SceneNode::Lines { name, .. } => name,
        }
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self, SceneNode::Mesh(_))
    }

    pub fn is_bounds_indicator(&self) -> bool {
        matches!(self, SceneNode::BoundsIndicator(_))
    }
}

/// Stable handle to a node. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// Equirectangular HDR environment, RGBA32F
#[derive(Debug)]
pub struct EnvironmentMap {
    id: u64,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<f32>,
}

static NEXT_ENVIRONMENT_ID: AtomicU64 = AtomicU64::new(1);

impl EnvironmentMap {
    pub fn new(name: impl Into<String>, width: u32, height: u32, pixels: Vec<f32>) -> Self {
        Self {
            id: NEXT_ENVIRONMENT_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            width,
            height,
            pixels,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// The scene graph the render loop reads every frame.
///
/// The environment is a single slot that serves as both background and
/// lighting environment.
#[derive(Debug, Default)]
pub struct SceneGraph {
    next_id: u64,
    nodes: Vec<(NodeId, SceneNode)>,
    environment: Option<Arc<EnvironmentMap>>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scene with the ground grid and axes helpers attached
    pub fn with_helpers() -> Self {
        let mut scene = Self::new();
        scene.add(SceneNode::Lines {
            name: "grid".to_string(),
            lines: LineSet::grid(defaults::GRID_SIZE, defaults::GRID_DIVISIONS),
        });
        scene.add(SceneNode::Lines {
            name: "axes".to_string(),
            lines: LineSet::axes(defaults::AXES_LENGTH, defaults::AXES_LIFT),
        });
        scene
    }

    pub fn add(&mut self, node: SceneNode) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.push((id, node));
        id
    }

    pub fn remove(&mut self, id: NodeId) -> Option<SceneNode> {
        let index = self.nodes.iter().position(|(node_id, _)| *node_id == id)?;
        Some(self.nodes.remove(index).1)
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes
            .iter()
            .find(|(node_id, _)| *node_id == id)
            .map(|(_, node)| node)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn count(&self, pred: impl Fn(&SceneNode) -> bool) -> usize {
        self.nodes.iter().filter(|(_, node)| pred(node)).count()
    }

    /// Install `map` as background and environment, returning the previous map.
    pub fn set_environment(
        &mut self,
        map: Option<Arc<EnvironmentMap>>,
    ) -> Option<Arc<EnvironmentMap>> {
        std::mem::replace(&mut self.environment, map)
    }

    pub fn background(&self) -> Option<&Arc<EnvironmentMap>> {
        self.environment.as_ref()
    }

    pub fn environment(&self) -> Option<&Arc<EnvironmentMap>> {
        self.environment.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_not_reused() {
        let mut scene = SceneGraph::new();
        let a = scene.add(SceneNode::Lines {
            name: "a".into(),
            lines: LineSet::default(),
        });
        assert!(scene.remove(a).is_some());
        let b = scene.add(SceneNode::Lines {
            name: "b".into(),
            lines: LineSet::default(),
        });
        assert_ne!(a, b);
        assert!(!scene.contains(a));
        assert!(scene.remove(a).is_none());
    }

    #[test]
    fn helpers_are_attached() {
        let scene = SceneGraph::with_helpers();
        assert_eq!(scene.len(), 2);
        assert_eq!(scene.count(SceneNode::is_mesh), 0);
        let names: Vec<_> = scene.iter().map(|(_, node)| node.name()).collect();
        assert_eq!(names, ["grid", "axes"]);
    }

    #[test]
    fn grid_has_two_lines_per_division_step() {
        let grid = LineSet::grid(20.0, 20);
        assert_eq!(grid.vertices.len(), 21 * 2 * 2);
        assert_eq!(grid.vertices[0].position, [-10.0, 0.0, -10.0]);
    }

    #[test]
    fn bounding_box_has_twelve_edges() {
        let bounds = Aabb {
            min: [-1.0, 0.0, -1.0],
            max: [1.0, 2.0, 1.0],
        };
        let lines = LineSet::bounding_box(&bounds, [1.0, 1.0, 0.0]);
        assert_eq!(lines.vertices.len(), 24);
        assert_eq!(bounds.center(), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn aabb_from_points() {
        assert!(Aabb::from_points(std::iter::empty()).is_none());
        let aabb = Aabb::from_points([[1.0, -2.0, 3.0], [-1.0, 4.0, 0.0]]).unwrap();
        assert_eq!(aabb.min, [-1.0, -2.0, 0.0]);
        assert_eq!(aabb.max, [1.0, 4.0, 3.0]);
    }

    #[test]
    fn background_and_environment_share_one_map() {
        let mut scene = SceneGraph::new();
        let first = Arc::new(EnvironmentMap::new("a.hdr", 1, 1, vec![0.0; 4]));
        assert!(scene.set_environment(Some(first.clone())).is_none());
        let second = Arc::new(EnvironmentMap::new("b.hdr", 1, 1, vec![1.0; 4]));
        let previous = scene.set_environment(Some(second.clone())).unwrap();
        assert!(Arc::ptr_eq(&previous, &first));
        assert!(Arc::ptr_eq(scene.background().unwrap(), &second));
        assert!(Arc::ptr_eq(scene.environment().unwrap(), &second));
        assert_ne!(first.id(), second.id());
    }
}
