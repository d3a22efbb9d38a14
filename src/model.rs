use crate::error::LoadError;
use crate::scene::Aabb;
use cgmath::{InnerSpace, Vector3};
use std::collections::HashSet;
use std::io::{BufReader, Cursor};
use std::ops::Range;
use std::sync::Arc;
use wgpu::util::DeviceExt;

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use wgpu::{
            BufferAddress, VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode,
        };
        VertexBufferLayout {
            array_stride: std::mem::size_of::<ModelVertex>() as BufferAddress,
            step_mode: VertexStepMode::Vertex,
            attributes: &[
                VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: VertexFormat::Float32x3,
                },
                VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as BufferAddress,
                    shader_location: 1,
                    format: VertexFormat::Float32x2,
                },
                VertexAttribute {
                    offset: std::mem::size_of::<[f32; 5]>() as BufferAddress,
                    shader_location: 2,
                    format: VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Triangle geometry of one sub-part of a mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices.iter().map(|v| v.position))
    }

    /// Unique triangle edges as a line list, for wireframe drawing
    pub fn edge_indices(&self) -> Vec<u32> {
        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for tri in self.indices.chunks_exact(3) {
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                if seen.insert((a.min(b), a.max(b))) {
                    edges.extend_from_slice(&[a, b]);
                }
            }
        }
        edges
    }
}

/// One named part of a decoded mesh
#[derive(Debug, Clone)]
pub struct MeshPart {
    pub name: String,
    pub geometry: Arc<Geometry>,
}

/// A fully decoded mesh, not yet attached to any scene
#[derive(Debug, Clone)]
pub struct DecodedMesh {
    pub name: String,
    pub parts: Vec<MeshPart>,
    pub bounds: Aabb,
}

/// Parse OBJ text into triangle geometry.
///
/// Material libraries are not fetched: the viewer replaces every material
/// with the shared one anyway.
pub async fn parse_obj(name: &str, bytes: &[u8]) -> Result<DecodedMesh, LoadError> {
    let mut obj_reader = BufReader::new(Cursor::new(bytes));

    let (models, _obj_materials) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |_path| async move { Ok(Default::default()) },
    )
    .await
    .map_err(|source| LoadError::DecodeMesh {
        name: name.to_string(),
        source,
    })?;

    let parts = models
        .into_iter()
        .filter(|model| !model.mesh.indices.is_empty())
        .map(|model| {
            let mesh = model.mesh;
            let mut vertices = (0..mesh.positions.len() / 3)
                .map(|i| {
                    let normal = if mesh.normals.len() >= (i + 1) * 3 {
                        [
                            mesh.normals[i * 3],
                            mesh.normals[i * 3 + 1],
                            mesh.normals[i * 3 + 2],
                        ]
                    } else {
                        [0.0, 0.0, 0.0]
                    };
                    let tex_coords = if mesh.texcoords.len() >= (i + 1) * 2 {
                        [mesh.texcoords[i * 2], 1.0 - mesh.texcoords[i * 2 + 1]]
                    } else {
                        [0.0, 0.0]
                    };
                    ModelVertex {
                        position: [
                            mesh.positions[i * 3],
                            mesh.positions[i * 3 + 1],
                            mesh.positions[i * 3 + 2],
                        ],
                        tex_coords,
                        normal,
                    }
                })
                .collect::<Vec<_>>();

            if mesh.normals.is_empty() {
                compute_normals(&mut vertices, &mesh.indices);
            }

            MeshPart {
                name: model.name,
                geometry: Arc::new(Geometry {
                    vertices,
                    indices: mesh.indices,
                }),
            }
        })
        .collect::<Vec<_>>();

    let bounds = parts
        .iter()
        .filter_map(|part| part.geometry.bounds())
        .reduce(|a, b| a.union(&b))
        .ok_or_else(|| LoadError::EmptyMesh {
            name: name.to_string(),
        })?;

    Ok(DecodedMesh {
        name: name.to_string(),
        parts,
        bounds,
    })
}

/// Area-weighted smooth normals for meshes that ship without them
fn compute_normals(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut sums = vec![Vector3::new(0.0f32, 0.0, 0.0); vertices.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
            continue;
        }
        let pa = Vector3::from(vertices[a].position);
        let pb = Vector3::from(vertices[b].position);
        let pc = Vector3::from(vertices[c].position);
        let face = (pb - pa).cross(pc - pa);
        for i in [a, b, c] {
            sums[i] += face;
        }
    }
    for (vertex, sum) in vertices.iter_mut().zip(sums) {
        if sum.magnitude2() > 0.0 {
            vertex.normal = sum.normalize().into();
        }
    }
}

/// GPU buffers for one surface of the displayed mesh
pub struct GpuSurface {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
    pub edge_buffer: wgpu::Buffer,
    pub num_edges: u32,
}

impl GpuSurface {
    pub fn new(device: &wgpu::Device, name: &str, geometry: &Geometry) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", name)),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", name)),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let edges = geometry.edge_indices();
        let edge_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Edge Buffer", name)),
            contents: bytemuck::cast_slice(&edges),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            num_elements: geometry.indices.len() as u32,
            edge_buffer,
            num_edges: edges.len() as u32,
        }
    }

    pub fn destroy(&self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
        self.edge_buffer.destroy();
    }
}

pub trait DrawModel<'a> {
    fn draw_surface(
        &mut self,
        surface: &'a GpuSurface,
        wireframe: bool,
        instances: Range<u32>,
    );
}

impl<'a, 'b> DrawModel<'b> for wgpu::RenderPass<'a>
where
    'b: 'a,
{
    fn draw_surface(&mut self, surface: &'b GpuSurface, wireframe: bool, instances: Range<u32>) {
        self.set_vertex_buffer(0, surface.vertex_buffer.slice(..));
        if wireframe {
            self.set_index_buffer(surface.edge_buffer.slice(..), wgpu::IndexFormat::Uint32);
            self.draw_indexed(0..surface.num_edges, 0, instances);
        } else {
            self.set_index_buffer(surface.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            self.draw_indexed(0..surface.num_elements, 0, instances);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_PARTS: &str = "\
o left
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
o right
v 2 0 0
v 3 0 0
v 2 2 1
f 4 5 6
";

    #[test]
    fn parses_every_object_as_a_part() {
        let mesh = pollster::block_on(parse_obj("two.obj", TWO_PARTS.as_bytes())).unwrap();
        assert_eq!(mesh.parts.len(), 2);
        assert_eq!(mesh.parts[0].name, "left");
        assert_eq!(mesh.parts[1].name, "right");
        assert_eq!(mesh.parts[1].geometry.indices.len(), 3);
        assert_eq!(mesh.bounds.min, [0.0, 0.0, 0.0]);
        assert_eq!(mesh.bounds.max, [3.0, 2.0, 1.0]);
    }

    #[test]
    fn missing_normals_are_generated() {
        let mesh = pollster::block_on(parse_obj("two.obj", TWO_PARTS.as_bytes())).unwrap();
        for vertex in &mesh.parts[0].geometry.vertices {
            assert_eq!(vertex.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn text_without_faces_is_empty() {
        let err =
            pollster::block_on(parse_obj("junk.obj", b"this is not an obj file")).unwrap_err();
        assert!(matches!(
            err,
            LoadError::EmptyMesh { .. } | LoadError::DecodeMesh { .. }
        ));
    }

    #[test]
    fn non_utf8_input_fails_to_decode() {
        let err = pollster::block_on(parse_obj("blob.obj", &[0xff, 0xfe, 0x00, 0x80])).unwrap_err();
        assert!(matches!(err, LoadError::DecodeMesh { .. }));
    }

    #[test]
    fn quad_edges_are_shared() {
        let geometry = Geometry {
            vertices: vec![
                ModelVertex {
                    position: [0.0; 3],
                    tex_coords: [0.0; 2],
                    normal: [0.0; 3],
                };
                4
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
        };
        // 5 unique edges, the diagonal is shared
        assert_eq!(geometry.edge_indices().len(), 10);
    }
}
