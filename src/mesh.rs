use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};

/// Unified vertex type for all meshes
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub tex_coord: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex {
    pub const ATTRIBS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x2,
        2 => Float32x3
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Texture data (RGBA pixels)
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureData {
    /// Two-tone checkerboard, `cells` squares per side.
    pub fn checker(size: u32, cells: u32, light: [u8; 4], dark: [u8; 4]) -> Self {
        let cell = (size / cells.max(1)).max(1);
        let rgba = (0..size)
            .flat_map(|y| (0..size).map(move |x| ((x / cell) + (y / cell)) % 2 == 0))
            .flat_map(|even| if even { light } else { dark })
            .collect();
        Self {
            width: size,
            height: size,
            rgba,
        }
    }
}

/// A submesh with an optional index into the owning mesh's textures
#[derive(Debug, Clone)]
pub struct SubMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub texture: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// A loaded mesh with multiple submeshes and textures
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub submeshes: Vec<SubMesh>,
    pub textures: Vec<TextureData>,
}

impl Mesh {
    pub fn is_empty(&self) -> bool {
        self.submeshes
            .iter()
            .all(|s| s.vertices.is_empty() || s.indices.is_empty())
    }

    pub fn triangle_count(&self) -> usize {
        self.submeshes.iter().map(|s| s.indices.len() / 3).sum()
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let mut positions = self
            .submeshes
            .iter()
            .flat_map(|s| &s.vertices)
            .map(|v| Vec3::from(v.position));
        let first = positions.next()?;
        let (min, max) = positions.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(BoundingBox { min, max })
    }

    /// Bake `transform` into every vertex. Normals use the inverse transpose.
    pub fn transform(&mut self, transform: Mat4) {
        let normal_matrix = Mat3::from_mat4(transform).inverse().transpose();
        for vertex in self.submeshes.iter_mut().flat_map(|s| s.vertices.iter_mut()) {
            vertex.position = transform.transform_point3(vertex.position.into()).into();
            vertex.normal = (normal_matrix * Vec3::from(vertex.normal))
                .normalize_or_zero()
                .into();
        }
    }

    /// Flat square on the XZ plane centred at the origin, facing +Y, textured
    /// with a repeating checker every `tile` units.
    pub fn ground(extent: f32, tile: f32) -> Self {
        let h = extent * 0.5;
        let repeat = extent / tile.max(f32::EPSILON);
        let corners = [
            ([-h, 0.0, -h], [0.0, 0.0]),
            ([-h, 0.0, h], [0.0, repeat]),
            ([h, 0.0, h], [repeat, repeat]),
            ([h, 0.0, -h], [repeat, 0.0]),
        ];
        let vertices = corners
            .iter()
            .map(|&(position, tex_coord)| Vertex {
                position,
                tex_coord,
                normal: [0.0, 1.0, 0.0],
            })
            .collect();

        Self {
            submeshes: vec![SubMesh {
                vertices,
                indices: vec![0, 1, 2, 0, 2, 3],
                texture: Some(0),
            }],
            textures: vec![TextureData::checker(
                64,
                2,
                [0x6b, 0x8e, 0x4e, 255],
                [0x5d, 0x7d, 0x43, 255],
            )],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_faces_up_and_spans_extent() {
        let ground = Mesh::ground(100.0, 10.0);
        let bounds = ground.bounding_box().expect("ground has vertices");
        assert_eq!(bounds.min, Vec3::new(-50.0, 0.0, -50.0));
        assert_eq!(bounds.max, Vec3::new(50.0, 0.0, 50.0));
        assert_eq!(ground.triangle_count(), 2);

        let [a, b, c] = [0, 1, 2].map(|i| Vec3::from(ground.submeshes[0].vertices[i].position));
        assert!((b - a).cross(c - a).y > 0.0);
    }

    #[test]
    fn transform_moves_positions_and_keeps_unit_normals() {
        let mut mesh = Mesh::ground(2.0, 1.0);
        mesh.transform(Mat4::from_translation(Vec3::Y) * Mat4::from_scale(Vec3::new(3.0, 1.0, 1.0)));
        let bounds = mesh.bounding_box().expect("vertices");
        assert_eq!(bounds.min, Vec3::new(-3.0, 1.0, -1.0));
        for v in &mesh.submeshes[0].vertices {
            assert!((Vec3::from(v.normal) - Vec3::Y).length() < 1e-6);
        }
    }

    #[test]
    fn checker_alternates_cells() {
        let tex = TextureData::checker(4, 2, [255; 4], [0, 0, 0, 255]);
        assert_eq!(tex.rgba.len(), 4 * 4 * 4);
        assert_eq!(&tex.rgba[0..4], &[255; 4]);
        assert_eq!(&tex.rgba[8..12], &[0, 0, 0, 255]);
    }

    #[test]
    fn empty_mesh_has_no_bounds() {
        assert!(Mesh::default().bounding_box().is_none());
        assert!(Mesh::default().is_empty());
    }
}
