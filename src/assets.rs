//! Character model loading.
//!
//! Import runs on a worker thread; the frame loop polls an [`AssetJoin`]
//! once per frame and picks the result up when it lands.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use glam::Mat4;
use gltf::image::Format;

use crate::anim::AnimClip;
use crate::config::{CLIP_FPS, IDLE_FRAMES, SPAWN_POSITION, WALK_FRAMES};
use crate::error::AssetError;
use crate::mesh::{Mesh, SubMesh, TextureData, Vertex};
use crate::physics::BodyParams;

pub struct CharacterAsset {
    /// Geometry with node transforms baked in, before the actor's scale.
    pub mesh: Mesh,
    pub body: BodyParams,
    pub walk: Option<AnimClip>,
    pub idle: Option<AnimClip>,
}

pub fn load_character(path: &Path) -> Result<CharacterAsset, AssetError> {
    log::info!("Loading character model {}", path.display());
    let (document, buffers, images) = gltf::import(path).map_err(|source| AssetError::Import {
        path: path.to_path_buf(),
        source,
    })?;

    let textures = images.iter().map(|image| TextureData {
        width: image.width,
        height: image.height,
        rgba: convert_image_to_rgba(image),
    });
    let mut mesh = Mesh {
        submeshes: Vec::new(),
        textures: textures.collect(),
    };

    let roots: Vec<gltf::Node> = match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => scene.nodes().collect(),
        None => document.nodes().collect(),
    };
    for node in roots {
        collect_node(&node, Mat4::IDENTITY, &buffers, &mut mesh.submeshes);
    }
    if mesh.is_empty() {
        return Err(AssetError::NoMesh(path.to_path_buf()));
    }

    let duration = document
        .animations()
        .next()
        .map(|animation| animation_duration(&animation, &buffers));
    let (walk, idle) = clips_for_duration(duration);

    log::info!(
        "Loaded {}: {} submeshes, {} textures, {} triangles, animation {:?}s, walk clip {}, idle clip {}",
        path.display(),
        mesh.submeshes.len(),
        mesh.textures.len(),
        mesh.triangle_count(),
        duration,
        walk.is_some(),
        idle.is_some(),
    );

    Ok(CharacterAsset {
        mesh,
        body: BodyParams::new(SPAWN_POSITION),
        walk,
        idle,
    })
}

fn collect_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<SubMesh>,
) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let Some(positions) = reader.read_positions().map(|i| i.collect::<Vec<_>>()) else {
                continue;
            };
            if positions.is_empty() {
                continue;
            }

            let normals: Vec<[f32; 3]> = reader
                .read_normals()
                .map(|i| i.collect())
                .unwrap_or_else(|| vec![[0.0, 1.0, 0.0]; positions.len()]);

            let tex_coords: Vec<[f32; 2]> = reader
                .read_tex_coords(0)
                .map(|i| i.into_f32().collect())
                .unwrap_or_else(|| vec![[0.0, 0.0]; positions.len()]);

            let indices: Vec<u32> = reader
                .read_indices()
                .map(|i| i.into_u32().collect())
                .unwrap_or_else(|| (0..positions.len() as u32).collect());

            let vertices = positions
                .iter()
                .zip(&tex_coords)
                .zip(&normals)
                .map(|((pos, tex), norm)| Vertex {
                    position: *pos,
                    tex_coord: *tex,
                    normal: *norm,
                })
                .collect();

            let texture = primitive
                .material()
                .pbr_metallic_roughness()
                .base_color_texture()
                .map(|t| t.texture().source().index());

            let mut part = Mesh {
                submeshes: vec![SubMesh {
                    vertices,
                    indices,
                    texture,
                }],
                textures: Vec::new(),
            };
            part.transform(world);
            out.append(&mut part.submeshes);
        }
    }

    for child in node.children() {
        collect_node(&child, world, buffers, out);
    }
}

/// Length of an animation: the latest keyframe time across its channels.
fn animation_duration(animation: &gltf::Animation, buffers: &[gltf::buffer::Data]) -> f32 {
    animation
        .channels()
        .filter_map(|channel| {
            let reader = channel.reader(|b| buffers.get(b.index()).map(|data| data.0.as_slice()));
            reader.read_inputs().and_then(|times| times.last())
        })
        .fold(0.0, f32::max)
}

/// Cut the walk and idle sub-clips out of an animation `total` seconds long.
pub fn clips_for_duration(total: Option<f32>) -> (Option<AnimClip>, Option<AnimClip>) {
    let Some(total) = total else {
        return (None, None);
    };
    (
        sub_clip("walk", WALK_FRAMES, total),
        sub_clip("idle", IDLE_FRAMES, total),
    )
}

fn sub_clip(name: &str, frames: (u32, u32), total: f32) -> Option<AnimClip> {
    let mut clip = AnimClip::from_frames(name, frames, CLIP_FPS);
    if clip.start >= total || clip.duration <= 0.0 {
        log::warn!(
            "Clip {name} (frames {}..{}) lies outside the {total:.2}s animation",
            frames.0,
            frames.1
        );
        return None;
    }
    clip.duration = clip.duration.min(total - clip.start);
    Some(clip)
}

fn convert_image_to_rgba(image: &gltf::image::Data) -> Vec<u8> {
    match image.format {
        Format::R8G8B8A8 => image.pixels.clone(),
        Format::R8G8B8 => image
            .pixels
            .chunks(3)
            .flat_map(|c| [c[0], c[1], c[2], 255])
            .collect(),
        Format::R8 => image.pixels.iter().flat_map(|&g| [g, g, g, 255]).collect(),
        Format::R8G8 => image
            .pixels
            .chunks(2)
            .flat_map(|c| [c[0], c[0], c[0], c[1]])
            .collect(),
        _ => {
            log::warn!(
                "Unsupported image format {:?}, using placeholder",
                image.format
            );
            [255, 0, 255, 255].repeat((image.width * image.height) as usize)
        }
    }
}

type LoadResult = Result<CharacterAsset, AssetError>;

/// One-shot handle to a load running on another thread.
pub struct AssetJoin {
    rx: mpsc::Receiver<LoadResult>,
    done: bool,
}

impl AssetJoin {
    pub fn spawn(path: PathBuf) -> Self {
        Self::spawn_with(move || load_character(&path))
    }

    pub fn spawn_with(load: impl FnOnce() -> LoadResult + Send + 'static) -> Self {
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("asset-loader".to_string())
            .spawn(move || {
                // The receiver may be gone if the app shut down first.
                let _ = tx.send(load());
            });
        if let Err(err) = spawned {
            // The closure, and with it the sender, was dropped: poll reports Disconnected.
            log::error!("Failed to spawn asset loader thread: {err}");
        }
        Self { rx, done: false }
    }

    /// Resolved handle, for callers that already hold the result.
    pub fn ready(result: LoadResult) -> Self {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(result);
        Self { rx, done: false }
    }

    /// `Some` exactly once, when the load finishes or the loader dies.
    pub fn poll(&mut self) -> Option<LoadResult> {
        if self.done {
            return None;
        }
        match self.rx.try_recv() {
            Ok(result) => {
                self.done = true;
                Some(result)
            }
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => {
                self.done = true;
                Some(Err(AssetError::Disconnected))
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn wait(join: &mut AssetJoin) -> LoadResult {
        for _ in 0..500 {
            if let Some(result) = join.poll() {
                return result;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("loader never finished");
    }

    #[test]
    fn clips_are_cut_from_animation() {
        let (walk, idle) = clips_for_duration(Some(20.0));
        let walk = walk.expect("walk clip");
        let idle = idle.expect("idle clip");
        assert!((walk.start - 250.0 / 30.0).abs() < 1e-5);
        assert!((walk.duration - 65.0 / 30.0).abs() < 1e-5);
        assert!((idle.start - 0.5).abs() < 1e-5);
        assert!((idle.duration - 100.0 / 30.0).abs() < 1e-5);
    }

    #[test]
    fn short_animation_drops_or_trims_clips() {
        let (walk, idle) = clips_for_duration(Some(3.0));
        assert!(walk.is_none());
        let idle = idle.expect("idle clip");
        assert!((idle.duration - 2.5).abs() < 1e-5);

        assert_eq!(clips_for_duration(None), (None, None));
    }

    #[test]
    fn missing_file_reports_import_error() {
        let mut join = AssetJoin::spawn(PathBuf::from("does/not/exist.gltf"));
        assert!(matches!(wait(&mut join), Err(AssetError::Import { .. })));
        assert!(join.is_done());
        assert!(join.poll().is_none());
    }

    #[test]
    fn dead_loader_reports_disconnected() {
        let mut join = AssetJoin::spawn_with(|| panic!("loader crashed"));
        assert!(matches!(wait(&mut join), Err(AssetError::Disconnected)));
        assert!(join.poll().is_none());
    }

    #[test]
    fn ready_join_resolves_on_first_poll() {
        let mut join = AssetJoin::ready(Err(AssetError::Disconnected));
        assert!(join.poll().is_some());
        assert!(join.poll().is_none());
    }
}
