use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to import {}: {source}", path.display())]
    Import {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },
    #[error("{} contains no drawable mesh primitives", .0.display())]
    NoMesh(PathBuf),
    #[error("asset loader stopped before delivering a result")]
    Disconnected,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible graphics adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}
