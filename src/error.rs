use std::path::PathBuf;

use thiserror::Error;

use crate::scene::mesh::Topology;

/// Failures of the collaborators feeding the rasterizer (asset loading, mesh validation).
/// Rendering a frame itself never fails.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode texture {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to parse mesh {path}: {source}")]
    Obj {
        path: PathBuf,
        #[source]
        source: obj::ObjError,
    },

    #[error("index {index} at position {position} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        index: u32,
        position: usize,
        vertex_count: usize,
    },

    #[error("{count} indices do not form a valid {topology:?}")]
    IndexCount { count: usize, topology: Topology },

    #[error("failed to write frame to {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
