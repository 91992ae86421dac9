pub mod artifacts;

pub use artifacts::{ArtifactKind, ArtifactPaths, ArtifactWriter};
