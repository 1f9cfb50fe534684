//! Archival recording: chunk container, media muxing, and the coordinator
//! that assembles and uploads the final artifact.

pub mod artifact;
pub mod coordinator;
pub mod mux;

pub use artifact::{
    FinalRecording, MediaChunk, MediaKind, RecordingArtifact, RECORDING_CONTENT_TYPE,
};
pub use coordinator::RecordingCoordinator;
pub use mux::{ChunkMuxer, MediaRecorder, MuxConfig, MuxRecorder};
