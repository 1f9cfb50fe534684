pub mod api;
pub mod audio;
pub mod capture;
pub mod config;
pub mod error;
pub mod http;
pub mod realtime;
pub mod recording;
pub mod session;

pub use audio::{
    AudioFrame, AudioRouter, FrameEncoder, PlaybackQueue, RouterConfig, StreamSource,
    TransportArm, TRANSPORT_FRAME_BYTES, TRANSPORT_SAMPLE_RATE,
};
pub use config::Config;
pub use error::SessionError;
pub use http::{create_router, AppState};
pub use session::{
    InterviewConfig, InterviewSummary, Lifecycle, SessionController, SessionHandle,
    SessionSettings,
};
