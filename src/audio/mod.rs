pub mod encoder;
pub mod frame;
pub mod mixer;
pub mod playback;
pub mod router;

pub use encoder::{run_encoder, FrameEncoder, TransportArm};
pub use frame::{
    bytes_to_samples, samples_to_bytes, AudioFrame, StreamSource, TRANSPORT_FRAME_BYTES,
    TRANSPORT_FRAME_SAMPLES, TRANSPORT_SAMPLE_RATE,
};
pub use mixer::{MixerConfig, RecordingMixer};
pub use playback::{CollectSink, NullSink, OutputSink, PlaybackQueue, PlaybackRenderer};
pub use router::{AudioRouter, RouterConfig};
