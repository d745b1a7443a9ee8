//! Capability interfaces for the external media providers the pipeline
//! calls: speech synthesis, image generation, stock-video search and
//! asynchronous video generation.
//!
//! Concrete HTTP providers live out of tree; this crate defines the narrow
//! traits the core orchestrates through, the provider error taxonomy with
//! transience classification, and a streaming download helper for result
//! payloads.

pub mod download;
pub mod error;
pub mod traits;

pub use download::download_to_file;
pub use error::{ProviderError, ProviderResult};
pub use traits::{
    best_candidate, ImageGen, JobPoll, ProviderJobId, SpeechSynth, SubmitRequest, VideoCandidate,
    VideoGen, VideoSearch, VoiceParams,
};
