use std::path::PathBuf;

use thiserror::Error;

pub type AudioResult<T> = Result<T, AudioError>;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to open audio file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: symphonia::core::errors::Error,
    },

    #[error("{0} contains no decodable audio track")]
    NoTrack(PathBuf),

    #[error("audio source decoded to zero frames")]
    Empty,

    #[error("no audio output device available")]
    NoDevice,

    #[error("output device has no f32 stream configuration")]
    NoConfig,

    #[error("failed to query output configurations: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    Play(#[from] cpal::PlayStreamError),

    #[error("failed to pause output stream: {0}")]
    Pause(#[from] cpal::PauseStreamError),
}
