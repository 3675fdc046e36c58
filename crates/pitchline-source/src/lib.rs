//! # Pitchline Source
//!
//! Signal sources for the pitch pipeline. Each source owns one named
//! acquisition thread and hands [`RawAudioBuffer`](pitchline_core::RawAudioBuffer)s
//! to a [`BufferObserver`]:
//!
//! - [`FileSource`]: WAV playback via `hound` on `pitchline-playback`
//! - [`InputSource`]: hardware capture via CPAL on `pitchline-capture`
//!   (feature `input`, enabled by default)
//!
//! Capture access is gated by a [`PermissionProvider`].

pub mod file;
#[cfg(feature = "input")]
pub mod input;
pub mod permission;
pub mod source;

pub use file::FileSource;
#[cfg(feature = "input")]
pub use input::InputSource;
pub use permission::{
    AlwaysGranted, PermissionCallback, PermissionProvider, PermissionStatus, PromptPermission,
};
pub use source::{BufferObserver, SignalSource, SourceKind};
