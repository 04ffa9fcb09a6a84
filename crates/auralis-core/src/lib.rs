//! Auralis Core - shared types and DSP primitives for the mastering engine.
//!
//! This crate holds everything the higher layers agree on:
//!
//! - [`Fingerprint`] - the 25-dimensional perceptual feature vector that
//!   drives adaptive mastering
//! - [`ProcessingParameters`] - the single typed parameter value handed to
//!   the DSP stage graph (never a loosely-keyed map)
//! - [`ChunkDescriptor`] - a positioned slice of a track
//! - [`StereoBuffer`] - planar stereo audio, the interchange type for
//!   decoded and rendered audio
//!
//! plus the stateful DSP building blocks the stage graph is assembled from:
//! biquad filters ([`Biquad`]), envelope following ([`EnvelopeFollower`]),
//! parameter smoothing ([`SmoothedValue`]) and DC removal ([`DcBlocker`]).
//!
//! # no_std Support
//!
//! The crate is `no_std` compatible (with `alloc`) for embedded front-ends.
//! Disable the default `std` feature to opt in.
//!
//! # Design Principles
//!
//! - **Typed parameters**: every stage consumes `&ProcessingParameters`;
//!   conversion from untyped sources happens exactly once, at the preset
//!   resolver boundary.
//! - **Real-time safe primitives**: no allocation inside per-sample paths.
//! - **Deterministic**: the same input and parameters always produce the
//!   same output, bit for bit.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod buffer;
pub mod chunk;
pub mod dc_blocker;
pub mod envelope;
pub mod filter;
pub mod fingerprint;
pub mod kweight;
pub mod math;
pub mod params;
pub mod smooth;

pub use buffer::StereoBuffer;
pub use chunk::{ChunkDescriptor, ChunkStats};
pub use dc_blocker::DcBlocker;
pub use envelope::EnvelopeFollower;
pub use filter::{
    Biquad, FilterCoeffs, high_shelf, highpass, low_shelf, lowpass, peaking,
};
pub use fingerprint::{FEATURE_COUNT, FEATURE_NAMES, Fingerprint};
pub use kweight::{KWeighting, mean_square_to_lufs, weighted_mean_square};
pub use math::{db_to_linear, lerp, linear_to_db, ms_to_samples, odd_saturate};
pub use params::{DynamicsParams, EqCurve, EqPoint, ProcessingParameters};
pub use smooth::SmoothedValue;
