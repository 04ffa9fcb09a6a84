//! Auralis DSP - the mastering stage graph.
//!
//! A chunk of audio flows through a fixed sequence of stages, each of
//! which may be bypassed through its parameter sentinel:
//!
//! 1. Input conditioning - trim gain and DC removal
//! 2. Parametric EQ - dense gain table reduced to an IIR cascade
//! 3. Wide-band dynamics - soft-knee compression
//! 4. Stereo processing - M/S width and mono bass
//! 5. Saturation - odd-symmetric waveshaping
//! 6. Level match - scalar gain toward a loudness target
//! 7. True-peak limiter - the non-bypassable last line of defense
//!
//! Every stage consumes the same typed [`ProcessingParameters`] value by
//! reference and preserves the sample count exactly. Given identical
//! input, parameters and sample rate, the graph is bit-deterministic.
//!
//! Stateful stages (dynamics envelope, filters, limiter lookahead) are
//! warmed by the pre-roll context the chunker supplies; the graph itself
//! is reset between chunks so chunk renders stay pure.
//!
//! [`ProcessingParameters`]: auralis_core::ProcessingParameters

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod dynamics;
pub mod eq;
pub mod gain;
pub mod graph;
pub mod level;
pub mod limiter;
pub mod saturation;
pub mod stage;
pub mod stereo;

pub use dynamics::DynamicsStage;
pub use eq::EqStage;
pub use gain::InputStage;
pub use graph::{ChunkReport, StageGraph};
pub use level::LevelMatchStage;
pub use limiter::LimiterStage;
pub use saturation::SaturationStage;
pub use stage::Stage;
pub use stereo::StereoStage;
