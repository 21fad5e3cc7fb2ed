//! MF-Offline: offline mastering jobs
//!
//! Batch and interactive mastering around `mf-master`:
//! - WAV decode (8/16/24/32-bit int, 32-bit float) and 16-bit PCM encode
//! - Named impulse responses for the reverb stage
//! - Render worker pool with progress events, cancellation and supersede
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌──────────────────────────────────────────┐   ┌─────────┐
//! │ decode  │ → │ RenderPool (rayon)                       │ → │ encode  │
//! │ (hound) │   │  analyze → generate → render → normalize │   │ (16-bit)│
//! └─────────┘   │  events ──► crossbeam channel            │   └─────────┘
//!               └──────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mf_offline::{OfflineConfig, RenderJob, RenderPool, decode_wav, write_wav16};
//!
//! let pool = RenderPool::new(OfflineConfig::from_file("masterforge.json")?)?;
//! let input = decode_wav("mix.wav")?;
//! let handle = pool.submit(RenderJob::with_preferences(input, pool.config().preferences.clone()));
//! for event in handle.events() {
//!     println!("{event:?}");
//! }
//! let output = handle.wait()?;
//! write_wav16("master.wav", &output.mastered.buffer)?;
//! ```

mod config;
mod decoder;
mod encoder;
mod error;
mod impulse;
mod job;
mod pool;

pub use config::*;
pub use decoder::*;
pub use encoder::*;
pub use error::*;
pub use impulse::*;
pub use job::*;
pub use pool::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
