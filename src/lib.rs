#![cfg_attr(not(test), no_std)]

pub mod design_parameters;
pub mod dma;
#[cfg(target_os = "none")]
pub mod hardware;
pub mod metadata;
pub mod monitor;
pub mod observation;
pub mod pio;
pub mod pipeline;
pub mod sample;
pub mod sampler;
pub mod settings;
pub mod statistics;
pub mod status;
pub mod tones;

pub use si5351;
