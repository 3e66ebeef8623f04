//! Viewport clipping and multi-threaded scanline texture mapping for
//! virtual globes.

pub mod clip;
pub mod colorizer;
pub mod config;
pub mod data;
pub mod geo;
pub mod geometry;
pub mod hash;
pub mod mapper;
pub mod paint;
pub mod projection;
pub mod tile;
pub mod vector;
