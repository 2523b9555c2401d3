pub mod body;
pub mod config;
pub mod filter;
pub mod mesh;
pub mod playback;
pub mod time;
