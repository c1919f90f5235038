pub mod catalog;
pub mod config;
pub mod consts;
pub mod error;
pub mod exposure;
pub mod fft;
pub mod geometry;
pub mod header;
pub mod inject;
pub mod layout;
pub mod orchestrator;
pub mod photometry;
pub mod pipeline;
pub mod profile;
pub mod psf;
pub mod runlist;
pub mod simid;
pub mod stamp;
pub mod versions;
