//! Attestation overlays for fixed-layout artifacts
//!
//! This crate stamps a signer attestation line and a signature image onto
//! the first page of a PDF using lopdf. Text is drawn with an embedded
//! TrueType font so names in any script the font covers render and remain
//! extractable.

pub mod error;
pub mod font;
pub mod image;
pub mod overlay;

pub use error::StampError;
pub use font::EmbeddedFont;
pub use image::{decode_data_url, SignatureImage};
pub use overlay::{stamp_first_page, Attestation, OverlayLayout};
