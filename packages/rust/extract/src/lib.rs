//! Announcement text analysis: status classification and airport extraction.
//!
//! The channel posts free-form Russian text. Two passes recover structure:
//! [`Classifier`] decides whether a post announces restrictions being
//! introduced or lifted, and [`AirportRegistry`] finds which airports the
//! post refers to, learning new ones from inline `Name (ICAO)` mentions.

mod classify;
mod registry;

pub use classify::Classifier;
pub use registry::AirportRegistry;
