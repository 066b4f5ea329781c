//! Client for the quran.com reference API.

pub mod client;
pub mod types;

pub use client::{QuranApi, QuranClient};
