//! Image text recognition and translation service.
//!
//! An upload is rate limited, validated, normalized and run through OCR.
//! The recognized text is looked up in a content-addressed cache and, on a
//! miss, translated either inline or on a background worker pool with a
//! bounded wait.

pub mod api;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ocr;
pub mod ratelimit;
pub mod services;
pub mod translation;

pub use error::{Result, ScanslateError};
