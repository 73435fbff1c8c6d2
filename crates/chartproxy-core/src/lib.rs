//! Chartproxy Core - data contracts shared with the packaging toolchain
//!
//! This crate provides the plain types that flow between chart resolution
//! and the packaging client:
//! - `Chart`: A chart loaded into memory, with optional metadata
//! - `ChartInfo`: Which repository, chart name, and version a request refers to
//! - `Values`: User-supplied install values with deep merge support
//! - `Release`: The outcome of an install

pub mod chart;
pub mod error;
pub mod release;
pub mod values;

pub use chart::{CHART_URL_ANNOTATION, Chart, ChartFile, ChartInfo, ChartMetadata};
pub use error::{CoreError, Result};
pub use release::{Release, ReleaseStatus};
pub use values::Values;
