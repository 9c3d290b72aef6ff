//! Vector editor capabilities and headless reference implementations.
//!
//! [`backend`] defines the seams. The remaining modules implement them well
//! enough to run the pipeline without a browser: conversion, SVG export,
//! text metric refresh, and an in-memory editor surface.

pub mod backend;
pub mod convert;
pub mod headless;
pub mod metrics;
pub mod svg;

pub use backend::{
    DimensionRestorer, EditCapture, EditorSurface, ExportOptions, FeedbackSink, FontGate,
    NoopFeedback, ReadyFonts, SceneConverter, SceneExporter, SceneSlot,
};
pub use convert::ShorthandConverter;
pub use headless::HeadlessEditor;
pub use metrics::MetricRestorer;
pub use svg::{RenderedImage, SvgExporter, SvgNode};
