//! Tubely Processing Library
//!
//! Orientation classification of staged videos and media-type validation
//! for uploads.

pub mod aspect;
pub mod validator;

pub use aspect::{
    classify_dimensions, classify_ratio, AspectClassifier, Dimensions, FfprobeProbe, MediaProbe,
    Orientation, ProbeError, DEFAULT_ASPECT_TOLERANCE,
};
pub use validator::{AssetClass, MediaValidator, ValidatedMedia, ValidationError};
