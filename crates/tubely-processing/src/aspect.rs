//! Orientation classification.
//!
//! A staged video is probed for the geometry of its first stream and the
//! width/height ratio is bucketed into landscape (16:9), portrait (9:16), or
//! other. Both buckets use a strict `<` against the tolerance, so a ratio
//! exactly `tolerance` away from a target falls outside it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

pub const DEFAULT_ASPECT_TOLERANCE: f64 = 0.05;
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const LANDSCAPE_RATIO: f64 = 16.0 / 9.0;
const PORTRAIT_RATIO: f64 = 9.0 / 16.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
    Other,
}

impl Orientation {
    /// Storage key prefix for this bucket.
    pub fn prefix(&self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
            Orientation::Other => "other",
        }
    }
}

impl Display for Orientation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.prefix())
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid probe executable: {0}")]
    InvalidExecutable(String),

    #[error("failed to run probe: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("probe exited with status {status:?}: {stderr}")]
    NonZeroExit { status: Option<i32>, stderr: String },

    #[error("unparseable probe output: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("probe reported no streams")]
    NoStreams,

    #[error("invalid stream dimensions {width:?}x{height:?}")]
    InvalidDimensions {
        width: Option<u64>,
        height: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u64,
    pub height: u64,
}

/// Bucket a width/height ratio.
pub fn classify_ratio(ratio: f64, tolerance: f64) -> Orientation {
    if (ratio - LANDSCAPE_RATIO).abs() < tolerance {
        Orientation::Landscape
    } else if (ratio - PORTRAIT_RATIO).abs() < tolerance {
        Orientation::Portrait
    } else {
        Orientation::Other
    }
}

/// Bucket raw stream geometry. Zero width or height is a probe failure.
pub fn classify_dimensions(
    width: u64,
    height: u64,
    tolerance: f64,
) -> Result<Orientation, ProbeError> {
    if width == 0 || height == 0 {
        return Err(ProbeError::InvalidDimensions {
            width: Some(width),
            height: Some(height),
        });
    }
    Ok(classify_ratio(width as f64 / height as f64, tolerance))
}

/// Inspects a local media file and reports the geometry of stream 0.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<Dimensions, ProbeError>;
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u64>,
    height: Option<u64>,
}

/// Parse `ffprobe -print_format json -show_streams` output.
pub(crate) fn parse_probe_output(stdout: &[u8]) -> Result<Dimensions, ProbeError> {
    let output: ProbeOutput = serde_json::from_slice(stdout).map_err(ProbeError::Parse)?;
    let stream = output.streams.first().ok_or(ProbeError::NoStreams)?;

    match (stream.width, stream.height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => Ok(Dimensions { width, height }),
        (width, height) => Err(ProbeError::InvalidDimensions { width, height }),
    }
}

/// `ffprobe` run as a child process, bounded by a timeout.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    ffprobe_path: String,
    timeout: Duration,
}

impl FfprobeProbe {
    pub fn new(ffprobe_path: impl Into<String>, timeout: Duration) -> Result<Self, ProbeError> {
        let ffprobe_path = ffprobe_path.into();

        if ffprobe_path.is_empty()
            || !ffprobe_path.chars().all(|c| {
                c.is_alphanumeric() || c == '/' || c == '-' || c == '_' || c == '.' || c == '\\'
            })
        {
            return Err(ProbeError::InvalidExecutable(ffprobe_path));
        }

        Ok(Self {
            ffprobe_path,
            timeout,
        })
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffprobe",
        process.executable.path = %self.ffprobe_path,
        timeout_ms = self.timeout.as_millis() as u64
    ))]
    async fn probe(&self, path: &Path) -> Result<Dimensions, ProbeError> {
        let start = std::time::Instant::now();

        let mut command = Command::new(&self.ffprobe_path);
        command
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            // Dropping the future on timeout must not leave the child running.
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
            .map_err(ProbeError::Spawn)?;

        if !output.status.success() {
            return Err(ProbeError::NonZeroExit {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let dimensions = parse_probe_output(&output.stdout)?;

        tracing::debug!(
            width = dimensions.width,
            height = dimensions.height,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Video probe completed"
        );

        Ok(dimensions)
    }
}

/// Probe-then-bucket, with a configurable tolerance.
#[derive(Clone)]
pub struct AspectClassifier {
    probe: Arc<dyn MediaProbe>,
    tolerance: f64,
}

impl AspectClassifier {
    pub fn new(probe: Arc<dyn MediaProbe>, tolerance: f64) -> Self {
        Self { probe, tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Classify a staged file. Probe failures propagate; there is no fallback bucket.
    pub async fn classify(&self, path: &Path) -> Result<Orientation, ProbeError> {
        let Dimensions { width, height } = self.probe.probe(path).await?;
        let orientation = classify_dimensions(width, height, self.tolerance)?;
        tracing::debug!(width, height, orientation = %orientation, "Video classified");
        Ok(orientation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_scenario_dimensions() {
        let tol = DEFAULT_ASPECT_TOLERANCE;
        assert_eq!(
            classify_dimensions(1280, 720, tol).unwrap(),
            Orientation::Landscape
        );
        assert_eq!(
            classify_dimensions(1920, 1080, tol).unwrap(),
            Orientation::Landscape
        );
        assert_eq!(
            classify_dimensions(1918, 1080, tol).unwrap(),
            Orientation::Landscape
        );
        assert_eq!(
            classify_dimensions(1080, 1920, tol).unwrap(),
            Orientation::Portrait
        );
        assert_eq!(classify_dimensions(640, 480, tol).unwrap(), Orientation::Other);
        assert_eq!(classify_dimensions(1000, 1000, tol).unwrap(), Orientation::Other);
    }

    #[test]
    fn test_tolerance_boundary_is_exclusive() {
        let tol = DEFAULT_ASPECT_TOLERANCE;
        assert_eq!(
            classify_ratio(LANDSCAPE_RATIO + tol - EPSILON, tol),
            Orientation::Landscape
        );
        assert_eq!(
            classify_ratio(LANDSCAPE_RATIO + tol + EPSILON, tol),
            Orientation::Other
        );
        assert_eq!(
            classify_ratio(LANDSCAPE_RATIO - tol + EPSILON, tol),
            Orientation::Landscape
        );
        assert_eq!(
            classify_ratio(PORTRAIT_RATIO + tol - EPSILON, tol),
            Orientation::Portrait
        );
        assert_eq!(
            classify_ratio(PORTRAIT_RATIO - tol - EPSILON, tol),
            Orientation::Other
        );
    }

    #[test]
    fn test_tolerance_is_configurable() {
        // 1.7 is 0.078 away from 16:9
        assert_eq!(classify_ratio(1.7, 0.05), Orientation::Other);
        assert_eq!(classify_ratio(1.7, 0.1), Orientation::Landscape);
        assert_eq!(classify_ratio(LANDSCAPE_RATIO, 0.0), Orientation::Other);
    }

    #[test]
    fn test_ratios_within_tolerance_sweep() {
        let tol = DEFAULT_ASPECT_TOLERANCE;
        for step in 0..100 {
            let offset = (step as f64 / 100.0 - 0.5) * 2.0 * (tol - 1e-6);
            assert_eq!(
                classify_ratio(LANDSCAPE_RATIO + offset, tol),
                Orientation::Landscape
            );
            assert_eq!(
                classify_ratio(PORTRAIT_RATIO + offset, tol),
                Orientation::Portrait
            );
        }
    }

    #[test]
    fn test_zero_height_is_probe_error() {
        for width in [0, 1, 1920] {
            assert!(matches!(
                classify_dimensions(width, 0, DEFAULT_ASPECT_TOLERANCE),
                Err(ProbeError::InvalidDimensions { .. })
            ));
        }
        assert!(classify_dimensions(0, 1080, DEFAULT_ASPECT_TOLERANCE).is_err());
    }

    #[test]
    fn test_orientation_prefixes() {
        assert_eq!(Orientation::Landscape.prefix(), "landscape");
        assert_eq!(Orientation::Portrait.prefix(), "portrait");
        assert_eq!(Orientation::Other.to_string(), "other");
    }

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{"streams":[{"index":0,"codec_type":"video","width":1280,"height":720},{"index":1,"codec_type":"audio"}]}"#;
        assert_eq!(
            parse_probe_output(json).unwrap(),
            Dimensions {
                width: 1280,
                height: 720
            }
        );
    }

    #[test]
    fn test_parse_probe_output_failures() {
        assert!(matches!(
            parse_probe_output(b"not json"),
            Err(ProbeError::Parse(_))
        ));
        assert!(matches!(
            parse_probe_output(br#"{"format":{}}"#),
            Err(ProbeError::Parse(_))
        ));
        assert!(matches!(
            parse_probe_output(br#"{"streams":[]}"#),
            Err(ProbeError::NoStreams)
        ));
        assert!(matches!(
            parse_probe_output(br#"{"streams":[{"codec_type":"audio"}]}"#),
            Err(ProbeError::InvalidDimensions { width: None, .. })
        ));
        assert!(matches!(
            parse_probe_output(br#"{"streams":[{"width":1920,"height":0}]}"#),
            Err(ProbeError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_rejects_unsafe_executable_path() {
        assert!(FfprobeProbe::new("ffprobe; rm -rf /", DEFAULT_PROBE_TIMEOUT).is_err());
        assert!(FfprobeProbe::new("", DEFAULT_PROBE_TIMEOUT).is_err());
        assert!(FfprobeProbe::new("/usr/bin/ffprobe", DEFAULT_PROBE_TIMEOUT).is_ok());
    }

    struct FixedProbe(Option<Dimensions>);

    #[async_trait]
    impl MediaProbe for FixedProbe {
        async fn probe(&self, _path: &Path) -> Result<Dimensions, ProbeError> {
            self.0.ok_or(ProbeError::NoStreams)
        }
    }

    #[tokio::test]
    async fn test_classifier_maps_probe_result() {
        let classifier = AspectClassifier::new(
            Arc::new(FixedProbe(Some(Dimensions {
                width: 1080,
                height: 1920,
            }))),
            DEFAULT_ASPECT_TOLERANCE,
        );
        assert_eq!(
            classifier.classify(Path::new("staged.mp4")).await.unwrap(),
            Orientation::Portrait
        );
    }

    #[tokio::test]
    async fn test_classifier_does_not_fall_back_to_other() {
        let classifier = AspectClassifier::new(
            Arc::new(FixedProbe(None)),
            DEFAULT_ASPECT_TOLERANCE,
        );
        assert!(matches!(
            classifier.classify(Path::new("staged.mp4")).await,
            Err(ProbeError::NoStreams)
        ));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        fn fake_ffprobe(dir: &TempDir, body: &str) -> String {
            let path = dir.path().join("fake-ffprobe");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.display().to_string()
        }

        #[tokio::test]
        async fn test_ffprobe_reads_first_stream() {
            let dir = TempDir::new().unwrap();
            // Only answer when invoked with the expected leading arguments.
            let exe = fake_ffprobe(
                &dir,
                r#"[ "$1 $2 $3 $4 $5" = "-v error -print_format json -show_streams" ] || exit 3
echo '{"streams":[{"width":1280,"height":720}]}'"#,
            );
            let probe = FfprobeProbe::new(exe, Duration::from_secs(5)).unwrap();
            let dims = probe.probe(Path::new("/tmp/staged.mp4")).await.unwrap();
            assert_eq!(dims.width, 1280);
            assert_eq!(dims.height, 720);
        }

        #[tokio::test]
        async fn test_ffprobe_nonzero_exit() {
            let dir = TempDir::new().unwrap();
            let exe = fake_ffprobe(&dir, "echo 'moov atom not found' >&2\nexit 1");
            let probe = FfprobeProbe::new(exe, Duration::from_secs(5)).unwrap();
            match probe.probe(Path::new("/tmp/broken.mp4")).await {
                Err(ProbeError::NonZeroExit { status, stderr }) => {
                    assert_eq!(status, Some(1));
                    assert!(stderr.contains("moov atom"));
                }
                other => panic!("expected NonZeroExit, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_ffprobe_timeout() {
            let dir = TempDir::new().unwrap();
            let exe = fake_ffprobe(&dir, "sleep 5");
            let probe = FfprobeProbe::new(exe, Duration::from_millis(200)).unwrap();
            let start = std::time::Instant::now();
            assert!(matches!(
                probe.probe(Path::new("/tmp/slow.mp4")).await,
                Err(ProbeError::Timeout(_))
            ));
            assert!(start.elapsed() < Duration::from_secs(4));
        }

        #[tokio::test]
        async fn test_ffprobe_missing_executable() {
            let probe =
                FfprobeProbe::new("/nonexistent/ffprobe", Duration::from_secs(1)).unwrap();
            assert!(matches!(
                probe.probe(Path::new("/tmp/a.mp4")).await,
                Err(ProbeError::Spawn(_))
            ));
        }
    }
}
