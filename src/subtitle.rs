use std::path::Path;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::error::{Result, SegtransError};

/// A timed line of transcribed text. Translation only ever rewrites `text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Same timing, different text.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            start: self.start,
            end: self.end,
            text: text.into(),
        }
    }
}

/// Read a JSON array of segments.
pub async fn load_segments<P: AsRef<Path>>(path: P) -> Result<Vec<Segment>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SegtransError::FileNotFound(path.display().to_string()));
    }

    let content = fs::read_to_string(path).await?;
    let segments: Vec<Segment> = serde_json::from_str(&content)?;
    info!("Loaded {} segments from {}", segments.len(), path.display());
    Ok(segments)
}

/// Write segments as a pretty-printed JSON array.
pub async fn save_segments<P: AsRef<Path>>(segments: &[Segment], path: P) -> Result<()> {
    let path = path.as_ref();
    let content = serde_json::to_string_pretty(segments)?;
    fs::write(path, content).await?;
    info!("Wrote {} segments to {}", segments.len(), path.display());
    Ok(())
}

/// Generate SRT subtitle file from segments
pub async fn generate_srt<P: AsRef<Path>>(segments: &[Segment], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Generating SRT file: {}", output_path.display());

    fs::write(output_path, render_srt(segments)).await?;

    info!("SRT file generated successfully");
    Ok(())
}

fn render_srt(segments: &[Segment]) -> String {
    let mut srt_content = String::new();

    for (index, segment) in segments.iter().enumerate() {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_srt_time(segment.start),
            format_srt_time(segment.end),
            segment.text.trim()
        ));
    }

    srt_content
}

/// Format time in seconds to SRT time format (HH:MM:SS,mmm)
fn format_srt_time(seconds: f64) -> String {
    let total_milliseconds = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(65.123), "00:01:05,123");
        assert_eq!(format_srt_time(3661.500), "01:01:01,500");
    }

    #[test]
    fn test_render_srt() {
        let segments = vec![
            Segment::new(0.0, 1.5, " Hola "),
            Segment::new(1.5, 3.0, "Adiós"),
        ];
        assert_eq!(
            render_srt(&segments),
            "1\n00:00:00,000 --> 00:00:01,500\nHola\n\n2\n00:00:01,500 --> 00:00:03,000\nAdiós\n\n"
        );
    }

    #[tokio::test]
    async fn test_segment_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segments.json");
        let segments = vec![Segment::new(0.0, 1.0, "hello"), Segment::new(1.0, 2.25, "world")];

        save_segments(&segments, &path).await.unwrap();
        let loaded = load_segments(&path).await.unwrap();
        assert_eq!(loaded, segments);
    }

    #[tokio::test]
    async fn test_missing_segment_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_segments(dir.path().join("absent.json")).await.unwrap_err();
        assert!(matches!(err, SegtransError::FileNotFound(_)));
    }
}
