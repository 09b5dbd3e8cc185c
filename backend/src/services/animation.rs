//! 72-hour solar imagery animation
//!
//! Downloads the Helioviewer screenshots concurrently into a scratch
//! directory and hands them to `ffmpeg` for GIF encoding. Best-effort: the report is
//! written without the animation when this fails.

use std::{process::Stdio, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::{process::Command, task::JoinSet};

use crate::error::AnimationError;

pub const HELIOVIEWER_URL: &str = "https://api.helioviewer.org/v2/takeScreenshot/";

const FRAME_COUNT: i64 = 12;
const FRAME_SPACING_HOURS: i64 = 6;
const FRAME_TIMEOUT: Duration = Duration::from_secs(30);
const ENCODE_TIMEOUT: Duration = Duration::from_secs(120);
/// SDO AIA 171
const LAYERS: &str = "[SDO,AIA,AIA,171,1,100]";

/// Builds the GIF embedded as `sun_72h.gif`
#[async_trait]
pub trait AnimationBuilder: Send + Sync {
    async fn build(&self, at: DateTime<Utc>) -> Result<Vec<u8>, AnimationError>;
}

/// Used in mockup mode and tests
pub struct DisabledAnimation;

#[async_trait]
impl AnimationBuilder for DisabledAnimation {
    async fn build(&self, _at: DateTime<Utc>) -> Result<Vec<u8>, AnimationError> {
        Err(AnimationError::Disabled)
    }
}

/// Frame instants, oldest first, ending at `at`
pub fn frame_times(at: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    (0..FRAME_COUNT)
        .rev()
        .map(|back| at - ChronoDuration::hours(FRAME_SPACING_HOURS * back))
        .collect()
}

async fn download_frame(client: reqwest::Client, url: String, at: DateTime<Utc>) -> Option<Vec<u8>> {
    match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => match response.bytes().await {
            Ok(bytes) if !bytes.is_empty() => Some(bytes.to_vec()),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "Frame body unreadable");
                None
            }
        },
        Ok(response) => {
            tracing::debug!(status = %response.status(), frame = %at, "Frame request rejected");
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, frame = %at, "Frame request failed");
            None
        }
    }
}

pub struct SunAnimator {
    client: reqwest::Client,
    base_url: String,
    ffmpeg: String,
}

impl SunAnimator {
    pub fn new() -> Self {
        Self::with_base_url(HELIOVIEWER_URL.to_string(), "ffmpeg".to_string())
    }

    pub fn with_base_url(base_url: String, ffmpeg: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FRAME_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url,
            ffmpeg,
        }
    }

    fn frame_url(&self, at: DateTime<Utc>) -> String {
        format!(
            "{}?date={}&imageScale=4.8&layers={}&x0=0&y0=0&width=512&height=512&display=true&watermark=false",
            self.base_url,
            at.format("%Y-%m-%dT%H:%M:%SZ"),
            urlencoding::encode(LAYERS)
        )
    }

    async fn encode(&self, dir: &std::path::Path) -> Result<Vec<u8>, AnimationError> {
        let output = dir.join("sun_72h.gif");
        let run = Command::new(&self.ffmpeg)
            .current_dir(dir)
            .args([
                "-y",
                "-loglevel",
                "error",
                "-framerate",
                "3",
                "-i",
                "frame_%02d.png",
                "-vf",
                "scale=384:-1:flags=lanczos,split[a][b];[a]palettegen[p];[b][p]paletteuse",
                "-loop",
                "0",
                "sun_72h.gif",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let result = tokio::time::timeout(ENCODE_TIMEOUT, run)
            .await
            .map_err(|_| AnimationError::Encoder("ffmpeg timed out".to_string()))?
            .map_err(|e| AnimationError::Encoder(format!("could not start ffmpeg: {}", e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(AnimationError::Encoder(stderr.trim().to_string()));
        }
        Ok(tokio::fs::read(output).await?)
    }
}

impl Default for SunAnimator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnimationBuilder for SunAnimator {
    async fn build(&self, at: DateTime<Utc>) -> Result<Vec<u8>, AnimationError> {
        let scratch = tempfile::tempdir()?;

        // Dropping the set aborts outstanding downloads
        let mut downloads = JoinSet::new();
        for (index, ts) in frame_times(at).into_iter().enumerate() {
            let url = self.frame_url(ts);
            let client = self.client.clone();
            downloads.spawn(async move { (index, download_frame(client, url, ts).await) });
        }

        let mut frames = Vec::new();
        while let Some(joined) = downloads.join_next().await {
            match joined {
                Ok((index, Some(bytes))) => frames.push((index, bytes)),
                Ok((_, None)) => {}
                Err(e) => tracing::debug!(error = %e, "Frame task failed"),
            }
        }
        frames.sort_unstable_by_key(|(index, _)| *index);

        let mut written = 0;
        for (_, bytes) in frames {
            let path = scratch.path().join(format!("frame_{:02}.png", written));
            tokio::fs::write(path, bytes).await?;
            written += 1;
        }
        if written == 0 {
            return Err(AnimationError::NoFrames);
        }

        tracing::info!(frames = written, "Encoding solar animation");
        self.encode(scratch.path()).await
    }
}
