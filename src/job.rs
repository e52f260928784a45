// Domain types shared by the CLI, the API client and the runner. None of
// them know about HTTP; the client maps them onto whichever dialect the
// service speaks.

use std::collections::BTreeMap;
use std::fmt;

use clap::ValueEnum;
use serde::Deserialize;

/// Which shape of the remote API to talk to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Service {
    /// Asset/generation API: two-step uploads, `complete`/`error` states.
    Public,
    /// Character/project API: single multipart uploads, `Completed`/`Failed`.
    Legacy,
}

impl Service {
    pub fn default_base_url(self) -> &'static str {
        match self {
            Service::Public => "https://api.hedra.com/web-app/public",
            Service::Legacy => "https://mercury.dev.dream-ai.com/api",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum AspectRatio {
    #[value(name = "16:9")]
    Landscape,
    #[value(name = "9:16")]
    Portrait,
    #[value(name = "1:1")]
    Square,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Square => "1:1",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Resolution {
    #[value(name = "540p")]
    Sd540,
    #[value(name = "720p")]
    Hd720,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Sd540 => "540p",
            Resolution::Hd720 => "720p",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    Audio,
}

impl AssetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Audio => "audio",
        }
    }
}

/// Server-assigned handle of an uploaded file: an asset id for the public
/// dialect, a URL for the legacy one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetRef(pub String);

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AudioSource {
    Uploaded(AssetRef),
    TextToSpeech { voice_id: String, text: String },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ImageSource {
    Uploaded(AssetRef),
    Prompt(String),
}

/// Everything submitted for one job. Built once by the runner after the
/// uploads and never modified afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    pub aspect_ratio: AspectRatio,
    pub audio: AudioSource,
    pub image: ImageSource,
    pub resolution: Option<Resolution>,
    pub text_prompt: Option<String>,
    pub model_id: Option<String>,
    /// Seconds.
    pub duration: Option<f64>,
    pub seed: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One poll result, with the dialect's vocabulary already mapped.
#[derive(Clone, Debug, PartialEq)]
pub enum JobStatus {
    /// Any non-terminal status, carrying the raw value for display.
    Pending(String),
    Complete {
        download_url: Option<String>,
        asset_id: Option<String>,
    },
    Failed { message: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending(_))
    }
}

/// One entry of the voice listing.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Voice {
    #[serde(alias = "voiceId")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    asset: Option<VoiceAsset>,
    #[serde(default)]
    labels: Vec<Label>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
struct VoiceAsset {
    #[serde(default)]
    labels: Vec<Label>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
struct Label {
    name: String,
    #[serde(default)]
    value: String,
}

impl Voice {
    /// Labels keyed by name. Labels nested under `asset` take precedence
    /// over top-level ones.
    pub fn labels(&self) -> BTreeMap<&str, &str> {
        let nested = self.asset.iter().flat_map(|a| a.labels.iter());
        self.labels
            .iter()
            .chain(nested)
            .map(|l| (l.name.as_str(), l.value.as_str()))
            .collect()
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels().get(name).copied()
    }
}
