// Command-line surface. Parsing is clap's job; `Cli::plan` then checks the
// flag combinations clap cannot express and turns them into a `JobPlan`.
// Nothing here touches the network.

use std::path::PathBuf;

use clap::Parser;
use log::warn;

use crate::config::{Settings, API_KEY_ENV, BASE_URL_ENV};
use crate::error::{Error, Result};
use crate::job::{AspectRatio, Resolution, Service};
use crate::runner::{AudioInput, ImageInput, JobPlan};

#[derive(Debug, Parser)]
#[command(name = "hedra-cli", version)]
#[command(about = "Generate a talking-portrait video from an image and audio", long_about = None)]
pub struct Cli {
    /// API key; falls back to the environment and .env files.
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Which API dialect to speak.
    #[arg(long, value_enum, default_value_t = Service::Public)]
    pub service: Service,

    /// Override the service base URL.
    #[arg(long, env = BASE_URL_ENV)]
    pub base_url: Option<String>,

    /// Route requests to the canary deployment.
    #[arg(long)]
    pub canary: bool,

    /// List available voices and exit.
    #[arg(long, alias = "list_voices")]
    pub list_voices: bool,

    /// Path to the portrait image.
    #[arg(long, visible_alias = "img")]
    pub image: Option<PathBuf>,

    /// Generate the portrait from a prompt instead (legacy service only).
    #[arg(long, visible_alias = "img-prompt")]
    pub image_prompt: Option<String>,

    /// Path to the audio file.
    #[arg(long, visible_alias = "audio-file", alias = "audio_file")]
    pub audio: Option<PathBuf>,

    /// Text to speak with --voice-id instead of an audio file.
    #[arg(long, visible_alias = "voice-text", alias = "voice_text")]
    pub audio_text: Option<String>,

    /// Voice used for text-to-speech; see --list-voices.
    #[arg(long, alias = "voice_id")]
    pub voice_id: Option<String>,

    #[arg(
        long,
        value_enum,
        visible_alias = "ar",
        alias = "aspect_ratio",
        required_unless_present = "list_voices"
    )]
    pub aspect_ratio: Option<AspectRatio>,

    #[arg(long, value_enum)]
    pub resolution: Option<Resolution>,

    /// Text prompt describing the video content.
    #[arg(long, alias = "text_prompt")]
    pub text_prompt: Option<String>,

    /// Video duration in seconds.
    #[arg(long)]
    pub duration: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    pub seed: Option<i64>,

    /// Model to use instead of the first one the service lists.
    #[arg(long, alias = "model_id")]
    pub model_id: Option<String>,

    /// Where the finished video is written.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}

fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl Cli {
    pub fn settings(&self) -> Result<Settings> {
        Settings::resolve(
            self.api_key.as_deref(),
            self.base_url.as_deref(),
            self.service,
            self.canary,
        )
    }

    /// Validates the job flags. Every error here is raised before any
    /// request is made.
    pub fn plan(&self) -> Result<JobPlan> {
        let aspect_ratio = self
            .aspect_ratio
            .ok_or_else(|| Error::config("--aspect-ratio is required"))?;

        let audio = match (&self.audio, given(&self.voice_id), given(&self.audio_text)) {
            (Some(path), None, None) => AudioInput::File(path.clone()),
            (Some(_), _, _) => {
                return Err(Error::config(
                    "choose either --audio or --voice-id with --audio-text, not both",
                ))
            }
            (None, Some(voice_id), Some(text)) => AudioInput::Speech {
                voice_id: voice_id.to_string(),
                text: text.to_string(),
            },
            (None, Some(_), None) => {
                return Err(Error::config("--audio-text is required when using --voice-id"))
            }
            (None, None, Some(_)) => {
                return Err(Error::config("--voice-id is required when using --audio-text"))
            }
            (None, None, None) => {
                return Err(Error::config(
                    "either --audio or both --voice-id and --audio-text are required",
                ))
            }
        };

        let image = match (&self.image, given(&self.image_prompt)) {
            (Some(_), Some(_)) => {
                return Err(Error::config("choose either --image or --image-prompt, not both"))
            }
            (Some(path), None) => ImageInput::File(path.clone()),
            (None, Some(_)) if self.service == Service::Public => {
                return Err(Error::config(
                    "--image-prompt is only supported by the legacy service",
                ))
            }
            (None, Some(prompt)) => ImageInput::Prompt(prompt.to_string()),
            (None, None) => {
                return Err(Error::config("one of --image and --image-prompt is required"))
            }
        };

        if let Some(duration) = self.duration {
            if !duration.is_finite() || duration <= 0.0 {
                return Err(Error::config("--duration must be a positive number of seconds"));
            }
        }

        match self.service {
            Service::Public => {
                if given(&self.text_prompt).is_none() {
                    return Err(Error::config("--text-prompt is required"));
                }
                if self.resolution.is_none() {
                    return Err(Error::config("--resolution is required"));
                }
            }
            Service::Legacy => {
                let ignored = [
                    ("--resolution", self.resolution.is_some()),
                    ("--text-prompt", self.text_prompt.is_some()),
                    ("--duration", self.duration.is_some()),
                    ("--model-id", self.model_id.is_some()),
                ];
                for (flag, set) in ignored {
                    if set {
                        warn!("{} is not used by the legacy service", flag);
                    }
                }
            }
        }

        for path in audio.file().into_iter().chain(image.file()) {
            if !path.is_file() {
                return Err(Error::config(format!(
                    "input file not found: {}",
                    path.display()
                )));
            }
        }

        Ok(JobPlan {
            aspect_ratio,
            audio,
            image,
            resolution: self.resolution,
            text_prompt: given(&self.text_prompt).map(str::to_string),
            model_id: given(&self.model_id).map(str::to_string),
            duration: self.duration,
            seed: self.seed,
            output_dir: self.output_dir.clone(),
        })
    }
}
