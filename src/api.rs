// API client module: a small blocking HTTP client for the video
// generation service. Every service call goes through `request`, which
// joins the configured base URL with a relative path; the API key and the
// optional canary header ride along as default headers. Presigned
// download URLs are fetched with a second client that carries no
// credentials.

use std::fs::File;
use std::path::Path;

use log::{debug, error};
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::job::{
    AspectRatio, AssetKind, AssetRef, AudioSource, GenerationRequest, ImageSource, JobId,
    JobStatus, Service, Voice,
};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const CANARY_HEADER: &str = "enable-canary";

/// Seed sent with legacy image prompts when none is given.
const LEGACY_DEFAULT_SEED: i64 = 1;

/// The calls the runner needs from the remote service.
///
/// `ApiClient` is the real implementation; tests substitute an in-memory
/// one to observe the exact call sequence.
pub trait VideoApi {
    fn upload(&self, kind: AssetKind, path: &Path, aspect_ratio: AspectRatio) -> Result<AssetRef>;
    fn submit(&self, request: &GenerationRequest) -> Result<JobId>;
    fn status(&self, job: &JobId) -> Result<JobStatus>;
    /// Streams `url` into `dest`, returning the number of bytes written.
    fn download(&self, url: &str, dest: &Path) -> Result<u64>;
    fn list_voices(&self) -> Result<Vec<Voice>>;
}

/// Blocking client bound to one base URL and one dialect.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    plain: Client,
    base_url: String,
    service: Service,
}

impl ApiClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(&settings.api_key)
            .map_err(|_| Error::config("API key contains characters not allowed in a header"))?;
        key.set_sensitive(true);
        headers.insert(HeaderName::from_static(API_KEY_HEADER), key);
        if settings.canary {
            headers.insert(
                HeaderName::from_static(CANARY_HEADER),
                HeaderValue::from_static("True"),
            );
        }

        // No timeout: uploads, downloads and the server itself set the pace.
        let client = Client::builder()
            .default_headers(headers)
            .timeout(None)
            .build()?;
        let plain = Client::builder().timeout(None).build()?;

        Ok(ApiClient {
            client,
            plain,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            service: settings.service,
        })
    }

    pub fn service(&self) -> Service {
        self.service
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);
        self.client.request(method, url)
    }

    /// First model advertised by the service.
    fn default_model(&self) -> Result<String> {
        let res = check(self.request(Method::GET, "/models").send()?, "list models")?;
        let models: Value = res.json()?;
        models
            .get(0)
            .and_then(|m| m.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Decode {
                action: "list models",
                detail: "no model id in response".into(),
            })
    }

    fn upload_public(&self, kind: AssetKind, path: &Path) -> Result<AssetRef> {
        let name = file_name(path);
        let res = self
            .request(Method::POST, "/assets")
            .json(&serde_json::json!({ "name": name, "type": kind.as_str() }))
            .send()?;
        let created: Value = check(res, "create asset")?.json()?;
        let id = str_field(&created, "id", "create asset")?;

        let form = file_form(path)?;
        let res = self
            .request(Method::POST, &format!("/assets/{}/upload", id))
            .multipart(form)
            .send()?;
        check(res, "upload asset")?;
        Ok(AssetRef(id))
    }

    fn upload_legacy(
        &self,
        kind: AssetKind,
        path: &Path,
        aspect_ratio: AspectRatio,
    ) -> Result<AssetRef> {
        let form = file_form(path)?;
        let req = match kind {
            AssetKind::Image => self
                .request(Method::POST, "/v1/portrait")
                .query(&[("aspect_ratio", aspect_ratio.as_str())]),
            AssetKind::Audio => self.request(Method::POST, "/v1/audio"),
        };
        let body: Value = check(req.multipart(form).send()?, "upload asset")?.json()?;
        Ok(AssetRef(str_field(&body, "url", "upload asset")?))
    }
}

impl VideoApi for ApiClient {
    fn upload(&self, kind: AssetKind, path: &Path, aspect_ratio: AspectRatio) -> Result<AssetRef> {
        match self.service {
            Service::Public => self.upload_public(kind, path),
            Service::Legacy => self.upload_legacy(kind, path, aspect_ratio),
        }
    }

    fn submit(&self, request: &GenerationRequest) -> Result<JobId> {
        let (path, body, id_field) = match self.service {
            Service::Public => {
                let model_id = match &request.model_id {
                    Some(id) => id.clone(),
                    None => self.default_model()?,
                };
                debug!("using model {}", model_id);
                let body = serde_json::to_value(public_body(request, &model_id)?)
                    .map_err(|e| Error::config(e.to_string()))?;
                ("/generations", body, "id")
            }
            Service::Legacy => {
                let body = serde_json::to_value(legacy_body(request))
                    .map_err(|e| Error::config(e.to_string()))?;
                ("/v1/characters", body, "jobId")
            }
        };

        let res = self.request(Method::POST, path).json(&body).send()?;
        let submitted: Value = check(res, "submit generation")?.json()?;
        debug!("submission response {}", submitted);
        Ok(JobId(str_field(&submitted, id_field, "submit generation")?))
    }

    fn status(&self, job: &JobId) -> Result<JobStatus> {
        let path = match self.service {
            Service::Public => format!("/generations/{}/status", job),
            Service::Legacy => format!("/v1/projects/{}", job),
        };
        let body: Value = check(self.request(Method::GET, &path).send()?, "poll status")?.json()?;
        debug!("status response {}", body);
        parse_status(self.service, &body)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut res = check(self.plain.get(url).send()?, "download video")?;
        let mut file = File::create(dest).map_err(|e| Error::io(dest, e))?;
        std::io::copy(&mut res, &mut file).map_err(|e| Error::io(dest, e))
    }

    fn list_voices(&self) -> Result<Vec<Voice>> {
        let path = match self.service {
            Service::Public => "/voices",
            Service::Legacy => "/v1/voices",
        };
        let body: Value = check(self.request(Method::GET, path).send()?, "list voices")?.json()?;
        parse_voices(body)
    }
}

/// Turns a non-success response into `Error::Http`, logging status and body.
fn check(res: Response, action: &'static str) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().unwrap_or_default();
    error!("{} failed: {} {}", action, status.as_u16(), body);
    Err(Error::Http {
        action,
        status: status.as_u16(),
        body,
    })
}

fn str_field(body: &Value, field: &str, action: &'static str) -> Result<String> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::Decode {
            action,
            detail: format!("missing `{}` in {}", field, body),
        })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".into())
}

fn file_form(path: &Path) -> Result<multipart::Form> {
    multipart::Form::new()
        .file("file", path)
        .map_err(|e| Error::io(path, e))
}

#[derive(Debug, Serialize)]
struct PublicGeneration<'a> {
    r#type: &'static str,
    ai_model_id: &'a str,
    start_keyframe_id: &'a str,
    generated_video_inputs: VideoInputs<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_generation: Option<SpeechGeneration<'a>>,
}

#[derive(Debug, Serialize)]
struct VideoInputs<'a> {
    text_prompt: &'a str,
    resolution: &'static str,
    aspect_ratio: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SpeechGeneration<'a> {
    r#type: &'static str,
    voice_id: &'a str,
    text: &'a str,
}

fn public_body<'a>(
    request: &'a GenerationRequest,
    model_id: &'a str,
) -> Result<PublicGeneration<'a>> {
    let start_keyframe_id = match &request.image {
        ImageSource::Uploaded(asset) => asset.0.as_str(),
        ImageSource::Prompt(_) => {
            return Err(Error::config(
                "the public service needs an uploaded image, not an image prompt",
            ))
        }
    };
    let text_prompt = request
        .text_prompt
        .as_deref()
        .ok_or_else(|| Error::config("the public service needs --text-prompt"))?;
    let resolution = request
        .resolution
        .ok_or_else(|| Error::config("the public service needs --resolution"))?;

    let (audio_id, audio_generation) = match &request.audio {
        AudioSource::Uploaded(asset) => (Some(asset.0.as_str()), None),
        AudioSource::TextToSpeech { voice_id, text } => (
            None,
            Some(SpeechGeneration {
                r#type: "text_to_speech",
                voice_id,
                text,
            }),
        ),
    };

    Ok(PublicGeneration {
        r#type: "video",
        ai_model_id: model_id,
        start_keyframe_id,
        generated_video_inputs: VideoInputs {
            text_prompt,
            resolution: resolution.as_str(),
            aspect_ratio: request.aspect_ratio.as_str(),
            duration_ms: request.duration.map(|secs| (secs * 1000.0) as u64),
            seed: request.seed,
        },
        audio_id,
        audio_generation,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LegacyCharacter<'a> {
    aspect_ratio: &'static str,
    audio_source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_image_input: Option<AvatarImageInput<'a>>,
}

#[derive(Debug, Serialize)]
struct AvatarImageInput<'a> {
    seed: i64,
    prompt: &'a str,
}

fn legacy_body(request: &GenerationRequest) -> LegacyCharacter<'_> {
    let mut body = LegacyCharacter {
        aspect_ratio: request.aspect_ratio.as_str(),
        audio_source: "audio",
        voice_url: None,
        text: None,
        voice_id: None,
        avatar_image: None,
        avatar_image_input: None,
    };
    match &request.audio {
        AudioSource::Uploaded(asset) => body.voice_url = Some(asset.0.as_str()),
        AudioSource::TextToSpeech { voice_id, text } => {
            body.audio_source = "tts";
            body.text = Some(text.as_str());
            body.voice_id = Some(voice_id.as_str());
        }
    }
    match &request.image {
        ImageSource::Uploaded(asset) => body.avatar_image = Some(asset.0.as_str()),
        ImageSource::Prompt(prompt) => {
            body.avatar_image_input = Some(AvatarImageInput {
                seed: request.seed.unwrap_or(LEGACY_DEFAULT_SEED),
                prompt,
            })
        }
    }
    body
}

/// Maps a status payload onto `JobStatus` using the dialect's vocabulary.
pub fn parse_status(service: Service, body: &Value) -> Result<JobStatus> {
    let status = str_field(body, "status", "poll status")?;
    let text = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);

    let parsed = match (service, status.as_str()) {
        (Service::Public, "complete") => JobStatus::Complete {
            download_url: text("download_url").or_else(|| text("url")),
            asset_id: text("asset_id"),
        },
        (Service::Public, "error") => JobStatus::Failed {
            message: text("error_message").unwrap_or_else(|| "Unknown error".into()),
        },
        (Service::Legacy, "Completed") => JobStatus::Complete {
            download_url: text("videoUrl"),
            asset_id: None,
        },
        (Service::Legacy, "Failed") => JobStatus::Failed {
            message: text("errorMessage").unwrap_or_else(|| body.to_string()),
        },
        _ => JobStatus::Pending(status),
    };
    Ok(parsed)
}

/// Accepts either a bare array or an object wrapping it under `voices`.
fn parse_voices(body: Value) -> Result<Vec<Voice>> {
    let list = match body {
        Value::Array(_) => body,
        Value::Object(mut map) => map.remove("voices").ok_or_else(|| Error::Decode {
            action: "list voices",
            detail: "expected an array of voices".into(),
        })?,
        other => {
            return Err(Error::Decode {
                action: "list voices",
                detail: format!("expected an array of voices, got {}", other),
            })
        }
    };
    serde_json::from_value(list).map_err(|e| Error::Decode {
        action: "list voices",
        detail: e.to_string(),
    })
}
