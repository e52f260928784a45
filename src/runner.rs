// The job workflow: upload inputs, submit one generation, poll its status
// on a fixed interval, then download the result.
//
// Everything is sequential and blocking. The only pause is between two
// status polls; there is no timeout and no retry, so a job the service
// never finishes keeps the loop running until the process is killed.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::api::VideoApi;
use crate::error::{Error, Result};
use crate::job::{
    AspectRatio, AssetKind, AssetRef, AudioSource, GenerationRequest, ImageSource, JobId,
    JobStatus, Resolution,
};

/// Fixed delay between two status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq)]
pub enum AudioInput {
    File(PathBuf),
    Speech { voice_id: String, text: String },
}

impl AudioInput {
    pub fn file(&self) -> Option<&Path> {
        match self {
            AudioInput::File(path) => Some(path),
            AudioInput::Speech { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ImageInput {
    File(PathBuf),
    Prompt(String),
}

impl ImageInput {
    pub fn file(&self) -> Option<&Path> {
        match self {
            ImageInput::File(path) => Some(path),
            ImageInput::Prompt(_) => None,
        }
    }
}

/// A validated job, ready to run. Built by `Cli::plan`.
#[derive(Clone, Debug, PartialEq)]
pub struct JobPlan {
    pub aspect_ratio: AspectRatio,
    pub audio: AudioInput,
    pub image: ImageInput,
    pub resolution: Option<Resolution>,
    pub text_prompt: Option<String>,
    pub model_id: Option<String>,
    pub duration: Option<f64>,
    pub seed: Option<i64>,
    pub output_dir: PathBuf,
}

/// How a run ended when it did not fail.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Downloaded { path: PathBuf, bytes: u64 },
    /// The job completed but the service gave no URL to fetch.
    NoDownloadUrl { job: JobId },
}

/// Hooks for reporting progress. `wait` is also where the runner sleeps,
/// so tests can count polls without waiting.
pub trait Progress {
    fn uploaded(&mut self, _kind: AssetKind, _asset: &AssetRef) {}
    fn submitted(&mut self, _job: &JobId) {}
    fn polled(&mut self, _status: &JobStatus) {}
    fn downloading(&mut self, _url: &str, _dest: &Path) {}

    fn wait(&mut self, interval: Duration) {
        thread::sleep(interval);
    }
}

/// Progress sink that only sleeps.
pub struct Quiet;

impl Progress for Quiet {}

/// Runs one job end to end with the default poll interval.
pub fn run<A: VideoApi>(api: &A, plan: &JobPlan, progress: &mut dyn Progress) -> Result<Outcome> {
    run_with_interval(api, plan, POLL_INTERVAL, progress)
}

pub fn run_with_interval<A: VideoApi>(
    api: &A,
    plan: &JobPlan,
    interval: Duration,
    progress: &mut dyn Progress,
) -> Result<Outcome> {
    let image = match &plan.image {
        ImageInput::File(path) => {
            let asset = api.upload(AssetKind::Image, path, plan.aspect_ratio)?;
            debug!("uploaded image {}", asset);
            progress.uploaded(AssetKind::Image, &asset);
            ImageSource::Uploaded(asset)
        }
        ImageInput::Prompt(prompt) => ImageSource::Prompt(prompt.clone()),
    };

    let audio = match &plan.audio {
        AudioInput::File(path) => {
            let asset = api.upload(AssetKind::Audio, path, plan.aspect_ratio)?;
            debug!("uploaded audio {}", asset);
            progress.uploaded(AssetKind::Audio, &asset);
            AudioSource::Uploaded(asset)
        }
        AudioInput::Speech { voice_id, text } => {
            debug!("using text-to-speech with voice {}", voice_id);
            AudioSource::TextToSpeech {
                voice_id: voice_id.clone(),
                text: text.clone(),
            }
        }
    };

    let request = GenerationRequest {
        aspect_ratio: plan.aspect_ratio,
        audio,
        image,
        resolution: plan.resolution,
        text_prompt: plan.text_prompt.clone(),
        model_id: plan.model_id.clone(),
        duration: plan.duration,
        seed: plan.seed,
    };

    let job = api.submit(&request)?;
    debug!("submitted generation {}", job);
    progress.submitted(&job);

    let status = poll(api, &job, interval, progress)?;
    finish(api, job, status, &plan.output_dir, progress)
}

/// Polls until a terminal status, one request per interval.
fn poll<A: VideoApi>(
    api: &A,
    job: &JobId,
    interval: Duration,
    progress: &mut dyn Progress,
) -> Result<JobStatus> {
    loop {
        let status = api.status(job)?;
        progress.polled(&status);
        if status.is_terminal() {
            return Ok(status);
        }
        progress.wait(interval);
    }
}

fn finish<A: VideoApi>(
    api: &A,
    job: JobId,
    status: JobStatus,
    output_dir: &Path,
    progress: &mut dyn Progress,
) -> Result<Outcome> {
    match status {
        JobStatus::Complete {
            download_url: Some(url),
            asset_id,
        } => {
            let stem = asset_id.unwrap_or_else(|| job.0.clone());
            let dest = output_dir.join(format!("{}.mp4", stem));
            debug!("generation complete, downloading {} to {}", url, dest.display());
            progress.downloading(&url, &dest);
            let bytes = api.download(&url, &dest)?;
            Ok(Outcome::Downloaded { path: dest, bytes })
        }
        JobStatus::Complete {
            download_url: None, ..
        } => {
            warn!("generation {} completed but no download URL was found", job);
            Ok(Outcome::NoDownloadUrl { job })
        }
        JobStatus::Failed { message } => Err(Error::JobFailed {
            job: job.0,
            message,
        }),
        JobStatus::Pending(raw) => Err(Error::Decode {
            action: "poll status",
            detail: format!("non-terminal status `{}` after polling", raw),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Voice;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::fs;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Upload(AssetKind, PathBuf),
        Submit(GenerationRequest),
        Status(String),
        Download(String, PathBuf),
    }

    #[derive(Default)]
    struct FakeApi {
        calls: RefCell<Vec<Call>>,
        statuses: RefCell<VecDeque<JobStatus>>,
        fail_upload: Option<AssetKind>,
        body: Vec<u8>,
    }

    impl FakeApi {
        fn with_statuses(statuses: Vec<JobStatus>) -> Self {
            FakeApi {
                statuses: RefCell::new(statuses.into()),
                body: b"video-bytes".to_vec(),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }
    }

    impl VideoApi for FakeApi {
        fn upload(&self, kind: AssetKind, path: &Path, _: AspectRatio) -> Result<AssetRef> {
            self.calls.borrow_mut().push(Call::Upload(kind, path.to_path_buf()));
            if self.fail_upload == Some(kind) {
                return Err(Error::Http {
                    action: "upload asset",
                    status: 500,
                    body: "boom".into(),
                });
            }
            Ok(AssetRef(format!("{}-asset", kind.as_str())))
        }

        fn submit(&self, request: &GenerationRequest) -> Result<JobId> {
            self.calls.borrow_mut().push(Call::Submit(request.clone()));
            Ok(JobId("job-1".into()))
        }

        fn status(&self, job: &JobId) -> Result<JobStatus> {
            self.calls.borrow_mut().push(Call::Status(job.0.clone()));
            Ok(self
                .statuses
                .borrow_mut()
                .pop_front()
                .expect("polled past the scripted statuses"))
        }

        fn download(&self, url: &str, dest: &Path) -> Result<u64> {
            self.calls
                .borrow_mut()
                .push(Call::Download(url.to_string(), dest.to_path_buf()));
            fs::write(dest, &self.body).map_err(|e| Error::io(dest, e))?;
            Ok(self.body.len() as u64)
        }

        fn list_voices(&self) -> Result<Vec<Voice>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct Recorder {
        waits: Vec<Duration>,
        polled: usize,
    }

    impl Progress for Recorder {
        fn polled(&mut self, _status: &JobStatus) {
            self.polled += 1;
        }

        fn wait(&mut self, interval: Duration) {
            self.waits.push(interval);
        }
    }

    fn plan(output_dir: &Path) -> JobPlan {
        JobPlan {
            aspect_ratio: AspectRatio::Square,
            audio: AudioInput::File("line.mp3".into()),
            image: ImageInput::File("face.png".into()),
            resolution: Some(Resolution::Sd540),
            text_prompt: Some("talking".into()),
            model_id: None,
            duration: Some(3.0),
            seed: Some(9),
            output_dir: output_dir.to_path_buf(),
        }
    }

    fn pending(n: usize) -> Vec<JobStatus> {
        (0..n).map(|_| JobStatus::Pending("processing".into())).collect()
    }

    #[test]
    fn polls_once_per_interval_then_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut statuses = pending(3);
        statuses.push(JobStatus::Complete {
            download_url: Some("https://cdn/v.mp4".into()),
            asset_id: Some("asset-77".into()),
        });
        let api = FakeApi::with_statuses(statuses);
        let mut rec = Recorder::default();

        let outcome = run(&api, &plan(dir.path()), &mut rec).unwrap();

        let dest = dir.path().join("asset-77.mp4");
        assert_eq!(
            outcome,
            Outcome::Downloaded {
                path: dest.clone(),
                bytes: 11
            }
        );
        assert_eq!(fs::read(&dest).unwrap(), b"video-bytes");
        assert_eq!(rec.polled, 4);
        assert_eq!(rec.waits, vec![POLL_INTERVAL; 3]);

        let calls = api.calls();
        assert_eq!(calls[0], Call::Upload(AssetKind::Image, "face.png".into()));
        assert_eq!(calls[1], Call::Upload(AssetKind::Audio, "line.mp3".into()));
        match &calls[2] {
            Call::Submit(req) => {
                assert_eq!(req.image, ImageSource::Uploaded(AssetRef("image-asset".into())));
                assert_eq!(req.audio, AudioSource::Uploaded(AssetRef("audio-asset".into())));
                assert_eq!(req.duration, Some(3.0));
                assert_eq!(req.seed, Some(9));
            }
            other => panic!("expected submit, got {:?}", other),
        }
        assert_eq!(
            calls.iter().filter(|c| matches!(c, Call::Status(_))).count(),
            4
        );
        assert_eq!(
            calls.last(),
            Some(&Call::Download("https://cdn/v.mp4".into(), dest))
        );
    }

    #[test]
    fn file_is_named_after_job_without_asset_id() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::with_statuses(vec![JobStatus::Complete {
            download_url: Some("https://cdn/v.mp4".into()),
            asset_id: None,
        }]);
        let mut rec = Recorder::default();

        let outcome = run(&api, &plan(dir.path()), &mut rec).unwrap();
        assert!(matches!(outcome, Outcome::Downloaded { ref path, .. }
            if path == &dir.path().join("job-1.mp4")));
        assert!(rec.waits.is_empty());
    }

    #[test]
    fn failed_job_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut statuses = pending(1);
        statuses.push(JobStatus::Failed {
            message: "face not detected".into(),
        });
        let api = FakeApi::with_statuses(statuses);

        let err = run(&api, &plan(dir.path()), &mut Recorder::default()).unwrap_err();
        assert!(matches!(err, Error::JobFailed { ref message, .. } if message == "face not detected"));
        assert!(!api.calls().iter().any(|c| matches!(c, Call::Download(..))));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn completion_without_url_warns() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::with_statuses(vec![JobStatus::Complete {
            download_url: None,
            asset_id: Some("a".into()),
        }]);

        let outcome = run(&api, &plan(dir.path()), &mut Recorder::default()).unwrap();
        assert_eq!(
            outcome,
            Outcome::NoDownloadUrl {
                job: JobId("job-1".into())
            }
        );
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn failed_upload_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi {
            fail_upload: Some(AssetKind::Image),
            ..FakeApi::with_statuses(Vec::new())
        };

        let err = run(&api, &plan(dir.path()), &mut Recorder::default()).unwrap_err();
        assert!(matches!(err, Error::Http { status: 500, .. }));
        assert_eq!(
            api.calls(),
            vec![Call::Upload(AssetKind::Image, "face.png".into())]
        );
    }

    #[test]
    fn speech_and_prompt_skip_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::with_statuses(vec![JobStatus::Complete {
            download_url: Some("u".into()),
            asset_id: None,
        }]);
        let mut plan = plan(dir.path());
        plan.audio = AudioInput::Speech {
            voice_id: "v".into(),
            text: "hello".into(),
        };
        plan.image = ImageInput::Prompt("a lighthouse".into());

        run(&api, &plan, &mut Recorder::default()).unwrap();

        let calls = api.calls();
        assert!(!calls.iter().any(|c| matches!(c, Call::Upload(..))));
        match &calls[0] {
            Call::Submit(req) => {
                assert_eq!(
                    req.audio,
                    AudioSource::TextToSpeech {
                        voice_id: "v".into(),
                        text: "hello".into()
                    }
                );
                assert_eq!(req.image, ImageSource::Prompt("a lighthouse".into()));
            }
            other => panic!("expected submit, got {:?}", other),
        }
    }
}
