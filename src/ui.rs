// UI layer: colored status lines, a spinner while the job is polled, and
// the voice table. Output goes to stdout; the spinner draws on stderr and
// stays hidden when stderr is not a terminal.

use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use crossterm::style::{style, Stylize};
use indicatif::{ProgressBar, ProgressStyle};

use crate::job::{AssetKind, AssetRef, JobId, JobStatus, Voice};
use crate::runner::{Outcome, Progress};

pub fn info(msg: &str) {
    for line in msg.lines() {
        println!(" {}", style(line).cyan());
    }
}

pub fn success(msg: &str) {
    for line in msg.lines() {
        println!(" {}", style(line).green());
    }
}

pub fn warning(msg: &str) {
    for line in msg.lines() {
        println!(" {}", style(line).yellow());
    }
}

pub fn error(msg: &str) {
    for line in msg.lines() {
        eprintln!(" {}", style(line).red());
    }
}

/// Renders the voice listing as a fixed-width table.
pub fn format_voices(voices: &[Voice]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nAvailable voices ({} total):\n", voices.len());
    let _ = writeln!(
        out,
        "{:<40} {:<20} {:<10} {:<15} {:<15}",
        "ID", "Name", "Gender", "Accent", "Age"
    );
    let _ = writeln!(out, "{}", "-".repeat(100));
    for voice in voices {
        let _ = writeln!(
            out,
            "{:<40} {:<20} {:<10} {:<15} {:<15}",
            voice.id,
            voice.name,
            voice.label("gender").unwrap_or("N/A"),
            voice.label("accent").unwrap_or("N/A"),
            voice.label("age").unwrap_or("N/A"),
        );
    }
    out
}

pub fn print_voices(voices: &[Voice]) {
    print!("{}", format_voices(voices));
}

pub fn report(outcome: &Outcome) {
    match outcome {
        Outcome::Downloaded { path, bytes } => {
            success(&format!("saved {} ({} bytes)", path.display(), bytes))
        }
        Outcome::NoDownloadUrl { job } => warning(&format!(
            "generation {} finished but no download URL was found",
            job
        )),
    }
}

/// Terminal progress for an interactive run.
#[derive(Default)]
pub struct Console {
    spinner: Option<ProgressBar>,
    job: Option<JobId>,
    polls: u32,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    fn start_spinner(&mut self) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::with_template("{spinner} {elapsed} {msg}") {
            spinner.set_style(template);
        }
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner.set_message("polling for response");
        self.spinner = Some(spinner);
    }
}

impl Progress for Console {
    fn uploaded(&mut self, kind: AssetKind, asset: &AssetRef) {
        success(&format!("uploaded {} {}", kind.as_str(), asset));
    }

    fn submitted(&mut self, job: &JobId) {
        info(&format!("initiated video generation {}", job));
        self.job = Some(job.clone());
        self.start_spinner();
    }

    fn polled(&mut self, status: &JobStatus) {
        self.polls += 1;
        let Some(spinner) = &self.spinner else {
            return;
        };
        match status {
            JobStatus::Pending(raw) => {
                let job = self.job.as_ref().map(|j| j.0.as_str()).unwrap_or("");
                spinner.set_message(format!("{} {} (poll {})", job, raw, self.polls));
            }
            _ => spinner.finish_and_clear(),
        }
    }

    fn downloading(&mut self, _url: &str, dest: &Path) {
        info(&format!("fetching video into {}", dest.display()));
    }
}
