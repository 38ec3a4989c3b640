use std::{path::PathBuf, process::Stdio};

use async_trait::async_trait;
use encore_core::{ResolutionError, Resolved, Resolver};
use log::debug;
use serde::Deserialize;
use tokio::process::Command;

const YT_UNAVAILABLE: &str = "Video unavailable. This video is not available";
const YT_NOT_FOUND: &str = "Video unavailable";
const UNKNOWN_TITLE: &str = "Unknown Title";

/// Turns URLs and search queries into direct audio stream URLs using yt-dlp.
#[derive(Debug, Clone, Default)]
pub struct YtDlpResolver {
    cookies: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    url: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum YtDlpOutput {
    Playlist { entries: Vec<Entry> },
    Single(Entry),
}

impl YtDlpResolver {
    pub fn new(cookies: Option<PathBuf>) -> Self {
        Self { cookies }
    }

    fn command(&self, locator: &str) -> Command {
        let mut command = Command::new("yt-dlp");

        command
            .args(["-f", "bestaudio/best"])
            .arg("--no-playlist")
            // Plain words are searched for instead of being treated as a broken URL.
            .args(["--default-search", "ytsearch"])
            .arg("-J");

        if let Some(cookies) = &self.cookies {
            command.arg("--cookies").arg(cookies);
        }

        command
            .args(["--", locator])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        command
    }
}

#[async_trait]
impl Resolver for YtDlpResolver {
    async fn resolve(&self, locator: &str) -> Result<Resolved, ResolutionError> {
        let output = self
            .command(locator)
            .output()
            .await
            .map_err(|e| ResolutionError::Other(format!("Could not run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let resolved = parse_output(&stdout)?;

        debug!("yt-dlp resolved {} to {}", locator, resolved.title);
        Ok(resolved)
    }
}

fn parse_output(output: &str) -> Result<Resolved, ResolutionError> {
    let output: YtDlpOutput =
        serde_json::from_str(output).map_err(|e| ResolutionError::Parse(e.to_string()))?;

    // Searches and playlists only ever play their first entry.
    let entry = match output {
        YtDlpOutput::Playlist { entries } => entries.into_iter().next(),
        YtDlpOutput::Single(entry) => Some(entry),
    }
    .ok_or(ResolutionError::NotFound)?;

    let source = entry.url.ok_or(ResolutionError::NotFound)?;

    Ok(Resolved {
        source,
        title: entry.title.unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
    })
}

fn classify_failure(stderr: &str) -> ResolutionError {
    if stderr.contains(YT_UNAVAILABLE) {
        return ResolutionError::Unavailable;
    }

    if stderr.contains(YT_NOT_FOUND) {
        return ResolutionError::NotFound;
    }

    let message = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("yt-dlp exited with an error")
        .trim()
        .to_string();

    ResolutionError::Other(message)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn single_video() {
        let resolved = parse_output(
            r#"{"id": "abc", "title": "Never Gonna", "url": "https://cdn.example/audio.webm"}"#,
        )
        .expect("video is parsed");

        assert_eq!(resolved.title, "Never Gonna");
        assert_eq!(resolved.source, "https://cdn.example/audio.webm");
    }

    #[test]
    fn search_takes_the_first_entry() {
        let resolved = parse_output(
            r#"{"_type": "playlist", "entries": [
                {"url": "https://cdn.example/1.webm"},
                {"url": "https://cdn.example/2.webm", "title": "Second"}
            ]}"#,
        )
        .expect("playlist is parsed");

        assert_eq!(resolved.source, "https://cdn.example/1.webm");
        assert_eq!(resolved.title, UNKNOWN_TITLE);
    }

    #[test]
    fn empty_search_finds_nothing() {
        assert_eq!(
            parse_output(r#"{"_type": "playlist", "entries": []}"#),
            Err(ResolutionError::NotFound)
        );
    }

    #[test]
    fn missing_stream_url_finds_nothing() {
        assert_eq!(
            parse_output(r#"{"title": "No formats"}"#),
            Err(ResolutionError::NotFound)
        );
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            parse_output("WARNING: not json"),
            Err(ResolutionError::Parse(_))
        ));
    }

    #[test]
    fn failures_are_classified() {
        assert_eq!(
            classify_failure("ERROR: [youtube] abc: Video unavailable. This video is not available"),
            ResolutionError::Unavailable
        );
        assert_eq!(
            classify_failure("ERROR: [youtube] abc: Video unavailable"),
            ResolutionError::NotFound
        );
        assert_eq!(
            classify_failure("WARNING: slow\nERROR: Sign in to confirm your age\n"),
            ResolutionError::Other("ERROR: Sign in to confirm your age".into())
        );
    }
}
