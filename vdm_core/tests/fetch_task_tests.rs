use async_trait::async_trait;

use vdm_core::engine::{
    EngineError, EngineOptions, EngineOutcome, MediaEngine, MediaMetadata, ProgressHook, Rendition,
};
use vdm_core::tasks::fetch_task::collect_format_options;
use vdm_core::tasks::FetchTask;
use vdm_core::types::{FetchError, SourceUrl};

/// Engine that answers every metadata call with a fixed rendition list.
struct StaticEngine {
    renditions: Vec<Rendition>,
}

#[async_trait]
impl MediaEngine for StaticEngine {
    async fn extract_metadata(&self, _source: &SourceUrl) -> Result<MediaMetadata, EngineError> {
        Ok(MediaMetadata {
            title: "a video".to_string(),
            is_collection: false,
            renditions: self.renditions.clone(),
        })
    }

    async fn download(
        &self,
        _source: &SourceUrl,
        _options: &EngineOptions,
        _on_progress: &ProgressHook<'_>,
    ) -> Result<EngineOutcome, EngineError> {
        unreachable!("fetch tests never download")
    }
}

struct FailingEngine;

#[async_trait]
impl MediaEngine for FailingEngine {
    async fn extract_metadata(&self, _source: &SourceUrl) -> Result<MediaMetadata, EngineError> {
        Err(EngineError::Process("HTTP Error 403".to_string()))
    }

    async fn download(
        &self,
        _source: &SourceUrl,
        _options: &EngineOptions,
        _on_progress: &ProgressHook<'_>,
    ) -> Result<EngineOutcome, EngineError> {
        unreachable!("fetch tests never download")
    }
}

fn rendition(
    format_id: &str,
    quality: Option<&str>,
    container: Option<&str>,
    size_bytes: Option<u64>,
) -> Rendition {
    Rendition {
        format_id: format_id.to_string(),
        quality_label: quality.map(str::to_string),
        container: container.map(str::to_string),
        size_bytes,
    }
}

#[test]
fn accepts_known_video_hosts() {
    for raw in [
        "https://www.youtube.com/watch?v=abc123",
        "https://youtube.com/watch?v=abc123",
        "https://m.youtube.com/watch?v=abc123",
        "https://youtu.be/abc123",
        "http://youtu.be/abc123",
        "  https://youtu.be/abc123  ",
    ] {
        let parsed = SourceUrl::parse(raw);
        assert!(parsed.is_ok(), "{raw} should be accepted");
        assert_eq!(parsed.unwrap().as_str(), raw.trim());
    }
}

#[test]
fn rejects_unknown_hosts_schemes_and_garbage() {
    for raw in [
        "https://vimeo.com/12345",
        "https://evil.youtube.com.example.com/watch",
        "ftp://youtube.com/watch?v=abc",
        "youtube.com/watch?v=abc",
        "not a url",
        "",
    ] {
        assert_eq!(SourceUrl::parse(raw), Err(FetchError::InvalidSource), "{raw:?}");
    }
}

#[test]
fn from_raw_fails_before_any_engine_call() {
    assert!(matches!(FetchTask::from_raw("https://vimeo.com/1"), Err(FetchError::InvalidSource)));
}

#[test]
fn filters_to_allowed_tiers_with_known_container() {
    let renditions = vec![
        rendition("251", None, Some("webm"), Some(1 << 20)), // audio only, no tier
        rendition("136", Some("720p"), Some("mp4"), Some(50 << 20)),
        rendition("602", Some("144p60"), Some("mp4"), Some(1 << 20)), // not an exact tier
        rendition("616", Some("1080p"), None, Some(90 << 20)),        // container unknown
        rendition("598", Some("144p"), Some("webm"), Some(1 << 20)),
    ];
    let options = collect_format_options(&renditions);
    let ids: Vec<&str> = options.iter().map(|o| o.format_id.as_str()).collect();
    assert_eq!(ids, vec!["598", "136"]);
}

#[test]
fn sorts_ascending_by_tier() {
    let renditions = vec![
        rendition("313", Some("2160p"), Some("webm"), Some(900 << 20)),
        rendition("134", Some("360p"), Some("mp4"), Some(10 << 20)),
        rendition("137", Some("1080p"), Some("mp4"), Some(80 << 20)),
    ];
    let tiers: Vec<u32> = collect_format_options(&renditions).iter().map(|o| o.tier).collect();
    assert_eq!(tiers, vec![360, 1080, 2160]);
}

#[test]
fn labels_carry_tier_container_and_size() {
    let renditions = vec![rendition("136", Some("720p"), Some("mp4"), Some(1024 * 1024))];
    let options = collect_format_options(&renditions);
    assert_eq!(options[0].label, "720p (MP4) (1.00 MB)");
}

#[test]
fn unknown_or_zero_size_is_labelled_as_such() {
    let renditions = vec![
        rendition("136", Some("720p"), Some("mp4"), None),
        rendition("137", Some("1080p"), Some("mp4"), Some(0)),
    ];
    let options = collect_format_options(&renditions);
    assert_eq!(options[0].label, "720p (MP4) (Unknown size)");
    assert_eq!(options[1].label, "1080p (MP4) (Unknown size)");
}

#[tokio::test]
async fn run_returns_filtered_options() {
    let engine = StaticEngine {
        renditions: vec![
            rendition("136", Some("720p"), Some("mp4"), Some(3 << 20)),
            rendition("251", None, Some("webm"), Some(1 << 20)),
        ],
    };
    let task = FetchTask::from_raw("https://youtu.be/abc123").unwrap();
    let options = task.run(&engine).await.unwrap();
    assert_eq!(options.len(), 1);
    assert_eq!(options[0].format_id, "136");
}

#[tokio::test]
async fn run_maps_engine_failures() {
    let task = FetchTask::from_raw("https://youtu.be/abc123").unwrap();
    let err = task.run(&FailingEngine).await.unwrap_err();
    assert!(matches!(err, FetchError::NetworkOrExtraction(ref m) if m.contains("403")));
}

#[tokio::test]
async fn run_passes_empty_lists_through() {
    let engine = StaticEngine { renditions: vec![] };
    let task = FetchTask::from_raw("https://youtu.be/abc123").unwrap();
    assert!(task.run(&engine).await.unwrap().is_empty());
}
