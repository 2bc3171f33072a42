use crate::engine::media_engine::{MediaEngine, Rendition};
use crate::types::types::{FetchError, FormatOption, SourceUrl};

/// Resolution tiers a rendition must advertise to be offered to the user.
pub const ALLOWED_TIERS: [&str; 8] =
    ["144p", "240p", "360p", "480p", "720p", "1080p", "1440p", "2160p"];

/// One-shot metadata fetch: asks the engine for the rendition list of a
/// single source and normalizes it into selectable `FormatOption`s.
pub struct FetchTask {
    source: SourceUrl,
}

impl FetchTask {
    /// Validates the raw descriptor up front. Malformed input fails here,
    /// before any engine call.
    pub fn from_raw(raw: &str) -> Result<Self, FetchError> {
        Ok(Self { source: SourceUrl::parse(raw)? })
    }

    pub fn new(source: SourceUrl) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &SourceUrl {
        &self.source
    }

    /// Calls the engine exactly once and filters the result.
    ///
    /// An empty list is not an error at this layer; the controller decides
    /// what an empty list means for the caller.
    pub async fn run<E>(&self, engine: &E) -> Result<Vec<FormatOption>, FetchError>
    where
        E: MediaEngine + ?Sized,
    {
        let metadata = engine
            .extract_metadata(&self.source)
            .await
            .map_err(|e| FetchError::NetworkOrExtraction(e.to_string()))?;
        log::debug!(
            "{}: {} raw renditions reported for \"{}\"",
            self.source,
            metadata.renditions.len(),
            metadata.title
        );
        Ok(collect_format_options(&metadata.renditions))
    }
}

/// Keeps renditions whose quality label is an allowed tier and whose
/// container is known, labels them, and sorts ascending by tier.
pub fn collect_format_options(renditions: &[Rendition]) -> Vec<FormatOption> {
    let mut options: Vec<FormatOption> = renditions.iter().filter_map(format_option).collect();
    options.sort_by_key(|option| option.tier);
    options
}

fn format_option(rendition: &Rendition) -> Option<FormatOption> {
    let quality = rendition.quality_label.as_deref()?;
    if !ALLOWED_TIERS.contains(&quality) {
        return None;
    }
    let container = rendition.container.as_deref()?;
    let tier: u32 = quality.strip_suffix('p')?.parse().ok()?;
    let size = match rendition.size_bytes {
        Some(bytes) if bytes > 0 => format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0)),
        _ => "Unknown size".to_string(),
    };
    Some(FormatOption {
        label: format!("{} ({}) ({})", quality, container.to_uppercase(), size),
        format_id: rendition.format_id.clone(),
        tier,
    })
}
