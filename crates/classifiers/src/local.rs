//! On-device classification. A [`ZeroShotModel`] scores a file name against
//! the candidate labels; [`LocalClassifier`] runs it off the async runtime.

use crate::{Classifier, ProviderError, FALLBACK_LABEL};
use std::path::Path;
use std::sync::Arc;

pub trait ZeroShotModel: Send + Sync {
    fn name(&self) -> &str;

    /// Best candidate for `text`.
    fn predict(&self, text: &str, labels: &[String]) -> Result<String, ProviderError>;
}

/// Names accepted by [`load_model`].
pub const KNOWN_MODELS: &[&str] = &[ExtensionModel::NAME];

pub fn load_model(name: &str) -> Result<Arc<dyn ZeroShotModel>, ProviderError> {
    match name {
        ExtensionModel::NAME => Ok(Arc::new(ExtensionModel)),
        other => Err(ProviderError::UnknownModel(other.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Document,
    Image,
    Audio,
    Video,
    Archive,
    Code,
    Text,
}

impl Family {
    fn of(ext: &str) -> Option<Family> {
        let family = match ext {
            "pdf" | "doc" | "docx" | "odt" | "ppt" | "pptx" | "xls" | "xlsx" | "ods" | "csv"
            | "epub" => Family::Document,
            "jpg" | "jpeg" | "png" | "gif" | "heic" | "bmp" | "tif" | "tiff" | "webp" | "svg"
            | "raw" => Family::Image,
            "mp3" | "wav" | "flac" | "ogg" | "m4a" | "aac" | "opus" => Family::Audio,
            "mp4" | "mkv" | "mov" | "avi" | "webm" | "wmv" => Family::Video,
            "zip" | "rar" | "7z" | "tar" | "gz" | "bz2" | "xz" | "dmg" | "iso" => Family::Archive,
            "rs" | "py" | "js" | "ts" | "go" | "c" | "cpp" | "h" | "java" | "sh" | "rb" => {
                Family::Code
            }
            "txt" | "md" | "rtf" | "log" => Family::Text,
            _ => return None,
        };
        Some(family)
    }

    /// Candidate label spellings, most specific first.
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Family::Document => &["documents", "document", "docs", "office", "papers"],
            Family::Image => &["images", "image", "photos", "pictures", "pics"],
            Family::Audio => &["music", "audio", "sounds", "songs"],
            Family::Video => &["videos", "video", "movies"],
            Family::Archive => &["archives", "archive", "compressed"],
            Family::Code => &["code", "source", "scripts"],
            Family::Text => &["text", "notes", "documents", "docs"],
        }
    }
}

/// Deterministic zero-shot matcher keyed on the file extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtensionModel;

impl ExtensionModel {
    pub const NAME: &'static str = "extension";
}

impl ZeroShotModel for ExtensionModel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn predict(&self, text: &str, labels: &[String]) -> Result<String, ProviderError> {
        let ext = Path::new(text)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        let matched = Family::of(&ext).and_then(|family| {
            family.aliases().iter().find_map(|alias| {
                labels
                    .iter()
                    .find(|label| label.trim().eq_ignore_ascii_case(alias))
            })
        });
        Ok(matched
            .or_else(|| {
                labels
                    .iter()
                    .find(|l| l.eq_ignore_ascii_case(FALLBACK_LABEL))
            })
            .cloned()
            .unwrap_or_else(|| FALLBACK_LABEL.to_string()))
    }
}

#[derive(Clone, Default)]
pub struct LocalClassifier {
    model: Option<Arc<dyn ZeroShotModel>>,
}

impl LocalClassifier {
    pub fn new(model: Arc<dyn ZeroShotModel>) -> Self {
        Self { model: Some(model) }
    }

    /// Classifier whose model failed to load or was never configured.
    pub fn unloaded() -> Self {
        Self { model: None }
    }
}

#[async_trait::async_trait]
impl Classifier for LocalClassifier {
    fn name(&self) -> &str {
        self.model.as_ref().map(|m| m.name()).unwrap_or("local")
    }

    async fn classify(
        &self,
        file_names: &[String],
        labels: &[String],
    ) -> Result<Vec<String>, ProviderError> {
        let model = self.model.clone().ok_or(ProviderError::Unavailable)?;
        let file_names = file_names.to_vec();
        let labels = labels.to_vec();
        tokio::task::spawn_blocking(move || {
            file_names
                .iter()
                .map(|name| model.predict(name, &labels))
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| ProviderError::RequestFailed(format!("local inference aborted: {e}")))?
    }
}
