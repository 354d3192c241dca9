pub mod gemini;

use async_trait::async_trait;

pub use gemini::GeminiClient;

/// One inline image sent to or received from a model call.
#[derive(Debug, Clone)]
pub struct ImagePart {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImagePart {
    /// Sniffs the MIME type from the bytes; defaults to JPEG when the
    /// signature is unrecognized, which matches what the generators emit.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let mime_type = infer::get(&bytes)
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| "image/jpeg".to_string());
        ImagePart { bytes, mime_type }
    }
}

/// Result of one image-generation call, decoded once at the API boundary.
/// Downstream code never inspects raw response parts.
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    Image(Vec<u8>),
    /// The model refused (safety filter or explicit block reason).
    Blocked(String),
    /// The response carried no image parts and no block reason.
    Empty,
}

/// Strips a single markdown code fence from a model reply. Models are told
/// to return bare JSON but routinely wrap it anyway.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Comparator verdict, decoded from the first token of the first line of
/// the comparator's free-text reply. Anything that is not a leading
/// `APPROVED` is a rejection: the gate fails closed on ambiguous output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Rejected,
}

impl Verdict {
    pub fn decode(raw: &str) -> Verdict {
        let first_token = raw
            .trim_start()
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().next())
            .unwrap_or("");
        if first_token.starts_with("APPROVED") {
            Verdict::Approved
        } else {
            Verdict::Rejected
        }
    }
}

/// Plain text completion, used by the debate roles, feature extraction and
/// description writing.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;

    /// Completion grounded in one or more images.
    async fn complete_with_images(
        &self,
        references: &[ImagePart],
        prompt: &str,
    ) -> anyhow::Result<String>;
}

/// External image generation. Errors are transport failures; a refusal is a
/// successful call returning `Blocked` or `Empty`.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(
        &self,
        references: &[ImagePart],
        prompt: &str,
    ) -> anyhow::Result<GenerationOutcome>;
}

/// External visual comparison. Returns the comparator's raw report; callers
/// decode the verdict with [`Verdict::decode`].
#[async_trait]
pub trait ImageComparator: Send + Sync {
    async fn compare(
        &self,
        references: &[ImagePart],
        candidate: &ImagePart,
        prompt: &str,
    ) -> anyhow::Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_approval() {
        assert_eq!(Verdict::decode("APPROVED"), Verdict::Approved);
        assert_eq!(Verdict::decode("APPROVED\nColor matches."), Verdict::Approved);
        assert_eq!(Verdict::decode("  APPROVED: looks right"), Verdict::Approved);
    }

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn anything_else_fails_closed() {
        assert_eq!(Verdict::decode("REJECTED\nColor mismatch"), Verdict::Rejected);
        assert_eq!(Verdict::decode(""), Verdict::Rejected);
        assert_eq!(Verdict::decode("The image is APPROVED"), Verdict::Rejected);
        assert_eq!(Verdict::decode("approved"), Verdict::Rejected);
        assert_eq!(Verdict::decode("Maybe"), Verdict::Rejected);
    }
}
