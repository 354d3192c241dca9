//! Per-view generate/validate loop. Each view gets an independent attempt
//! budget; everything that can go wrong inside an attempt (blocked
//! generation, empty response, transport error, rejected validation)
//! consumes the attempt and never escapes the loop.

use std::time::Duration;

use tracing::{info, warn};

use crate::llm::{GenerationOutcome, ImageComparator, ImageGenerator, ImagePart, Verdict};
use crate::taxonomy::Angle;
use crate::utils::image::crop_to_4_5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Main,
    Side,
    Back,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            View::Main => "main",
            View::Side => "side",
            View::Back => "back",
        }
    }

    pub fn angle(self) -> Angle {
        match self {
            View::Main => Angle::Front,
            View::Side => Angle::Side,
            View::Back => Angle::Back,
        }
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one view loop needs. Prompts and references are prepared by
/// the product orchestrator; the loop itself is view-agnostic.
pub struct ViewRequest<'a> {
    pub view: View,
    pub generation_prompt: &'a str,
    pub validation_prompt: &'a str,
    pub generation_references: &'a [ImagePart],
    pub validation_references: &'a [ImagePart],
    pub max_attempts: u32,
    pub pause: Duration,
}

#[derive(Debug, Clone)]
pub enum ViewOutcome {
    /// Cropped, validated image bytes plus the comparator's full report.
    Accepted { bytes: Vec<u8>, report: String },
    /// Budget exhausted. Carries the last reason so the product result can
    /// explain the gap.
    Abandoned { attempts: u32, last_rejection: String },
}

impl ViewOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ViewOutcome::Accepted { .. })
    }
}

/// Runs one view to acceptance or abandonment.
///
/// A flat pause follows every external call, success or not; upstream rate
/// limits are paced rather than probed.
pub async fn run_view(
    generator: &dyn ImageGenerator,
    comparator: &dyn ImageComparator,
    request: ViewRequest<'_>,
) -> ViewOutcome {
    let mut last_rejection = String::new();

    for attempt in 1..=request.max_attempts {
        info!(
            "[{}] attempt {}/{}: generating",
            request.view, attempt, request.max_attempts
        );

        let generated = generator
            .generate(request.generation_references, request.generation_prompt)
            .await;
        tokio::time::sleep(request.pause).await;

        let raw_bytes = match generated {
            Ok(GenerationOutcome::Image(bytes)) => bytes,
            Ok(GenerationOutcome::Blocked(reason)) => {
                warn!("[{}] generation blocked: {reason}", request.view);
                last_rejection = format!("generation blocked: {reason}");
                continue;
            }
            Ok(GenerationOutcome::Empty) => {
                warn!("[{}] generation returned no image", request.view);
                last_rejection = "generation returned no image".to_string();
                continue;
            }
            Err(err) => {
                warn!("[{}] generation failed: {err:#}", request.view);
                last_rejection = format!("generation failed: {err:#}");
                continue;
            }
        };

        let bytes = match crop_to_4_5(&raw_bytes) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("[{}] generated image is undecodable: {err:#}", request.view);
                last_rejection = format!("generated image is undecodable: {err:#}");
                continue;
            }
        };

        info!("[{}] attempt {}: validating", request.view, attempt);
        let candidate = ImagePart::from_bytes(bytes.clone());
        let compared = comparator
            .compare(request.validation_references, &candidate, request.validation_prompt)
            .await;
        tokio::time::sleep(request.pause).await;

        let report = match compared {
            Ok(report) => report,
            Err(err) => {
                warn!("[{}] validation failed: {err:#}", request.view);
                last_rejection = format!("validation failed: {err:#}");
                continue;
            }
        };

        match Verdict::decode(&report) {
            Verdict::Approved => {
                info!("[{}] accepted on attempt {}", request.view, attempt);
                return ViewOutcome::Accepted { bytes, report };
            }
            Verdict::Rejected => {
                warn!("[{}] rejected on attempt {}: {}", request.view, attempt, report.trim());
                last_rejection = report;
            }
        }
    }

    info!(
        "[{}] abandoned after {} attempts",
        request.view, request.max_attempts
    );
    ViewOutcome::Abandoned {
        attempts: request.max_attempts,
        last_rejection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([40, 40, 200]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    enum Gen {
        Image,
        Blocked,
        Empty,
        Fail,
    }

    struct StubGenerator {
        script: Mutex<VecDeque<Gen>>,
        calls: AtomicUsize,
    }

    impl StubGenerator {
        fn new(script: Vec<Gen>) -> Self {
            StubGenerator {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ImageGenerator for StubGenerator {
        async fn generate(
            &self,
            _references: &[ImagePart],
            _prompt: &str,
        ) -> anyhow::Result<GenerationOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().pop_front() {
                Some(Gen::Image) => Ok(GenerationOutcome::Image(png_bytes(1000, 1000))),
                Some(Gen::Blocked) => Ok(GenerationOutcome::Blocked("safety".to_string())),
                Some(Gen::Empty) | None => Ok(GenerationOutcome::Empty),
                Some(Gen::Fail) => Err(anyhow::anyhow!("connection reset")),
            }
        }
    }

    struct StubComparator {
        replies: Mutex<VecDeque<String>>,
        calls: AtomicUsize,
    }

    impl StubComparator {
        fn new(replies: Vec<&str>) -> Self {
            StubComparator {
                replies: Mutex::new(replies.into_iter().map(String::from).collect()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ImageComparator for StubComparator {
        async fn compare(
            &self,
            _references: &[ImagePart],
            _candidate: &ImagePart,
            _prompt: &str,
        ) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| "REJECTED\nno scripted reply".to_string()))
        }
    }

    fn request<'a>(max_attempts: u32) -> ViewRequest<'a> {
        ViewRequest {
            view: View::Main,
            generation_prompt: "generate",
            validation_prompt: "validate",
            generation_references: &[],
            validation_references: &[],
            max_attempts,
            pause: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn budget_bounds_generation_calls_exactly() {
        let generator = StubGenerator::new(vec![Gen::Empty, Gen::Empty, Gen::Empty]);
        let comparator = StubComparator::new(vec![]);
        let outcome = run_view(&generator, &comparator, request(2)).await;

        match outcome {
            ViewOutcome::Abandoned { attempts, last_rejection } => {
                assert_eq!(attempts, 2);
                assert!(last_rejection.contains("no image"));
            }
            other => panic!("expected Abandoned, got {other:?}"),
        }
        assert_eq!(generator.calls(), 2);
        assert_eq!(comparator.calls(), 0);
    }

    #[tokio::test]
    async fn blocked_generation_never_reaches_the_comparator() {
        let generator = StubGenerator::new(vec![Gen::Blocked, Gen::Image]);
        let comparator = StubComparator::new(vec!["APPROVED\nlooks right"]);
        let outcome = run_view(&generator, &comparator, request(2)).await;

        assert!(outcome.is_accepted());
        assert_eq!(generator.calls(), 2);
        assert_eq!(comparator.calls(), 1);
    }

    #[tokio::test]
    async fn rejection_retries_and_later_approval_wins() {
        let generator = StubGenerator::new(vec![Gen::Image, Gen::Image]);
        let comparator =
            StubComparator::new(vec!["REJECTED\ncolor is off", "APPROVED\ncolor matches"]);
        let outcome = run_view(&generator, &comparator, request(2)).await;

        match outcome {
            ViewOutcome::Accepted { report, .. } => {
                assert!(report.starts_with("APPROVED"));
            }
            other => panic!("expected Accepted, got {other:?}"),
        }
        assert_eq!(generator.calls(), 2);
        assert_eq!(comparator.calls(), 2);
    }

    #[tokio::test]
    async fn transport_errors_consume_the_attempt() {
        let generator = StubGenerator::new(vec![Gen::Fail, Gen::Fail]);
        let comparator = StubComparator::new(vec![]);
        let outcome = run_view(&generator, &comparator, request(2)).await;

        match outcome {
            ViewOutcome::Abandoned { attempts, last_rejection } => {
                assert_eq!(attempts, 2);
                assert!(last_rejection.contains("generation failed"));
            }
            other => panic!("expected Abandoned, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn accepted_bytes_are_cropped_to_4_5() {
        let generator = StubGenerator::new(vec![Gen::Image]);
        let comparator = StubComparator::new(vec!["APPROVED\nfine"]);
        let outcome = run_view(&generator, &comparator, request(1)).await;

        let ViewOutcome::Accepted { bytes, .. } = outcome else {
            panic!("expected Accepted");
        };
        let img = image::load_from_memory(&bytes).unwrap();
        let ratio = img.width() as f64 / img.height() as f64;
        assert!((ratio - 0.8).abs() < 0.01);
    }

    #[tokio::test]
    async fn always_rejecting_comparator_exhausts_the_budget() {
        let generator = StubGenerator::new(vec![Gen::Image, Gen::Image]);
        let comparator =
            StubComparator::new(vec!["REJECTED\nwrong color", "REJECTED\nstill wrong"]);
        let outcome = run_view(&generator, &comparator, request(2)).await;

        match outcome {
            ViewOutcome::Abandoned { last_rejection, .. } => {
                assert!(last_rejection.contains("still wrong"));
            }
            other => panic!("expected Abandoned, got {other:?}"),
        }
    }
}
