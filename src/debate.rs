//! Single-round settings debate: an optimizer argues for the model's
//! prediction, a creative argues for the brand, a moderator decides. The
//! debate advises; it never blocks. Any failure along the way falls back to
//! the raw prediction.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::llm::{strip_code_fences, LanguageModel};
use crate::ml::predictor::PredictionResult;
use crate::prompts;
use crate::taxonomy::{ImageSettings, ProductFeatures};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusType {
    FullAgreement,
    HybridApproach,
    CreativeOverride,
    FallbackToMl,
}

impl ConsensusType {
    /// Parses the moderator's self-reported consensus label. `fallback_to_ml`
    /// is reserved for the pipeline itself and is not accepted from the model.
    fn from_moderator(value: &str) -> Option<ConsensusType> {
        match value {
            "full_agreement" => Some(ConsensusType::FullAgreement),
            "hybrid_approach" => Some(ConsensusType::HybridApproach),
            "creative_override" => Some(ConsensusType::CreativeOverride),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub final_image_settings: ImageSettings,
    pub reasoning: String,
    pub consensus_type: ConsensusType,
}

/// Raw agent outputs, kept verbatim for the analysis record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebateTranscript {
    pub optimizer_argument: String,
    pub creative_argument: String,
    pub moderator_raw: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebateOutcome {
    pub consensus: ConsensusResult,
    pub transcript: DebateTranscript,
}

fn fallback(prediction: &PredictionResult, transcript: DebateTranscript) -> DebateOutcome {
    DebateOutcome {
        consensus: ConsensusResult {
            final_image_settings: prediction.image_settings,
            reasoning: "Debate unavailable; using the model prediction directly.".to_string(),
            consensus_type: ConsensusType::FallbackToMl,
        },
        transcript,
    }
}

fn parse_moderator(raw: &str) -> anyhow::Result<ConsensusResult> {
    let value: Value = serde_json::from_str(strip_code_fences(raw))?;
    let settings = ImageSettings::from_json(
        value
            .get("final_image_settings")
            .ok_or_else(|| anyhow::anyhow!("moderator reply has no final_image_settings"))?,
    )?;
    let consensus_type = value
        .get("consensus_type")
        .and_then(Value::as_str)
        .and_then(ConsensusType::from_moderator)
        .ok_or_else(|| anyhow::anyhow!("moderator reply has no valid consensus_type"))?;
    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    Ok(ConsensusResult {
        final_image_settings: settings,
        reasoning,
        consensus_type,
    })
}

/// Runs the three agents sequentially with a flat pause between calls.
///
/// Infallible by contract: a transport error, unparsable moderator output or
/// an out-of-vocabulary decision all degrade to the model prediction with
/// `consensus_type` set to `fallback_to_ml`.
pub async fn resolve_consensus(
    model: &dyn LanguageModel,
    prediction: &PredictionResult,
    features: &ProductFeatures,
    brand_identity: &str,
    pause: Duration,
) -> DebateOutcome {
    let mut transcript = DebateTranscript::default();

    let optimizer_prompt = prompts::optimizer_argument(prediction);
    match model.complete(&optimizer_prompt).await {
        Ok(text) => transcript.optimizer_argument = text,
        Err(err) => {
            warn!("optimizer agent failed: {err:#}");
            return fallback(prediction, transcript);
        }
    }
    tokio::time::sleep(pause).await;

    let creative_prompt = prompts::creative_argument(prediction, features, brand_identity);
    match model.complete(&creative_prompt).await {
        Ok(text) => transcript.creative_argument = text,
        Err(err) => {
            warn!("creative agent failed: {err:#}");
            return fallback(prediction, transcript);
        }
    }
    tokio::time::sleep(pause).await;

    let moderator_prompt = prompts::moderator_decision(
        &transcript.optimizer_argument,
        &transcript.creative_argument,
        prediction,
        features,
    );
    match model.complete(&moderator_prompt).await {
        Ok(text) => transcript.moderator_raw = text,
        Err(err) => {
            warn!("moderator agent failed: {err:#}");
            return fallback(prediction, transcript);
        }
    }

    match parse_moderator(&transcript.moderator_raw) {
        Ok(consensus) => {
            info!(
                "debate settled: {:?} ({})",
                consensus.consensus_type, consensus.reasoning
            );
            DebateOutcome {
                consensus,
                transcript,
            }
        }
        Err(err) => {
            warn!("moderator decision rejected: {err:#}");
            fallback(prediction, transcript)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{
        Angle, Background, Color, Expression, Fit, GarmentType, Gender, Lighting, Pose, Style,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, String>>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String, String>>) -> Self {
            ScriptedModel {
                replies: Mutex::new(replies.into()),
            }
        }

        fn remaining(&self) -> usize {
            self.replies.lock().len()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            match self.replies.lock().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(message)) => Err(anyhow::anyhow!(message)),
                None => Err(anyhow::anyhow!("no scripted reply left")),
            }
        }

        async fn complete_with_images(
            &self,
            _references: &[crate::llm::ImagePart],
            prompt: &str,
        ) -> anyhow::Result<String> {
            self.complete(prompt).await
        }
    }

    fn prediction() -> PredictionResult {
        PredictionResult {
            image_settings: ImageSettings {
                style: Style::StudioMinimal,
                lighting: Lighting::Studio,
                background: Background::StudioWhite,
                pose: Pose::Standing,
                expression: Expression::Neutral,
                angle: Angle::Front,
            },
            predicted_rate: 0.05,
            confidence: 0.82,
            reasoning: "test".to_string(),
        }
    }

    fn features() -> ProductFeatures {
        ProductFeatures {
            garment_type: GarmentType::Hoodie,
            color: Color::Black,
            fit: Fit::Loose,
            gender: Gender::Male,
            composition: String::new(),
            art_nr: String::new(),
            image_ref: String::new(),
        }
    }

    fn moderator_json(style: &str, consensus_type: &str) -> String {
        format!(
            r#"{{
                "final_image_settings": {{
                    "style": "{style}",
                    "lighting": "dramatic",
                    "background": "urban_street",
                    "pose": "dynamic",
                    "expression": "confident",
                    "angle": "front"
                }},
                "reasoning": "Street setting fits the brand.",
                "consensus_type": "{consensus_type}"
            }}"#
        )
    }

    async fn run(model: &ScriptedModel) -> DebateOutcome {
        resolve_consensus(model, &prediction(), &features(), "bold brand", Duration::ZERO).await
    }

    #[tokio::test]
    async fn valid_moderator_decision_is_adopted() {
        let model = ScriptedModel::new(vec![
            Ok("data says studio".to_string()),
            Ok("brand wants street".to_string()),
            Ok(moderator_json("streetwear", "hybrid_approach")),
        ]);
        let outcome = run(&model).await;
        assert_eq!(outcome.consensus.consensus_type, ConsensusType::HybridApproach);
        assert_eq!(outcome.consensus.final_image_settings.style, Style::Streetwear);
        assert_eq!(outcome.transcript.optimizer_argument, "data says studio");
        assert_eq!(outcome.transcript.creative_argument, "brand wants street");
    }

    #[tokio::test]
    async fn code_fenced_moderator_json_is_accepted() {
        let fenced = format!("```json\n{}\n```", moderator_json("streetwear", "full_agreement"));
        let model = ScriptedModel::new(vec![
            Ok("a".to_string()),
            Ok("b".to_string()),
            Ok(fenced),
        ]);
        let outcome = run(&model).await;
        assert_eq!(outcome.consensus.consensus_type, ConsensusType::FullAgreement);
    }

    #[tokio::test]
    async fn unparsable_moderator_output_falls_back() {
        let model = ScriptedModel::new(vec![
            Ok("a".to_string()),
            Ok("b".to_string()),
            Ok("I think streetwear would be nice.".to_string()),
        ]);
        let outcome = run(&model).await;
        assert_eq!(outcome.consensus.consensus_type, ConsensusType::FallbackToMl);
        assert_eq!(
            outcome.consensus.final_image_settings,
            prediction().image_settings
        );
        assert_eq!(
            outcome.transcript.moderator_raw,
            "I think streetwear would be nice."
        );
    }

    #[tokio::test]
    async fn out_of_vocabulary_decision_falls_back() {
        let model = ScriptedModel::new(vec![
            Ok("a".to_string()),
            Ok("b".to_string()),
            Ok(moderator_json("vaporwave", "hybrid_approach")),
        ]);
        let outcome = run(&model).await;
        assert_eq!(outcome.consensus.consensus_type, ConsensusType::FallbackToMl);
    }

    #[tokio::test]
    async fn self_reported_fallback_label_is_rejected() {
        let model = ScriptedModel::new(vec![
            Ok("a".to_string()),
            Ok("b".to_string()),
            Ok(moderator_json("streetwear", "fallback_to_ml")),
        ]);
        let outcome = run(&model).await;
        assert_eq!(outcome.consensus.consensus_type, ConsensusType::FallbackToMl);
        assert_eq!(
            outcome.consensus.final_image_settings,
            prediction().image_settings
        );
    }

    #[tokio::test]
    async fn transport_error_short_circuits_remaining_agents() {
        let model = ScriptedModel::new(vec![
            Err("429 rate limited".to_string()),
            Ok("never used".to_string()),
            Ok("never used".to_string()),
        ]);
        let outcome = run(&model).await;
        assert_eq!(outcome.consensus.consensus_type, ConsensusType::FallbackToMl);
        assert_eq!(model.remaining(), 2);
    }
}
