//! Turns a settings vector into the detailed photography scenario JSON the
//! image generator is prompted with. Every vocabulary value maps to fixed
//! descriptive text, so the same settings always render the same scene spec.

use serde_json::{json, Value};

use crate::taxonomy::{
    Angle, Background, Expression, Gender, ImageSettings, Lighting, Pose, ProductFeatures, Style,
};

struct StyleDescription {
    setting: &'static str,
    atmosphere: &'static str,
    camera_style: &'static str,
}

fn style_description(style: Style) -> StyleDescription {
    match style {
        Style::CasualLifestyle => StyleDescription {
            setting: "relaxed everyday lifestyle environment",
            atmosphere: "easygoing, warm, approachable",
            camera_style: "professional lifestyle photography",
        },
        Style::LifestyleIndoor => StyleDescription {
            setting: "casual indoor lifestyle environment",
            atmosphere: "relaxed, authentic, lifestyle-focused",
            camera_style: "professional lifestyle photography",
        },
        Style::LifestyleOutdoor => StyleDescription {
            setting: "outdoor lifestyle setting with open space",
            atmosphere: "fresh, natural, unhurried",
            camera_style: "professional outdoor lifestyle photography",
        },
        Style::Streetwear => StyleDescription {
            setting: "urban street fashion environment",
            atmosphere: "stylish, contemporary, fashion-forward",
            camera_style: "professional street fashion photography",
        },
        Style::StudioMinimal => StyleDescription {
            setting: "clean minimalist studio",
            atmosphere: "modern, sophisticated, clean",
            camera_style: "professional studio portrait photography",
        },
        Style::UrbanOutdoor => StyleDescription {
            setting: "urban outdoor environment with street photography aesthetic",
            atmosphere: "energetic, authentic, street-style",
            camera_style: "professional street photography",
        },
    }
}

fn lighting_description(lighting: Lighting) -> &'static str {
    match lighting {
        Lighting::Dramatic => {
            "high-contrast dramatic lighting with strong shadows and highlights"
        }
        Lighting::GoldenHour => {
            "warm orange-pink golden hour lighting from the side, creating soft rim light and long shadows"
        }
        Lighting::Natural => "natural daylight with soft shadows, balanced exposure",
        Lighting::Overcast => "soft diffused overcast lighting, minimal shadows, even tones",
        Lighting::Studio => "controlled studio lighting with key light and fill, even illumination",
    }
}

fn background_description(background: Background) -> &'static str {
    match background {
        Background::BusyPattern => "visually busy patterned backdrop with repeating shapes",
        Background::GraffitiWall => "colorful graffiti-covered brick wall with urban street art",
        Background::NatureOutdoor => {
            "natural outdoor environment with greenery and organic elements"
        }
        Background::NeutralWall => "plain neutral wall with soft even texture",
        Background::Park => "public park with grass, trees and open space",
        Background::StudioGrey => "grey studio backdrop, clean and seamless",
        Background::StudioWhite => "clean white studio backdrop, seamless and minimal",
        Background::UrbanStreet => "authentic urban street with buildings and infrastructure",
    }
}

fn pose_description(pose: Pose) -> &'static str {
    match pose {
        Pose::Action => "dynamic action pose with energy and movement",
        Pose::Casual => "casual relaxed pose, natural and authentic",
        Pose::Dynamic => "dynamic pose with movement and energy",
        Pose::Sitting => "seated pose, relaxed and natural",
        Pose::Standing => "standing pose with natural stance",
        Pose::Walking => "natural walking pose, dynamic movement",
    }
}

fn expression_description(expression: Expression) -> &'static str {
    match expression {
        Expression::Confident => "confident expression with direct eye contact",
        Expression::Focused => "focused intense expression",
        Expression::Neutral => "neutral calm expression",
        Expression::Serious => "serious focused expression",
        Expression::Smiling => "genuine smiling expression",
    }
}

fn angle_description(angle: Angle) -> &'static str {
    match angle {
        Angle::ThreeQuarter => "three-quarter angle for dynamic perspective",
        Angle::Back => "back angle showing rear details",
        Angle::Front => "eye-level front angle, direct composition",
        Angle::Side => "side angle showing profile and garment details",
    }
}

fn subject_noun(gender: Gender) -> &'static str {
    match gender {
        Gender::Female => "woman",
        Gender::Male => "man",
        Gender::Unisex => "person",
    }
}

/// Renders the scenario document for one product and settings vector.
///
/// Optional `user_guidance` is free-text direction from the operator; it is
/// carried as an extra rule so the generator weighs it alongside the scene
/// constraints.
pub fn render_scenario(
    settings: &ImageSettings,
    features: &ProductFeatures,
    user_guidance: Option<&str>,
) -> Value {
    let style = style_description(settings.style);
    let pose = pose_description(settings.pose);
    let expression = expression_description(settings.expression);

    let subject_description = format!(
        "A {} in a {} {} {}, {}, with {}, in a {}",
        subject_noun(features.gender),
        features.color,
        features.fit,
        features.garment_type,
        pose,
        expression,
        style.setting
    );

    let mut scenario = json!({
        "rule": "Always select a lively, believable real-world situation. \
                 Base the entire scene (pose, background, lighting, mood, accessories) \
                 on how and where people actually wear this type of garment in real life. \
                 Never use a plain, neutral or static studio background unless style is 'studio_minimal'.",
        "output_instruction": "Generate only one complete JSON object following this exact structure, \
                 keys, nesting and detail level. Adapt all content (description, pose, expression, \
                 background, lighting, atmosphere, accessories etc.) to the chosen real-life scenario \
                 and the actual garment from the reference image. Never contradict or invent clothing \
                 details; strictly follow the reference image for appearance, fit, color, logos, textures.",
        "example_output_structure": {
            "subject": {
                "description": subject_description,
                "pose_rules": format!("{pose}, natural proportions and physics, no distortions"),
                "age": "young adult mid-to-late 20s",
                "expression": expression,
                "hair": {
                    "color": "natural color appropriate for subject",
                    "style": "natural style appropriate for scenario"
                },
                "clothing": {
                    "reference_instruction": "Use the provided reference image for the EXACT garment. \
                         Match color, texture, fit, graphics perfectly. Do NOT invent or modify the garment. \
                         Match the other clothing items to the scenario and the reference garment.",
                    "top": {
                        "instruction": "Use the EXACT garment from the reference image. \
                             Match color, texture, fit, graphics perfectly."
                    },
                    "bottom": {
                        "instruction": "Use clothing from the reference image or garments that \
                             naturally match the scenario and top garment."
                    }
                },
                "face": {
                    "preserve_original": true,
                    "makeup": "natural look appropriate for scenario"
                }
            },
            "accessories": {
                "instruction": "Add appropriate accessories for the scenario and style"
            },
            "prop": null,
            "photography": {
                "camera_style": style.camera_style,
                "angle": angle_description(settings.angle),
                "shot_type": "full-body composition with environmental context",
                "aspect_ratio": "Aspect ratio is always 4:5, vertical orientation",
                "texture": "ultra-sharp focus, high resolution, photorealistic details, \
                     rich textures, cinematic depth"
            },
            "background": {
                "setting": style.setting,
                "terrain": background_description(settings.background),
                "elements": [
                    format!("Background elements matching a {} environment", settings.background),
                    "Environmental details supporting the scenario",
                    "Contextual elements enhancing the scene"
                ],
                "atmosphere": style.atmosphere,
                "lighting": lighting_description(settings.lighting)
            }
        }
    });

    if let Some(guidance) = user_guidance {
        let guidance = guidance.trim();
        if !guidance.is_empty() {
            if let Some(map) = scenario.as_object_mut() {
                map.insert(
                    "client_direction".to_string(),
                    Value::String(format!(
                        "The client specifically asked for: {guidance}. \
                         Honor this within the scene constraints above."
                    )),
                );
            }
        }
    }

    scenario
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{Color, Fit, GarmentType};

    fn features(gender: Gender) -> ProductFeatures {
        ProductFeatures {
            garment_type: GarmentType::Hoodie,
            color: Color::Black,
            fit: Fit::Loose,
            gender,
            composition: String::new(),
            art_nr: String::new(),
            image_ref: String::new(),
        }
    }

    fn settings() -> ImageSettings {
        ImageSettings {
            style: Style::UrbanOutdoor,
            lighting: Lighting::GoldenHour,
            background: Background::GraffitiWall,
            pose: Pose::Walking,
            expression: Expression::Confident,
            angle: Angle::Front,
        }
    }

    #[test]
    fn subject_description_reflects_features_and_settings() {
        let scenario = render_scenario(&settings(), &features(Gender::Male), None);
        let description = scenario["example_output_structure"]["subject"]["description"]
            .as_str()
            .unwrap();
        assert!(description.starts_with("A man in a black loose hoodie"));
        assert!(description.contains("natural walking pose"));
        assert!(description.contains("urban outdoor environment"));
    }

    #[test]
    fn gender_maps_to_subject_noun() {
        let woman = render_scenario(&settings(), &features(Gender::Female), None);
        assert!(woman["example_output_structure"]["subject"]["description"]
            .as_str()
            .unwrap()
            .starts_with("A woman"));

        let person = render_scenario(&settings(), &features(Gender::Unisex), None);
        assert!(person["example_output_structure"]["subject"]["description"]
            .as_str()
            .unwrap()
            .starts_with("A person"));
    }

    #[test]
    fn scenario_pins_the_storefront_aspect_ratio() {
        let scenario = render_scenario(&settings(), &features(Gender::Male), None);
        let ratio = scenario["example_output_structure"]["photography"]["aspect_ratio"]
            .as_str()
            .unwrap();
        assert!(ratio.contains("4:5"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let a = render_scenario(&settings(), &features(Gender::Male), None);
        let b = render_scenario(&settings(), &features(Gender::Male), None);
        assert_eq!(a, b);
    }

    #[test]
    fn user_guidance_is_carried_as_client_direction() {
        let guided = render_scenario(&settings(), &features(Gender::Male), Some("rainy mood"));
        assert!(guided["client_direction"].as_str().unwrap().contains("rainy mood"));

        let plain = render_scenario(&settings(), &features(Gender::Male), None);
        assert!(plain.get("client_direction").is_none());

        let blank = render_scenario(&settings(), &features(Gender::Male), Some("   "));
        assert!(blank.get("client_direction").is_none());
    }
}
