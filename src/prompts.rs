//! Prompt builders for every model call in the pipeline. All free text the
//! models see is assembled here; the rest of the crate deals in typed values.

use serde_json::{json, Value};

use crate::ml::predictor::PredictionResult;
use crate::taxonomy::{
    Angle, Background, Expression, Gender, ImageSettings, Lighting, Pose, ProductFeatures, Style,
};

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn settings_json(settings: &ImageSettings) -> Value {
    json!({
        "style": settings.style.as_str(),
        "lighting": settings.lighting.as_str(),
        "background": settings.background.as_str(),
        "pose": settings.pose.as_str(),
        "expression": settings.expression.as_str(),
        "angle": settings.angle.as_str(),
    })
}

fn features_json(features: &ProductFeatures) -> Value {
    json!({
        "garment_type": features.garment_type.as_str(),
        "color": features.color.as_str(),
        "fit": features.fit.as_str(),
        "gender": features.gender.as_str(),
        "composition": features.composition,
        "art_nr": features.art_nr,
    })
}

fn quoted_list(labels: &[&str]) -> String {
    labels
        .iter()
        .map(|label| format!("\"{label}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn valid_values_block() -> String {
    format!(
        "VALID VALUES - you MUST only use these exact strings:\n\
         - style: {}\n\
         - lighting: {}\n\
         - background: {}\n\
         - pose: {}\n\
         - expression: {}\n\
         - angle: {}",
        quoted_list(Style::ACCEPTED),
        quoted_list(Lighting::ACCEPTED),
        quoted_list(Background::ACCEPTED),
        quoted_list(Pose::ACCEPTED),
        quoted_list(Expression::ACCEPTED),
        quoted_list(Angle::ACCEPTED),
    )
}

fn gender_directive(gender: Gender) -> &'static str {
    match gender {
        Gender::Female => "SUBJECT: A woman. NOT a man.",
        Gender::Male => "SUBJECT: A man. NOT a woman.",
        Gender::Unisex => "SUBJECT: A person (any gender).",
    }
}

fn style_directive(style: Style) -> &'static str {
    match style {
        Style::CasualLifestyle => "LOCATION: Relaxed everyday outdoor or indoor setting.",
        Style::LifestyleIndoor => {
            "LOCATION: Casual indoor space such as a living room, cafe or home. NOT a studio, NOT outdoor."
        }
        Style::LifestyleOutdoor => {
            "LOCATION: Outdoor lifestyle setting such as a park, nature or open space."
        }
        Style::Streetwear => "LOCATION: Urban street, skatepark or city environment.",
        Style::StudioMinimal => {
            "LOCATION: Clean indoor studio with plain backdrop. NO outdoor scenes, NO streets, NO buildings."
        }
        Style::UrbanOutdoor => {
            "LOCATION: Urban outdoor street environment with buildings, pavement and city. NOT a studio."
        }
    }
}

fn lighting_directive(lighting: Lighting) -> &'static str {
    match lighting {
        Lighting::Dramatic => {
            "LIGHTING: High-contrast dramatic lighting. Strong shadows, bright highlights, dark areas."
        }
        Lighting::GoldenHour => {
            "LIGHTING: Warm orange-pink golden hour sunset. Strong warm glow, long shadows, rim light on subject."
        }
        Lighting::Natural => "LIGHTING: Soft natural daylight. Balanced exposure, gentle shadows.",
        Lighting::Overcast => {
            "LIGHTING: Soft diffused overcast sky. Flat, even lighting, minimal shadows."
        }
        Lighting::Studio => "LIGHTING: Controlled studio lighting. Even, clean, no harsh shadows.",
    }
}

fn background_directive(background: Background) -> &'static str {
    match background {
        Background::BusyPattern => "BACKGROUND: Visually busy patterned background.",
        Background::GraffitiWall => "BACKGROUND: Colorful graffiti-covered brick wall.",
        Background::NatureOutdoor => {
            "BACKGROUND: Natural outdoor environment with greenery, trees and grass."
        }
        Background::NeutralWall => {
            "BACKGROUND: Plain neutral wall. No street, no outdoor, no buildings."
        }
        Background::Park => "BACKGROUND: Public park with grass, trees and open space.",
        Background::StudioGrey => "BACKGROUND: Grey studio backdrop. Clean and plain.",
        Background::StudioWhite => {
            "BACKGROUND: Pure white seamless studio backdrop. Nothing else behind the subject."
        }
        Background::UrbanStreet => {
            "BACKGROUND: Urban street with buildings, road and city infrastructure."
        }
    }
}

fn pose_directive(pose: Pose) -> &'static str {
    match pose {
        Pose::Action => "POSE: Dynamic action pose with movement and energy.",
        Pose::Casual => "POSE: Casual, relaxed, natural stance.",
        Pose::Dynamic => "POSE: Dynamic pose with movement.",
        Pose::Sitting => "POSE: Seated, relaxed position.",
        Pose::Standing => "POSE: Relaxed upright standing. Both feet on ground.",
        Pose::Walking => "POSE: Natural walking, mid-stride, one foot forward.",
    }
}

fn angle_directive(angle: Angle) -> &'static str {
    match angle {
        Angle::ThreeQuarter => "CAMERA ANGLE: Three-quarter angle.",
        Angle::Back => "CAMERA ANGLE: Rear view from behind.",
        Angle::Front => "CAMERA ANGLE: Straight-on front view.",
        Angle::Side => "CAMERA ANGLE: Side profile.",
    }
}

/// Numbered scene constraints derived directly from the decided settings.
/// These lead the generation prompt and take priority over the scenario JSON.
fn hard_constraints(settings: &ImageSettings, gender: Gender) -> String {
    let lines = [
        gender_directive(gender),
        style_directive(settings.style),
        lighting_directive(settings.lighting),
        background_directive(settings.background),
        pose_directive(settings.pose),
        angle_directive(settings.angle),
    ];
    let numbered = lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{}. {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "MANDATORY SCENE CONSTRAINTS - follow these exactly, they override everything else:\n{numbered}"
    )
}

/// Prompt for generating the main scene image from the rendered scenario.
pub fn image_generation(scenario: &Value, settings: &ImageSettings, gender: Gender) -> String {
    format!(
        "TASK: Generate a photorealistic fashion PHOTOGRAPH.\n\
         \n\
         IMPORTANT: You MUST return an IMAGE. DO NOT return text, JSON, or descriptions. \
         ONLY generate a photograph.\n\
         \n\
         {constraints}\n\
         \n\
         CRITICAL GARMENT INSTRUCTION:\n\
         The reference image shows the EXACT garment. Copy it with 100% accuracy:\n\
         - EXACT color, shade, tone\n\
         - EXACT texture, fabric, sheen\n\
         - EXACT fit, silhouette, cut\n\
         - EXACT graphics/patterns (replace copyrighted logos with generic abstract alternatives)\n\
         - Do NOT invent or modify the garment\n\
         - No real celebrities, no real brand logos\n\
         \n\
         PEOPLE:\n\
         - The scene must contain ONLY the main subject (the person wearing the garment)\n\
         - Do NOT include any other people, bystanders or figures anywhere in the image\n\
         \n\
         DETAILED PHOTO SPECIFICATION (JSON):\n\
         {scenario}\n\
         \n\
         The mandatory constraints above take priority. The JSON provides additional detail \
         for subject, styling and composition.",
        constraints = hard_constraints(settings, gender),
        scenario = pretty(scenario),
    )
}

/// Prompt for the main-view gate: compare the generated scene against the
/// original garment photo. The reply must lead with APPROVED or REJECTED.
pub fn validation(features: &ProductFeatures) -> String {
    let color = features.color.as_str();
    let garment_type = features.garment_type.as_str();
    format!(
        "You are an expert at comparing clothing garments.\n\
         \n\
         You are given two images:\n\
         1. ORIGINAL IMAGE: Shows a {garment_type} in {color}\n\
         2. GENERATED IMAGE: A new image that should show the same garment worn by a person\n\
         \n\
         Your task: Verify if the garment is EXACTLY THE SAME in both images.\n\
         \n\
         Check these specific things:\n\
         - Color: Is the color exactly the same? (original color: {color})\n\
         - Graphics/patterns: If there are prints, logos or patterns, are they exactly the same?\n\
         - Fit/silhouette: Does the garment appear to have the same fit and shape?\n\
         - Texture: Does the fabric/material look the same?\n\
         - Is the image format 4:5?\n\
         \n\
         IMPORTANT:\n\
         - Respond ONLY with \"APPROVED\" or \"REJECTED\"\n\
         - On the next line: Briefly explain why (max 2 sentences)\n\
         \n\
         Format:\n\
         APPROVED\n\
         The garment matches exactly: same color, graphics and fit.\n\
         \n\
         OR:\n\
         \n\
         REJECTED\n\
         The color is too dark/light compared to the original."
    )
}

fn angle_phrases(angle: Angle) -> (&'static str, &'static str) {
    match angle {
        Angle::Back => ("from behind", "back"),
        _ => ("from the side", "side"),
    }
}

/// Prompt for re-shooting the accepted scene from a side or back angle.
///
/// With a single reference image the garment's rear is unknown, so the
/// generator is told to assume no print unless it visibly wraps around.
pub fn variant(angle: Angle, reference_count: usize) -> String {
    let (angle_phrase, _) = angle_phrases(angle);
    let back_print_note = if reference_count == 1 {
        "Only ONE reference image was provided (front view only). Assume there is NO print, \
         graphic or logo on the back or sides of the garment unless it is clearly visible \
         wrapping around from the front."
    } else {
        "Use the original garment images to determine if there are prints or graphics on the \
         back or sides."
    };
    format!(
        "TASK: Generate a photorealistic fashion PHOTOGRAPH.\n\
         \n\
         IMPORTANT: You MUST return an IMAGE. DO NOT return text, JSON, or descriptions. \
         ONLY generate a photograph.\n\
         \n\
         REFERENCE IMAGES provided (in order):\n\
         1. ORIGINAL GARMENT IMAGES: One or more images showing the actual garment from \
         different angles (front, back, side)\n\
         2. GENERATED SCENE IMAGE: Shows a person wearing the garment in a specific \
         environment (front view)\n\
         \n\
         YOUR TASK: Generate THE EXACT SAME SCENE but photographed {angle_phrase}.\n\
         image_format = \"4:5\"\n\
         \n\
         REQUIREMENTS:\n\
         - SAME person, environment, lighting and pose as in the generated scene\n\
         - ONLY DIFFERENCE: Camera angle is now {angle_phrase}\n\
         - Match garment color, texture and fit exactly\n\
         \n\
         GARMENT BACK/SIDE:\n\
         - {back_print_note}\n\
         \n\
         PEOPLE:\n\
         - The scene must contain ONLY the main subject; no other people anywhere in the image.\n\
         \n\
         Generate a photograph that looks like you walked around the person and took another \
         shot {angle_phrase}."
    )
}

/// Prompt for validating a side or back variant against the originals.
/// Print placement is the key check: a front print must not migrate.
pub fn variant_validation(features: &ProductFeatures, angle: Angle) -> String {
    let (_, angle_name) = angle_phrases(angle);
    let color = features.color.as_str();
    let garment_type = features.garment_type.as_str();
    format!(
        "You are an expert at comparing clothing garments.\n\
         \n\
         You are given original reference images and a generated image:\n\
         - ORIGINAL IMAGES: One or more images showing a {garment_type} in {color} from \
         different angles (may be just front, or front + back + side)\n\
         - GENERATED IMAGE ({angle_upper} VIEW): A new image showing the same garment worn \
         by a person from the {angle_name}\n\
         \n\
         Your task: Verify if the generated {angle_name} view is CONSISTENT with the \
         original images.\n\
         \n\
         Check these specific things:\n\
         - Color: Is the color exactly the same? (original color: {color})\n\
         - Graphics/patterns: IF there are prints/logos, are they positioned correctly? \
         Front prints should stay on front, back prints on back\n\
         - Fit/silhouette: Does the garment have the same fit and shape?\n\
         - Texture: Does the fabric/material look the same?\n\
         - Is the image format 4:5?\n\
         \n\
         IMPORTANT:\n\
         - Many garments have NO prints at all; this is completely normal\n\
         - IF there is a print on the front in original images, it should NOT appear on the \
         back view (and vice versa)\n\
         - Respond ONLY with \"APPROVED\" or \"REJECTED\"\n\
         - On the next line: Briefly explain why (max 2 sentences)\n\
         \n\
         Format:\n\
         APPROVED\n\
         The {angle_name} view is consistent: correct color, fit and print placement.\n\
         \n\
         OR:\n\
         \n\
         REJECTED\n\
         Front print incorrectly appears on the back view.",
        angle_upper = angle_name.to_uppercase(),
    )
}

/// Prompt for extracting product features from the garment photo plus the
/// supplier metadata row. Scenario and description come later, separately.
pub fn feature_extraction(metadata: &Value) -> String {
    let metadata_json = pretty(metadata);
    let image = metadata.get("image").and_then(Value::as_str).unwrap_or("");
    let art_nr = metadata.get("art_nr").and_then(Value::as_str).unwrap_or("");
    let color = metadata.get("color").and_then(Value::as_str).unwrap_or("");
    let fit = metadata.get("fit").and_then(Value::as_str).unwrap_or("");
    let gender = metadata.get("gender").and_then(Value::as_str).unwrap_or("");
    format!(
        "You are a fashion product analyst.\n\
         \n\
         You are given a product image and metadata from the supplier:\n\
         \n\
         {metadata_json}\n\
         \n\
         Analyze the image and extract product features. Return ONLY a valid JSON object; \
         no extra text, no markdown, no explanations.\n\
         \n\
         The JSON must contain:\n\
         \n\
         {{\n\
           \"image\": \"{image}\",\n\
           \"art_nr\": \"{art_nr}\",\n\
           \"color\": \"exact color from metadata: {color}\",\n\
           \"fit\": \"exact fit from metadata: {fit}\",\n\
           \"composition\": \"convert composition dict to string, e.g. 'Shell: 60% Cotton, 40% Polyester'\",\n\
           \"gender\": \"{gender}\",\n\
           \"garment_type\": \"identify garment type from image (e.g. hoodie, t-shirt, jacket, jeans, zip-up hoodie)\",\n\
           \"title\": \"a short, catchy product name (2-3 words max) - examples: 'Chemistry Hoodie', \
         'Urban Jacket', 'Midnight Tee' - DO NOT include brand names or full descriptions\"\n\
         }}\n\
         \n\
         IMPORTANT:\n\
         - Do NOT generate a photography scenario or description. Only extract the features above.\n\
         - Do NOT use the filename or any brand names in the title\n\
         - Title should be 2-3 words maximum, like a product name"
    )
}

/// Prompt for the storefront copy, written after the scenario is final so
/// the description can match the shoot's atmosphere.
pub fn description(features: &ProductFeatures, scenario: &Value, brand_identity: &str) -> String {
    let features_json = pretty(&features_json(features));
    let setting = scenario
        .pointer("/example_output_structure/background/setting")
        .and_then(Value::as_str)
        .unwrap_or("dynamic environment");
    format!(
        "You are a fashion product copywriter.\n\
         \n\
         Product features:\n\
         {features_json}\n\
         \n\
         Photography scenario:\n\
         The product will be photographed in: {setting}\n\
         \n\
         Brand identity:\n\
         {brand_identity}\n\
         \n\
         Write a complete product description (3-5 sentences) in the tone of the brand identity.\n\
         Be specific about the product's color, material, fit, and style.\n\
         Match the description to the photography scenario's atmosphere.\n\
         \n\
         IMPORTANT:\n\
         - DO NOT mention any brand names or the filename in the description\n\
         - Write in a general, engaging tone without referencing specific brands\n\
         - Focus on the product itself and its features\n\
         \n\
         Return ONLY the description text. No JSON, no markdown, no extra formatting."
    )
}

/// Debate role one: argues for the model's settings on the numbers alone.
pub fn optimizer_argument(prediction: &PredictionResult) -> String {
    format!(
        "You are a data-driven optimizer for e-commerce product photography.\n\
         \n\
         Your role: Advocate for proven, high-converting image settings based on model analysis.\n\
         \n\
         MODEL PREDICTION:\n\
         {settings}\n\
         \n\
         EXPECTED ENGAGEMENT RATE: {rate:.2}%\n\
         MODEL CONFIDENCE: {confidence:.1}%\n\
         \n\
         REASONING:\n\
         {reasoning}\n\
         \n\
         Make your case for following this data-driven approach. Be specific about:\n\
         1. Why these settings are predicted to perform well\n\
         2. What the data shows about similar products\n\
         3. The business value of optimizing for engagement\n\
         \n\
         CRITICAL: Keep your argument VERY concise - maximum 100 words (about 5-6 sentences). \
         Focus only on the most important facts and performance metrics. Be direct and specific.",
        settings = pretty(&settings_json(&prediction.image_settings)),
        rate = prediction.predicted_rate * 100.0,
        confidence = prediction.confidence * 100.0,
        reasoning = prediction.reasoning,
    )
}

/// Debate role two: pushes back on behalf of the brand.
pub fn creative_argument(
    prediction: &PredictionResult,
    features: &ProductFeatures,
    brand_identity: &str,
) -> String {
    format!(
        "You are a creative strategist for e-commerce product photography.\n\
         \n\
         Your role: Balance data-driven decisions with creative brand differentiation.\n\
         \n\
         BRAND IDENTITY:\n\
         {brand_identity}\n\
         \n\
         PRODUCT:\n\
         {features}\n\
         \n\
         MODEL RECOMMENDATION:\n\
         {settings}\n\
         \n\
         While data shows these settings perform well, consider:\n\
         1. Does this align with our brand identity?\n\
         2. Are we differentiating from competitors or following generic trends?\n\
         3. Could creative alternatives create stronger brand recall?\n\
         4. What about visual storytelling and emotional connection?\n\
         \n\
         Provide your perspective:\n\
         - If the recommended settings align with the brand, acknowledge and suggest minor enhancements\n\
         - If they feel generic, propose creative alternatives that still consider performance\n\
         - Balance creativity with business goals\n\
         \n\
         CRITICAL: Keep your argument VERY concise - maximum 100 words (about 5-6 sentences). \
         Be constructive and specific.",
        features = pretty(&features_json(features)),
        settings = pretty(&settings_json(&prediction.image_settings)),
    )
}

/// Debate role three: synthesizes the final decision as strict JSON.
pub fn moderator_decision(
    optimizer: &str,
    creative: &str,
    prediction: &PredictionResult,
    features: &ProductFeatures,
) -> String {
    format!(
        "You are a moderator synthesizing the best decision from two perspectives.\n\
         \n\
         PRODUCT FEATURES:\n\
         {features}\n\
         \n\
         MODEL PREDICTION (Data-Driven):\n\
         {settings}\n\
         Predicted engagement: {rate:.2}%\n\
         \n\
         OPTIMIZER'S ARGUMENT (Data-Driven):\n\
         {optimizer}\n\
         \n\
         CREATIVE'S ARGUMENT (Brand Differentiation):\n\
         {creative}\n\
         \n\
         Your task: Build consensus and decide final image settings.\n\
         \n\
         Consider:\n\
         1. Both perspectives have merit - find the balanced approach\n\
         2. Can we keep high-performing settings while adding creative touches?\n\
         3. Which settings are most critical for engagement vs brand differentiation?\n\
         \n\
         {valid_values}\n\
         \n\
         Respond with JSON in this exact format:\n\
         {{\n\
           \"final_image_settings\": {{\n\
             \"style\": \"chosen_style\",\n\
             \"lighting\": \"chosen_lighting\",\n\
             \"background\": \"chosen_background\",\n\
             \"pose\": \"chosen_pose\",\n\
             \"expression\": \"chosen_expression\",\n\
             \"angle\": \"chosen_angle\"\n\
           }},\n\
           \"reasoning\": \"2-3 sentence explanation of your synthesis\",\n\
           \"consensus_type\": \"full_agreement\" | \"hybrid_approach\" | \"creative_override\"\n\
         }}\n\
         \n\
         CRITICAL: Respond with ONLY valid JSON. No markdown code fences, no extra text. \
         Only use the exact valid values listed above.",
        features = pretty(&features_json(features)),
        settings = pretty(&settings_json(&prediction.image_settings)),
        rate = prediction.predicted_rate * 100.0,
        valid_values = valid_values_block(),
    )
}

/// Edit-style prompt for refining an already-accepted image from free-text
/// feedback. The generated image itself is the reference, so the model makes
/// targeted edits instead of reshooting from scratch.
pub fn refinement_edit(feedback: &str) -> String {
    format!(
        "Edit this fashion product photograph: {feedback}. \
         Keep everything else exactly the same - same person, same garment, \
         same setting, same lighting. The garment must remain exactly as shown. \
         No other people in the image. Return a photorealistic image only."
    )
}
