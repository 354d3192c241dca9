use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A raw value did not match its closed vocabulary after alias resolution.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("invalid {field} '{value}'; must be one of: {}", .accepted.join(", "))]
pub struct ValidationError {
    pub field: &'static str,
    pub value: String,
    pub accepted: &'static [&'static str],
}

impl ValidationError {
    fn new(field: &'static str, value: &str, accepted: &'static [&'static str]) -> Self {
        ValidationError {
            field,
            value: value.to_string(),
            accepted,
        }
    }
}

macro_rules! vocabulary {
    ($name:ident, $field:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant,)+
        }

        impl $name {
            pub const FIELD: &'static str = $field;
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub const ACCEPTED: &'static [&'static str] = &[$($label),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            /// Matches an already-canonicalized label. Raw input goes through
            /// the `normalize_*` functions, which handle case and aliases.
            pub fn parse(value: &str) -> Result<Self, ValidationError> {
                match value {
                    $($label => Ok($name::$variant),)+
                    other => Err(ValidationError::new($field, other, Self::ACCEPTED)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary!(GarmentType, "garment_type", {
    Hoodie => "hoodie",
    Jacket => "jacket",
    Jeans => "jeans",
    TShirt => "t-shirt",
    ZipUpHoodie => "zip-up hoodie",
});

vocabulary!(Color, "color", {
    Black => "black",
    Colorful => "colorful",
    Dark => "dark",
    DarkGrey => "dark grey",
    Light => "light",
    White => "white",
});

vocabulary!(Fit, "fit", {
    Loose => "loose",
    Oversized => "oversized",
    Regular => "regular",
    Tight => "tight",
});

vocabulary!(Gender, "gender", {
    Female => "female",
    Male => "male",
    Unisex => "unisex",
});

vocabulary!(Style, "style", {
    CasualLifestyle => "casual_lifestyle",
    LifestyleIndoor => "lifestyle_indoor",
    LifestyleOutdoor => "lifestyle_outdoor",
    Streetwear => "streetwear",
    StudioMinimal => "studio_minimal",
    UrbanOutdoor => "urban_outdoor",
});

vocabulary!(Lighting, "lighting", {
    Dramatic => "dramatic",
    GoldenHour => "golden_hour",
    Natural => "natural",
    Overcast => "overcast",
    Studio => "studio",
});

vocabulary!(Background, "background", {
    BusyPattern => "busy_pattern",
    GraffitiWall => "graffiti_wall",
    NatureOutdoor => "nature_outdoor",
    NeutralWall => "neutral_wall",
    Park => "park",
    StudioGrey => "studio_grey",
    StudioWhite => "studio_white",
    UrbanStreet => "urban_street",
});

vocabulary!(Pose, "pose", {
    Action => "action",
    Casual => "casual",
    Dynamic => "dynamic",
    Sitting => "sitting",
    Standing => "standing",
    Walking => "walking",
});

vocabulary!(Expression, "expression", {
    Confident => "confident",
    Focused => "focused",
    Neutral => "neutral",
    Serious => "serious",
    Smiling => "smiling",
});

vocabulary!(Angle, "angle", {
    ThreeQuarter => "3/4",
    Back => "back",
    Front => "front",
    Side => "side",
});

fn canonicalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Fixed alias table applied before validation. Unknown synonyms are not
/// guessed at; they fail loudly in `parse`.
fn resolve_color_alias(value: &str) -> &str {
    match value {
        "grey" | "gray" | "dark gray" => "dark grey",
        other => other,
    }
}

fn resolve_garment_alias(value: &str) -> &str {
    match value {
        "tee" | "tshirt" | "t shirt" => "t-shirt",
        "zip hoodie" | "zip-up" | "zipup hoodie" => "zip-up hoodie",
        other => other,
    }
}

pub fn normalize_color(raw: &str) -> Result<Color, ValidationError> {
    let canonical = canonicalize(raw);
    Color::parse(resolve_color_alias(&canonical))
        .map_err(|_| ValidationError::new(Color::FIELD, raw, Color::ACCEPTED))
}

pub fn normalize_garment_type(raw: &str) -> Result<GarmentType, ValidationError> {
    let canonical = canonicalize(raw);
    GarmentType::parse(resolve_garment_alias(&canonical))
        .map_err(|_| ValidationError::new(GarmentType::FIELD, raw, GarmentType::ACCEPTED))
}

/// "Loose fit" and "loose" normalize identically: a trailing " fit" is part
/// of how suppliers label fits, not a distinct value.
pub fn normalize_fit(raw: &str) -> Result<Fit, ValidationError> {
    let canonical = canonicalize(raw);
    let trimmed = canonical.strip_suffix(" fit").unwrap_or(&canonical).trim();
    Fit::parse(trimmed).map_err(|_| ValidationError::new(Fit::FIELD, raw, Fit::ACCEPTED))
}

pub fn normalize_gender(raw: &str) -> Result<Gender, ValidationError> {
    let canonical = canonicalize(raw);
    Gender::parse(&canonical).map_err(|_| ValidationError::new(Gender::FIELD, raw, Gender::ACCEPTED))
}

/// Composition arrives either pre-formatted ("Shell: 100% Cotton") or as a
/// structured mapping. Mappings serialize deterministically in input order:
/// {"Shell": "60% Cotton", "Lining": "40% Polyester"} becomes
/// "Shell: 60% Cotton, Lining: 40% Polyester".
pub fn normalize_composition(raw: &Value) -> Result<String, ValidationError> {
    match raw {
        Value::String(text) => Ok(text.trim().to_string()),
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(key, value)| match value {
                    Value::String(text) => format!("{key}: {text}"),
                    other => format!("{key}: {other}"),
                })
                .collect();
            Ok(parts.join(", "))
        }
        Value::Null => Ok(String::new()),
        other => Err(ValidationError {
            field: "composition",
            value: other.to_string(),
            accepted: &["a string", "a mapping of material to percentage"],
        }),
    }
}

/// Canonical product features. Immutable once extracted; every downstream
/// stage consumes this form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductFeatures {
    pub garment_type: GarmentType,
    pub color: Color,
    pub fit: Fit,
    pub gender: Gender,
    #[serde(default)]
    pub composition: String,
    #[serde(default)]
    pub art_nr: String,
    #[serde(default)]
    pub image_ref: String,
}

impl ProductFeatures {
    /// Normalizes a raw feature object (typically LLM extraction output
    /// merged with catalog metadata) against the closed vocabularies.
    pub fn normalize(raw: &Value) -> Result<Self, ValidationError> {
        let text = |field: &'static str| -> Result<&str, ValidationError> {
            raw.get(field)
                .and_then(Value::as_str)
                .ok_or(ValidationError {
                    field: "features",
                    value: format!("missing field '{field}'"),
                    accepted: &["garment_type", "color", "fit", "gender"],
                })
        };

        Ok(ProductFeatures {
            garment_type: normalize_garment_type(text("garment_type")?)?,
            color: normalize_color(text("color")?)?,
            fit: normalize_fit(text("fit")?)?,
            gender: normalize_gender(text("gender")?)?,
            composition: normalize_composition(raw.get("composition").unwrap_or(&Value::Null))?,
            art_nr: raw
                .get("art_nr")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            image_ref: raw
                .get("image")
                .or_else(|| raw.get("image_ref"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }
}

/// The photography settings vector. Always treated as a whole; a value of
/// this type is valid by construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageSettings {
    pub style: Style,
    pub lighting: Lighting,
    pub background: Background,
    pub pose: Pose,
    pub expression: Expression,
    pub angle: Angle,
}

impl ImageSettings {
    /// Validates a loose JSON object (e.g. a moderator decision) into a
    /// settings vector. Fails on the first missing or out-of-vocabulary
    /// field.
    pub fn from_json(raw: &Value) -> Result<Self, ValidationError> {
        let field = |name: &'static str| -> Result<&str, ValidationError> {
            raw.get(name).and_then(Value::as_str).ok_or(ValidationError {
                field: "image_settings",
                value: format!("missing field '{name}'"),
                accepted: &["style", "lighting", "background", "pose", "expression", "angle"],
            })
        };

        Ok(ImageSettings {
            style: Style::parse(&canonicalize(field("style")?))?,
            lighting: Lighting::parse(&canonicalize(field("lighting")?))?,
            background: Background::parse(&canonicalize(field("background")?))?,
            pose: Pose::parse(&canonicalize(field("pose")?))?,
            expression: Expression::parse(&canonicalize(field("expression")?))?,
            angle: Angle::parse(&canonicalize(field("angle")?))?,
        })
    }

    /// Enumerates the full combination space in declaration order: style is
    /// the outermost axis, angle the innermost. The predictor's first-seen
    /// tie-break is defined over this order.
    pub fn enumerate_all() -> impl Iterator<Item = ImageSettings> {
        Style::ALL.iter().flat_map(|&style| {
            Lighting::ALL.iter().flat_map(move |&lighting| {
                Background::ALL.iter().flat_map(move |&background| {
                    Pose::ALL.iter().flat_map(move |&pose| {
                        Expression::ALL.iter().flat_map(move |&expression| {
                            Angle::ALL.iter().map(move |&angle| ImageSettings {
                                style,
                                lighting,
                                background,
                                pose,
                                expression,
                                angle,
                            })
                        })
                    })
                })
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_color("  Dark Grey ").unwrap(), Color::DarkGrey);
        assert_eq!(
            normalize_garment_type("Zip-up Hoodie").unwrap(),
            GarmentType::ZipUpHoodie
        );
        assert_eq!(normalize_gender("MALE").unwrap(), Gender::Male);
    }

    #[test]
    fn resolves_fixed_aliases() {
        assert_eq!(normalize_color("grey").unwrap(), Color::DarkGrey);
        assert_eq!(normalize_garment_type("tee").unwrap(), GarmentType::TShirt);
    }

    #[test]
    fn strips_fit_suffix() {
        assert_eq!(normalize_fit("Loose fit").unwrap(), Fit::Loose);
        assert_eq!(normalize_fit("oversized").unwrap(), Fit::Oversized);
    }

    #[test]
    fn rejects_unknown_values_with_field_and_accepted_list() {
        let err = normalize_color("mauve").unwrap_err();
        assert_eq!(err.field, "color");
        assert_eq!(err.value, "mauve");
        assert!(err.accepted.contains(&"black"));

        assert!(normalize_fit("baggy").is_err());
        assert!(normalize_garment_type("cardigan").is_err());
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_color("  GREY ").unwrap();
        let twice = normalize_color(once.as_str()).unwrap();
        assert_eq!(once, twice);

        let fit_once = normalize_fit("Regular Fit").unwrap();
        assert_eq!(normalize_fit(fit_once.as_str()).unwrap(), fit_once);
    }

    #[test]
    fn composition_mapping_preserves_input_order() {
        let raw = json!({"Shell": "60% Cotton", "Lining": "40% Polyester"});
        assert_eq!(
            normalize_composition(&raw).unwrap(),
            "Shell: 60% Cotton, Lining: 40% Polyester"
        );
        let reversed = json!({"Lining": "40% Polyester", "Shell": "60% Cotton"});
        assert_eq!(
            normalize_composition(&reversed).unwrap(),
            "Lining: 40% Polyester, Shell: 60% Cotton"
        );
    }

    #[test]
    fn composition_accepts_preformatted_string() {
        let raw = json!(" Shell: 100% Cotton ");
        assert_eq!(normalize_composition(&raw).unwrap(), "Shell: 100% Cotton");
    }

    #[test]
    fn image_settings_from_json_validates_every_field() {
        let valid = json!({
            "style": "streetwear",
            "lighting": "dramatic",
            "background": "urban_street",
            "pose": "dynamic",
            "expression": "confident",
            "angle": "front"
        });
        let settings = ImageSettings::from_json(&valid).unwrap();
        assert_eq!(settings.style, Style::Streetwear);
        assert_eq!(settings.angle, Angle::Front);

        let invalid = json!({
            "style": "nonexistent",
            "lighting": "dramatic",
            "background": "urban_street",
            "pose": "dynamic",
            "expression": "confident",
            "angle": "front"
        });
        assert!(ImageSettings::from_json(&invalid).is_err());

        let missing = json!({"style": "streetwear"});
        assert!(ImageSettings::from_json(&missing).is_err());
    }

    #[test]
    fn enumeration_order_starts_at_first_declared_combination() {
        let first = ImageSettings::enumerate_all().next().unwrap();
        assert_eq!(first.style, Style::CasualLifestyle);
        assert_eq!(first.lighting, Lighting::Dramatic);
        assert_eq!(first.background, Background::BusyPattern);
        assert_eq!(first.pose, Pose::Action);
        assert_eq!(first.expression, Expression::Confident);
        assert_eq!(first.angle, Angle::ThreeQuarter);
    }

    #[test]
    fn enumeration_covers_full_combination_space() {
        let expected = Style::ALL.len()
            * Lighting::ALL.len()
            * Background::ALL.len()
            * Pose::ALL.len()
            * Expression::ALL.len()
            * Angle::ALL.len();
        assert_eq!(ImageSettings::enumerate_all().count(), expected);
    }

    #[test]
    fn product_features_normalize_end_to_end() {
        let raw = json!({
            "garment_type": "Hoodie",
            "color": "Black",
            "fit": "Loose fit",
            "gender": "Male",
            "composition": {"Shell": "100% Cotton"},
            "art_nr": "HD-001",
            "image": "honda.jpg"
        });
        let features = ProductFeatures::normalize(&raw).unwrap();
        assert_eq!(features.garment_type, GarmentType::Hoodie);
        assert_eq!(features.composition, "Shell: 100% Cotton");
        assert_eq!(features.image_ref, "honda.jpg");
    }
}
