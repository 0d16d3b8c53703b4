use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

const DEFAULT_FPS: u32 = 24;
const MIN_FPS: i64 = 12;
const MAX_FPS: i64 = 60;
const DEFAULT_DURATION: f64 = 10.0;
const DEFAULT_INTENSITY: f64 = 60.0;
const MAX_EXTRA_ZOOM: f64 = 0.5;

/// Output resolution preset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Resolution {
    P720,
    #[default]
    P1080,
    K4,
}

impl Resolution {
    /// Unrecognized labels fall back to 1080p.
    pub fn from_label(label: &str) -> Self {
        match label {
            "4k" => Resolution::K4,
            "720p" => Resolution::P720,
            _ => Resolution::P1080,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Resolution::P720 => "720p",
            Resolution::P1080 => "1080p",
            Resolution::K4 => "4k",
        }
    }

    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Resolution::P720 => (1280, 720),
            Resolution::P1080 => (1920, 1080),
            Resolution::K4 => (3840, 2160),
        }
    }
}

impl Serialize for Resolution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Resolution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value.as_str().map(Resolution::from_label).unwrap_or_default())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filenames {
    #[serde(deserialize_with = "lenient::string")]
    pub image: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub audio: Option<String>,
}

/// Render configuration as submitted by a client.
///
/// Parsing never rejects a document: malformed or missing fields fall back
/// to `None`/defaults and are resolved by [`RenderMeta::normalize`]. Prompt,
/// style strength and seed are carried along but not used by the encoder.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderMeta {
    #[serde(deserialize_with = "lenient::string")]
    pub prompt: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub negative_prompt: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub intensity: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub style_strength: Option<f64>,
    #[serde(deserialize_with = "lenient::string")]
    pub seed: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub frame_rate: Option<f64>,
    pub resolution: Option<Resolution>,
    #[serde(deserialize_with = "lenient::timestamps")]
    pub beats: Vec<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub bpm: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub duration: Option<f64>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub filenames: Filenames,
}

/// Encoder-facing parameters derived from a [`RenderMeta`].
#[derive(Clone, Debug, PartialEq)]
pub struct RenderParams {
    pub fps: u32,
    /// Whole seconds, at least 1
    pub duration: u32,
    /// Zoom factor reached at the end of the clip (starts at 1.0)
    pub end_zoom: f64,
    pub resolution: Resolution,
    /// Finite, non-negative and sorted
    pub beats: Vec<f64>,
}

impl RenderMeta {
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn normalize(&self) -> RenderParams {
        // zero or unparsable frame rates fall back to the default before clamping
        let fps = match self.frame_rate.filter(|f| f.is_finite()).map(|f| f.trunc() as i64) {
            Some(f) if f != 0 => f.clamp(MIN_FPS, MAX_FPS) as u32,
            _ => DEFAULT_FPS,
        };

        let duration = match self.duration.filter(|d| d.is_finite() && *d != 0.0) {
            Some(d) => d.floor().max(1.0) as u32,
            None => DEFAULT_DURATION as u32,
        };

        let intensity = self
            .intensity
            .filter(|i| i.is_finite())
            .unwrap_or(DEFAULT_INTENSITY)
            .max(0.0);
        let end_zoom = 1.0 + (intensity / 300.0).min(MAX_EXTRA_ZOOM);

        let mut beats: Vec<f64> = self
            .beats
            .iter()
            .copied()
            .filter(|t| t.is_finite() && *t >= 0.0)
            .collect();
        beats.sort_by(|a, b| a.total_cmp(b));

        RenderParams {
            fps,
            duration,
            end_zoom,
            resolution: self.resolution.unwrap_or_default(),
            beats,
        }
    }
}

/// Field deserializers that map anything unexpected to "absent".
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_number(&s),
            _ => None,
        })
    }

    pub fn string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn timestamps<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items.iter().filter_map(Value::as_f64).collect(),
            _ => Vec::new(),
        })
    }

    /// Full float parse, else the leading integer ("30fps" -> 30).
    pub(super) fn parse_number(text: &str) -> Option<f64> {
        let text = text.trim();
        if let Ok(value) = text.parse::<f64>() {
            return Some(value);
        }
        let end = text
            .char_indices()
            .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
            .map_or(text.len(), |(i, _)| i);
        text[..end].parse::<i64>().ok().map(|v| v as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_mapping() {
        assert_eq!(Resolution::from_label("4k").dimensions(), (3840, 2160));
        assert_eq!(Resolution::from_label("720p").dimensions(), (1280, 720));
        assert_eq!(Resolution::from_label("1080p").dimensions(), (1920, 1080));
        assert_eq!(Resolution::from_label("8k").dimensions(), (1920, 1080));
    }

    #[test]
    fn defaults_for_empty_document() {
        let meta = RenderMeta::from_json(b"{}").unwrap();
        let params = meta.normalize();

        assert_eq!(params.fps, 24);
        assert_eq!(params.duration, 10);
        assert!((params.end_zoom - 1.2).abs() < 1e-9);
        assert_eq!(params.resolution, Resolution::P1080);
        assert!(params.beats.is_empty());
    }

    #[test]
    fn parses_reference_client_payload() {
        let json = br#"{
            "prompt": "surreal motion graphics",
            "negativePrompt": "text, watermark",
            "intensity": 90,
            "styleStrength": 55,
            "seed": "random",
            "frameRate": 30,
            "resolution": "4k",
            "beats": [0.5, 1.0, 1.52],
            "bpm": 118,
            "duration": 184.7,
            "filenames": { "image": "cover.png", "audio": "song.mp3" }
        }"#;
        let meta = RenderMeta::from_json(json).unwrap();

        assert_eq!(meta.seed.as_deref(), Some("random"));
        assert_eq!(meta.filenames.audio.as_deref(), Some("song.mp3"));
        assert_eq!(meta.bpm, Some(118.0));

        let params = meta.normalize();
        assert_eq!(params.fps, 30);
        assert_eq!(params.duration, 184);
        assert!((params.end_zoom - 1.3).abs() < 1e-9);
        assert_eq!(params.resolution, Resolution::K4);
        assert_eq!(params.beats, vec![0.5, 1.0, 1.52]);
    }

    #[test]
    fn frame_rate_is_clamped_and_defaulted() {
        let fps = |json: &str| RenderMeta::from_json(json.as_bytes()).unwrap().normalize().fps;

        assert_eq!(fps(r#"{"frameRate": 120}"#), 60);
        assert_eq!(fps(r#"{"frameRate": 5}"#), 12);
        assert_eq!(fps(r#"{"frameRate": -5}"#), 12);
        assert_eq!(fps(r#"{"frameRate": 0}"#), 24);
        assert_eq!(fps(r#"{"frameRate": "30"}"#), 30);
        assert_eq!(fps(r#"{"frameRate": "25fps"}"#), 25);
        assert_eq!(fps(r#"{"frameRate": 29.97}"#), 29);
        assert_eq!(fps(r#"{"frameRate": "fast"}"#), 24);
        assert_eq!(fps(r#"{"frameRate": null}"#), 24);
    }

    #[test]
    fn duration_has_one_second_minimum() {
        let duration =
            |json: &str| RenderMeta::from_json(json.as_bytes()).unwrap().normalize().duration;

        assert_eq!(duration(r#"{"duration": 0.4}"#), 1);
        assert_eq!(duration(r#"{"duration": -3}"#), 1);
        assert_eq!(duration(r#"{"duration": 0}"#), 10);
        assert_eq!(duration(r#"{"duration": 61.9}"#), 61);
    }

    #[test]
    fn zoom_is_capped() {
        let zoom = |intensity: f64| {
            RenderMeta {
                intensity: Some(intensity),
                ..Default::default()
            }
            .normalize()
            .end_zoom
        };

        assert!((zoom(0.0) - 1.0).abs() < 1e-9);
        assert!((zoom(50.0) - (1.0 + 50.0 / 300.0)).abs() < 1e-9);
        assert!((zoom(1000.0) - 1.5).abs() < 1e-9);
        assert!((zoom(-20.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn malformed_fields_are_normalized_not_rejected() {
        let json = br#"{
            "beats": "not a list",
            "resolution": 42,
            "intensity": "lots",
            "filenames": null
        }"#;
        let meta = RenderMeta::from_json(json).unwrap();
        assert!(meta.beats.is_empty());
        assert_eq!(meta.resolution, Some(Resolution::P1080));
        assert_eq!(meta.intensity, None);
        assert_eq!(meta.filenames, Filenames::default());
    }

    #[test]
    fn absent_resolution_stays_unset() {
        let meta = RenderMeta::from_json(br#"{"frameRate": 30}"#).unwrap();
        assert_eq!(meta.resolution, None);
        assert_eq!(meta.normalize().resolution, Resolution::P1080);

        let meta = RenderMeta::from_json(br#"{"resolution": null}"#).unwrap();
        assert_eq!(meta.resolution, None);
    }

    #[test]
    fn beats_are_filtered_and_sorted() {
        let meta = RenderMeta::from_json(br#"{"beats": [2.0, -1.0, "x", 0.5, 1.0]}"#).unwrap();
        assert_eq!(meta.normalize().beats, vec![0.5, 1.0, 2.0]);
    }

    #[test]
    fn leading_integer_parse() {
        assert_eq!(lenient::parse_number(" 48 "), Some(48.0));
        assert_eq!(lenient::parse_number("12.5"), Some(12.5));
        assert_eq!(lenient::parse_number("60hz"), Some(60.0));
        assert_eq!(lenient::parse_number("hz"), None);
    }
}
