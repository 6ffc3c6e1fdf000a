//! Typed payloads for handshake, command and reply envelopes.
//!
//! Responder-side parsing is lenient in the same places the player has always
//! been lenient: token fields of the wrong JSON type are dropped rather than
//! failing the whole command.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::geometry::{GeometrySnapshot, Placement, WidgetGeometry};

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

/// Accept any JSON value, keeping it only if it has the expected type.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Distinguish an explicit `null` (`Some(None)`) from an absent key (`None`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// `hello`: the player announces itself and its capabilities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloPayload {
    #[serde(default)]
    pub player_version: String,
    #[serde(default)]
    pub supports: Vec<String>,
}

/// Theme tokens shared by `init`, `applyTheme` and `setTokens`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeTokens {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub density: Option<f64>,
}

impl ThemeTokens {
    pub fn is_empty(&self) -> bool {
        self.brand.is_none() && self.radius.is_none() && self.density.is_none()
    }

    /// Overlay every field set in `other` onto `self`.
    pub fn merge(&mut self, other: &ThemeTokens) {
        if other.brand.is_some() {
            self.brand.clone_from(&other.brand);
        }
        if other.radius.is_some() {
            self.radius = other.radius;
        }
        if other.density.is_some() {
            self.density = other.density;
        }
    }
}

/// `init`: bootstrap parameters sent by the bridge in reply to `hello`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitPayload {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub density: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub tokens: Option<ThemeTokens>,
}

/// `ready`: the player finished initializing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyPayload {
    #[serde(default)]
    pub player_version: String,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// `present`: show a survey.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_id: Option<Value>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub force: bool,
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

impl PresentPayload {
    pub fn new(survey_id: impl Into<String>, force: bool) -> Self {
        Self {
            survey_id: Some(Value::String(survey_id.into())),
            force,
        }
    }

    /// The survey id as a trimmed string. Strings and numbers are accepted;
    /// anything blank or of another type yields `None`.
    pub fn survey_id(&self) -> Option<String> {
        let raw = match self.survey_id.as_ref()? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!raw.is_empty()).then_some(raw)
    }
}

/// `applyTheme`: swap the theme stylesheet, inline CSS and tokens.
///
/// For `href` and `css`, an absent key leaves the current value untouched
/// while an explicit `null` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyThemePayload {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub href: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub css: Option<Option<String>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub tokens: Option<ThemeTokens>,
}

impl ApplyThemePayload {
    pub fn stylesheet(href: impl Into<String>) -> Self {
        Self {
            href: Some(Some(href.into())),
            ..Default::default()
        }
    }

    pub fn inline_css(css: impl Into<String>) -> Self {
        Self {
            css: Some(Some(css.into())),
            ..Default::default()
        }
    }
}

/// `trigger`: fire a behavioral trigger inside the player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub command: String,
    #[serde(default, deserialize_with = "lenient_args")]
    pub args: Vec<Value>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient::<D, String>(deserializer)?.unwrap_or_default())
}

fn lenient_args<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient::<D, Vec<Value>>(deserializer)?.unwrap_or_default())
}

/// `setPlacement`: move the widget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetPlacementPayload {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// Payload of a `status` envelope: an acknowledgement or an unsolicited
/// broadcast. Fields beyond the well-known ones are preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    #[serde(default = "default_true")]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<WidgetGeometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for StatusPayload {
    fn default() -> Self {
        Self {
            ok: true,
            event: None,
            widget: None,
            placement: None,
            extra: Map::new(),
        }
    }
}

impl StatusPayload {
    /// A successful status tagged with `event`.
    pub fn event(event: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            ..Default::default()
        }
    }

    /// A failed status tagged with `event`.
    pub fn failure(event: impl Into<String>) -> Self {
        Self {
            ok: false,
            event: Some(event.into()),
            ..Default::default()
        }
    }

    /// Attach an extra field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// Attach widget geometry and placement from a snapshot, keeping any
    /// values already set.
    pub fn with_geometry(mut self, snapshot: &GeometrySnapshot) -> Self {
        if self.widget.is_none() {
            self.widget = Some(snapshot.widget);
        }
        if self.placement.is_none() {
            self.placement = Some(snapshot.placement.clone());
        }
        self
    }

    /// Attach only the placement, keeping any value already set.
    pub fn with_placement(mut self, placement: &Placement) -> Self {
        if self.placement.is_none() {
            self.placement = Some(placement.clone());
        }
        self
    }

    /// Lenient conversion used for replies that are not `status` envelopes
    /// (`pong`, `ready`): anything that is not an object becomes `{ok:true}`.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_common::{Bounds, Viewport};
    use serde_json::json;

    #[test]
    fn hello_uses_camel_case() {
        let hello: HelloPayload = serde_json::from_value(json!({
            "playerVersion": "2025-10-09-01",
            "supports": ["present", "ping"]
        }))
        .unwrap();
        assert_eq!(hello.player_version, "2025-10-09-01");
        assert_eq!(hello.supports, vec!["present", "ping"]);
    }

    #[test]
    fn tokens_drop_wrongly_typed_fields() {
        let tokens: ThemeTokens = serde_json::from_value(json!({
            "brand": 42, "radius": 8, "density": "tight", "shadow": true
        }))
        .unwrap();
        assert_eq!(tokens.brand, None);
        assert_eq!(tokens.radius, Some(8.0));
        assert_eq!(tokens.density, None);
    }

    #[test]
    fn tokens_merge_overlays_set_fields() {
        let mut base = ThemeTokens {
            brand: Some("#000".into()),
            radius: Some(4.0),
            density: None,
        };
        base.merge(&ThemeTokens {
            brand: None,
            radius: Some(12.0),
            density: Some(1.5),
        });
        assert_eq!(base.brand.as_deref(), Some("#000"));
        assert_eq!(base.radius, Some(12.0));
        assert_eq!(base.density, Some(1.5));
    }

    #[test]
    fn present_survey_id_accepts_strings_and_numbers() {
        let p: PresentPayload = serde_json::from_value(json!({ "surveyId": " 1234 " })).unwrap();
        assert_eq!(p.survey_id().as_deref(), Some("1234"));
        assert!(!p.force);

        let p: PresentPayload =
            serde_json::from_value(json!({ "surveyId": 99, "force": 1 })).unwrap();
        assert_eq!(p.survey_id().as_deref(), Some("99"));
        assert!(p.force);

        let p: PresentPayload = serde_json::from_value(json!({ "surveyId": "  " })).unwrap();
        assert_eq!(p.survey_id(), None);

        let p: PresentPayload = serde_json::from_value(json!({})).unwrap();
        assert_eq!(p.survey_id(), None);
    }

    #[test]
    fn apply_theme_distinguishes_null_from_absent() {
        let cleared: ApplyThemePayload =
            serde_json::from_value(json!({ "href": null })).unwrap();
        assert_eq!(cleared.href, Some(None));
        assert_eq!(cleared.css, None);

        let set: ApplyThemePayload =
            serde_json::from_value(json!({ "href": "/t.css", "css": ".a{}" })).unwrap();
        assert_eq!(set.href, Some(Some("/t.css".into())));
        assert_eq!(set.css, Some(Some(".a{}".into())));
    }

    #[test]
    fn apply_theme_serializes_only_present_keys() {
        let value = serde_json::to_value(ApplyThemePayload::stylesheet("/t.css")).unwrap();
        assert_eq!(value, json!({ "href": "/t.css" }));
    }

    #[test]
    fn trigger_tolerates_missing_fields() {
        let t: TriggerPayload = serde_json::from_value(json!({ "args": "nope" })).unwrap();
        assert_eq!(t.command, "");
        assert!(t.args.is_empty());
    }

    #[test]
    fn status_preserves_unknown_fields() {
        let value = json!({ "ok": true, "event": "present-called", "surveyId": "1234" });
        let status: StatusPayload = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(status.event.as_deref(), Some("present-called"));
        assert_eq!(status.extra["surveyId"], "1234");
        assert_eq!(serde_json::to_value(&status).unwrap(), value);
    }

    #[test]
    fn status_ok_defaults_to_true() {
        let status = StatusPayload::from_value(&json!({}));
        assert!(status.ok);
        let status = StatusPayload::from_value(&Value::Null);
        assert!(status.ok);
    }

    #[test]
    fn status_with_geometry_keeps_explicit_placement() {
        let snapshot = GeometrySnapshot::visible(
            Bounds::new(0.0, 0.0, 10.0, 10.0),
            Placement::parse("BR").unwrap(),
            Viewport::new(100.0, 100.0),
        );
        let status = StatusPayload::event("set-placement")
            .with_placement(&Placement::parse("TL").unwrap())
            .with_geometry(&snapshot);
        assert_eq!(status.placement.unwrap().as_str(), "TL");
        assert!(status.widget.unwrap().visible);
    }
}
