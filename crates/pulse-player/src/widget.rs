//! Seams to the survey widget and the document's stylesheets.

use async_trait::async_trait;
use pulse_protocol::ThemeTokens;
use serde_json::Value;

/// Failures reported by the widget or style host.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WidgetError {
    #[error("survey widget is not mounted")]
    NotMounted,

    #[error("survey {survey_id} could not be presented: {reason}")]
    Present { survey_id: String, reason: String },

    #[error("unknown trigger '{0}'")]
    UnknownTrigger(String),

    #[error("Theme stylesheet failed to load: {0}")]
    Stylesheet(String),

    #[error("inline CSS rejected: {0}")]
    InlineCss(String),
}

/// The survey widget living inside the player document.
#[async_trait]
pub trait SurveyWidget: Send + Sync {
    /// Ask the widget to show a survey. Success means the call was accepted,
    /// not that anything is visible yet.
    async fn present(&self, survey_id: &str, force: bool) -> Result<(), WidgetError>;

    async fn dismiss(&self) -> Result<(), WidgetError>;

    async fn trigger(&self, command: &str, args: &[Value]) -> Result<(), WidgetError>;
}

/// Theme stylesheet, inline CSS and design tokens of the player document.
#[async_trait]
pub trait StyleHost: Send + Sync {
    /// Swap the theme stylesheet link; `None` removes it. Resolves once the
    /// new sheet has loaded.
    async fn load_stylesheet(&self, href: Option<&str>) -> Result<(), WidgetError>;

    /// Swap the inline style block; `None` removes it.
    async fn set_inline_css(&self, css: Option<&str>) -> Result<(), WidgetError>;

    /// Publish the merged token set to the widget.
    fn apply_tokens(&self, tokens: &ThemeTokens);
}
