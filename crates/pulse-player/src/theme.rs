//! Theme token sanitization.
//!
//! Tokens arrive from the host page and end up in generated widget CSS, so
//! only a few safe formats survive:
//! - `brand`: hex colors (`#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`) or
//!   `rgb()`/`rgba()` with numeric arguments
//! - `radius`, `density`: finite, non-negative numbers
//!
//! A brand value containing `expression(`, `url(`, `javascript:`, `@import`
//! or a structural character (`;`, `{`, `}`, `<`, `>`) is always rejected.

use pulse_protocol::ThemeTokens;
use tracing::warn;

/// Why a token value was dropped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TokenError {
    #[error("empty color value")]
    Empty,

    #[error("CSS injection blocked: contains '{0}'")]
    Injection(String),

    #[error("hex color needs 3, 4, 6 or 8 digits, got {0}")]
    HexLength(usize),

    #[error("non-hex digit in '{0}'")]
    HexDigit(String),

    #[error("malformed color function '{0}'")]
    MalformedFunction(String),

    #[error("{function}() takes {expected} arguments, got {got}")]
    Arity {
        function: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("non-numeric argument '{0}'")]
    NonNumeric(String),

    #[error("only hex and rgb()/rgba() colors are allowed, got '{0}'")]
    UnsupportedColor(String),

    #[error("{0} must be a finite, non-negative number")]
    OutOfRange(&'static str),
}

const BLOCKED_PATTERNS: [&str; 9] = [
    "expression(",
    "url(",
    "javascript:",
    "eval(",
    "import",
    "@import",
    "@charset",
    "behavior:",
    "-moz-binding",
];

const BLOCKED_CHARS: [char; 5] = [';', '{', '}', '<', '>'];

// =============================================================================
// VALIDATION
// =============================================================================

/// Validate a brand color, returning it trimmed.
pub fn validate_css_color(value: &str) -> Result<&str, TokenError> {
    let color = value.trim();
    if color.is_empty() {
        return Err(TokenError::Empty);
    }
    reject_injection(color)?;

    if let Some(digits) = color.strip_prefix('#') {
        check_hex_digits(digits)?;
    } else if color.starts_with("rgb(") || color.starts_with("rgba(") {
        check_rgb_function(color)?;
    } else {
        return Err(TokenError::UnsupportedColor(color.to_string()));
    }
    Ok(color)
}

/// Validate a numeric token such as `radius` or `density`.
pub fn validate_token_number(name: &'static str, value: f64) -> Result<f64, TokenError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(TokenError::OutOfRange(name))
    }
}

// =============================================================================
// SANITIZING
// =============================================================================

/// Keep only the token values that pass validation. Dropped values are
/// logged and otherwise ignored.
pub fn sanitize_tokens(tokens: &ThemeTokens) -> ThemeTokens {
    let brand = tokens
        .brand
        .as_deref()
        .and_then(|raw| keep("brand", validate_css_color(raw).map(str::to_string)));
    let radius = tokens
        .radius
        .and_then(|raw| keep("radius", validate_token_number("radius", raw)));
    let density = tokens
        .density
        .and_then(|raw| keep("density", validate_token_number("density", raw)));

    ThemeTokens {
        brand,
        radius,
        density,
    }
}

fn keep<T>(token: &str, result: Result<T, TokenError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(token, error = %e, "Dropping theme token");
            None
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn reject_injection(value: &str) -> Result<(), TokenError> {
    let lower = value.to_lowercase();
    if let Some(pattern) = BLOCKED_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(TokenError::Injection((*pattern).to_string()));
    }
    if let Some(ch) = value.chars().find(|c| BLOCKED_CHARS.contains(c)) {
        return Err(TokenError::Injection(ch.to_string()));
    }
    Ok(())
}

fn check_hex_digits(digits: &str) -> Result<(), TokenError> {
    if !matches!(digits.len(), 3 | 4 | 6 | 8) {
        return Err(TokenError::HexLength(digits.len()));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(TokenError::HexDigit(format!("#{digits}")));
    }
    Ok(())
}

fn check_rgb_function(value: &str) -> Result<(), TokenError> {
    let (function, expected, rest) = match value.strip_prefix("rgba(") {
        Some(rest) => ("rgba", 4, rest),
        None => ("rgb", 3, value.strip_prefix("rgb(").unwrap_or(value)),
    };
    let inner = rest
        .strip_suffix(')')
        .ok_or_else(|| TokenError::MalformedFunction(value.to_string()))?;

    let args: Vec<&str> = inner.split(',').map(str::trim).collect();
    if args.len() != expected {
        return Err(TokenError::Arity {
            function,
            expected,
            got: args.len(),
        });
    }
    if let Some(bad) = args.iter().find(|arg| arg.parse::<f64>().is_err()) {
        return Err(TokenError::NonNumeric((*bad).to_string()));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // --- Colors ---

    #[test]
    fn hex_colors_of_every_length() {
        for color in ["#fff", "#fffa", "#00d4ff", "#00d4ff80"] {
            assert_eq!(validate_css_color(color), Ok(color));
        }
    }

    #[test]
    fn color_is_trimmed() {
        assert_eq!(validate_css_color("  #336699 "), Ok("#336699"));
    }

    #[test]
    fn hex_wrong_length() {
        assert_eq!(validate_css_color("#ff"), Err(TokenError::HexLength(2)));
        assert_eq!(validate_css_color("#fffff"), Err(TokenError::HexLength(5)));
    }

    #[test]
    fn hex_non_hex_digit() {
        assert!(matches!(
            validate_css_color("#gggggg"),
            Err(TokenError::HexDigit(_))
        ));
    }

    #[test]
    fn rgb_and_rgba() {
        assert!(validate_css_color("rgb(255, 0, 0)").is_ok());
        assert!(validate_css_color("rgba(0,212,255,0.12)").is_ok());
    }

    #[test]
    fn rgb_wrong_arity() {
        assert_eq!(
            validate_css_color("rgb(1, 2)"),
            Err(TokenError::Arity {
                function: "rgb",
                expected: 3,
                got: 2
            })
        );
        assert!(matches!(
            validate_css_color("rgba(1, 2, 3)"),
            Err(TokenError::Arity { expected: 4, .. })
        ));
    }

    #[test]
    fn rgb_non_numeric() {
        assert_eq!(
            validate_css_color("rgb(red, 0, 0)"),
            Err(TokenError::NonNumeric("red".into()))
        );
    }

    #[test]
    fn rgb_unclosed() {
        assert!(matches!(
            validate_css_color("rgb(1, 2, 3"),
            Err(TokenError::MalformedFunction(_))
        ));
    }

    #[test]
    fn named_colors_rejected() {
        assert!(matches!(
            validate_css_color("rebeccapurple"),
            Err(TokenError::UnsupportedColor(_))
        ));
    }

    #[test]
    fn empty_color_rejected() {
        assert_eq!(validate_css_color("   "), Err(TokenError::Empty));
    }

    // --- Injection ---

    #[test]
    fn injection_patterns_blocked() {
        assert!(matches!(
            validate_css_color("url(javascript:alert(1))"),
            Err(TokenError::Injection(_))
        ));
        assert!(matches!(
            validate_css_color("EXPRESSION(alert(1))"),
            Err(TokenError::Injection(_))
        ));
        assert_eq!(
            validate_css_color("#fff; background: red"),
            Err(TokenError::Injection(";".into()))
        );
        assert_eq!(
            validate_css_color("#fff}</style>"),
            Err(TokenError::Injection("}".into()))
        );
    }

    // --- Numbers ---

    #[test]
    fn numeric_tokens() {
        assert_eq!(validate_token_number("radius", 8.0), Ok(8.0));
        assert_eq!(validate_token_number("radius", 0.0), Ok(0.0));
        assert_eq!(
            validate_token_number("density", -1.0),
            Err(TokenError::OutOfRange("density"))
        );
        assert!(validate_token_number("radius", f64::NAN).is_err());
        assert!(validate_token_number("radius", f64::INFINITY).is_err());
    }

    // --- Sanitizing ---

    #[test]
    fn sanitize_keeps_valid_tokens() {
        let tokens = ThemeTokens {
            brand: Some(" #0055ff ".into()),
            radius: Some(6.0),
            density: Some(1.0),
        };
        let clean = sanitize_tokens(&tokens);
        assert_eq!(clean.brand.as_deref(), Some("#0055ff"));
        assert_eq!(clean.radius, Some(6.0));
        assert_eq!(clean.density, Some(1.0));
    }

    #[test]
    fn sanitize_drops_invalid_tokens_individually() {
        let tokens = ThemeTokens {
            brand: Some("url(evil)".into()),
            radius: Some(-2.0),
            density: Some(0.5),
        };
        let clean = sanitize_tokens(&tokens);
        assert_eq!(clean.brand, None);
        assert_eq!(clean.radius, None);
        assert_eq!(clean.density, Some(0.5));
    }

    #[test]
    fn sanitize_empty_is_empty() {
        assert!(sanitize_tokens(&ThemeTokens::default()).is_empty());
    }
}
