//! Element vocabulary shared by the workspace and every host backend.
//!
//! [`ElementKind`] tags what a host should create and which optional
//! capabilities the element has; [`PlaceOptions`] carries the per-kind
//! construction details that the core passes through untouched.

use crate::grid::GridExtent;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Opaque identity of a host-side element (control, handle or surface).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementHandle(pub u64);

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kinds of control a caller can place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ElementKind {
    Button,
    Label,
    Input,
    CheckBox,
    Dropdown,
    Slider,
    Image,
    Plot,
    Table,
    Frame,
}

impl ElementKind {
    /// Whether a click (press + release without movement) activates the
    /// element.
    pub fn supports_activation(&self) -> bool {
        matches!(self, ElementKind::Button | ElementKind::CheckBox)
    }

    /// Grid size used when the caller does not give one.
    pub fn default_extent(&self) -> GridExtent {
        let (cols, rows) = match self {
            ElementKind::Button
            | ElementKind::Label
            | ElementKind::Input
            | ElementKind::CheckBox
            | ElementKind::Dropdown => (2, 1),
            ElementKind::Slider => (4, 1),
            ElementKind::Image => (2, 2),
            ElementKind::Plot => (4, 3),
            ElementKind::Table => (4, 4),
            ElementKind::Frame => (1, 1),
        };
        GridExtent { cols, rows }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::Button => "button",
            ElementKind::Label => "label",
            ElementKind::Input => "input",
            ElementKind::CheckBox => "checkbox",
            ElementKind::Dropdown => "dropdown",
            ElementKind::Slider => "slider",
            ElementKind::Image => "image",
            ElementKind::Plot => "plot",
            ElementKind::Table => "table",
            ElementKind::Frame => "frame",
        };
        f.write_str(name)
    }
}

/// Parse a kind name (case-insensitive; accepts aliases like "btn", "text").
pub fn parse_kind(s: &str) -> Option<ElementKind> {
    let normalized: String = s
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(|c| c.to_lowercase())
        .collect();
    match normalized.as_str() {
        "button" | "btn" => Some(ElementKind::Button),
        "label" | "text" | "write" => Some(ElementKind::Label),
        "input" | "entry" | "number" => Some(ElementKind::Input),
        "checkbox" => Some(ElementKind::CheckBox),
        "dropdown" | "optionmenu" => Some(ElementKind::Dropdown),
        "slider" | "scale" => Some(ElementKind::Slider),
        "image" => Some(ElementKind::Image),
        "plot" | "chart" => Some(ElementKind::Plot),
        "table" => Some(ElementKind::Table),
        "frame" => Some(ElementKind::Frame),
        _ => None,
    }
}

impl<'de> Deserialize<'de> for ElementKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_kind(&s).ok_or_else(|| DeError::custom(format!("invalid element kind: {:?}", s)))
    }
}

/// Inclusive bounds for a numeric input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: i64,
    pub max: i64,
}

impl NumericRange {
    /// Hint text shown in an empty numeric input.
    pub fn placeholder(&self) -> String {
        format!("{}-{}", self.min, self.max)
    }

    /// Filter the current text of a numeric input.
    ///
    /// Returns the value to report, or `None` when the text must be
    /// silently dropped: empty, not an optionally negative run of ASCII
    /// digits, or outside `[min, max]`.
    pub fn accept(&self, text: &str) -> Option<i64> {
        if text.is_empty() {
            return None;
        }
        let digits = text.strip_prefix('-').unwrap_or(text);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value: i64 = text.parse().ok()?;
        (self.min..=self.max).contains(&value).then_some(value)
    }
}

/// Construction details passed through to the host.
///
/// Everything is optional; hosts ignore fields that make no sense for the
/// kind they create.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceOptions {
    /// Caption, label text or placeholder.
    pub text: Option<String>,
    /// Value handed to the activation callback of a button.
    pub value: Option<String>,
    /// Dropdown entries or table column headers.
    pub items: Vec<String>,
    /// Image source path.
    pub source: Option<String>,
    /// Restrict an input to integers in a range.
    pub numeric: Option<NumericRange>,
}

impl PlaceOptions {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Options for a numeric input; the placeholder shows the range.
    pub fn numeric(min: i64, max: i64) -> Self {
        let range = NumericRange { min, max };
        Self {
            text: Some(range.placeholder()),
            numeric: Some(range),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_kind_accepts_aliases() {
        assert_eq!(parse_kind("Button"), Some(ElementKind::Button));
        assert_eq!(parse_kind("btn"), Some(ElementKind::Button));
        assert_eq!(parse_kind("check_box"), Some(ElementKind::CheckBox));
        assert_eq!(parse_kind("TEXT"), Some(ElementKind::Label));
        assert_eq!(parse_kind("nope"), None);
    }

    #[test]
    fn kind_round_trips_through_display() {
        for kind in [
            ElementKind::Button,
            ElementKind::Label,
            ElementKind::Input,
            ElementKind::CheckBox,
            ElementKind::Dropdown,
            ElementKind::Slider,
            ElementKind::Image,
            ElementKind::Plot,
            ElementKind::Table,
            ElementKind::Frame,
        ] {
            assert_eq!(parse_kind(&kind.to_string()), Some(kind));
        }
    }

    #[test]
    fn only_buttons_and_checkboxes_activate() {
        assert!(ElementKind::Button.supports_activation());
        assert!(ElementKind::CheckBox.supports_activation());
        assert!(!ElementKind::Label.supports_activation());
        assert!(!ElementKind::Plot.supports_activation());
    }

    #[test]
    fn default_extents() {
        assert_eq!(ElementKind::Button.default_extent(), GridExtent { cols: 2, rows: 1 });
        assert_eq!(ElementKind::Slider.default_extent(), GridExtent { cols: 4, rows: 1 });
        assert_eq!(ElementKind::Plot.default_extent(), GridExtent { cols: 4, rows: 3 });
        assert_eq!(ElementKind::Table.default_extent(), GridExtent { cols: 4, rows: 4 });
    }

    #[test]
    fn numeric_filter_accepts_in_range() {
        let r = NumericRange { min: -10, max: 100 };
        assert_eq!(r.accept("42"), Some(42));
        assert_eq!(r.accept("-7"), Some(-7));
        assert_eq!(r.accept("100"), Some(100));
    }

    #[test]
    fn numeric_filter_rejects_silently() {
        let r = NumericRange { min: 0, max: 100 };
        assert_eq!(r.accept(""), None);
        assert_eq!(r.accept("-"), None);
        assert_eq!(r.accept("12a"), None);
        assert_eq!(r.accept("+5"), None);
        assert_eq!(r.accept("101"), None);
        assert_eq!(r.accept("-1"), None);
        assert_eq!(r.accept("99999999999999999999999"), None);
    }

    #[test]
    fn numeric_options_carry_placeholder() {
        let opts = PlaceOptions::numeric(0, 100);
        assert_eq!(opts.text.as_deref(), Some("0-100"));
        assert_eq!(opts.numeric, Some(NumericRange { min: 0, max: 100 }));
    }

    #[test]
    fn options_deserialize_partial() {
        let opts: PlaceOptions = serde_json::from_str(r#"{"text":"Go"}"#).unwrap();
        assert_eq!(opts.text.as_deref(), Some("Go"));
        assert!(opts.items.is_empty());
        assert_eq!(opts.numeric, None);
    }
}
