//! Phase registry.
//!
//! A [`Phase`] decides when a directive runs relative to the others matching
//! the same node. Published values leave numeric gaps so finer sub-phases can
//! be inserted with [`Phase::custom`] without renumbering.

use std::fmt;

/// Ordering bucket for directive execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Phase(i32);

/// Published phases and their band names, ascending.
const BANDS: &[(Phase, &str)] = &[
    (Phase::META, "meta"),
    (Phase::TESTING, "testing"),
    (Phase::ELIGIBILITY, "eligibility"),
    (Phase::PREPROCESSING, "preprocessing"),
    (Phase::CONTEXT, "context"),
    (Phase::EXPAND, "expand"),
    (Phase::MORPHING, "morphing"),
    (Phase::TOGGLE, "toggle"),
    (Phase::HTTP_HEADER, "http_header"),
    (Phase::HTTP_BODY, "http_body"),
    (Phase::HTTP_REQUEST, "http_request"),
    (Phase::HTTP_CONTENT, "http_content"),
    (Phase::HTTP_INTERACTIVITY, "http_interactivity"),
    (Phase::CONTENT, "content"),
    (Phase::ATTRIBUTE, "attribute"),
    (Phase::INTERACTIVITY, "interactivity"),
    (Phase::DISPLAY, "display"),
    (Phase::CUSTOM_ELEMENT, "custom_element"),
    (Phase::REFERENCE, "reference"),
    (Phase::CUSTOM_PROCESSING, "custom_processing"),
    (Phase::POSTPROCESSING, "postprocessing"),
];

impl Phase {
    /// Documentation-only directives. Never executed, stripped at load.
    pub const META: Self = Self(0);
    /// Test scaffolding.
    pub const TESTING: Self = Self(1);
    /// Opt-in and eligibility checks.
    pub const ELIGIBILITY: Self = Self(10);
    pub const PREPROCESSING: Self = Self(11);
    /// Context setup.
    pub const CONTEXT: Self = Self(20);
    /// Structural expansion (loops).
    pub const EXPAND: Self = Self(30);
    /// Element replacement.
    pub const MORPHING: Self = Self(40);
    /// Conditional rendering.
    pub const TOGGLE: Self = Self(50);
    pub const HTTP_HEADER: Self = Self(61);
    pub const HTTP_BODY: Self = Self(62);
    pub const HTTP_REQUEST: Self = Self(69);
    pub const HTTP_CONTENT: Self = Self(70);
    pub const HTTP_INTERACTIVITY: Self = Self(71);
    pub const CONTENT: Self = Self(80);
    pub const ATTRIBUTE: Self = Self(85);
    pub const INTERACTIVITY: Self = Self(90);
    pub const DISPLAY: Self = Self(91);
    pub const CUSTOM_ELEMENT: Self = Self(95);
    pub const REFERENCE: Self = Self(97);
    pub const CUSTOM_PROCESSING: Self = Self(99);
    pub const POSTPROCESSING: Self = Self(100);

    /// Build an arbitrary phase, typically between two published ones.
    #[must_use]
    pub const fn custom(value: i32) -> Self {
        Self(value)
    }

    /// Numeric value of the phase.
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Whether the phase can be loaded at all.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }

    /// Whether directives of this phase take part in rendering.
    #[must_use]
    pub fn is_executable(self) -> bool {
        self.is_valid() && self != Self::META
    }

    /// Name of the band the phase falls into.
    ///
    /// Sub-phases report the closest published phase below them.
    #[must_use]
    pub fn band(self) -> &'static str {
        BANDS
            .iter()
            .rev()
            .find(|(phase, _)| *phase <= self)
            .map_or("invalid", |(_, name)| name)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match BANDS.iter().find(|(phase, _)| phase == self) {
            Some((_, name)) => f.write_str(name),
            None => write!(f, "{}({})", self.band(), self.0),
        }
    }
}
