//! Data source credits of the layers.

/// Credit for the data shown by a layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribution {
    text: String,
    url: Option<String>,
}

impl Attribution {
    /// Creates a new `Attribution` with the given text and optional URL.
    pub fn new(text: impl Into<String>, url: Option<String>) -> Self {
        Self {
            text: text.into(),
            url,
        }
    }

    /// Text of the attribution.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// URL with more information about the data source, if any.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}
