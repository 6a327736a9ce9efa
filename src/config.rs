use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::table::sort::SortDirection;

/// Direction indicator markup placed in each header's arrow span
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Glyphs {
    pub unsorted: String,
    pub ascending: String,
    pub descending: String,
}

impl Default for Glyphs {
    fn default() -> Self {
        Self {
            unsorted: "&nbsp;&nbsp;&nbsp;".to_string(),
            ascending: "&nbsp;&darr;".to_string(),
            descending: "&nbsp;&uarr;".to_string(),
        }
    }
}

impl Glyphs {
    pub fn for_direction(&self, direction: Option<SortDirection>) -> &str {
        match direction {
            None => &self.unsorted,
            Some(SortDirection::Ascending) => &self.ascending,
            Some(SortDirection::Descending) => &self.descending,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Class token a table needs to opt in
    pub class_token: String,
    pub header_link_class: String,
    pub arrow_class: String,
    /// Column width cap for text previews
    pub max_preview_width: usize,
    pub glyphs: Glyphs,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            class_token: "sortable".to_string(),
            header_link_class: "sortheader".to_string(),
            arrow_class: "sortarrow".to_string(),
            max_preview_width: 30,
            glyphs: Glyphs::default(),
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content)
            .map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_toml(&content)
    }
}
