//! # Domain Models
//!
//! The settings document and everything nested inside it.
//! Field names follow the persisted JSON (camelCase), so a document exported
//! from the dashboard imports back unchanged.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::style;

/// Generates a fresh random identifier for a block, link or menu entry.
pub fn gid() -> String {
    Uuid::new_v4().simple().to_string()
}

/// The root settings document. Blocks and links only exist inside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    /// Identifier of the remote gist this document syncs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gist_id: Option<String>,
    /// Epoch milliseconds of the last semantic edit. Sole conflict signal.
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub theme: ThemeSetting,
    /// The dashboard blocks, in grid order.
    #[serde(default)]
    pub links: Vec<Block>,
}

impl Setting {
    pub fn find_block(&self, block_id: &str) -> Option<&Block> {
        self.links.iter().find(|block| block.id == block_id)
    }

    pub fn find_block_mut(&mut self, block_id: &str) -> Option<&mut Block> {
        self.links.iter_mut().find(|block| block.id == block_id)
    }

    /// True if any block or link in the document already uses `id`.
    pub fn contains_id(&self, id: &str) -> bool {
        self.links
            .iter()
            .any(|block| block.id == id || block.buttons.iter().any(|link| link.id == id))
    }

    /// Grid slot for a new block.
    ///
    /// The first block goes to the top-left corner. A block added from an
    /// existing one lands in the anchor's column, below everything that
    /// overlaps that column.
    pub fn next_block_layout(&self, id: &str, anchor_block: Option<&str>) -> Layout {
        let x = anchor_block
            .and_then(|anchor| self.find_block(anchor))
            .map_or(0, |block| block.layout.x);

        let y = self
            .links
            .iter()
            .map(|block| &block.layout)
            .filter(|layout| {
                layout.x < x.saturating_add(DEFAULT_BLOCK_WIDTH)
                    && x < layout.x.saturating_add(layout.w)
            })
            .map(|layout| layout.y.saturating_add(layout.h))
            .max()
            .unwrap_or(0);

        Layout {
            i: id.to_string(),
            x,
            y,
            w: DEFAULT_BLOCK_WIDTH,
            h: DEFAULT_BLOCK_HEIGHT,
        }
    }

    /// Re-establishes `layout.i == id` for every block.
    pub fn normalize_layout_ids(&mut self) {
        for block in &mut self.links {
            if block.layout.i != block.id {
                block.layout.i = block.id.clone();
            }
        }
    }
}

pub const DEFAULT_BLOCK_WIDTH: u32 = 2;
pub const DEFAULT_BLOCK_HEIGHT: u32 = 8;

/// Theme selection, stored as `{ "solution": "<name>" }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeSetting {
    #[serde(default)]
    pub solution: ThemeSolution,
}

/// Unknown theme names load as `Default`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ThemeSolution {
    #[default]
    Default,
    Dark,
    Light,
}

impl ThemeSolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeSolution::Default => "default",
            ThemeSolution::Dark => "dark",
            ThemeSolution::Light => "light",
        }
    }
}

impl From<String> for ThemeSolution {
    fn from(value: String) -> Self {
        match value.as_str() {
            "dark" => ThemeSolution::Dark,
            "light" => ThemeSolution::Light,
            _ => ThemeSolution::Default,
        }
    }
}

impl From<ThemeSolution> for String {
    fn from(solution: ThemeSolution) -> Self {
        solution.as_str().to_string()
    }
}

/// A titled, positioned container of links on the dashboard grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub buttons: Vec<Link>,
    pub layout: Layout,
}

impl Block {
    /// Creates an empty block; `layout.i` is forced to the block id.
    pub fn new(id: String, title: impl Into<String>, mut layout: Layout) -> Self {
        layout.i = id.clone();
        Self {
            id,
            title: title.into(),
            buttons: Vec::new(),
            layout,
        }
    }

    pub fn find_link(&self, link_id: &str) -> Option<&Link> {
        self.buttons.iter().find(|link| link.id == link_id)
    }

    fn link_position(&self, link_id: &str) -> Option<usize> {
        self.buttons.iter().position(|link| link.id == link_id)
    }

    pub(crate) fn remove_link(&mut self, link_id: &str) -> Option<Link> {
        self.link_position(link_id).map(|index| self.buttons.remove(index))
    }

    pub(crate) fn position_after(&self, link_id: &str) -> Option<usize> {
        self.link_position(link_id).map(|index| index + 1)
    }
}

/// Grid position of a block. `i` must equal the owning block's id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default)]
    pub i: String,
    #[serde(deserialize_with = "grid_unit")]
    pub x: u32,
    #[serde(deserialize_with = "grid_unit")]
    pub y: u32,
    #[serde(deserialize_with = "grid_unit")]
    pub w: u32,
    #[serde(deserialize_with = "grid_unit")]
    pub h: u32,
}

// Older exports carry fractional grid rows (e.g. `39.5`); round them instead
// of rejecting the whole document.
fn grid_unit<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(serde::de::Error::custom(format!(
            "invalid grid coordinate {value}"
        )));
    }
    Ok(value.round() as u32)
}

/// A single button on a block, or a dropdown when `menu` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Absolute URL; empty while the link is still being edited.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub style: LinkStyle,
    /// Tooltip text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu: Option<Vec<MenuItem>>,
}

impl Link {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: gid(),
            title: title.into(),
            url: url.into(),
            style: LinkStyle::default(),
            description: None,
            menu: None,
        }
    }

    pub fn is_dropdown(&self) -> bool {
        self.menu.is_some()
    }
}

/// An entry of a dropdown link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

/// Visual variant of a link: a named bootstrap variant or any CSS colour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LinkStyle {
    Primary,
    Secondary,
    Success,
    Danger,
    Warning,
    #[default]
    Info,
    Light,
    Dark,
    Link,
    Color(String),
}

impl LinkStyle {
    /// The bootstrap variant the button is drawn with.
    pub fn variant(&self) -> &str {
        match self {
            LinkStyle::Primary => "primary",
            LinkStyle::Secondary => "secondary",
            LinkStyle::Success => "success",
            LinkStyle::Danger => "danger",
            LinkStyle::Warning => "warning",
            LinkStyle::Info => "info",
            LinkStyle::Light => "light",
            LinkStyle::Dark => "dark",
            LinkStyle::Link => "link",
            LinkStyle::Color(_) => "light",
        }
    }

    /// The persisted form: a variant name or the raw colour.
    pub fn as_str(&self) -> &str {
        match self {
            LinkStyle::Color(color) => color,
            named => named.variant(),
        }
    }

    /// Inline CSS for custom colours; named variants need none.
    pub fn inline_css(&self) -> Option<String> {
        match self {
            LinkStyle::Color(color) => Some(format!(
                "background-color: {}; color: {}",
                color,
                style::text_color_for(color)
            )),
            _ => None,
        }
    }
}

impl From<String> for LinkStyle {
    fn from(value: String) -> Self {
        match value.as_str() {
            "primary" => LinkStyle::Primary,
            "secondary" => LinkStyle::Secondary,
            "success" => LinkStyle::Success,
            "danger" => LinkStyle::Danger,
            "warning" => LinkStyle::Warning,
            "info" => LinkStyle::Info,
            "light" => LinkStyle::Light,
            "dark" => LinkStyle::Dark,
            "link" => LinkStyle::Link,
            _ => LinkStyle::Color(value),
        }
    }
}

impl From<LinkStyle> for String {
    fn from(style: LinkStyle) -> Self {
        match style {
            LinkStyle::Color(color) => color,
            named => named.as_str().to_string(),
        }
    }
}
