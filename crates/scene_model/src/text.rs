//! Text layers and format ranges
//!
//! A text layer holds a string and a list of [`Format`] ranges. Each range is
//! a half-open interval of character indices carrying optional style
//! overrides. The ranges are kept sorted, non-overlapping, non-empty and
//! inside the string through every insertion, removal and format change.

use crate::paint::{PaintRef, Stroke};
use serde::{Deserialize, Serialize};
use std::cmp::{max, min};

/// Font weight on the usual 100-900 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FontWeight(pub u16);

impl FontWeight {
    pub const NORMAL: FontWeight = FontWeight(400);
    pub const BOLD: FontWeight = FontWeight(700);
}

impl Default for FontWeight {
    fn default() -> Self {
        Self::NORMAL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
    Oblique,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FontStretch {
    Condensed,
    SemiCondensed,
    #[default]
    Normal,
    SemiExpanded,
    Expanded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextAlignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

/// Style overrides applied to a range of characters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Format {
    /// First character index of the range
    pub index: usize,
    /// Number of characters in the range
    pub length: usize,
    pub font_family: Option<String>,
    pub font_size: Option<f32>,
    pub font_weight: Option<FontWeight>,
    pub font_style: Option<FontStyle>,
    pub font_stretch: Option<FontStretch>,
    pub fill: Option<PaintRef>,
    pub stroke: Option<Stroke>,
}

impl Format {
    /// An empty format over `[index, index + length)`
    pub fn range(index: usize, length: usize) -> Self {
        Self {
            index,
            length,
            ..Self::default()
        }
    }

    pub fn with_font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = Some(family.into());
        self
    }

    pub fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = Some(size);
        self
    }

    pub fn with_font_weight(mut self, weight: FontWeight) -> Self {
        self.font_weight = Some(weight);
        self
    }

    pub fn with_font_style(mut self, style: FontStyle) -> Self {
        self.font_style = Some(style);
        self
    }

    pub fn with_font_stretch(mut self, stretch: FontStretch) -> Self {
        self.font_stretch = Some(stretch);
        self
    }

    pub fn with_fill(mut self, fill: PaintRef) -> Self {
        self.fill = Some(fill);
        self
    }

    pub fn with_stroke(mut self, stroke: Stroke) -> Self {
        self.stroke = Some(stroke);
        self
    }

    /// Exclusive end index, saturating at `usize::MAX`
    pub fn end(&self) -> usize {
        self.index.saturating_add(self.length)
    }

    /// Whether the range covers `index`
    pub fn contains(&self, index: usize) -> bool {
        index >= self.index && index < self.end()
    }

    /// Union of properties; `other`'s set properties win. The range is kept.
    pub fn merge(&self, other: &Format) -> Format {
        Format {
            index: self.index,
            length: self.length,
            font_family: other.font_family.clone().or_else(|| self.font_family.clone()),
            font_size: other.font_size.or(self.font_size),
            font_weight: other.font_weight.or(self.font_weight),
            font_style: other.font_style.or(self.font_style),
            font_stretch: other.font_stretch.or(self.font_stretch),
            fill: other.fill.clone().or_else(|| self.fill.clone()),
            stroke: other.stroke.clone().or_else(|| self.stroke.clone()),
        }
    }

    /// Whether no style property is set
    pub fn is_empty_style(&self) -> bool {
        self.font_family.is_none()
            && self.font_size.is_none()
            && self.font_weight.is_none()
            && self.font_style.is_none()
            && self.font_stretch.is_none()
            && self.fill.is_none()
            && self.stroke.is_none()
    }

    fn with_span(&self, start: usize, end: usize) -> Format {
        Format {
            index: start,
            length: end - start,
            ..self.clone()
        }
    }

    fn same_style(&self, other: &Format) -> bool {
        self.with_span(0, 0) == other.with_span(0, 0)
    }
}

/// Text content layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLayer {
    value: String,
    formats: Vec<Format>,
    pub font_family: String,
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub font_stretch: FontStretch,
    pub alignment: TextAlignment,
    /// Layout box width; zero lets the line grow
    pub width: f64,
    /// Layout box height; zero lets the block grow
    pub height: f64,
    pub fill: Option<PaintRef>,
    pub stroke: Option<Stroke>,
}

impl TextLayer {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            formats: Vec::new(),
            font_family: "Sans".to_string(),
            font_size: 12.0,
            font_weight: FontWeight::NORMAL,
            font_style: FontStyle::Normal,
            font_stretch: FontStretch::Normal,
            alignment: TextAlignment::Left,
            width: 0.0,
            height: 0.0,
            fill: None,
            stroke: None,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn formats(&self) -> &[Format] {
        &self.formats
    }

    /// Length of the value in characters
    pub fn char_len(&self) -> usize {
        self.value.chars().count()
    }

    /// Replace value and formats wholesale (used to restore snapshots)
    pub fn restore(&mut self, value: String, formats: Vec<Format>) {
        self.value = value;
        self.formats = formats;
        self.normalize();
    }

    /// Insert `text` at character `position`.
    ///
    /// Ranges starting at or after `position` shift right; a range strictly
    /// containing `position` grows to include the new text.
    pub fn insert_text(&mut self, position: usize, text: &str) {
        let position = min(position, self.char_len());
        let inserted = text.chars().count();
        if inserted == 0 {
            return;
        }

        let byte_offset = byte_offset(&self.value, position);
        self.value.insert_str(byte_offset, text);

        for format in &mut self.formats {
            if format.index >= position {
                format.index += inserted;
            } else if position < format.end() {
                format.length += inserted;
            }
        }
    }

    /// Remove `length` characters starting at `position`, returning them.
    ///
    /// Range boundaries inside the removed span collapse onto `position`;
    /// ranges left empty are dropped.
    pub fn remove_text(&mut self, position: usize, length: usize) -> String {
        let len = self.char_len();
        let start = min(position, len);
        let end = min(start.saturating_add(length), len);
        if start == end {
            return String::new();
        }

        let start_byte = byte_offset(&self.value, start);
        let end_byte = byte_offset(&self.value, end);
        let removed: String = self.value.drain(start_byte..end_byte).collect();

        let removed_len = end - start;
        let map = |x: usize| {
            if x <= start {
                x
            } else if x >= end {
                x - removed_len
            } else {
                start
            }
        };

        for format in &mut self.formats {
            let new_start = map(format.index);
            let new_end = map(format.end());
            format.index = new_start;
            format.length = new_end - new_start;
        }
        self.formats.retain(|f| f.length > 0);
        removed
    }

    /// Apply `format` over `[format.index, format.end())`.
    ///
    /// Overlapped parts of existing ranges take the merged style, the parts
    /// outside keep their old style, and characters not covered by any range
    /// get `format`'s style alone.
    pub fn set_format(&mut self, format: Format) {
        let len = self.char_len();
        let start = min(format.index, len);
        let end = min(format.end(), len);
        if start >= end {
            return;
        }

        let mut result = Vec::with_capacity(self.formats.len() + 2);
        let mut covered = Vec::new();

        for existing in self.formats.drain(..) {
            let (a, b) = (existing.index, existing.end());
            if b <= start || a >= end {
                result.push(existing);
                continue;
            }

            let overlap_start = max(a, start);
            let overlap_end = min(b, end);
            if a < overlap_start {
                result.push(existing.with_span(a, overlap_start));
            }
            result.push(existing.merge(&format).with_span(overlap_start, overlap_end));
            covered.push((overlap_start, overlap_end));
            if overlap_end < b {
                result.push(existing.with_span(overlap_end, b));
            }
        }

        covered.sort_unstable();
        let mut cursor = start;
        for (a, b) in covered {
            if a > cursor {
                result.push(format.with_span(cursor, a));
            }
            cursor = max(cursor, b);
        }
        if cursor < end {
            result.push(format.with_span(cursor, end));
        }

        self.formats = result;
        self.normalize();
    }

    /// The format range covering `index`, if any
    pub fn format_at(&self, index: usize) -> Option<&Format> {
        self.formats.iter().find(|f| f.contains(index))
    }

    /// Check the range invariants: sorted, non-empty, non-overlapping and
    /// inside the string.
    pub fn validate_formats(&self) -> Result<(), String> {
        let len = self.char_len();
        let mut previous_end = 0;
        for (i, format) in self.formats.iter().enumerate() {
            if format.length == 0 {
                return Err(format!("format {} is empty", i));
            }
            if format.end() > len {
                return Err(format!("format {} ends at {} past length {}", i, format.end(), len));
            }
            if format.index < previous_end {
                return Err(format!("format {} overlaps its predecessor", i));
            }
            previous_end = format.end();
        }
        Ok(())
    }

    /// Sort, drop empty ranges and coalesce touching ranges of equal style
    fn normalize(&mut self) {
        let len = self.char_len();
        for format in &mut self.formats {
            format.index = min(format.index, len);
            format.length = min(format.length, len - format.index);
        }
        self.formats.retain(|f| f.length > 0);
        self.formats.sort_by_key(|f| f.index);

        let mut merged: Vec<Format> = Vec::with_capacity(self.formats.len());
        for format in self.formats.drain(..) {
            match merged.last_mut() {
                Some(last) if last.end() == format.index && last.same_style(&format) => {
                    last.length += format.length;
                }
                _ => merged.push(format),
            }
        }
        self.formats = merged;
    }
}

fn byte_offset(s: &str, char_index: usize) -> usize {
    s.char_indices().nth(char_index).map(|(i, _)| i).unwrap_or(s.len())
}
