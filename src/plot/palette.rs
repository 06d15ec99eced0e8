use serde::{Deserialize, Serialize};

use crate::error::{EocError, Result};

/// Colors and marks handed out to schemes in order. Both lists wrap
/// independently once exhausted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub colors: Vec<String>,
    pub marks: Vec<String>,
}

const COLORS: [&str; 7] = ["red", "blue", "green", "yellow", "cyan", "magenta", "black"];
const MARKS: [&str; 7] = ["|", "x", "o", "*", "-", "#", "@"];

impl Default for Palette {
    fn default() -> Self {
        Palette {
            colors: COLORS.iter().map(|c| c.to_string()).collect(),
            marks: MARKS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStyle {
    pub title: String,
    pub color: String,
    pub mark: String,
}

impl Palette {
    pub fn validate(&self) -> Result<()> {
        if self.colors.is_empty() || self.marks.is_empty() {
            return Err(EocError::Config(
                "palette needs at least one color and one mark".into(),
            ));
        }
        Ok(())
    }

    pub fn color(&self, index: usize) -> &str {
        &self.colors[index % self.colors.len()]
    }

    pub fn mark(&self, index: usize) -> &str {
        &self.marks[index % self.marks.len()]
    }

    pub fn styles<S: AsRef<str>>(&self, titles: &[S]) -> Result<Vec<SeriesStyle>> {
        self.validate()?;
        Ok(titles
            .iter()
            .enumerate()
            .map(|(i, title)| SeriesStyle {
                title: title.as_ref().to_string(),
                color: self.color(i).to_string(),
                mark: self.mark(i).to_string(),
            })
            .collect())
    }
}
