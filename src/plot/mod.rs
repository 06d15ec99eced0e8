pub mod palette;
pub mod pgf;

use serde::Serialize;
use std::str::FromStr;

use crate::error::Result;
use crate::merge::column_name;

pub use palette::{Palette, SeriesStyle};
pub use pgf::PgfPlots;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotSeries {
    pub legend: String,
    pub x: String,
    pub y: String,
    pub color: String,
    pub mark: String,
}

/// One quantity, one series per scheme.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotGroup {
    pub quantity: String,
    pub x_label: String,
    pub series: Vec<PlotSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotDocument {
    pub table: String,
    pub separator: String,
    pub caption: String,
    pub groups: Vec<PlotGroup>,
}

/// Name a plotting tool understands for a field delimiter.
pub fn separator_name(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "tab".to_string(),
        b',' => "comma".to_string(),
        b';' => "semicolon".to_string(),
        b':' => "colon".to_string(),
        b' ' => "space".to_string(),
        b'&' => "ampersand".to_string(),
        other => (other as char).to_string(),
    }
}

/// Builds the plot description for a merged table. Groups follow
/// `quantities`, series follow `styles`; nothing is reordered.
pub fn emit(
    axis: &str,
    quantities: &[String],
    styles: &[SeriesStyle],
    table: &str,
    delimiter: u8,
    caption: &str,
) -> PlotDocument {
    let groups = quantities
        .iter()
        .map(|quantity| PlotGroup {
            quantity: quantity.clone(),
            x_label: axis.to_string(),
            series: styles
                .iter()
                .map(|style| PlotSeries {
                    legend: style.title.clone(),
                    x: axis.to_string(),
                    y: column_name(quantity, &style.title),
                    color: style.color.clone(),
                    mark: style.mark.clone(),
                })
                .collect(),
        })
        .collect();

    PlotDocument {
        table: table.to_string(),
        separator: separator_name(delimiter),
        caption: caption.to_string(),
        groups,
    }
}

pub trait PlotDialect {
    fn extension(&self) -> &'static str;

    fn render(&self, doc: &PlotDocument) -> Result<String>;
}

/// The document itself as TOML, for tools that build their own figures.
pub struct TomlPlot;

impl PlotDialect for TomlPlot {
    fn extension(&self) -> &'static str {
        "toml"
    }

    fn render(&self, doc: &PlotDocument) -> Result<String> {
        Ok(toml::to_string_pretty(doc)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlotFormat {
    #[default]
    Tex,
    Toml,
}

impl PlotFormat {
    pub fn dialect(self) -> Box<dyn PlotDialect> {
        match self {
            PlotFormat::Tex => Box::new(PgfPlots::default()),
            PlotFormat::Toml => Box::new(TomlPlot),
        }
    }
}

impl FromStr for PlotFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "tex" => Ok(PlotFormat::Tex),
            "toml" => Ok(PlotFormat::Toml),
            other => Err(format!("unknown plot format `{}` (expected tex or toml)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(titles: &[&str]) -> PlotDocument {
        let quantities = vec!["L2t_velocity".to_string(), "maxP".to_string()];
        let styles = Palette::default().styles(titles).unwrap();
        emit("refine", &quantities, &styles, "out.csv", b'\t', "Stokes runs")
    }

    #[test]
    fn test_one_group_per_quantity_one_series_per_scheme() {
        let d = doc(&["dg", "cg", "fv"]);
        assert_eq!(d.groups.len(), 2);
        assert_eq!(d.groups[1].quantity, "maxP");
        let ys: Vec<&str> = d.groups[0].series.iter().map(|s| s.y.as_str()).collect();
        assert_eq!(ys, vec!["L2t_velocity_dg", "L2t_velocity_cg", "L2t_velocity_fv"]);
        assert_eq!(d.groups[1].series[2].color, "green");
        assert_eq!(d.separator, "tab");
    }

    #[test]
    fn test_same_input_same_document() {
        let a = doc(&["b", "a"]);
        let b = doc(&["b", "a"]);
        assert_eq!(a, b);
        assert_eq!(
            TomlPlot.render(&a).unwrap(),
            TomlPlot.render(&b).unwrap()
        );
    }

    #[test]
    fn test_toml_keeps_structure() {
        let rendered = TomlPlot.render(&doc(&["A"])).unwrap();
        assert!(rendered.contains("caption = \"Stokes runs\""));
        assert!(rendered.contains("[[groups]]"));
        assert!(rendered.contains("[[groups.series]]"));
        assert!(rendered.contains("y = \"maxP_A\""));
    }

    #[test]
    fn test_plot_format_parse() {
        assert_eq!("toml".parse::<PlotFormat>().unwrap(), PlotFormat::Toml);
        assert!("svg".parse::<PlotFormat>().is_err());
        assert_eq!(PlotFormat::Tex.dialect().extension(), "tex");
    }
}
