use std::fmt::Write;

use crate::error::Result;
use crate::plot::{PlotDialect, PlotDocument, PlotGroup};

/// pgfplots figure: one subfloat per group, `per_line` subfloats per row.
pub struct PgfPlots {
    pub log_y: bool,
    pub per_line: usize,
}

impl Default for PgfPlots {
    fn default() -> Self {
        PgfPlots {
            log_y: true,
            per_line: 2,
        }
    }
}

/// Escapes every character LaTeX treats specially in running text.
pub fn tex_safe(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '_' | '%' | '&' | '#' | '$' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '\\' => out.push_str("\\textbackslash{}"),
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

impl PgfPlots {
    fn axis_env(&self) -> &'static str {
        if self.log_y {
            "semilogyaxis"
        } else {
            "axis"
        }
    }

    fn group(&self, out: &mut String, doc: &PlotDocument, group: &PlotGroup, line_end: bool) {
        let env = self.axis_env();
        out.push_str("\\subfloat{\n\\begin{tikzpicture}[scale=\\plotscale]\n");
        let _ = writeln!(out, "\\begin{{{}}}[", env);
        out.push_str("legend style={ at={(1.02,1)},anchor=north west},\n");
        let _ = writeln!(
            out,
            "xlabel={},\nylabel=$ERR_{{{}}}$]",
            tex_safe(&group.x_label),
            tex_safe(&group.quantity)
        );
        for series in &group.series {
            let _ = writeln!(
                out,
                "\\addplot[color={},mark={}]\ntable[x={},y={},col sep={}] {{{}}};\\addlegendentry{{{}}}",
                series.color,
                series.mark,
                series.x,
                series.y,
                doc.separator,
                doc.table,
                tex_safe(&series.legend)
            );
        }
        let _ = write!(out, "\\end{{{}}}\n\\end{{tikzpicture}}}}", env);
        out.push_str(if line_end { "\\\\\n" } else { "\n" });
    }
}

impl PlotDialect for PgfPlots {
    fn extension(&self) -> &'static str {
        "tex"
    }

    fn render(&self, doc: &PlotDocument) -> Result<String> {
        let per_line = self.per_line.max(1);
        let mut out = String::from("\\begin{figure}\n");
        for (i, group) in doc.groups.iter().enumerate() {
            self.group(&mut out, doc, group, (i + 1) % per_line == 0);
        }
        let _ = writeln!(out, "\\caption{{{}}}\\end{{figure}}", tex_safe(&doc.caption));
        Ok(out)
    }
}
