//! Typst markup generation from a [`DocumentLayout`].
//!
//! Output depends only on the layout, so equal requests give byte-identical
//! markup.

use super::common::typst_str;
use super::layout::{Block, DocumentLayout, Page, PageHeader, SignatureFooter};

const PAGE_MARGIN: &str = "(top: 3cm, bottom: 2.5cm, left: 1.5cm, right: 1.5cm)";
const BODY_SIZE_PT: u32 = 11;
const CELL_INSET_PT: u32 = 6;

/// Render the whole document as a Typst source file.
pub fn to_markup(layout: &DocumentLayout) -> String {
    let mut out = String::new();
    push_preamble(&mut out, layout);

    for (index, page) in layout.pages.iter().enumerate() {
        if index > 0 {
            out.push_str("\n#pagebreak()\n\n");
        }
        push_page(&mut out, page);
    }

    out
}

fn push_preamble(out: &mut String, layout: &DocumentLayout) {
    out.push_str("#set page(\n");
    out.push_str("  paper: \"a4\",\n");
    out.push_str(&format!("  margin: {},\n", PAGE_MARGIN));
    out.push_str(&format!("  header: {},\n", header(&layout.header)));
    out.push_str("  footer: context align(center, text(size: 10pt, counter(page).display())),\n");
    out.push_str(")\n");
    out.push_str(&format!(
        "#set text(font: ({},), size: {}pt, lang: \"zh\", region: \"tw\")\n",
        typst_str(&layout.font_family),
        BODY_SIZE_PT
    ));
    out.push_str("#set par(leading: 0.6em)\n");
    out.push_str("#set table(stroke: 0.5pt + black)\n\n");
}

fn header(header: &PageHeader) -> String {
    let logo = match &header.logo {
        Some(file) => format!("image({}, height: 1.5cm)", typst_str(file)),
        None => "[]".to_string(),
    };
    let serial = format!(
        "stack(spacing: 4pt, text(size: 10pt, {}), text(size: 9pt, {}))",
        typst_str(&header.serial_label),
        typst_str(&header.serial_hint)
    );
    format!(
        "grid(columns: (1fr, 1fr), align(left + horizon, {}), align(right + horizon, {}))",
        logo, serial
    )
}

fn push_page(out: &mut String, page: &Page) {
    for block in &page.blocks {
        push_block(out, block);
    }
}

fn push_block(out: &mut String, block: &Block) {
    match block {
        Block::Title(text) => {
            out.push_str(&format!(
                "#align(center, text(size: 22pt, weight: \"bold\", {}))\n#v(0.4cm)\n",
                typst_str(text)
            ));
        }
        Block::InfoGrid {
            column_widths_cm,
            cells,
        } => {
            out.push_str(&format!(
                "#table(\n  columns: {},\n  inset: {}pt,\n  align: left + horizon,\n",
                widths(column_widths_cm),
                CELL_INSET_PT
            ));
            for (label, value) in cells {
                out.push_str(&format!(
                    "  table.cell(fill: luma(235), {}), {},\n",
                    typst_str(label),
                    typst_str(value)
                ));
            }
            out.push_str(")\n#v(0.4cm)\n");
        }
        Block::Heading(text) => {
            out.push_str(&format!(
                "#text(size: 16pt, weight: \"bold\", {})\n#v(0.2cm)\n",
                typst_str(text)
            ));
        }
        Block::Note(text) => {
            out.push_str(&format!("#par(text(size: 10pt, {}))\n", typst_str(text)));
        }
        Block::Table {
            column_widths_cm,
            header,
            rows,
        } => {
            out.push_str(&format!(
                "#v(0.2cm)\n#table(\n  columns: {},\n  inset: {}pt,\n  align: center + horizon,\n",
                widths(column_widths_cm),
                CELL_INSET_PT
            ));
            let header_cells: Vec<String> = header
                .iter()
                .map(|h| format!("text(weight: \"bold\", {})", typst_str(h)))
                .collect();
            out.push_str(&format!("  table.header({}),\n", header_cells.join(", ")));
            for row in rows {
                let cells: Vec<String> = row.iter().map(|c| typst_str(c)).collect();
                out.push_str(&format!("  {},\n", cells.join(", ")));
            }
            out.push_str(")\n");
        }
        Block::Instruction(text) => {
            out.push_str(&format!(
                "#v(0.4cm)\n#align(center, text(size: 12pt, {}))\n",
                typst_str(text)
            ));
        }
        Block::Spacer { height_cm } => {
            out.push_str(&format!("#v({:.2}cm)\n", height_cm));
        }
        Block::Image { file, width_cm } => {
            out.push_str(&format!(
                "#align(center, image({}, width: {:.2}cm))\n",
                typst_str(file),
                width_cm
            ));
        }
        Block::Footer(footer) => push_footer(out, footer),
    }
}

fn push_footer(out: &mut String, footer: &SignatureFooter) {
    let columns = footer.roles.len().max(1);
    let paying_span = columns.saturating_sub(2).max(1);
    let requesting_span = columns - paying_span;

    out.push_str("#v(1fr)\n");
    out.push_str(&format!(
        "#align(right, text(size: 12pt, weight: \"bold\", {}))\n#v(0.3cm)\n",
        typst_str(&footer.total)
    ));
    out.push_str(&format!(
        "#table(\n  columns: ({}),\n  rows: (0.8cm, 0.8cm, 1.6cm),\n  align: center + horizon,\n",
        vec!["1fr"; columns].join(", ")
    ));
    out.push_str(&format!(
        "  table.cell(colspan: {}, {}), table.cell(colspan: {}, {}),\n",
        paying_span,
        typst_str(&footer.paying_unit),
        requesting_span,
        typst_str(&footer.requesting_unit)
    ));
    let roles: Vec<String> = footer.roles.iter().map(|r| typst_str(r)).collect();
    out.push_str(&format!("  {},\n", roles.join(", ")));
    out.push_str(&format!("  {},\n", vec!["[]"; columns].join(", ")));
    out.push_str(")\n");
}

fn widths(column_widths_cm: &[f32]) -> String {
    let parts: Vec<String> = column_widths_cm
        .iter()
        .map(|w| format!("{:.2}cm", w))
        .collect();
    format!("({},)", parts.join(", "))
}
