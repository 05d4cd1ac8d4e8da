//! Declarative page layout of a payment request form.
//!
//! The layout is pure data: it decides what goes on which page and in which
//! order. [`super::typst`] turns it into markup.

use super::common::format_amount;
use crate::request_form::models::{
    ClosedSet, ExpenseCategory, ExpenseLine, PaymentRequest, ProjectType,
};

/// Item rows per request page.
pub const ROWS_PER_PAGE: usize = 10;

/// Width of the item table; the bankbook image is scaled to the same width.
pub const TABLE_WIDTH_CM: f32 = 17.5;

pub const ITEM_COLUMNS: [&str; 6] = [
    "專案",
    "費用類型",
    "執行時間",
    "執行內容",
    "金額",
    "備註憑證",
];
pub const ITEM_COLUMN_WIDTHS_CM: [f32; 6] = [3.0, 3.0, 2.5, 4.0, 2.5, 2.5];

pub const INFO_COLUMN_WIDTHS_CM: [f32; 4] = [3.0, 5.75, 3.0, 5.75];

pub const SIGNATURE_ROLES: [&str; 5] = [
    "執行秘書",
    "財務主管",
    "財務經辦",
    "請款單位主管",
    "請款人",
];

pub const FORM_TITLE: &str = "請款單";
pub const CONTINUATION_SUFFIX: &str = "（續）";
pub const DETAILS_HEADING: &str = "請款明細";
pub const RECEIPT_TITLE: &str = "單據憑證黏貼單";
pub const RECEIPT_INSTRUCTION: &str = "請將收據、發票等憑證黏貼於下方空白處";
pub const BANKBOOK_TITLE: &str = "存摺影本";
pub const SERIAL_LABEL: &str = "費用申請單號：";
pub const SERIAL_HINT: &str = "(財務組填寫)";

/// Base name of the bankbook image inside the compile workspace.
pub const BANKBOOK_ASSET: &str = "bankbook";
/// Base name of the logo inside the compile workspace.
pub const LOGO_ASSET: &str = "logo";

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    pub font_family: String,
    pub header: PageHeader,
    pub pages: Vec<Page>,
}

impl DocumentLayout {
    /// Number of pages carrying item rows.
    pub fn request_page_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.kind == PageKind::Request)
            .count()
    }
}

/// Content repeated at the top of every page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageHeader {
    pub serial_label: String,
    pub serial_hint: String,
    /// Workspace file name of the logo, if one is configured.
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Request,
    Receipt,
    Bankbook,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub kind: PageKind,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Title(String),
    /// Label/value pairs laid out two per row.
    InfoGrid {
        column_widths_cm: Vec<f32>,
        cells: Vec<(String, String)>,
    },
    Heading(String),
    Note(String),
    Table {
        column_widths_cm: Vec<f32>,
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Instruction(String),
    Spacer {
        height_cm: f32,
    },
    Image {
        file: String,
        width_cm: f32,
    },
    /// Total line and signature grid, pushed to the bottom of the page.
    Footer(SignatureFooter),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignatureFooter {
    pub total: String,
    pub paying_unit: String,
    pub requesting_unit: String,
    pub roles: Vec<String>,
}

/// Inputs of the layout that do not come from the request itself.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOptions {
    pub font_family: String,
    /// Extension of the logo asset, when a logo is available.
    pub logo_extension: Option<String>,
}

/// Lay out a request: item pages, the receipt page and, when a bankbook is
/// attached, the bankbook page.
pub fn build(request: &PaymentRequest, options: &LayoutOptions) -> DocumentLayout {
    let footer = signature_footer(request);
    let mut pages = Vec::new();

    let chunks: Vec<&[ExpenseLine]> = if request.line_items().is_empty() {
        vec![request.line_items()]
    } else {
        request.line_items().chunks(ROWS_PER_PAGE).collect()
    };

    for (index, chunk) in chunks.into_iter().enumerate() {
        let mut blocks = Vec::new();
        if index == 0 {
            blocks.push(Block::Title(FORM_TITLE.to_string()));
            blocks.push(info_grid(request));
            blocks.push(Block::Heading(DETAILS_HEADING.to_string()));
            blocks.push(Block::Note(legend::<ProjectType>("專案")));
            blocks.push(Block::Note(legend::<ExpenseCategory>("費用類型")));
        } else {
            blocks.push(Block::Title(format!("{}{}", FORM_TITLE, CONTINUATION_SUFFIX)));
        }
        blocks.push(item_table(chunk));
        blocks.push(Block::Footer(footer.clone()));

        pages.push(Page {
            kind: PageKind::Request,
            blocks,
        });
    }

    pages.push(receipt_page(request));

    if let Some(file) = request.bankbook_image() {
        pages.push(Page {
            kind: PageKind::Bankbook,
            blocks: vec![
                Block::Title(BANKBOOK_TITLE.to_string()),
                Block::Spacer { height_cm: 0.5 },
                Block::Image {
                    file: asset_name(BANKBOOK_ASSET, file.extension()),
                    width_cm: TABLE_WIDTH_CM,
                },
            ],
        });
    }

    DocumentLayout {
        font_family: options.font_family.clone(),
        header: PageHeader {
            serial_label: SERIAL_LABEL.to_string(),
            serial_hint: SERIAL_HINT.to_string(),
            logo: options
                .logo_extension
                .as_deref()
                .map(|ext| asset_name(LOGO_ASSET, ext)),
        },
        pages,
    }
}

/// `bankbook` + `png` gives `bankbook.png`.
pub fn asset_name(base: &str, extension: &str) -> String {
    format!("{}.{}", base, extension.trim_start_matches('.').to_ascii_lowercase())
}

fn info_grid(request: &PaymentRequest) -> Block {
    Block::InfoGrid {
        column_widths_cm: INFO_COLUMN_WIDTHS_CM.to_vec(),
        cells: vec![
            ("申請日期".to_string(), request.application_date().to_string()),
            ("請款單位".to_string(), request.requesting_unit_display()),
            ("受款人".to_string(), request.payee().to_string()),
            ("付款方式".to_string(), request.payment_method_display()),
            ("請款金額".to_string(), format_amount(request.total_amount())),
        ],
    }
}

fn legend<T: ClosedSet>(title: &str) -> String {
    let labels: Vec<&str> = T::ALL.iter().map(|v| v.label()).collect();
    format!("{}：{}", title, labels.join(" "))
}

fn item_table(lines: &[ExpenseLine]) -> Block {
    let rows = lines
        .iter()
        .map(|line| {
            vec![
                line.project_type.code().to_string(),
                line.expense_category.code().to_string(),
                line.execution_time.clone().unwrap_or_default(),
                line.description.clone(),
                format_amount(line.amount),
                line.receipt_note.clone().unwrap_or_default(),
            ]
        })
        .collect();

    Block::Table {
        column_widths_cm: ITEM_COLUMN_WIDTHS_CM.to_vec(),
        header: ITEM_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows,
    }
}

fn signature_footer(request: &PaymentRequest) -> SignatureFooter {
    SignatureFooter {
        total: format!("總計：{}", format_amount(request.total_amount())),
        paying_unit: "付款單位".to_string(),
        requesting_unit: "請款單位".to_string(),
        roles: SIGNATURE_ROLES.iter().map(|r| r.to_string()).collect(),
    }
}

fn receipt_page(request: &PaymentRequest) -> Page {
    Page {
        kind: PageKind::Receipt,
        blocks: vec![
            Block::Title(RECEIPT_TITLE.to_string()),
            Block::InfoGrid {
                column_widths_cm: INFO_COLUMN_WIDTHS_CM.to_vec(),
                cells: vec![
                    ("請款人".to_string(), request.payee().to_string()),
                    ("申請日期".to_string(), request.application_date().to_string()),
                ],
            },
            Block::Instruction(RECEIPT_INSTRUCTION.to_string()),
            Block::Spacer { height_cm: 18.0 },
        ],
    }
}
