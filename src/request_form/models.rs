use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::storage::StoredFile;

/// A fixed set of candidate values submitted as text.
///
/// A raw value matches a variant by its full label, its short code or its
/// snake_case variant name.
pub trait ClosedSet: Sized + Copy + 'static {
    const ALL: &'static [Self];

    fn label(&self) -> &'static str;
    fn code(&self) -> &'static str;
    fn name(&self) -> &'static str;

    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.label() == raw || v.code() == raw || v.name().eq_ignore_ascii_case(raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum PaymentMethod {
    #[serde(rename = "現金")]
    Cash,
    #[serde(rename = "匯款")]
    Transfer,
    #[serde(rename = "轉捐款")]
    Donation,
    #[serde(rename = "預支")]
    Advance,
    #[serde(rename = "其他")]
    Other,
}

impl PaymentMethod {
    /// Methods that pay into a bank account and so need a bankbook copy.
    pub fn requires_bankbook(&self) -> bool {
        matches!(self, Self::Transfer | Self::Advance)
    }
}

impl ClosedSet for PaymentMethod {
    const ALL: &'static [Self] = &[
        Self::Cash,
        Self::Transfer,
        Self::Donation,
        Self::Advance,
        Self::Other,
    ];

    fn label(&self) -> &'static str {
        match self {
            Self::Cash => "現金",
            Self::Transfer => "匯款",
            Self::Donation => "轉捐款",
            Self::Advance => "預支",
            Self::Other => "其他",
        }
    }

    fn code(&self) -> &'static str {
        self.label()
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Transfer => "transfer",
            Self::Donation => "donation",
            Self::Advance => "advance",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum RequestingUnit {
    #[serde(rename = "輔導活動執委會")]
    Guidance,
    #[serde(rename = "行政財務執委會")]
    AdminFinance,
    #[serde(rename = "資訊媒體執委會")]
    InfoMedia,
    #[serde(rename = "其他")]
    Other,
}

impl ClosedSet for RequestingUnit {
    const ALL: &'static [Self] = &[
        Self::Guidance,
        Self::AdminFinance,
        Self::InfoMedia,
        Self::Other,
    ];

    fn label(&self) -> &'static str {
        match self {
            Self::Guidance => "輔導活動執委會",
            Self::AdminFinance => "行政財務執委會",
            Self::InfoMedia => "資訊媒體執委會",
            Self::Other => "其他",
        }
    }

    fn code(&self) -> &'static str {
        self.label()
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Guidance => "guidance",
            Self::AdminFinance => "admin_finance",
            Self::InfoMedia => "info_media",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ProjectType {
    #[serde(rename = "A.會議(理監事會議、審查會議、幹事會議等)")]
    Meeting,
    #[serde(rename = "B.活動(含年會、各項座談會、年度志工激勵活動、各區學生輔導活動等)")]
    Activity,
    #[serde(rename = "C.志工培訓(含志工會議)")]
    VolunteerTraining,
    #[serde(rename = "D.學校訪談")]
    SchoolInterview,
    #[serde(rename = "E.專案補助")]
    ProjectSubsidy,
    #[serde(rename = "F.其他")]
    Other,
}

impl ClosedSet for ProjectType {
    const ALL: &'static [Self] = &[
        Self::Meeting,
        Self::Activity,
        Self::VolunteerTraining,
        Self::SchoolInterview,
        Self::ProjectSubsidy,
        Self::Other,
    ];

    fn label(&self) -> &'static str {
        match self {
            Self::Meeting => "A.會議(理監事會議、審查會議、幹事會議等)",
            Self::Activity => "B.活動(含年會、各項座談會、年度志工激勵活動、各區學生輔導活動等)",
            Self::VolunteerTraining => "C.志工培訓(含志工會議)",
            Self::SchoolInterview => "D.學校訪談",
            Self::ProjectSubsidy => "E.專案補助",
            Self::Other => "F.其他",
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Meeting => "A",
            Self::Activity => "B",
            Self::VolunteerTraining => "C",
            Self::SchoolInterview => "D",
            Self::ProjectSubsidy => "E",
            Self::Other => "F",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Meeting => "meeting",
            Self::Activity => "activity",
            Self::VolunteerTraining => "volunteer_training",
            Self::SchoolInterview => "school_interview",
            Self::ProjectSubsidy => "project_subsidy",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ExpenseCategory {
    #[serde(rename = "1.交通費")]
    Transportation,
    #[serde(rename = "2.場地租借")]
    VenueRental,
    #[serde(rename = "3.餐費")]
    Meal,
    #[serde(rename = "4.文宣")]
    Publicity,
    #[serde(rename = "5.電話費")]
    Phone,
    #[serde(rename = "6.補助")]
    Subsidy,
    #[serde(rename = "7.志工津貼")]
    VolunteerAllowance,
    #[serde(rename = "8.設備器材(含軟硬體)")]
    Equipment,
    #[serde(rename = "9.雜支")]
    Miscellaneous,
}

impl ClosedSet for ExpenseCategory {
    const ALL: &'static [Self] = &[
        Self::Transportation,
        Self::VenueRental,
        Self::Meal,
        Self::Publicity,
        Self::Phone,
        Self::Subsidy,
        Self::VolunteerAllowance,
        Self::Equipment,
        Self::Miscellaneous,
    ];

    fn label(&self) -> &'static str {
        match self {
            Self::Transportation => "1.交通費",
            Self::VenueRental => "2.場地租借",
            Self::Meal => "3.餐費",
            Self::Publicity => "4.文宣",
            Self::Phone => "5.電話費",
            Self::Subsidy => "6.補助",
            Self::VolunteerAllowance => "7.志工津貼",
            Self::Equipment => "8.設備器材(含軟硬體)",
            Self::Miscellaneous => "9.雜支",
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Transportation => "1",
            Self::VenueRental => "2",
            Self::Meal => "3",
            Self::Publicity => "4",
            Self::Phone => "5",
            Self::Subsidy => "6",
            Self::VolunteerAllowance => "7",
            Self::Equipment => "8",
            Self::Miscellaneous => "9",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Transportation => "transportation",
            Self::VenueRental => "venue_rental",
            Self::Meal => "meal",
            Self::Publicity => "publicity",
            Self::Phone => "phone",
            Self::Subsidy => "subsidy",
            Self::VolunteerAllowance => "volunteer_allowance",
            Self::Equipment => "equipment",
            Self::Miscellaneous => "miscellaneous",
        }
    }
}

/// One itemized expense of a payment request.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ExpenseLine {
    pub project_type: ProjectType,
    pub expense_category: ExpenseCategory,
    pub execution_time: Option<String>,
    pub description: String,
    #[schema(value_type = String, example = "1500")]
    pub amount: Decimal,
    pub receipt_note: Option<String>,
}

/// A validated, immutable payment request. Built by
/// [`PaymentRequestBuilder`](super::builder::PaymentRequestBuilder) only.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PaymentRequest {
    pub(crate) application_date: String,
    pub(crate) payee: String,
    pub(crate) payment_method: PaymentMethod,
    pub(crate) payment_method_other: Option<String>,
    pub(crate) requesting_unit: RequestingUnit,
    pub(crate) requesting_unit_other: Option<String>,
    pub(crate) line_items: Vec<ExpenseLine>,
    pub(crate) bankbook_image: Option<StoredFile>,
}

impl PaymentRequest {
    pub fn application_date(&self) -> &str {
        &self.application_date
    }

    pub fn payee(&self) -> &str {
        &self.payee
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn requesting_unit(&self) -> RequestingUnit {
        self.requesting_unit
    }

    pub fn line_items(&self) -> &[ExpenseLine] {
        &self.line_items
    }

    pub fn bankbook_image(&self) -> Option<&StoredFile> {
        self.bankbook_image.as_ref()
    }

    /// Sum of all line items. The builder rejects requests whose sum does
    /// not fit in a `Decimal`.
    pub fn total_amount(&self) -> Decimal {
        sum_amounts(self.line_items.iter().map(|line| line.amount)).unwrap_or(Decimal::MAX)
    }

    /// Payment method as printed on the form, with the free-text
    /// explanation appended for "other".
    pub fn payment_method_display(&self) -> String {
        display_with_other(
            self.payment_method.label(),
            self.payment_method == PaymentMethod::Other,
            &self.payment_method_other,
        )
    }

    pub fn requesting_unit_display(&self) -> String {
        display_with_other(
            self.requesting_unit.label(),
            self.requesting_unit == RequestingUnit::Other,
            &self.requesting_unit_other,
        )
    }
}

/// Overflow-checked sum; `None` when the total exceeds `Decimal::MAX`.
pub fn sum_amounts(amounts: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |total, amount| total.checked_add(amount))
}

fn display_with_other(label: &str, is_other: bool, other: &Option<String>) -> String {
    match (is_other, other) {
        (true, Some(text)) => format!("{} ({})", label, text.trim()),
        _ => label.to_string(),
    }
}

/// Raw line item as submitted by the form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ExpenseLineSubmission {
    #[serde(default)]
    #[schema(example = "A")]
    pub project_type: String,
    #[serde(default)]
    #[schema(example = "1.交通費")]
    pub expense_type: String,
    #[serde(default)]
    pub execution_time: Option<String>,
    #[serde(default)]
    #[schema(example = "理監事會議交通")]
    pub execution_content: String,
    #[schema(value_type = String, example = "1500")]
    pub amount: Decimal,
    #[serde(default)]
    pub receipt_note: Option<String>,
}

/// Raw payment request submission, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RequestFormSubmission {
    #[serde(default)]
    #[schema(example = "114.3.15")]
    pub application_date: Option<String>,
    #[serde(default)]
    #[schema(example = "王小明")]
    pub payee: String,
    #[serde(default)]
    #[schema(example = "匯款")]
    pub payment_method: String,
    #[serde(default)]
    pub payment_method_other: Option<String>,
    #[serde(default)]
    #[schema(example = "輔導活動執委會")]
    pub requesting_unit: String,
    #[serde(default)]
    pub requesting_unit_other: Option<String>,
    #[serde(default)]
    pub payment_details: Vec<ExpenseLineSubmission>,
    /// File id returned by the image upload endpoint.
    #[serde(default)]
    pub bank_book_image_id: Option<String>,
}

/// A request held by the registry, as returned to callers.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RequestFormResponse {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, example = "3000")]
    pub total_amount: Decimal,
    pub request: PaymentRequest,
    pub pdf_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RequestFormList {
    pub items: Vec<RequestFormResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileUploadResponse {
    pub file_id: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
    /// Base64 copy of the stored image, for client-side preview.
    pub data_base64: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EnumOption {
    pub value: String,
    pub label: String,
    pub code: String,
}

impl EnumOption {
    pub fn list<T: ClosedSet>() -> Vec<Self> {
        T::ALL
            .iter()
            .map(|v| Self {
                value: v.label().to_string(),
                label: v.label().to_string(),
                code: v.code().to_string(),
            })
            .collect()
    }
}
