//! Validation of submitted payment request fields.
//!
//! Every violation is collected in field order (top-level fields, then line
//! items by index) and reported together; the overall kind is the kind of the
//! first violation.

use regex::Regex;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::OnceLock;

use super::models::{
    sum_amounts, ClosedSet, ExpenseCategory, ExpenseLine, ExpenseLineSubmission, PaymentMethod,
    ProjectType, RequestFormSubmission, RequestingUnit,
};
use crate::error::{ErrorDetail, ErrorKind};

/// Validation error with a field path and a user-facing message.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub kind: ErrorKind,
    pub message: String,
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn empty_field(field: &str, label: &str) -> Self {
        Self::new(field, ErrorKind::MissingField, format!("{}不可為空", label))
    }

    pub fn invalid_date_format(field: &str, value: &str) -> Self {
        Self::new(
            field,
            ErrorKind::InvalidFormat,
            format!("申請日期 '{}' 格式錯誤", value),
        )
        .with_suggestion("申請日期格式應為 xxx.xx.xx (民國年)，例如 114.3.15")
    }

    pub fn invalid_enum(field: &str, label: &str, value: &str, allowed: &[&str]) -> Self {
        Self::new(
            field,
            ErrorKind::InvalidEnumValue,
            format!("{} '{}' 不是有效選項", label, value),
        )
        .with_suggestion(format!("可用選項：{}", allowed.join("、")))
    }

    pub fn invalid_amount(field: &str, amount: &Decimal) -> Self {
        Self::new(
            field,
            ErrorKind::InvalidAmount,
            format!("金額必須大於 0，收到 {}", amount),
        )
    }

    pub fn total_overflow(field: &str) -> Self {
        Self::new(field, ErrorKind::InvalidAmount, "請款明細總金額超出可處理範圍")
            .with_suggestion("請拆分為多張請款單")
    }

    pub fn missing_attachment(field: &str) -> Self {
        Self::new(
            field,
            ErrorKind::MissingAttachment,
            "匯款或預支付款方式需要上傳存摺影本",
        )
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, ". {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors with formatted output.
#[derive(Debug, Default)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// Kind of the first violation.
    pub fn kind(&self) -> ErrorKind {
        self.errors
            .first()
            .map(|e| e.kind)
            .unwrap_or(ErrorKind::BadRequest)
    }

    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    pub fn details(&self) -> Vec<ErrorDetail> {
        self.errors
            .iter()
            .map(|e| ErrorDetail {
                field: e.field.clone(),
                kind: e.kind,
                message: e.to_string(),
            })
            .collect()
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "驗證失敗：共 {} 項錯誤", self.errors.len())?;
        for (i, error) in self.errors.iter().enumerate() {
            write!(f, "\n{}. {}", i + 1, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Typed fields that passed validation, ready for the record builder.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedFields {
    pub application_date: String,
    pub payee: String,
    pub payment_method: PaymentMethod,
    pub payment_method_other: Option<String>,
    pub requesting_unit: RequestingUnit,
    pub requesting_unit_other: Option<String>,
    pub line_items: Vec<ExpenseLine>,
}

/// Validate a submission. `has_attachment` tells whether a bankbook image
/// accompanies it (uploaded in the same request or referenced by id).
pub fn validate_submission(
    submission: &RequestFormSubmission,
    has_attachment: bool,
) -> Result<ValidatedFields, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let application_date = submission.application_date.as_deref().unwrap_or("");
    validate_roc_date(application_date, "application_date", &mut errors);
    validate_required(&submission.payee, "payee", "受款人", &mut errors);

    let payment_method = validate_enum::<PaymentMethod>(
        &submission.payment_method,
        "payment_method",
        "付款方式",
        &mut errors,
    );
    if payment_method == Some(PaymentMethod::Other) {
        validate_required(
            submission.payment_method_other.as_deref().unwrap_or(""),
            "payment_method_other",
            "其他付款方式說明",
            &mut errors,
        );
    }

    let requesting_unit = validate_enum::<RequestingUnit>(
        &submission.requesting_unit,
        "requesting_unit",
        "請款單位",
        &mut errors,
    );
    if requesting_unit == Some(RequestingUnit::Other) {
        validate_required(
            submission.requesting_unit_other.as_deref().unwrap_or(""),
            "requesting_unit_other",
            "其他請款單位說明",
            &mut errors,
        );
    }

    if let Some(method) = payment_method {
        if method.requires_bankbook() && !has_attachment {
            errors.add(ValidationError::missing_attachment("bank_book_image"));
        }
    }

    if submission.payment_details.is_empty() {
        errors.add(ValidationError::empty_field("payment_details", "請款明細"));
    }
    let line_items: Vec<Option<ExpenseLine>> = submission
        .payment_details
        .iter()
        .enumerate()
        .map(|(index, line)| validate_line(line, index, &mut errors))
        .collect();
    validate_total(&submission.payment_details, "payment_details", &mut errors);

    errors.into_result()?;

    // No violations means every Option above is Some.
    match (payment_method, requesting_unit) {
        (Some(payment_method), Some(requesting_unit)) => Ok(ValidatedFields {
            application_date: application_date.trim().to_string(),
            payee: submission.payee.trim().to_string(),
            payment_method,
            payment_method_other: non_blank(&submission.payment_method_other),
            requesting_unit,
            requesting_unit_other: non_blank(&submission.requesting_unit_other),
            line_items: line_items.into_iter().flatten().collect(),
        }),
        _ => {
            let mut errors = ValidationErrors::new();
            errors.add(ValidationError::new("", ErrorKind::BadRequest, "incomplete submission"));
            Err(errors)
        }
    }
}

fn validate_line(
    line: &ExpenseLineSubmission,
    index: usize,
    errors: &mut ValidationErrors,
) -> Option<ExpenseLine> {
    let field = |name: &str| format!("payment_details[{}].{}", index, name);

    let project_type =
        validate_enum::<ProjectType>(&line.project_type, &field("project_type"), "專案", errors);
    let expense_category = validate_enum::<ExpenseCategory>(
        &line.expense_type,
        &field("expense_type"),
        "費用類型",
        errors,
    );
    validate_amount(&line.amount, &field("amount"), errors);

    Some(ExpenseLine {
        project_type: project_type?,
        expense_category: expense_category?,
        execution_time: non_blank(&line.execution_time),
        description: line.execution_content.trim().to_string(),
        amount: line.amount,
        receipt_note: non_blank(&line.receipt_note),
    })
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ============================================================================
// Validation functions
// ============================================================================

/// Validate that a string is not empty after trimming
pub fn validate_required(value: &str, field: &str, label: &str, errors: &mut ValidationErrors) {
    if value.trim().is_empty() {
        errors.add(ValidationError::empty_field(field, label));
    }
}

fn roc_date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{1,3})\.(\d{1,2})\.(\d{1,2})$").expect("date pattern is valid")
    })
}

/// Validate a Minguo-era date written as `yyy.mm.dd`, with month and day in range.
pub fn validate_roc_date(value: &str, field: &str, errors: &mut ValidationErrors) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(ValidationError::empty_field(field, "申請日期"));
        return;
    }

    let in_range = roc_date_pattern().captures(trimmed).map(|caps| {
        let month: u32 = caps[2].parse().unwrap_or(0);
        let day: u32 = caps[3].parse().unwrap_or(0);
        (1..=12).contains(&month) && (1..=31).contains(&day)
    });

    if in_range != Some(true) {
        errors.add(ValidationError::invalid_date_format(field, trimmed));
    }
}

/// Parse a closed-set value, recording `InvalidEnumValue` when it matches nothing.
pub fn validate_enum<T: ClosedSet>(
    value: &str,
    field: &str,
    label: &str,
    errors: &mut ValidationErrors,
) -> Option<T> {
    if value.trim().is_empty() {
        errors.add(ValidationError::empty_field(field, label));
        return None;
    }

    let parsed = T::parse(value);
    if parsed.is_none() {
        let allowed: Vec<&str> = T::ALL.iter().map(|v| v.label()).collect();
        errors.add(ValidationError::invalid_enum(field, label, value.trim(), &allowed));
    }
    parsed
}

/// Amounts must be strictly positive.
pub fn validate_amount(amount: &Decimal, field: &str, errors: &mut ValidationErrors) {
    if *amount <= Decimal::ZERO {
        errors.add(ValidationError::invalid_amount(field, amount));
    }
}

/// The line items must add up to a representable total.
pub fn validate_total(
    lines: &[ExpenseLineSubmission],
    field: &str,
    errors: &mut ValidationErrors,
) {
    if sum_amounts(lines.iter().map(|line| line.amount)).is_none() {
        errors.add(ValidationError::total_overflow(field));
    }
}
