#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::error::{ErrorKind, RequestError};
    use crate::request_form::builder::PaymentRequestBuilder;
    use crate::request_form::models::{
        ClosedSet, ExpenseCategory, ExpenseLineSubmission, PaymentMethod, ProjectType,
        RequestFormSubmission, RequestingUnit,
    };
    use crate::request_form::validation::{validate_submission, ValidatedFields};
    use crate::storage::{FileCategory, StoredFile};

    fn line(amount: i64) -> ExpenseLineSubmission {
        ExpenseLineSubmission {
            project_type: "A".to_string(),
            expense_type: "1.交通費".to_string(),
            execution_time: Some("3/15".to_string()),
            execution_content: "理監事會議交通".to_string(),
            amount: Decimal::from(amount),
            receipt_note: None,
        }
    }

    fn submission(method: &str) -> RequestFormSubmission {
        RequestFormSubmission {
            application_date: Some("114.3.15".to_string()),
            payee: "王小明".to_string(),
            payment_method: method.to_string(),
            payment_method_other: None,
            requesting_unit: "輔導活動執委會".to_string(),
            requesting_unit_other: None,
            payment_details: vec![line(1500), line(1500)],
            bank_book_image_id: None,
        }
    }

    fn image_file() -> StoredFile {
        StoredFile {
            file_id: "bankbook_20250315_142501_abc.png".to_string(),
            path: "uploads/images/bankbook_20250315_142501_abc.png".to_string(),
            original_filename: "bankbook.png".to_string(),
            mime_type: "image/png".to_string(),
            size_bytes: 1024,
            category: FileCategory::Image,
            created_at: Utc::now(),
        }
    }

    fn valid_fields(method: &str) -> ValidatedFields {
        validate_submission(&submission(method), true).unwrap()
    }

    #[test]
    fn test_cash_submission_is_valid() {
        let fields = validate_submission(&submission("現金"), false).unwrap();
        assert_eq!(fields.payment_method, PaymentMethod::Cash);
        assert_eq!(fields.requesting_unit, RequestingUnit::Guidance);
        assert_eq!(fields.line_items.len(), 2);
        assert_eq!(fields.line_items[0].project_type, ProjectType::Meeting);
        assert_eq!(fields.line_items[0].expense_category, ExpenseCategory::Transportation);
    }

    #[test]
    fn test_transfer_without_bankbook_is_missing_attachment() {
        let errors = validate_submission(&submission("匯款"), false).unwrap_err();
        assert_eq!(errors.kind(), ErrorKind::MissingAttachment);
        assert!(validate_submission(&submission("匯款"), true).is_ok());
    }

    #[test]
    fn test_advance_requires_bankbook() {
        let errors = validate_submission(&submission("預支"), false).unwrap_err();
        assert!(errors.has_kind(ErrorKind::MissingAttachment));
    }

    #[test]
    fn test_non_positive_amount_is_invalid() {
        for amount in [0, -100] {
            let mut input = submission("現金");
            input.payment_details[1] = line(amount);

            let errors = validate_submission(&input, false).unwrap_err();
            assert_eq!(errors.kind(), ErrorKind::InvalidAmount);
            let details = errors.details();
            assert_eq!(details[0].field, "payment_details[1].amount");
        }
    }

    #[test]
    fn test_total_overflow_is_invalid_amount() {
        let mut input = submission("現金");
        input.payment_details[0].amount = Decimal::MAX;
        input.payment_details[1].amount = Decimal::MAX;

        let errors = validate_submission(&input, false).unwrap_err();
        assert_eq!(errors.kind(), ErrorKind::InvalidAmount);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.details()[0].field, "payment_details");
    }

    #[test]
    fn test_large_amounts_that_fit_are_accepted() {
        let mut input = submission("現金");
        input.payment_details[0].amount = Decimal::MAX - Decimal::ONE;
        input.payment_details[1].amount = Decimal::ONE;

        let fields = validate_submission(&input, false).unwrap();
        let request = PaymentRequestBuilder::new(fields).build().unwrap();
        assert_eq!(request.total_amount(), Decimal::MAX);
    }

    #[test]
    fn test_unknown_enum_value_is_rejected() {
        let mut input = submission("支票");
        input.payment_details[0].expense_type = "10.其他".to_string();

        let errors = validate_submission(&input, false).unwrap_err();
        assert_eq!(errors.kind(), ErrorKind::InvalidEnumValue);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_enum_accepts_label_code_and_name() {
        assert_eq!(ProjectType::parse("B"), Some(ProjectType::Activity));
        assert_eq!(ProjectType::parse("D.學校訪談"), Some(ProjectType::SchoolInterview));
        assert_eq!(ExpenseCategory::parse("9"), Some(ExpenseCategory::Miscellaneous));
        assert_eq!(PaymentMethod::parse("Transfer"), Some(PaymentMethod::Transfer));
        assert_eq!(RequestingUnit::parse("資訊媒體執委會"), Some(RequestingUnit::InfoMedia));
        assert_eq!(ExpenseCategory::parse("交通費"), None);
    }

    #[test]
    fn test_application_date_format() {
        for good in ["114.3.15", "99.12.31", "1.1.1"] {
            let mut input = submission("現金");
            input.application_date = Some(good.to_string());
            assert!(validate_submission(&input, false).is_ok(), "{} should pass", good);
        }

        for bad in ["2025-03-15", "114/3/15", "1140.3.15", "114.13.1", "114.0.10", "114.3.32"] {
            let mut input = submission("現金");
            input.application_date = Some(bad.to_string());
            let errors = validate_submission(&input, false).unwrap_err();
            assert_eq!(errors.kind(), ErrorKind::InvalidFormat, "{} should fail", bad);
        }
    }

    #[test]
    fn test_missing_date_and_payee() {
        let mut input = submission("現金");
        input.application_date = None;
        input.payee = "   ".to_string();

        let errors = validate_submission(&input, false).unwrap_err();
        assert_eq!(errors.kind(), ErrorKind::MissingField);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_other_requires_explanation() {
        let mut input = submission("其他");
        input.requesting_unit = "其他".to_string();
        let errors = validate_submission(&input, false).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.kind == ErrorKind::MissingField));

        input.payment_method_other = Some("支票".to_string());
        input.requesting_unit_other = Some("秘書處".to_string());
        assert!(validate_submission(&input, false).is_ok());
    }

    #[test]
    fn test_empty_details_is_missing_field() {
        let mut input = submission("現金");
        input.payment_details.clear();

        let errors = validate_submission(&input, false).unwrap_err();
        assert_eq!(errors.kind(), ErrorKind::MissingField);
    }

    #[test]
    fn test_violations_are_reported_in_field_order() {
        let mut input = submission("匯款");
        input.application_date = Some("bad".to_string());
        input.payment_details[0] = line(0);

        let errors = validate_submission(&input, false).unwrap_err();
        let kinds: Vec<ErrorKind> = errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::InvalidFormat,
                ErrorKind::MissingAttachment,
                ErrorKind::InvalidAmount
            ]
        );
        assert_eq!(errors.kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn test_builder_totals_line_items() {
        let request = PaymentRequestBuilder::new(valid_fields("現金")).build().unwrap();
        assert_eq!(request.total_amount(), Decimal::from(3000));
        assert_eq!(request.payment_method_display(), "現金");
    }

    #[test]
    fn test_builder_requires_bankbook_for_transfer() {
        let err = PaymentRequestBuilder::new(valid_fields("匯款"))
            .build()
            .unwrap_err();
        assert!(matches!(err, RequestError::InvalidRequestState(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidRequestState);

        let request = PaymentRequestBuilder::new(valid_fields("匯款"))
            .bankbook_image(Some(image_file()))
            .build()
            .unwrap();
        assert!(request.bankbook_image().is_some());
    }

    #[test]
    fn test_builder_rejects_bankbook_for_cash() {
        let err = PaymentRequestBuilder::new(valid_fields("現金"))
            .bankbook_image(Some(image_file()))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequestState);
    }

    #[test]
    fn test_builder_rejects_document_as_bankbook() {
        let mut file = image_file();
        file.category = FileCategory::Document;
        file.mime_type = "application/pdf".to_string();

        let err = PaymentRequestBuilder::new(valid_fields("預支"))
            .bankbook_image(Some(file))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequestState);
    }

    #[test]
    fn test_builder_rechecks_amounts() {
        let mut fields = valid_fields("現金");
        fields.line_items[0].amount = Decimal::ZERO;

        let err = PaymentRequestBuilder::new(fields).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequestState);
    }

    #[test]
    fn test_builder_rejects_overflowing_total() {
        let mut fields = valid_fields("現金");
        fields.line_items[0].amount = Decimal::MAX;
        fields.line_items[1].amount = Decimal::MAX;

        let err = PaymentRequestBuilder::new(fields).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequestState);
    }

    #[test]
    fn test_other_display_appends_explanation() {
        let mut input = submission("其他");
        input.payment_method_other = Some("支票".to_string());
        let fields = validate_submission(&input, false).unwrap();

        let request = PaymentRequestBuilder::new(fields).build().unwrap();
        assert_eq!(request.payment_method_display(), "其他 (支票)");
    }
}
