//! Assembly of validated fields and stored files into a [`PaymentRequest`].

use rust_decimal::Decimal;

use super::models::{sum_amounts, PaymentRequest};
use super::validation::ValidatedFields;
use crate::error::RequestError;
use crate::storage::{FileCategory, StoredFile};

/// Pure, I/O-free assembly of a payment request.
///
/// `build` re-checks the record invariants and fails with
/// `InvalidRequestState` when one is broken.
#[derive(Debug)]
pub struct PaymentRequestBuilder {
    fields: ValidatedFields,
    bankbook_image: Option<StoredFile>,
}

impl PaymentRequestBuilder {
    pub fn new(fields: ValidatedFields) -> Self {
        Self {
            fields,
            bankbook_image: None,
        }
    }

    pub fn bankbook_image(mut self, file: Option<StoredFile>) -> Self {
        self.bankbook_image = file;
        self
    }

    pub fn build(self) -> Result<PaymentRequest, RequestError> {
        let fields = self.fields;

        if fields.line_items.is_empty() {
            return Err(RequestError::InvalidRequestState(
                "payment request has no line items".to_string(),
            ));
        }
        if let Some(pos) = fields.line_items.iter().position(|l| l.amount <= Decimal::ZERO) {
            return Err(RequestError::InvalidRequestState(format!(
                "line item {} has a non-positive amount",
                pos
            )));
        }
        if sum_amounts(fields.line_items.iter().map(|l| l.amount)).is_none() {
            return Err(RequestError::InvalidRequestState(
                "line item total overflows".to_string(),
            ));
        }

        let needs_bankbook = fields.payment_method.requires_bankbook();
        match (&self.bankbook_image, needs_bankbook) {
            (None, true) => {
                return Err(RequestError::InvalidRequestState(format!(
                    "payment method {:?} requires a bankbook image",
                    fields.payment_method
                )))
            }
            (Some(_), false) => {
                return Err(RequestError::InvalidRequestState(format!(
                    "payment method {:?} does not take a bankbook image",
                    fields.payment_method
                )))
            }
            (Some(file), true) if file.category != FileCategory::Image => {
                return Err(RequestError::InvalidRequestState(format!(
                    "bankbook reference {} is not an image",
                    file.file_id
                )))
            }
            _ => {}
        }

        Ok(PaymentRequest {
            application_date: fields.application_date,
            payee: fields.payee,
            payment_method: fields.payment_method,
            payment_method_other: fields.payment_method_other,
            requesting_unit: fields.requesting_unit,
            requesting_unit_other: fields.requesting_unit_other,
            line_items: fields.line_items,
            bankbook_image: self.bankbook_image,
        })
    }
}
