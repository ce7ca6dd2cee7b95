use serde::{Deserialize, Serialize};

use crate::config::BrandContext;
use crate::model::field::FieldKind;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldRequest {
    pub kind: FieldKind,
    pub source_text: String,
    pub char_limit: usize,
}

/// One batched request per locale.
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub locale_name: String,
    pub context: BrandContext,
    pub fields: Vec<FieldRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShortenField {
    pub kind: FieldKind,
    pub previous_text: String,
    pub char_limit: usize,
    pub instruction: String,
}

/// Follow-up scoped to the fields that came back over their limit.
#[derive(Debug, Clone)]
pub struct ShortenRequest {
    pub locale_name: String,
    pub context: BrandContext,
    pub fields: Vec<ShortenField>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldTranslation {
    pub kind: FieldKind,
    pub text: String,
    pub note: String,
}
