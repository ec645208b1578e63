//! Table schemas supplied as configuration data.
//!
//! A [`TableSchema`] names the table, the collection segment it is addressed
//! by, a version number, and the constraints of every non-id column. The
//! store validates write requests against it before any storage access.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{Fields, ID_COLUMN, Selection, StoreError, ValidationError, Value};

/// Storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
}

/// Constraints for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    /// Must be supplied (and non-empty, for text) on create.
    #[serde(default)]
    pub required: bool,
    /// Integer columns only: negative values are rejected.
    #[serde(default)]
    pub non_negative: bool,
    /// Integer columns only: closed classification enumeration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<i64>>,
    /// Column default applied by storage when the field is omitted on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Text,
            required: false,
            non_negative: false,
            values: None,
            default: None,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self {
            kind: FieldKind::Integer,
            ..Self::text(name)
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn non_negative(mut self) -> Self {
        self.non_negative = true;
        self
    }

    pub fn values(mut self, values: impl IntoIterator<Item = i64>) -> Self {
        self.values = Some(values.into_iter().collect());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Whether this column is a classification enumeration.
    pub fn is_classification(&self) -> bool {
        self.values.is_some()
    }

    /// Whether the persisted column rejects NULL.
    pub fn not_null(&self) -> bool {
        self.required || self.default.is_some() || self.is_classification()
    }

    /// Validate and normalize one supplied value.
    ///
    /// Integer columns accept integers, integral floats and numeric text.
    /// Text columns render scalar values to text.
    pub fn coerce(&self, value: Value) -> Result<Value, ValidationError> {
        if value.is_null() {
            return if self.not_null() {
                Err(self.required_error())
            } else {
                Ok(Value::Null)
            };
        }

        match self.kind {
            FieldKind::Text => {
                let text = match value {
                    Value::String(s) => s,
                    Value::Int(n) => n.to_string(),
                    Value::Float(f) if !f.is_finite() => return Err(self.invalid_error()),
                    Value::Float(f) => format!("{:?}", f),
                    Value::Bool(b) => b.to_string(),
                    Value::Null => String::new(),
                };
                if text.is_empty() && self.required {
                    return Err(self.required_error());
                }
                Ok(Value::String(text))
            }
            FieldKind::Integer => {
                let n = integer_of(&value).ok_or_else(|| self.invalid_error())?;
                if let Some(values) = &self.values {
                    if !values.contains(&n) {
                        return Err(ValidationError::InvalidClassification {
                            field: self.name.clone(),
                            value: n,
                        });
                    }
                }
                if self.non_negative && n < 0 {
                    return Err(self.invalid_error());
                }
                Ok(Value::Int(n))
            }
        }
    }

    fn required_error(&self) -> ValidationError {
        ValidationError::Required {
            field: self.name.clone(),
        }
    }

    fn invalid_error(&self) -> ValidationError {
        ValidationError::Invalid {
            field: self.name.clone(),
        }
    }
}

fn integer_of(value: &Value) -> Option<i64> {
    match value {
        Value::Int(n) => Some(*n),
        Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Some(*f as i64),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Outcome of the lazy schema step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStatus {
    /// The table did not exist and was created.
    Created,
    /// The table exists at the expected version.
    Current,
    /// The stored version differed; the table was dropped and recreated.
    /// Every previously stored row is gone.
    Recreated { previous: u32 },
}

/// Schema of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: String,
    /// Path segment the table is addressed by.
    pub collection: String,
    /// Any change to this number drops and recreates the table.
    pub version: u32,
    pub fields: Vec<FieldSpec>,
}

impl TableSchema {
    /// Build and validate a schema.
    pub fn new(
        table: impl Into<String>,
        collection: impl Into<String>,
        version: u32,
        fields: Vec<FieldSpec>,
    ) -> Result<Self, StoreError> {
        let schema = Self {
            table: table.into(),
            collection: collection.into(),
            version,
            fields,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Parse and validate a schema from JSON.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let schema: Self = serde_json::from_str(json)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Check identifiers, duplicates and default values.
    pub fn validate(&self) -> Result<(), StoreError> {
        if !is_identifier(&self.table) {
            return Err(StoreError::InvalidSchema(format!(
                "table name '{}' is not a valid identifier",
                self.table
            )));
        }
        if self.collection.is_empty() || self.collection.contains('/') {
            return Err(StoreError::InvalidSchema(format!(
                "collection '{}' must be a single path segment",
                self.collection
            )));
        }
        if self.version == 0 {
            return Err(StoreError::InvalidSchema(
                "schema version must be at least 1".to_string(),
            ));
        }
        if self.fields.is_empty() {
            return Err(StoreError::InvalidSchema(
                "schema declares no fields".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !is_identifier(&field.name) {
                return Err(StoreError::InvalidSchema(format!(
                    "field name '{}' is not a valid identifier",
                    field.name
                )));
            }
            if field.name.eq_ignore_ascii_case(ID_COLUMN) {
                return Err(StoreError::InvalidSchema(format!(
                    "'{}' is reserved for the primary key",
                    ID_COLUMN
                )));
            }
            if !seen.insert(field.name.to_ascii_lowercase()) {
                return Err(StoreError::InvalidSchema(format!(
                    "duplicate field '{}'",
                    field.name
                )));
            }
            if field.kind == FieldKind::Text && (field.non_negative || field.values.is_some()) {
                return Err(StoreError::InvalidSchema(format!(
                    "text field '{}' cannot carry numeric constraints",
                    field.name
                )));
            }
            if let Some(values) = &field.values {
                if !values.contains(&0) {
                    return Err(StoreError::InvalidSchema(format!(
                        "classification '{}' must include 0 (unknown)",
                        field.name
                    )));
                }
            }
            if let Some(default) = &field.default {
                field.coerce(default.clone()).map_err(|e| {
                    StoreError::InvalidSchema(format!("default for '{}': {}", field.name, e))
                })?;
            }
        }
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether `name` is `id` or a declared column.
    pub fn has_column(&self, name: &str) -> bool {
        name == ID_COLUMN || self.field(name).is_some()
    }

    /// Validate a create request.
    ///
    /// Every supplied field is checked and normalized; every required field
    /// without a default must be present.
    pub fn prepare_insert(&self, fields: Fields) -> Result<Fields, ValidationError> {
        let normalized = self.prepare_update(fields)?;
        for spec in &self.fields {
            if spec.required && spec.default.is_none() && !normalized.contains_key(&spec.name) {
                return Err(spec.required_error());
            }
        }
        Ok(normalized)
    }

    /// Validate a partial update: only supplied fields are checked.
    pub fn prepare_update(&self, fields: Fields) -> Result<Fields, ValidationError> {
        let mut normalized = Fields::new();
        for (name, value) in fields {
            if name == ID_COLUMN {
                return Err(ValidationError::ImmutableId);
            }
            let spec = self
                .field(&name)
                .ok_or_else(|| ValidationError::UnknownField { field: name.clone() })?;
            normalized.insert(name, spec.coerce(value)?);
        }
        Ok(normalized)
    }

    /// Reject filters and sort keys on undeclared columns.
    pub fn check_selection(&self, selection: &Selection) -> Result<(), ValidationError> {
        match selection
            .referenced_fields()
            .find(|field| !self.has_column(field))
        {
            Some(field) => Err(ValidationError::UnknownField {
                field: field.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Pet shelter table: name, breed, gender, weight.
    pub fn pets() -> Self {
        Self {
            table: "pets".to_string(),
            collection: "pets".to_string(),
            version: 1,
            fields: vec![
                FieldSpec::text(pets::NAME).required(),
                FieldSpec::text(pets::BREED).required(),
                FieldSpec::integer(pets::GENDER)
                    .values([pets::GENDER_UNKNOWN, pets::GENDER_MALE, pets::GENDER_FEMALE])
                    .default_value(pets::GENDER_UNKNOWN),
                FieldSpec::integer(pets::WEIGHT)
                    .non_negative()
                    .default_value(0),
            ],
        }
    }

    /// Shop inventory table: item, supplier contact, section and price.
    pub fn stock() -> Self {
        Self {
            table: "stock".to_string(),
            collection: "stock".to_string(),
            version: 1,
            fields: vec![
                FieldSpec::text(stock::NAME).required(),
                FieldSpec::text(stock::BRAND).required(),
                FieldSpec::integer(stock::QUANTITY)
                    .non_negative()
                    .default_value(0),
                FieldSpec::text(stock::SUPPLIER_NAME).required(),
                FieldSpec::text(stock::SUPPLIER_PHONE).required(),
                FieldSpec::text(stock::SUPPLIER_EMAIL).required(),
                FieldSpec::integer(stock::SECTION)
                    .values(stock::SECTION_UNKNOWN..=stock::SECTION_VEGETABLES)
                    .default_value(stock::SECTION_UNKNOWN),
                FieldSpec::integer(stock::PRICE)
                    .non_negative()
                    .default_value(0),
                FieldSpec::text(stock::IMAGE),
            ],
        }
    }
}

/// Column names and gender values of the pets preset.
pub mod pets {
    pub const NAME: &str = "name";
    pub const BREED: &str = "breed";
    pub const GENDER: &str = "gender";
    pub const WEIGHT: &str = "weight";

    pub const GENDER_UNKNOWN: i64 = 0;
    pub const GENDER_MALE: i64 = 1;
    pub const GENDER_FEMALE: i64 = 2;
}

/// Column names and section values of the stock preset.
pub mod stock {
    pub const NAME: &str = "name";
    pub const BRAND: &str = "brand";
    pub const QUANTITY: &str = "quantity";
    pub const SUPPLIER_NAME: &str = "supplier_name";
    pub const SUPPLIER_PHONE: &str = "supplier_phone";
    pub const SUPPLIER_EMAIL: &str = "supplier_email";
    pub const SECTION: &str = "section";
    pub const PRICE: &str = "price";
    pub const IMAGE: &str = "image";

    pub const SECTION_UNKNOWN: i64 = 0;
    pub const SECTION_BREAD: i64 = 1;
    pub const SECTION_CLEANING: i64 = 2;
    pub const SECTION_COSMETICS: i64 = 3;
    pub const SECTION_DAIRY: i64 = 4;
    pub const SECTION_DRESSINGS_SAUCES: i64 = 5;
    pub const SECTION_ELECTRICAL: i64 = 6;
    pub const SECTION_FROZEN: i64 = 7;
    pub const SECTION_FRUIT: i64 = 8;
    pub const SECTION_KITCHEN_UTENSILS: i64 = 9;
    pub const SECTION_VEGETABLES: i64 = 10;
}

/// ASCII identifier: a letter or underscore, then letters, digits or underscores.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
