//! Versioned Product schema definition
//!
//! The field tables below are the single place the Product and ImageRef shapes
//! are declared. The validator walks them for its known-key, immutable-key and
//! required-key checks and picks each field's check from its [`FieldKind`].
//! Adding a field means editing this file, the typed models that carry it and
//! bumping [`SCHEMA_VERSION`].

/// Current schema revision
pub const SCHEMA_VERSION: u32 = 1;

/// Recommended upper bound on product name length, in characters
pub const DEFAULT_NAME_MAX_LEN: usize = 200;

/// Semantic type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Non-blank text capped at the configured name length
    BoundedText,
    /// Text that must not be blank after trimming
    NonEmptyText,
    /// Text that may be empty
    Text,
    /// Finite number `>= 0`
    NonNegativeDecimal,
    /// Integer `>= 0`
    NonNegativeInteger,
    /// Embedded [`crate::models::ImageRef`]
    ImageRef,
    /// Absolute http(s) URL
    Url,
    /// 24 hex digits
    ObjectId,
    /// RFC 3339 timestamp
    Timestamp,
}

/// Who supplies a field's value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Supplied by callers on create and update
    Input,
    /// Assigned by the persistence adapter; never accepted from callers
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Key as it appears in structured input
    pub name: &'static str,
    pub kind: FieldKind,
    /// Must be present on creation input. System fields are instead
    /// required on persisted records.
    pub required: bool,
    pub origin: Origin,
}

impl FieldSpec {
    const fn input(name: &'static str, kind: FieldKind, required: bool) -> Self {
        Self {
            name,
            kind,
            required,
            origin: Origin::Input,
        }
    }

    const fn system(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            origin: Origin::System,
        }
    }
}

pub const PRODUCT_FIELDS: &[FieldSpec] = &[
    FieldSpec::system("id", FieldKind::ObjectId),
    FieldSpec::input("name", FieldKind::BoundedText, true),
    FieldSpec::input("description", FieldKind::Text, false),
    FieldSpec::input("category", FieldKind::NonEmptyText, true),
    FieldSpec::input("price", FieldKind::NonNegativeDecimal, true),
    FieldSpec::input("stock", FieldKind::NonNegativeInteger, true),
    FieldSpec::input("imagery", FieldKind::ImageRef, false),
    FieldSpec::system("createdAt", FieldKind::Timestamp),
    FieldSpec::system("updatedAt", FieldKind::Timestamp),
];

pub const IMAGE_REF_FIELDS: &[FieldSpec] = &[
    FieldSpec::input("url", FieldKind::Url, true),
    FieldSpec::input("public_id", FieldKind::NonEmptyText, true),
    FieldSpec::input("filename", FieldKind::NonEmptyText, true),
];

/// Storage-level spellings of system fields that callers must not send either
const SYSTEM_ALIASES: &[&str] = &["_id"];

/// Look up a Product field by key
pub fn product_field(name: &str) -> Option<&'static FieldSpec> {
    PRODUCT_FIELDS.iter().find(|f| f.name == name)
}

/// True for keys naming a system-assigned field, aliases included
pub fn is_system_field(name: &str) -> bool {
    SYSTEM_ALIASES.contains(&name)
        || product_field(name).is_some_and(|f| f.origin == Origin::System)
}

/// True for keys callers may supply
pub fn is_input_field(name: &str) -> bool {
    product_field(name).is_some_and(|f| f.origin == Origin::Input)
}

/// Fields callers may supply, in schema order
pub fn input_product_fields() -> impl Iterator<Item = &'static FieldSpec> {
    PRODUCT_FIELDS.iter().filter(|f| f.origin == Origin::Input)
}

/// Fields a creation payload must carry
pub fn required_product_fields() -> impl Iterator<Item = &'static FieldSpec> {
    input_product_fields().filter(|f| f.required)
}

pub fn is_image_ref_field(name: &str) -> bool {
    IMAGE_REF_FIELDS.iter().any(|f| f.name == name)
}
