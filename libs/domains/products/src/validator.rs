//! Product Schema Validator
//!
//! Pure checks of untrusted structured input against the schema in
//! [`crate::schema`]. Known, required and immutable keys come from the field
//! tables and each field's check is picked by its [`FieldKind`]. Every field
//! is checked, so one call reports every problem. Nothing is corrected,
//! defaulted or assigned here: ids and timestamps belong to the persistence
//! adapter.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, error, instrument};
use ::validator::ValidateUrl;

use crate::config::{UnknownFieldPolicy, ValidatorConfig};
use crate::error::{ProductError, ProductResult, ValidationFailed, Violation, ViolationKind};
use crate::models::{ImageRef, NewProduct, Product, ProductId, ProductPatch};
use crate::schema::{self, FieldKind, FieldSpec, Origin};

static HTTP_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)https?://").expect("url scheme pattern"));

/// Scheme and host of an http(s) URL; userinfo skipped, IPv6 literals kept whole
static HTTP_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)https?://(?:[^/?#@]*@)?(\[[^\]/]*\]|[^/?#:]+)").expect("url host pattern")
});

/// Validates Product input for creation, update and persisted records.
///
/// Holds only immutable policy, so it is `Send + Sync` and can be shared or
/// cloned freely.
#[derive(Debug, Clone, Default)]
pub struct ProductValidator {
    config: ValidatorConfig,
}

impl ProductValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate creation input.
    ///
    /// Requires every field the schema marks required (`name`, `category`,
    /// `price`, `stock`) and accepts the optional ones. System fields are
    /// always rejected. Other keys follow the configured
    /// [`UnknownFieldPolicy`].
    #[instrument(level = "debug", skip_all)]
    pub fn validate_for_create(&self, input: &Value) -> ProductResult<NewProduct> {
        let fields = as_object(input, "creation input")?;
        let mut checks = Checks::new(&self.config);
        checks.screen_keys(fields);

        let mut draft = checks.collect(fields, schema::input_product_fields(), |f| f.required);

        checks.finish("create", || {
            Some(NewProduct {
                name: draft.text("name")?,
                description: draft.text("description"),
                category: draft.text("category")?,
                price: draft.decimal("price")?,
                stock: draft.integer("stock")?,
                imagery: draft.image("imagery"),
            })
        })
    }

    /// Validate a partial update.
    ///
    /// Every key is optional, but present keys meet the creation rules. `null`
    /// clears an optional field and is refused for required ones. Any attempt
    /// to send `id`, `createdAt` or `updatedAt` rejects the whole payload.
    #[instrument(level = "debug", skip_all)]
    pub fn validate_for_update(&self, input: &Value) -> ProductResult<ProductPatch> {
        let fields = as_object(input, "update payload")?;
        let mut checks = Checks::new(&self.config);
        let mut draft = Draft::default();

        for (key, value) in fields {
            if schema::is_system_field(key) {
                checks.immutable(key);
                continue;
            }
            let Some(spec) = schema::product_field(key) else {
                checks.unknown(key);
                continue;
            };
            let checked = match value {
                Value::Null if spec.required => {
                    checks.cleared(key);
                    None
                }
                Value::Null => Some(Checked::Cleared),
                _ => checks.field(spec, key, value),
            };
            draft.put(spec.name, checked);
        }

        checks.finish("update", || {
            Some(ProductPatch {
                name: draft.text("name"),
                description: draft.clearable("description", Draft::text),
                category: draft.text("category"),
                price: draft.decimal("price"),
                stock: draft.integer("stock"),
                imagery: draft.clearable("imagery", Draft::image),
            })
        })
    }

    /// Validate an image reference on its own. Absence and `null` mean "no
    /// image" and are valid.
    #[instrument(level = "debug", skip_all)]
    pub fn validate_image_ref(&self, input: Option<&Value>) -> ProductResult<Option<ImageRef>> {
        let Some(value) = input.filter(|v| !v.is_null()) else {
            return Ok(None);
        };
        as_object(value, "image reference")?;

        let mut checks = Checks::new(&self.config);
        let image = checks.image_ref("imagery", value);
        checks.finish("image_ref", || image).map(Some)
    }

    /// Confirm an id is well formed before it is used for lookup, update or
    /// deletion.
    pub fn validate_product_id(&self, raw: &str) -> ProductResult<ProductId> {
        ProductId::parse(raw).ok_or_else(|| {
            reject(
                "id",
                ValidationFailed {
                    violations: vec![invalid_id("id", raw)],
                },
            )
        })
    }

    /// Validate a full persisted record, e.g. one read back from storage.
    ///
    /// System fields are required here and `updatedAt` must not precede
    /// `createdAt`. The id may arrive as `id`, `_id` or both, but both must
    /// name the same product.
    #[instrument(level = "debug", skip_all)]
    pub fn validate_record(&self, input: &Value) -> ProductResult<Product> {
        let fields = as_object(input, "product record")?;
        let mut checks = Checks::new(&self.config);
        for key in fields.keys() {
            if !schema::is_input_field(key) && !schema::is_system_field(key) {
                checks.unknown(key);
            }
        }

        // `id` is checked for presence with its `_id` alias below
        let mut draft = checks.collect(fields, schema::PRODUCT_FIELDS, |f| {
            f.required || (f.origin == Origin::System && f.name != "id")
        });
        let id = draft.id("id");
        let id = checks.record_id(fields, id);

        let created_at = draft.time("createdAt");
        let updated_at = draft.time("updatedAt");
        if let (Some(created), Some(updated)) = (created_at, updated_at) {
            if updated < created {
                checks.push(
                    "updatedAt",
                    ViolationKind::RangeViolation,
                    "updatedAt must not be earlier than createdAt",
                );
            }
        }

        checks.finish("record", || {
            Some(Product {
                id: id?,
                name: draft.text("name")?,
                description: draft.text("description"),
                category: draft.text("category")?,
                price: draft.decimal("price")?,
                stock: draft.integer("stock")?,
                imagery: draft.image("imagery"),
                created_at: created_at?,
                updated_at: updated_at?,
            })
        })
    }
}

/// Top-level input must be a mapping; anything else is a caller bug, not bad data
fn as_object<'v>(input: &'v Value, what: &str) -> ProductResult<&'v Map<String, Value>> {
    input.as_object().ok_or_else(|| {
        ProductError::InvalidInput(format!(
            "{} must be a JSON object, got {}",
            what,
            type_name(input)
        ))
    })
}

/// A key counts as present unless it is absent or `null`
fn present<'v>(fields: &'v Map<String, Value>, key: &str) -> Option<&'v Value> {
    fields.get(key).filter(|v| !v.is_null())
}

fn reject(operation: &'static str, failed: ValidationFailed) -> ProductError {
    debug!(operation, violations = failed.len(), "Product input rejected");
    ProductError::Validation(failed)
}

fn invalid_id(path: &str, raw: &str) -> Violation {
    Violation::new(
        path,
        ViolationKind::InvalidIdentifier,
        format!("'{}' is not a 24-hex-digit product id", raw),
    )
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn expected(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::BoundedText | FieldKind::NonEmptyText | FieldKind::Text => "a string",
        FieldKind::NonNegativeDecimal => "a number",
        FieldKind::NonNegativeInteger => "a whole number",
        FieldKind::ImageRef => "an object with url, public_id and filename",
        FieldKind::Url => "a URL string",
        FieldKind::ObjectId => "a 24-hex-digit string",
        FieldKind::Timestamp => "an RFC 3339 timestamp",
    }
}

/// A field value that passed its check
#[derive(Debug)]
enum Checked {
    Text(String),
    Decimal(f64),
    Integer(u64),
    Image(ImageRef),
    Id(ProductId),
    Time(DateTime<Utc>),
    /// `null` sent for an optional field on update
    Cleared,
}

/// Checked values by field name, drained into a typed model
#[derive(Debug, Default)]
struct Draft(HashMap<&'static str, Checked>);

impl Draft {
    fn put(&mut self, key: &'static str, value: Option<Checked>) {
        if let Some(value) = value {
            self.0.insert(key, value);
        }
    }

    fn text(&mut self, key: &str) -> Option<String> {
        match self.0.remove(key)? {
            Checked::Text(s) => Some(s),
            _ => None,
        }
    }

    fn decimal(&mut self, key: &str) -> Option<f64> {
        match self.0.remove(key)? {
            Checked::Decimal(n) => Some(n),
            _ => None,
        }
    }

    fn integer(&mut self, key: &str) -> Option<u64> {
        match self.0.remove(key)? {
            Checked::Integer(n) => Some(n),
            _ => None,
        }
    }

    fn image(&mut self, key: &str) -> Option<ImageRef> {
        match self.0.remove(key)? {
            Checked::Image(image) => Some(image),
            _ => None,
        }
    }

    fn id(&mut self, key: &str) -> Option<ProductId> {
        match self.0.remove(key)? {
            Checked::Id(id) => Some(id),
            _ => None,
        }
    }

    fn time(&mut self, key: &str) -> Option<DateTime<Utc>> {
        match self.0.remove(key)? {
            Checked::Time(t) => Some(t),
            _ => None,
        }
    }

    /// `Some(None)` when the field was cleared, `Some(Some(_))` when set
    fn clearable<T>(&mut self, key: &str, pick: fn(&mut Self, &str) -> Option<T>) -> Option<Option<T>> {
        if matches!(self.0.get(key), Some(Checked::Cleared)) {
            self.0.remove(key);
            return Some(None);
        }
        pick(self, key).map(Some)
    }
}

/// Violation collector for a single validation call
struct Checks<'c> {
    config: &'c ValidatorConfig,
    violations: Vec<Violation>,
}

impl<'c> Checks<'c> {
    fn new(config: &'c ValidatorConfig) -> Self {
        Self {
            config,
            violations: Vec::new(),
        }
    }

    fn push(&mut self, field: &str, kind: ViolationKind, message: impl Into<String>) {
        self.violations.push(Violation::new(field, kind, message));
    }

    fn mismatch(&mut self, path: &str, kind: FieldKind, got: &Value) {
        self.push(
            path,
            ViolationKind::TypeMismatch,
            format!("{} must be {}, got {}", path, expected(kind), type_name(got)),
        );
    }

    fn negative(&mut self, path: &str, n: f64) {
        self.push(
            path,
            ViolationKind::RangeViolation,
            format!("{} must be zero or greater, got {}", path, n),
        );
    }

    fn missing(&mut self, path: &str) {
        self.push(
            path,
            ViolationKind::MissingField,
            format!("{} is required", path),
        );
    }

    fn immutable(&mut self, key: &str) {
        self.push(
            key,
            ViolationKind::ImmutableFieldModification,
            format!("{} is assigned by the system and cannot be set", key),
        );
    }

    fn unknown(&mut self, path: &str) {
        if self.config.unknown_fields == UnknownFieldPolicy::Strict {
            self.push(
                path,
                ViolationKind::UnknownField,
                format!("{} is not part of the product schema", path),
            );
        }
    }

    /// Required fields may be changed on update but never removed
    fn cleared(&mut self, key: &str) {
        self.push(
            key,
            ViolationKind::TypeMismatch,
            format!("{} is required and cannot be cleared", key),
        );
    }

    /// Flag system and unknown keys on creation input
    fn screen_keys(&mut self, fields: &Map<String, Value>) {
        for key in fields.keys() {
            if schema::is_system_field(key) {
                self.immutable(key);
            } else if !schema::is_input_field(key) {
                self.unknown(key);
            }
        }
    }

    /// Check every listed field that is present and report the required ones
    /// that are not
    fn collect(
        &mut self,
        fields: &Map<String, Value>,
        specs: impl IntoIterator<Item = &'static FieldSpec>,
        required: impl Fn(&FieldSpec) -> bool,
    ) -> Draft {
        let mut draft = Draft::default();
        for spec in specs {
            match present(fields, spec.name) {
                Some(value) => {
                    let checked = self.field(spec, spec.name, value);
                    draft.put(spec.name, checked);
                }
                None if required(spec) => self.missing(spec.name),
                None => {}
            }
        }
        draft
    }

    /// Run the check a field's kind calls for
    fn field(&mut self, spec: &FieldSpec, path: &str, value: &Value) -> Option<Checked> {
        match spec.kind {
            FieldKind::BoundedText => self.bounded_text(path, value).map(Checked::Text),
            FieldKind::NonEmptyText => self.non_empty_text(path, value).map(Checked::Text),
            FieldKind::Text => self.text(path, value).map(Checked::Text),
            FieldKind::NonNegativeDecimal => self.decimal(path, value).map(Checked::Decimal),
            FieldKind::NonNegativeInteger => self.integer(path, value).map(Checked::Integer),
            FieldKind::ImageRef => self.image_ref(path, value).map(Checked::Image),
            FieldKind::Url => self.url(path, value).map(Checked::Text),
            FieldKind::ObjectId => self.product_id(path, value).map(Checked::Id),
            FieldKind::Timestamp => self.timestamp(path, value).map(Checked::Time),
        }
    }

    fn text(&mut self, path: &str, value: &Value) -> Option<String> {
        match value.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                self.mismatch(path, FieldKind::Text, value);
                None
            }
        }
    }

    fn non_empty_text(&mut self, path: &str, value: &Value) -> Option<String> {
        let Some(s) = value.as_str() else {
            self.mismatch(path, FieldKind::NonEmptyText, value);
            return None;
        };
        if s.trim().is_empty() {
            self.push(
                path,
                ViolationKind::EmptyField,
                format!("{} must not be blank", path),
            );
            return None;
        }
        Some(s.to_string())
    }

    fn bounded_text(&mut self, path: &str, value: &Value) -> Option<String> {
        let text = self.non_empty_text(path, value)?;
        let max = self.config.name_max_len;
        let len = text.chars().count();
        if len > max {
            self.push(
                path,
                ViolationKind::TooLong,
                format!("{} is {} characters, at most {} allowed", path, len, max),
            );
            return None;
        }
        Some(text)
    }

    /// Negative zero is accepted as zero
    fn decimal(&mut self, path: &str, value: &Value) -> Option<f64> {
        let Some(n) = value.as_f64().filter(|n| n.is_finite()) else {
            self.mismatch(path, FieldKind::NonNegativeDecimal, value);
            return None;
        };
        if n < 0.0 {
            self.negative(path, n);
            return None;
        }
        Some(if n == 0.0 { 0.0 } else { n })
    }

    /// Only JSON integers are whole numbers; a negative value of any numeric
    /// form is also out of range
    fn integer(&mut self, path: &str, value: &Value) -> Option<u64> {
        if let Some(n) = value.as_u64() {
            return Some(n);
        }
        if !value.is_i64() {
            self.mismatch(path, FieldKind::NonNegativeInteger, value);
        }
        if let Some(n) = value.as_f64().filter(|n| *n < 0.0) {
            self.negative(path, n);
        }
        None
    }

    fn url(&mut self, path: &str, value: &Value) -> Option<String> {
        let url = self.non_empty_text(path, value)?;
        let host = HTTP_HOST
            .captures(&url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        match host {
            _ if !url.validate_url() => self.push(
                path,
                ViolationKind::InvalidUrl,
                format!("{} is not a valid absolute URL", path),
            ),
            None if HTTP_SCHEME.is_match(&url) => self.push(
                path,
                ViolationKind::InvalidUrl,
                format!("{} has no host", path),
            ),
            None => self.push(
                path,
                ViolationKind::InvalidUrl,
                format!("{} must use http or https", path),
            ),
            Some(host) if !self.config.accepts_image_host(&host) => self.push(
                path,
                ViolationKind::InvalidUrl,
                format!("{} points at '{}', which is not an accepted image host", path, host),
            ),
            Some(_) => return Some(url),
        }
        None
    }

    /// All-or-nothing check of an embedded image reference
    fn image_ref(&mut self, path: &str, value: &Value) -> Option<ImageRef> {
        let Some(fields) = value.as_object() else {
            self.mismatch(path, FieldKind::ImageRef, value);
            return None;
        };

        for key in fields.keys() {
            if !schema::is_image_ref_field(key) {
                self.unknown(&format!("{}.{}", path, key));
            }
        }

        let mut draft = Draft::default();
        for spec in schema::IMAGE_REF_FIELDS {
            let sub_path = format!("{}.{}", path, spec.name);
            match present(fields, spec.name) {
                Some(v) => {
                    let checked = self.field(spec, &sub_path, v);
                    draft.put(spec.name, checked);
                }
                None => self.push(
                    &sub_path,
                    ViolationKind::PartialImageRef,
                    format!(
                        "{} is missing {}; url, public_id and filename are all required",
                        path, spec.name
                    ),
                ),
            }
        }

        Some(ImageRef {
            url: draft.text("url")?,
            public_id: draft.text("public_id")?,
            filename: draft.text("filename")?,
        })
    }

    fn product_id(&mut self, path: &str, value: &Value) -> Option<ProductId> {
        let Some(raw) = value.as_str() else {
            self.mismatch(path, FieldKind::ObjectId, value);
            return None;
        };
        let id = ProductId::parse(raw);
        if id.is_none() {
            self.violations.push(invalid_id(path, raw));
        }
        id
    }

    /// Reconcile a record's `id` with its storage alias `_id`. Either may
    /// stand alone; when both are sent they must agree.
    fn record_id(&mut self, fields: &Map<String, Value>, id: Option<ProductId>) -> Option<ProductId> {
        let has_id = present(fields, "id").is_some();
        let Some(raw) = present(fields, "_id") else {
            if !has_id {
                self.missing("id");
            }
            return id;
        };
        let alias = self.product_id("_id", raw);
        if !has_id {
            return alias;
        }
        match (id, alias) {
            (Some(id), Some(alias)) if id != alias => {
                self.push(
                    "_id",
                    ViolationKind::InvalidIdentifier,
                    format!("_id '{}' conflicts with id '{}'", alias, id),
                );
                None
            }
            (id, _) => id,
        }
    }

    fn timestamp(&mut self, path: &str, value: &Value) -> Option<DateTime<Utc>> {
        let parsed = value
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc));
        if parsed.is_none() {
            self.mismatch(path, FieldKind::Timestamp, value);
        }
        parsed
    }

    /// Fail with everything collected, or build the validated value
    fn finish<T>(
        self,
        operation: &'static str,
        build: impl FnOnce() -> Option<T>,
    ) -> ProductResult<T> {
        if let Some(failed) = ValidationFailed::from_violations(self.violations) {
            return Err(reject(operation, failed));
        }
        // Every absent required value records a violation, so this only
        // trips if a check forgets to.
        build().ok_or_else(|| {
            error!(operation, "Validated input could not be assembled");
            ProductError::Internal(format!(
                "{} input passed validation but could not be assembled",
                operation
            ))
        })
    }
}
