use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use utoipa::ToSchema;

use crate::error::{ProductError, ProductResult};

/// 24 hex digits, the string form of a 12-byte object id
static OBJECT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{24}$").expect("object id pattern"));

/// Stable product identifier, assigned once by the persistence adapter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductId(String);

impl ProductId {
    /// Parse a product id, normalising hex digits to lowercase
    pub fn parse(raw: &str) -> Option<Self> {
        if OBJECT_ID.is_match(raw) {
            Some(Self(raw.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProductId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ProductId::parse(&value).ok_or_else(|| format!("'{}' is not a 24-hex-digit id", value))
    }
}

impl From<ProductId> for String {
    fn from(id: ProductId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to an image hosted by an external provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ImageRef {
    /// Absolute URL used to render the image
    pub url: String,
    /// Provider handle used to replace or delete the asset
    pub public_id: String,
    /// Original upload name, kept for display and audit only
    pub filename: String,
}

/// Product entity as persisted by a storage adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(alias = "_id")]
    #[schema(value_type = String, example = "65a1f0c2e4b0a1b2c3d4e5f6")]
    pub id: ProductId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
    pub price: f64,
    pub stock: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imagery: Option<ImageRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated creation input; carries no system-assigned fields
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct NewProduct {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
    pub price: f64,
    pub stock: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imagery: Option<ImageRef>,
}

/// Validated partial update.
///
/// `None` leaves a field untouched. For the clearable fields the inner
/// `Option` distinguishes "set" from "remove".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<u64>,
    pub imagery: Option<Option<ImageRef>>,
}

impl ProductPatch {
    /// True when the payload changed nothing
    pub fn is_empty(&self) -> bool {
        self == &ProductPatch::default()
    }

    /// Whether applying this patch would drop or swap the current image
    pub fn replaces_imagery(&self, current: Option<&ImageRef>) -> bool {
        match (&self.imagery, current) {
            (Some(next), Some(current)) => next.as_ref() != Some(current),
            _ => false,
        }
    }
}

impl Serialize for ProductPatch {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;
        if let Some(name) = &self.name {
            map.serialize_entry("name", name)?;
        }
        if let Some(description) = &self.description {
            map.serialize_entry("description", description)?;
        }
        if let Some(category) = &self.category {
            map.serialize_entry("category", category)?;
        }
        if let Some(price) = &self.price {
            map.serialize_entry("price", price)?;
        }
        if let Some(stock) = &self.stock {
            map.serialize_entry("stock", stock)?;
        }
        if let Some(imagery) = &self.imagery {
            map.serialize_entry("imagery", imagery)?;
        }
        map.end()
    }
}

impl Product {
    /// Build a persisted record from validated input. Called by storage
    /// adapters, which own id and clock.
    pub fn from_new(id: ProductId, input: NewProduct, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: input.name,
            description: input.description,
            category: input.category,
            price: input.price,
            stock: input.stock,
            imagery: input.imagery,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a validated patch. `id` and `created_at` are never touched and
    /// `updated_at` may only move forward.
    pub fn apply_patch(&mut self, patch: ProductPatch, now: DateTime<Utc>) -> ProductResult<()> {
        if now < self.updated_at {
            return Err(ProductError::TimestampRegression(self.id.clone()));
        }

        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(stock) = patch.stock {
            self.stock = stock;
        }
        if let Some(imagery) = patch.imagery {
            self.imagery = imagery;
        }
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    const ID: &str = "65a1f0c2e4b0a1b2c3d4e5f6";

    fn image(public_id: &str) -> ImageRef {
        ImageRef {
            url: format!("https://res.cloudinary.com/demo/{}.png", public_id),
            public_id: public_id.to_string(),
            filename: "widget.png".to_string(),
        }
    }

    fn widget(now: DateTime<Utc>) -> Product {
        Product::from_new(
            ProductId::parse(ID).unwrap(),
            NewProduct {
                name: "Widget".to_string(),
                description: None,
                category: "Tools".to_string(),
                price: 9.99,
                stock: 5,
                imagery: Some(image("abc123")),
            },
            now,
        )
    }

    #[test]
    fn test_product_id_accepts_24_hex_digits() {
        let id = ProductId::parse("65A1F0C2E4B0A1B2C3D4E5F6").unwrap();
        assert_eq!(id.as_str(), ID);
    }

    #[test]
    fn test_product_id_rejects_other_shapes() {
        assert!(ProductId::parse("").is_none());
        assert!(ProductId::parse("new-id").is_none());
        assert!(ProductId::parse("65a1f0c2e4b0a1b2c3d4e5f").is_none());
        assert!(ProductId::parse("65a1f0c2e4b0a1b2c3d4e5f6a").is_none());
        assert!(ProductId::parse("zza1f0c2e4b0a1b2c3d4e5f6").is_none());
    }

    #[test]
    fn test_from_new_sets_both_timestamps() {
        let now = Utc::now();
        let product = widget(now);
        assert_eq!(product.created_at, now);
        assert_eq!(product.updated_at, now);
    }

    #[test]
    fn test_persisted_record_round_trips_with_mongo_id_alias() {
        let value = json!({
            "_id": ID,
            "name": "Widget",
            "category": "Tools",
            "price": 9.99,
            "stock": 5,
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z"
        });
        let product: Product = serde_json::from_value(value).unwrap();
        assert_eq!(product.id.as_str(), ID);
        assert!(product.imagery.is_none());

        let out = serde_json::to_value(&product).unwrap();
        assert_eq!(out["id"], ID);
        assert!(out.get("imagery").is_none());
    }

    #[test]
    fn test_persisted_record_rejects_malformed_id() {
        let value = json!({
            "id": "not-an-id",
            "name": "Widget",
            "category": "Tools",
            "price": 1.0,
            "stock": 1,
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        });
        assert!(serde_json::from_value::<Product>(value).is_err());
    }

    #[test]
    fn test_apply_patch_keeps_identity_and_moves_updated_at() {
        let created = Utc::now();
        let mut product = widget(created);
        let later = created + Duration::seconds(5);

        let patch = ProductPatch {
            price: Some(12.5),
            description: Some(Some(String::new())),
            ..Default::default()
        };
        product.apply_patch(patch, later).unwrap();

        assert_eq!(product.id.as_str(), ID);
        assert_eq!(product.created_at, created);
        assert_eq!(product.updated_at, later);
        assert_eq!(product.price, 12.5);
        assert_eq!(product.description.as_deref(), Some(""));
        assert_eq!(product.name, "Widget");
    }

    #[test]
    fn test_apply_patch_refuses_to_regress_updated_at() {
        let created = Utc::now();
        let mut product = widget(created);
        let earlier = created - Duration::seconds(1);

        let result = product.apply_patch(
            ProductPatch {
                stock: Some(0),
                ..Default::default()
            },
            earlier,
        );

        assert!(matches!(result, Err(ProductError::TimestampRegression(_))));
        assert_eq!(product.stock, 5);
        assert_eq!(product.updated_at, created);
    }

    #[test]
    fn test_apply_patch_can_clear_imagery() {
        let now = Utc::now();
        let mut product = widget(now);
        product
            .apply_patch(
                ProductPatch {
                    imagery: Some(None),
                    ..Default::default()
                },
                now,
            )
            .unwrap();
        assert!(product.imagery.is_none());
    }

    #[test]
    fn test_replaces_imagery() {
        let current = image("abc123");

        let untouched = ProductPatch::default();
        assert!(!untouched.replaces_imagery(Some(&current)));

        let same = ProductPatch {
            imagery: Some(Some(current.clone())),
            ..Default::default()
        };
        assert!(!same.replaces_imagery(Some(&current)));

        let swapped = ProductPatch {
            imagery: Some(Some(image("def456"))),
            ..Default::default()
        };
        assert!(swapped.replaces_imagery(Some(&current)));
        assert!(!swapped.replaces_imagery(None));

        let cleared = ProductPatch {
            imagery: Some(None),
            ..Default::default()
        };
        assert!(cleared.replaces_imagery(Some(&current)));
    }

    #[test]
    fn test_patch_serializes_only_supplied_fields() {
        let patch = ProductPatch {
            price: Some(12.5),
            imagery: Some(None),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({ "price": 12.5, "imagery": null })
        );
        assert!(ProductPatch::default().is_empty());
        assert!(!patch.is_empty());
    }
}
