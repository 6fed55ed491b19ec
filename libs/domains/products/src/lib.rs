//! Products Domain
//!
//! Schema validation for catalog Product records, plus the seams a catalog
//! service plugs its storage into.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  API layer       │  ← decodes requests into serde_json::Value (external)
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │  Service         │  ← validate, then call the adapters
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │  Validator       │  ← pure checks against the versioned schema
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐   ┌──────────────┐
//! │  Repository      │   │  ImageStore  │  ← traits, implemented outside
//! └──────────────────┘   └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use domain_products::{ProductValidator, ValidatorConfig, ViolationKind};
//! use serde_json::json;
//!
//! let validator = ProductValidator::new(ValidatorConfig::default());
//!
//! let product = validator
//!     .validate_for_create(&json!({
//!         "name": "Widget",
//!         "category": "Tools",
//!         "price": 9.99,
//!         "stock": 5
//!     }))
//!     .unwrap();
//! assert_eq!(product.name, "Widget");
//!
//! let err = validator
//!     .validate_for_create(&json!({ "name": "", "category": "Tools", "price": -1, "stock": 5 }))
//!     .unwrap_err();
//! let failed = err.violations().unwrap();
//! assert!(failed.has("name", ViolationKind::EmptyField));
//! assert!(failed.has("price", ViolationKind::RangeViolation));
//! ```

pub mod config;
pub mod error;
pub mod image_store;
pub mod models;
pub mod repository;
pub mod schema;
pub mod service;
pub mod validator;

// Re-export commonly used types
pub use config::{ConfigError, FromEnv, UnknownFieldPolicy, ValidatorConfig};
pub use error::{ProductError, ProductResult, ValidationFailed, Violation, ViolationKind};
pub use image_store::ImageStore;
pub use models::{ImageRef, NewProduct, Product, ProductId, ProductPatch};
pub use repository::ProductRepository;
pub use schema::SCHEMA_VERSION;
pub use service::ProductService;
pub use validator::ProductValidator;
