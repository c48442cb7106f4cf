use axum::extract::Multipart;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

const REQUIRED_FIELDS: &str = "name, brand, description, price, category, quantity";

/// Raw multipart body of product create/update requests. Every field is
/// optional at this layer; [`ProductForm::into_new_product`] and
/// [`ProductForm::into_update`] decide what is required.
#[derive(Debug, Default, ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct ProductForm {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    /// Category name; created on first use.
    pub category: Option<String>,
    pub quantity: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<Vec<u8>>,
    #[schema(value_type = Vec<String>, format = Binary)]
    pub additional_images: Vec<Vec<u8>>,
}

/// Validated text fields shared by create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductFields {
    pub name: String,
    pub brand: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub quantity: i32,
}

#[derive(Debug)]
pub struct NewProduct {
    pub fields: ProductFields,
    pub image: Vec<u8>,
    pub additional_images: Vec<Vec<u8>>,
}

#[derive(Debug)]
pub struct ProductUpdate {
    pub fields: ProductFields,
    pub image: Option<Vec<u8>>,
}

impl ProductForm {
    pub async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = ProductForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "image" => {
                    let bytes = field.bytes().await?;
                    if !bytes.is_empty() {
                        form.image = Some(bytes.to_vec());
                    }
                }
                "additionalImages" | "additional_images" => {
                    let bytes = field.bytes().await?;
                    if !bytes.is_empty() {
                        form.additional_images.push(bytes.to_vec());
                    }
                }
                "name" => form.name = Some(field.text().await?),
                "brand" => form.brand = Some(field.text().await?),
                "description" => form.description = Some(field.text().await?),
                "price" => form.price = Some(field.text().await?),
                "category" => form.category = Some(field.text().await?),
                "quantity" => form.quantity = Some(field.text().await?),
                other => tracing::debug!(field = other, "ignoring unknown multipart field"),
            }
        }
        Ok(form)
    }

    pub fn into_new_product(self) -> AppResult<NewProduct> {
        let fields = self.fields(true)?;
        let image = self.image.ok_or_else(|| missing_fields(true))?;
        Ok(NewProduct {
            fields,
            image,
            additional_images: self.additional_images,
        })
    }

    pub fn into_update(self) -> AppResult<ProductUpdate> {
        let fields = self.fields(false)?;
        Ok(ProductUpdate {
            fields,
            image: self.image,
        })
    }

    fn fields(&self, with_image: bool) -> AppResult<ProductFields> {
        let (
            Some(name),
            Some(brand),
            Some(description),
            Some(price),
            Some(category),
            Some(quantity),
        ) = (
            non_blank(&self.name),
            non_blank(&self.brand),
            non_blank(&self.description),
            non_blank(&self.price),
            non_blank(&self.category),
            non_blank(&self.quantity),
        )
        else {
            return Err(missing_fields(with_image));
        };

        let price = price
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite() && *p >= 0.0)
            .ok_or_else(|| AppError::validation("price must be a non-negative number"))?;
        let quantity = quantity
            .parse::<i32>()
            .ok()
            .filter(|q| *q >= 0)
            .ok_or_else(|| AppError::validation("quantity must be a non-negative integer"))?;

        Ok(ProductFields {
            name: name.to_string(),
            brand: brand.to_string(),
            description: description.to_string(),
            price,
            category: category.to_string(),
            quantity,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn missing_fields(with_image: bool) -> AppError {
    if with_image {
        AppError::Validation(format!(
            "All fields ({REQUIRED_FIELDS}, and main image) are required."
        ))
    } else {
        AppError::Validation(format!("All fields ({REQUIRED_FIELDS}) are required."))
    }
}

/// Body of `POST /api/products/filter`. Accepts the storefront's legacy
/// `checked`/`radio` keys as aliases.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilterRequest {
    /// Category ids or names; empty means any category.
    #[serde(default, alias = "checked")]
    pub categories: Vec<String>,
    /// `[min, max]` inclusive; empty means any price.
    #[serde(default, alias = "radio")]
    pub price_range: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryKeys {
    pub ids: Vec<Uuid>,
    pub names: Vec<String>,
}

impl FilterRequest {
    pub fn price_bounds(&self) -> AppResult<Option<(f64, f64)>> {
        match self.price_range.as_slice() {
            [] => Ok(None),
            [min, max] if min <= max => Ok(Some((*min, *max))),
            [_, _] => Err(AppError::validation(
                "priceRange minimum must not exceed maximum",
            )),
            _ => Err(AppError::validation("priceRange must be [min, max]")),
        }
    }

    pub fn category_keys(&self) -> CategoryKeys {
        let mut keys = CategoryKeys::default();
        for entry in self.categories.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
            match Uuid::parse_str(entry) {
                Ok(id) => keys.ids.push(id),
                Err(_) => keys.names.push(entry.to_string()),
            }
        }
        keys
    }
}
