//! Saved shipping and billing addresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stitch_core::{AccountId, AddressId, AddressType};

use super::{check_len, contains_ci, require_text};

/// A saved address owned by one profile.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Address {
    #[serde(rename = "address_id")]
    pub id: AddressId,
    #[serde(rename = "user")]
    pub owner: AccountId,
    pub user_username: String,
    pub street_name: String,
    pub building_house_no: Option<String>,
    pub barangay: String,
    pub city_municipality: String,
    pub province: String,
    pub postal_code: String,
    pub country: String,
    pub address_type: AddressType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Every editable address column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddressInput {
    pub street_name: String,
    pub building_house_no: Option<String>,
    pub barangay: String,
    pub city_municipality: String,
    pub province: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub address_type: AddressType,
}

impl AddressInput {
    /// Check required fields and column lengths.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message for the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        require_text("street_name", &self.street_name, 255)?;
        if let Some(building) = &self.building_house_no {
            check_len("building_house_no", building, 50)?;
        }
        require_text("barangay", &self.barangay, 100)?;
        require_text("city_municipality", &self.city_municipality, 100)?;
        require_text("province", &self.province, 100)?;
        require_text("postal_code", &self.postal_code, 10)?;
        require_text("country", &self.country, 100)?;
        Ok(())
    }
}

/// PATCH body for an address.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressUpdate {
    pub street_name: Option<String>,
    pub building_house_no: Option<String>,
    pub barangay: Option<String>,
    pub city_municipality: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub address_type: Option<AddressType>,
}

impl AddressUpdate {
    /// Overlay the supplied fields onto the current address.
    #[must_use]
    pub fn apply(&self, current: &Address) -> AddressInput {
        let pick = |new: &Option<String>, old: &String| new.clone().unwrap_or_else(|| old.clone());
        AddressInput {
            street_name: pick(&self.street_name, &current.street_name),
            building_house_no: self
                .building_house_no
                .clone()
                .or_else(|| current.building_house_no.clone()),
            barangay: pick(&self.barangay, &current.barangay),
            city_municipality: pick(&self.city_municipality, &current.city_municipality),
            province: pick(&self.province, &current.province),
            postal_code: pick(&self.postal_code, &current.postal_code),
            country: pick(&self.country, &current.country),
            address_type: self.address_type.unwrap_or(current.address_type),
        }
    }
}

/// Address list filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressFilter {
    /// Free text over street, barangay, city, province and postal code.
    pub search: Option<String>,
    pub city_municipality: Option<String>,
    pub province: Option<String>,
    pub address_type: Option<AddressType>,
}

impl AddressFilter {
    /// Whether an address passes every supplied predicate.
    #[must_use]
    pub fn matches(&self, a: &Address) -> bool {
        self.search.as_deref().is_none_or(|q| {
            contains_ci(&a.street_name, q)
                || contains_ci(&a.barangay, q)
                || contains_ci(&a.city_municipality, q)
                || contains_ci(&a.province, q)
                || contains_ci(&a.postal_code, q)
        }) && self
            .city_municipality
            .as_deref()
            .is_none_or(|q| contains_ci(&a.city_municipality, q))
            && self
                .province
                .as_deref()
                .is_none_or(|q| contains_ci(&a.province, q))
            && self.address_type.is_none_or(|t| a.address_type == t)
    }
}
