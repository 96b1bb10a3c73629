//! Shared setup for service tests.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use secrecy::SecretString;

use stitch_core::{AddressType, Email, Money, Principal, UserRole};

use super::auth::TokenService;
use super::{AccountService, CartService, CatalogService, CheckoutService};
use crate::config::AuthConfig;
use crate::db::{AccountStore, AddressStore, CatalogStore, MemoryStore};
use crate::models::{Address, AddressInput, NewAccount, Product, ProductInput, ProfileFields};

pub struct Fixture {
    pub store: MemoryStore,
    pub tokens: TokenService,
}

pub fn address_input() -> AddressInput {
    AddressInput {
        street_name: "Rizal Street".to_owned(),
        building_house_no: Some("12B".to_owned()),
        barangay: "San Antonio".to_owned(),
        city_municipality: "Quezon City".to_owned(),
        province: "Metro Manila".to_owned(),
        postal_code: "1105".to_owned(),
        country: "Philippines".to_owned(),
        address_type: AddressType::Shipping,
    }
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            tokens: TokenService::new(&AuthConfig {
                jwt_secret: SecretString::from("k7Gp2xQw9Lm4Zr8Tv1Hs6Bn3Yc5Df0Ja"),
                access_token_ttl: Duration::from_secs(15 * 60),
                refresh_token_ttl: Duration::from_secs(7 * 24 * 3600),
            }),
        }
    }

    pub fn accounts(&self) -> AccountService<'_> {
        AccountService::new(&self.store, &self.tokens)
    }

    pub fn catalog(&self) -> CatalogService<'_> {
        CatalogService::new(&self.store)
    }

    pub fn carts(&self) -> CartService<'_> {
        CartService::new(&self.store)
    }

    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(&self.store)
    }

    async fn account(&self, username: &str, is_staff: bool) -> Principal {
        let registration = self
            .store
            .create_account(&NewAccount {
                username: username.to_owned(),
                email: Email::parse(&format!("{username}@example.com")).unwrap(),
                // Never verified in these tests
                password_hash: "unused".to_owned(),
                is_staff,
                role: if is_staff {
                    UserRole::Admin
                } else {
                    UserRole::User
                },
                profile: ProfileFields::default(),
            })
            .await
            .unwrap();
        Principal {
            account_id: registration.account.id,
            is_staff,
        }
    }

    pub async fn customer(&self, username: &str) -> Principal {
        self.account(username, false).await
    }

    pub async fn staff(&self, username: &str) -> Principal {
        self.account(username, true).await
    }

    pub async fn address(&self, owner: Principal) -> Address {
        self.store
            .create_address(owner.account_id, &address_input())
            .await
            .unwrap()
    }

    pub async fn product(&self, name: &str, cents: i64) -> Product {
        self.store
            .create_product(&ProductInput {
                name: name.to_owned(),
                description: None,
                price: Money::from_cents(cents).unwrap(),
                sku: None,
                stock_quantity: 10,
                category: None,
                image_url: None,
                sizes: None,
                is_available: true,
            })
            .await
            .unwrap()
    }
}
