//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Password hashing and bearer tokens
//! - [`AccountService`] - Registration, login, profiles and addresses
//! - [`CatalogService`] - Categories and products
//! - [`CartService`] - Carts and cart lines
//! - [`CheckoutService`] - Orders, order items and payments
//!
//! Services borrow the store and enforce ownership through [`access`]. They
//! return [`ServiceError`], which the HTTP layer maps to status codes.

pub mod access;
pub mod accounts;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
mod error;

#[cfg(test)]
pub(crate) mod fixtures;

pub use accounts::{AccountService, LoginRequest, LoginResponse, RegisterRequest};
pub use cart::{AddCartItem, CartItemQuantity, CartService};
pub use catalog::CatalogService;
pub use checkout::CheckoutService;
pub use error::ServiceError;
