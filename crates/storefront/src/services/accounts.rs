//! Accounts, profiles and addresses.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use stitch_core::{AccountId, AddressId, Email, Principal, UserRole};

use super::access::{Action, Target, ensure};
use super::auth::{AuthError, TokenService, hash_password, validate_password, verify_password};
use super::ServiceError;
use crate::db::{Registration, Store};
use crate::models::{
    Address, AddressFilter, AddressInput, AddressUpdate, Me, NewAccount, Page, PageRequest,
    Profile, ProfileFields, ProfileFilter, ProfileUpdate,
};

/// Sign-up body.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

/// Username/password login body.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Tokens plus the caller's account summary.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: Me,
}

/// Account lifecycle, profiles and saved addresses.
pub struct AccountService<'a> {
    store: &'a dyn Store,
    tokens: &'a TokenService,
}

impl<'a> AccountService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store, tokens: &'a TokenService) -> Self {
        Self { store, tokens }
    }

    fn new_account(
        username: &str,
        email: &str,
        password: &str,
        profile: ProfileFields,
    ) -> Result<NewAccount, ServiceError> {
        NewAccount::validate_username(username).map_err(ServiceError::Validation)?;
        let email = Email::parse(email).map_err(|e| ServiceError::validation(e.to_string()))?;
        validate_password(password)?;
        profile.validate().map_err(ServiceError::Validation)?;

        Ok(NewAccount {
            username: username.to_owned(),
            email,
            password_hash: hash_password(password)?,
            is_staff: false,
            role: UserRole::User,
            profile,
        })
    }

    /// Create an account with its profile and cart.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for bad input or a taken
    /// username/email.
    #[instrument(skip_all, fields(username = %req.username))]
    pub async fn register(&self, req: RegisterRequest) -> Result<Me, ServiceError> {
        let profile = ProfileFields {
            first_name: req.first_name,
            middle_name: req.middle_name,
            last_name: req.last_name,
            phone: req.phone,
        };
        let new = Self::new_account(&req.username, &req.email, &req.password, profile)?;
        let registration = self.store.create_account(&new).await?;

        tracing::info!(account_id = %registration.account.id, "account registered");
        Ok(Me {
            id: registration.account.id,
            username: registration.account.username,
            email: registration.account.email,
            is_staff: registration.account.is_staff,
            profile: Some(registration.profile),
            address: Vec::new(),
            cart: Some(registration.cart),
        })
    }

    /// Create a staff account (profile role `admin`).
    ///
    /// # Errors
    ///
    /// As for [`Self::register`].
    #[instrument(skip(self, email, password))]
    pub async fn create_staff(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Registration, ServiceError> {
        let mut new = Self::new_account(username, email, password, ProfileFields::default())?;
        new.is_staff = true;
        new.role = UserRole::Admin;

        let registration = self.store.create_account(&new).await?;
        tracing::info!(account_id = %registration.account.id, "staff account created");
        Ok(registration)
    }

    /// Exchange a username and password for a token pair.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown username or a
    /// wrong password.
    #[instrument(skip_all, fields(username = %req.username))]
    pub async fn login(&self, req: &LoginRequest) -> Result<LoginResponse, ServiceError> {
        let credentials = self
            .store
            .find_credentials(&req.username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(&req.password, &credentials.password_hash)?;

        let account = credentials.account;
        let principal = Principal {
            account_id: account.id,
            is_staff: account.is_staff,
        };
        let pair = self.tokens.issue_pair(principal)?;
        let user = self.me(principal).await?;

        tracing::info!(account_id = %account.id, "login");
        Ok(LoginResponse {
            access: pair.access,
            refresh: pair.refresh,
            user,
        })
    }

    /// Issue a new access token from a refresh token.
    ///
    /// The staff flag is re-read so a demoted account stops getting staff
    /// tokens at the next refresh.
    ///
    /// # Errors
    ///
    /// Returns an `AuthError` for expired, revoked or invalid tokens, or when
    /// the account no longer exists.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, ServiceError> {
        let claims = self.tokens.verify_refresh(refresh_token).await?;
        let account = self
            .store
            .get_account(claims.principal()?.account_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        Ok(self.tokens.issue_access(Principal {
            account_id: account.id,
            is_staff: account.is_staff,
        })?)
    }

    /// Revoke a refresh token.
    ///
    /// # Errors
    ///
    /// Returns an `AuthError` if the token is invalid or already revoked.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), ServiceError> {
        self.tokens.revoke(refresh_token).await?;
        Ok(())
    }

    /// The caller's account, profile, addresses and cart.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the account was deleted.
    pub async fn me(&self, principal: Principal) -> Result<Me, ServiceError> {
        let id = principal.account_id;
        let account = self
            .store
            .get_account(id)
            .await?
            .ok_or(ServiceError::NotFound("user"))?;
        let profile = self.store.get_profile(id).await?;
        let address = self
            .store
            .list_addresses(id, &AddressFilter::default(), PageRequest::ALL)
            .await?
            .items;
        let cart = self.store.cart_for_owner(id).await?;

        Ok(Me {
            id: account.id,
            username: account.username,
            email: account.email,
            is_staff: account.is_staff,
            profile,
            address,
            cart,
        })
    }

    // -------------------------------------------------------------------------
    // Profiles
    // -------------------------------------------------------------------------

    /// List profiles (staff only).
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Forbidden` for non-staff callers.
    pub async fn list_profiles(
        &self,
        principal: Principal,
        filter: &ProfileFilter,
        page: PageRequest,
    ) -> Result<Page<Profile>, ServiceError> {
        if !principal.is_staff {
            return Err(ServiceError::Forbidden);
        }
        Ok(self.store.list_profiles(filter, page).await?)
    }

    async fn load_profile(&self, id: AccountId) -> Result<Profile, ServiceError> {
        self.store
            .get_profile(id)
            .await?
            .ok_or(ServiceError::NotFound("AppUser"))
    }

    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden`.
    pub async fn get_profile(
        &self,
        principal: Principal,
        id: AccountId,
    ) -> Result<Profile, ServiceError> {
        let profile = self.load_profile(id).await?;
        ensure(principal, Target::Profile(&profile), Action::Read)?;
        Ok(profile)
    }

    /// Apply a partial profile update. Only staff may change the role.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Forbidden` or `Validation`.
    #[instrument(skip(self, update))]
    pub async fn update_profile(
        &self,
        principal: Principal,
        id: AccountId,
        update: &ProfileUpdate,
    ) -> Result<Profile, ServiceError> {
        let current = self.load_profile(id).await?;
        ensure(principal, Target::Profile(&current), Action::Update)?;
        if !principal.is_staff && update.role.is_some_and(|r| r != current.role) {
            return Err(ServiceError::Forbidden);
        }

        let (fields, role) = update.apply(&current);
        fields.validate().map_err(ServiceError::Validation)?;
        Ok(self.store.update_profile(id, &fields, role).await?)
    }

    /// Delete a profile and close its account.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Forbidden`, or `Validation` when one of its
    /// addresses is used by another user's order.
    #[instrument(skip(self))]
    pub async fn delete_profile(
        &self,
        principal: Principal,
        id: AccountId,
    ) -> Result<(), ServiceError> {
        let profile = self.load_profile(id).await?;
        ensure(principal, Target::Profile(&profile), Action::Delete)?;
        self.store.delete_account(id).await?;
        tracing::info!(account_id = %id, "account deleted");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Addresses
    // -------------------------------------------------------------------------

    /// The caller's own addresses.
    ///
    /// # Errors
    ///
    /// Returns `DependencyUnavailable` if the store fails.
    pub async fn list_addresses(
        &self,
        principal: Principal,
        filter: &AddressFilter,
        page: PageRequest,
    ) -> Result<Page<Address>, ServiceError> {
        Ok(self
            .store
            .list_addresses(principal.account_id, filter, page)
            .await?)
    }

    /// Save an address on the caller's profile.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for bad input or when the caller has no profile.
    pub async fn create_address(
        &self,
        principal: Principal,
        input: &AddressInput,
    ) -> Result<Address, ServiceError> {
        input.validate().map_err(ServiceError::Validation)?;
        Ok(self
            .store
            .create_address(principal.account_id, input)
            .await?)
    }

    async fn load_address(&self, id: AddressId) -> Result<Address, ServiceError> {
        self.store
            .get_address(id)
            .await?
            .ok_or(ServiceError::NotFound("Address"))
    }

    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden`.
    pub async fn get_address(
        &self,
        principal: Principal,
        id: AddressId,
    ) -> Result<Address, ServiceError> {
        let address = self.load_address(id).await?;
        ensure(principal, Target::Address(&address), Action::Read)?;
        Ok(address)
    }

    /// # Errors
    ///
    /// Returns `NotFound`, `Forbidden` or `Validation`.
    pub async fn update_address(
        &self,
        principal: Principal,
        id: AddressId,
        update: &AddressUpdate,
    ) -> Result<Address, ServiceError> {
        let current = self.load_address(id).await?;
        ensure(principal, Target::Address(&current), Action::Update)?;

        let input = update.apply(&current);
        input.validate().map_err(ServiceError::Validation)?;
        Ok(self.store.update_address(id, &input).await?)
    }

    /// # Errors
    ///
    /// Returns `NotFound`, `Forbidden`, or `Validation` when an order uses
    /// the address.
    pub async fn delete_address(
        &self,
        principal: Principal,
        id: AddressId,
    ) -> Result<(), ServiceError> {
        let address = self.load_address(id).await?;
        ensure(principal, Target::Address(&address), Action::Delete)?;
        Ok(self.store.delete_address(id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::fixtures::{Fixture, address_input};

    fn register_request(username: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_owned(),
            email: format!("{username}@example.com"),
            password: "correct horse battery".to_owned(),
            first_name: "Alice".to_owned(),
            middle_name: None,
            last_name: Some("Reyes".to_owned()),
            phone: None,
        }
    }

    #[tokio::test]
    async fn test_register_creates_profile_and_cart() {
        let fx = Fixture::new();
        let me = fx.accounts().register(register_request("alice")).await.unwrap();

        let profile = me.profile.unwrap();
        assert_eq!(profile.role, UserRole::User);
        assert_eq!(profile.first_name, "Alice");
        assert_eq!(me.cart.unwrap().owner, me.id);
        assert!(!me.is_staff);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input_and_duplicates() {
        let fx = Fixture::new();
        let accounts = fx.accounts();

        let mut weak = register_request("bob");
        weak.password = "short".to_owned();
        assert!(matches!(
            accounts.register(weak).await,
            Err(ServiceError::Auth(AuthError::WeakPassword(_)))
        ));

        let mut bad_email = register_request("bob");
        bad_email.email = "not-an-email".to_owned();
        assert!(matches!(
            accounts.register(bad_email).await,
            Err(ServiceError::Validation(_))
        ));

        accounts.register(register_request("bob")).await.unwrap();
        let err = accounts.register(register_request("bob")).await.unwrap_err();
        assert!(
            matches!(err, ServiceError::Validation(ref m) if m.contains("username")),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn test_login_refresh_logout() {
        let fx = Fixture::new();
        let accounts = fx.accounts();
        accounts.register(register_request("alice")).await.unwrap();

        let wrong = LoginRequest {
            username: "alice".to_owned(),
            password: "not the password".to_owned(),
        };
        assert!(matches!(
            accounts.login(&wrong).await,
            Err(ServiceError::Auth(AuthError::InvalidCredentials))
        ));

        let login = accounts
            .login(&LoginRequest {
                username: "alice".to_owned(),
                password: "correct horse battery".to_owned(),
            })
            .await
            .unwrap();
        assert_eq!(login.user.username, "alice");
        assert!(login.user.cart.is_some());

        let access = accounts.refresh(&login.refresh).await.unwrap();
        assert_eq!(
            fx.tokens.verify_access(&access).unwrap().account_id,
            login.user.id
        );

        accounts.logout(&login.refresh).await.unwrap();
        assert!(matches!(
            accounts.refresh(&login.refresh).await,
            Err(ServiceError::Auth(AuthError::RevokedToken))
        ));
    }

    #[tokio::test]
    async fn test_create_staff() {
        let fx = Fixture::new();
        let registration = fx
            .accounts()
            .create_staff("admin", "admin@example.com", "s3cure-passphrase")
            .await
            .unwrap();
        assert!(registration.account.is_staff);
        assert_eq!(registration.profile.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn test_profile_access_and_role_change() {
        let fx = Fixture::new();
        let alice = fx.customer("alice").await;
        let bob = fx.customer("bob").await;
        let staff = fx.staff("admin").await;
        let accounts = fx.accounts();

        assert!(matches!(
            accounts.get_profile(alice, bob.account_id).await,
            Err(ServiceError::Forbidden)
        ));
        assert!(accounts.get_profile(staff, bob.account_id).await.is_ok());
        assert!(matches!(
            accounts
                .list_profiles(alice, &ProfileFilter::default(), PageRequest::ALL)
                .await,
            Err(ServiceError::Forbidden)
        ));

        let promote = ProfileUpdate {
            role: Some(UserRole::Admin),
            ..ProfileUpdate::default()
        };
        assert!(matches!(
            accounts.update_profile(alice, alice.account_id, &promote).await,
            Err(ServiceError::Forbidden)
        ));
        let promoted = accounts
            .update_profile(staff, alice.account_id, &promote)
            .await
            .unwrap();
        assert_eq!(promoted.role, UserRole::Admin);

        let rename = ProfileUpdate {
            first_name: Some("Ally".to_owned()),
            ..ProfileUpdate::default()
        };
        let renamed = accounts
            .update_profile(alice, alice.account_id, &rename)
            .await
            .unwrap();
        assert_eq!(renamed.first_name, "Ally");
    }

    #[tokio::test]
    async fn test_addresses_are_owner_scoped() {
        let fx = Fixture::new();
        let alice = fx.customer("alice").await;
        let bob = fx.customer("bob").await;
        let accounts = fx.accounts();

        let home = accounts
            .create_address(alice, &address_input())
            .await
            .unwrap();
        assert_eq!(home.owner, alice.account_id);

        assert!(matches!(
            accounts.get_address(bob, home.id).await,
            Err(ServiceError::Forbidden)
        ));
        let bobs = accounts
            .list_addresses(bob, &AddressFilter::default(), PageRequest::ALL)
            .await
            .unwrap();
        assert_eq!(bobs.total, 0);

        let update = AddressUpdate {
            city_municipality: Some("Makati".to_owned()),
            ..AddressUpdate::default()
        };
        let moved = accounts.update_address(alice, home.id, &update).await.unwrap();
        assert_eq!(moved.city_municipality, "Makati");
        assert_eq!(moved.street_name, home.street_name);

        accounts.delete_address(alice, home.id).await.unwrap();
        assert!(matches!(
            accounts.get_address(alice, home.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_me_includes_addresses() {
        let fx = Fixture::new();
        let alice = fx.customer("alice").await;
        let accounts = fx.accounts();
        accounts
            .create_address(alice, &address_input())
            .await
            .unwrap();

        let me = accounts.me(alice).await.unwrap();
        assert_eq!(me.address.len(), 1);
        assert!(me.profile.is_some());
    }
}
