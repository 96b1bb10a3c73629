//! Accounts, profiles and addresses.

use async_trait::async_trait;

use stitch_core::{AccountId, AddressId, CartId, UserRole};

use super::{PgStore, delete_error, expect_rows, fetch_page, write_error};
use crate::db::{AccountStore, AddressStore, Registration, RepositoryError};
use crate::models::{
    Account, Address, AddressFilter, AddressInput, Cart, NewAccount, Page, PageRequest, Profile,
    ProfileFields, ProfileFilter, StoredCredentials,
};

macro_rules! profile_columns {
    () => {
        "p.account_id AS id, a.username, a.email, p.first_name, p.middle_name,
         p.last_name, p.phone, p.role, p.created_at, p.updated_at"
    };
}

macro_rules! profile_from {
    () => {
        " FROM stitch.profile p JOIN stitch.account a ON a.id = p.account_id"
    };
}

macro_rules! address_columns {
    () => {
        "ad.id, ad.owner_id AS owner, a.username AS user_username, ad.street_name,
         ad.building_house_no, ad.barangay, ad.city_municipality, ad.province,
         ad.postal_code, ad.country, ad.address_type, ad.created_at, ad.updated_at"
    };
}

macro_rules! address_from {
    () => {
        " FROM stitch.address ad JOIN stitch.account a ON a.id = ad.owner_id"
    };
}

pub(super) const CART_BY_ID: &str = "
    SELECT c.id, c.owner_id AS owner, a.username AS user_username,
           c.created_at, c.updated_at, c.expires_at
    FROM stitch.cart c JOIN stitch.account a ON a.id = c.owner_id
    WHERE c.id = $1";

const PROFILE_BY_ID: &str = concat!(
    "SELECT ",
    profile_columns!(),
    profile_from!(),
    " WHERE p.account_id = $1"
);

const ADDRESS_BY_ID: &str = concat!(
    "SELECT ",
    address_columns!(),
    address_from!(),
    " WHERE ad.id = $1"
);

#[async_trait]
impl AccountStore for PgStore {
    async fn create_account(&self, new: &NewAccount) -> Result<Registration, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let account = sqlx::query_as::<_, Account>(
            r"
            INSERT INTO stitch.account (username, email, password_hash, is_staff)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, is_staff, date_joined
            ",
        )
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.is_staff)
        .fetch_one(&mut *tx)
        .await
        .map_err(write_error)?;

        sqlx::query(
            r"
            INSERT INTO stitch.profile (account_id, first_name, middle_name, last_name, phone, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(account.id)
        .bind(&new.profile.first_name)
        .bind(&new.profile.middle_name)
        .bind(&new.profile.last_name)
        .bind(&new.profile.phone)
        .bind(new.role)
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;

        let cart_id: CartId =
            sqlx::query_scalar("INSERT INTO stitch.cart (owner_id) VALUES ($1) RETURNING id")
                .bind(account.id)
                .fetch_one(&mut *tx)
                .await
                .map_err(write_error)?;

        let profile = sqlx::query_as::<_, Profile>(PROFILE_BY_ID)
            .bind(account.id)
            .fetch_one(&mut *tx)
            .await?;
        let cart = sqlx::query_as::<_, Cart>(CART_BY_ID)
            .bind(cart_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Registration {
            account,
            profile,
            cart,
        })
    }

    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<StoredCredentials>, RepositoryError> {
        let creds = sqlx::query_as::<_, StoredCredentials>(
            r"
            SELECT id, username, email, is_staff, date_joined, password_hash
            FROM stitch.account
            WHERE username = $1
            ",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(creds)
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, RepositoryError> {
        let account = sqlx::query_as::<_, Account>(
            r"
            SELECT id, username, email, is_staff, date_joined
            FROM stitch.account
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn get_profile(&self, id: AccountId) -> Result<Option<Profile>, RepositoryError> {
        let profile = sqlx::query_as::<_, Profile>(PROFILE_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    async fn list_profiles(
        &self,
        filter: &ProfileFilter,
        page: PageRequest,
    ) -> Result<Page<Profile>, RepositoryError> {
        const SQL: &str = concat!(
            "SELECT ",
            profile_columns!(),
            ", COUNT(*) OVER () AS total",
            profile_from!(),
            r"
            WHERE ($1::text IS NULL
                   OR strpos(lower(a.username), lower($1)) > 0
                   OR strpos(lower(a.email), lower($1)) > 0
                   OR strpos(lower(p.first_name), lower($1)) > 0
                   OR strpos(lower(coalesce(p.last_name, '')), lower($1)) > 0
                   OR strpos(lower(coalesce(p.phone, '')), lower($1)) > 0)
              AND ($2::text IS NULL OR strpos(lower(a.username), lower($2)) > 0)
              AND ($3::text IS NULL OR strpos(lower(a.email), lower($3)) > 0)
              AND ($4::text IS NULL OR strpos(lower(p.first_name), lower($4)) > 0)
              AND ($5::text IS NULL OR strpos(lower(p.last_name), lower($5)) > 0)
              AND ($6::text IS NULL OR strpos(lower(p.phone), lower($6)) > 0)
              AND ($7::text IS NULL OR p.role = $7)
              AND ($8::timestamptz IS NULL OR p.created_at >= $8)
              AND ($9::timestamptz IS NULL OR p.created_at <= $9)
            ORDER BY p.account_id
            LIMIT $10 OFFSET $11
            "
        );

        fetch_page(&self.pool, page, |window| {
            sqlx::query(SQL)
                .bind(filter.search.as_deref())
                .bind(filter.username.as_deref())
                .bind(filter.email.as_deref())
                .bind(filter.first_name.as_deref())
                .bind(filter.last_name.as_deref())
                .bind(filter.phone.as_deref())
                .bind(filter.role)
                .bind(filter.created_at_gte)
                .bind(filter.created_at_lte)
                .bind(window.limit)
                .bind(window.offset)
        })
        .await
    }

    async fn update_profile(
        &self,
        id: AccountId,
        fields: &ProfileFields,
        role: UserRole,
    ) -> Result<Profile, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE stitch.profile
            SET first_name = $2, middle_name = $3, last_name = $4, phone = $5,
                role = $6, updated_at = NOW()
            WHERE account_id = $1
            ",
        )
        .bind(id)
        .bind(&fields.first_name)
        .bind(&fields.middle_name)
        .bind(&fields.last_name)
        .bind(&fields.phone)
        .bind(role)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;
        expect_rows(result.rows_affected())?;

        self.get_profile(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn delete_account(&self, id: AccountId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM stitch.account WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                delete_error(e, "an address of this user is used by another user's order")
            })?;
        expect_rows(result.rows_affected())
    }
}

#[async_trait]
impl AddressStore for PgStore {
    async fn create_address(
        &self,
        owner: AccountId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let id: AddressId = sqlx::query_scalar(
            r"
            INSERT INTO stitch.address (
                owner_id, street_name, building_house_no, barangay,
                city_municipality, province, postal_code, country, address_type
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            ",
        )
        .bind(owner)
        .bind(&input.street_name)
        .bind(&input.building_house_no)
        .bind(&input.barangay)
        .bind(&input.city_municipality)
        .bind(&input.province)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(input.address_type)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error)?;

        self.get_address(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn get_address(&self, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        let address = sqlx::query_as::<_, Address>(ADDRESS_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(address)
    }

    async fn list_addresses(
        &self,
        owner: AccountId,
        filter: &AddressFilter,
        page: PageRequest,
    ) -> Result<Page<Address>, RepositoryError> {
        const SQL: &str = concat!(
            "SELECT ",
            address_columns!(),
            ", COUNT(*) OVER () AS total",
            address_from!(),
            r"
            WHERE ad.owner_id = $1
              AND ($2::text IS NULL
                   OR strpos(lower(ad.street_name), lower($2)) > 0
                   OR strpos(lower(ad.barangay), lower($2)) > 0
                   OR strpos(lower(ad.city_municipality), lower($2)) > 0
                   OR strpos(lower(ad.province), lower($2)) > 0
                   OR strpos(lower(ad.postal_code), lower($2)) > 0)
              AND ($3::text IS NULL OR strpos(lower(ad.city_municipality), lower($3)) > 0)
              AND ($4::text IS NULL OR strpos(lower(ad.province), lower($4)) > 0)
              AND ($5::text IS NULL OR ad.address_type = $5)
            ORDER BY ad.id
            LIMIT $6 OFFSET $7
            "
        );

        fetch_page(&self.pool, page, |window| {
            sqlx::query(SQL)
                .bind(owner)
                .bind(filter.search.as_deref())
                .bind(filter.city_municipality.as_deref())
                .bind(filter.province.as_deref())
                .bind(filter.address_type)
                .bind(window.limit)
                .bind(window.offset)
        })
        .await
    }

    async fn update_address(
        &self,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE stitch.address
            SET street_name = $2, building_house_no = $3, barangay = $4,
                city_municipality = $5, province = $6, postal_code = $7,
                country = $8, address_type = $9, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&input.street_name)
        .bind(&input.building_house_no)
        .bind(&input.barangay)
        .bind(&input.city_municipality)
        .bind(&input.province)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(input.address_type)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;
        expect_rows(result.rows_affected())?;

        self.get_address(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn delete_address(&self, id: AddressId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM stitch.address WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| delete_error(e, "address is used by an order"))?;
        expect_rows(result.rows_affected())
    }
}
