//! Postgres-backed store.
//!
//! ## Error Mapping
//!
//! | SQLx error | PostgreSQL code | `StoreError` |
//! |------------|-----------------|--------------|
//! | unique violation | `23505` | `Conflict` (message derived from the constraint) |
//! | foreign key violation | `23503` | `NotFound` |
//! | `RowNotFound` | n/a | `NotFound` |
//! | anything else | any | `Database` |
//!
//! Registration and membership version checks run inside transactions.

mod rows;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use bizdesk_auth::{Session, SessionToken, UserAccount, UserProfile};
use bizdesk_companies::{Company, CompanySettings, MenuSection, Membership, Registration, TenantDirectory};
use bizdesk_core::{CompanyId, ExpectedVersion, MenuSectionId, UserId, Versioned};

use crate::error::{StoreError, StoreResult};
use crate::store::{CompanyStore, MemberRecord, MembershipStore, MenuStore, SessionStore, UserStore};

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect with a bounded pool.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        tracing::info!("connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("migrations failed: {e}")))?;
        tracing::info!("database migrations completed");
        Ok(())
    }

    async fn begin(&self) -> StoreResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("23505") => StoreError::Conflict(conflict_message(db_err.constraint())),
            Some("23503") => StoreError::NotFound,
            _ => StoreError::Database(format!("database error in {operation}: {}", db_err.message())),
        },
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool unavailable in {operation}"))
        }
        other => StoreError::Database(format!("sqlx error in {operation}: {other}")),
    }
}

fn conflict_message(constraint: Option<&str>) -> String {
    match constraint {
        Some("companies_name_key") => "company name already exists",
        Some("companies_slug_key") => "company slug already exists",
        Some("users_username_key") => "username already exists",
        Some("users_email_lower_key") => "email already exists",
        Some("company_memberships_pkey") => "user is already a member of this company",
        Some("menu_sections_company_id_title_key") => "menu section title already exists",
        _ => "duplicate record",
    }
    .to_string()
}

fn expected_version(expected: ExpectedVersion) -> Option<i64> {
    match expected {
        ExpectedVersion::Any => None,
        ExpectedVersion::Exact(v) => Some(v as i64),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared statements (used both standalone and inside transactions)
// ─────────────────────────────────────────────────────────────────────────────

async fn insert_user_rows<'e, E>(
    exec: E,
    account: &UserAccount,
) -> StoreResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO users (
            id, username, email, password_hash, first_name, last_name,
            is_active, is_staff, date_joined, last_login
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(account.id.as_uuid())
    .bind(&account.username)
    .bind(&account.email)
    .bind(&account.password_hash)
    .bind(&account.first_name)
    .bind(&account.last_name)
    .bind(account.is_active)
    .bind(account.is_staff)
    .bind(account.date_joined)
    .bind(account.last_login)
    .execute(exec)
    .await
    .map_err(|e| map_sqlx_error("insert_user", e))?;
    Ok(())
}

async fn upsert_profile_row<'e, E>(exec: E, profile: &UserProfile) -> StoreResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO user_profiles (user_id, phone, position, department, email)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id) DO UPDATE SET
            phone = EXCLUDED.phone,
            position = EXCLUDED.position,
            department = EXCLUDED.department,
            email = EXCLUDED.email
        "#,
    )
    .bind(profile.user_id.as_uuid())
    .bind(&profile.phone)
    .bind(&profile.position)
    .bind(&profile.department)
    .bind(&profile.email)
    .execute(exec)
    .await
    .map_err(|e| map_sqlx_error("save_profile", e))?;
    Ok(())
}

async fn insert_membership_row<'e, E>(exec: E, m: &Membership) -> StoreResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let caps = m.capabilities();
    sqlx::query(
        r#"
        INSERT INTO company_memberships (
            company_id, user_id, role,
            can_manage_users, can_manage_orders, can_manage_products,
            can_manage_suppliers, can_view_reports,
            is_active, joined_at, version
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(m.company_id().as_uuid())
    .bind(m.user_id().as_uuid())
    .bind(m.role().as_str())
    .bind(caps.can_manage_users)
    .bind(caps.can_manage_orders)
    .bind(caps.can_manage_products)
    .bind(caps.can_manage_suppliers)
    .bind(caps.can_view_reports)
    .bind(m.is_active())
    .bind(m.joined_at())
    .bind(m.version() as i64)
    .execute(exec)
    .await
    .map_err(|e| map_sqlx_error("insert_membership", e))?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Companies
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl CompanyStore for PostgresStore {
    async fn company_by_id(&self, id: CompanyId) -> StoreResult<Option<Company>> {
        let row = sqlx::query("SELECT * FROM companies WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("company_by_id", e))?;
        row.as_ref().map(rows::company).transpose()
    }

    async fn company_by_slug(&self, slug: &str) -> StoreResult<Option<Company>> {
        let row = sqlx::query("SELECT * FROM companies WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("company_by_slug", e))?;
        row.as_ref().map(rows::company).transpose()
    }

    async fn list_active_companies(&self, limit: usize) -> StoreResult<Vec<Company>> {
        let records = sqlx::query("SELECT * FROM companies WHERE is_active ORDER BY name LIMIT $1")
            .bind(limit as i64)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_active_companies", e))?;
        records.iter().map(rows::company).collect()
    }

    async fn company_name_exists(&self, name: &str, exclude: Option<CompanyId>) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM companies WHERE name = $1 AND ($2::UUID IS NULL OR id <> $2))",
        )
        .bind(name)
        .bind(exclude.map(|id| *id.as_uuid()))
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("company_name_exists", e))
    }

    async fn slugs_like(&self, base: &str) -> StoreResult<Vec<String>> {
        let escaped = base.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        sqlx::query_scalar::<_, String>("SELECT slug FROM companies WHERE slug = $1 OR slug LIKE $2")
            .bind(base)
            .bind(format!("{escaped}-%"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("slugs_like", e))
    }

    #[instrument(skip(self, registration), fields(company = %registration.company.slug), err)]
    async fn insert_registration(&self, registration: &Registration) -> StoreResult<()> {
        let mut tx = self.begin().await?;

        if let Some((account, profile)) = &registration.account {
            insert_user_rows(&mut *tx, account).await?;
            upsert_profile_row(&mut *tx, profile).await?;
        }

        let c = &registration.company;
        sqlx::query(
            r#"
            INSERT INTO companies (
                id, name, slug, company_type, description, phone, email, website,
                address, city, country, tax_number, registration_number,
                is_active, owner_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(c.id.as_uuid())
        .bind(&c.name)
        .bind(&c.slug)
        .bind(c.company_type.as_str())
        .bind(&c.description)
        .bind(&c.phone)
        .bind(&c.email)
        .bind(&c.website)
        .bind(&c.address)
        .bind(&c.city)
        .bind(&c.country)
        .bind(&c.tax_number)
        .bind(&c.registration_number)
        .bind(c.is_active)
        .bind(c.owner_id.as_uuid())
        .bind(c.created_at)
        .bind(c.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_company", e))?;

        let s = &registration.settings;
        sqlx::query(
            r#"
            INSERT INTO company_settings (
                company_id, theme_color, allow_user_registration, require_email_verification,
                default_currency, order_approval_required, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(s.company_id.as_uuid())
        .bind(&s.theme_color)
        .bind(s.allow_user_registration)
        .bind(s.require_email_verification)
        .bind(&s.default_currency)
        .bind(s.order_approval_required)
        .bind(s.created_at)
        .bind(s.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_settings", e))?;

        insert_membership_row(&mut *tx, &registration.owner).await?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(())
    }

    async fn update_company(&self, c: &Company) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE companies SET
                name = $2, company_type = $3, description = $4, phone = $5, email = $6,
                website = $7, address = $8, city = $9, country = $10, tax_number = $11,
                registration_number = $12, is_active = $13, updated_at = $14
            WHERE id = $1
            "#,
        )
        .bind(c.id.as_uuid())
        .bind(&c.name)
        .bind(c.company_type.as_str())
        .bind(&c.description)
        .bind(&c.phone)
        .bind(&c.email)
        .bind(&c.website)
        .bind(&c.address)
        .bind(&c.city)
        .bind(&c.country)
        .bind(&c.tax_number)
        .bind(&c.registration_number)
        .bind(c.is_active)
        .bind(c.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_company", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn settings(&self, company_id: CompanyId) -> StoreResult<Option<CompanySettings>> {
        let row = sqlx::query("SELECT * FROM company_settings WHERE company_id = $1")
            .bind(company_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("settings", e))?;
        row.as_ref().map(rows::settings).transpose()
    }

    async fn save_settings(&self, s: &CompanySettings) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO company_settings (
                company_id, theme_color, allow_user_registration, require_email_verification,
                default_currency, order_approval_required, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (company_id) DO UPDATE SET
                theme_color = EXCLUDED.theme_color,
                allow_user_registration = EXCLUDED.allow_user_registration,
                require_email_verification = EXCLUDED.require_email_verification,
                default_currency = EXCLUDED.default_currency,
                order_approval_required = EXCLUDED.order_approval_required,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(s.company_id.as_uuid())
        .bind(&s.theme_color)
        .bind(s.allow_user_registration)
        .bind(s.require_email_verification)
        .bind(&s.default_currency)
        .bind(s.order_approval_required)
        .bind(s.created_at)
        .bind(s.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_settings", e))?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl UserStore for PostgresStore {
    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<UserAccount>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("user_by_id", e))?;
        row.as_ref().map(rows::account).transpose()
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<UserAccount>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("user_by_username", e))?;
        row.as_ref().map(rows::account).transpose()
    }

    async fn email_exists(&self, email: &str, exclude: Option<UserId>) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND ($2::UUID IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(exclude.map(|id| *id.as_uuid()))
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("email_exists", e))
    }

    async fn insert_user(&self, account: &UserAccount, profile: &UserProfile) -> StoreResult<()> {
        let mut tx = self.begin().await?;
        insert_user_rows(&mut *tx, account).await?;
        upsert_profile_row(&mut *tx, profile).await?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(())
    }

    async fn update_user(&self, a: &UserAccount) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                email = $2, password_hash = $3, first_name = $4, last_name = $5,
                is_active = $6, is_staff = $7, last_login = $8
            WHERE id = $1
            "#,
        )
        .bind(a.id.as_uuid())
        .bind(&a.email)
        .bind(&a.password_hash)
        .bind(&a.first_name)
        .bind(&a.last_name)
        .bind(a.is_active)
        .bind(a.is_staff)
        .bind(a.last_login)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn profile(&self, user_id: UserId) -> StoreResult<Option<UserProfile>> {
        let row = sqlx::query("SELECT * FROM user_profiles WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("profile", e))?;
        row.as_ref().map(|r| rows::profile(r, user_id, "")).transpose()
    }

    async fn save_profile(&self, profile: &UserProfile) -> StoreResult<()> {
        upsert_profile_row(&*self.pool, profile).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memberships
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl MembershipStore for PostgresStore {
    async fn membership(&self, company_id: CompanyId, user_id: UserId) -> StoreResult<Option<Membership>> {
        let row = sqlx::query("SELECT * FROM company_memberships WHERE company_id = $1 AND user_id = $2")
            .bind(company_id.as_uuid())
            .bind(user_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("membership", e))?;
        row.as_ref().map(|r| rows::membership(r, "")).transpose()
    }

    async fn company_members(&self, company_id: CompanyId) -> StoreResult<Vec<MemberRecord>> {
        let records = sqlx::query(
            r#"
            SELECT
                u.*,
                p.phone AS profile_phone,
                p.position AS profile_position,
                p.department AS profile_department,
                p.email AS profile_email,
                m.company_id AS m_company_id,
                m.user_id AS m_user_id,
                m.role AS m_role,
                m.is_active AS m_is_active,
                m.joined_at AS m_joined_at,
                m.version AS m_version
            FROM company_memberships m
            JOIN users u ON u.id = m.user_id
            LEFT JOIN user_profiles p ON p.user_id = m.user_id
            WHERE m.company_id = $1
            "#,
        )
        .bind(company_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("company_members", e))?;

        records.iter()
            .map(|row| {
                let account = rows::account(row)?;
                let profile = rows::profile(row, account.id, "profile_")?;
                let membership = rows::membership(row, "m_")?;
                Ok(MemberRecord { account, profile, membership })
            })
            .collect()
    }

    async fn count_active_members(&self, company_id: CompanyId) -> StoreResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM company_memberships WHERE company_id = $1 AND is_active",
        )
        .bind(company_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_active_members", e))?;
        Ok(count.max(0) as u64)
    }

    async fn insert_membership(&self, membership: &Membership) -> StoreResult<()> {
        insert_membership_row(&*self.pool, membership).await
    }

    #[instrument(skip(self, m), fields(company_id = %m.company_id(), user_id = %m.user_id()), err)]
    async fn save_membership(&self, m: &Membership, expected: ExpectedVersion) -> StoreResult<()> {
        let caps = m.capabilities();
        let result = sqlx::query(
            r#"
            UPDATE company_memberships SET
                role = $3,
                can_manage_users = $4, can_manage_orders = $5, can_manage_products = $6,
                can_manage_suppliers = $7, can_view_reports = $8,
                is_active = $9, version = $10
            WHERE company_id = $1 AND user_id = $2 AND ($11::BIGINT IS NULL OR version = $11)
            "#,
        )
        .bind(m.company_id().as_uuid())
        .bind(m.user_id().as_uuid())
        .bind(m.role().as_str())
        .bind(caps.can_manage_users)
        .bind(caps.can_manage_orders)
        .bind(caps.can_manage_products)
        .bind(caps.can_manage_suppliers)
        .bind(caps.can_view_reports)
        .bind(m.is_active())
        .bind(m.version() as i64)
        .bind(expected_version(expected))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_membership", e))?;

        if result.rows_affected() == 0 {
            return match self.membership(m.company_id(), m.user_id()).await? {
                Some(current) => Err(StoreError::Conflict(format!(
                    "membership changed concurrently (expected: {expected:?}, actual: {})",
                    current.version()
                ))),
                None => Err(StoreError::NotFound),
            };
        }
        Ok(())
    }

    async fn delete_membership(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        expected: ExpectedVersion,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM company_memberships
            WHERE company_id = $1 AND user_id = $2 AND ($3::BIGINT IS NULL OR version = $3)
            "#,
        )
        .bind(company_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(expected_version(expected))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_membership", e))?;

        if result.rows_affected() == 0 {
            return match self.membership(company_id, user_id).await? {
                Some(_) => Err(StoreError::Conflict("membership changed concurrently".into())),
                None => Err(StoreError::NotFound),
            };
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Menu sections
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl MenuStore for PostgresStore {
    async fn menu_sections(&self, company_id: CompanyId) -> StoreResult<Vec<MenuSection>> {
        let records = sqlx::query("SELECT * FROM menu_sections WHERE company_id = $1 ORDER BY sort_order, title")
            .bind(company_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("menu_sections", e))?;
        records.iter().map(rows::menu_section).collect()
    }

    async fn menu_section(&self, company_id: CompanyId, id: MenuSectionId) -> StoreResult<Option<MenuSection>> {
        let row = sqlx::query("SELECT * FROM menu_sections WHERE company_id = $1 AND id = $2")
            .bind(company_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("menu_section", e))?;
        row.as_ref().map(rows::menu_section).transpose()
    }

    async fn menu_title_exists(
        &self,
        company_id: CompanyId,
        title: &str,
        exclude: Option<MenuSectionId>,
    ) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM menu_sections
                WHERE company_id = $1 AND title = $2 AND ($3::UUID IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(company_id.as_uuid())
        .bind(title)
        .bind(exclude.map(|id| *id.as_uuid()))
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("menu_title_exists", e))
    }

    async fn insert_menu_section(&self, s: &MenuSection) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO menu_sections (
                id, company_id, created_by, title, description, icon, section_type, url,
                sort_order, is_active, open_in_new_tab, required_role, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(s.id.as_uuid())
        .bind(s.company_id.as_uuid())
        .bind(s.created_by.as_uuid())
        .bind(&s.title)
        .bind(&s.description)
        .bind(&s.icon)
        .bind(s.section_type.as_str())
        .bind(&s.url)
        .bind(s.order as i32)
        .bind(s.is_active)
        .bind(s.open_in_new_tab)
        .bind(s.required_role.as_str())
        .bind(s.created_at)
        .bind(s.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_menu_section", e))?;
        Ok(())
    }

    async fn update_menu_section(&self, s: &MenuSection) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE menu_sections SET
                title = $3, description = $4, icon = $5, section_type = $6, url = $7,
                sort_order = $8, is_active = $9, open_in_new_tab = $10, required_role = $11,
                updated_at = $12
            WHERE company_id = $1 AND id = $2
            "#,
        )
        .bind(s.company_id.as_uuid())
        .bind(s.id.as_uuid())
        .bind(&s.title)
        .bind(&s.description)
        .bind(&s.icon)
        .bind(s.section_type.as_str())
        .bind(&s.url)
        .bind(s.order as i32)
        .bind(s.is_active)
        .bind(s.open_in_new_tab)
        .bind(s.required_role.as_str())
        .bind(s.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_menu_section", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_menu_section(&self, company_id: CompanyId, id: MenuSectionId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM menu_sections WHERE company_id = $1 AND id = $2")
            .bind(company_id.as_uuid())
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_menu_section", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sessions
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl SessionStore for PostgresStore {
    async fn load_session(&self, token: &SessionToken) -> StoreResult<Option<Session>> {
        let row = sqlx::query("SELECT * FROM sessions WHERE token = $1")
            .bind(token.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_session", e))?;
        row.as_ref().map(rows::session).transpose()
    }

    async fn save_session(&self, session: &Session) -> StoreResult<()> {
        let company = session.current_company.as_ref();
        sqlx::query(
            r#"
            INSERT INTO sessions (
                token, user_id, current_company_id, current_company_slug, messages, issued_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (token) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                current_company_id = EXCLUDED.current_company_id,
                current_company_slug = EXCLUDED.current_company_slug,
                messages = EXCLUDED.messages,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(session.token.as_str())
        .bind(session.user_id.map(|id| *id.as_uuid()))
        .bind(company.map(|c| *c.id.as_uuid()))
        .bind(company.map(|c| c.slug.as_str()))
        .bind(Json(&session.messages))
        .bind(session.issued_at)
        .bind(session.expires_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_session", e))?;
        Ok(())
    }

    async fn delete_session(&self, token: &SessionToken) -> StoreResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_session", e))?;
        Ok(())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("purge_expired_sessions", e))?;
        Ok(result.rows_affected())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tenant directory
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl TenantDirectory for PostgresStore {
    type Error = StoreError;

    async fn active_company_by_slug(&self, slug: &str) -> StoreResult<Option<Company>> {
        let row = sqlx::query("SELECT * FROM companies WHERE slug = $1 AND is_active")
            .bind(slug)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("active_company_by_slug", e))?;
        row.as_ref().map(rows::company).transpose()
    }

    async fn active_membership(&self, company_id: CompanyId, user_id: UserId) -> StoreResult<Option<Membership>> {
        let row = sqlx::query(
            "SELECT * FROM company_memberships WHERE company_id = $1 AND user_id = $2 AND is_active",
        )
        .bind(company_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("active_membership", e))?;
        row.as_ref().map(|r| rows::membership(r, "")).transpose()
    }

    async fn active_memberships_for_user(&self, user_id: UserId) -> StoreResult<Vec<(Company, Membership)>> {
        let records = sqlx::query(
            r#"
            SELECT
                c.*,
                m.company_id AS m_company_id,
                m.user_id AS m_user_id,
                m.role AS m_role,
                m.is_active AS m_is_active,
                m.joined_at AS m_joined_at,
                m.version AS m_version
            FROM company_memberships m
            JOIN companies c ON c.id = m.company_id
            WHERE m.user_id = $1 AND m.is_active AND c.is_active
            ORDER BY c.name
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("active_memberships_for_user", e))?;

        records.iter()
            .map(|row| Ok((rows::company(row)?, rows::membership(row, "m_")?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_constraints_map_to_readable_conflicts() {
        assert_eq!(conflict_message(Some("companies_slug_key")), "company slug already exists");
        assert_eq!(
            conflict_message(Some("company_memberships_pkey")),
            "user is already a member of this company"
        );
        assert_eq!(conflict_message(None), "duplicate record");
    }

    #[test]
    fn expected_version_binds_null_for_any() {
        assert_eq!(expected_version(ExpectedVersion::Any), None);
        assert_eq!(expected_version(ExpectedVersion::Exact(4)), Some(4));
    }

    #[test]
    fn row_not_found_is_not_found() {
        assert_eq!(map_sqlx_error("x", sqlx::Error::RowNotFound), StoreError::NotFound);
        assert!(matches!(map_sqlx_error("x", sqlx::Error::PoolClosed), StoreError::Unavailable(_)));
    }
}
