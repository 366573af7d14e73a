//! Row ↔ domain conversions.

use sqlx::Row;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use uuid::Uuid;

use bizdesk_auth::{CurrentCompany, FlashMessage, Role, Session, SessionToken, UserAccount, UserProfile};
use bizdesk_companies::{Company, CompanySettings, CompanyType, Membership, MenuSection, SectionType};
use bizdesk_core::{CompanyId, MenuSectionId, UserId};

use crate::error::{StoreError, StoreResult};

fn corrupt(field: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{field}: {err}"))
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column).map_err(|e| corrupt(column, e))
}

fn role(row: &PgRow, column: &str) -> StoreResult<Role> {
    get::<String>(row, column)?.parse().map_err(|e| corrupt(column, e))
}

pub(super) fn company(row: &PgRow) -> StoreResult<Company> {
    Ok(Company {
        id: CompanyId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        slug: get(row, "slug")?,
        company_type: get::<String>(row, "company_type")?
            .parse::<CompanyType>()
            .map_err(|e| corrupt("company_type", e))?,
        description: get(row, "description")?,
        phone: get(row, "phone")?,
        email: get(row, "email")?,
        website: get(row, "website")?,
        address: get(row, "address")?,
        city: get(row, "city")?,
        country: get(row, "country")?,
        tax_number: get(row, "tax_number")?,
        registration_number: get(row, "registration_number")?,
        is_active: get(row, "is_active")?,
        owner_id: UserId::from_uuid(get(row, "owner_id")?),
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(super) fn settings(row: &PgRow) -> StoreResult<CompanySettings> {
    Ok(CompanySettings {
        company_id: CompanyId::from_uuid(get(row, "company_id")?),
        theme_color: get(row, "theme_color")?,
        allow_user_registration: get(row, "allow_user_registration")?,
        require_email_verification: get(row, "require_email_verification")?,
        default_currency: get(row, "default_currency")?,
        order_approval_required: get(row, "order_approval_required")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(super) fn account(row: &PgRow) -> StoreResult<UserAccount> {
    Ok(UserAccount {
        id: UserId::from_uuid(get(row, "id")?),
        username: get(row, "username")?,
        email: get(row, "email")?,
        password_hash: get(row, "password_hash")?,
        first_name: get(row, "first_name")?,
        last_name: get(row, "last_name")?,
        is_active: get(row, "is_active")?,
        is_staff: get(row, "is_staff")?,
        date_joined: get(row, "date_joined")?,
        last_login: get(row, "last_login")?,
    })
}

/// Profile columns, optionally prefixed (`profile_phone`, ...) in joins.
pub(super) fn profile(row: &PgRow, user_id: UserId, prefix: &str) -> StoreResult<UserProfile> {
    let col = |name: &str| format!("{prefix}{name}");
    Ok(UserProfile {
        user_id,
        phone: get::<Option<String>>(row, &col("phone"))?.unwrap_or_default(),
        position: get::<Option<String>>(row, &col("position"))?.unwrap_or_default(),
        department: get::<Option<String>>(row, &col("department"))?.unwrap_or_default(),
        email: get::<Option<String>>(row, &col("email"))?.unwrap_or_default(),
    })
}

/// Membership columns, optionally prefixed in joins.
pub(super) fn membership(row: &PgRow, prefix: &str) -> StoreResult<Membership> {
    let col = |name: &str| format!("{prefix}{name}");
    let version: i64 = get(row, &col("version"))?;
    Ok(Membership::restore(
        CompanyId::from_uuid(get(row, &col("company_id"))?),
        UserId::from_uuid(get(row, &col("user_id"))?),
        role(row, &col("role"))?,
        get(row, &col("is_active"))?,
        get(row, &col("joined_at"))?,
        u64::try_from(version).map_err(|e| corrupt("version", e))?,
    ))
}

pub(super) fn menu_section(row: &PgRow) -> StoreResult<MenuSection> {
    let order: i32 = get(row, "sort_order")?;
    Ok(MenuSection {
        id: MenuSectionId::from_uuid(get(row, "id")?),
        company_id: CompanyId::from_uuid(get(row, "company_id")?),
        created_by: UserId::from_uuid(get(row, "created_by")?),
        title: get(row, "title")?,
        description: get(row, "description")?,
        icon: get(row, "icon")?,
        section_type: get::<String>(row, "section_type")?
            .parse::<SectionType>()
            .map_err(|e| corrupt("section_type", e))?,
        url: get(row, "url")?,
        order: u32::try_from(order).map_err(|e| corrupt("sort_order", e))?,
        is_active: get(row, "is_active")?,
        open_in_new_tab: get(row, "open_in_new_tab")?,
        required_role: role(row, "required_role")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(super) fn session(row: &PgRow) -> StoreResult<Session> {
    let company_id: Option<Uuid> = get(row, "current_company_id")?;
    let company_slug: Option<String> = get(row, "current_company_slug")?;
    let current_company = match (company_id, company_slug) {
        (Some(id), Some(slug)) => Some(CurrentCompany { id: CompanyId::from_uuid(id), slug }),
        _ => None,
    };
    let Json(messages) = get::<Json<Vec<FlashMessage>>>(row, "messages")?;
    Ok(Session {
        token: SessionToken::from_string(get::<String>(row, "token")?),
        user_id: get::<Option<Uuid>>(row, "user_id")?.map(UserId::from_uuid),
        current_company,
        messages,
        issued_at: get(row, "issued_at")?,
        expires_at: get(row, "expires_at")?,
    })
}
