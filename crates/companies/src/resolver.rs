//! Tenant resolution: which company (if any) a request acts within.
//!
//! The resolver is transport-agnostic. It reads the request path, the
//! authenticated user and the session's remembered company, consults a
//! [`TenantDirectory`] and returns what the HTTP layer should do.

use std::borrow::Cow;

use async_trait::async_trait;

use bizdesk_auth::CurrentCompany;
use bizdesk_core::{CompanyId, UserId};

use crate::slug::{decode_slug, is_reserved_slug};
use crate::{Company, Membership};

pub const COMPANIES_ROOT: &str = "/companies/";
pub const REGISTER_PATH: &str = "/companies/register/";
pub const NO_ACCESS_MESSAGE: &str = "You do not have access to this company.";

const DEFAULT_EXEMPT_PREFIXES: &[&str] = &["/static/", "/media/", "/favicon.ico", "/health", "/api/v1/auth/"];
const DEFAULT_EXEMPT_PATHS: &[&str] = &[COMPANIES_ROOT, REGISTER_PATH];

/// Read access to companies and memberships needed for resolution.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// An active company by slug.
    async fn active_company_by_slug(&self, slug: &str) -> Result<Option<Company>, Self::Error>;

    /// The user's membership in the company, only if active.
    async fn active_membership(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Option<Membership>, Self::Error>;

    /// Active memberships of the user in active companies.
    async fn active_memberships_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<(Company, Membership)>, Self::Error>;
}

#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    pub path: &'a str,
    pub user_id: Option<UserId>,
    pub session_company: Option<&'a CurrentCompany>,
}

/// What the caller should do with the request.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Continue without tenant context.
    Pass,
    /// Continue with this company and membership attached.
    Attached { company: Company, membership: Membership },
    /// Anonymous request to a protected path.
    LoginRequired,
    /// Send the user elsewhere, optionally with a message.
    Redirect { location: String, message: Option<String> },
}

/// How the session's remembered company changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCompany {
    Unchanged,
    Set(CurrentCompany),
    Cleared,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOutcome {
    pub resolution: Resolution,
    pub session: SessionCompany,
}

impl ResolveOutcome {
    fn new(resolution: Resolution) -> Self {
        Self { resolution, session: SessionCompany::Unchanged }
    }
}

#[derive(Debug, Clone)]
pub struct TenantResolver {
    exempt_prefixes: Vec<String>,
    exempt_paths: Vec<String>,
}

impl Default for TenantResolver {
    fn default() -> Self {
        Self {
            exempt_prefixes: DEFAULT_EXEMPT_PREFIXES.iter().map(|s| s.to_string()).collect(),
            exempt_paths: DEFAULT_EXEMPT_PATHS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TenantResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exempt_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.exempt_prefixes.push(prefix.into());
        self
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_prefixes.iter().any(|p| path.starts_with(p.as_str()))
            || self.exempt_paths.iter().any(|p| p == path)
    }

    pub async fn resolve<D>(
        &self,
        directory: &D,
        request: ResolveRequest<'_>,
    ) -> Result<ResolveOutcome, D::Error>
    where
        D: TenantDirectory + ?Sized,
    {
        let path = request.path;
        if self.is_exempt(path) {
            return Ok(ResolveOutcome::new(Resolution::Pass));
        }

        let under_companies = path.starts_with(COMPANIES_ROOT);
        let Some(user_id) = request.user_id else {
            let resolution = if under_companies { Resolution::Pass } else { Resolution::LoginRequired };
            return Ok(ResolveOutcome::new(resolution));
        };

        let mut session = SessionCompany::Unchanged;

        let path_slug = slug_from_path(path);
        let mut company = match &path_slug {
            Some(slug) => directory.active_company_by_slug(slug).await?,
            None => None,
        };

        if company.is_none() {
            if let Some(remembered) = request.session_company {
                company = directory.active_company_by_slug(&remembered.slug).await?;
                if company.is_none() {
                    tracing::debug!(slug = %remembered.slug, "remembered company is gone; clearing session");
                    session = SessionCompany::Cleared;
                }
            }
        }

        if let Some(company) = company {
            match directory.active_membership(company.id, user_id).await? {
                Some(membership) => {
                    let current = CurrentCompany { id: company.id, slug: company.slug.clone() };
                    if request.session_company != Some(&current) {
                        session = SessionCompany::Set(current);
                    }
                    return Ok(ResolveOutcome {
                        resolution: Resolution::Attached { company, membership },
                        session,
                    });
                }
                None if path_slug.as_deref() == Some(company.slug.as_str()) => {
                    tracing::info!(
                        user_id = %user_id,
                        company = %company.slug,
                        "access denied: no active membership"
                    );
                    return Ok(ResolveOutcome {
                        resolution: Resolution::Redirect {
                            location: COMPANIES_ROOT.to_string(),
                            message: Some(NO_ACCESS_MESSAGE.to_string()),
                        },
                        session,
                    });
                }
                None => {}
            }
        }

        let mut memberships = directory.active_memberships_for_user(user_id).await?;
        let resolution = if memberships.len() == 1 {
            let (only, _) = memberships.remove(0);
            Resolution::Redirect { location: only.dashboard_path(), message: None }
        } else if !under_companies {
            Resolution::Redirect { location: COMPANIES_ROOT.to_string(), message: None }
        } else {
            Resolution::Pass
        };

        Ok(ResolveOutcome { resolution, session })
    }
}

/// The decoded company slug in `/companies/<slug>/...`, unless it names a page.
pub fn slug_from_path(path: &str) -> Option<Cow<'_, str>> {
    let mut parts = path.trim_matches('/').split('/');
    if parts.next()? != "companies" {
        return None;
    }
    let slug = decode_slug(parts.next()?)?;
    if slug.is_empty() || is_reserved_slug(&slug) {
        return None;
    }
    Some(slug)
}
