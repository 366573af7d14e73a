use chrono::{Duration, Utc};

use bizdesk_auth::{NewAccount, Role, Session};
use bizdesk_companies::{
    ChangeRole, CompanyType, CreateMembership, MembershipActor, MembershipCommand, MenuSectionInput,
    Registration, RegistrationInput, SectionType,
};
use bizdesk_core::{Aggregate, Versioned};

use super::*;

fn registration(company: &str, username: &str) -> Registration {
    let input = RegistrationInput {
        company_name: company.into(),
        company_type: CompanyType::Llc,
        company_email: "office@example.com".into(),
        first_name: "Olga".into(),
        last_name: "Ivanova".into(),
        username: username.into(),
        email: format!("{username}@example.com"),
        password: "password-123".into(),
        password_confirm: "password-123".into(),
        ..Default::default()
    };
    let slug = bizdesk_companies::slugify(company);
    Registration::new(&input, None, slug, Utc::now()).unwrap()
}

async fn add_member(store: &InMemoryStore, reg: &Registration, username: &str, role: Role) -> Membership {
    let input = NewAccount {
        username: username.into(),
        email: format!("{username}@example.com"),
        password: "password-123".into(),
        password_confirm: "password-123".into(),
        ..Default::default()
    };
    let (account, profile) = input.build(Utc::now()).unwrap();
    store.insert_user(&account, &profile).await.unwrap();

    let mut m = Membership::empty(reg.company.id, account.id);
    m.execute(&MembershipCommand::Create(CreateMembership {
        company_id: reg.company.id,
        user_id: account.id,
        role,
        actor: Some(reg.owner.as_actor()),
        occurred_at: Utc::now(),
    }))
    .unwrap();
    store.insert_membership(&m).await.unwrap();
    m
}

#[tokio::test]
async fn registration_is_persisted_as_a_whole() {
    let store = InMemoryStore::new();
    let reg = registration("Acme", "olga");
    store.insert_registration(&reg).await.unwrap();

    let company = store.company_by_slug("acme").await.unwrap().unwrap();
    assert_eq!(company.id, reg.company.id);
    assert!(store.settings(company.id).await.unwrap().is_some());
    assert!(store.user_by_username("olga").await.unwrap().is_some());
    let owner = store.membership(company.id, reg.owner_id()).await.unwrap().unwrap();
    assert_eq!(owner.role(), Role::Owner);
}

#[tokio::test]
async fn duplicate_registration_changes_nothing() {
    let store = InMemoryStore::new();
    store.insert_registration(&registration("Acme", "olga")).await.unwrap();

    let again = registration("Acme", "boris");
    assert!(matches!(store.insert_registration(&again).await, Err(StoreError::Conflict(_))));
    assert!(store.user_by_username("boris").await.unwrap().is_none());

    let same_user = registration("Other", "olga");
    assert!(matches!(store.insert_registration(&same_user).await, Err(StoreError::Conflict(_))));
    assert!(store.company_by_slug("other").await.unwrap().is_none());
}

#[tokio::test]
async fn slugs_like_matches_suffixed_variants_only() {
    let store = InMemoryStore::new();
    store.insert_registration(&registration("Acme", "a")).await.unwrap();
    let mut second = registration("Acme Two", "b");
    second.company.slug = "acme-1".into();
    store.insert_registration(&second).await.unwrap();
    let mut third = registration("Acmeville", "c");
    third.company.slug = "acmeville".into();
    store.insert_registration(&third).await.unwrap();

    let mut slugs = store.slugs_like("acme").await.unwrap();
    slugs.sort();
    assert_eq!(slugs, vec!["acme", "acme-1"]);
}

#[tokio::test]
async fn stale_membership_write_is_rejected() {
    let store = InMemoryStore::new();
    let reg = registration("Acme", "olga");
    store.insert_registration(&reg).await.unwrap();
    let member = add_member(&store, &reg, "pavel", Role::Employee).await;
    let loaded = member.version();

    let mut first = member.clone();
    first
        .execute(&MembershipCommand::ChangeRole(ChangeRole {
            actor: reg.owner.as_actor(),
            role: Role::Manager,
            occurred_at: Utc::now(),
        }))
        .unwrap();
    store.save_membership(&first, ExpectedVersion::Exact(loaded)).await.unwrap();

    let mut second = member.clone();
    second
        .execute(&MembershipCommand::ChangeRole(ChangeRole {
            actor: MembershipActor { user_id: reg.owner_id(), role: Role::Owner },
            role: Role::Viewer,
            occurred_at: Utc::now(),
        }))
        .unwrap();
    let result = store.save_membership(&second, ExpectedVersion::Exact(loaded)).await;
    assert!(matches!(result, Err(StoreError::Conflict(_))));

    let stored = store.membership(reg.company.id, member.user_id()).await.unwrap().unwrap();
    assert_eq!(stored.role(), Role::Manager);
}

#[tokio::test]
async fn members_and_directory_are_company_scoped() {
    let store = InMemoryStore::new();
    let acme = registration("Acme", "olga");
    let globex = registration("Globex", "hank");
    store.insert_registration(&acme).await.unwrap();
    store.insert_registration(&globex).await.unwrap();
    let pavel = add_member(&store, &acme, "pavel", Role::Viewer).await;

    assert_eq!(store.company_members(acme.company.id).await.unwrap().len(), 2);
    assert_eq!(store.company_members(globex.company.id).await.unwrap().len(), 1);
    assert_eq!(store.count_active_members(acme.company.id).await.unwrap(), 2);

    assert!(store.active_membership(globex.company.id, pavel.user_id()).await.unwrap().is_none());
    let mine = store.active_memberships_for_user(pavel.user_id()).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].0.slug, "acme");

    assert!(matches!(
        store.insert_membership(&pavel).await,
        Err(StoreError::Conflict(_))
    ));
}

#[tokio::test]
async fn menu_titles_are_unique_per_company() {
    let store = InMemoryStore::new();
    let acme = registration("Acme", "olga");
    let globex = registration("Globex", "hank");
    store.insert_registration(&acme).await.unwrap();
    store.insert_registration(&globex).await.unwrap();

    let input = MenuSectionInput {
        title: "Warehouse".into(),
        section_type: SectionType::Internal,
        url: "/warehouse/".into(),
        ..Default::default()
    };
    let a = MenuSection::create(&input, acme.company.id, acme.owner_id(), Utc::now());
    store.insert_menu_section(&a).await.unwrap();

    let dup = MenuSection::create(&input, acme.company.id, acme.owner_id(), Utc::now());
    assert!(matches!(store.insert_menu_section(&dup).await, Err(StoreError::Conflict(_))));

    let other = MenuSection::create(&input, globex.company.id, globex.owner_id(), Utc::now());
    store.insert_menu_section(&other).await.unwrap();

    assert!(store.menu_section(globex.company.id, a.id).await.unwrap().is_none());
    assert!(matches!(
        store.delete_menu_section(globex.company.id, a.id).await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn expired_sessions_are_purged() {
    let store = InMemoryStore::new();
    let now = Utc::now();
    let live = Session::start(None, now, Duration::hours(1));
    let old = Session::start(None, now - Duration::hours(3), Duration::hours(1));
    store.save_session(&live).await.unwrap();
    store.save_session(&old).await.unwrap();

    assert_eq!(store.purge_expired_sessions(now).await.unwrap(), 1);
    assert!(store.load_session(&live.token).await.unwrap().is_some());
    assert!(store.load_session(&old.token).await.unwrap().is_none());
}
