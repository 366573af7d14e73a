use std::sync::Arc;

use bizdesk_api::{Config, app::build_app};
use bizdesk_infra::InMemoryStore;
use reqwest::{StatusCode, header::LOCATION, redirect::Policy};
use serde_json::{Value, json};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, backed by the in-memory store on an ephemeral port.
        let app = build_app(Config::for_tests(), Arc::new(InMemoryStore::new()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A browser-like client: keeps cookies, does not follow redirects.
fn browser() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()
        .unwrap()
}

fn location(res: &reqwest::Response) -> String {
    res.headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn registration(company: &str, username: &str) -> Value {
    json!({
        "company_name": company,
        "company_email": format!("office@{username}.example"),
        "city": "Kazan",
        "first_name": "Anna",
        "last_name": "Owner",
        "username": username,
        "email": format!("{username}@example.com"),
        "password": "correct-horse-42",
        "password_confirm": "correct-horse-42",
    })
}

async fn register(srv: &TestServer, client: &reqwest::Client, company: &str, username: &str) -> reqwest::Response {
    client
        .post(srv.url("/companies/register/"))
        .json(&registration(company, username))
        .send()
        .await
        .unwrap()
}

async fn invite(srv: &TestServer, owner: &reqwest::Client, slug: &str, username: &str, role: &str) {
    let res = owner
        .post(srv.url(&format!("/companies/{slug}/users/create/")))
        .json(&json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "first_name": username,
            "last_name": "Staff",
            "password": "staff-pass-77",
            "password_confirm": "staff-pass-77",
            "role": role,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), format!("/companies/{slug}/users/"));
}

async fn login(srv: &TestServer, client: &reqwest::Client, slug: &str, username: &str, password: &str) -> reqwest::Response {
    client
        .post(srv.url(&format!("/companies/{slug}/")))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .unwrap()
}

async fn get_json(client: &reqwest::Client, url: String) -> Value {
    let res = client.get(url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = browser().get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_requests_are_sent_to_selection_or_rejected() {
    let srv = TestServer::spawn().await;
    let client = browser();

    let res = client.get(srv.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/companies/");

    let res = client.get(srv.url("/api/v1/users/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthenticated");

    let res = client.get(srv.url("/companies/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn registration_logs_owner_into_dashboard() {
    let srv = TestServer::spawn().await;
    let client = browser();

    let res = register(&srv, &client, "Acme Trading", "anna").await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/companies/acme-trading/dashboard/");

    let body = get_json(&client, srv.url("/companies/acme-trading/dashboard/")).await;
    assert_eq!(body["company"]["slug"], "acme-trading");
    assert_eq!(body["membership"]["role"], "owner");
    assert_eq!(body["active_members"], 1);
    let caps = &body["membership"]["capabilities"];
    for flag in ["can_manage_users", "can_manage_orders", "can_manage_products", "can_manage_suppliers", "can_view_reports"] {
        assert_eq!(caps[flag], true, "{flag}");
    }
    assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));

    // Messages are shown once.
    let again = get_json(&client, srv.url("/companies/acme-trading/dashboard/")).await;
    assert_eq!(again["messages"].as_array().map(Vec::len), Some(0));

    let listed = get_json(&client, srv.url("/companies/")).await;
    assert!(listed["companies"].as_array().unwrap().iter().any(|c| c["slug"] == "acme-trading"));
}

#[tokio::test]
async fn cyrillic_company_reaches_its_pages() {
    let srv = TestServer::spawn().await;
    let client = browser();
    let encoded = "%D1%80%D0%BE%D0%B3%D0%B0-%D0%B8-%D0%BA%D0%BE%D0%BF%D1%8B%D1%82%D0%B0";

    let res = register(&srv, &client, "Рога и Копыта", "anna").await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), format!("/companies/{encoded}/dashboard/"));

    let body = get_json(&client, srv.url(&location(&res))).await;
    assert_eq!(body["company"]["slug"], "рога-и-копыта");
    assert_eq!(body["membership"]["role"], "owner");

    // Escapes are case-insensitive.
    let lower = encoded.to_lowercase();
    let users = get_json(&client, srv.url(&format!("/companies/{lower}/users/"))).await;
    assert_eq!(users["users"].as_array().map(Vec::len), Some(1));

    let fresh = browser();
    let res = login(&srv, &fresh, encoded, "anna", "correct-horse-42").await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), format!("/companies/{encoded}/dashboard/"));
    let res = fresh.get(srv.url(&format!("/companies/{encoded}/settings/"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn duplicate_company_name_is_rejected() {
    let srv = TestServer::spawn().await;
    let first = register(&srv, &browser(), "Acme", "anna").await;
    assert_eq!(first.status(), StatusCode::SEE_OTHER);

    let res = register(&srv, &browser(), "Acme", "boris").await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert!(body["errors"]["company_name"].is_array());
}

#[tokio::test]
async fn selection_redirects_to_company_login() {
    let srv = TestServer::spawn().await;
    register(&srv, &browser(), "Acme", "anna").await;
    let client = browser();

    let res = client
        .post(srv.url("/companies/"))
        .json(&json!({ "company_slug": "acme" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/companies/acme/");

    let res = client
        .post(srv.url("/companies/"))
        .json(&json!({ "company_slug": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = client.get(srv.url("/companies/nope/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn employee_sees_limited_company() {
    let srv = TestServer::spawn().await;
    let owner = browser();
    register(&srv, &owner, "Acme", "anna").await;
    invite(&srv, &owner, "acme", "ivan", "employee").await;

    let employee = browser();
    let res = login(&srv, &employee, "acme", "ivan", "wrong-password").await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = login(&srv, &employee, "acme", "ivan", "staff-pass-77").await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/companies/acme/dashboard/");

    let dashboard = get_json(&employee, srv.url("/companies/acme/dashboard/")).await;
    assert_eq!(dashboard["membership"]["role"], "employee");
    assert_eq!(dashboard["membership"]["capabilities"]["can_manage_users"], false);
    assert_eq!(dashboard["membership"]["capabilities"]["can_manage_orders"], true);

    let res = employee.get(srv.url("/companies/acme/settings/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/companies/acme/dashboard/");

    let res = employee.get(srv.url("/companies/acme/reports/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    let res = employee.get(srv.url("/companies/acme/orders/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let users = get_json(&employee, srv.url("/api/v1/users/")).await;
    assert_eq!(users["count"], 1);
    assert_eq!(users["items"][0]["username"], "ivan");

    let all = get_json(&owner, srv.url("/api/v1/users/?ordering=username")).await;
    let names: Vec<&str> = all["items"].as_array().unwrap().iter().filter_map(|u| u["username"].as_str()).collect();
    assert_eq!(names, vec!["anna", "ivan"]);
}

#[tokio::test]
async fn owner_membership_cannot_be_removed_or_demoted() {
    let srv = TestServer::spawn().await;
    let owner = browser();
    register(&srv, &owner, "Acme", "anna").await;

    let me = get_json(&owner, srv.url("/api/v1/users/me")).await;
    let owner_id = me["id"].as_str().unwrap().to_string();

    let res = owner.delete(srv.url(&format!("/api/v1/users/{owner_id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = owner
        .patch(srv.url(&format!("/api/v1/users/{owner_id}")))
        .json(&json!({ "role": "viewer" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let me = get_json(&owner, srv.url("/api/v1/users/me")).await;
    assert_eq!(me["role"], "owner");
}

#[tokio::test]
async fn admin_manages_members_below_admin() {
    let srv = TestServer::spawn().await;
    let owner = browser();
    register(&srv, &owner, "Acme", "anna").await;
    invite(&srv, &owner, "acme", "adm", "admin").await;
    invite(&srv, &owner, "acme", "ivan", "employee").await;

    let admin = browser();
    login(&srv, &admin, "acme", "adm", "staff-pass-77").await;

    let users = get_json(&admin, srv.url("/api/v1/users/?q=ivan")).await;
    let ivan_id = users["items"][0]["id"].as_str().unwrap().to_string();

    let res = admin
        .post(srv.url(&format!("/api/v1/users/{ivan_id}/deactivate")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["is_active"], false);

    let res = admin
        .post(srv.url(&format!("/api/v1/users/{ivan_id}/reset_password")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert!(body["temp_password"].as_str().is_some_and(|p| !p.is_empty()));

    // Admins cannot hand out the admin role.
    let res = admin
        .patch(srv.url(&format!("/api/v1/users/{ivan_id}")))
        .json(&json!({ "role": "admin" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn non_members_are_redirected_away() {
    let srv = TestServer::spawn().await;
    let anna = browser();
    register(&srv, &anna, "Acme", "anna").await;
    let boris = browser();
    register(&srv, &boris, "Globex", "boris").await;

    let res = anna.get(srv.url("/companies/globex/dashboard/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/companies/");

    let res = anna.get(srv.url("/companies/globex/users/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/companies/");

    let selection = get_json(&anna, srv.url("/companies/")).await;
    let messages = selection["messages"].as_array().unwrap();
    assert!(messages.iter().any(|m| m["level"] == "error"));
}

#[tokio::test]
async fn menu_sections_follow_required_role() {
    let srv = TestServer::spawn().await;
    let owner = browser();
    register(&srv, &owner, "Acme", "anna").await;
    invite(&srv, &owner, "acme", "ivan", "employee").await;

    for section in [
        json!({ "title": "Warehouse", "section_type": "internal", "url": "orders/" }),
        json!({ "title": "Finance", "section_type": "external", "url": "https://finance.example.com", "required_role": "manager" }),
    ] {
        let res = owner.post(srv.url("/companies/acme/menu/")).json(&section).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
    }

    let duplicate = owner
        .post(srv.url("/companies/acme/menu/"))
        .json(&json!({ "title": "Finance", "section_type": "internal", "url": "reports/" }))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let owner_menu = get_json(&owner, srv.url("/companies/acme/dashboard/")).await;
    assert_eq!(owner_menu["menu"].as_array().unwrap().len(), 2);

    let employee = browser();
    login(&srv, &employee, "acme", "ivan", "staff-pass-77").await;
    let employee_menu = get_json(&employee, srv.url("/companies/acme/dashboard/")).await;
    let menu = employee_menu["menu"].as_array().unwrap();
    assert_eq!(menu.len(), 1);
    assert_eq!(menu[0]["title"], "Warehouse");
    assert_eq!(menu[0]["full_url"], "/companies/acme/orders/");

    let res = employee.get(srv.url("/companies/acme/menu/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/companies/acme/dashboard/");
}

#[tokio::test]
async fn bearer_token_authenticates_api_clients() {
    let srv = TestServer::spawn().await;
    register(&srv, &browser(), "Acme", "anna").await;

    let api = reqwest::Client::new();
    let res = api
        .post(srv.url("/api/v1/auth/login"))
        .json(&json!({ "username": "anna", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = api
        .post(srv.url("/api/v1/auth/login"))
        .json(&json!({ "username": "anna", "password": "correct-horse-42", "company_slug": "acme" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();
    assert_eq!(body["company"]["slug"], "acme");

    let res = api.get(srv.url("/api/v1/roles")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let roles: Value = res.json().await.unwrap();
    assert_eq!(roles["roles"].as_array().unwrap().len(), 5);
    assert_eq!(roles["current"], "owner");

    let res = api
        .patch(srv.url("/api/v1/users/profiles/me"))
        .bearer_auth(&token)
        .json(&json!({ "position": "Director", "department": "Board" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let profile: Value = res.json().await.unwrap();
    assert_eq!(profile["position"], "Director");

    let res = api.post(srv.url("/api/v1/auth/logout")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = api.get(srv.url("/api/v1/roles")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}
