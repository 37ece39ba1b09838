mod common;

use axum::http::StatusCode;
use campaign_router::domain::entities::{RedirectMode, UrlStatus};
use common::{MemoryStore, spawn_app};

#[tokio::test]
async fn test_immediate_redirect() {
    let store = MemoryStore::new();
    store.add_campaign(1, RedirectMode::Immediate, None, 1.0);
    store.add_url(10, 1, "https://shop.example.com/landing", 5, 0);
    let app = spawn_app(store);

    let response = app.server.get("/redirect/1").await;

    response.assert_status(StatusCode::FOUND);
    assert_eq!(response.header("location"), "https://shop.example.com/landing");
}

#[tokio::test]
async fn test_temporary_redirect() {
    let store = MemoryStore::new();
    store.add_campaign(1, RedirectMode::Temporary, None, 1.0);
    store.add_url(10, 1, "https://shop.example.com/", 5, 0);
    let app = spawn_app(store);

    let response = app.server.get("/redirect/1").await;

    response.assert_status(StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.header("location"), "https://shop.example.com/");
}

#[tokio::test]
async fn test_no_referrer_redirect_headers() {
    let store = MemoryStore::new();
    store.add_campaign(1, RedirectMode::TemporaryNoReferrer, None, 1.0);
    store.add_url(10, 1, "https://shop.example.com/", 5, 0);
    let app = spawn_app(store);

    let response = app.server.get("/redirect/1").await;

    response.assert_status(StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.header("referrer-policy"), "no-referrer");
    assert_eq!(response.header("cache-control"), "no-store");
}

#[tokio::test]
async fn test_tracked_redirect_sets_cookie() {
    let store = MemoryStore::new();
    store.add_campaign(4, RedirectMode::TemporaryTracked, None, 1.0);
    store.add_url(41, 4, "https://shop.example.com/", 5, 0);
    let app = spawn_app(store);

    let response = app.server.get("/redirect/4").await;

    response.assert_status(StatusCode::TEMPORARY_REDIRECT);
    let cookie = response.header("set-cookie");
    let cookie = cookie.to_str().unwrap();
    assert!(cookie.starts_with("crv=4.41;"));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_meta_refresh_page() {
    let store = MemoryStore::new();
    store.add_campaign(1, RedirectMode::MetaRefresh, None, 1.0);
    store.add_url(10, 1, "https://shop.example.com/offer", 5, 0);
    let app = spawn_app(store);

    let response = app.server.get("/redirect/1").await;

    response.assert_status_ok();
    assert_eq!(response.header("cache-control"), "no-store");
    let html = response.text();
    assert!(html.contains("http-equiv=\"refresh\""));
    assert!(html.contains("https://shop.example.com/offer"));
}

#[tokio::test]
async fn test_double_meta_refresh_goes_through_bridge() {
    let store = MemoryStore::new();
    store.add_campaign(1, RedirectMode::DoubleMetaRefresh, None, 1.0);
    store.add_url(10, 1, "https://shop.example.com/offer", 5, 0);
    let app = spawn_app(store);

    let first = app.server.get("/redirect/1").await;

    first.assert_status_ok();
    let html = first.text();
    assert!(html.contains("http://localhost:3000/bridge?to="));
    assert!(!html.contains("content=\"0;url=https://shop.example.com/offer\""));

    let signature = app.state.bridge.sign("https://shop.example.com/offer");
    let second = app
        .server
        .get("/bridge")
        .add_query_param("to", "https://shop.example.com/offer")
        .add_query_param("sig", &signature)
        .await;

    second.assert_status_ok();
    assert!(second.text().contains("content=\"0;url=https://shop.example.com/offer\""));
}

#[tokio::test]
async fn test_bridge_rejects_forged_signature() {
    let store = MemoryStore::new();
    let app = spawn_app(store);

    let signature = app.state.bridge.sign("https://shop.example.com/");
    let response = app
        .server
        .get("/bridge")
        .add_query_param("to", "https://evil.example.com/")
        .add_query_param("sig", &signature)
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_alias_redirect() {
    let store = MemoryStore::new();
    store.add_campaign(2, RedirectMode::Temporary, Some("spring-sale"), 1.0);
    store.add_url(20, 2, "https://shop.example.com/spring", 5, 0);
    let app = spawn_app(store);

    let response = app.server.get("/alias/spring-sale").await;

    response.assert_status(StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.header("location"), "https://shop.example.com/spring");
}

#[tokio::test]
async fn test_unknown_campaign_and_alias_are_404() {
    let store = MemoryStore::new();
    let app = spawn_app(store);

    let response = app.server.get("/redirect/999").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["error"]["code"], "not_found");

    app.server
        .get("/alias/nothing-here")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_url_of_another_campaign_is_404() {
    let store = MemoryStore::new();
    store.add_campaign(1, RedirectMode::Temporary, None, 1.0);
    store.add_campaign(2, RedirectMode::Temporary, None, 1.0);
    store.add_url(10, 1, "https://a.example.com/", 5, 0);
    store.add_url(20, 2, "https://b.example.com/", 5, 0);
    let app = spawn_app(store);

    app.server
        .get("/redirect/1/20")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .get("/redirect/1/404")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_named_url_is_served() {
    let store = MemoryStore::new();
    store.add_campaign(1, RedirectMode::Temporary, None, 1.0);
    store.add_url(10, 1, "https://a.example.com/", 5, 0);
    store.add_url(11, 1, "https://b.example.com/", 5, 0);
    let app = spawn_app(store);

    let response = app.server.get("/redirect/1/11").await;

    response.assert_status(StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.header("location"), "https://b.example.com/");
}

#[tokio::test]
async fn test_exhausted_named_url_falls_back_to_campaign() {
    let store = MemoryStore::new();
    store.add_campaign(1, RedirectMode::Temporary, None, 1.0);
    store.add_url(10, 1, "https://a.example.com/", 5, 0);
    store.add_url_with_status(11, 1, "https://b.example.com/", 5, 5, UrlStatus::Completed);
    let app = spawn_app(store);

    let response = app.server.get("/redirect/1/11").await;

    response.assert_status(StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.header("location"), "https://a.example.com/");
}

#[tokio::test]
async fn test_detached_named_url_is_404() {
    let store = MemoryStore::new();
    store.add_campaign(1, RedirectMode::Temporary, None, 1.0);
    store.add_url(10, 1, "https://a.example.com/", 5, 0);
    store.add_url_with_status(11, 1, "https://b.example.com/", 5, 5, UrlStatus::Completed);
    store.detach(11);
    let app = spawn_app(store);

    app.server
        .get("/redirect/1/11")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    assert_eq!(app.state.accountant.pending().get(10), 0);
}

#[tokio::test]
async fn test_invalid_destination_takes_no_click() {
    let store = MemoryStore::new();
    store.add_campaign(1, RedirectMode::Temporary, None, 1.0);
    store.add_url(10, 1, "shop.example.com/landing", 5, 0);
    let app = spawn_app(store);

    let response = app.server.get("/redirect/1").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.state.accountant.pending().get(10), 0);
    assert_eq!(app.store.url(10).clicks, 0);
    assert!(app.store.hits().is_empty());
}

#[tokio::test]
async fn test_exhausted_campaign_is_410() {
    let store = MemoryStore::new();
    store.add_campaign(1, RedirectMode::Temporary, None, 1.0);
    store.add_url(10, 1, "https://a.example.com/", 3, 3);
    store.add_url_with_status(11, 1, "https://b.example.com/", 3, 0, UrlStatus::Paused);
    let app = spawn_app(store);

    let response = app.server.get("/redirect/1").await;

    response.assert_status(StatusCode::GONE);
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["error"]["code"], "exhausted");
}

#[tokio::test]
async fn test_only_dispatchable_urls_are_selected() {
    let store = MemoryStore::new();
    store.add_campaign(1, RedirectMode::Temporary, None, 1.0);
    store.add_url(10, 1, "https://live.example.com/", 1_000, 0);
    store.add_url_with_status(11, 1, "https://paused.example.com/", 1_000, 0, UrlStatus::Paused);
    store.add_url_with_status(12, 1, "https://rejected.example.com/", 1_000, 0, UrlStatus::Rejected);
    store.add_url(13, 1, "https://spent.example.com/", 10, 10);
    let app = spawn_app(store);

    for _ in 0..20 {
        let response = app.server.get("/redirect/1").await;
        assert_eq!(response.header("location"), "https://live.example.com/");
    }
}

#[tokio::test]
async fn test_dispatch_logs_hit() {
    let store = MemoryStore::new();
    store.add_campaign(3, RedirectMode::Temporary, None, 1.0);
    store.add_url(30, 3, "https://a.example.com/", 5, 0);
    let app = spawn_app(store);

    app.server.get("/redirect/3").await;

    let hits = app.wait_for_hits(1).await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].url_id, 30);
    assert_eq!(hits[0].campaign_id, 3);
}

#[tokio::test]
async fn test_store_outage_on_cold_cache_is_500() {
    let store = MemoryStore::new();
    store.add_campaign(1, RedirectMode::Temporary, None, 1.0);
    store.add_url(10, 1, "https://a.example.com/", 5, 0);
    store.set_unavailable(true);
    let app = spawn_app(store);

    let response = app.server.get("/redirect/1").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_trailing_slash_is_normalized() {
    let store = MemoryStore::new();
    store.add_campaign(1, RedirectMode::Temporary, None, 1.0);
    store.add_url(10, 1, "https://a.example.com/", 5, 0);
    let app = spawn_app(store);

    app.server
        .get("/redirect/1/")
        .await
        .assert_status(StatusCode::TEMPORARY_REDIRECT);
}
