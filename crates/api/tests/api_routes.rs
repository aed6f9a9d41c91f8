//! Router-level tests against in-memory services and a fake WooCommerce API.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use storefront_api::app::build_app;
use storefront_api::app::services::AppServices;
use storefront_catalog::{Credentials, ListingStatus, Price, Product, ProviderKind, Shop, ShopStatus};
use storefront_core::{JobId, ProductId, ShopId};
use storefront_infra::jobs::InMemoryJobStore;
use storefront_infra::providers::memory::InMemoryWooCommerce;
use storefront_infra::providers::{Providers, WooCommerceAdapter};
use storefront_infra::repository::InMemoryCatalogRepository;
use storefront_infra::{PublisherConfig, Services};
use storefront_workflow::{ComponentCode, ComponentRegistry, Workflow, WorkflowStep};

struct TestApp {
    app: Router,
    services: Arc<AppServices>,
    repo: Arc<InMemoryCatalogRepository>,
    woo: Arc<InMemoryWooCommerce>,
    shop_id: ShopId,
}

fn test_app() -> TestApp {
    let repo = InMemoryCatalogRepository::arc();
    let services = Services::in_memory(repo.clone());
    let woo = Arc::new(InMemoryWooCommerce::new());
    let providers = Providers::new().with(Arc::new(WooCommerceAdapter::new(woo.clone(), services.media_sync())));
    let app_services = AppServices::new(services, providers, InMemoryJobStore::arc(), &PublisherConfig::default());

    let shop = Shop {
        id: ShopId::new(),
        name: "Corner".into(),
        provider: ProviderKind::WooCommerce,
        status: ShopStatus::Active,
        credentials: Credentials {
            store_url: "https://corner.example".into(),
            api_key: "ck".into(),
            api_secret: "cs".into(),
            access_token: None,
        },
    };
    let shop_id = shop.id;
    repo.insert_shop(shop);

    let app_services = Arc::new(app_services);
    TestApp {
        app: build_app(Arc::clone(&app_services)),
        services: app_services,
        repo,
        woo,
        shop_id,
    }
}

fn listed_product(t: &TestApp, name: &str) -> ProductId {
    let product = Product::new(ProductId::new(), name, Price::new(1500, "EUR")).unwrap();
    let id = product.id;
    t.repo.insert_product(product);
    t.repo.list_on(t.shop_id, id);
    id
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_and_components() {
    let t = test_app();

    let (status, _) = send(&t.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&t.app, "GET", "/components", None).await;
    assert_eq!(status, StatusCode::OK);
    let components = body.as_array().unwrap();
    assert_eq!(components.len(), ComponentRegistry::standard().iter().count());
    assert!(components.iter().any(|c| c["code"] == "emit_to_shop"));
}

#[tokio::test]
async fn scheduled_job_runs_slice_by_slice() {
    let t = test_app();
    let ids: Vec<ProductId> = ["Mug", "Bowl", "Plate"].into_iter().map(|n| listed_product(&t, n)).collect();

    let (status, body) = send(
        &t.app,
        "POST",
        &format!("/shops/{}/publish", t.shop_id),
        Some(json!({ "batch_size": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["outcome"], "scheduled");
    assert_eq!(body["products"], 3);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let (status, job) = send(&t.app, "GET", &format!("/jobs/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["status"], "scheduled");
    assert_eq!(job["uploaded_products"], 0);

    let (status, progress) = send(&t.app, "POST", &format!("/jobs/{job_id}/run"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["uploaded_products"], 2);

    let (_, progress) = send(&t.app, "POST", &format!("/jobs/{job_id}/run"), None).await;
    assert_eq!(progress["uploaded_products"], 3);
    assert_eq!(progress["status"], "succeeded");

    let (status, body) = send(&t.app, "POST", &format!("/jobs/{job_id}/run"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "job_finished");

    for id in ids {
        assert_eq!(t.repo.listing_status(t.shop_id, id), Some(ListingStatus::Published));
    }
    assert_eq!(t.woo.products().len(), 3);
}

#[tokio::test]
async fn scheduling_without_candidates_is_not_an_error() {
    let t = test_app();

    let (status, body) = send(&t.app, "POST", &format!("/shops/{}/publish", t.shop_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "skipped");
    assert_eq!(body["reason"], "no_eligible_products");
}

#[tokio::test]
async fn unknown_shop_and_bad_ids() {
    let t = test_app();

    let (status, body) = send(&t.app, "POST", &format!("/shops/{}/publish", ShopId::new()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "shop_not_found");

    let (status, body) = send(&t.app, "GET", "/jobs/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    let (status, body) = send(&t.app, "GET", &format!("/jobs/{}", JobId::new()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "job_not_found");
}

#[tokio::test]
async fn cancel_releases_the_job() {
    let t = test_app();
    let id = listed_product(&t, "Mug");

    let (_, body) = send(&t.app, "POST", &format!("/shops/{}/publish", t.shop_id), None).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();
    assert_eq!(t.repo.listing_status(t.shop_id, id), Some(ListingStatus::Scheduled));

    let (status, progress) = send(&t.app, "POST", &format!("/jobs/{job_id}/cancel"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["status"], "failed");
    assert_eq!(t.repo.listing_status(t.shop_id, id), Some(ListingStatus::NotPublished));

    let (status, _) = send(&t.app, "POST", &format!("/jobs/{job_id}/cancel"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn direct_publish_and_unpublish() {
    let t = test_app();
    let id = listed_product(&t, "Mug");

    let (status, body) = send(
        &t.app,
        "POST",
        &format!("/shops/{}/products/publish", t.shop_id),
        Some(json!({ "product_ids": [id] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "completed");
    assert_eq!(body["published"].as_array().unwrap().len(), 1);

    let (status, listing) = send(
        &t.app,
        "POST",
        &format!("/shops/{}/products/{id}/unpublish", t.shop_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["status"], "not_published");

    let (status, body) = send(
        &t.app,
        "POST",
        &format!("/shops/{}/products/publish", t.shop_id),
        Some(json!({ "product_ids": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn busy_shop_answers_conflict() {
    let t = test_app();
    let id = listed_product(&t, "Mug");
    let (_, body) = send(&t.app, "POST", &format!("/shops/{}/publish", t.shop_id), None).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let held = t.services.coordinator.pipeline().guards().try_claim(t.shop_id).unwrap();

    let (status, body) = send(&t.app, "POST", &format!("/jobs/{job_id}/run"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "shop_busy");

    let (status, body) = send(
        &t.app,
        "POST",
        &format!("/shops/{}/products/publish", t.shop_id),
        Some(json!({ "product_ids": [id] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "shop_busy");
    assert!(t.woo.products().is_empty());

    drop(held);
    let (status, progress) = send(&t.app, "POST", &format!("/jobs/{job_id}/run"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["status"], "succeeded");
    assert_eq!(t.woo.products().len(), 1);
}

#[tokio::test]
async fn workflow_validation_report() {
    let t = test_app();
    let uri = format!("/shops/{}/workflow/validate", t.shop_id);

    let (status, report) = send(&t.app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["valid"], true);
    assert_eq!(report["direct_upload"], true);

    let registry = ComponentRegistry::standard();
    let mut workflow = Workflow::new(t.shop_id);
    let inputs = json!({ "tag": "alt", "value": "{name}" });
    workflow
        .insert_step(
            &registry,
            WorkflowStep::new(ComponentCode::SetImageMetadata, 1, inputs.as_object().unwrap().clone()),
        )
        .unwrap();
    t.repo.insert_workflow(workflow);

    let (status, report) = send(&t.app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["valid"], false);
    assert_eq!(report["steps"], 1);
    let kinds: Vec<&str> = report["issues"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["kind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"missing_prerequisite"));
    assert!(kinds.contains(&"no_emit_step"));
}
