// HTTP surface tests: the full app wired to the in-memory store, wiremock
// upstreams and a temporary cache directory.

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

use country_fx_api::api::{configure_app, AppState};
use country_fx_api::database_ops::{CountryStore, MemoryCountryStore};
use country_fx_api::orchestrator::RefreshPipeline;
use country_fx_api::render::SummaryRenderer;
use country_fx_api::sources::{ExchangeRateClient, RestCountriesClient};

mod test_utils {
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub const COUNTRIES_PATH: &str = "/v2/all";
    pub const RATES_PATH: &str = "/v6/latest/USD";

    pub fn catalog() -> Value {
        json!([
            {
                "name": "Testland",
                "capital": "Test City",
                "region": "Africa",
                "population": 1_000_000,
                "flag": "https://flags.test/tst.svg",
                "currencies": [{ "code": "TST", "name": "Test dollar", "symbol": "T$" }]
            },
            {
                "name": "Bigland",
                "region": "Europe",
                "population": 100_000_000,
                "currencies": [{ "code": "TST" }]
            },
            { "name": "Noland", "region": "africa", "population": 1000 },
            { "name": "Ghost", "region": "Europe", "currencies": [{ "code": "GHO" }] }
        ])
    }

    pub async fn upstream(countries: ResponseTemplate, rates: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COUNTRIES_PATH))
            .respond_with(countries)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(RATES_PATH))
            .respond_with(rates)
            .mount(&server)
            .await;
        server
    }

    pub async fn healthy_upstream() -> MockServer {
        upstream(
            ResponseTemplate::new(200).set_body_json(catalog()),
            ResponseTemplate::new(200)
                .set_body_json(json!({ "result": "success", "rates": { "USD": 1, "TST": 2 } })),
        )
        .await
    }
}

struct Harness {
    state: AppState,
    store: MemoryCountryStore,
    _cache: TempDir,
}

fn harness(server: &wiremock::MockServer) -> Harness {
    let cache = tempfile::tempdir().unwrap();
    let store = MemoryCountryStore::new();
    let http = reqwest::Client::new();
    let pipeline = RefreshPipeline::new(
        Arc::new(RestCountriesClient::with_client(
            format!("{}{}", server.uri(), test_utils::COUNTRIES_PATH),
            http.clone(),
        )),
        Arc::new(ExchangeRateClient::with_client(
            format!("{}{}", server.uri(), test_utils::RATES_PATH),
            http,
        )),
        Arc::new(store.clone()),
        SummaryRenderer::in_cache_dir(cache.path()),
    )
    .with_seed(7);
    Harness {
        state: AppState::new(pipeline),
        store,
        _cache: cache,
    }
}

macro_rules! app {
    ($h:expr) => {
        test::init_service(App::new().configure(configure_app(web::Data::new($h.state.clone()))))
            .await
    };
}

macro_rules! refresh {
    ($app:expr) => {{
        let req = test::TestRequest::post().uri("/countries/refresh").to_request();
        let resp = test::call_service($app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        body
    }};
}

fn names(body: &Value) -> Vec<&str> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect()
}

#[test_log::test(actix_web::test)]
async fn root_and_health() {
    let server = test_utils::healthy_upstream().await;
    let h = harness(&server);
    let app = app!(h);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(body, "Country Currency & Exchange API is running!");

    let health: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request())
            .await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["database"], "connected");
}

#[test_log::test(actix_web::test)]
async fn refresh_populates_store_status_and_image() {
    let server = test_utils::healthy_upstream().await;
    let h = harness(&server);
    let app = app!(h);

    let status: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/status").to_request())
            .await;
    assert_eq!(status, json!({ "total_countries": 0, "last_refreshed_at": null }));

    let body = refresh!(&app);
    assert_eq!(
        body,
        json!({
            "message": "Countries data refreshed successfully",
            "total_countries_processed": 4
        })
    );

    let status: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/status").to_request())
            .await;
    assert_eq!(status["total_countries"], 4);
    assert!(status["last_refreshed_at"].as_str().unwrap().ends_with('Z'));

    let testland: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/countries/testland").to_request(),
    )
    .await;
    assert_eq!(testland["name"], "Testland");
    assert_eq!(testland["capital"], "Test City");
    assert_eq!(testland["currency_code"], "TST");
    assert_eq!(testland["exchange_rate"], 2.0);
    assert_eq!(testland["flag_url"], "https://flags.test/tst.svg");
    let gdp = testland["estimated_gdp"].as_f64().unwrap();
    assert!((500_000_000.0..=1_000_000_000.0).contains(&gdp));

    let noland: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/countries/NOLAND").to_request(),
    )
    .await;
    assert_eq!(noland["currency_code"], Value::Null);
    assert_eq!(noland["estimated_gdp"], 0.0);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/countries/image").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "image/png");
    let png = test::read_body(resp).await;
    assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"));
}

#[test_log::test(actix_web::test)]
async fn second_refresh_updates_rows_in_place() {
    let server = test_utils::healthy_upstream().await;
    let h = harness(&server);
    let app = app!(h);

    refresh!(&app);
    let first: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/countries/Testland").to_request(),
    )
    .await;
    refresh!(&app);
    let second: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/countries/Testland").to_request(),
    )
    .await;

    assert_eq!(first["id"], second["id"]);
    let all: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/countries").to_request())
            .await;
    assert_eq!(all.as_array().unwrap().len(), 4);
}

#[test_log::test(actix_web::test)]
async fn upstream_failure_returns_503_and_keeps_data() {
    let server = test_utils::upstream(
        wiremock::ResponseTemplate::new(200).set_body_json(test_utils::catalog()),
        wiremock::ResponseTemplate::new(500),
    )
    .await;
    let h = harness(&server);
    let app = app!(h);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().uri("/countries/refresh").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "External data source unavailable");
    assert_eq!(
        body["details"],
        format!(
            "Could not fetch data from {}{}",
            server.uri(),
            test_utils::RATES_PATH
        )
    );

    let status: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/status").to_request())
            .await;
    assert_eq!(status["total_countries"], 0);
    assert_eq!(status["last_refreshed_at"], Value::Null);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/countries/image").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "error": "Summary image not found" }));
}

#[test_log::test(actix_web::test)]
async fn list_filters_and_sorts() {
    let server = test_utils::healthy_upstream().await;
    let h = harness(&server);
    let app = app!(h);
    refresh!(&app);

    let get = |uri: &'static str| test::TestRequest::get().uri(uri).to_request();

    let all: Value = test::call_and_read_body_json(&app, get("/countries")).await;
    assert_eq!(names(&all), vec!["Testland", "Bigland", "Noland", "Ghost"]);

    let africa: Value = test::call_and_read_body_json(&app, get("/countries?region=AFRICA")).await;
    assert_eq!(names(&africa), vec!["Testland", "Noland"]);

    let tst: Value =
        test::call_and_read_body_json(&app, get("/countries?currency=tst&sort=name_asc")).await;
    assert_eq!(names(&tst), vec!["Bigland", "Testland"]);

    let by_gdp: Value = test::call_and_read_body_json(&app, get("/countries?sort=gdp_desc")).await;
    assert_eq!(names(&by_gdp), vec!["Bigland", "Testland", "Noland", "Ghost"]);

    let by_gdp_asc: Value =
        test::call_and_read_body_json(&app, get("/countries?sort=gdp_asc")).await;
    assert_eq!(names(&by_gdp_asc), vec!["Noland", "Testland", "Bigland", "Ghost"]);

    let by_name: Value = test::call_and_read_body_json(&app, get("/countries?sort=name_desc")).await;
    assert_eq!(names(&by_name), vec!["Testland", "Noland", "Ghost", "Bigland"]);

    let resp = test::call_service(&app, get("/countries?sort=population")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Validation failed");
    assert!(body["details"]["sort"].as_str().unwrap().contains("gdp_desc"));
}

#[test_log::test(actix_web::test)]
async fn get_and_delete_are_case_insensitive() {
    let server = test_utils::healthy_upstream().await;
    let h = harness(&server);
    let app = app!(h);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/countries/Testland").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "error": "Country not found" }));

    refresh!(&app);

    let resp = test::call_service(
        &app,
        test::TestRequest::delete().uri("/countries/tEsTlAnD").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Country 'tEsTlAnD' deleted successfully");

    let resp = test::call_service(
        &app,
        test::TestRequest::delete().uri("/countries/Testland").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let status: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/status").to_request())
            .await;
    assert_eq!(status["total_countries"], 3);
}

#[test_log::test(actix_web::test)]
async fn create_validates_and_upserts() {
    let server = test_utils::healthy_upstream().await;
    let h = harness(&server);
    let app = app!(h);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/countries")
            .set_json(json!({ "population": 0, "currency_code": "" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({
            "error": "Validation failed",
            "details": {
                "name": "is required",
                "population": "must be a positive number",
                "currency_code": "is required"
            }
        })
    );

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/countries")
            .set_json(json!({
                "name": "Handland",
                "region": "Oceania",
                "population": 2000,
                "currency_code": "hnd",
                "exchange_rate": 4.0
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["currency_code"], "HND");
    let gdp = created["estimated_gdp"].as_f64().unwrap();
    assert!((500_000.0..=1_000_000.0).contains(&gdp));

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/countries")
            .set_json(json!({ "name": "HANDLAND", "population": 10, "currency_code": "HND" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let updated: Value = test::read_body_json(resp).await;
    assert_eq!(updated["id"], created["id"]);
    assert_eq!(updated["name"], "Handland");
    assert_eq!(updated["estimated_gdp"], Value::Null);

    assert_eq!(h.store.list_countries(&Default::default()).await.unwrap().len(), 1);
}

#[test_log::test(actix_web::test)]
async fn malformed_requests_are_rejected() {
    let server = test_utils::healthy_upstream().await;
    let h = harness(&server);
    let app = app!(h);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/countries")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{not json")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Validation failed");
    assert!(body["details"]["body"].is_string());

    let resp = test::call_service(&app, test::TestRequest::get().uri("/nowhere").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[test_log::test(actix_web::test)]
async fn rates_payload_without_table_fails_refresh() {
    let server = test_utils::upstream(
        wiremock::ResponseTemplate::new(200).set_body_json(test_utils::catalog()),
        wiremock::ResponseTemplate::new(200)
            .set_body_json(json!({ "result": "error", "error-type": "unsupported-code" })),
    )
    .await;
    let h = harness(&server);
    let app = app!(h);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().uri("/countries/refresh").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "External data source unavailable");

    let status = h.store.status().await.unwrap();
    assert_eq!(status.total_countries, 0);
    assert_eq!(status.last_refreshed_at, None);
}

#[test_log::test(actix_web::test)]
async fn create_reports_bad_rate_on_its_field() {
    let server = test_utils::healthy_upstream().await;
    let h = harness(&server);
    let app = app!(h);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/countries")
            .set_json(json!({
                "name": "Rateland",
                "population": 10,
                "currency_code": "RTL",
                "exchange_rate": "abc"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({
            "error": "Validation failed",
            "details": { "exchange_rate": "must be a number" }
        })
    );
}
