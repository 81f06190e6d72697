// src/handlers.rs
use crate::services::{ImageProvider as _, dimensions};
use crate::{AppState, errors::EaselError, models::*};
use actix_web::http::{Method, header};
use actix_web::{HttpRequest, HttpResponse, middleware, web};

/// Payload ceilings: binary uploads and JSON bodies carrying a base64
/// reference image both run to tens of megabytes at the 4K tier.
const MAX_BINARY_BODY: usize = 50 * 1024 * 1024;
const MAX_JSON_BODY: usize = 32 * 1024 * 1024;

/// Route table shared by the binary and the handler tests.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .wrap(
                middleware::DefaultHeaders::new()
                    .add((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
                    .add((
                        header::ACCESS_CONTROL_EXPOSE_HEADERS,
                        "X-Image-Width, X-Image-Height",
                    )),
            )
            .app_data(web::PayloadConfig::new(MAX_BINARY_BODY))
            .app_data(web::JsonConfig::default().limit(MAX_JSON_BODY).error_handler(
                |err, _req| EaselError::InvalidInput(format!("malformed request body: {}", err)).into(),
            ))
            .route("/generate/{provider}", web::post().to(generate_image))
            .route(
                "/generate/{provider}",
                web::method(Method::OPTIONS).to(generate_preflight),
            )
            .route("/upload", web::post().to(upload_object))
            .route("/upload", web::method(Method::OPTIONS).to(upload_preflight)),
    )
    .route("/health", web::get().to(health_check));
}

/// Edge relay: validate, resolve dimensions, dispatch to the provider, and
/// return raw image bytes with the dimensions in headers. Success is never
/// a JSON envelope; multi-megabyte base64-in-JSON is exactly what this
/// surface exists to avoid. JSON is the error path only.
pub async fn generate_image(
    path: web::Path<String>,
    req: HttpRequest,
    body: web::Json<GenerateRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, EaselError> {
    let provider_kind: ProviderKind = path.into_inner().parse()?;

    // Every client-input check happens before any upstream traffic.
    let request = body.validate()?;
    let dims = dimensions::resolve(provider_kind, request.aspect_ratio, request.quality)?;
    let credential = credential_for(&req, provider_kind, &data)?;

    log::info!(
        "generate via {}: {}x{} ({} {})",
        provider_kind,
        dims.width,
        dims.height,
        request.aspect_ratio,
        request.quality,
    );

    let artifact = data
        .provider(provider_kind)
        .generate(&credential, &request, dims)
        .await?;

    Ok(HttpResponse::Ok()
        .content_type(artifact.mime_type.clone())
        .insert_header(("X-Image-Width", artifact.width.to_string()))
        .insert_header(("X-Image-Height", artifact.height.to_string()))
        .body(artifact.bytes))
}

/// Credential resolution: request header first, then the server-held key.
fn credential_for(
    req: &HttpRequest,
    provider: ProviderKind,
    data: &AppState,
) -> Result<String, EaselError> {
    let from_header = req
        .headers()
        .get(provider.credential_header())
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    from_header
        .or_else(|| data.fallback_key(provider))
        .ok_or_else(|| EaselError::CredentialMissing(provider.to_string()))
}

/// Object storage uploader. This surface's external contract reports every
/// failure as HTTP 500 with the envelope, so errors are mapped here rather
/// than through `ResponseError`.
pub async fn upload_object(body: web::Bytes, data: web::Data<AppState>) -> HttpResponse {
    match store_upload(&body, &data).await {
        Ok(url) => HttpResponse::Ok().json(serde_json::json!({ "url": url })),
        Err(err) => {
            log::warn!("upload rejected: {}", err);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": { "code": err.code(), "message": err.to_string() }
            }))
        }
    }
}

async fn store_upload(bytes: &[u8], data: &AppState) -> Result<String, EaselError> {
    if bytes.is_empty() {
        return Err(EaselError::EmptyPayload);
    }
    let store = data.store.as_ref().ok_or_else(|| {
        EaselError::StorageUnavailable("no object store is configured".to_string())
    })?;
    store.put(bytes).await
}

pub async fn generate_preflight() -> HttpResponse {
    HttpResponse::NoContent()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"))
        .insert_header((
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            "Content-Type, x-goog-api-key, x-modelscope-key",
        ))
        .insert_header((
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            "X-Image-Width, X-Image-Height",
        ))
        .insert_header((header::ACCESS_CONTROL_MAX_AGE, "86400"))
        .finish()
}

pub async fn upload_preflight() -> HttpResponse {
    HttpResponse::NoContent()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"))
        .insert_header((header::ACCESS_CONTROL_MAX_AGE, "86400"))
        .finish()
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "easel",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use actix_web::{App, test};
    use base64::{Engine as _, engine::general_purpose};
    use serde_json::json;
    use wiremock::matchers::{header as wm_header, method, path as wm_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct TestHarness {
        upstream: MockServer,
        state: AppState,
        // Held so the object store directory survives the test body.
        _objects: tempfile::TempDir,
    }

    async fn harness() -> TestHarness {
        let upstream = MockServer::start().await;
        let objects = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            gemini_base_url: upstream.uri(),
            modelscope_base_url: upstream.uri(),
            gemini_api_key: None,
            modelscope_api_key: None,
            object_store_dir: Some(objects.path().to_path_buf()),
            public_base_url: "http://localhost:8080/objects".to_string(),
        };
        TestHarness {
            upstream,
            state: AppState::from_config(&config).unwrap(),
            _objects: objects,
        }
    }

    fn generate_body(prompt: &str) -> serde_json::Value {
        json!({
            "prompt": prompt,
            "aspectRatio": "1:1",
            "quality": "1K",
        })
    }

    async fn error_code(resp: actix_web::dev::ServiceResponse) -> (u16, String) {
        let status = resp.status().as_u16();
        let body: serde_json::Value = test::read_body_json(resp).await;
        (status, body["error"]["code"].as_str().unwrap_or("").to_string())
    }

    #[actix_web::test]
    async fn empty_prompt_is_rejected_before_any_upstream_call() {
        let h = harness().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(h.state.clone()))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/generate/gemini")
            .insert_header(("x-goog-api-key", "k"))
            .set_json(generate_body(""))
            .to_request();
        let resp = test::call_service(&app, req).await;

        let (status, code) = error_code(resp).await;
        assert_eq!(status, 400);
        assert_eq!(code, "INVALID_INPUT");
        assert!(h.upstream.received_requests().await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn unsupported_pair_is_rejected_before_any_upstream_call() {
        let h = harness().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(h.state.clone()))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/generate/modelscope")
            .insert_header(("x-modelscope-key", "k"))
            .set_json(json!({
                "prompt": "a red cube",
                "aspectRatio": "21:9",
                "quality": "4K",
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        let (status, code) = error_code(resp).await;
        assert_eq!(status, 400);
        assert_eq!(code, "UNSUPPORTED_DIMENSION");
        assert!(h.upstream.received_requests().await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn missing_credential_asks_for_a_key() {
        let h = harness().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(h.state.clone()))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/generate/gemini")
            .set_json(generate_body("a red cube"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        let (status, code) = error_code(resp).await;
        assert_eq!(status, 401);
        assert_eq!(code, "CREDENTIAL_MISSING");
    }

    #[actix_web::test]
    async fn unknown_provider_is_invalid_input() {
        let h = harness().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(h.state.clone()))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/generate/dalle")
            .set_json(generate_body("a red cube"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        let (status, code) = error_code(resp).await;
        assert_eq!(status, 400);
        assert_eq!(code, "INVALID_INPUT");
    }

    #[actix_web::test]
    async fn red_cube_end_to_end_returns_binary_png_with_dimension_headers() {
        let h = harness().await;
        let image_bytes = b"binary png payload".to_vec();
        Mock::given(method("POST"))
            .and(wm_path("/models/gemini-3-pro-image:generateContent"))
            .and(wm_header("x-goog-api-key", "client-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {
                        "parts": [{
                            "inlineData": {
                                "mimeType": "image/png",
                                "data": general_purpose::STANDARD.encode(&image_bytes),
                            }
                        }]
                    }
                }]
            })))
            .expect(1)
            .mount(&h.upstream)
            .await;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(h.state.clone()))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/generate/gemini")
            .insert_header(("x-goog-api-key", "client-key"))
            .set_json(generate_body("a red cube"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status().as_u16(), 200);
        let headers = resp.headers().clone();
        assert_eq!(headers.get("content-type").unwrap(), "image/png");
        let width: u32 = headers
            .get("X-Image-Width")
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        let height: u32 = headers
            .get("X-Image-Height")
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!((width, height), (1024, 1024));
        assert_eq!(
            headers.get("Access-Control-Allow-Origin").unwrap(),
            "*"
        );

        // The body is the raw bytes, not JSON-wrapped base64.
        let body = test::read_body(resp).await;
        assert_eq!(body.as_ref(), image_bytes.as_slice());
    }

    #[actix_web::test]
    async fn upstream_rejection_becomes_an_error_envelope_with_cors() {
        let h = harness().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&h.upstream)
            .await;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(h.state.clone()))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/generate/gemini")
            .insert_header(("x-goog-api-key", "k"))
            .set_json(generate_body("a red cube"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(
            resp.headers().get("Access-Control-Allow-Origin").unwrap(),
            "*"
        );
        let (status, code) = error_code(resp).await;
        assert_eq!(status, 429);
        assert_eq!(code, "RATE_LIMITED");
    }

    #[actix_web::test]
    async fn preflight_lists_both_credential_headers() {
        let h = harness().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(h.state.clone()))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::with_uri("/api/v1/generate/gemini")
            .method(Method::OPTIONS)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status().as_u16(), 204);
        let allow = resp
            .headers()
            .get("Access-Control-Allow-Headers")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(allow.contains("x-goog-api-key"));
        assert!(allow.contains("x-modelscope-key"));
    }

    #[actix_web::test]
    async fn empty_upload_body_is_a_500_envelope() {
        let h = harness().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(h.state.clone()))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/upload")
            .insert_header(("content-type", "image/png"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status().as_u16(), 500);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["message"], "Empty upload body.");
        assert_eq!(body["error"]["code"], "EMPTY_PAYLOAD");
    }

    #[actix_web::test]
    async fn upload_stores_the_object_and_returns_its_url() {
        let h = harness().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(h.state.clone()))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/upload")
            .insert_header(("content-type", "image/png"))
            .set_payload(b"png bytes".to_vec())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status().as_u16(), 200);
        let body: serde_json::Value = test::read_body_json(resp).await;
        let url = body["url"].as_str().unwrap();
        assert!(url.starts_with("http://localhost:8080/objects/"));

        let key = url.rsplit('/').next().unwrap();
        let stored = std::fs::read(h._objects.path().join(key)).unwrap();
        assert_eq!(stored, b"png bytes");
    }

    #[actix_web::test]
    async fn upload_without_a_store_degrades_to_storage_unavailable() {
        let h = harness().await;
        let mut state = h.state.clone();
        state.store = None;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/upload")
            .set_payload(b"png bytes".to_vec())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status().as_u16(), 500);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "STORAGE_UNAVAILABLE");
    }

    #[actix_web::test]
    async fn server_fallback_key_is_used_when_no_header_is_sent() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(wm_header("x-goog-api-key", "server-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {
                        "parts": [{ "inlineData": { "data": "aGk=" } }]
                    }
                }]
            })))
            .expect(1)
            .mount(&upstream)
            .await;

        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            gemini_base_url: upstream.uri(),
            modelscope_base_url: upstream.uri(),
            gemini_api_key: Some("server-key".to_string()),
            modelscope_api_key: None,
            object_store_dir: None,
            public_base_url: "http://localhost:8080/objects".to_string(),
        };
        let state = AppState::from_config(&config).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/generate/gemini")
            .set_json(generate_body("a red cube"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 200);
    }
}
