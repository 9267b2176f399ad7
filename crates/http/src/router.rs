//! Router builder for the bookshelf HTTP server
//!
//! Axum layers only wrap routes registered before them, so routes go in
//! first and the `with_*` middleware calls come last.

use anyhow::{bail, Context};
use axum::{
    http::{header, HeaderValue, Method, Request},
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use uuid::{Timestamp, Uuid};

use bookshelf_kernel::{settings::CorsSettings, ModuleRegistry};

use crate::health::{self, SharedProbe};
use crate::metrics::{self, HttpMetrics};

/// Builder for constructing the main HTTP router
pub struct RouterBuilder {
    router: Router,
}

impl RouterBuilder {
    /// Create a new router builder
    pub fn new() -> Self {
        Self {
            router: Router::new(),
        }
    }

    /// Add a route to the router
    pub fn route(mut self, path: &str, route: axum::routing::MethodRouter) -> Self {
        self.router = self.router.route(path, route);
        self
    }

    /// Merge a module's router at the root
    pub fn mount_module(mut self, module_name: &str, module_router: Router) -> Self {
        tracing::info!(module = module_name, "mounting module routes");
        self.router = self.router.merge(module_router);
        self
    }

    /// Add `/livez`, `/readyz` and `/health`
    pub fn with_health(mut self, probe: SharedProbe) -> Self {
        self.router = self.router.merge(health::routes(probe));
        self
    }

    /// Add the `/metrics` scrape endpoint
    pub fn with_metrics_endpoint(mut self, metrics: HttpMetrics) -> Self {
        self.router = self.router.merge(
            Router::new()
                .route("/metrics", get(metrics::metrics_handler))
                .with_state(metrics),
        );
        self
    }

    /// Count every request passing through the routes registered so far
    pub fn with_request_metrics(mut self, metrics: HttpMetrics) -> Self {
        self.router = self.router.layer(middleware::from_fn_with_state(
            metrics,
            metrics::track_requests,
        ));
        self
    }

    /// Add tracing middleware
    pub fn with_tracing(mut self) -> Self {
        self.router = self.router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        );
        self
    }

    /// Add CORS middleware restricted to the configured origins
    pub fn with_cors(mut self, settings: &CorsSettings) -> anyhow::Result<Self> {
        self.router = self.router.layer(cors_layer(settings)?);
        Ok(self)
    }

    /// Add request ID middleware
    pub fn with_request_id(mut self) -> Self {
        self.router = self
            .router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7));
        self
    }

    /// Serve the merged OpenAPI document collected from all modules
    pub fn with_openapi(mut self, registry: &ModuleRegistry) -> Self {
        let openapi_spec = openapi_document(registry);

        self.router = self.router.route(
            "/docs/openapi.json",
            get(move || async move { axum::Json(openapi_spec.clone()) }),
        );

        self
    }

    /// Build the final router
    pub fn build(self) -> Router {
        self.router
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn cors_layer(settings: &CorsSettings) -> anyhow::Result<CorsLayer> {
    let wildcard = settings.allowed_origins.iter().any(|origin| origin == "*");

    let allow_origin = if wildcard {
        if settings.allow_credentials {
            bail!("wildcard CORS origin cannot be combined with credentials");
        }
        AllowOrigin::any()
    } else {
        let origins = settings
            .allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .with_context(|| format!("invalid CORS origin '{}'", origin))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(settings.allow_credentials))
}

fn openapi_document(registry: &ModuleRegistry) -> serde_json::Value {
    let plain_text = |description: &str| {
        serde_json::json!({
            "description": description,
            "content": { "text/plain": { "schema": { "type": "string" } } }
        })
    };

    let mut openapi_spec = serde_json::json!({
        "openapi": "3.0.0",
        "info": {
            "title": "Bookshelf API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Book record service"
        },
        "paths": {},
        "components": {
            "schemas": {
                "ErrorResponse": {
                    "type": "object",
                    "properties": { "error": { "type": "string" } },
                    "required": ["error"]
                }
            }
        }
    });

    openapi_spec["paths"]["/livez"] = serde_json::json!({
        "get": {
            "summary": "Liveness probe",
            "responses": { "200": plain_text("OK") }
        }
    });
    for (path, summary) in [("/readyz", "Readiness probe"), ("/health", "Combined health probe")] {
        openapi_spec["paths"][path] = serde_json::json!({
            "get": {
                "summary": summary,
                "responses": {
                    "200": plain_text("OK"),
                    "500": plain_text("DB error")
                }
            }
        });
    }
    openapi_spec["paths"]["/metrics"] = serde_json::json!({
        "get": {
            "summary": "Prometheus metrics",
            "responses": { "200": plain_text("Text exposition format") }
        }
    });

    for module in registry.modules() {
        let Some(module_spec) = module.openapi() else {
            continue;
        };

        if let Some(paths) = module_spec.get("paths").and_then(|p| p.as_object()) {
            for (path, path_item) in paths {
                openapi_spec["paths"][path] = path_item.clone();
            }
        }

        if let Some(schemas) = module_spec
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(|s| s.as_object())
        {
            for (schema_name, schema_def) in schemas {
                openapi_spec["components"]["schemas"][schema_name] = schema_def.clone();
            }
        }
    }

    openapi_spec
}

/// Request ID generator for tracing
#[derive(Clone)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let timestamp = Timestamp::now(uuid::NoContext);
        let request_id = Uuid::new_v7(timestamp)
            .to_string()
            .parse::<HeaderValue>()
            .ok()?;
        Some(RequestId::new(request_id))
    }
}
