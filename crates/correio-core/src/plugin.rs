//! Plugin system for composing the Correio application.
//!
//! Each feature crate exposes a [`CorreioPlugin`] that registers its services,
//! contributes routes under `/api`, and optionally installs middleware. The
//! [`PluginManager`] wires plugins together in registration order, which is
//! also the dependency order: a plugin may only require services registered
//! by plugins before it.

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response, Router};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, error, info};
use utoipa::openapi::info::{ContactBuilder, InfoBuilder};
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::openapi::server::ServerBuilder;
use utoipa::openapi::{Components, ComponentsBuilder, OpenApi, OpenApiBuilder};

/// Middleware execution priority. Lower values run earlier in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiddlewarePriority {
    /// Authentication, authorization (runs first)
    Security,
    /// Logging, tracing, metrics
    Observability,
    /// Request/response transformation
    Transform,
    /// Caching, compression
    Performance,
    /// Application-specific middleware (default)
    Business,
    /// Explicit numeric priority
    Custom(u16),
}

impl MiddlewarePriority {
    pub fn value(&self) -> u16 {
        match self {
            MiddlewarePriority::Security => 0,
            MiddlewarePriority::Observability => 100,
            MiddlewarePriority::Transform => 200,
            MiddlewarePriority::Performance => 300,
            MiddlewarePriority::Business => 400,
            MiddlewarePriority::Custom(value) => *value,
        }
    }
}

/// Predicate deciding whether a middleware runs for a given request.
#[derive(Clone)]
pub enum MiddlewareCondition {
    /// Run for every request
    Always,
    /// Run when the request path contains the given fragment
    PathMatches(String),
    /// Arbitrary predicate over the request
    Custom(Arc<dyn Fn(&Request) -> bool + Send + Sync>),
}

impl MiddlewareCondition {
    pub fn matches(&self, request: &Request) -> bool {
        match self {
            MiddlewareCondition::Always => true,
            MiddlewareCondition::PathMatches(fragment) => {
                request.uri().path().contains(fragment.as_str())
            }
            MiddlewareCondition::Custom(predicate) => predicate(request),
        }
    }
}

impl std::fmt::Debug for MiddlewareCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MiddlewareCondition::Always => write!(f, "Always"),
            MiddlewareCondition::PathMatches(fragment) => write!(f, "PathMatches({})", fragment),
            MiddlewareCondition::Custom(_) => write!(f, "Custom(<predicate>)"),
        }
    }
}

/// Boxed middleware function compatible with `axum::middleware::from_fn`.
pub type MiddlewareHandler = Arc<
    dyn Fn(Request, Next) -> Pin<Box<dyn Future<Output = Result<Response, StatusCode>> + Send>>
        + Send
        + Sync,
>;

/// A middleware registered by a plugin, with ordering metadata.
pub struct PluginMiddleware {
    pub name: String,
    pub plugin_name: String,
    pub priority: MiddlewarePriority,
    pub condition: MiddlewareCondition,
    pub handler: MiddlewareHandler,
}

impl std::fmt::Debug for PluginMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginMiddleware")
            .field("name", &self.name)
            .field("plugin_name", &self.plugin_name)
            .field("priority", &self.priority)
            .field("condition", &self.condition)
            .field("handler", &"<function>")
            .finish()
    }
}

/// Trait-based middleware for plugins that need state.
pub trait CorreioMiddleware: Send + Sync {
    fn name(&self) -> &str;

    fn plugin_name(&self) -> &str;

    fn priority(&self) -> MiddlewarePriority {
        MiddlewarePriority::Business
    }

    fn condition(&self) -> MiddlewareCondition {
        MiddlewareCondition::Always
    }

    fn execute<'a>(
        &'a self,
        request: Request,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = Result<Response, StatusCode>> + Send + 'a>>;
}

/// Adapts a [`CorreioMiddleware`] into the function form the router consumes.
pub struct CorreioMiddlewareWrapper {
    inner: Arc<dyn CorreioMiddleware>,
}

impl CorreioMiddlewareWrapper {
    pub fn new(inner: Arc<dyn CorreioMiddleware>) -> Self {
        Self { inner }
    }

    pub fn into_plugin_middleware(self) -> PluginMiddleware {
        let name = self.inner.name().to_string();
        let plugin_name = self.inner.plugin_name().to_string();
        let priority = self.inner.priority();
        let condition = self.inner.condition();
        let inner = self.inner;

        PluginMiddleware {
            name,
            plugin_name,
            priority,
            condition,
            handler: Arc::new(move |request, next| {
                let middleware = inner.clone();
                Box::pin(async move { middleware.execute(request, next).await })
            }),
        }
    }
}

/// Middlewares contributed by a single plugin.
#[derive(Debug, Default)]
pub struct PluginMiddlewareCollection {
    pub middlewares: Vec<PluginMiddleware>,
}

impl PluginMiddlewareCollection {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    pub fn add_middleware(&mut self, middleware: PluginMiddleware) {
        self.middlewares.push(middleware);
    }

    pub fn add_correio_middleware(&mut self, middleware: Arc<dyn CorreioMiddleware>) {
        self.add_middleware(CorreioMiddlewareWrapper::new(middleware).into_plugin_middleware());
    }
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Plugin registration failed for '{plugin_name}': {error}")]
    PluginRegistrationFailed { plugin_name: String, error: String },

    #[error("Service not found: {service_type}")]
    ServiceNotFound { service_type: String },

    #[error("Plugin initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Failed to merge OpenAPI schemas: {0}")]
    OpenApiMergeFailed(String),
}

/// Routes contributed by a plugin. Mounted under `/api`.
pub struct PluginRoutes {
    pub router: Router,
}

/// A self-contained feature of the application.
pub trait CorreioPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Resolve dependencies and register the services this plugin provides.
    /// Called once per plugin, in registration order.
    fn register_services<'a>(
        &'a self,
        context: &'a ServiceRegistrationContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>>;

    fn configure_routes(&self, _context: &PluginContext) -> Option<PluginRoutes> {
        None
    }

    fn openapi_schema(&self) -> Option<OpenApi> {
        None
    }

    fn configure_middleware(&self, _context: &PluginContext) -> Option<PluginMiddlewareCollection> {
        None
    }
}

/// Type-indexed service container shared by all plugins.
///
/// Services are stored as `Arc<T>` keyed by the `Arc`'s type id, so both
/// concrete types and trait objects (`Arc<dyn Trait>`) can be registered.
pub struct ServiceRegistry {
    services: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: Mutex::new(HashMap::new()),
        }
    }

    pub fn register<T: ?Sized + Send + Sync + 'static>(&self, service: Arc<T>) {
        let mut services = self.services.lock().unwrap();
        services.insert(TypeId::of::<Arc<T>>(), Box::new(service));
    }

    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let services = self.services.lock().unwrap();
        services
            .get(&TypeId::of::<Arc<T>>())
            .and_then(|service| service.downcast_ref::<Arc<T>>())
            .cloned()
    }

    /// Like [`get`](Self::get) but panics when the service is missing.
    /// Missing services are a wiring bug, not a runtime condition.
    pub fn require<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        self.get::<T>().unwrap_or_else(|| {
            panic!(
                "Service '{}' is required but not registered. Check plugin registration order.",
                std::any::type_name::<T>()
            )
        })
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the service registry handed to route and middleware
/// configuration.
#[derive(Clone)]
pub struct PluginContext {
    registry: Arc<ServiceRegistry>,
}

impl PluginContext {
    pub fn get_service<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.registry.get::<T>()
    }

    pub fn require_service<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        self.registry.require::<T>()
    }
}

/// Registry view handed to `register_services`, allowing writes.
#[derive(Clone)]
pub struct ServiceRegistrationContext {
    registry: Arc<ServiceRegistry>,
}

impl ServiceRegistrationContext {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(ServiceRegistry::new()),
        }
    }

    pub fn register_service<T: ?Sized + Send + Sync + 'static>(&self, service: Arc<T>) {
        self.registry.register(service);
    }

    pub fn get_service<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.registry.get::<T>()
    }

    pub fn require_service<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        self.registry.require::<T>()
    }

    pub fn create_plugin_context(&self) -> PluginContext {
        PluginContext {
            registry: self.registry.clone(),
        }
    }
}

impl Default for ServiceRegistrationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the registered plugins and assembles the final application.
pub struct PluginManager {
    plugins: Vec<Box<dyn CorreioPlugin>>,
    context: ServiceRegistrationContext,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            context: ServiceRegistrationContext::new(),
        }
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn CorreioPlugin>) {
        debug!("Registered plugin '{}'", plugin.name());
        self.plugins.push(plugin);
    }

    pub fn service_context(&self) -> &ServiceRegistrationContext {
        &self.context
    }

    /// Run `register_services` for every plugin, in registration order.
    pub async fn initialize_plugins(&self) -> Result<(), PluginError> {
        for plugin in &self.plugins {
            info!("Initializing plugin '{}'", plugin.name());
            plugin.register_services(&self.context).await.map_err(|e| {
                error!("Failed to initialize plugin '{}': {}", plugin.name(), e);
                PluginError::PluginRegistrationFailed {
                    plugin_name: plugin.name().to_string(),
                    error: e.to_string(),
                }
            })?;
        }
        Ok(())
    }

    /// Merge plugin routers and middleware into the application router.
    /// All plugin routes are nested under `/api`.
    pub fn build_application(&self) -> Result<Router, PluginError> {
        let plugin_context = self.context.create_plugin_context();

        let mut api_router = Router::new();
        for plugin in &self.plugins {
            if let Some(routes) = plugin.configure_routes(&plugin_context) {
                debug!("Mounting routes for plugin '{}'", plugin.name());
                api_router = api_router.merge(routes.router);
            }
        }

        let mut middlewares = Vec::new();
        for plugin in &self.plugins {
            if let Some(collection) = plugin.configure_middleware(&plugin_context) {
                middlewares.extend(collection.middlewares);
            }
        }
        middlewares.sort_by_key(|middleware| middleware.priority.value());

        // axum runs the last layer added first, so apply in reverse to keep
        // Security middleware outermost.
        for middleware in middlewares.into_iter().rev() {
            debug!(
                "Applying middleware '{}' from plugin '{}'",
                middleware.name, middleware.plugin_name
            );
            let handler = middleware.handler.clone();
            let condition = middleware.condition.clone();
            api_router = api_router.layer(axum::middleware::from_fn(
                move |request: Request, next: Next| {
                    let handler = handler.clone();
                    let condition = condition.clone();
                    async move {
                        if condition.matches(&request) {
                            handler(request, next).await
                        } else {
                            Ok(next.run(request).await)
                        }
                    }
                },
            ));
        }

        Ok(Router::new().nest("/api", api_router))
    }

    /// Merge every plugin's OpenAPI document into one schema served to
    /// Swagger UI.
    pub fn get_unified_openapi(&self) -> Result<OpenApi, PluginError> {
        let mut merged = OpenApiBuilder::new()
            .info(
                InfoBuilder::new()
                    .title("Correio API")
                    .description(Some(
                        "Transactional email pipeline: dispatch, delivery tracking and resend",
                    ))
                    .version(env!("CARGO_PKG_VERSION"))
                    .contact(Some(
                        ContactBuilder::new()
                            .name(Some("Correio"))
                            .url(Some("https://github.com/correio-dev/correio"))
                            .build(),
                    ))
                    .build(),
            )
            .servers(Some(vec![ServerBuilder::new()
                .url("/api")
                .description(Some("Correio API server"))
                .build()]))
            .components(Some(
                ComponentsBuilder::new()
                    .security_scheme("session_cookie", Self::create_session_auth_scheme())
                    .build(),
            ))
            .build();

        for plugin in &self.plugins {
            if let Some(schema) = plugin.openapi_schema() {
                Self::merge_openapi_schemas(&mut merged, schema);
            }
        }

        Ok(merged)
    }

    fn merge_openapi_schemas(merged: &mut OpenApi, schema: OpenApi) {
        for (path, item) in schema.paths.paths {
            merged.paths.paths.insert(path, item);
        }

        if let Some(components) = schema.components {
            let merged_components = merged.components.get_or_insert_with(Components::default);
            merged_components.schemas.extend(components.schemas);
            merged_components.responses.extend(components.responses);
        }

        if let Some(tags) = schema.tags {
            merged.tags.get_or_insert_with(Vec::new).extend(tags);
        }
    }

    /// Authentication is session based; the cookie carries the encrypted
    /// session token.
    fn create_session_auth_scheme() -> SecurityScheme {
        SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("_correio_sid")))
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_priority_ordering() {
        assert!(MiddlewarePriority::Security.value() < MiddlewarePriority::Observability.value());
        assert!(MiddlewarePriority::Business.value() > MiddlewarePriority::Transform.value());
        assert_eq!(MiddlewarePriority::Custom(42).value(), 42);
    }

    #[test]
    fn test_condition_path_matches() {
        let request = Request::builder()
            .uri("/api/webhooks/email")
            .body(Body::empty())
            .unwrap();
        assert!(MiddlewareCondition::PathMatches("/webhooks".to_string()).matches(&request));
        assert!(!MiddlewareCondition::PathMatches("/emails".to_string()).matches(&request));
        assert!(MiddlewareCondition::Always.matches(&request));
    }

    #[test]
    fn test_service_registry_roundtrip() {
        let registry = ServiceRegistry::new();
        registry.register(Arc::new(42u32));
        assert_eq!(*registry.require::<u32>(), 42);
        assert!(registry.get::<String>().is_none());
    }

    #[test]
    #[should_panic(expected = "is required but not registered")]
    fn test_service_registry_require_missing_panics() {
        let registry = ServiceRegistry::new();
        registry.require::<String>();
    }
}
