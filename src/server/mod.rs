use crate::{
    auth::admin_auth_middleware,
    cache::{Cache, MemoryCache},
    config::Config,
    database::{DatabaseManager, DatabaseManagerImpl},
    deletion::DeletionService,
    email,
    error::AppError,
    rate_limit::{RateLimitService, rate_limit_middleware},
    routes::{
        create_account_routes, create_admin_logs_routes, create_deletion_routes,
        create_docs_routes, create_health_routes,
    },
};
use axum::{Router, middleware};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone)]
pub struct Server {
    pub config: Arc<Config>,
    pub database: Arc<dyn DatabaseManager>,
    pub cache: Arc<dyn Cache>,
    pub deletion_service: Arc<DeletionService>,
    pub rate_limiter: Arc<RateLimitService>,
}

impl Server {
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());

        let database: Arc<dyn DatabaseManager> =
            Arc::new(DatabaseManagerImpl::new_from_config(&config).await?);

        let email_gateway = email::create_gateway(&config.email)
            .map_err(|e| AppError::Internal(format!("email gateway: {e}")))?;

        let deletion_service = Arc::new(DeletionService::new(
            config.clone(),
            cache.clone(),
            email_gateway,
            database.clone(),
        )?);

        let rate_limiter = Arc::new(RateLimitService::new(&config.rate_limit));

        Ok(Self {
            config: Arc::new(config),
            database,
            cache,
            deletion_service,
            rate_limiter,
        })
    }

    pub async fn run(&self) -> Result<(), AppError> {
        self.database.migrate().await?;

        let app = self.create_app();

        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port)
            .parse()
            .map_err(|e| AppError::Internal(format!("invalid listen address: {e}")))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to bind to address: {e}")))?;

        info!("Server listening on http://{addr}");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {e}")))?;

        info!("Server shutdown complete");
        Ok(())
    }

    /// Creates the application router
    pub fn create_app(&self) -> Router {
        Router::new()
            .nest("/deletion", create_deletion_routes())
            .nest("/api", self.account_routes())
            .nest("/api", self.admin_routes())
            .nest("/api", create_docs_routes())
            .nest("/health", create_health_routes())
            .with_state(self.clone())
    }

    /// Token deletion API, behind the per-IP rate limiter
    fn account_routes(&self) -> Router<Server> {
        create_account_routes().layer(middleware::from_fn_with_state(
            self.clone(),
            rate_limit_middleware,
        ))
    }

    /// Admin log API, behind the static admin key
    fn admin_routes(&self) -> Router<Server> {
        create_admin_logs_routes().layer(middleware::from_fn_with_state(
            self.clone(),
            admin_auth_middleware,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestServerBuilder;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_endpoint() {
        let server = TestServerBuilder::new().build().await;
        let app = server.create_app();

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_openapi_document_served() {
        let server = TestServerBuilder::new().build().await;
        let app = server.create_app();

        let request = Request::builder()
            .uri("/api/docs/openapi.json")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_routes_require_key() {
        let server = TestServerBuilder::new().build().await;
        let app = server.create_app();

        let request = Request::builder()
            .uri("/api/admin/logs")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
