//! Dog request service
//!
//! Built once from an opened database; answers intercepted requests for the
//! dog routes and declines everything else.

use http::Method;
use kennel_core::open_db;
use kennel_core::storage::{Database, Factory};
use tracing::{debug, info, warn};

use super::controller::DogController;
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::request::{error_response, html_response, text_response, Request, Response};
use crate::router::{RouteMatch, Router};

/// Greeting returned by `GET /hello`.
pub const HELLO: &str = "Hello from service worker!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DogRoute {
    Hello,
    List,
    Add,
    UpdateSnoopy,
    Delete,
}

/// The dog route table.
pub fn routes() -> Router<DogRoute> {
    let mut router = Router::new();
    router
        .get("/hello", DogRoute::Hello)
        .get("/dog", DogRoute::List)
        .post("/dog", DogRoute::Add)
        .put("/dog", DogRoute::UpdateSnoopy)
        .delete("/dog/:id", DogRoute::Delete);
    router
}

#[derive(Debug)]
pub struct DogService<D: Database> {
    controller: DogController<D>,
    router: Router<DogRoute>,
    config: AppConfig,
}

impl<D: Database> DogService<D> {
    pub fn new(db: D, config: AppConfig) -> Self {
        Self {
            controller: DogController::new(db),
            router: routes(),
            config,
        }
    }

    pub fn controller(&self) -> &DogController<D> {
        &self.controller
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Whether a dog route handles `method` and `path`.
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.router.match_route(method, path).is_some()
    }

    /// Answer `request`, or `None` when no dog route matches it.
    ///
    /// Handler failures become error responses: `400` for a bad `:id`, `500`
    /// for record store failures.
    pub async fn handle(&self, request: &Request) -> Option<Response> {
        let matched = self.router.match_route(&request.method, &request.path)?;
        let route = *matched.handler;
        debug!(method = %request.method, path = %request.path, ?route, "dispatching");

        let response = match self.dispatch(route, &matched, request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(method = %request.method, path = %request.path, error = %err, "request failed");
                error_response(err.status(), err.to_string())
            }
        };
        Some(response)
    }

    async fn dispatch(
        &self,
        route: DogRoute,
        matched: &RouteMatch<'_, DogRoute>,
        request: &Request,
    ) -> Result<Response> {
        match route {
            DogRoute::Hello => Ok(text_response(HELLO)),
            DogRoute::List => self.controller.get_dogs().await.map(html_response),
            DogRoute::Add => self.controller.add_dog(&request.form).await.map(html_response),
            DogRoute::UpdateSnoopy => self.controller.update_snoopy().await.map(html_response),
            DogRoute::Delete => {
                let id = parse_id(matched.param("id"))?;
                self.controller.delete_dog(id).await.map(html_response)
            }
        }
    }
}

fn parse_id(raw: Option<&str>) -> Result<i64> {
    let raw = raw.unwrap_or_default();
    raw.parse::<i64>()
        .map_err(|_| AppError::InvalidId(raw.to_string()))
}

/// Open the configured database, migrating it with the dogs schema, and build
/// the service around it.
pub async fn start<F: Factory>(factory: &F, config: AppConfig) -> Result<DogService<F::Database>> {
    config.validate()?;
    let policy = config.migration;

    let db = open_db(factory, &config.db_name, config.db_version, move |db, txn, change| {
        DogController::upgrade(db, txn, change, policy)
    })
    .await?;

    info!(
        db = %config.db_name,
        version = db.version(),
        %policy,
        "dog service ready"
    );
    Ok(DogService::new(db, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id(Some("12")).unwrap(), 12);
        assert!(matches!(parse_id(Some("abc")), Err(AppError::InvalidId(_))));
        assert!(matches!(parse_id(Some("1.5")), Err(AppError::InvalidId(_))));
    }

    #[test]
    fn test_route_table() {
        let router = routes();
        let listed: Vec<_> = router.routes().map(|(m, p)| format!("{} {}", m, p)).collect();
        assert_eq!(
            listed,
            vec!["GET /hello", "GET /dog", "POST /dog", "PUT /dog", "DELETE /dog/:id"]
        );
    }
}
