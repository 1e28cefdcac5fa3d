//! Server construction and middleware wiring.

use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use mockable::Clock;
use tracing::info;
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[cfg(debug_assertions)]
use crate::doc::ApiDoc;
use crate::domain::ports::CommitStore;
use crate::domain::{CommitInterceptor, NoteService};
use crate::inbound::http::health::{HealthState, live, ready};
use crate::inbound::http::notes::{create_note, get_note, update_note};
use crate::inbound::http::state::HttpState;
use crate::middleware::Trace;

/// Shared state handed to every worker's [`App`].
#[derive(Clone)]
pub struct AppDependencies {
    pub health_state: web::Data<HealthState>,
    pub http_state: web::Data<HttpState>,
}

/// Wire the note ports to a store through a commit interceptor.
pub fn build_http_state<S>(store: Arc<S>, clock: Arc<dyn Clock>) -> web::Data<HttpState>
where
    S: CommitStore + 'static,
{
    let service = Arc::new(NoteService::new(CommitInterceptor::new(store, clock)));
    web::Data::new(HttpState::new(service.clone(), service))
}

/// Assemble the application: trace middleware, health probes, the notes API
/// under `/api/v1`, and Swagger UI in debug builds.
pub fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        health_state,
        http_state,
    } = deps;

    let api = web::scope("/api/v1")
        .service(create_note)
        .service(get_note)
        .service(update_note);

    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .wrap(Trace)
        .service(api)
        .service(ready)
        .service(live);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    app
}

/// Bind an Actix HTTP server and mark the service ready.
///
/// # Errors
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(deps: AppDependencies, bind_addr: SocketAddr) -> std::io::Result<Server> {
    let health_state = deps.health_state.clone();
    let server = HttpServer::new(move || build_app(deps.clone()))
        .bind(bind_addr)?
        .run();

    health_state.mark_ready();
    info!(%bind_addr, "server listening");
    Ok(server)
}
