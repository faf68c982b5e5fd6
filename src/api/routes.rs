// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::root))
        .route("/health", web::get().to(handlers::health_check))
        .route("/status", web::get().to(handlers::status))
        .service(
            web::scope("/countries")
                .route("", web::get().to(handlers::list_countries))
                .route("", web::post().to(handlers::create_country))
                .route("/refresh", web::post().to(handlers::refresh_countries))
                // Must stay ahead of `/{name}`.
                .route("/image", web::get().to(handlers::summary_image))
                .route("/{name}", web::get().to(handlers::get_country))
                .route("/{name}", web::delete().to(handlers::delete_country)),
        );
}
