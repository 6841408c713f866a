use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;

use crate::auth::AuthService;
use crate::configuration::ApplicationSettings;
use crate::logger::LoggerMiddleware;
use crate::repository::UserRepository;
use crate::routes::{health_check, login, refresh};

pub fn run<R: UserRepository + 'static>(
    listener: TcpListener,
    service: AuthService<R>,
    settings: ApplicationSettings,
) -> Result<Server, std::io::Error> {
    let service = web::Data::new(service);
    let settings = web::Data::new(settings);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            // Shared state
            .app_data(service.clone())
            .app_data(settings.clone())
            .route("/health_check", web::get().to(health_check))
            .route("/auth/login", web::post().to(login::<R>))
            .route("/auth/refresh", web::post().to(refresh::<R>))
    })
    .listen(listener)?
    .run();

    Ok(server)
}
