use std::net::TcpListener;

use authgate::auth::AuthService;
use authgate::configuration::get_configuration;
use authgate::repository::PgUserRepository;
use authgate::startup::run;
use authgate::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;

fn startup_error(kind: std::io::ErrorKind, message: &'static str) -> std::io::Error {
    std::io::Error::new(kind, message)
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("info");

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to read configuration");
            return Err(startup_error(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    if let Err(e) = configuration.jwt.validate() {
        tracing::error!(error = %e, "Invalid JWT configuration");
        return Err(startup_error(
            std::io::ErrorKind::InvalidInput,
            "Configuration error",
        ));
    }
    tracing::info!(jwt = ?configuration.jwt, "JWT settings validated");

    tracing::info!("Attempting to connect to database");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create connection pool");
            startup_error(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;
    tracing::info!("Database connection pool created successfully");

    let service = AuthService::new(PgUserRepository::new(pool), configuration.jwt.clone());

    let address = configuration.application.address();
    let listener = TcpListener::bind(&address)?;
    tracing::info!(address = %address, "Server listening");

    let server = run(listener, service, configuration.application.clone())?;
    server.await
}
