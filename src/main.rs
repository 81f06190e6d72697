// src/main.rs
use actix_web::{App, HttpServer, middleware, web};
use log::info;

use easel::{AppState, config::ServerConfig, handlers};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = ServerConfig::from_env();
    info!("Starting easel relay on {}", config.bind_addr);

    let state = AppState::from_config(&config).expect("failed to initialize easel");
    let objects_dir = state.store.as_ref().map(|s| s.root().to_path_buf());

    HttpServer::new(move || {
        let mut app = App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .configure(handlers::routes);

        // Public mount for stored objects; keys are immutable, so clients
        // may cache them forever.
        if let Some(dir) = &objects_dir {
            app = app.service(
                web::scope("/objects")
                    .wrap(
                        middleware::DefaultHeaders::new()
                            .add(("Cache-Control", "public, max-age=31536000, immutable"))
                            .add(("Access-Control-Allow-Origin", "*")),
                    )
                    .service(actix_files::Files::new("/", dir)),
            );
        }
        app
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
