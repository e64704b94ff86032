//! # Image Server - Entry Point
//! src/main.rs
//!
//! Punto de entrada del servidor de filtros de imágenes.
//!
//! La configuración viene de argumentos CLI o variables de entorno, y el
//! nivel de log de `RUST_LOG` (por defecto `info,image_server=debug`).

use clap::Parser;
use tracing_subscriber::EnvFilter;

use image_server::config::Config;
use image_server::server::Server;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,image_server=debug")),
        )
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .init();

    let config = Config::parse();
    if let Err(e) = config.validate() {
        tracing::error!("Configuración inválida: {}", e);
        std::process::exit(1);
    }
    config.log_summary();

    let mut server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("No se pudo iniciar el servidor: {}", e);
            std::process::exit(1);
        }
    };

    // Esto bloquea el thread hasta un error fatal
    if let Err(e) = server.run() {
        tracing::error!("Error fatal: {}", e);
        std::process::exit(1);
    }
}
