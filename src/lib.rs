//! # Image Server
//! src/lib.rs
//!
//! Servidor HTTP concurrente que aplica filtros a imágenes bitmap. Un
//! solo thread multiplexa las conexiones y cada request completo se
//! atiende en un worker propio.
//!
//! ## Arquitectura
//!
//! El servidor está dividido en módulos especializados:
//! - `http`: buffer de líneas, parsing de la request line, multipart y respuestas
//! - `server`: loop de poll, tabla de conexiones y workers
//! - `router`: elige el handler según método y path
//! - `handlers`: formulario, filtros y uploads
//! - `config`: argumentos CLI y variables de entorno
//! - `error`: errores del servidor
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use image_server::config::Config;
//! use image_server::server::Server;
//!
//! let config = Config::default();
//! let mut server = Server::bind(config).expect("Error al abrir el socket");
//! server.run().expect("Error fatal del servidor");
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod http;
pub mod router;
pub mod server;

pub use config::Config;
pub use error::{Result, ServerError};
pub use server::Server;
