//! # Tipos de Error
//! src/error.rs
//!
//! Error unificado del servidor. Los errores de cada etapa (parsing,
//! upload, filtros) tienen su propio tipo y se convierten aquí con `?`.

use thiserror::Error;

use crate::handlers::filter::FilterError;
use crate::http::multipart::UploadError;
use crate::http::request::ParseError;

/// Alias de `Result` con `ServerError`
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error unificado del servidor
#[derive(Debug, Error)]
pub enum ServerError {
    // === I/O ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // === Configuración ===
    #[error("Configuration error: {0}")]
    Config(String),

    // === Protocolo ===
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    // === Conexiones ===
    /// Todos los slots de la tabla de conexiones están ocupados
    #[error("Connection table full ({capacity} slots in use)")]
    ConnectionTableFull { capacity: usize },
}
