//! # Módulo HTTP
//!
//! Este módulo implementa el subconjunto de HTTP que necesita el servidor,
//! sin usar librerías de alto nivel. Incluye:
//!
//! - Lectura incremental de líneas CRLF desde un buffer acotado
//! - Parsing de la request line (método, path, query parameters)
//! - Parsing de uploads multipart/form-data
//! - Construcción de responses HTTP
//! - Manejo de status codes
//!
//! ## Simplificaciones
//!
//! - No hay chunked transfer encoding
//! - No hay conexiones persistentes: cada request cierra su conexión
//! - Solo se parsea la primera línea; los headers se ignoran o los consume
//!   el parser de multipart
//!
//! ### Formato de Request
//!
//! ```text
//! GET /image-filter?image=cat.bmp&filter=blur HTTP/1.1\r\n
//! Host: localhost:30000\r\n
//! \r\n
//! ```

pub mod multipart; // Uploads multipart/form-data
pub mod reader;    // Buffer de líneas CRLF
pub mod request;   // Parsing de la request line
pub mod response;  // Construcción de HTTP responses
pub mod status;    // Códigos de estado HTTP

// Re-exportamos los tipos principales para facilitar su uso
pub use reader::LineBuffer;
pub use request::{Method, ParseError, QueryParam, Request};
pub use response::Response;
pub use status::StatusCode;
