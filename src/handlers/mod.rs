//! # Handlers
//! src/handlers/mod.rs
//!
//! Respuestas que un worker puede dar a un request:
//! - `form`: formulario HTML con la lista de imágenes
//! - `filter`: ejecuta un filtro sobre una imagen y transmite el resultado
//! - `upload`: recibe un bitmap por multipart/form-data
//!
//! Todos reciben un `Exchange`: la conexión que el loop principal le
//! entregó al worker, ya en modo bloqueante.

pub mod filter;
pub mod form;
pub mod upload;

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::{Result, ServerError};
use crate::http::multipart::UploadError;
use crate::http::{LineBuffer, Request, Response};
use crate::server::table::Connection;

pub use filter::filter_handler;
pub use form::form_handler;
pub use upload::upload_handler;

/// Conexión en manos de un worker
#[derive(Debug)]
pub struct Exchange {
    /// Socket del cliente (bloqueante)
    pub stream: TcpStream,

    /// Bytes ya recibidos después de la request line
    pub buffer: LineBuffer,

    /// Dirección del cliente, para logging
    pub peer: String,

    pub config: Arc<Config>,
}

impl Exchange {
    /// Toma la conexión del loop principal y la pasa a modo bloqueante
    pub fn from_connection(conn: Connection, config: Arc<Config>) -> io::Result<Self> {
        conn.stream.set_nonblocking(false)?;
        conn.stream.set_read_timeout(config.io_timeout())?;
        conn.stream.set_write_timeout(config.io_timeout())?;

        Ok(Self {
            stream: conn.stream,
            buffer: conn.buffer,
            peer: conn.peer,
            config,
        })
    }

    /// Escribe una respuesta completa
    pub fn respond(&mut self, response: &Response) -> Result<()> {
        tracing::debug!(peer = %self.peer, "→ {}", response.status());
        response.write_to(&mut self.stream)?;
        Ok(())
    }

    /// Escribe solo status line y headers (el body lo transmite otro)
    pub fn respond_head(&mut self, response: &Response) -> Result<()> {
        tracing::debug!(peer = %self.peer, "→ {} (streaming)", response.status());
        self.stream.write_all(&response.head_bytes())?;
        self.stream.flush()?;
        Ok(())
    }

    /// Cierra la conexión sin perder la respuesta
    ///
    /// Si quedan bytes sin leer al cerrar, el kernel manda un RST y el
    /// cliente puede no ver la respuesta. Por eso primero se cierra la
    /// escritura y se drena la entrada hasta EOF o hasta el linger.
    pub fn finish(mut self) {
        if self.stream.shutdown(Shutdown::Write).is_err() {
            return;
        }

        let linger = self.config.linger();
        if linger.is_zero() || self.stream.set_read_timeout(Some(linger)).is_err() {
            return;
        }

        let deadline = Instant::now() + linger;
        let mut sink = [0u8; 1024];
        while Instant::now() < deadline {
            match self.stream.read(&mut sink) {
                Ok(0) | Err(_) => break,
                Ok(_) => continue,
            }
        }
    }
}

/// 404 para rutas no reconocidas
pub fn not_found_handler(ex: &mut Exchange, request: &Request) -> Result<()> {
    tracing::info!(peer = %ex.peer, "Ruta no encontrada: {} {}", request.method().as_str(), request.path());
    ex.respond(&Response::not_found())
}

/// Respuesta para un error que un handler no pudo resolver
///
/// `None` si el error no es del request (socket roto, configuración): no
/// hay nada útil que responder y solo se registra.
pub fn error_response(error: &ServerError) -> Option<Response> {
    match error {
        ServerError::Parse(e) => Some(Response::bad_request(&format!("Invalid request: {}", e))),
        ServerError::Filter(e) => Some(Response::internal_server_error(&e.to_string())),
        ServerError::Upload(UploadError::Store(_)) => {
            Some(Response::internal_server_error("Couldn't store the uploaded file."))
        }
        ServerError::Upload(e) => Some(Response::bad_request(&e.to_string())),
        ServerError::Io(_) | ServerError::Config(_) | ServerError::ConnectionTableFull { .. } => None,
    }
}
