//! # Construcción de Respuestas HTTP
//! src/http/response.rs
//!
//! Este módulo proporciona una API para construir respuestas HTTP y
//! convertirlas a bytes para enviar al cliente, más los "writers" de cada
//! tipo de respuesta que emite el servidor.
//!
//! ## Formato de una respuesta
//!
//! ```text
//! HTTP/1.1 400 Bad Request\r\n
//! Content-Type: text/html\r\n
//! Content-Length: 161\r\n
//! \r\n
//! <!DOCTYPE HTML PUBLIC ...
//! ```
//!
//! ## Ejemplo de uso
//!
//! ```
//! use image_server::http::{Response, StatusCode};
//!
//! let response = Response::new(StatusCode::Ok)
//!     .with_header("Content-Type", "text/plain")
//!     .with_body("Hello");
//!
//! let bytes = response.to_bytes();
//! assert!(bytes.starts_with(b"HTTP/1.1 200 OK\r\n"));
//! ```

use super::StatusCode;
use std::io::{self, Write};

/// Nombre con el que el navegador guarda el bitmap filtrado
pub const OUTPUT_FILENAME: &str = "output.bmp";

/// Representa una respuesta HTTP completa
#[derive(Debug, Clone)]
pub struct Response {
    /// Código de estado HTTP (200, 404, etc.)
    status: StatusCode,

    /// Headers en el orden en que se agregaron (sin duplicados)
    headers: Vec<(String, String)>,

    /// Cuerpo de la respuesta (puede ser vacío)
    body: Vec<u8>,
}

impl Response {
    /// Crea una nueva respuesta sin headers ni body
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Agrega un header a la respuesta
    ///
    /// Si el header ya existe, se sobrescribe su valor.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.add_header(name, value);
        self
    }

    /// Agrega un header a una respuesta existente (versión mutable)
    pub fn add_header(&mut self, name: &str, value: &str) {
        match self.headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    /// Establece el cuerpo desde un string y calcula `Content-Length`
    pub fn with_body(self, body: &str) -> Self {
        self.with_body_bytes(body.as_bytes().to_vec())
    }

    /// Establece el cuerpo desde bytes y calcula `Content-Length`
    pub fn with_body_bytes(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        let len = self.body.len().to_string();
        self.add_header("Content-Length", &len);
        self
    }

    // === Writers de cada tipo de respuesta ===

    /// 200 con el formulario HTML
    ///
    /// Copia el template línea por línea y, justo después de la primera
    /// línea que empieza con `<script>`, inyecta la lista de imágenes
    /// disponibles como un arreglo de JavaScript:
    ///
    /// ```text
    /// var filenames = ["cat.bmp","dog.bmp"];
    /// ```
    pub fn form_page(template: &str, images: &[String]) -> Self {
        let mut body = String::with_capacity(template.len() + 64);
        let mut injected = false;

        for line in template.split_inclusive('\n') {
            body.push_str(line);
            if !injected && line.starts_with("<script>") {
                if !line.ends_with('\n') {
                    body.push('\n');
                }
                body.push_str(&image_list_script(images));
                injected = true;
            }
        }

        Self::new(StatusCode::Ok)
            .with_header("Content-Type", "text/html")
            .with_body(&body)
    }

    /// Header de una respuesta bitmap; el body lo escribe el filtro
    pub fn bitmap_header() -> Self {
        Self::new(StatusCode::Ok)
            .with_header("Content-Type", "image/bmp")
            .with_header(
                "Content-Disposition",
                &format!("attachment; filename=\"{}\"", OUTPUT_FILENAME),
            )
    }

    /// 303 See Other hacia `location`
    pub fn see_other(location: &str) -> Self {
        Self::new(StatusCode::SeeOther).with_header("Location", location)
    }

    /// 400 Bad Request con página HTML
    pub fn bad_request(message: &str) -> Self {
        Self::error_page(StatusCode::BadRequest, message)
    }

    /// 404 Not Found en texto plano
    pub fn not_found() -> Self {
        Self::new(StatusCode::NotFound)
            .with_header("Content-Type", "text/plain")
            .with_body("Page not found.\r\n")
    }

    /// 500 Internal Server Error con página HTML
    pub fn internal_server_error(message: &str) -> Self {
        Self::error_page(StatusCode::InternalServerError, message)
    }

    /// Página de error HTML con el mensaje escapado
    pub fn error_page(status: StatusCode, message: &str) -> Self {
        let body = format!(
            "<!DOCTYPE HTML PUBLIC \"-//IETF//DTD HTML 2.0//EN\">\r\n\
             <html><head>\r\n\
             <title>{status}</title>\r\n\
             </head><body>\r\n\
             <h1>{reason}</h1>\r\n\
             <p>{message}<p>\r\n\
             </body></html>\r\n",
            status = status,
            reason = status.reason_phrase(),
            message = escape_html(message),
        );

        Self::new(status)
            .with_header("Content-Type", "text/html")
            .with_body(&body)
    }

    // === Serialización ===

    /// Status line y headers, terminados por la línea vacía
    pub fn head_bytes(&self) -> Vec<u8> {
        let mut result = format!("HTTP/1.1 {}\r\n", self.status).into_bytes();

        for (name, value) in &self.headers {
            result.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }

        result.extend_from_slice(b"\r\n");
        result
    }

    /// Convierte la respuesta a bytes listos para enviar por el socket
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = self.head_bytes();
        result.extend_from_slice(&self.body);
        result
    }

    /// Escribe la respuesta completa en `out`
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.to_bytes())?;
        out.flush()
    }

    /// Obtiene el código de estado de la respuesta
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Obtiene un header por nombre (sin distinguir mayúsculas)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Obtiene una referencia al body
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// `var filenames = [...];` con los nombres codificados como JSON
fn image_list_script(images: &[String]) -> String {
    let list = serde_json::to_string(images).unwrap_or_else(|_| "[]".to_string());
    format!("var filenames = {};\n", list)
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
