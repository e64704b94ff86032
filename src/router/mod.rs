//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Este módulo implementa el dispatcher que elige qué respuesta da un
//! worker según el método y el path del request.
//!
//! ## Arquitectura
//!
//! ```text
//! Request → Router → Handler → Response (escrita por el worker)
//! ```
//!
//! Si no hay handler para ese (método, path), responde 404 Not Found. Si la
//! request line no se pudo parsear, responde 400 sin consultar las rutas.

use crate::error::{Result, ServerError};
use crate::handlers::{self, Exchange};
use crate::http::{Method, ParseError, Request};

/// Path del formulario principal
pub const FORM_PATH: &str = "/main.html";

/// Path del endpoint de filtros
pub const FILTER_PATH: &str = "/image-filter";

/// Path del endpoint de uploads
pub const UPLOAD_PATH: &str = "/image-upload";

/// Tipo de función handler
///
/// Un handler recibe la conexión del worker y el request, y escribe su
/// propia respuesta en el socket.
pub type Handler = fn(&mut Exchange, &Request) -> Result<()>;

/// Router que mapea (método, path) a handlers
pub struct Router {
    routes: Vec<(Method, String, Handler)>,
}

impl Router {
    /// Crea un nuevo router vacío
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Router con las rutas del servidor de imágenes
    pub fn standard() -> Self {
        let mut router = Self::new();
        router.register(Method::GET, FORM_PATH, handlers::form_handler);
        router.register(Method::GET, FILTER_PATH, handlers::filter_handler);
        router.register(Method::POST, UPLOAD_PATH, handlers::upload_handler);
        router
    }

    /// Registra una ruta con su handler
    pub fn register(&mut self, method: Method, path: &str, handler: Handler) {
        self.routes.push((method, path.to_string(), handler));
    }

    /// Encuentra el handler para un request (404 si no hay)
    pub fn route(&self, request: &Request) -> Handler {
        self.routes
            .iter()
            .find(|(method, path, _)| *method == request.method() && path == request.path())
            .map(|(_, _, handler)| *handler)
            .unwrap_or(handlers::not_found_handler)
    }

    /// Atiende el resultado del parsing de la request line
    ///
    /// Los errores de parsing y los que retorna un handler se convierten
    /// aquí en la respuesta de error (400/500). Solo retorna `Err` si no
    /// había nada que responder o si falló la escritura.
    pub fn dispatch(&self, ex: &mut Exchange, parsed: &std::result::Result<Request, ParseError>) -> Result<()> {
        let outcome = match parsed {
            Ok(request) => {
                tracing::info!(
                    peer = %ex.peer,
                    "Request parseado: [{}] [{}]",
                    request.method().as_str(),
                    request.path()
                );
                for param in request.params() {
                    tracing::debug!("  {} -> {}", param.name, param.value);
                }
                (self.route(request))(ex, request)
            }
            Err(error) => Err(ServerError::Parse(error.clone())),
        };

        let Err(error) = outcome else {
            return Ok(());
        };
        let Some(response) = handlers::error_response(&error) else {
            return Err(error);
        };

        if response.status().is_server_error() {
            tracing::error!(peer = %ex.peer, "{} → {}", error, response.status());
        } else if response.status().is_client_error() {
            tracing::warn!(peer = %ex.peer, "{} → {}", error, response.status());
        }
        ex.respond(&response)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::standard()
    }
}
