//! # Parsing de la Request Line
//! src/http/request.rs
//!
//! Este módulo convierte la primera línea de un request HTTP en un
//! `Request` (método, path y query parameters en orden).
//!
//! ## Formato
//!
//! ```text
//! GET /image-filter?image=cat.bmp&filter=blur HTTP/1.1\r\n
//! POST /image-upload HTTP/1.1\r\n
//! ```
//!
//! ## Componentes
//!
//! 1. **Método**: se detecta por prefijo fijo (`GET ` o `POST `)
//! 2. **Path**: hasta el primer `?` o espacio
//! 3. **Query**: (solo GET) pares `nombre=valor` separados por `&`
//!
//! El resto de headers no se parsea aquí: en un GET se ignoran y en un POST
//! los consume el parser de multipart.

use thiserror::Error;

/// Máximo de query parameters aceptados en un request
pub const MAX_QUERY_PARAMS: usize = 5;

/// Métodos HTTP soportados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Formulario y filtros
    GET,

    /// POST - Upload de imágenes
    POST,
}

impl Method {
    /// Convierte el método a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
        }
    }
}

/// Un query parameter `nombre=valor`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    pub name: String,
    pub value: String,
}

impl QueryParam {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Request parseado a partir de la request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Método HTTP (GET o POST)
    method: Method,

    /// Path de la petición (ej: "/image-filter")
    path: String,

    /// Query parameters en el orden en que llegaron
    params: Vec<QueryParam>,
}

/// Errores que pueden ocurrir durante el parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// El método no es GET ni POST
    #[error("Unsupported HTTP method")]
    UnsupportedMethod,

    /// Falta el espacio que cierra el path o la query
    #[error("Invalid request line format")]
    InvalidRequestLine,

    /// Un token de la query no tiene forma `nombre=valor`
    #[error("The format of query params is 'name=value': {0:?}")]
    MalformedQuery(String),

    /// Más parámetros de los permitidos
    #[error("The maximum number of query params is {max}")]
    TooManyParams { max: usize },

    /// El buffer se llenó sin encontrar el fin de la request line
    #[error("Request line too long")]
    LineTooLong,
}

impl Request {
    /// Crea un request directamente (útil en pruebas y en el router)
    pub fn new(method: Method, path: impl Into<String>, params: Vec<QueryParam>) -> Self {
        Self {
            method,
            path: path.into(),
            params,
        }
    }

    /// Parsea la request line (sin el CRLF final)
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use image_server::http::{Method, Request};
    ///
    /// let request = Request::parse_line(b"GET /image-filter?image=cat.bmp&filter=blur HTTP/1.1").unwrap();
    ///
    /// assert_eq!(request.method(), Method::GET);
    /// assert_eq!(request.path(), "/image-filter");
    /// assert_eq!(request.params()[0].name, "image");
    /// assert_eq!(request.params()[1].value, "blur");
    /// ```
    pub fn parse_line(line: &[u8]) -> Result<Self, ParseError> {
        if let Some(rest) = line.strip_prefix(b"GET ") {
            Self::parse_get(rest)
        } else if let Some(rest) = line.strip_prefix(b"POST ") {
            Self::parse_post(rest)
        } else {
            Err(ParseError::UnsupportedMethod)
        }
    }

    /// `GET <path>[?<query>] <version>`
    fn parse_get(rest: &[u8]) -> Result<Self, ParseError> {
        let path_end = rest
            .iter()
            .position(|&b| b == b'?' || b == b' ')
            .ok_or(ParseError::InvalidRequestLine)?;
        let path = to_string(&rest[..path_end])?;

        let params = if rest[path_end] == b'?' {
            let query = &rest[path_end + 1..];
            let query_end = query
                .iter()
                .position(|&b| b == b' ')
                .ok_or(ParseError::InvalidRequestLine)?;
            parse_query(&to_string(&query[..query_end])?)?
        } else {
            Vec::new()
        };

        Ok(Self::new(Method::GET, path, params))
    }

    /// `POST <path> <version>` (sin query)
    fn parse_post(rest: &[u8]) -> Result<Self, ParseError> {
        let path_end = rest
            .iter()
            .position(|&b| b == b' ')
            .ok_or(ParseError::InvalidRequestLine)?;
        let path = to_string(&rest[..path_end])?;

        Ok(Self::new(Method::POST, path, Vec::new()))
    }

    // === Métodos públicos para acceder a los campos ===

    /// Obtiene el método HTTP del request
    pub fn method(&self) -> Method {
        self.method
    }

    /// Obtiene el path del request
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Obtiene los query parameters en orden
    pub fn params(&self) -> &[QueryParam] {
        &self.params
    }
}

/// Parsea una query string en una lista ordenada
///
/// Ejemplo: "image=cat.bmp&filter=blur"
/// Retorna: [("image", "cat.bmp"), ("filter", "blur")]
///
/// Los valores se guardan tal cual llegan (sin URL decode).
pub fn parse_query(query: &str) -> Result<Vec<QueryParam>, ParseError> {
    if query.is_empty() {
        return Ok(Vec::new());
    }

    if query.split('&').count() > MAX_QUERY_PARAMS {
        return Err(ParseError::TooManyParams { max: MAX_QUERY_PARAMS });
    }

    query
        .split('&')
        .map(|token| match token.find('=') {
            Some(eq) if eq > 0 => Ok(QueryParam::new(&token[..eq], &token[eq + 1..])),
            _ => Err(ParseError::MalformedQuery(token.to_string())),
        })
        .collect()
}

fn to_string(bytes: &[u8]) -> Result<String, ParseError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| ParseError::InvalidRequestLine)
}
