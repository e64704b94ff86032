//! # Códigos de Estado HTTP
//!
//! Este módulo define los códigos de estado que usa el servidor:
//!
//! - **2xx**: Éxito (200 OK: formulario o bitmap filtrado)
//! - **3xx**: Redirección (303 después de un upload)
//! - **4xx**: Error del cliente (400, 404)
//! - **5xx**: Error del servidor (500 en filtros inválidos)

/// Representa los códigos de estado HTTP que soporta nuestro servidor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK - La petición fue exitosa
    Ok = 200,

    /// 303 See Other - Redirección al formulario después de un upload
    SeeOther = 303,

    /// 400 Bad Request - Request o upload malformado, archivo ya existente
    BadRequest = 400,

    /// 404 Not Found - Ruta no reconocida
    NotFound = 404,

    /// 500 Internal Server Error - Parámetros de filtro inválidos o archivos inaccesibles
    InternalServerError = 500,
}

impl StatusCode {
    /// Convierte el código a su valor numérico
    ///
    /// # Ejemplo
    /// ```
    /// use image_server::http::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// ```
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Retorna el texto de razón (reason phrase) asociado al código
    ///
    /// # Ejemplo
    /// ```
    /// use image_server::http::StatusCode;
    /// assert_eq!(StatusCode::SeeOther.reason_phrase(), "See Other");
    /// assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::SeeOther => "See Other",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }

    /// Verifica si el código indica error del cliente (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.as_u16())
    }

    /// Verifica si el código indica error del servidor (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.as_u16())
    }
}

impl std::fmt::Display for StatusCode {
    /// Formato: "200 OK"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}
