//! # Configuración del Servidor
//! src/config.rs
//!
//! Este módulo define la configuración del servidor con soporte para
//! argumentos CLI y variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./image_server --port 30000 \
//!   --max-clients 10 \
//!   --images-dir images \
//!   --filters-dir filters
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! IMAGE_SERVER_PORT=30000 IMAGES_DIR=/srv/images ./image_server
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::{Result, ServerError};

/// Tamaño mínimo del buffer de una conexión
pub const MIN_BUFFER_SIZE: usize = 64;

/// Configuración del servidor de imágenes
#[derive(Debug, Clone, Parser)]
#[command(name = "image_server")]
#[command(about = "Servidor HTTP concurrente de filtros de imágenes")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Puerto en el que escucha el servidor
    #[arg(short, long, default_value = "30000", env = "IMAGE_SERVER_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "127.0.0.1", env = "IMAGE_SERVER_HOST")]
    pub host: String,

    // === Conexiones ===

    /// Máximo de conexiones atendidas a la vez (slots de la tabla)
    #[arg(long = "max-clients", default_value = "10", env = "MAX_CLIENTS")]
    pub max_clients: usize,

    /// Tamaño del buffer de recepción de cada conexión, en bytes
    #[arg(long = "buffer-size", default_value = "1024", env = "BUFFER_SIZE")]
    pub buffer_size: usize,

    // === Directorios ===

    /// Directorio de imágenes (lectura para filtros, escritura para uploads)
    #[arg(long = "images-dir", default_value = "images", env = "IMAGES_DIR")]
    pub images_dir: PathBuf,

    /// Directorio de filtros ejecutables
    #[arg(long = "filters-dir", default_value = "filters", env = "FILTERS_DIR")]
    pub filters_dir: PathBuf,

    /// Template HTML del formulario
    #[arg(long, default_value = "static/main.html", env = "FORM_TEMPLATE")]
    pub template: PathBuf,

    // === Timeouts ===

    /// Espera máxima del poll antes de recoger workers, en milisegundos
    #[arg(long = "poll-timeout-ms", default_value = "2000", env = "POLL_TIMEOUT_MS")]
    pub poll_timeout_ms: u64,

    /// Timeout de lectura/escritura de los workers (0 = sin timeout)
    #[arg(long = "io-timeout-ms", default_value = "30000", env = "IO_TIMEOUT_MS")]
    pub io_timeout_ms: u64,

    /// Tiempo máximo que un worker drena la entrada antes de cerrar
    #[arg(long = "linger-ms", default_value = "1000", env = "LINGER_MS")]
    pub linger_ms: u64,
}

impl Config {
    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use image_server::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "127.0.0.1:30000");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// `None` cuando el timeout está desactivado
    pub fn io_timeout(&self) -> Option<Duration> {
        (self.io_timeout_ms > 0).then(|| Duration::from_millis(self.io_timeout_ms))
    }

    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }

    /// Valida la configuración
    pub fn validate(&self) -> Result<()> {
        if self.max_clients == 0 {
            return Err(ServerError::Config("max clients must be >= 1".to_string()));
        }
        if self.buffer_size < MIN_BUFFER_SIZE {
            return Err(ServerError::Config(format!(
                "buffer size must be >= {} bytes",
                MIN_BUFFER_SIZE
            )));
        }
        if self.poll_timeout_ms == 0 {
            return Err(ServerError::Config("poll timeout must be > 0".to_string()));
        }
        Ok(())
    }

    /// Registra un resumen de la configuración
    pub fn log_summary(&self) {
        tracing::info!("Dirección:       {}", self.address());
        tracing::info!("Clientes máx:    {}", self.max_clients);
        tracing::info!("Buffer:          {} bytes", self.buffer_size);
        tracing::info!("Imágenes:        {}", self.images_dir.display());
        tracing::info!("Filtros:         {}", self.filters_dir.display());
        tracing::info!("Template:        {}", self.template.display());
        tracing::info!("Poll timeout:    {} ms", self.poll_timeout_ms);
        match self.io_timeout() {
            Some(t) => tracing::info!("IO timeout:      {} ms", t.as_millis()),
            None => tracing::info!("IO timeout:      desactivado"),
        }
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            port: 30000,
            host: "127.0.0.1".to_string(),
            max_clients: 10,
            buffer_size: 1024,
            images_dir: PathBuf::from("images"),
            filters_dir: PathBuf::from("filters"),
            template: PathBuf::from("static/main.html"),
            poll_timeout_ms: 2000,
            io_timeout_ms: 30_000,
            linger_ms: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 30000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.max_clients, 10);
        assert_eq!(config.buffer_size, 1024);
        assert_eq!(config.poll_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_address_custom() {
        let mut config = Config::default();
        config.host = "0.0.0.0".to_string();
        config.port = 3000;
        assert_eq!(config.address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_validate_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_clients() {
        let mut config = Config::default();
        config.max_clients = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max clients"));
    }

    #[test]
    fn test_validate_small_buffer() {
        let mut config = Config::default();
        config.buffer_size = 16;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("buffer size"));

        config.buffer_size = MIN_BUFFER_SIZE;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_poll_timeout() {
        let mut config = Config::default();
        config.poll_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }

    #[test]
    fn test_io_timeout_disabled() {
        let mut config = Config::default();
        assert_eq!(config.io_timeout(), Some(Duration::from_secs(30)));
        config.io_timeout_ms = 0;
        assert_eq!(config.io_timeout(), None);
    }

    #[test]
    fn test_parse_from_args() {
        let config = Config::parse_from([
            "image_server",
            "--port",
            "4000",
            "--max-clients",
            "3",
            "--images-dir",
            "/tmp/imgs",
        ]);
        assert_eq!(config.port, 4000);
        assert_eq!(config.max_clients, 3);
        assert_eq!(config.images_dir, PathBuf::from("/tmp/imgs"));
        assert_eq!(config.filters_dir, PathBuf::from("filters"));
    }
}
