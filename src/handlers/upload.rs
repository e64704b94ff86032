//! # Upload de Imágenes
//! src/handlers/upload.rs
//!
//! POST /image-upload: recibe un bitmap por multipart/form-data y lo guarda
//! en el directorio de imágenes. Al terminar redirige al formulario.

use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter};
use std::path::PathBuf;

use super::Exchange;
use crate::error::Result;
use crate::http::multipart::{self, UploadError, UploadSession};
use crate::http::{Request, Response};
use crate::router::FORM_PATH;

/// Handler para POST /image-upload
///
/// Los errores del upload vuelven como `ServerError::Upload`; el router
/// decide si son 400 o 500.
pub fn upload_handler(ex: &mut Exchange, _request: &Request) -> Result<()> {
    let path = receive(ex)?;
    tracing::info!(peer = %ex.peer, "Upload guardado en {}", path.display());
    ex.respond(&Response::see_other(FORM_PATH))
}

/// Ejecuta las tres fases del upload y retorna la ruta del archivo creado
fn receive(ex: &mut Exchange) -> std::result::Result<PathBuf, UploadError> {
    let boundary = multipart::read_boundary(&mut ex.buffer, &mut ex.stream)?;
    tracing::debug!(peer = %ex.peer, "Boundary: {}", boundary);

    let filename = multipart::read_filename(&mut ex.buffer, &mut ex.stream, &boundary)?;
    let path = ex.config.images_dir.join(&filename);
    tracing::debug!(peer = %ex.peer, "Bitmap path: {}", path.display());

    // create_new falla si el archivo existe: el chequeo y la creación son atómicos
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => UploadError::AlreadyExists(path.clone()),
            _ => UploadError::Store(e),
        })?;

    let mut session = UploadSession::new(boundary, BufWriter::new(file));
    match session.stream_payload(&mut ex.buffer, &mut ex.stream) {
        Ok(written) => {
            tracing::debug!(peer = %ex.peer, "{} bytes escritos", written);
            Ok(path)
        }
        Err(e) => {
            drop(session);
            if let Err(rm) = fs::remove_file(&path) {
                tracing::warn!("No se pudo borrar {}: {}", path.display(), rm);
            }
            Err(e)
        }
    }
}
