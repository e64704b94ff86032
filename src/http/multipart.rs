//! # Parser de Uploads multipart/form-data
//! src/http/multipart.rs
//!
//! Máquina de estados de tres fases para recibir un bitmap:
//!
//! ```text
//! POST /image-upload HTTP/1.1\r\n
//! Content-Type: multipart/form-data; boundary=XyZ\r\n     <- 1. boundary
//! \r\n
//! --XyZ\r\n                                                <- 2. filename
//! Content-Disposition: form-data; name="image"; filename="cat.bmp"\r\n
//! Content-Type: image/bmp\r\n                              <- 3. payload
//! \r\n
//! BM<size:u32 LE>....\r\n
//! --XyZ--\r\n                                              (se descarta)
//! ```
//!
//! Todas las fases trabajan sobre el `LineBuffer` de la conexión y leen
//! más bytes del socket solo cuando la línea que necesitan está incompleta.

use std::io::{self, Read, Write};
use std::path::PathBuf;

use thiserror::Error;

use super::reader::LineBuffer;

/// Prefijo de la línea que declara el boundary
pub const BOUNDARY_HEADER: &str = "Content-Type: multipart/form-data; boundary=";

/// Offset del campo de tamaño (u32 little-endian) dentro del bitmap
pub const SIZE_FIELD_OFFSET: usize = 2;

const SIZE_FIELD_END: usize = SIZE_FIELD_OFFSET + 4;

/// Errores de un upload
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Couldn't find boundary string in request.")]
    BoundaryNotFound,

    #[error("Couldn't find bitmap filename in request.")]
    FilenameNotFound,

    #[error("Invalid bitmap filename: {0:?}")]
    InvalidFilename(String),

    #[error("Malformed part headers in request.")]
    MalformedPart,

    #[error("File already exists.")]
    AlreadyExists(PathBuf),

    #[error("Upload truncated: expected {expected} bytes, received {written}")]
    Truncated { expected: u64, written: u64 },

    /// Falló la lectura del socket (incluye el timeout de lectura)
    #[error("Couldn't read the upload from the client: {0}")]
    Receive(io::Error),

    /// Falló la escritura del archivo destino
    #[error("Couldn't store the uploaded file: {0}")]
    Store(io::Error),
}

/// Asegura que haya una línea completa en el buffer
///
/// Retorna `false` si el peer cerró antes de completarla.
fn ensure_line<R: Read + ?Sized>(buf: &mut LineBuffer, src: &mut R) -> Result<bool, UploadError> {
    while buf.find_terminator().is_none() {
        if buf.fill_from(src).map_err(UploadError::Receive)? == 0 {
            return Ok(false);
        }
    }
    Ok(true)
}

fn starts_with_ignore_case(line: &[u8], prefix: &[u8]) -> bool {
    line.len() >= prefix.len() && line[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Fase 1: busca la declaración del boundary
///
/// Retorna el token normalizado con el prefijo `--` que se usa en el cuerpo.
pub fn read_boundary<R: Read + ?Sized>(
    buf: &mut LineBuffer,
    src: &mut R,
) -> Result<String, UploadError> {
    let prefix = BOUNDARY_HEADER.as_bytes();

    loop {
        if !ensure_line(buf, src)? {
            return Err(UploadError::BoundaryNotFound);
        }

        // Línea vacía: terminaron los headers sin declarar el boundary
        if buf.line().is_some_and(|line| line.is_empty()) {
            buf.consume_line();
            return Err(UploadError::BoundaryNotFound);
        }

        let token = buf
            .line()
            .filter(|line| starts_with_ignore_case(line, prefix))
            .map(|line| {
                let raw = String::from_utf8_lossy(&line[prefix.len()..]);
                raw.trim().trim_matches('"').to_string()
            });

        buf.consume_line();
        let Some(token) = token else {
            continue;
        };
        if token.is_empty() {
            return Err(UploadError::BoundaryNotFound);
        }
        return Ok(format!("--{}", token));
    }
}

/// Fase 2: avanza hasta la parte que trae un archivo y extrae su nombre
///
/// Las partes sin `filename=` (campos normales del formulario) se saltan.
pub fn read_filename<R: Read + ?Sized>(
    buf: &mut LineBuffer,
    src: &mut R,
    boundary: &str,
) -> Result<String, UploadError> {
    loop {
        // Línea del boundary
        loop {
            if !ensure_line(buf, src)? {
                return Err(UploadError::FilenameNotFound);
            }
            let found = buf
                .line()
                .is_some_and(|line| line.starts_with(boundary.as_bytes()));
            buf.consume_line();
            if found {
                break;
            }
        }

        // Línea Content-Disposition
        if !ensure_line(buf, src)? {
            return Err(UploadError::FilenameNotFound);
        }
        let disposition = buf
            .line()
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .unwrap_or_default();

        if !disposition.contains("filename=") {
            continue;
        }

        buf.consume_line();
        return parse_filename(&disposition);
    }
}

/// Extrae el nombre de `... filename="cat.bmp"`
///
/// Toma lo que sigue al último `=`, sin las comillas.
pub fn parse_filename(disposition: &str) -> Result<String, UploadError> {
    let eq = disposition.rfind('=').ok_or(UploadError::FilenameNotFound)?;
    let raw = disposition[eq + 1..].trim();
    let raw = raw.strip_prefix('"').unwrap_or(raw);
    let name = match raw.find('"') {
        Some(end) => &raw[..end],
        None => raw,
    };

    if name.is_empty() {
        return Err(UploadError::FilenameNotFound);
    }
    if name.contains('/') || name == "." || name == ".." {
        return Err(UploadError::InvalidFilename(name.to_string()));
    }

    Ok(name.to_string())
}

/// Estado de un upload en curso (vive solo dentro del worker)
#[derive(Debug)]
pub struct UploadSession<W: Write> {
    /// Boundary con prefijo `--`; no cambia durante el upload
    boundary: String,

    /// Archivo destino
    dest: W,

    /// Tamaño declarado en el header del bitmap
    declared: Option<u64>,

    /// Bytes escritos hasta ahora
    written: u64,
}

impl<W: Write> UploadSession<W> {
    pub fn new(boundary: String, dest: W) -> Self {
        Self {
            boundary,
            dest,
            declared: None,
            written: 0,
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn declared_size(&self) -> Option<u64> {
        self.declared
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Recupera el destino (ej: para hacer sync del archivo)
    pub fn into_inner(self) -> W {
        self.dest
    }

    /// Fase 3: descarta los headers de la parte y copia el bitmap
    ///
    /// Escribe exactamente el tamaño declarado, sin importar cómo lleguen
    /// partidos los bytes. Lo que venga después (el boundary final) se
    /// descarta sin leerlo.
    pub fn stream_payload<R: Read + ?Sized>(
        &mut self,
        buf: &mut LineBuffer,
        src: &mut R,
    ) -> Result<u64, UploadError> {
        // Headers de la parte hasta la línea vacía
        loop {
            if !ensure_line(buf, src)? {
                return Err(UploadError::MalformedPart);
            }
            let blank = buf.line().is_some_and(|line| line.is_empty());
            buf.consume_line();
            if blank {
                break;
            }
        }

        while buf.len() < SIZE_FIELD_END {
            if buf.fill_from(src).map_err(UploadError::Receive)? == 0 {
                return Err(UploadError::MalformedPart);
            }
        }

        let mut field = [0u8; 4];
        field.copy_from_slice(&buf.as_bytes()[SIZE_FIELD_OFFSET..SIZE_FIELD_END]);
        let declared = u64::from(u32::from_le_bytes(field));
        self.declared = Some(declared);

        self.write_chunk(buf.as_bytes(), declared)
            .map_err(UploadError::Store)?;
        buf.clear();

        while self.written < declared {
            let n = buf.fill_from(src).map_err(UploadError::Receive)?;
            if n == 0 {
                return Err(UploadError::Truncated { expected: declared, written: self.written });
            }
            self.write_chunk(buf.as_bytes(), declared)
            .map_err(UploadError::Store)?;
            buf.clear();
        }

        self.dest.flush().map_err(UploadError::Store)?;
        Ok(self.written)
    }

    /// Escribe `chunk` recortado para no pasar de `declared`
    fn write_chunk(&mut self, chunk: &[u8], declared: u64) -> io::Result<()> {
        let remaining = declared - self.written;
        let take = chunk.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        self.dest.write_all(&chunk[..take])?;
        self.written += take as u64;
        Ok(())
    }
}
