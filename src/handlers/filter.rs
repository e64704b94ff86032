//! # Filtros de Imágenes
//! src/handlers/filter.rs
//!
//! GET /image-filter?image=<imagen>&filter=<filtro>
//!
//! Valida los parámetros, responde con el header de un bitmap y ejecuta el
//! filtro como subproceso:
//!
//! ```text
//! images/<imagen> ──stdin──▶ filters/<filtro> ──stdout──▶ socket del cliente
//! ```
//!
//! Cualquier validación fallida responde 500 sin ejecutar nada.

use std::fs::{self, File};
use std::os::fd::OwnedFd;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use thiserror::Error;

use super::Exchange;
use crate::config::Config;
use crate::error::Result;
use crate::http::{QueryParam, Request, Response};

/// Errores de validación de un filtro
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("Either query params 'filter' or 'image' is not presented.")]
    MissingParams,

    #[error("Either value of 'filter' or 'image' contains '/'.")]
    PathSeparator,

    #[error("The filter value doesn't refer to an executable file under the filters directory.")]
    FilterNotExecutable,

    #[error("The image value doesn't refer to a readable file under the images directory.")]
    ImageNotReadable,
}

/// Filtro validado, listo para ejecutarse
#[derive(Debug)]
pub struct FilterJob {
    /// Ruta del ejecutable del filtro
    pub filter: PathBuf,

    /// Ruta de la imagen de entrada
    pub image_path: PathBuf,

    /// Imagen ya abierta para lectura
    pub image: File,
}

/// Extrae (imagen, filtro) de los parámetros
///
/// El contrato es posicional: el parámetro 0 debe llamarse `image` y el 1
/// `filter`. Los demás se ignoran.
pub fn filter_args(params: &[QueryParam]) -> std::result::Result<(&str, &str), FilterError> {
    match params {
        [image, filter, ..] if image.name == "image" && filter.name == "filter" => {
            if image.value.contains('/') || filter.value.contains('/') {
                return Err(FilterError::PathSeparator);
            }
            Ok((image.value.as_str(), filter.value.as_str()))
        }
        _ => Err(FilterError::MissingParams),
    }
}

/// Valida un request de filtro contra los directorios configurados
pub fn validate(request: &Request, config: &Config) -> std::result::Result<FilterJob, FilterError> {
    let (image, filter) = filter_args(request.params())?;

    let filter_path = config.filters_dir.join(filter);
    let executable = fs::metadata(&filter_path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false);
    if !executable {
        return Err(FilterError::FilterNotExecutable);
    }

    let image_path = config.images_dir.join(image);
    let image_file = File::open(&image_path)
        .ok()
        .filter(|f| f.metadata().map(|m| m.is_file()).unwrap_or(false))
        .ok_or(FilterError::ImageNotReadable)?;

    Ok(FilterJob {
        filter: filter_path,
        image_path,
        image: image_file,
    })
}

/// Handler para GET /image-filter
pub fn filter_handler(ex: &mut Exchange, request: &Request) -> Result<()> {
    // Un error de validación sale como `ServerError::Filter` (500) antes de
    // escribir nada en el socket
    let job = validate(request, &ex.config)?;

    tracing::info!(
        peer = %ex.peer,
        "Ejecutando {} sobre {}",
        job.filter.display(),
        job.image_path.display()
    );

    ex.respond_head(&Response::bitmap_header())?;

    let output = OwnedFd::from(ex.stream.try_clone()?);
    let status = Command::new(&job.filter)
        .stdin(Stdio::from(job.image))
        .stdout(Stdio::from(output))
        .stderr(Stdio::inherit())
        .status()?;

    if let Some(signal) = status.signal() {
        tracing::error!(
            peer = %ex.peer,
            "Filtro {} terminó con la señal {}",
            job.filter.display(),
            signal
        );
    } else if !status.success() {
        tracing::warn!(
            peer = %ex.peer,
            "Filtro {} terminó con {}",
            job.filter.display(),
            status
        );
    }

    Ok(())
}
