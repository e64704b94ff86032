//! # Formulario Principal
//! src/handlers/form.rs
//!
//! GET /main.html: envía el template con la lista de imágenes disponibles
//! para que el formulario pueda ofrecerlas.

use std::fs;
use std::path::Path;

use super::Exchange;
use crate::error::Result;
use crate::http::{Request, Response};

/// Handler para GET /main.html
pub fn form_handler(ex: &mut Exchange, _request: &Request) -> Result<()> {
    let response = match fs::read_to_string(&ex.config.template) {
        Ok(template) => Response::form_page(&template, &list_images(&ex.config.images_dir)),
        Err(e) => {
            tracing::error!(
                "No se pudo leer el template {}: {}",
                ex.config.template.display(),
                e
            );
            Response::internal_server_error("Couldn't load the form page.")
        }
    };

    ex.respond(&response)
}

/// Nombres de archivo del directorio de imágenes, ordenados
///
/// Si el directorio no existe o no se puede leer, la lista queda vacía.
pub fn list_images(dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("No se pudo leer {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name != "." && name != "..")
        .collect();
    names.sort();
    names
}
