//! # Módulo del Servidor
//! src/server/mod.rs
//!
//! Este módulo implementa el servidor TCP que:
//! 1. Escucha en un puerto y multiplexa todas las conexiones con `poll`
//! 2. Guarda cada conexión en un slot de una tabla de tamaño fijo
//! 3. Lee la request line sin bloquear
//! 4. Entrega la conexión a un worker que genera la respuesta
//!
//! Los workers se recogen cuando el poll vence sin eventos.

pub mod table;
pub mod tcp;
pub mod worker;

// Re-exportar para facilitar el uso
pub use table::{Connection, ConnectionTable};
pub use tcp::Server;
pub use worker::WorkerSet;
