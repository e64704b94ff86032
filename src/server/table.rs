//! # Tabla de Conexiones
//! src/server/table.rs
//!
//! Arena de tamaño fijo con una free-list: `acquire` y `release` son O(1).
//! El índice del slot se usa como `Token` de mio, así que un slot liberado
//! puede recibir eventos viejos; `get_mut` retorna `None` en ese caso.
//!
//! La tabla nunca crece. Cuando está llena, `acquire` retorna
//! `ConnectionTableFull` y el servidor deja de aceptar hasta que se libere
//! un slot.

use std::net::TcpStream;

use crate::error::{Result, ServerError};
use crate::http::{LineBuffer, Request};

/// Una conexión activa y su estado de parsing
#[derive(Debug)]
pub struct Connection {
    /// Socket del cliente
    pub stream: TcpStream,

    /// Bytes recibidos que todavía no se consumieron
    pub buffer: LineBuffer,

    /// Request line ya parseada (como mucho una por conexión)
    pub request: Option<Request>,

    /// Dirección del cliente, para logging
    pub peer: String,
}

impl Connection {
    pub fn new(stream: TcpStream, buffer_size: usize) -> Self {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            stream,
            buffer: LineBuffer::with_capacity(buffer_size),
            request: None,
            peer,
        }
    }
}

/// Registro de conexiones activas
#[derive(Debug)]
pub struct ConnectionTable {
    slots: Vec<Option<Connection>>,
    free: Vec<usize>,
}

impl ConnectionTable {
    /// Crea una tabla con `capacity` slots libres
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        Self {
            slots,
            // Invertido para que `pop` entregue primero el slot 0
            free: (0..capacity).rev().collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Número de slots ocupados
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.free.is_empty()
    }

    /// Registra una conexión en un slot libre y retorna su índice
    pub fn acquire(&mut self, conn: Connection) -> Result<usize> {
        let slot = self.free.pop().ok_or(ServerError::ConnectionTableFull {
            capacity: self.capacity(),
        })?;
        self.slots[slot] = Some(conn);
        Ok(slot)
    }

    pub fn get(&self, slot: usize) -> Option<&Connection> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Connection> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    /// Libera el slot y entrega la conexión al caller
    ///
    /// El caller decide si la cierra (drop) o se la pasa a un worker.
    pub fn take(&mut self, slot: usize) -> Option<Connection> {
        let conn = self.slots.get_mut(slot)?.take()?;
        self.free.push(slot);
        Some(conn)
    }

    /// Libera el slot y cierra su conexión
    ///
    /// Al hacer drop se cierra el socket y se liberan el request y el buffer.
    pub fn release(&mut self, slot: usize) -> bool {
        self.take(slot).is_some()
    }
}
