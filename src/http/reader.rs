//! # Lector de Líneas del Protocolo
//! src/http/reader.rs
//!
//! Buffer acotado por conexión que acumula bytes crudos del socket y
//! permite extraer líneas terminadas en CRLF (`\r\n`).
//!
//! El buffer puede contener datos binarios (el bitmap de un upload), por
//! eso la búsqueda del terminador se hace byte a byte y nunca se asume que
//! el contenido sea texto o que no tenga bytes en cero.
//!
//! ```text
//! [ G E T   / m a i n . h t m l ... \r \n H o s t : ... ][ libre ... ]
//!   ^0                                     ^p              ^len     ^capacity
//! ```

use std::io::{self, Read};

/// Busca el primer CRLF dentro de `buf`
///
/// Retorna el offset *inmediatamente después* del `\n`, o `None` si no hay
/// una línea completa. Nunca lee más allá de `buf.len()`.
pub fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(2)
        .position(|pair| pair == b"\r\n")
        .map(|i| i + 2)
}

/// Buffer de recepción de una conexión
#[derive(Debug)]
pub struct LineBuffer {
    /// Memoria fija del buffer
    data: Box<[u8]>,

    /// Bytes válidos actualmente en el buffer
    len: usize,
}

impl LineBuffer {
    /// Crea un buffer con la capacidad indicada
    ///
    /// Solo se usan `capacity - 1` bytes: se reserva uno de holgura igual
    /// que un buffer de C reserva espacio para el terminador.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity.max(2)].into_boxed_slice(),
            len: 0,
        }
    }

    /// Capacidad total (incluye el byte de holgura)
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Máximo de bytes que se pueden acumular
    pub fn limit(&self) -> usize {
        self.data.len() - 1
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `true` si el buffer llegó a su límite
    pub fn is_full(&self) -> bool {
        self.len == self.limit()
    }

    /// Bytes válidos del buffer
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Offset justo después del primer CRLF de los bytes válidos
    pub fn find_terminator(&self) -> Option<usize> {
        find_terminator(self.as_bytes())
    }

    /// Primera línea completa, sin el CRLF
    pub fn line(&self) -> Option<&[u8]> {
        self.find_terminator().map(|end| &self.data[..end - 2])
    }

    /// Elimina la primera línea del buffer
    ///
    /// Desplaza los `len - p` bytes restantes al inicio. Retorna cuántos
    /// bytes se consumieron, o `None` si no había una línea completa (en ese
    /// caso el buffer no cambia).
    ///
    /// # Ejemplo
    /// ```
    /// use image_server::http::LineBuffer;
    ///
    /// let mut buf = LineBuffer::with_capacity(64);
    /// buf.fill_from(&mut &b"hello\r\ngoodbye\r\nblah"[..]).unwrap();
    ///
    /// assert_eq!(buf.consume_line(), Some(7));
    /// assert_eq!(buf.as_bytes(), b"goodbye\r\nblah");
    /// ```
    pub fn consume_line(&mut self) -> Option<usize> {
        let end = self.find_terminator()?;
        self.consume(end);
        Some(end)
    }

    /// Descarta los primeros `count` bytes
    pub fn consume(&mut self, count: usize) {
        let count = count.min(self.len);
        self.data.copy_within(count..self.len, 0);
        self.len -= count;
    }

    /// Vacía el buffer
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Hace una lectura y agrega los bytes después de los ya acumulados
    ///
    /// Si el buffer está lleno, la lectura lo sobrescribe desde el inicio.
    /// Retorna los bytes leídos (0 = el peer cerró la conexión).
    pub fn fill_from<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<usize> {
        if self.is_full() {
            self.len = 0;
        }

        let limit = self.limit();
        let n = reader.read(&mut self.data[self.len..limit])?;
        self.len += n;
        Ok(n)
    }
}
