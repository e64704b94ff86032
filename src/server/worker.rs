//! # Workers por Request
//! src/server/worker.rs
//!
//! Cada request parseado se atiende en su propio thread. El loop principal
//! nunca espera a un worker: solo guarda su `JoinHandle` y, cuando el
//! `poll` vence sin eventos, recoge como mucho un worker terminado.
//!
//! Un worker que hace panic se detecta aquí (el `join` retorna `Err`) y se
//! registra en el log; el resto del servidor no se entera.

use std::any::Any;
use std::io;
use std::thread::{self, JoinHandle};

/// Un worker en ejecución (o terminado y todavía sin recoger)
#[derive(Debug)]
struct Worker {
    id: u64,
    peer: String,
    handle: JoinHandle<()>,
}

/// Resultado de recoger un worker terminado
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaped {
    pub id: u64,
    pub peer: String,

    /// Mensaje del panic si el worker terminó de forma anormal
    pub panic: Option<String>,
}

impl Reaped {
    pub fn is_abnormal(&self) -> bool {
        self.panic.is_some()
    }
}

/// Conjunto de workers lanzados por el servidor
#[derive(Debug, Default)]
pub struct WorkerSet {
    workers: Vec<Worker>,
    next_id: u64,
}

impl WorkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Workers sin recoger (corriendo o ya terminados)
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Lanza un worker nuevo
    ///
    /// Un error aquí significa que el sistema no pudo crear el thread.
    pub fn spawn<F>(&mut self, peer: String, job: F) -> io::Result<u64>
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;

        let handle = thread::Builder::new()
            .name(format!("worker-{}", id))
            .spawn(job)?;

        self.workers.push(Worker { id, peer, handle });
        Ok(id)
    }

    /// Recoge como mucho un worker terminado, sin bloquear
    pub fn reap_one(&mut self) -> Option<Reaped> {
        let index = self.workers.iter().position(|w| w.handle.is_finished())?;
        let worker = self.workers.swap_remove(index);

        let panic = worker.handle.join().err().map(panic_message);
        let reaped = Reaped {
            id: worker.id,
            peer: worker.peer,
            panic,
        };

        if reaped.is_abnormal() {
            tracing::error!(
                worker = reaped.id,
                peer = %reaped.peer,
                "Worker terminó de forma anormal: {}",
                reaped.panic.as_deref().unwrap_or_default()
            );
        } else {
            tracing::trace!(worker = reaped.id, "Worker recogido");
        }

        Some(reaped)
    }

    /// Recoge todos los workers ya terminados, sin bloquear
    ///
    /// El loop lo llama en las vueltas con eventos, para que con carga
    /// sostenida (sin timeouts) el conjunto no crezca más allá de los
    /// workers que siguen corriendo.
    pub fn reap_finished(&mut self) -> usize {
        let mut reaped = 0;
        while self.reap_one().is_some() {
            reaped += 1;
        }
        reaped
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
