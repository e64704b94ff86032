//! # Servidor TCP Multiplexado
//! src/server/tcp.rs
//!
//! Un solo thread espera con `poll` (mio) sobre el socket de escucha y
//! todas las conexiones registradas. Cuando una conexión completa su
//! request line, se saca de la tabla y se entrega a un worker propio; el
//! loop principal nunca hace el I/O de una respuesta.
//!
//! ```text
//!            ┌──────────── poll(timeout) ─────────────┐
//!            │                                        │
//!        listener ──accept──▶ ConnectionTable ──read──▶ request line
//!                                                     │
//!                         timeout: reap_one()         ▼
//!                                               WorkerSet::spawn
//! ```
//!
//! Los eventos son edge-triggered: cada conexión lista se lee hasta que
//! el socket bloquea o hasta tener una línea completa.
//!
//! En las vueltas con eventos también se recogen los workers que ya
//! terminaron, así el `WorkerSet` no crece bajo carga sostenida.

use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::AsRawFd;
use std::sync::Arc;

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};

use super::table::{Connection, ConnectionTable};
use super::worker::WorkerSet;
use crate::config::Config;
use crate::error::Result;
use crate::handlers::Exchange;
use crate::http::{ParseError, Request};
use crate::router::Router;

/// Token del socket de escucha; las conexiones usan el índice de su slot
const LISTENER: Token = Token(usize::MAX);

/// Estado de la lectura de la request line de una conexión
#[derive(Debug, PartialEq, Eq)]
pub enum ReadState {
    /// Falta la línea completa; esperar más eventos
    Pending,

    /// El peer cerró (o la lectura falló) antes de completar la línea
    Closed,

    /// `conn.request` ya tiene el request parseado
    Parsed,

    /// La línea llegó completa pero es inválida
    Rejected(ParseError),
}

/// Lee del socket hasta tener la request line o hasta que bloquee
///
/// La línea se consume del buffer; lo que venga después (headers, cuerpo
/// del upload) queda en el buffer para el worker.
pub fn read_request_line(conn: &mut Connection) -> ReadState {
    loop {
        if let Some(line) = conn.buffer.line() {
            let parsed = Request::parse_line(line);
            conn.buffer.consume_line();
            return match parsed {
                Ok(request) => {
                    conn.request = Some(request);
                    ReadState::Parsed
                }
                Err(e) => ReadState::Rejected(e),
            };
        }

        if conn.buffer.is_full() {
            return ReadState::Rejected(ParseError::LineTooLong);
        }

        match conn.buffer.fill_from(&mut conn.stream) {
            Ok(0) => return ReadState::Closed,
            Ok(_) => continue,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return ReadState::Pending,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(peer = %conn.peer, "Error leyendo: {}", e);
                return ReadState::Closed;
            }
        }
    }
}

/// Servidor HTTP multiplexado con un worker por request
pub struct Server {
    config: Arc<Config>,
    router: Arc<Router>,
    listener: TcpListener,
    poll: Poll,
    table: ConnectionTable,
    workers: WorkerSet,

    /// Quedaron conexiones en el backlog porque la tabla estaba llena
    backlogged: bool,
}

impl Server {
    /// Crea el servidor y abre el socket de escucha
    pub fn bind(config: Config) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(config.address())?;
        listener.set_nonblocking(true)?;

        let poll = Poll::new()?;
        poll.registry().register(
            &mut SourceFd(&listener.as_raw_fd()),
            LISTENER,
            Interest::READABLE,
        )?;

        Ok(Self {
            table: ConnectionTable::new(config.max_clients),
            config: Arc::new(config),
            router: Arc::new(Router::standard()),
            listener,
            poll,
            workers: WorkerSet::new(),
            backlogged: false,
        })
    }

    /// Dirección real en la que escucha (útil con puerto 0)
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Loop principal (bloquea el thread)
    ///
    /// Solo retorna si falla algo que afecta a todo el servidor: el poll,
    /// el accept o la creación de un worker.
    pub fn run(&mut self) -> Result<()> {
        tracing::info!("Servidor escuchando en {}", self.local_addr()?);
        tracing::info!("Modo: poll + un worker por request ({} slots)", self.table.capacity());

        let mut events = Events::with_capacity(self.table.capacity() + 1);
        loop {
            self.tick(&mut events)?;
        }
    }

    /// Una vuelta del loop: esperar, y atender lo que esté listo
    fn tick(&mut self, events: &mut Events) -> Result<()> {
        match self.poll.poll(events, Some(self.config.poll_timeout())) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        if events.is_empty() {
            self.workers.reap_one();
            return Ok(());
        }

        for event in events.iter() {
            match event.token() {
                LISTENER => self.accept_pending()?,
                Token(slot) => self.service(slot)?,
            }
        }

        if self.backlogged && !self.table.is_full() {
            self.accept_pending()?;
        }

        self.workers.reap_finished();
        Ok(())
    }

    /// Acepta conexiones mientras haya slots libres
    fn accept_pending(&mut self) -> Result<()> {
        loop {
            if self.table.is_full() {
                if !self.backlogged {
                    tracing::warn!(
                        "Tabla de conexiones llena ({} slots): las nuevas conexiones esperan en el backlog",
                        self.table.capacity()
                    );
                }
                self.backlogged = true;
                return Ok(());
            }

            match self.listener.accept() {
                Ok((stream, _)) => self.register(stream)?,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    self.backlogged = false;
                    return Ok(());
                }
                Err(e)
                    if e.kind() == ErrorKind::Interrupted
                        || e.kind() == ErrorKind::ConnectionAborted =>
                {
                    continue
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Registra una conexión recién aceptada
    ///
    /// Si no se puede registrar, la conexión se descarta y el loop sigue.
    fn register(&mut self, stream: TcpStream) -> Result<()> {
        if let Err(e) = stream.set_nonblocking(true) {
            tracing::warn!("No se pudo configurar la conexión: {}", e);
            return Ok(());
        }

        let fd = stream.as_raw_fd();
        let slot = self
            .table
            .acquire(Connection::new(stream, self.config.buffer_size))?;

        if let Err(e) = self
            .poll
            .registry()
            .register(&mut SourceFd(&fd), Token(slot), Interest::READABLE)
        {
            tracing::warn!("No se pudo registrar la conexión: {}", e);
            self.table.release(slot);
            return Ok(());
        }

        if let Some(conn) = self.table.get(slot) {
            tracing::debug!("Nueva conexión desde {} (slot {})", conn.peer, slot);
        }
        Ok(())
    }

    /// Atiende una conexión lista para leer
    fn service(&mut self, slot: usize) -> Result<()> {
        // Evento viejo de un slot que ya se liberó
        let Some(conn) = self.table.get_mut(slot) else {
            return Ok(());
        };

        match read_request_line(conn) {
            ReadState::Pending => Ok(()),
            ReadState::Closed => {
                self.close(slot);
                Ok(())
            }
            ReadState::Parsed => self.dispatch(slot, None),
            ReadState::Rejected(e) => self.dispatch(slot, Some(e)),
        }
    }

    /// Saca la conexión del poll y de la tabla, y cierra el socket
    fn close(&mut self, slot: usize) {
        if let Some(conn) = self.table.take(slot) {
            self.deregister(&conn);
            tracing::debug!("Conexión de {} cerrada (slot {})", conn.peer, slot);
        }
    }

    fn deregister(&self, conn: &Connection) {
        let fd = conn.stream.as_raw_fd();
        if let Err(e) = self.poll.registry().deregister(&mut SourceFd(&fd)) {
            tracing::warn!(peer = %conn.peer, "No se pudo quitar del poll: {}", e);
        }
    }

    /// Entrega la conexión a un worker nuevo
    ///
    /// El slot queda libre de inmediato; el worker es dueño de la conexión.
    fn dispatch(&mut self, slot: usize, rejected: Option<ParseError>) -> Result<()> {
        let Some(conn) = self.table.take(slot) else {
            return Ok(());
        };
        self.deregister(&conn);

        let router = Arc::clone(&self.router);
        let config = Arc::clone(&self.config);
        let peer = conn.peer.clone();

        let id = self
            .workers
            .spawn(peer, move || serve(&router, config, conn, rejected))?;
        tracing::debug!(worker = id, "Worker lanzado (slot {} libre)", slot);
        Ok(())
    }
}

/// Cuerpo de un worker: responde un request y cierra la conexión
fn serve(router: &Router, config: Arc<Config>, mut conn: Connection, rejected: Option<ParseError>) {
    let parsed = match (conn.request.take(), rejected) {
        (_, Some(e)) => Err(e),
        (Some(request), None) => Ok(request),
        (None, None) => return,
    };

    let mut ex = match Exchange::from_connection(conn, config) {
        Ok(ex) => ex,
        Err(e) => {
            tracing::warn!("No se pudo preparar la conexión del worker: {}", e);
            return;
        }
    };

    if let Err(e) = router.dispatch(&mut ex, &parsed) {
        tracing::warn!(peer = %ex.peer, "Error respondiendo: {}", e);
    }
    ex.finish();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::thread;
    use std::time::{Duration, Instant};

    /// Par (conexión del lado servidor, socket del cliente)
    fn pair(buffer_size: usize) -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();
        (Connection::new(server, buffer_size), client)
    }

    /// Reintenta mientras el estado sea `Pending` (los bytes pueden tardar)
    fn read_until_ready(conn: &mut Connection) -> ReadState {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let state = read_request_line(conn);
            if state != ReadState::Pending || Instant::now() > deadline {
                return state;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_pending_without_data() {
        let (mut conn, _client) = pair(1024);
        assert_eq!(read_request_line(&mut conn), ReadState::Pending);
        assert!(conn.request.is_none());
    }

    #[test]
    fn test_partial_then_complete_line() {
        let (mut conn, mut client) = pair(1024);

        client.write_all(b"GET /main.ht").unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(read_request_line(&mut conn), ReadState::Pending);

        client.write_all(b"ml HTTP/1.1\r\nHost: x\r\n").unwrap();
        assert_eq!(read_until_ready(&mut conn), ReadState::Parsed);

        let request = conn.request.as_ref().unwrap();
        assert_eq!(request.path(), "/main.html");
        // La request line se consumió; el resto queda para el worker
        assert_eq!(conn.buffer.as_bytes(), b"Host: x\r\n");
    }

    #[test]
    fn test_malformed_query_rejected() {
        let (mut conn, mut client) = pair(1024);
        client.write_all(b"GET /image-filter?a&b=c HTTP/1.1\r\n\r\n").unwrap();

        assert_eq!(
            read_until_ready(&mut conn),
            ReadState::Rejected(ParseError::MalformedQuery("a".to_string()))
        );
        assert!(conn.request.is_none());
    }

    #[test]
    fn test_line_too_long() {
        let (mut conn, mut client) = pair(64);
        client.write_all(&[b'a'; 200]).unwrap();

        assert_eq!(read_until_ready(&mut conn), ReadState::Rejected(ParseError::LineTooLong));
        assert!(conn.buffer.len() < conn.buffer.capacity());
    }

    #[test]
    fn test_peer_closed() {
        let (mut conn, mut client) = pair(1024);
        client.write_all(b"GET /ma").unwrap();
        drop(client);

        assert_eq!(read_until_ready(&mut conn), ReadState::Closed);
    }

    #[test]
    fn test_bind_validates_config() {
        let config = Config {
            max_clients: 0,
            port: 0,
            ..Config::default()
        };
        assert!(Server::bind(config).is_err());
    }

    #[test]
    fn test_bind_ephemeral_port() {
        let config = Config {
            port: 0,
            ..Config::default()
        };
        let server = Server::bind(config).unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }
}
