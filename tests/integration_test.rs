//! Tests de integración para el servidor de imágenes
//! tests/integration_test.rs
//!
//! Cada test levanta su propio servidor en un puerto efímero, con
//! directorios temporales para imágenes y filtros.

use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::Path;
use std::thread;
use std::time::Duration;

use image_server::config::Config;
use image_server::server::Server;
use tempfile::TempDir;

const TEMPLATE: &str = "<html>\n<body>\n<script>\nshow(filenames);\n</script>\n</body>\n</html>\n";

/// Bitmap mínimo: "BM" + tamaño total (u32 LE) + relleno
fn bitmap(size: usize) -> Vec<u8> {
    let mut data = vec![0u8; size];
    data[0] = b'B';
    data[1] = b'M';
    data[2..6].copy_from_slice(&(size as u32).to_le_bytes());
    for (i, byte) in data.iter_mut().enumerate().skip(6) {
        *byte = (i % 251) as u8;
    }
    data
}

/// Servidor corriendo en background sobre un directorio temporal
struct TestServer {
    addr: SocketAddr,
    dir: TempDir,
}

impl TestServer {
    fn start(max_clients: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        let filters = dir.path().join("filters");
        fs::create_dir_all(&images).unwrap();
        fs::create_dir_all(&filters).unwrap();

        fs::write(dir.path().join("main.html"), TEMPLATE).unwrap();
        fs::write(images.join("cat.bmp"), bitmap(3000)).unwrap();
        symlink("/bin/cat", filters.join("copy")).unwrap();

        let config = Config {
            port: 0,
            max_clients,
            images_dir: images,
            filters_dir: filters,
            template: dir.path().join("main.html"),
            poll_timeout_ms: 100,
            io_timeout_ms: 5000,
            linger_ms: 200,
            ..Config::default()
        };

        let mut server = Server::bind(config).unwrap();
        let addr = server.local_addr().unwrap();
        thread::spawn(move || server.run());

        Self { addr, dir }
    }

    fn images(&self) -> std::path::PathBuf {
        self.dir.path().join("images")
    }

    fn add_filter(&self, name: &str, script: &str) {
        let path = self.dir.path().join("filters").join(name);
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        stream.set_write_timeout(Some(Duration::from_secs(10))).unwrap();
        stream
    }

    /// Envía bytes crudos y lee la respuesta hasta EOF
    fn send(&self, raw: &[u8]) -> Vec<u8> {
        let mut stream = self.connect();
        stream.write_all(raw).unwrap();
        read_all(&mut stream)
    }

    fn get(&self, target: &str) -> Vec<u8> {
        self.send(format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", target).as_bytes())
    }
}

fn read_all(stream: &mut TcpStream) -> Vec<u8> {
    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    response
}

/// Separa (head, body) en el primer CRLFCRLF
fn split_response(response: &[u8]) -> (String, &[u8]) {
    let pos = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response without header terminator");
    (
        String::from_utf8_lossy(&response[..pos]).into_owned(),
        &response[pos + 4..],
    )
}

fn upload_request(filename: &str, payload: &[u8]) -> Vec<u8> {
    let boundary = "----TestBoundary7MA4YWxk";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: image/bmp\r\n\r\n");
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    let mut raw = Vec::new();
    raw.extend_from_slice(b"POST /image-upload HTTP/1.1\r\nHost: localhost\r\n");
    raw.extend_from_slice(
        format!("Content-Type: multipart/form-data; boundary={}\r\n", boundary).as_bytes(),
    );
    raw.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
    raw.extend_from_slice(&body);
    raw
}

// === Formulario ===

#[test]
fn test_form_page_lists_images() {
    let server = TestServer::start(4);
    fs::write(server.images().join("dog.bmp"), bitmap(64)).unwrap();

    let response = server.get("/main.html");
    let (head, body) = split_response(&response);
    let body = String::from_utf8_lossy(body);

    assert!(head.starts_with("HTTP/1.1 200 OK"), "got: {}", head);
    assert!(head.contains("Content-Type: text/html"));
    assert!(body.contains("<script>\nvar filenames = [\"cat.bmp\",\"dog.bmp\"];\nshow(filenames);"));
}

#[test]
fn test_unknown_path_is_404() {
    let server = TestServer::start(4);

    let response = server.get("/nothing-here");
    let (head, body) = split_response(&response);
    assert!(head.starts_with("HTTP/1.1 404 Not Found"), "got: {}", head);
    assert_eq!(body, b"Page not found.\r\n");

    // Método correcto pero path equivocado, y viceversa
    let response = server.send(b"POST /main.html HTTP/1.1\r\n\r\n");
    assert!(response.starts_with(b"HTTP/1.1 404"));
}

#[test]
fn test_malformed_requests_are_400() {
    let server = TestServer::start(4);

    let response = server.get("/image-filter?image&filter=copy");
    assert!(response.starts_with(b"HTTP/1.1 400 Bad Request"));

    let response = server.get("/image-filter?a=1&b=2&c=3&d=4&e=5&f=6");
    assert!(response.starts_with(b"HTTP/1.1 400 Bad Request"));

    let response = server.send(b"DELETE /main.html HTTP/1.1\r\n\r\n");
    assert!(response.starts_with(b"HTTP/1.1 400 Bad Request"));
}

#[test]
fn test_request_line_too_long_is_400() {
    let server = TestServer::start(4);

    let target = format!("/{}", "x".repeat(4096));
    let response = server.get(&target);
    assert!(response.starts_with(b"HTTP/1.1 400 Bad Request"));
}

// === Filtros ===

#[test]
fn test_filter_streams_bitmap() {
    let server = TestServer::start(4);

    let response = server.get("/image-filter?image=cat.bmp&filter=copy");
    let (head, body) = split_response(&response);

    assert!(head.starts_with("HTTP/1.1 200 OK"), "got: {}", head);
    assert!(head.contains("Content-Type: image/bmp"));
    assert!(head.contains("Content-Disposition: attachment; filename=\"output.bmp\""));
    assert_eq!(body, bitmap(3000).as_slice());
}

#[test]
fn test_filter_validation_errors_are_500() {
    let server = TestServer::start(4);

    // Parámetros en orden invertido
    let response = server.get("/image-filter?filter=copy&image=cat.bmp");
    assert!(response.starts_with(b"HTTP/1.1 500 Internal Server Error"));

    let response = server.get("/image-filter?image=cat.bmp&filter=missing");
    assert!(response.starts_with(b"HTTP/1.1 500"));

    let response = server.get("/image-filter?image=nope.bmp&filter=copy");
    assert!(response.starts_with(b"HTTP/1.1 500"));

    let response = server.get("/image-filter?image=../images/cat.bmp&filter=copy");
    assert!(response.starts_with(b"HTTP/1.1 500"));
}

#[test]
fn test_filter_killed_by_signal_server_survives() {
    let server = TestServer::start(4);
    server.add_filter("crash", "#!/bin/sh\nkill -9 $$\n");

    let response = server.get("/image-filter?image=cat.bmp&filter=crash");
    let (head, body) = split_response(&response);
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert!(body.is_empty());

    let response = server.get("/main.html");
    assert!(response.starts_with(b"HTTP/1.1 200 OK"));
}

// === Uploads ===

#[test]
fn test_upload_stores_exact_bytes() {
    let server = TestServer::start(4);
    let payload = bitmap(5000);

    let response = server.send(&upload_request("new.bmp", &payload));
    let (head, _) = split_response(&response);

    assert!(head.starts_with("HTTP/1.1 303 See Other"), "got: {}", head);
    assert!(head.contains("Location: /main.html"));
    assert_eq!(fs::read(server.images().join("new.bmp")).unwrap(), payload);

    // La imagen nueva aparece en el formulario
    let page = server.get("/main.html");
    assert!(String::from_utf8_lossy(&page).contains("\"new.bmp\""));
}

#[test]
fn test_upload_existing_file_rejected() {
    let server = TestServer::start(4);
    let original = fs::read(server.images().join("cat.bmp")).unwrap();

    let response = server.send(&upload_request("cat.bmp", &bitmap(100)));
    let (head, body) = split_response(&response);

    assert!(head.starts_with("HTTP/1.1 400 Bad Request"), "got: {}", head);
    assert!(String::from_utf8_lossy(body).contains("File already exists."));
    assert_eq!(fs::read(server.images().join("cat.bmp")).unwrap(), original);
}

#[test]
fn test_upload_without_boundary_rejected() {
    let server = TestServer::start(4);

    let response = server.send(
        b"POST /image-upload HTTP/1.1\r\nHost: localhost\r\nContent-Type: text/plain\r\n\r\nhello",
    );
    assert!(response.starts_with(b"HTTP/1.1 400 Bad Request"));
}

#[test]
fn test_truncated_upload_leaves_no_file() {
    let server = TestServer::start(4);
    let payload = bitmap(4000);
    let raw = upload_request("partial.bmp", &payload);

    // Se corta en medio del payload y se cierra la escritura
    let mut stream = server.connect();
    stream.write_all(&raw[..raw.len() - 2000]).unwrap();
    stream.shutdown(std::net::Shutdown::Write).unwrap();
    let response = read_all(&mut stream);

    assert!(response.starts_with(b"HTTP/1.1 400 Bad Request"));
    assert!(!server.images().join("partial.bmp").exists());
}

// === Concurrencia ===

#[test]
fn test_full_table_defers_new_connections() {
    let server = TestServer::start(1);

    // El primer cliente ocupa el único slot con una línea incompleta
    let mut first = server.connect();
    first.write_all(b"GET /main.ht").unwrap();
    thread::sleep(Duration::from_millis(200));

    let mut second = server.connect();
    second
        .write_all(b"GET /nothing HTTP/1.1\r\n\r\n")
        .unwrap();
    second
        .set_read_timeout(Some(Duration::from_millis(400)))
        .unwrap();
    let mut byte = [0u8; 1];
    let err = second.read(&mut byte).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut));

    // Al completar el primero se libera el slot y entra el segundo
    first.write_all(b"ml HTTP/1.1\r\n\r\n").unwrap();
    assert!(read_all(&mut first).starts_with(b"HTTP/1.1 200 OK"));

    second
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    assert!(read_all(&mut second).starts_with(b"HTTP/1.1 404"));
}

#[test]
fn test_slow_filter_does_not_block_other_clients() {
    let server = TestServer::start(4);
    server.add_filter("slow", "#!/bin/sh\nsleep 1\ncat\n");

    let mut slow = server.connect();
    slow.write_all(b"GET /image-filter?image=cat.bmp&filter=slow HTTP/1.1\r\n\r\n")
        .unwrap();

    // Mientras el filtro duerme, otro cliente recibe su respuesta
    let response = server.get("/main.html");
    assert!(response.starts_with(b"HTTP/1.1 200 OK"));

    let response = read_all(&mut slow);
    let (_, body) = split_response(&response);
    assert_eq!(body, bitmap(3000).as_slice());
}

#[test]
fn test_peer_closing_early_is_harmless() {
    let server = TestServer::start(2);

    for _ in 0..5 {
        let mut stream = server.connect();
        stream.write_all(b"GET /ma").unwrap();
        drop(stream);
    }

    let response = server.get("/main.html");
    assert!(response.starts_with(b"HTTP/1.1 200 OK"));
}
