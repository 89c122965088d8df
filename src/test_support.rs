//! Throwaway HTTP/1.1 fixture server and temp directories for unit tests.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use uuid::Uuid;

#[derive(Clone, Debug)]
pub enum Route {
    File(Vec<u8>),
    Status(u16),
    /// Sends headers announcing `declared_len`, writes `head`, then goes quiet.
    Stall {
        head: Vec<u8>,
        declared_len: usize,
        hold: Duration,
    },
    /// Reads the request and never answers.
    Silent(Duration),
}

pub struct TestServer {
    addr: SocketAddr,
    routes: Arc<Mutex<HashMap<String, Route>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    pub fn start(routes: Vec<(String, Route)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        let addr = listener.local_addr().expect("test server addr");
        let routes = Arc::new(Mutex::new(routes.into_iter().collect::<HashMap<_, _>>()));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let routes_ref = Arc::clone(&routes);
        let requests_ref = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let routes = Arc::clone(&routes_ref);
                let requests = Arc::clone(&requests_ref);
                thread::spawn(move || {
                    let _ = handle(stream, &routes, &requests);
                });
            }
        });

        Self {
            addr,
            routes,
            requests,
        }
    }

    /// An address nothing is listening on.
    pub fn closed_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr")
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path.trim_start_matches('/'))
    }

    pub fn set_route(&self, path: &str, route: Route) {
        self.routes
            .lock()
            .expect("routes lock")
            .insert(path.to_string(), route);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }
}

fn handle(
    mut stream: TcpStream,
    routes: &Mutex<HashMap<String, Route>>,
    requests: &Mutex<Vec<String>>,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut head = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 || line == "\r\n" {
            break;
        }
        head.push_str(&line);
    }

    let target = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let path = target.split('?').next().unwrap_or("/").to_string();
    requests.lock().expect("requests lock").push(head);

    let route = routes.lock().expect("routes lock").get(&path).cloned();
    match route {
        Some(Route::File(body)) => {
            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(header.as_bytes())?;
            stream.write_all(&body)?;
        }
        Some(Route::Status(code)) => {
            let header = format!(
                "HTTP/1.1 {code} Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            );
            stream.write_all(header.as_bytes())?;
        }
        Some(Route::Stall {
            head,
            declared_len,
            hold,
        }) => {
            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {declared_len}\r\nConnection: close\r\n\r\n"
            );
            stream.write_all(header.as_bytes())?;
            stream.write_all(&head)?;
            stream.flush()?;
            thread::sleep(hold);
        }
        Some(Route::Silent(hold)) => thread::sleep(hold),
        None => {
            stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")?;
        }
    }
    stream.flush()
}

pub fn temp_root(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("otoshi-updater-{label}-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp root");
    dir
}
