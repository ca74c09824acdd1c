//! Shared helpers for integration tests: an in-process backend built on
//! `tiny_http` that answers with canned replies and reports what it received.
#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use serde_json::Value;
use snowdash::activity::ActivityLog;
use snowdash::api::ApiClient;
use snowdash::config::schema::BackendConfig;
use tiny_http::{Header, Response, Server, StatusCode};

/// One request as the fake backend saw it.
#[derive(Debug)]
pub struct Seen {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Seen {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json_body(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

pub struct Backend {
    pub base_url: String,
    seen: Receiver<Seen>,
}

impl Backend {
    /// Serve `replies` in order, one per request, then stop.
    pub fn start(replies: Vec<(u16, Value)>) -> Self {
        let server = Server::http("127.0.0.1:0").expect("bind test server");
        let port = server
            .server_addr()
            .to_ip()
            .expect("tcp listener")
            .port();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            for (status, body) in replies {
                let Ok(mut request) = server.recv() else {
                    return;
                };
                let mut content = String::new();
                let _ = request.as_reader().read_to_string(&mut content);
                let seen = Seen {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    headers: request
                        .headers()
                        .iter()
                        .map(|h| (h.field.to_string(), h.value.to_string()))
                        .collect(),
                    body: content,
                };
                let _ = tx.send(seen);

                let response = Response::from_string(body.to_string())
                    .with_status_code(StatusCode(status))
                    .with_header(
                        Header::from_bytes("Content-Type", "application/json").expect("header"),
                    );
                let _ = request.respond(response);
            }
        });

        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            seen: rx,
        }
    }

    /// Next request the backend received.
    pub fn next_request(&self) -> Seen {
        self.seen
            .recv_timeout(Duration::from_secs(5))
            .expect("backend saw no request")
    }

    pub fn client(&self) -> ApiClient {
        client_for(&self.base_url)
    }
}

pub fn client_for(base_url: &str) -> ApiClient {
    let config = BackendConfig {
        base_url: base_url.to_string(),
        timeout_secs: 5,
    };
    ApiClient::from_config(&config, ActivityLog::disabled())
}

/// A base URL nothing is listening on.
pub fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind free port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

/// A backend that promises `declared` body bytes, sends `sent`, and hangs up.
pub fn short_body_url(declared: usize, sent: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind free port");
    let port = listener.local_addr().expect("local addr").port();

    thread::spawn(move || {
        let Ok((stream, _)) = listener.accept() else {
            return;
        };
        let mut reader = BufReader::new(&stream);
        let mut line = String::new();
        while reader.read_line(&mut line).is_ok_and(|n| n > 0) && line != "\r\n" {
            line.clear();
        }
        let mut stream = &stream;
        let _ = write!(
            stream,
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {declared}\r\n\r\n{sent}"
        );
        let _ = stream.flush();
    });

    format!("http://127.0.0.1:{port}")
}
