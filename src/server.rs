//! HTTP surface for the canvas.
//!
//! Two routes: `GET /image` returns the whole canvas as a PNG, and
//! `POST /image` applies a single-pixel write from a JSON body. Bad input is
//! answered with a 400 and a plain-text reason; persistence and encoding
//! failures with a 500. Requests are served by a small pool of worker
//! threads sharing one listener.

use std::io::{Cursor, Read};
use std::sync::Arc;
use std::thread;

use log::{error, info, warn};
use serde::Deserialize;
use tiny_http::{Header, Method, Request, Response, Server};

use crate::error::{Error, Result};
use crate::store::CanvasStore;

/// Largest request body accepted, in bytes. Pixel writes are tiny; anything
/// bigger is rejected as malformed.
const MAX_BODY_BYTES: u64 = 64 * 1024;

/// JSON body of a `POST /image` request.
#[derive(Debug, Deserialize)]
pub struct PutPixel {
    pub x: i64,
    pub y: i64,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

/// Bind `listen` and serve until the process exits.
pub fn run(listen: &str, store: Arc<CanvasStore>) -> Result<()> {
    let server = Server::http(listen)
        .map_err(|e| Error::InitFailed(format!("failed to bind {listen}: {e}")))?;
    let workers = num_cpus::get().max(2);
    info!("listening on http://{listen} with {workers} workers");
    serve(Arc::new(server), store, workers)
}

/// Run `workers` accept loops against an already-bound server.
///
/// Blocks until the server is dropped or unblocked; tests bind their own
/// server on an ephemeral port and call this on a background thread.
pub fn serve(server: Arc<Server>, store: Arc<CanvasStore>, workers: usize) -> Result<()> {
    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let server = Arc::clone(&server);
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || worker_loop(&server, &store)));
    }
    for handle in handles {
        let _ = handle.join();
    }
    Ok(())
}

fn worker_loop(server: &Server, store: &CanvasStore) {
    loop {
        match server.recv() {
            Ok(request) => handle_request(request, store),
            Err(e) => {
                error!("listener closed: {e}");
                return;
            }
        }
    }
}

fn handle_request(mut request: Request, store: &CanvasStore) {
    let method = request.method().clone();
    let url = request.url().to_string();

    let response = match (method, url.as_str()) {
        (Method::Get, "/image") => get_image(store),
        (Method::Post, "/image") => put_pixel(&mut request, store),
        _ => Response::from_string("not found\n").with_status_code(404),
    };

    if let Err(e) = request.respond(response) {
        warn!("failed to send response: {e}");
    }
}

fn get_image(store: &CanvasStore) -> Response<Cursor<Vec<u8>>> {
    match store.png_snapshot() {
        Ok(png) => Response::from_data(png)
            .with_header("Content-Type: image/png".parse::<Header>().unwrap()),
        Err(e) => {
            error!("failed to render canvas: {e}");
            Response::from_string("internal error\n").with_status_code(500)
        }
    }
}

fn put_pixel(request: &mut Request, store: &CanvasStore) -> Response<Cursor<Vec<u8>>> {
    let result = parse_body(request)
        .and_then(|p| store.write(p.x, p.y, (p.red, p.green, p.blue)));

    match result {
        Ok(_) => Response::from_string("ok\n"),
        Err(e @ (Error::MalformedRequest(_) | Error::OutOfBounds { .. })) => {
            warn!("rejected pixel write: {e}");
            Response::from_string(format!("{e}\n")).with_status_code(400)
        }
        Err(e) => {
            error!("pixel write failed: {e}");
            Response::from_string("internal error\n").with_status_code(500)
        }
    }
}

fn parse_body(request: &mut Request) -> Result<PutPixel> {
    let mut body = String::new();
    request
        .as_reader()
        .take(MAX_BODY_BYTES)
        .read_to_string(&mut body)
        .map_err(|e| Error::MalformedRequest(e.to_string()))?;
    serde_json::from_str(&body).map_err(|e| Error::MalformedRequest(e.to_string()))
}
