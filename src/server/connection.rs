// Connection handling module
// Serves a single accepted TCP connection

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpStream;

use super::stream::{IsolatedStream, ResponseLedger};
use crate::config::AppState;
use crate::handler;
use crate::isolation::FinishHeaders;
use crate::logger;

/// Accept a connection, enforcing the optional connection limit.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `state` - Shared application state
/// * `conn_counter` - Active connection counter
pub fn accept_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    conn_counter: &Arc<AtomicUsize>,
) {
    // Increment counter first, then check limit
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(stream);
            return;
        }
    }

    handle_connection(
        stream,
        peer_addr,
        Arc::clone(state),
        Arc::clone(conn_counter),
    );
}

/// Handle a single connection in a spawned local task.
///
/// The request handler is wrapped in [`FinishHeaders`], so every handler
/// response passes through the header finishers. The socket is wrapped in
/// an [`IsolatedStream`], which patches the heads hyper writes itself when
/// a request cannot be parsed.
fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    conn_counter: Arc<AtomicUsize>,
) {
    tokio::task::spawn_local(async move {
        let ledger = ResponseLedger::new();
        let io = TokioIo::new(IsolatedStream::new(stream, ledger.clone()));
        let header_timeout = state.config.performance.header_read_timeout;

        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout((header_timeout > 0).then_some(Duration::from_secs(header_timeout)))
            .keep_alive(state.config.performance.keep_alive)
            .title_case_headers(true);

        let finishers = Arc::clone(&state.finishers);
        let service = FinishHeaders::new(
            service_fn(move |req: Request<Incoming>| {
                let state = Arc::clone(&state);
                let ledger = ledger.clone();
                async move {
                    let response = handler::handle_request(req, state, peer_addr).await?;
                    ledger.record(response.body().size_hint().exact());
                    Ok::<_, Infallible>(response)
                }
            }),
            finishers,
        );

        if let Err(err) = builder.serve_connection(io, service).await {
            logger::log_connection_error(&err);
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}
