//! Mock servers for sandboxes that may forbid binding sockets.

use std::io::ErrorKind;
use std::net::TcpListener;

use wiremock::MockServer;

/// Returns true when a loopback listener can be bound.
pub(crate) fn sockets_available() -> bool {
    match TcpListener::bind("127.0.0.1:0") {
        Ok(_) => true,
        Err(e) if matches!(e.kind(), ErrorKind::PermissionDenied | ErrorKind::AddrNotAvailable) => {
            eprintln!("skipping socket-bound test: {e}");
            false
        }
        Err(e) => panic!("unexpected error binding loopback listener: {e}"),
    }
}

/// Starts a wiremock server, or returns `None` when sockets are unavailable.
pub(crate) async fn start_mock_server_or_skip() -> Option<MockServer> {
    if !sockets_available() {
        return None;
    }
    Some(MockServer::start().await)
}
