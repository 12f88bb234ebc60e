//! Outbound request encoding (prop → orchestrator).

/// `POST` with a JSON body on a connection that closes afterwards.
pub fn encode_post(host: &str, path: &str, body: &str) -> String {
    format!(
        "POST {path} HTTP/1.1\r\nHost: {host}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Body-less `GET` that keeps the connection open for the next one.
pub fn encode_keepalive_get(host: &str, target: &str) -> String {
    format!("GET {target} HTTP/1.1\r\nHost: {host}\r\nConnection: keep-alive\r\n\r\n")
}
