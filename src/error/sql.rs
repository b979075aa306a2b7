//! Message extraction for `sqlx` driver errors.
//!
//! Driver errors carry a lot of nesting; progress events and logs only need
//! a short human-readable line. This module condenses the common error kinds
//! using the driver's typed structures instead of string parsing.

/// Produce a concise one-line message for a `sqlx` error.
///
/// Intended to be used by the parent module's `Display` implementation for
/// `ExportError::Sql`, and by the row source when building terminal
/// progress events.
pub fn sqlx_error_message(error: &sqlx::Error) -> String {
    match error {
        sqlx::Error::Database(db) => {
            // Server-side errors carry the authoritative message; prefix the
            // SQLSTATE code when the server provides one.
            match db.code() {
                Some(code) => format!("[{code}] {}", db.message()),
                None => db.message().to_string(),
            }
        }
        sqlx::Error::Io(io_err) => format!("connection I/O error: {io_err}"),
        sqlx::Error::Tls(tls_err) => format!("TLS error: {tls_err}"),
        sqlx::Error::Configuration(msg) => format!("invalid connection configuration: {msg}"),
        sqlx::Error::PoolTimedOut => "timed out waiting for a connection".to_string(),
        sqlx::Error::PoolClosed => "connection pool closed".to_string(),
        sqlx::Error::RowNotFound => "no rows returned".to_string(),
        sqlx::Error::ColumnNotFound(name) => format!("column not found: {name}"),
        sqlx::Error::ColumnDecode { index, source } => {
            format!("failed to decode column {index}: {source}")
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_not_found_message() {
        let err = sqlx::Error::ColumnNotFound("username".to_string());
        assert_eq!(sqlx_error_message(&err), "column not found: username");
    }

    #[test]
    fn test_pool_timeout_message() {
        let err = sqlx::Error::PoolTimedOut;
        assert_eq!(sqlx_error_message(&err), "timed out waiting for a connection");
    }

    #[test]
    fn test_io_message() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let msg = sqlx_error_message(&sqlx::Error::Io(io_err));
        assert!(msg.starts_with("connection I/O error:"));
        assert!(msg.contains("reset by peer"));
    }
}
