//! Control Plane trait for server communication
//!
//! Raw command execution against a single node, plus the connection setup
//! commands (AUTH, SELECT) and INFO.

use crate::utils::{RespEncoder, RespValue};
use std::io;

/// Control plane operations trait
///
/// Implementations handle the underlying protocol and connection management.
/// Store primitives (SCAN, TYPE, DEL, ...) are built on top in `store`.
pub trait ControlPlane {
    /// Execute a command with string arguments
    ///
    /// # Example
    /// ```ignore
    /// let response = conn.execute(&["INFO", "cluster"])?;
    /// ```
    fn execute(&mut self, args: &[&str]) -> io::Result<RespValue>;

    /// Execute a pre-encoded RESP command
    fn execute_encoded(&mut self, encoder: &RespEncoder) -> io::Result<RespValue>;

    /// Send `count` pre-encoded commands in one write and read `count` replies
    fn execute_pipeline(
        &mut self,
        encoder: &RespEncoder,
        count: usize,
    ) -> io::Result<Vec<RespValue>>;
}

/// Extension trait with common control plane operations
pub trait ControlPlaneExt: ControlPlane {
    /// Get INFO for a section (empty string returns the default sections)
    fn info(&mut self, section: &str) -> io::Result<String> {
        let response = if section.is_empty() {
            self.execute(&["INFO"])?
        } else {
            self.execute(&["INFO", section])?
        };
        text_reply("INFO", response)
    }

    /// Send AUTH command
    fn authenticate(&mut self, password: &str, username: Option<&str>) -> io::Result<()> {
        let response = match username {
            Some(user) => self.execute(&["AUTH", user, password])?,
            None => self.execute(&["AUTH", password])?,
        };

        match response {
            RespValue::SimpleString(s) if s == "OK" => Ok(()),
            RespValue::Error(e) => Err(io::Error::new(io::ErrorKind::PermissionDenied, e)),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unexpected AUTH response: {:?}", other),
            )),
        }
    }

    /// Send SELECT command
    fn select_db(&mut self, db: u32) -> io::Result<()> {
        let db_str = db.to_string();
        match self.execute(&["SELECT", &db_str])? {
            RespValue::SimpleString(s) if s == "OK" => Ok(()),
            RespValue::Error(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unexpected SELECT response: {:?}", other),
            )),
        }
    }
}

// Blanket implementation: any ControlPlane automatically gets ControlPlaneExt
impl<T: ControlPlane> ControlPlaneExt for T {}

fn text_reply(command: &str, response: RespValue) -> io::Result<String> {
    match response {
        RespValue::BulkString(data) => String::from_utf8(data).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("Invalid UTF-8: {}", e))
        }),
        RespValue::SimpleString(s) => Ok(s),
        RespValue::Error(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
        other => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Unexpected {} response: {:?}", command, other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockControlPlane {
        responses: Vec<RespValue>,
        call_count: usize,
        last_args: Vec<String>,
    }

    impl MockControlPlane {
        fn new(responses: Vec<RespValue>) -> Self {
            Self {
                responses,
                call_count: 0,
                last_args: Vec::new(),
            }
        }
    }

    impl ControlPlane for MockControlPlane {
        fn execute(&mut self, args: &[&str]) -> io::Result<RespValue> {
            self.last_args = args.iter().map(|s| s.to_string()).collect();
            if self.call_count < self.responses.len() {
                let resp = self.responses[self.call_count].clone();
                self.call_count += 1;
                Ok(resp)
            } else {
                Err(io::Error::new(io::ErrorKind::Other, "No more responses"))
            }
        }

        fn execute_encoded(&mut self, _encoder: &RespEncoder) -> io::Result<RespValue> {
            self.execute(&[])
        }

        fn execute_pipeline(
            &mut self,
            _encoder: &RespEncoder,
            count: usize,
        ) -> io::Result<Vec<RespValue>> {
            (0..count).map(|_| self.execute(&[])).collect()
        }
    }

    #[test]
    fn test_info_section() {
        let mut mock = MockControlPlane::new(vec![RespValue::BulkString(
            b"# Cluster\r\ncluster_enabled:1\r\n".to_vec(),
        )]);
        let info = mock.info("cluster").unwrap();
        assert!(info.contains("cluster_enabled:1"));
        assert_eq!(mock.last_args, vec!["INFO", "cluster"]);
    }

    #[test]
    fn test_info_error_reply() {
        let mut mock = MockControlPlane::new(vec![RespValue::Error(
            "NOPERM this user has no permissions to run the 'info' command".to_string(),
        )]);
        assert!(mock.info("cluster").is_err());
    }

    #[test]
    fn test_select_db() {
        let mut mock = MockControlPlane::new(vec![RespValue::SimpleString("OK".to_string())]);
        mock.select_db(3).unwrap();
        assert_eq!(mock.last_args, vec!["SELECT", "3"]);
    }

    #[test]
    fn test_auth_rejected() {
        let mut mock = MockControlPlane::new(vec![RespValue::Error(
            "WRONGPASS invalid username-password pair".to_string(),
        )]);
        let err = mock.authenticate("secret", Some("ops")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(mock.last_args, vec!["AUTH", "ops", "secret"]);
    }
}
