//! SSH port forwarding through the system `ssh` client.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::settings::SshTunnelSettings;
use super::MongoError;

const PROBE_TIMEOUT: Duration = Duration::from_millis(100);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A running `ssh -N -L` child process.
///
/// The process is killed when the tunnel is dropped.
#[derive(Debug)]
pub struct SshTunnel {
    child: Child,
    host: String,
    local_port: u16,
}

impl SshTunnel {
    /// Spawns the tunnel and waits until `127.0.0.1:local_port` accepts
    /// connections.
    ///
    /// The local port must be free beforehand, so whatever answers on it
    /// afterwards is the forwarding `ssh` process.
    pub fn start(settings: &SshTunnelSettings, local_port: u16) -> Result<Self, MongoError> {
        let host = settings.ssh_host.clone();
        ensure_port_free(local_port)?;
        let child = Command::new(&settings.ssh_program)
            .args(["-N", "-o", "BatchMode=yes", "-o", "ExitOnForwardFailure=yes"])
            .arg("-L")
            .arg(format!("127.0.0.1:{local_port}:127.0.0.1:{}", settings.remote_port))
            .arg("-p")
            .arg(settings.ssh_port.to_string())
            .arg("-i")
            .arg(&settings.ssh_key_file)
            .arg(format!("{}@{}", settings.ssh_username, settings.ssh_host))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| MongoError::TunnelSpawn {
                host: host.clone(),
                source,
            })?;
        debug!(%host, pid = child.id(), local_port, "spawned ssh tunnel");

        let mut tunnel = Self {
            child,
            host,
            local_port,
        };
        tunnel.wait_ready(Duration::from_millis(settings.ready_timeout_ms))?;
        info!(host = %tunnel.host, local_port, "ssh tunnel ready");
        Ok(tunnel)
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    fn wait_ready(&mut self, timeout: Duration) -> Result<(), MongoError> {
        let deadline = Instant::now() + timeout;
        let addr = SocketAddr::from(([127, 0, 0, 1], self.local_port));

        loop {
            self.ensure_running()?;

            if TcpStream::connect_timeout(&addr, PROBE_TIMEOUT).is_ok() {
                return self.ensure_running();
            }

            if Instant::now() >= deadline {
                return Err(MongoError::TunnelTimeout {
                    host: self.host.clone(),
                    port: self.local_port,
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Fails if the child has exited, e.g. on `ExitOnForwardFailure`.
    fn ensure_running(&mut self) -> Result<(), MongoError> {
        let exited = self.child.try_wait().map_err(|source| MongoError::TunnelSpawn {
            host: self.host.clone(),
            source,
        })?;
        match exited {
            Some(status) => Err(MongoError::TunnelExited {
                host: self.host.clone(),
                status,
            }),
            None => Ok(()),
        }
    }
}

fn ensure_port_free(port: u16) -> Result<(), MongoError> {
    TcpListener::bind(("127.0.0.1", port))
        .map(drop)
        .map_err(|source| MongoError::TunnelPortInUse { port, source })
}

impl Drop for SshTunnel {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            warn!(host = %self.host, error = %e, "failed to stop ssh tunnel");
        }
        let _ = self.child.wait();
        info!(host = %self.host, local_port = self.local_port, "ssh tunnel closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn settings(program: &str) -> SshTunnelSettings {
        SshTunnelSettings {
            ssh_host: "bastion.invalid".into(),
            ssh_port: 22,
            ssh_username: "deploy".into(),
            ssh_key_file: PathBuf::from("/nonexistent/key"),
            remote_port: 27017,
            ssh_program: program.into(),
            ready_timeout_ms: 5_000,
        }
    }

    fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_missing_program_fails_to_spawn() {
        let result = SshTunnel::start(&settings("/nonexistent/bin/ssh"), free_port());
        assert!(matches!(result, Err(MongoError::TunnelSpawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_exiting_program_is_reported() {
        let result = SshTunnel::start(&settings("false"), free_port());
        assert!(matches!(result, Err(MongoError::TunnelExited { .. })));
    }

    #[test]
    fn test_occupied_local_port_is_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let result = SshTunnel::start(&settings("sleep"), port);
        assert!(matches!(
            result,
            Err(MongoError::TunnelPortInUse { port: p, .. }) if p == port
        ));
        drop(listener);
    }
}
