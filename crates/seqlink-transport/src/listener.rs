use std::net::TcpListener;

use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::stream::LinkStream;

/// Listens for and accepts incoming link connections.
///
/// For Unix endpoints the socket file is created at the given path. A stale
/// socket left by a previous process is removed first; the path is removed
/// again on drop, but only while its inode identity is unchanged.
pub struct LinkListener {
    inner: ListenerInner,
    endpoint: Endpoint,
}

enum ListenerInner {
    #[cfg(unix)]
    Unix {
        listener: std::os::unix::net::UnixListener,
        created_inode: Option<(u64, u64)>,
    },
    Tcp(TcpListener),
}

impl LinkListener {
    /// Default permission mode for created socket paths.
    #[cfg(unix)]
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on an endpoint.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            #[cfg(unix)]
            Endpoint::Unix(path) => Self::bind_unix(path, Self::DEFAULT_SOCKET_MODE),
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(TransportError::Bind {
                endpoint: endpoint.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "unix domain sockets are not available on this platform",
                ),
            }),
            Endpoint::Tcp(addr) => {
                let listener = TcpListener::bind(addr).map_err(|e| TransportError::Bind {
                    endpoint: endpoint.to_string(),
                    source: e,
                })?;
                let local = listener
                    .local_addr()
                    .map_err(TransportError::Io)?
                    .to_string();
                info!(endpoint = %local, "listening on tcp");
                Ok(Self {
                    inner: ListenerInner::Tcp(listener),
                    endpoint: Endpoint::Tcp(local),
                })
            }
        }
    }

    #[cfg(unix)]
    fn bind_unix(path: &std::path::Path, mode: u32) -> Result<Self> {
        use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};

        let path = path.to_path_buf();
        let endpoint = Endpoint::Unix(path.clone());

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        // Remove a stale socket if it exists, but never remove non-socket files.
        if path.exists() {
            let metadata = std::fs::symlink_metadata(&path).map_err(|e| TransportError::Bind {
                endpoint: endpoint.to_string(),
                source: e,
            })?;
            if metadata.file_type().is_socket() {
                debug!(?path, "removing stale socket");
                std::fs::remove_file(&path).map_err(|e| TransportError::Bind {
                    endpoint: endpoint.to_string(),
                    source: e,
                })?;
            } else {
                return Err(TransportError::Bind {
                    endpoint: endpoint.to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "existing path is not a unix socket",
                    ),
                });
            }
        }

        let listener =
            std::os::unix::net::UnixListener::bind(&path).map_err(|e| TransportError::Bind {
                endpoint: endpoint.to_string(),
                source: e,
            })?;

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
            TransportError::Bind {
                endpoint: endpoint.to_string(),
                source: e,
            }
        })?;
        let created_metadata =
            std::fs::symlink_metadata(&path).map_err(|e| TransportError::Bind {
                endpoint: endpoint.to_string(),
                source: e,
            })?;
        let created_inode = Some((created_metadata.dev(), created_metadata.ino()));

        info!(?path, "listening on unix domain socket");

        Ok(Self {
            inner: ListenerInner::Unix {
                listener,
                created_inode,
            },
            endpoint,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<LinkStream> {
        match &self.inner {
            #[cfg(unix)]
            ListenerInner::Unix { listener, .. } => {
                let (stream, _addr) = listener.accept().map_err(TransportError::Accept)?;
                debug!("accepted connection");
                Ok(LinkStream::from_unix(stream))
            }
            ListenerInner::Tcp(listener) => {
                let (stream, addr) = listener.accept().map_err(TransportError::Accept)?;
                stream.set_nodelay(true).map_err(TransportError::Io)?;
                debug!(%addr, "accepted connection");
                Ok(LinkStream::from_tcp(stream))
            }
        }
    }

    /// The endpoint this listener is bound to.
    ///
    /// For TCP this reflects the resolved local address, so binding port 0
    /// reports the assigned port.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl Drop for LinkListener {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let ListenerInner::Unix {
            created_inode: Some((expected_dev, expected_ino)),
            ..
        } = &self.inner
        {
            use std::os::unix::fs::{FileTypeExt, MetadataExt};

            let Endpoint::Unix(path) = &self.endpoint else {
                return;
            };
            if let Ok(metadata) = std::fs::symlink_metadata(path) {
                if metadata.file_type().is_socket()
                    && metadata.dev() == *expected_dev
                    && metadata.ino() == *expected_ino
                {
                    debug!(?path, "cleaning up socket file");
                    let _ = std::fs::remove_file(path);
                } else {
                    debug!(?path, "socket path identity changed; skipping cleanup");
                }
            }
        }
    }
}
