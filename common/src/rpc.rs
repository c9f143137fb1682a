//! Wire schema and UNIX-socket plumbing shared by the coordinator, the
//! workers and `mrl-ctl`.

use std::path::{Path, PathBuf};

use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;
use tracing::debug;

use crate::Result;

pub mod proto {
    tonic::include_proto!("mrl.coordinator.v1");
}

pub use proto::coordinator_client::CoordinatorClient;
pub use proto::coordinator_server::{Coordinator, CoordinatorServer};

/// Directory holding coordinator sockets.
pub const SOCKET_DIR: &str = "/var/tmp";

/// Socket path of the coordinator for the current user.
///
/// The path is derived from the numeric user id, and from `job` when one
/// is given, so unrelated jobs on one machine do not collide.
pub fn coordinator_sock(job: Option<&str>) -> PathBuf {
    let uid = nix::unistd::getuid();
    let name = match job {
        Some(job) => format!("mrl-{}-{}", uid, job),
        None => format!("mrl-{}", uid),
    };
    Path::new(SOCKET_DIR).join(name)
}

/// Open a channel to the coordinator listening on `path`.
///
/// Fails right away when nothing is listening. Calls made on the returned
/// client are never retried.
pub async fn connect(path: impl AsRef<Path>) -> Result<CoordinatorClient<Channel>> {
    let path = path.as_ref().to_path_buf();
    debug!("connecting to coordinator at {}", path.display());

    // The URI is required by tonic but ignored; the connector always dials
    // the socket.
    let channel = Endpoint::try_from("http://[::]:50051")?
        .connect_with_connector(service_fn(move |_: Uri| UnixStream::connect(path.clone())))
        .await?;

    Ok(CoordinatorClient::new(channel))
}
