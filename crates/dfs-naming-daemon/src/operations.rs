use std::fmt;

use dfs_core::{LockMode, NamingCoordinator, NamingResult, NodePath};
use dfs_proto::{validate_request, ErrorKind, Request, Response};
use tracing::debug;

/// Which of the two listeners a request arrived on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Listener {
    /// Client-facing operations.
    Service,
    /// Storage node registration only.
    Registration,
}

impl Listener {
    fn accepts(self, request: &Request) -> bool {
        let is_register = matches!(request, Request::Register(_));
        match self {
            Listener::Service => !is_register,
            Listener::Registration => is_register,
        }
    }
}

impl fmt::Display for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Listener::Service => write!(f, "service"),
            Listener::Registration => write!(f, "registration"),
        }
    }
}

/// Whether serving `request` can wait on a path lock or a storage node.
pub fn may_block(request: &Request) -> bool {
    match request {
        Request::IsValidPath { .. }
        | Request::GetStorage { .. }
        | Request::List { .. }
        | Request::IsDirectory { .. }
        | Request::Unlock { .. } => false,
        Request::Delete { .. }
        | Request::CreateDirectory { .. }
        | Request::CreateFile { .. }
        | Request::Register(_)
        | Request::Lock { .. } => true,
    }
}

/// Runs one request against the coordinator. Blocking: lock waits and
/// storage commands happen on the calling thread.
pub fn process_request(naming: &NamingCoordinator, request: Request, listener: Listener) -> Response {
    if !listener.accepts(&request) {
        return Response::error(
            ErrorKind::InvalidRequest,
            format!(
                "{} is not served on the {} listener",
                request.op_name(),
                listener
            ),
        );
    }
    if let Err(e) = validate_request(&request) {
        return Response::error(e.kind(), e.to_string());
    }

    let op = request.op_name();
    match dispatch(naming, request) {
        Ok(response) => response,
        Err(e) => {
            debug!(op, error = %e, "request failed");
            Response::from_error(&e)
        }
    }
}

fn dispatch(naming: &NamingCoordinator, request: Request) -> NamingResult<Response> {
    let response = match request {
        Request::IsValidPath { path } => Response::boolean(NamingCoordinator::is_valid_path(&path)),
        Request::GetStorage { path } => Response::storage(&naming.get_storage(&path.parse()?)?),
        Request::Delete { path } => Response::boolean(naming.delete(&path.parse()?)?),
        Request::CreateDirectory { path } => {
            Response::boolean(naming.create_directory(&path.parse()?)?)
        }
        Request::CreateFile { path } => Response::boolean(naming.create_file(&path.parse()?)?),
        Request::List { path } => Response::files(naming.list(&path.parse()?)?),
        Request::IsDirectory { path } => Response::boolean(naming.is_directory(&path.parse()?)?),
        Request::Register(register) => {
            Response::files(naming.register(register.node_info(), &register.files)?)
        }
        Request::Lock { path, exclusive } => {
            let path: NodePath = path.parse()?;
            naming.acquire_path(&path, LockMode::from_exclusive(exclusive))?;
            Response::ok()
        }
        Request::Unlock { path, exclusive } => {
            let path: NodePath = path.parse()?;
            naming.release_path(&path, LockMode::from_exclusive(exclusive))?;
            Response::ok()
        }
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfs_core::{NamingConfig, RecordingCommands, StorageNodeInfo};
    use std::sync::Arc;

    fn naming() -> NamingCoordinator {
        NamingCoordinator::new(NamingConfig::default(), Arc::new(RecordingCommands::new()))
    }

    #[test]
    fn test_register_only_on_registration_listener() {
        let naming = naming();
        let node = StorageNodeInfo::new("127.0.0.1", 7000, 7001);

        let response = process_request(&naming, Request::register(&node, vec![]), Listener::Service);
        assert!(matches!(
            response,
            Response::Error {
                kind: ErrorKind::InvalidRequest,
                ..
            }
        ));

        let response = process_request(&naming, Request::list("/"), Listener::Registration);
        assert!(response.is_error());

        let response =
            process_request(&naming, Request::register(&node, vec![]), Listener::Registration);
        assert_eq!(response, Response::files(vec![]));
    }

    #[test]
    fn test_invalid_path_is_reported() {
        let naming = naming();
        let response = process_request(&naming, Request::delete("nope"), Listener::Service);
        assert!(matches!(
            response,
            Response::Error {
                kind: ErrorKind::InvalidPath,
                ..
            }
        ));
        assert_eq!(
            process_request(&naming, Request::is_valid_path("nope"), Listener::Service),
            Response::boolean(false)
        );
    }

    #[test]
    fn test_unlock_and_queries_never_block() {
        assert!(!may_block(&Request::unlock("/d", LockMode::Exclusive)));
        assert!(!may_block(&Request::list("/")));
        assert!(!may_block(&Request::get_storage("/f")));
        assert!(may_block(&Request::lock("/d", LockMode::Shared)));
        assert!(may_block(&Request::delete("/d")));
        let node = StorageNodeInfo::new("127.0.0.1", 7000, 7001);
        assert!(may_block(&Request::register(&node, vec![])));
    }

    #[test]
    fn test_lock_round_trip() {
        let naming = naming();
        assert_eq!(
            process_request(&naming, Request::create_directory("/d"), Listener::Service),
            Response::boolean(true)
        );
        assert_eq!(
            process_request(&naming, Request::lock("/d", LockMode::Exclusive), Listener::Service),
            Response::ok()
        );
        assert_eq!(
            process_request(&naming, Request::unlock("/d", LockMode::Exclusive), Listener::Service),
            Response::ok()
        );
        assert!(matches!(
            process_request(&naming, Request::unlock("/gone", LockMode::Shared), Listener::Service),
            Response::Error {
                kind: ErrorKind::NotFound,
                ..
            }
        ));
    }
}
