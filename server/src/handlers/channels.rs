use std::sync::Arc;

use protocol::{ChannelRequest, Handler, HandlerResult, Outcome, Request};
use serde_json::json;

use super::{caller, failed, respond};
use crate::directory::Directory;
use crate::error::DirectoryError;

/// Declares a handler struct holding the shared [`Directory`].
macro_rules! directory_handler {
    ($($name:ident),+ $(,)?) => {
        $(
            pub struct $name {
                directory: Arc<Directory>,
            }

            impl $name {
                pub fn new(directory: Arc<Directory>) -> Self {
                    Self { directory }
                }
            }
        )+
    };
}

directory_handler!(
    CreateChannelHandler,
    JoinChannelHandler,
    QuitChannelHandler,
    ChannelPeersHandler,
    ChannelListHandler,
    MeHandler,
);

fn channel_body(request: &Request) -> Result<ChannelRequest, Outcome> {
    request
        .json::<ChannelRequest>()
        .map_err(|err| failed(DirectoryError::InvalidBody(err.to_string())))
}

/// Resolves the caller and the channel body, or the `failed` outcome to send.
fn caller_and_channel(request: &Request) -> Result<(&str, ChannelRequest), Outcome> {
    let username = caller(request).map_err(failed)?;
    let body = channel_body(request)?;
    Ok((username, body))
}

impl Handler for CreateChannelHandler {
    fn call(&self, request: &Request) -> HandlerResult {
        let (username, body) = match caller_and_channel(request) {
            Ok(parts) => parts,
            Err(outcome) => return Ok(outcome),
        };
        respond(
            self.directory
                .create_channel(username, body.channel_name.as_deref()),
            |channel| json!({"status": "created", "channel": channel}),
        )
    }
}

impl Handler for JoinChannelHandler {
    fn call(&self, request: &Request) -> HandlerResult {
        let (username, body) = match caller_and_channel(request) {
            Ok(parts) => parts,
            Err(outcome) => return Ok(outcome),
        };
        respond(
            self.directory
                .join_channel(username, body.channel_name.as_deref()),
            |channel| json!({"status": "joined", "channel": channel}),
        )
    }
}

impl Handler for QuitChannelHandler {
    fn call(&self, request: &Request) -> HandlerResult {
        let username = match caller(request) {
            Ok(username) => username,
            Err(err) => return Ok(failed(err)),
        };
        respond(self.directory.quit_channel(username), |channel| {
            json!({"status": "quit", "channel": channel})
        })
    }
}

impl Handler for ChannelPeersHandler {
    fn call(&self, request: &Request) -> HandlerResult {
        let (username, body) = match caller_and_channel(request) {
            Ok(parts) => parts,
            Err(outcome) => return Ok(outcome),
        };
        respond(
            self.directory
                .channel_peers(username, body.channel_name.as_deref()),
            |peers| json!(peers),
        )
    }
}

impl Handler for ChannelListHandler {
    fn call(&self, request: &Request) -> HandlerResult {
        if let Err(err) = caller(request) {
            return Ok(failed(err));
        }
        respond(self.directory.channel_list(), |channels| {
            json!({"status": "ok", "channels": channels})
        })
    }
}

impl Handler for MeHandler {
    fn call(&self, request: &Request) -> HandlerResult {
        let Ok(username) = caller(request) else {
            return Ok(Outcome::Json(json!({"status": "unauthorized"})));
        };
        respond(self.directory.me(username), |me| {
            json!({
                "status": "ok",
                "username": me.username,
                "is_registered": me.is_registered,
                "current_channel": me.current_channel,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use serde_json::Value;

    struct Fixture {
        directory: Arc<Directory>,
    }

    impl Fixture {
        fn new() -> Self {
            let directory = Arc::new(Directory::new(Arc::new(MemoryStore::default())));
            directory
                .register("alice", "127.0.0.1".parse().unwrap(), 50001)
                .unwrap();
            Self { directory }
        }

        fn call(&self, handler: &dyn Handler, user: Option<&str>, body: &str) -> Value {
            let raw = format!(
                "POST /channels HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            );
            let mut request = Request::parse(raw.as_bytes()).unwrap();
            request.authenticated_user = user.map(str::to_string);
            match handler.call(&request).unwrap() {
                Outcome::Json(value) => value,
                other => panic!("unexpected outcome: {:?}", other),
            }
        }
    }

    #[test]
    fn test_create_join_and_quit() {
        let fx = Fixture::new();
        let create = CreateChannelHandler::new(fx.directory.clone());
        let join = JoinChannelHandler::new(fx.directory.clone());
        let quit = QuitChannelHandler::new(fx.directory.clone());

        assert_eq!(
            fx.call(&create, Some("alice"), r#"{"channel_name": "team"}"#),
            json!({"status": "created", "channel": "team"})
        );
        assert_eq!(
            fx.call(&create, Some("alice"), r#"{"channel_name": "team"}"#),
            json!({"status": "failed", "reason": "Channel already exists"})
        );
        assert_eq!(
            fx.call(&join, Some("alice"), r#"{"channel_name": "nowhere"}"#),
            json!({"status": "failed", "reason": "Channel does not exist"})
        );
        assert_eq!(
            fx.call(&quit, Some("alice"), ""),
            json!({"status": "quit", "channel": "global"})
        );
    }

    #[test]
    fn test_unregistered_and_missing_name() {
        let fx = Fixture::new();
        let join = JoinChannelHandler::new(fx.directory.clone());

        assert_eq!(
            fx.call(&join, Some("bob"), r#"{"channel_name": "global"}"#),
            json!({"status": "failed", "reason": "haven't register to the system"})
        );
        assert_eq!(
            fx.call(&join, Some("alice"), "{}"),
            json!({"status": "failed", "reason": "channel_name required"})
        );
        assert_eq!(fx.call(&join, Some("alice"), "not json")["status"], "failed");
    }

    #[test]
    fn test_channel_peers_and_list() {
        let fx = Fixture::new();
        let peers = ChannelPeersHandler::new(fx.directory.clone());
        let list = ChannelListHandler::new(fx.directory.clone());

        assert_eq!(
            fx.call(&peers, Some("alice"), r#"{"channel_name": "global"}"#),
            json!({"alice": {"ip": "127.0.0.1", "port": 50001}})
        );
        assert_eq!(
            fx.call(&list, Some("alice"), ""),
            json!({"status": "ok", "channels": ["global"]})
        );
    }

    #[test]
    fn test_me_projection() {
        let fx = Fixture::new();
        let me = MeHandler::new(fx.directory.clone());

        assert_eq!(
            fx.call(&me, Some("alice"), ""),
            json!({
                "status": "ok",
                "username": "alice",
                "is_registered": true,
                "current_channel": "global",
            })
        );
        assert_eq!(
            fx.call(&me, Some("carol"), "")["current_channel"],
            Value::Null
        );
        assert_eq!(fx.call(&me, None, ""), json!({"status": "unauthorized"}));
    }
}
