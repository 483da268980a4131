use std::sync::Arc;

use protocol::{Handler, HandlerError, HandlerResult, Outcome, Request, SessionOutcome};

use crate::directory::Directory;

/// Form fields of `POST /login`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    /// Decodes an `application/x-www-form-urlencoded` body. Missing fields
    /// decode as empty strings.
    pub fn parse(body: &[u8]) -> Self {
        let mut form = LoginForm::default();
        for (key, value) in url::form_urlencoded::parse(body) {
            match key.as_ref() {
                "username" if form.username.is_empty() => form.username = value.into_owned(),
                "password" if form.password.is_empty() => form.password = value.into_owned(),
                _ => {}
            }
        }
        form
    }
}

pub struct LoginHandler {
    directory: Arc<Directory>,
}

impl LoginHandler {
    pub fn new(directory: Arc<Directory>) -> Self {
        Self { directory }
    }
}

impl Handler for LoginHandler {
    fn call(&self, request: &Request) -> HandlerResult {
        let form = LoginForm::parse(&request.body);
        log::info!("Login attempt for user: {}", form.username);

        match self.directory.login(&form.username, &form.password) {
            Ok(session) => Ok(Outcome::Session(SessionOutcome::Issued {
                session_id: session.session_id,
            })),
            Err(err) if err.is_fault() => Err(HandlerError::Internal(err.to_string())),
            Err(err) => Ok(Outcome::Session(SessionOutcome::Rejected {
                reason: err.to_string(),
            })),
        }
    }
}
