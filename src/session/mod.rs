//! Session and Authentication
//!
//! Owns the process-wide [`Session`] value. Credentials live in a
//! [`CredentialStore`], the last signed-in username and the selected target
//! language live in a [`PreferenceStore`]. Observers follow changes through a
//! `watch` channel.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::storage::preferences::{LAST_USERNAME_KEY, TARGET_LANGUAGE_KEY};
use crate::storage::{CredentialStore, PreferenceStore, StorageError};
use crate::translation::Language;

/// Current login state and UI preferences
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub is_logged_in: bool,
    pub current_username: Option<String>,
    pub target_language: Language,
}

impl Session {
    fn logged_out(target_language: Language) -> Self {
        Self {
            is_logged_in: false,
            current_username: None,
            target_language,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::logged_out(Language::default())
    }
}

/// Authentication failure
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown user or wrong password; deliberately indistinguishable
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("{0}")]
    InvalidInput(&'static str),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Owner of the session value
pub struct SessionController {
    credentials: Arc<dyn CredentialStore>,
    preferences: Arc<dyn PreferenceStore>,
    session: watch::Sender<Session>,
}

impl SessionController {
    /// Create a logged-out controller
    ///
    /// The target language is restored from preferences when a valid one is
    /// stored, otherwise `default_language` is used.
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        preferences: Arc<dyn PreferenceStore>,
        default_language: Language,
    ) -> Self {
        let target_language = match preferences.get(TARGET_LANGUAGE_KEY) {
            Ok(Some(code)) => code.parse::<Language>().unwrap_or_else(|e| {
                warn!("Ignoring stored target language: {}", e);
                default_language
            }),
            Ok(None) => default_language,
            Err(e) => {
                warn!("Failed to read stored target language: {}", e);
                default_language
            }
        };

        let (session, _) = watch::channel(Session::logged_out(target_language));

        Self {
            credentials,
            preferences,
            session,
        }
    }

    /// Snapshot of the current session
    pub fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    /// Follow session changes
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    pub fn target_language(&self) -> Language {
        self.session.borrow().target_language
    }

    /// Log in when the stored password for `username` matches exactly
    pub fn login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        match self.credentials.get(username)? {
            Some(stored) if stored == password => {}
            _ => {
                debug!("Login rejected");
                return Err(AuthError::InvalidCredentials);
            }
        }

        self.preferences.set(LAST_USERNAME_KEY, username)?;
        self.mark_logged_in(username);
        info!("Logged in as {}", username);
        Ok(())
    }

    /// Create an account and log it in
    ///
    /// An existing account with the same username is overwritten without
    /// warning. The email is validated but not stored.
    pub fn signup(&self, username: &str, email: &str, password: &str) -> Result<(), AuthError> {
        if username.is_empty() {
            return Err(AuthError::InvalidInput("username must not be empty"));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput("password must not be empty"));
        }
        if !email.contains('@') {
            return Err(AuthError::InvalidInput("email must contain '@'"));
        }

        self.credentials.save(username, password)?;
        self.preferences.set(LAST_USERNAME_KEY, username)?;
        self.mark_logged_in(username);
        info!("Account created for {}", username);
        Ok(())
    }

    /// Log out and delete the account's stored credential
    ///
    /// Uses the current username, falling back to the stored last-username
    /// pointer. The in-memory session is reset first; pointer removal and
    /// credential deletion are each attempted even if the other fails, and the
    /// first storage error is returned.
    pub fn logout(&self) -> Result<(), AuthError> {
        let current = self.session.borrow().current_username.clone();
        let target_language = self.target_language();
        self.session.send_replace(Session::logged_out(target_language));

        let mut first_error: Option<StorageError> = None;

        let username = match current {
            Some(name) => Some(name),
            None => self.preferences.get(LAST_USERNAME_KEY).unwrap_or_else(|e| {
                warn!("Failed to read last username: {}", e);
                first_error.get_or_insert(e);
                None
            }),
        };

        if let Err(e) = self.preferences.remove(LAST_USERNAME_KEY) {
            warn!("Failed to clear last username: {}", e);
            first_error.get_or_insert(e);
        }

        match username {
            Some(username) => match self.credentials.delete(&username) {
                Ok(removed) => info!("Logged out {} (credential removed: {})", username, removed),
                Err(e) => {
                    warn!("Failed to delete credential for {}: {}", username, e);
                    first_error.get_or_insert(e);
                }
            },
            None => debug!("Logout with no known user"),
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Resume the last signed-in account if its credential still exists
    pub fn restore_last_session(&self) -> Result<bool, AuthError> {
        let Some(username) = self.preferences.get(LAST_USERNAME_KEY)? else {
            return Ok(false);
        };

        if self.credentials.get(&username)?.is_none() {
            debug!("Last username has no stored credential");
            return Ok(false);
        }

        self.mark_logged_in(&username);
        debug!("Restored session for {}", username);
        Ok(true)
    }

    /// Select and persist the translation target
    pub fn set_target_language(&self, language: Language) -> Result<(), AuthError> {
        self.preferences.set(TARGET_LANGUAGE_KEY, language.code())?;
        self.session.send_modify(|session| session.target_language = language);
        info!("Target language set to {}", language.display_name());
        Ok(())
    }

    fn mark_logged_in(&self, username: &str) {
        self.session.send_modify(|session| {
            session.is_logged_in = true;
            session.current_username = Some(username.to_string());
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryCredentialStore, MemoryPreferenceStore};

    struct Fixture {
        credentials: Arc<MemoryCredentialStore>,
        preferences: Arc<MemoryPreferenceStore>,
        controller: SessionController,
    }

    fn fixture() -> Fixture {
        let credentials = Arc::new(MemoryCredentialStore::new());
        let preferences = Arc::new(MemoryPreferenceStore::new());
        let controller =
            SessionController::new(credentials.clone(), preferences.clone(), Language::English);
        Fixture {
            credentials,
            preferences,
            controller,
        }
    }

    #[test]
    fn test_starts_logged_out() {
        let f = fixture();
        let session = f.controller.session();
        assert!(!session.is_logged_in);
        assert!(session.current_username.is_none());
        assert_eq!(session.target_language, Language::English);
    }

    #[test]
    fn test_login_unknown_user_fails() {
        let f = fixture();
        let err = f.controller.login("ghost", "pw").unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(!f.controller.session().is_logged_in);
    }

    #[test]
    fn test_login_wrong_password_fails() {
        let f = fixture();
        f.credentials.save("ana", "secret").unwrap();

        let err = f.controller.login("ana", "Secret").unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[test]
    fn test_login_exact_match_succeeds() {
        let f = fixture();
        f.credentials.save("ana", "secret").unwrap();

        f.controller.login("ana", "secret").unwrap();
        let session = f.controller.session();
        assert!(session.is_logged_in);
        assert_eq!(session.current_username.as_deref(), Some("ana"));
        assert_eq!(
            f.preferences.get(LAST_USERNAME_KEY).unwrap().as_deref(),
            Some("ana")
        );
    }

    #[test]
    fn test_signup_validation() {
        let f = fixture();
        assert!(matches!(
            f.controller.signup("ana", "ana.example.com", "pw"),
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            f.controller.signup("", "ana@example.com", "pw"),
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            f.controller.signup("ana", "ana@example.com", ""),
            Err(AuthError::InvalidInput(_))
        ));
        assert!(f.credentials.is_empty());
        assert!(!f.controller.session().is_logged_in);
    }

    #[test]
    fn test_signup_logs_in_and_allows_login() {
        let f = fixture();
        f.controller.signup("ana", "ana@example.com", "pw").unwrap();
        assert!(f.controller.session().is_logged_in);

        f.controller.login("ana", "pw").unwrap();
    }

    #[test]
    fn test_signup_silently_overwrites_existing_account() {
        let f = fixture();
        f.controller.signup("ana", "ana@example.com", "first").unwrap();
        f.controller.signup("ana", "other@example.com", "second").unwrap();

        assert_eq!(f.credentials.len(), 1);
        assert!(matches!(
            f.controller.login("ana", "first"),
            Err(AuthError::InvalidCredentials)
        ));
        f.controller.login("ana", "second").unwrap();
    }

    #[test]
    fn test_logout_deletes_credential() {
        let f = fixture();
        f.controller.signup("ana", "ana@example.com", "pw").unwrap();

        f.controller.logout().unwrap();
        let session = f.controller.session();
        assert!(!session.is_logged_in);
        assert!(session.current_username.is_none());
        assert!(f.preferences.get(LAST_USERNAME_KEY).unwrap().is_none());

        assert!(matches!(
            f.controller.login("ana", "pw"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    /// Preference store whose writes and removals always fail
    struct ReadOnlyPreferences {
        inner: MemoryPreferenceStore,
    }

    impl PreferenceStore for ReadOnlyPreferences {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Corrupt(key.to_string()))
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            Err(StorageError::Corrupt(key.to_string()))
        }
    }

    #[test]
    fn test_logout_deletes_credential_when_pointer_removal_fails() {
        let credentials = Arc::new(MemoryCredentialStore::new());
        let inner = MemoryPreferenceStore::new();
        inner.set(LAST_USERNAME_KEY, "ana").unwrap();
        let controller = SessionController::new(
            credentials.clone(),
            Arc::new(ReadOnlyPreferences { inner }),
            Language::English,
        );
        credentials.save("ana", "pw").unwrap();
        assert!(controller.restore_last_session().unwrap());

        let err = controller.logout().unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));
        assert!(!controller.session().is_logged_in);
        assert!(credentials.get("ana").unwrap().is_none());
    }

    #[test]
    fn test_logout_falls_back_to_last_username_pointer() {
        let f = fixture();
        f.credentials.save("ana", "pw").unwrap();
        f.preferences.set(LAST_USERNAME_KEY, "ana").unwrap();

        f.controller.logout().unwrap();
        assert!(f.credentials.get("ana").unwrap().is_none());
    }

    #[test]
    fn test_logout_keeps_target_language() {
        let f = fixture();
        f.controller.set_target_language(Language::German).unwrap();
        f.controller.signup("ana", "ana@example.com", "pw").unwrap();
        f.controller.logout().unwrap();

        assert_eq!(f.controller.target_language(), Language::German);
    }

    #[test]
    fn test_target_language_persists_across_controllers() {
        let f = fixture();
        f.controller.set_target_language(Language::Russian).unwrap();

        let restored =
            SessionController::new(f.credentials.clone(), f.preferences.clone(), Language::English);
        assert_eq!(restored.target_language(), Language::Russian);
    }

    #[test]
    fn test_invalid_stored_language_uses_default() {
        let f = fixture();
        f.preferences.set(TARGET_LANGUAGE_KEY, "tlh").unwrap();

        let controller =
            SessionController::new(f.credentials.clone(), f.preferences.clone(), Language::French);
        assert_eq!(controller.target_language(), Language::French);
    }

    #[test]
    fn test_restore_last_session() {
        let f = fixture();
        assert!(!f.controller.restore_last_session().unwrap());

        f.credentials.save("ana", "pw").unwrap();
        f.preferences.set(LAST_USERNAME_KEY, "ana").unwrap();
        assert!(f.controller.restore_last_session().unwrap());
        assert_eq!(f.controller.session().current_username.as_deref(), Some("ana"));
    }

    #[tokio::test]
    async fn test_subscribers_observe_changes() {
        let f = fixture();
        let mut rx = f.controller.subscribe();

        f.controller.signup("ana", "ana@example.com", "pw").unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_logged_in);
    }
}
