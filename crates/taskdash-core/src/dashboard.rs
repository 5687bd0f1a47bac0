//! Controller tying the view state to the backend and the stored session.
//!
//! Transport and API failures from mutating actions are reported as
//! [`Notice`]s and leave the current view intact. Authentication
//! failures are terminal: the stored session is discarded and
//! [`DashboardError::SessionExpired`] is returned.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiClient, ApiError};
use crate::datetime::DayClock;
use crate::session::{Session, SessionStore};
use crate::task::{RegisterResponse, Task, TaskInput, User};
use crate::view::{DerivedView, StatusFilter, TaskViewState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("not logged in; run `taskdash login <login>` first")]
    NotLoggedIn,

    #[error("session expired or was rejected; log in again")]
    SessionExpired,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub struct Dashboard {
    api: ApiClient,
    sessions: SessionStore,
    clock: DayClock,
    state: TaskViewState,
    user: Option<User>,
    notices: Vec<Notice>,
}

impl Dashboard {
    pub fn new(api: ApiClient, sessions: SessionStore, clock: DayClock) -> Self {
        Self {
            api,
            sessions,
            state: TaskViewState::new(clock.today()),
            clock,
            user: None,
            notices: Vec::new(),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn view_state(&self) -> &TaskViewState {
        &self.state
    }

    pub fn view(&self) -> &DerivedView {
        self.state.derived_view()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn has_errors(&self) -> bool {
        self.notices
            .iter()
            .any(|notice| notice.level == NoticeLevel::Error)
    }

    /// Restores the stored session and confirms it with `GET /me`.
    #[instrument(skip(self))]
    pub async fn authenticate(&mut self) -> Result<&User, DashboardError> {
        let session = self.sessions.load()?.ok_or(DashboardError::NotLoggedIn)?;
        self.api.set_token(Some(session.token));

        match self.api.me().await {
            Ok(user) => {
                debug!(login = %user.login, "session confirmed");
                Ok(self.user.insert(user))
            }
            Err(err) => {
                warn!(error = %err, "session check failed");
                Err(self.expire()?)
            }
        }
    }

    #[instrument(skip(self, password))]
    pub async fn login(&mut self, login: &str, password: &str) -> Result<Session, DashboardError> {
        let response = self.api.login(login, password).await?;
        let session = Session {
            token: response.token,
            login: response.login,
            user_id: response.id,
        };
        self.sessions.save(&session)?;
        self.api.set_token(Some(session.token.clone()));
        info!(login = %session.login, "logged in");
        Ok(session)
    }

    #[instrument(skip(self, password))]
    pub async fn register(
        &mut self,
        login: &str,
        password: &str,
    ) -> Result<RegisterResponse, DashboardError> {
        let response = self.api.register(login, password).await?;
        info!(login = %response.login, id = %response.id, "registered");
        Ok(response)
    }

    /// Swaps the stored token for a fresh one.
    #[instrument(skip(self))]
    pub async fn refresh_token(&mut self) -> Result<(), DashboardError> {
        let mut session = self.sessions.load()?.ok_or(DashboardError::NotLoggedIn)?;
        self.api.set_token(Some(session.token.clone()));

        match self.api.refresh_token().await {
            Ok(token) => {
                session.token = token;
                self.sessions.save(&session)?;
                self.api.set_token(Some(session.token));
                self.notices.push(Notice::success("Session token refreshed"));
                Ok(())
            }
            Err(err) if err.is_auth_failure() => Err(self.expire()?),
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(skip(self))]
    pub fn logout(&mut self) -> Result<(), DashboardError> {
        self.sessions.clear()?;
        self.api.set_token(None);
        self.user = None;
        self.state.load_snapshot(Vec::new());
        Ok(())
    }

    /// Fetches the full collection and loads it as the new snapshot.
    /// On failure the previous snapshot stays in place.
    #[instrument(skip(self))]
    pub async fn reload(&mut self) -> Result<bool, DashboardError> {
        self.state.set_today(self.clock.today());
        match self.api.list_tasks().await {
            Ok(tasks) => {
                self.state.load_snapshot(tasks);
                Ok(true)
            }
            Err(err) => self.report_failure("Failed to load tasks", err),
        }
    }

    /// Single task for edit pre-fill.
    #[instrument(skip(self))]
    pub async fn fetch_task(&mut self, id: &str) -> Result<Option<Task>, DashboardError> {
        match self.api.get_task(id).await {
            Ok(task) => Ok(Some(task)),
            Err(err) => self
                .report_failure("Failed to load task", err)
                .map(|_| None),
        }
    }

    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_task(&mut self, input: &TaskInput) -> Result<bool, DashboardError> {
        match self.api.create_task(input).await {
            Ok(task) => {
                info!(id = %task.id, "task created");
                self.notices.push(Notice::success("Task created"));
                self.reload().await?;
                Ok(true)
            }
            Err(err) => self.report_failure("Failed to create task", err),
        }
    }

    #[instrument(skip(self, input))]
    pub async fn update_task(&mut self, id: &str, input: &TaskInput) -> Result<bool, DashboardError> {
        match self.api.update_task(id, input).await {
            Ok(_) => {
                info!(id, "task updated");
                self.notices.push(Notice::success("Task updated"));
                self.reload().await?;
                Ok(true)
            }
            Err(err) => self.report_failure("Failed to update task", err),
        }
    }

    #[instrument(skip(self))]
    pub async fn toggle_task(&mut self, id: &str) -> Result<bool, DashboardError> {
        match self.api.toggle_task(id).await {
            Ok(task) => {
                info!(id, status = %task.status, "task toggled");
                self.notices.push(Notice::success(format!(
                    "Task {} is now {}",
                    task.id, task.status
                )));
                self.reload().await?;
                Ok(true)
            }
            Err(err) => self.report_failure("Failed to update task", err),
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_task(&mut self, id: &str) -> Result<bool, DashboardError> {
        match self.api.delete_task(id).await {
            Ok(()) => {
                info!(id, "task deleted");
                self.notices.push(Notice::success("Task deleted"));
                self.reload().await?;
                Ok(true)
            }
            Err(err) => self.report_failure("Failed to delete task", err),
        }
    }

    pub fn set_status_filter(&mut self, filter: StatusFilter) {
        self.state.set_status_filter(filter);
    }

    pub fn set_search_term(&mut self, term: &str) {
        self.state.set_search_term(term);
    }

    pub fn set_page(&mut self, page: usize) -> bool {
        self.state.set_page(page)
    }

    pub fn next_page(&mut self) -> bool {
        self.state.next_page()
    }

    pub fn prev_page(&mut self) -> bool {
        self.state.prev_page()
    }

    fn report_failure(&mut self, context: &str, err: ApiError) -> Result<bool, DashboardError> {
        if err.is_auth_failure() {
            warn!(error = %err, context, "authentication rejected");
            return Err(self.expire()?);
        }

        warn!(error = %err, context, "action failed");
        self.notices.push(Notice::error(format!("{context}: {err}")));
        Ok(false)
    }

    fn expire(&mut self) -> anyhow::Result<DashboardError> {
        self.sessions.clear()?;
        self.api.set_token(None);
        self.user = None;
        Ok(DashboardError::SessionExpired)
    }
}
