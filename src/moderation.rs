//! Moderation Service.
//!
//! `(model, id, action)` triples from the moderation URL are parsed into a closed
//! set of transitions; anything outside the per-model allow-list never parses.

use crate::auth::{Permission, Viewer};
use crate::models::{AllowedMods, Status};
use crate::repository::{RepoResult, Repository};
use crate::urls;

/// EntityKind
///
/// The models that can be moderated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Question,
    Response,
}

impl EntityKind {
    pub fn parse(model: &str) -> Option<Self> {
        match model {
            "question" => Some(EntityKind::Question),
            "response" => Some(EntityKind::Response),
            _ => None,
        }
    }

    /// The change permission required to moderate this model.
    pub fn required_permission(self) -> Permission {
        match self {
            EntityKind::Question => Permission::ChangeQuestion,
            EntityKind::Response => Permission::ChangeResponse,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionAction {
    Private,
    Public,
    Delete,
    Lock,
    ClearAccepted,
}

impl QuestionAction {
    pub const ALL: [QuestionAction; 5] = [
        QuestionAction::Private,
        QuestionAction::Public,
        QuestionAction::Delete,
        QuestionAction::Lock,
        QuestionAction::ClearAccepted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionAction::Private => "private",
            QuestionAction::Public => "public",
            QuestionAction::Delete => "delete",
            QuestionAction::Lock => "lock",
            QuestionAction::ClearAccepted => "clear_accepted",
        }
    }

    pub fn parse(action: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == action)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseAction {
    Internal,
    Inherit,
    Private,
    Public,
    Delete,
    Accept,
}

impl ResponseAction {
    pub const ALL: [ResponseAction; 6] = [
        ResponseAction::Internal,
        ResponseAction::Inherit,
        ResponseAction::Private,
        ResponseAction::Public,
        ResponseAction::Delete,
        ResponseAction::Accept,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResponseAction::Internal => "internal",
            ResponseAction::Inherit => "inherit",
            ResponseAction::Private => "private",
            ResponseAction::Public => "public",
            ResponseAction::Delete => "delete",
            ResponseAction::Accept => "accept",
        }
    }

    pub fn parse(action: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == action)
    }
}

/// Moderation
///
/// A fully validated moderation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Moderation {
    Question { id: i64, action: QuestionAction },
    Response { id: i64, action: ResponseAction },
}

impl Moderation {
    /// Pairs a model with an action from that model's allow-list.
    pub fn new(kind: EntityKind, id: i64, action: &str) -> Option<Self> {
        match kind {
            EntityKind::Question => {
                QuestionAction::parse(action).map(|action| Moderation::Question { id, action })
            }
            EntityKind::Response => {
                ResponseAction::parse(action).map(|action| Moderation::Response { id, action })
            }
        }
    }
}

/// The allow-lists as shown on the thread page.
pub fn allowed_mods() -> AllowedMods {
    AllowedMods {
        question: QuestionAction::ALL.iter().map(|a| a.as_str().to_string()).collect(),
        response: ResponseAction::ALL.iter().map(|a| a.as_str().to_string()).collect(),
    }
}

/// apply
///
/// Runs the transition on an entity `viewer` can see and returns where to send
/// the caller afterwards. `None` means the target is missing or invisible.
pub async fn apply(
    repo: &dyn Repository,
    viewer: &Viewer,
    moderation: Moderation,
) -> RepoResult<Option<String>> {
    match moderation {
        Moderation::Question { id, action } => {
            let Some(question) = repo.get_visible_question(viewer, id).await? else {
                return Ok(None);
            };
            match action {
                QuestionAction::Private => repo.set_question_status(id, Status::Private).await?,
                QuestionAction::Public => repo.set_question_status(id, Status::Public).await?,
                QuestionAction::Lock => repo.toggle_question_lock(id).await?,
                QuestionAction::ClearAccepted => repo.clear_accepted(id).await?,
                QuestionAction::Delete => repo.delete_question(id).await?,
            }
            tracing::info!(question_id = id, action = action.as_str(), "question moderated");

            // A deleted question has no address left.
            let location = match action {
                QuestionAction::Delete => urls::INDEX_PATH.to_string(),
                _ => question.canonical_url(),
            };
            Ok(Some(location))
        }
        Moderation::Response { id, action } => {
            let Some(response) = repo.get_visible_response(viewer, id).await? else {
                return Ok(None);
            };
            match action {
                ResponseAction::Internal => repo.set_response_status(id, Status::Internal).await?,
                ResponseAction::Inherit => repo.set_response_status(id, Status::Inherit).await?,
                ResponseAction::Private => repo.set_response_status(id, Status::Private).await?,
                ResponseAction::Public => repo.set_response_status(id, Status::Public).await?,
                ResponseAction::Delete => repo.delete_response(id).await?,
                ResponseAction::Accept => repo.accept_response(id).await?,
            }
            tracing::info!(response_id = id, action = action.as_str(), "response moderated");

            let location = repo
                .get_question(response.question_id)
                .await?
                .map(|question| question.canonical_url())
                .unwrap_or_else(|| urls::INDEX_PATH.to_string());
            Ok(Some(location))
        }
    }
}
