// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, required, ValidationError};

/// A reply embedded in its parent comment.
///
/// Carries its own `replyId` so it can be pulled without touching siblings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub reply_id: String,
    pub reply_body: String,
    pub written_by: String,
    pub created_at: DateTime<Utc>,
}

/// Stored comment document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: String,
    pub written_by: String,
    pub comment_body: String,
    pub created_at: DateTime<Utc>,
    pub replies: Vec<Reply>,
}

/// Comment as returned over HTTP, with `replyCount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub reply_count: usize,
}

impl From<Comment> for CommentView {
    fn from(comment: Comment) -> Self {
        Self {
            reply_count: comment.replies.len(),
            comment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    #[serde(default)]
    pub written_by: String,
    #[serde(default)]
    pub comment_body: String,
}

impl NewComment {
    pub fn new(written_by: impl Into<String>, comment_body: impl Into<String>) -> Self {
        Self {
            written_by: written_by.into(),
            comment_body: comment_body.into(),
        }
    }

    pub fn into_comment(self, now: DateTime<Utc>) -> Result<Comment, ValidationError> {
        Ok(Comment {
            id: new_id(),
            written_by: required(self.written_by, "writtenBy", "Please provide a name")?,
            comment_body: required(self.comment_body, "commentBody", "Please provide a comment")?,
            created_at: now,
            replies: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReply {
    #[serde(default)]
    pub written_by: String,
    #[serde(default)]
    pub reply_body: String,
}

impl NewReply {
    pub fn new(written_by: impl Into<String>, reply_body: impl Into<String>) -> Self {
        Self {
            written_by: written_by.into(),
            reply_body: reply_body.into(),
        }
    }

    pub fn into_reply(self, now: DateTime<Utc>) -> Result<Reply, ValidationError> {
        Ok(Reply {
            reply_id: new_id(),
            reply_body: required(self.reply_body, "replyBody", "Please provide text for reply")?,
            written_by: required(self.written_by, "writtenBy", "Please provide a name")?,
            created_at: now,
        })
    }
}

impl Comment {
    /// Remove the reply with `reply_id`. Returns false if there was none.
    pub fn pull_reply(&mut self, reply_id: &str) -> bool {
        let before = self.replies.len();
        self.replies.retain(|r| r.reply_id != reply_id);
        self.replies.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_comment_requires_body() {
        let err = NewComment::new("Ann", "").into_comment(Utc::now()).unwrap_err();
        assert_eq!(err.field, "commentBody");
        assert_eq!(err.message, "Please provide a comment");
    }

    #[test]
    fn test_reply_requires_body_then_author() {
        let err = NewReply::new("", " ").into_reply(Utc::now()).unwrap_err();
        assert_eq!(err.field, "replyBody");

        let err = NewReply::new("", "ok").into_reply(Utc::now()).unwrap_err();
        assert_eq!(err.field, "writtenBy");
    }

    #[test]
    fn test_reply_body_is_trimmed() {
        let reply = NewReply::new("Bo", "  yes  ").into_reply(Utc::now()).unwrap();
        assert_eq!(reply.reply_body, "yes");
        assert!(!reply.reply_id.is_empty());
    }

    #[test]
    fn test_pull_reply() {
        let mut comment = NewComment::new("Ann", "Hi").into_comment(Utc::now()).unwrap();
        let reply = NewReply::new("Bo", "Hey").into_reply(Utc::now()).unwrap();
        let reply_id = reply.reply_id.clone();
        comment.replies.push(reply);

        assert!(!comment.pull_reply("missing"));
        assert!(comment.pull_reply(&reply_id));
        assert!(comment.replies.is_empty());
    }

    #[test]
    fn test_view_flattens_comment() {
        let comment = NewComment::new("Ann", "Hi").into_comment(Utc::now()).unwrap();
        let value = serde_json::to_value(CommentView::from(comment.clone())).unwrap();
        assert_eq!(value["_id"], json!(comment.id));
        assert_eq!(value["writtenBy"], json!("Ann"));
        assert_eq!(value["replyCount"], json!(0));
        assert_eq!(value["replies"], json!([]));
    }
}
