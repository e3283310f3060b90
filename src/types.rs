use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pagination::PageParams;

// Request bodies

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Query string of the post listings. Everything stays a string until validated.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PostListQuery {
    pub author_id: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    #[serde(flatten)]
    pub page: PageParams,
}

// Wire representations

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDto {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub total_posts: i64,
    pub total_comments: i64,
    pub followers: Vec<UserSummary>,
    pub following: Vec<UserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentDto {
    pub id: i64,
    pub author: UserSummary,
    pub post: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDto {
    pub id: i64,
    pub author: UserSummary,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub comments: Vec<CommentDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowResponse {
    pub success: String,
}
