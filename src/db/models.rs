use serde::{Deserialize, Serialize};

/// A forum as stored. Identity is `url`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Forum {
    pub id: i64,
    pub url: String,
    pub group_name: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub subjects: Option<i64>,
    pub replies: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// A thread as stored. Identity is `url`; owned by one forum.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Thread {
    pub id: i64,
    pub forum_id: i64,
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    pub replies: Option<i64>,
    pub views: Option<i64>,
    pub last_date: Option<String>,
    pub last_author: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A post as stored. Identity is `(thread_id, post_number)`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub thread_id: i64,
    pub post_number: i64,
    pub author: String,
    pub content: String,
    pub post_date: Option<String>,
    pub created_at: String,
}

/// Forum fields extracted from the index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewForum {
    pub url: String,
    pub group_name: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub subjects: Option<i64>,
    pub replies: Option<i64>,
}

/// Thread fields extracted from a forum listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewThread {
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    pub replies: Option<i64>,
    pub views: Option<i64>,
    pub last_date: Option<String>,
    pub last_author: Option<String>,
}

/// Post fields extracted from a thread page, before numbering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub author: String,
    pub content: String,
    pub post_date: Option<String>,
}
