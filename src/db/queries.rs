use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::models::{Forum, NewForum, NewPost, NewThread, Post, Thread};
use crate::ensure::{ensure, Ensured};

// ========== Forums ==========

/// Get a forum by its source URL.
pub async fn get_forum_by_url(pool: &SqlitePool, url: &str) -> Result<Option<Forum>> {
    sqlx::query_as("SELECT * FROM forums WHERE url = ?")
        .bind(url)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch forum by url")
}

async fn find_forum_id(pool: &SqlitePool, url: &str) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM forums WHERE url = ?")
        .bind(url)
        .fetch_optional(pool)
        .await
        .context("Failed to look up forum id")?;
    Ok(row.map(|(id,)| id))
}

/// Insert a forum. A row with the same URL written since the lookup is
/// updated in the same statement instead.
async fn insert_forum(pool: &SqlitePool, forum: &NewForum) -> Result<i64> {
    let (id,): (i64,) = sqlx::query_as(
        r"
        INSERT INTO forums (url, group_name, title, description, subjects, replies)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(url) DO UPDATE SET
            group_name = excluded.group_name,
            title = excluded.title,
            description = excluded.description,
            subjects = excluded.subjects,
            replies = excluded.replies,
            updated_at = datetime('now')
        RETURNING id
        ",
    )
    .bind(&forum.url)
    .bind(&forum.group_name)
    .bind(&forum.title)
    .bind(&forum.description)
    .bind(forum.subjects)
    .bind(forum.replies)
    .fetch_one(pool)
    .await
    .context("Failed to insert forum")?;

    Ok(id)
}

async fn update_forum(pool: &SqlitePool, id: i64, forum: &NewForum) -> Result<()> {
    sqlx::query(
        r"
        UPDATE forums
        SET group_name = ?, title = ?, description = ?, subjects = ?, replies = ?,
            updated_at = datetime('now')
        WHERE id = ?
        ",
    )
    .bind(&forum.group_name)
    .bind(&forum.title)
    .bind(&forum.description)
    .bind(forum.subjects)
    .bind(forum.replies)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update forum")?;

    Ok(())
}

/// Insert a forum, or replace every non-identity field of the forum with the
/// same URL. Returns the (stable) row id.
pub async fn upsert_forum(pool: &SqlitePool, forum: &NewForum) -> Result<i64> {
    match ensure(find_forum_id(pool, &forum.url), || insert_forum(pool, forum)).await? {
        Ensured::Found(id) => {
            update_forum(pool, id, forum).await?;
            Ok(id)
        }
        Ensured::Created(id) => Ok(id),
    }
}

/// All forums, ordered by group then title.
pub async fn list_forums(pool: &SqlitePool) -> Result<Vec<Forum>> {
    sqlx::query_as("SELECT * FROM forums ORDER BY group_name, title, id")
        .fetch_all(pool)
        .await
        .context("Failed to list forums")
}

// ========== Threads ==========

/// Get a thread by its canonical first-page URL.
pub async fn get_thread_by_url(pool: &SqlitePool, url: &str) -> Result<Option<Thread>> {
    sqlx::query_as("SELECT * FROM threads WHERE url = ?")
        .bind(url)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch thread by url")
}

async fn find_thread_id(pool: &SqlitePool, url: &str) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM threads WHERE url = ?")
        .bind(url)
        .fetch_optional(pool)
        .await
        .context("Failed to look up thread id")?;
    Ok(row.map(|(id,)| id))
}

async fn insert_thread(pool: &SqlitePool, thread: &NewThread, forum_id: i64) -> Result<i64> {
    let (id,): (i64,) = sqlx::query_as(
        r"
        INSERT INTO threads (forum_id, url, title, author, replies, views, last_date, last_author)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(url) DO UPDATE SET
            forum_id = excluded.forum_id,
            title = excluded.title,
            author = excluded.author,
            replies = excluded.replies,
            views = excluded.views,
            last_date = excluded.last_date,
            last_author = excluded.last_author,
            updated_at = datetime('now')
        RETURNING id
        ",
    )
    .bind(forum_id)
    .bind(&thread.url)
    .bind(&thread.title)
    .bind(&thread.author)
    .bind(thread.replies)
    .bind(thread.views)
    .bind(&thread.last_date)
    .bind(&thread.last_author)
    .fetch_one(pool)
    .await
    .context("Failed to insert thread")?;

    Ok(id)
}

async fn update_thread(pool: &SqlitePool, id: i64, thread: &NewThread, forum_id: i64) -> Result<()> {
    sqlx::query(
        r"
        UPDATE threads
        SET forum_id = ?, title = ?, author = ?, replies = ?, views = ?,
            last_date = ?, last_author = ?, updated_at = datetime('now')
        WHERE id = ?
        ",
    )
    .bind(forum_id)
    .bind(&thread.title)
    .bind(&thread.author)
    .bind(thread.replies)
    .bind(thread.views)
    .bind(&thread.last_date)
    .bind(&thread.last_author)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update thread")?;

    Ok(())
}

/// Insert a thread under `forum_id`, or overwrite the thread with the same
/// URL. The forum must already be stored.
pub async fn upsert_thread(pool: &SqlitePool, thread: &NewThread, forum_id: i64) -> Result<i64> {
    match ensure(find_thread_id(pool, &thread.url), || {
        insert_thread(pool, thread, forum_id)
    })
    .await?
    {
        Ensured::Found(id) => {
            update_thread(pool, id, thread, forum_id).await?;
            Ok(id)
        }
        Ensured::Created(id) => Ok(id),
    }
}

/// Threads of one forum in crawl-discovery order.
pub async fn list_threads(pool: &SqlitePool, forum_id: i64) -> Result<Vec<Thread>> {
    sqlx::query_as("SELECT * FROM threads WHERE forum_id = ? ORDER BY id")
        .bind(forum_id)
        .fetch_all(pool)
        .await
        .context("Failed to list threads")
}

// ========== Posts ==========

/// Store a post unless `(thread_id, post_number)` is already taken. Existing
/// posts are never modified. Returns whether a row was written.
pub async fn insert_post_if_absent(
    pool: &SqlitePool,
    thread_id: i64,
    post_number: i64,
    post: &NewPost,
) -> Result<bool> {
    let result = sqlx::query(
        r"
        INSERT INTO posts (thread_id, post_number, author, content, post_date)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(thread_id, post_number) DO NOTHING
        ",
    )
    .bind(thread_id)
    .bind(post_number)
    .bind(&post.author)
    .bind(&post.content)
    .bind(&post.post_date)
    .execute(pool)
    .await
    .context("Failed to insert post")?;

    Ok(result.rows_affected() == 1)
}

/// Posts of one thread ordered by sequence number.
pub async fn list_posts(pool: &SqlitePool, thread_id: i64) -> Result<Vec<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE thread_id = ? ORDER BY post_number")
        .bind(thread_id)
        .fetch_all(pool)
        .await
        .context("Failed to list posts")
}

/// Number of posts stored for a thread.
pub async fn count_posts(pool: &SqlitePool, thread_id: i64) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE thread_id = ?")
        .bind(thread_id)
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;
    Ok(count)
}
