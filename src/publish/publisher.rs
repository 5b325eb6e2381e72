use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use super::destination::{
    ContainerHandle, ContainerKind, ContainerSpec, ConversationHandle, Destination,
    DestinationError,
};
use super::names::{
    conversation_title, forum_channel_name, forum_topic, opening_header, reply_header,
};
use crate::config::PublishOptions;
use crate::db::{list_forums, list_posts, list_threads, Database, Forum, Post, Thread};
use crate::ensure::{ensure, Ensured};
use crate::segment::segment;

/// Counters reported at the end of a publish run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub forums: usize,
    pub threads: usize,
    /// Threads whose conversation already exists from an earlier run.
    pub threads_existing: usize,
    pub threads_skipped: usize,
    pub messages: usize,
    pub failures: usize,
}

/// Replays stored forums into a [`Destination`], one call at a time.
pub struct Publisher<'a, D: Destination> {
    destination: &'a D,
    db: &'a Database,
    options: PublishOptions,
}

impl<'a, D: Destination> Publisher<'a, D> {
    #[must_use]
    pub fn new(destination: &'a D, db: &'a Database, options: PublishOptions) -> Self {
        Self {
            destination,
            db,
            options,
        }
    }

    /// Publish every stored forum under the configured category.
    ///
    /// # Errors
    ///
    /// Returns an error if the category cannot be set up or the forum list
    /// cannot be read. Failures on individual forums and threads are logged
    /// and counted instead.
    pub async fn publish_all(&self) -> Result<PublishStats> {
        let category = self
            .ensure_container(None, &ContainerSpec::category(&self.options.category_name))
            .await
            .context("Failed to set up destination category")?;

        let forums = list_forums(self.db.pool()).await?;
        info!(count = forums.len(), category = %category.name, "Publishing forums");

        let mut stats = PublishStats::default();
        for forum in &forums {
            self.publish_forum(&category, forum, &mut stats).await;
            pause(self.options.pacing.forum).await;
        }

        info!(
            forums = stats.forums,
            threads = stats.threads,
            existing = stats.threads_existing,
            skipped = stats.threads_skipped,
            messages = stats.messages,
            failures = stats.failures,
            "Publication complete"
        );
        Ok(stats)
    }

    /// Publish one forum's threads, oldest-crawled first.
    pub async fn publish_forum(
        &self,
        category: &ContainerHandle,
        forum: &Forum,
        stats: &mut PublishStats,
    ) {
        info!(forum = %forum.title, "Publishing forum");

        let channel = match self.forum_channel(category, forum).await {
            Ok(channel) => channel,
            Err(e) => {
                error!(forum = %forum.title, "Failed to set up channel: {e}");
                stats.failures += 1;
                return;
            }
        };

        let threads = match list_threads(self.db.pool(), forum.id).await {
            Ok(threads) => threads,
            Err(e) => {
                error!(forum = %forum.title, "Failed to list threads: {e:#}");
                stats.failures += 1;
                return;
            }
        };
        info!(forum = %forum.title, count = threads.len(), "Found threads");

        // The store lists threads in discovery order, newest activity first.
        for thread in threads.iter().rev() {
            self.publish_thread(&channel, thread, stats).await;
            pause(self.options.pacing.thread).await;
        }
        stats.forums += 1;

        info!(forum = %forum.title, "Forum done");
    }

    async fn publish_thread(
        &self,
        channel: &ContainerHandle,
        thread: &Thread,
        stats: &mut PublishStats,
    ) {
        let posts = match list_posts(self.db.pool(), thread.id).await {
            Ok(posts) => posts,
            Err(e) => {
                error!(thread = %thread.title, "Failed to list posts: {e:#}");
                stats.failures += 1;
                return;
            }
        };
        if posts.is_empty() {
            warn!(thread = %thread.title, "No posts stored for thread, skipping");
            stats.threads_skipped += 1;
            return;
        }

        match self.replay_thread(channel, thread, &posts, stats).await {
            Ok(Ensured::Found(_)) => {
                debug!(thread = %thread.title, "Conversation already exists, skipping");
                stats.threads_existing += 1;
            }
            Ok(Ensured::Created(conversation)) => {
                stats.threads += 1;
                if let Err(e) = self.destination.close(&conversation).await {
                    warn!(thread = %thread.title, "Failed to close conversation: {e}");
                }
                debug!(thread = %thread.title, posts = posts.len(), "Thread published");
            }
            Err(e) => {
                error!(thread = %thread.title, "Abandoning thread: {e:#}");
                stats.failures += 1;
            }
        }
    }

    /// Open the conversation with the first post and append every later
    /// post, each split to fit the message limit.
    ///
    /// A conversation with the thread's title already in `channel` is left
    /// untouched, so publishing again does not duplicate threads.
    async fn replay_thread(
        &self,
        channel: &ContainerHandle,
        thread: &Thread,
        posts: &[Post],
        stats: &mut PublishStats,
    ) -> Result<Ensured<ConversationHandle>> {
        let limit = self.options.message_limit;
        let Some((first, rest)) = posts.split_first() else {
            anyhow::bail!("thread has no posts");
        };

        let opening = segment(&opening_header(first), &first.content, limit)?;
        let Some((first_chunk, continuation)) = opening.split_first() else {
            anyhow::bail!("segmenter produced no chunks");
        };

        let title = conversation_title(thread);
        let opened = ensure(self.destination.find_conversation(channel, &title), || {
            self.destination
                .create_conversation(channel, &title, first_chunk)
        })
        .await
        .with_context(|| format!("Failed to open conversation '{title}'"))?;
        let conversation = match opened {
            Ensured::Found(existing) => return Ok(Ensured::Found(existing)),
            Ensured::Created(conversation) => conversation,
        };
        stats.messages += 1;
        info!(thread = %title, "Conversation created");

        for chunk in continuation {
            self.emit(&conversation, chunk, stats).await?;
        }

        for post in rest {
            let chunks = segment(&reply_header(post), &post.content, limit)?;
            for chunk in &chunks {
                self.emit(&conversation, chunk, stats).await?;
            }
        }

        Ok(Ensured::Created(conversation))
    }

    async fn emit(
        &self,
        conversation: &ConversationHandle,
        text: &str,
        stats: &mut PublishStats,
    ) -> Result<()> {
        pause(self.options.pacing.message).await;
        self.destination
            .send(conversation, text)
            .await
            .context("Failed to send message")?;
        stats.messages += 1;
        Ok(())
    }

    /// The channel a forum publishes into: a forum-type channel when the
    /// destination allows it, a text channel otherwise.
    async fn forum_channel(
        &self,
        category: &ContainerHandle,
        forum: &Forum,
    ) -> Result<ContainerHandle, DestinationError> {
        let spec = ContainerSpec {
            name: forum_channel_name(forum),
            kind: ContainerKind::Forum,
            topic: Some(forum_topic(forum)),
        };

        match self.ensure_container(Some(category), &spec).await {
            Err(DestinationError::Unsupported(reason)) => {
                warn!(channel = %spec.name, %reason, "Forum channels unavailable, using a text channel");
                self.ensure_container(Some(category), &spec.as_text()).await
            }
            other => other,
        }
    }

    async fn ensure_container(
        &self,
        parent: Option<&ContainerHandle>,
        spec: &ContainerSpec,
    ) -> Result<ContainerHandle, DestinationError> {
        let ensured = ensure(self.destination.find_container(spec.kind, &spec.name), || {
            self.destination.create_container(parent, spec)
        })
        .await?;

        match &ensured {
            Ensured::Found(handle) => info!(name = %handle.name, "Reusing existing container"),
            Ensured::Created(handle) => info!(name = %handle.name, "Created container"),
        }
        Ok(ensured.into_inner())
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
