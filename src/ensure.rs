//! Find-or-create, shared by the store upserts and destination containers.

use std::future::Future;

/// Outcome of [`ensure`]: the handle, and whether it had to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensured<H> {
    Found(H),
    Created(H),
}

impl<H> Ensured<H> {
    #[must_use]
    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    #[must_use]
    pub fn into_inner(self) -> H {
        match self {
            Self::Found(h) | Self::Created(h) => h,
        }
    }
}

/// Look an identity up and create it only when the lookup comes back empty.
///
/// `create` is not polled at all when `find` yields a handle.
///
/// # Errors
///
/// Returns whichever error `find` or `create` produced.
pub async fn ensure<H, E, F, C, CF>(find: F, create: C) -> Result<Ensured<H>, E>
where
    F: Future<Output = Result<Option<H>, E>>,
    C: FnOnce() -> CF,
    CF: Future<Output = Result<H, E>>,
{
    match find.await? {
        Some(handle) => Ok(Ensured::Found(handle)),
        None => create().await.map(Ensured::Created),
    }
}
