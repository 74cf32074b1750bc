use bytes::Bytes;
use futures::{stream, Stream};
use tokio::sync::Mutex as AsyncMutex;

/// Serializes tests that touch `GEMINI_*` / `LINGO_*` environment variables.
/// Use `.blocking_lock()` in sync tests and `.lock().await` in async tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// A response body that delivers `parts` as separate reads.
pub fn byte_chunks<E>(parts: &[&[u8]]) -> impl Stream<Item = Result<Bytes, E>> + Send + 'static
where
    E: Send + 'static,
{
    let items: Vec<Result<Bytes, E>> = parts
        .iter()
        .map(|part| Ok(Bytes::copy_from_slice(part)))
        .collect();
    stream::iter(items)
}
