/// Returns a cached value or computes, caches and returns it.
///
/// A failed cache read (connection error, undecodable entry) is logged and
/// treated as a miss. Only errors from `$block` reach the caller.
///
/// Expands to an expression of type `AppResult<T>`; must be used inside an
/// async function returning `AppResult`.
///
/// # Arguments
/// * `$cache`: anything with `get_from_cache` and `set_in_background`, usually [`Cache`].
/// * `$key`: the [`CacheKey`] to read and write.
/// * `$ttl`: time-to-live of a freshly computed value, in seconds.
/// * `$block`: future producing `AppResult<T>` on a miss.
///
/// # Example
/// ```rust,ignore
/// let tracks: Vec<SimilarTrack> = cached!(cache, key, 3600, async {
///     Ok::<_, AppError>(compute_similar_tracks())
/// })?;
/// ```
///
/// [`Cache`]: crate::db::Cache
/// [`CacheKey`]: crate::db::CacheKey
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let cached = match $cache.get_from_cache(&$key).await {
            Ok(cached) => cached,
            Err(e) => {
                ::tracing::warn!(key = %$key, error = %e, "Cache read failed, computing value");
                None
            }
        };
        match cached {
            Some(cached) => Ok(cached),
            None => {
                let value = $block.await?;
                $cache.set_in_background(&$key, &value, $ttl);
                Ok(value)
            }
        }
    }};
}
