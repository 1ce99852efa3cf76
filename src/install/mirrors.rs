//! Sequential fallback across hex.pm mirrors

use std::future::Future;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MirrorError<E>
where
    E: std::error::Error + 'static,
{
    #[error("could not {action} from any mirror")]
    NoMirrors { action: String },

    #[error("could not {action} from any mirror (last tried {mirror}): {source}")]
    AllFailed {
        action: String,
        mirror: String,
        #[source]
        source: E,
    },
}

/// Run `action` against each mirror in order until one succeeds.
///
/// Each mirror is tried at most once and the first success is returned.
/// An empty list fails immediately without running `action`.
pub async fn with_mirrors<T, E, F, Fut>(
    mirrors: &[String],
    action_title: &str,
    mut action: F,
) -> Result<T, MirrorError<E>>
where
    E: std::error::Error + 'static,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_failure = None;

    for mirror in mirrors {
        match action(mirror.clone()).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                debug!("Failed to {} from {}: {}", action_title, mirror, e);
                last_failure = Some((mirror.clone(), e));
            }
        }
    }

    Err(match last_failure {
        Some((mirror, source)) => MirrorError::AllFailed {
            action: action_title.to_string(),
            mirror,
            source,
        },
        None => MirrorError::NoMirrors {
            action: action_title.to_string(),
        },
    })
}
