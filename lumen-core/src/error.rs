//! Error types.
//!
//! Every fallible operation in the crate returns [`Result`]. Errors surface
//! synchronously from the call that triggered them (`render`, a flush, or a
//! microtask drain). A failed pass is not rolled back: the DOM keeps whatever
//! partial state it reached.

use thiserror::Error;

/// Errors raised by the runtime, the reconciler and the hooks layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Two children of the same parent share an explicit key.
    #[error("duplicate key `{key}` among siblings")]
    DuplicateKey {
        /// The offending key.
        key: String,
    },

    /// A hook that needs a component instance was called outside of a render.
    #[error("`{hook}` can only be called while a component is rendering")]
    HookOutsideRender {
        /// Name of the hook.
        hook: &'static str,
    },

    /// Flushing kept producing new dirty keys past the configured depth.
    #[error("effect loop: state kept changing after {depth} flush passes")]
    EffectLoop {
        /// Number of passes executed before giving up.
        depth: usize,
    },

    /// A state handle outlived the runtime that created it.
    #[error("the runtime owning this state has been dropped")]
    RuntimeDropped,

    /// Configuration text could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_culprit() {
        let err = Error::DuplicateKey { key: "a".into() };
        assert_eq!(err.to_string(), "duplicate key `a` among siblings");

        let err = Error::HookOutsideRender { hook: "use_state" };
        assert!(err.to_string().contains("use_state"));

        let err = Error::EffectLoop { depth: 100 };
        assert!(err.to_string().contains("100"));
    }
}
