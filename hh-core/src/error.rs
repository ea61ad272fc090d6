use thiserror::Error;

/// Errors surfaced by the membrane model and its integrator.
///
/// Rate singularities are resolved inside `kinetics` and never show up here;
/// an absent firing frequency is `None`, not an error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HhError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("integration failed at t = {t}: {reason}")]
    IntegrationFailure { t: f64, reason: String },
}

pub type HhResult<T, E = HhError> = core::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            format!("{}", HhError::InvalidArgument("resolution must be at least 2".into())),
            "invalid argument: resolution must be at least 2"
        );
        assert_eq!(
            format!("{}", HhError::InvalidState("no stimulus bound")),
            "invalid state: no stimulus bound"
        );
        let failure = HhError::IntegrationFailure { t: 1.5, reason: "step size collapsed".into() };
        assert_eq!(format!("{}", failure), "integration failed at t = 1.5: step size collapsed");
    }

    #[test]
    fn result_round_trip() {
        fn may_fail(ok: bool) -> HhResult<u32> {
            if ok { Ok(7) } else { Err(HhError::InvalidState("unbound")) }
        }
        assert_eq!(may_fail(true).unwrap(), 7);
        assert!(may_fail(false).is_err());
    }
}
