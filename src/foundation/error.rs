pub type LumoraResult<T> = Result<T, LumoraError>;

#[derive(thiserror::Error, Debug)]
pub enum LumoraError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("translation error: {0}")]
    Translation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LumoraError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn translation(msg: impl Into<String>) -> Self {
        Self::Translation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(LumoraError::parse("x").to_string().contains("parse error:"));
        assert!(
            LumoraError::translation("x")
                .to_string()
                .contains("translation error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = LumoraError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
