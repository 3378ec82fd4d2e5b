use serde::Serialize;

mod build_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

#[derive(Copy, Clone, Debug, Serialize)]
pub struct ApplicationMetadata {
    pub firmware_version: &'static str,
    pub rust_version: &'static str,
    pub profile: &'static str,
    pub git_dirty: bool,
    pub features: &'static str,
}

impl ApplicationMetadata {
    pub fn new() -> Self {
        Self {
            firmware_version: build_info::GIT_VERSION.unwrap_or(build_info::PKG_VERSION),
            rust_version: build_info::RUSTC_VERSION,
            profile: build_info::PROFILE,
            git_dirty: build_info::GIT_DIRTY.unwrap_or(false),
            features: build_info::FEATURES_STR,
        }
    }
}

impl Default for ApplicationMetadata {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn render() {
        let m = ApplicationMetadata::new();
        assert!(!m.firmware_version.is_empty());
        let json: heapless::String<512> = serde_json_core::to_string(&m).unwrap();
        assert!(json.contains("\"profile\""));
    }
}
